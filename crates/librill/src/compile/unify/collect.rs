//! Per-node invariant generation.
//!
//! Walks the scope-resolved program (and every instantiated class body and
//! callee copy) and emits the type constraints of each node: literals pin
//! their scalar type, composites wrap their elements, conditionals equate
//! their branches, and calls of overloaded builtins emit an exclusive
//! constraint over the signature set the registry offers for the partially
//! known argument types and values.

use std::rc::Rc;

use crate::{
    ast::{Expr, NodeId, Prog, ResContent, Stmt},
    compile::{context::CompileContext, error::CompileError},
    engine::resources,
    funcs,
    interpret::meta,
    nom_tools::ToRange,
    types::{Type, Value},
};

use super::invariant::Invariant;

/// Collects the invariants of the whole compilation: the root program plus
/// every loaded module.
pub fn collect<'base>(
    ctx: &CompileContext<'base>,
    root: &Prog<'base>,
) -> Result<Vec<Invariant<'base>>, CompileError> {
    let mut out = Vec::new();
    collect_prog(ctx, root, &mut out)?;

    let module_progs: Vec<Rc<Prog<'base>>> = ctx
        .modules_loaded
        .values()
        .filter_map(|module| module.prog.clone())
        .collect();
    for prog in module_progs {
        collect_prog(ctx, &prog, &mut out)?;
    }

    Ok(out)
}

fn collect_prog<'base>(
    ctx: &CompileContext<'base>,
    prog: &Prog<'base>,
    out: &mut Vec<Invariant<'base>>,
) -> Result<(), CompileError> {
    for stmt in prog.stmts.iter() {
        if !ctx.active.contains(&stmt.id()) {
            continue;
        }
        collect_stmt(ctx, stmt, out)?;
    }
    Ok(())
}

fn collect_stmt<'base>(
    ctx: &CompileContext<'base>,
    stmt: &Stmt<'base>,
    out: &mut Vec<Invariant<'base>>,
) -> Result<(), CompileError> {
    match stmt {
        Stmt::Bind(bind) => collect_expr(ctx, &bind.expr, out),
        // declarations are templates; their per-use copies carry the types
        Stmt::Func(_) | Stmt::Class(_) | Stmt::Import(_) => Ok(()),
        Stmt::Include(include) => {
            for arg in include.args.iter() {
                collect_expr(ctx, arg, out)?;
            }
            if let Some(instance) = ctx.include_instances.get(&include.id) {
                collect_prog(ctx, &instance.body, out)?;
            }
            Ok(())
        }
        Stmt::If(if_stmt) => {
            collect_expr(ctx, &if_stmt.cond, out)?;
            out.push(Invariant::Equals { expr: if_stmt.cond.clone(), ty: Type::Bool });
            if let Some(block) = &if_stmt.then {
                collect_prog(ctx, block, out)?;
            }
            if let Some(block) = &if_stmt.els {
                collect_prog(ctx, block, out)?;
            }
            Ok(())
        }
        Stmt::Res(res) => {
            collect_expr(ctx, &res.name, out)?;
            out.push(Invariant::Exclusive {
                expr: res.name.clone(),
                label: format!("{} name", res.kind.text),
                inner: vec![
                    Invariant::Equals { expr: res.name.clone(), ty: Type::Str },
                    Invariant::Equals { expr: res.name.clone(), ty: Type::list(Type::Str) },
                ],
            });

            let kind = resources::registry().kind(res.kind.text);

            for content in res.contents.iter() {
                match content {
                    ResContent::Field(field) => {
                        collect_expr(ctx, &field.value, out)?;
                        // unknown kinds and fields are re-checked by the
                        // interpreter, which owns those diagnostics
                        if let Some(ty) = kind.and_then(|kind| kind.field(field.field.text)) {
                            out.push(Invariant::Equals { expr: field.value.clone(), ty: ty.clone() });
                        }
                        collect_cond(ctx, &field.cond, out)?;
                    }
                    ResContent::Edge(edge) => {
                        collect_expr(ctx, &edge.half.name, out)?;
                        out.push(Invariant::Equals { expr: edge.half.name.clone(), ty: Type::Str });
                        collect_cond(ctx, &edge.cond, out)?;
                    }
                    ResContent::Meta(meta_entry) => {
                        collect_expr(ctx, &meta_entry.value, out)?;
                        match meta_entry.property.text {
                            "meta" => out.push(Invariant::Equals {
                                expr: meta_entry.value.clone(),
                                ty: meta::meta_struct_type(),
                            }),
                            "reverse" => out.push(Invariant::Exclusive {
                                expr: meta_entry.value.clone(),
                                label: "reverse".to_string(),
                                inner: vec![
                                    Invariant::Equals { expr: meta_entry.value.clone(), ty: Type::Bool },
                                    // reserved struct form; accepted here,
                                    // rejected by the interpreter
                                    Invariant::Equals { expr: meta_entry.value.clone(), ty: meta::reverse_struct_type() },
                                ],
                            }),
                            property => {
                                if let Some(ty) = meta::meta_property_type(property) {
                                    out.push(Invariant::Equals { expr: meta_entry.value.clone(), ty: ty.clone() });
                                }
                            }
                        }
                        collect_cond(ctx, &meta_entry.cond, out)?;
                    }
                }
            }
            Ok(())
        }
        Stmt::Edge(edge) => {
            for half in edge.halves.iter() {
                collect_expr(ctx, &half.name, out)?;
                out.push(Invariant::Equals { expr: half.name.clone(), ty: Type::Str });
            }
            check_send_recv(edge)
        }
    }
}

/// Validates the field compatibility of a send/recv edge binding
fn check_send_recv(edge: &crate::ast::EdgeStmt<'_>) -> Result<(), CompileError> {
    if edge.halves.len() != 2 {
        return Ok(());
    }

    let send = &edge.halves[0];
    let recv = &edge.halves[1];
    let position = send.kind.to_range();
    let source = send.kind.state.file.clone();

    match (&send.field, &recv.field) {
        (None, None) => Ok(()),
        (Some(_), None) | (None, Some(_)) => Err(CompileError::send_recv_mismatch(
            "send and recv fields must be named on both halves",
            position,
            source,
        )),
        (Some(send_field), Some(recv_field)) => {
            let send_kind_name = send.kind.text.to_lowercase();
            let recv_kind_name = recv.kind.text.to_lowercase();

            // kinds missing from the registry fail at interpretation
            let registry = resources::registry();
            let (Some(send_kind), Some(recv_kind)) =
                (registry.kind(&send_kind_name), registry.kind(&recv_kind_name))
            else {
                return Ok(());
            };

            let Some(send_ty) = send_kind.field(send_field.text) else {
                return Err(CompileError::send_recv_mismatch(
                    format!("kind '{send_kind_name}' has no field '{}'", send_field.text),
                    send_field.to_range(),
                    source,
                ));
            };
            if !send_kind.can_send(send_field.text) {
                return Err(CompileError::send_recv_mismatch(
                    format!("field '{}' of kind '{send_kind_name}' cannot be sent", send_field.text),
                    send_field.to_range(),
                    source,
                ));
            }
            let Some(recv_ty) = recv_kind.field(recv_field.text) else {
                return Err(CompileError::send_recv_mismatch(
                    format!("kind '{recv_kind_name}' has no field '{}'", recv_field.text),
                    recv_field.to_range(),
                    source,
                ));
            };
            if send_ty != recv_ty {
                return Err(CompileError::send_recv_mismatch(
                    format!("cannot send {send_ty} into a {recv_ty} field"),
                    recv_field.to_range(),
                    source,
                ));
            }
            Ok(())
        }
    }
}

fn collect_cond<'base>(
    ctx: &CompileContext<'base>,
    cond: &Option<Rc<Expr<'base>>>,
    out: &mut Vec<Invariant<'base>>,
) -> Result<(), CompileError> {
    if let Some(cond) = cond {
        collect_expr(ctx, cond, out)?;
        out.push(Invariant::Equals { expr: cond.clone(), ty: Type::Bool });
    }
    Ok(())
}

/// The literal type of an expression, when it is a literal
fn literal_type(expr: &Expr<'_>) -> Option<Type> {
    match expr {
        Expr::Bool(_) => Some(Type::Bool),
        Expr::Int(_) => Some(Type::Int),
        Expr::Float(_) => Some(Type::Float),
        Expr::Str(_) => Some(Type::Str),
        _ => None,
    }
}

/// The literal value of an expression, when it is a literal
fn literal_value(expr: &Expr<'_>) -> Option<Value> {
    match expr {
        Expr::Bool(node) => Some(Value::Bool(node.value)),
        Expr::Int(node) => Some(Value::Int(node.value)),
        Expr::Float(node) => Some(Value::Float(node.value)),
        Expr::Str(node) => Some(Value::Str(node.value.to_string())),
        _ => None,
    }
}

pub(crate) fn collect_expr<'base>(
    ctx: &CompileContext<'base>,
    expr: &Rc<Expr<'base>>,
    out: &mut Vec<Invariant<'base>>,
) -> Result<(), CompileError> {
    match expr.as_ref() {
        Expr::Bool(_) | Expr::Int(_) | Expr::Float(_) | Expr::Str(_) => {
            let ty = literal_type(expr).expect("scalar literals have literal types");
            out.push(Invariant::Equals { expr: expr.clone(), ty });
            Ok(())
        }
        Expr::Any(_) => Ok(()),
        Expr::Var(node) => {
            let Some(target) = ctx.var_targets.get(&node.id) else {
                return Err(CompileError::graph_internal(format!(
                    "variable ${} was never resolved",
                    node.name
                )));
            };
            out.push(Invariant::Equality { left: expr.clone(), right: target.clone() });
            Ok(())
        }
        Expr::List(node) => {
            if node.elems.is_empty() {
                // an empty composite still needs an element type; the
                // placeholder lets the surrounding context provide one
                let placeholder = Rc::new(Expr::Any(crate::ast::AnyExpr {
                    id: ctx.next_id(),
                    span: node.span.clone(),
                }));
                out.push(Invariant::Any { expr: placeholder.clone() });
                out.push(Invariant::WrapList { expr: expr.clone(), elem: placeholder });
                return Ok(());
            }

            for elem in node.elems.iter() {
                collect_expr(ctx, elem, out)?;
            }
            out.push(Invariant::EqualityList { exprs: node.elems.clone() });
            out.push(Invariant::WrapList { expr: expr.clone(), elem: node.elems[0].clone() });
            Ok(())
        }
        Expr::Map(node) => {
            if node.entries.is_empty() {
                let key = Rc::new(Expr::Any(crate::ast::AnyExpr { id: ctx.next_id(), span: node.span.clone() }));
                let val = Rc::new(Expr::Any(crate::ast::AnyExpr { id: ctx.next_id(), span: node.span.clone() }));
                out.push(Invariant::Any { expr: key.clone() });
                out.push(Invariant::Any { expr: val.clone() });
                out.push(Invariant::WrapMap { expr: expr.clone(), key, val });
                return Ok(());
            }

            for (key, val) in node.entries.iter() {
                collect_expr(ctx, key, out)?;
                collect_expr(ctx, val, out)?;
            }
            out.push(Invariant::EqualityList {
                exprs: node.entries.iter().map(|(key, _)| key.clone()).collect(),
            });
            out.push(Invariant::EqualityList {
                exprs: node.entries.iter().map(|(_, val)| val.clone()).collect(),
            });
            out.push(Invariant::WrapMap {
                expr: expr.clone(),
                key: node.entries[0].0.clone(),
                val: node.entries[0].1.clone(),
            });
            Ok(())
        }
        Expr::Struct(node) => {
            for (_, field) in node.fields.iter() {
                collect_expr(ctx, field, out)?;
            }
            out.push(Invariant::WrapStruct {
                expr: expr.clone(),
                fields: node.fields.iter().map(|(name, field)| (name.text.to_string(), field.clone())).collect(),
            });
            Ok(())
        }
        // a bare function expression is a template; per-call copies carry
        // the types
        Expr::Func(_) => Ok(()),
        Expr::If(node) => {
            collect_expr(ctx, &node.cond, out)?;
            collect_expr(ctx, &node.then, out)?;
            collect_expr(ctx, &node.els, out)?;
            out.push(Invariant::Equals { expr: node.cond.clone(), ty: Type::Bool });
            out.push(Invariant::Equality { left: expr.clone(), right: node.then.clone() });
            out.push(Invariant::Equality { left: expr.clone(), right: node.els.clone() });
            Ok(())
        }
        Expr::Call(node) => {
            for arg in node.args.iter() {
                collect_expr(ctx, arg, out)?;
            }

            let Some(instance) = ctx.call_instances.get(&node.id) else {
                return Err(CompileError::graph_internal(format!(
                    "call of {} was never resolved",
                    node.name
                )));
            };

            match &instance.builtin {
                Some(builtin_name) => {
                    let builtin = funcs::registry()
                        .get(builtin_name)
                        .ok_or_else(|| CompileError::graph_internal("builtin vanished from the registry"))?;

                    let arg_types: Vec<Option<Type>> = node.args.iter().map(|arg| literal_type(arg)).collect();
                    let arg_values: Vec<Option<Value>> = node.args.iter().map(|arg| literal_value(arg)).collect();

                    let signatures: Vec<Type> = builtin
                        .signatures(&arg_types, &arg_values)
                        .into_iter()
                        .filter(|sig| matches!(sig, Type::Func { params, .. } if params.len() == node.args.len()))
                        .collect();

                    if signatures.is_empty() {
                        let span = expr.span();
                        return Err(CompileError::no_signature_matches(
                            node.name.as_ref(),
                            span.to_range(),
                            span.state.file.clone(),
                        ));
                    }

                    let alternatives: Vec<Invariant<'base>> = signatures
                        .into_iter()
                        .map(|sig| {
                            let Type::Func { params, ret } = sig else {
                                unreachable!("signatures are function types");
                            };
                            let mut inner: Vec<Invariant<'base>> = params
                                .into_iter()
                                .zip(node.args.iter())
                                .map(|((_, ty), arg)| Invariant::Equals { expr: arg.clone(), ty })
                                .collect();
                            inner.push(Invariant::Equals { expr: expr.clone(), ty: *ret });
                            Invariant::Conjunction { inner }
                        })
                        .collect();

                    if alternatives.len() == 1 {
                        out.extend(alternatives);
                    } else {
                        out.push(Invariant::Exclusive {
                            expr: expr.clone(),
                            label: node.name.to_string(),
                            inner: alternatives,
                        });
                    }
                    Ok(())
                }
                None => {
                    let Expr::Func(func) = instance.func.as_ref() else {
                        return Err(CompileError::graph_internal("call instance holds a non-function"));
                    };
                    let crate::ast::FuncKind::Body(body) = &func.kind else {
                        return Err(CompileError::graph_internal("builtin-less call instance has no body"));
                    };

                    collect_expr(ctx, body, out)?;

                    // declared annotations constrain the copy's arguments
                    for (param, arg) in func.params.iter().zip(node.args.iter()) {
                        if let Some(ty) = &param.ty {
                            out.push(Invariant::Equals { expr: arg.clone(), ty: ty.clone() });
                        }
                    }
                    if let Some(ty) = &func.ret {
                        out.push(Invariant::Equals { expr: body.clone(), ty: ty.clone() });
                    }

                    out.push(Invariant::WrapFunc {
                        expr: instance.func.clone(),
                        params: func
                            .params
                            .iter()
                            .zip(node.args.iter())
                            .map(|(param, arg)| (param.name.text.to_string(), arg.clone()))
                            .collect(),
                        ret: body.clone(),
                    });
                    out.push(Invariant::WrapCall { expr: expr.clone(), func: instance.func.clone() });
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::{
        compile::{context::CompileContext, interpolate::interpolate_prog, resolver::{set_scope, ModuleSet}},
        file::SourceFile,
        nom_tools::State,
        parser,
    };

    use super::collect;

    fn collected(code: &str) -> usize {
        let state: &'static State = Box::leak(Box::new(State::new(SourceFile::new(
            vec!["<memory>".into()],
            code.to_string(),
        ))));
        let (_, prog) = parser::parse(state).unwrap();
        let prog = interpolate_prog(&prog, &state.indexer).unwrap();

        let mut ctx = CompileContext::new(state.indexer.clone());
        let prog = Rc::new(prog);
        let modules = ModuleSet::single(prog.clone());
        set_scope(&mut ctx, &modules).unwrap();
        collect(&ctx, &prog).unwrap().len()
    }

    #[test]
    fn literals_emit_their_equalities() {
        // one literal Equals plus the resource name exclusive and the
        // field's declared type constraint
        assert!(collected("test \"t\" { int64ptr => 42, }") >= 3);
    }

    #[test]
    fn empty_list_emits_a_placeholder() {
        let count = collected("test \"t\" { onlyshow => [], }");
        // at least Any + WrapList + the declared field type
        assert!(count >= 3);
    }

    #[test]
    fn send_recv_mismatch_is_caught_during_collection() {
        let code = "test \"t1\" { }\ntest \"t2\" { }\nTest[\"t1\"].hello -> Test[\"t2\"].int64ptr";
        let state: &'static State = Box::leak(Box::new(State::new(SourceFile::new(
            vec!["<memory>".into()],
            code.to_string(),
        ))));
        let (_, prog) = parser::parse(state).unwrap();
        let prog = Rc::new(interpolate_prog(&prog, &state.indexer).unwrap());

        let mut ctx = CompileContext::new(state.indexer.clone());
        let modules = ModuleSet::single(prog.clone());
        set_scope(&mut ctx, &modules).unwrap();
        let error = collect(&ctx, &prog).unwrap_err();
        assert!(matches!(error, crate::compile::error::CompileError::SendRecvMismatch(_)));
    }
}
