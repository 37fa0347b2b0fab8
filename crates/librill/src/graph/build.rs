//! Function graph construction.
//!
//! After unification, the scope-resolved program is lowered into the FG:
//! literals become constants, composites become builder vertices with
//! positionally keyed inputs, variables become pass-through vertices fed by
//! a `var:<name>` edge from their producer (keeping the graph a proper DAG
//! instead of collapsing into aliasing), and calls become apply vertices
//! whose input edges carry the committed signature's parameter names.
//!
//! Resource declarations contribute a builder sink collecting their name
//! and field values; the sinks produce no values, but wiring them keeps
//! everything the interpreter will read inside the reachable graph.

use std::rc::Rc;

use log::debug;

use crate::{
    ast::{Expr, FuncKind, Prog, ResContent, Stmt},
    compile::{context::CompileContext, error::CompileError},
    funcs,
    graph::{BuiltinCall, FuncGraph, VertexKind},
    nom_tools::ToRange,
    types::{Type, Value},
};

/// Builds the function graph of a compiled program
pub fn graph<'base>(ctx: &CompileContext<'base>, root: &Prog<'base>) -> Result<FuncGraph, CompileError> {
    let mut fg = FuncGraph::new();
    build_prog(ctx, root, &mut fg)?;
    Ok(fg)
}

fn build_prog<'base>(ctx: &CompileContext<'base>, prog: &Prog<'base>, fg: &mut FuncGraph) -> Result<(), CompileError> {
    for stmt in prog.stmts.iter() {
        if !ctx.active.contains(&stmt.id()) {
            continue;
        }
        build_stmt(ctx, stmt, fg)?;
    }
    Ok(())
}

fn build_stmt<'base>(ctx: &CompileContext<'base>, stmt: &Stmt<'base>, fg: &mut FuncGraph) -> Result<(), CompileError> {
    match stmt {
        // producers build lazily, when a consumer's edge reaches them
        Stmt::Bind(_) | Stmt::Func(_) | Stmt::Class(_) | Stmt::Import(_) => Ok(()),
        Stmt::Include(include) => {
            if let Some(instance) = ctx.include_instances.get(&include.id) {
                build_prog(ctx, &instance.body, fg)?;
            }
            Ok(())
        }
        Stmt::If(if_stmt) => {
            build_expr(ctx, &if_stmt.cond, fg)?;
            if let Some(block) = &if_stmt.then {
                build_prog(ctx, block, fg)?;
            }
            if let Some(block) = &if_stmt.els {
                build_prog(ctx, block, fg)?;
            }
            Ok(())
        }
        Stmt::Res(res) => {
            build_expr(ctx, &res.name, fg)?;

            let span = &res.kind;
            fg.add_vertex(
                res.id,
                VertexKind::Res { kind: res.kind.text.to_string() },
                format!("res({})", res.kind.text),
                span.to_range(),
                span.state.file.clone(),
            );
            fg.add_edge(res.name.id(), res.id, "name")?;

            for (index, content) in res.contents.iter().enumerate() {
                match content {
                    ResContent::Field(field) => {
                        build_expr(ctx, &field.value, fg)?;
                        fg.add_edge(field.value.id(), res.id, field.field.text)?;
                        if let Some(cond) = &field.cond {
                            build_expr(ctx, cond, fg)?;
                            fg.add_edge(cond.id(), res.id, format!("cond:{index}"))?;
                        }
                    }
                    ResContent::Edge(edge) => {
                        build_expr(ctx, &edge.half.name, fg)?;
                        fg.add_edge(edge.half.name.id(), res.id, format!("edge:{index}"))?;
                        if let Some(cond) = &edge.cond {
                            build_expr(ctx, cond, fg)?;
                            fg.add_edge(cond.id(), res.id, format!("cond:{index}"))?;
                        }
                    }
                    ResContent::Meta(meta) => {
                        build_expr(ctx, &meta.value, fg)?;
                        fg.add_edge(meta.value.id(), res.id, format!("meta:{index}"))?;
                        if let Some(cond) = &meta.cond {
                            build_expr(ctx, cond, fg)?;
                            fg.add_edge(cond.id(), res.id, format!("cond:{index}"))?;
                        }
                    }
                }
            }
            Ok(())
        }
        Stmt::Edge(edge) => {
            for half in edge.halves.iter() {
                build_expr(ctx, &half.name, fg)?;
            }
            Ok(())
        }
    }
}

fn solved_type<'base>(ctx: &CompileContext<'base>, expr: &Rc<Expr<'base>>) -> Result<Type, CompileError> {
    ctx.type_of(expr.id())
        .cloned()
        .ok_or_else(|| CompileError::graph_internal(format!("expression {expr} was never typed")))
}

pub(crate) fn build_expr<'base>(ctx: &CompileContext<'base>, expr: &Rc<Expr<'base>>, fg: &mut FuncGraph) -> Result<(), CompileError> {
    if fg.has_vertex(expr.id()) {
        // shared literals and diamond references build once
        return Ok(());
    }

    let span = expr.span();
    let position = span.to_range();
    let source = span.state.file.clone();

    match expr.as_ref() {
        Expr::Bool(node) => {
            fg.add_vertex(node.id, VertexKind::Const(Value::Bool(node.value)), format!("bool({})", node.value), position, source);
            Ok(())
        }
        Expr::Int(node) => {
            fg.add_vertex(node.id, VertexKind::Const(Value::Int(node.value)), format!("int({})", node.value), position, source);
            Ok(())
        }
        Expr::Float(node) => {
            fg.add_vertex(node.id, VertexKind::Const(Value::Float(node.value)), format!("float({})", node.value), position, source);
            Ok(())
        }
        Expr::Str(node) => {
            fg.add_vertex(node.id, VertexKind::Const(Value::Str(node.value.to_string())), format!("str(\"{}\")", node.value), position, source);
            Ok(())
        }
        Expr::List(node) => {
            let Type::List(elem) = solved_type(ctx, expr)? else {
                return Err(CompileError::graph_internal("list expression solved to a non-list type"));
            };
            fg.add_vertex(node.id, VertexKind::ListBuilder { elem: *elem }, "list".to_string(), position, source);
            for (index, element) in node.elems.iter().enumerate() {
                build_expr(ctx, element, fg)?;
                fg.add_edge(element.id(), node.id, index.to_string())?;
            }
            Ok(())
        }
        Expr::Map(node) => {
            let Type::Map(key, val) = solved_type(ctx, expr)? else {
                return Err(CompileError::graph_internal("map expression solved to a non-map type"));
            };
            fg.add_vertex(node.id, VertexKind::MapBuilder { key: *key, val: *val }, "map".to_string(), position, source);
            for (index, (key_expr, val_expr)) in node.entries.iter().enumerate() {
                build_expr(ctx, key_expr, fg)?;
                build_expr(ctx, val_expr, fg)?;
                fg.add_edge(key_expr.id(), node.id, format!("key:{index}"))?;
                fg.add_edge(val_expr.id(), node.id, format!("val:{index}"))?;
            }
            Ok(())
        }
        Expr::Struct(node) => {
            let fields = node.fields.iter().map(|(name, _)| name.text.to_string()).collect();
            fg.add_vertex(node.id, VertexKind::StructBuilder { fields }, "struct".to_string(), position, source);
            for (name, field) in node.fields.iter() {
                build_expr(ctx, field, fg)?;
                fg.add_edge(field.id(), node.id, name.text)?;
            }
            Ok(())
        }
        Expr::Var(node) => {
            let Some(target) = ctx.var_targets.get(&node.id) else {
                return Err(CompileError::graph_internal(format!("variable ${} was never resolved", node.name)));
            };
            build_expr(ctx, target, fg)?;
            fg.add_vertex(node.id, VertexKind::Var { name: node.name.to_string() }, format!("var({})", node.name), position, source);
            fg.add_edge(target.id(), node.id, format!("var:{}", node.name))?;
            Ok(())
        }
        Expr::If(node) => {
            build_expr(ctx, &node.cond, fg)?;
            build_expr(ctx, &node.then, fg)?;
            build_expr(ctx, &node.els, fg)?;
            fg.add_vertex(node.id, VertexKind::If, "if".to_string(), position, source);
            fg.add_edge(node.cond.id(), node.id, "c")?;
            fg.add_edge(node.then.id(), node.id, "a")?;
            fg.add_edge(node.els.id(), node.id, "b")?;
            Ok(())
        }
        Expr::Func(node) => {
            let FuncKind::Body(body) = &node.kind else {
                // builtins and overload sets need no vertex of their own
                return Ok(());
            };
            build_expr(ctx, body, fg)?;
            let sig = solved_type(ctx, expr)?;
            fg.add_vertex(node.id, VertexKind::Func { body: body.id(), sig }, format!("func({})", node.title), position, source);
            fg.add_edge(body.id(), node.id, "body")?;
            Ok(())
        }
        Expr::Call(node) => {
            for arg in node.args.iter() {
                build_expr(ctx, arg, fg)?;
            }

            let Some(instance) = ctx.call_instances.get(&node.id) else {
                return Err(CompileError::graph_internal(format!("call of {} was never resolved", node.name)));
            };

            match &instance.builtin {
                Some(builtin_name) => {
                    // re-derive the committed signature from the solved
                    // argument types
                    let builtin = funcs::registry()
                        .get(builtin_name)
                        .ok_or_else(|| CompileError::graph_internal("builtin vanished from the registry"))?;
                    let arg_types: Vec<Option<Type>> = node
                        .args
                        .iter()
                        .map(|arg| ctx.type_of(arg.id()).cloned())
                        .collect();
                    let arg_values: Vec<Option<Value>> = node.args.iter().map(|arg| literal_value(arg)).collect();

                    let mut signatures: Vec<Type> = builtin
                        .signatures(&arg_types, &arg_values)
                        .into_iter()
                        .filter(|sig| matches!(sig, Type::Func { params, .. } if params.len() == node.args.len()))
                        .collect();
                    if signatures.len() != 1 {
                        return Err(CompileError::graph_internal(format!(
                            "{} solved to {} signatures instead of one",
                            node.name,
                            signatures.len()
                        )));
                    }
                    let call = BuiltinCall { name: builtin_name.clone(), sig: signatures.remove(0) };
                    debug!("graph: call {} committed to {}", node.name, call.sig);

                    let params = call.param_names();
                    fg.add_vertex(
                        node.id,
                        VertexKind::Call { name: node.name.to_string(), builtin: Some(call) },
                        format!("call:{}", node.name),
                        position,
                        source,
                    );
                    for (param, arg) in params.iter().zip(node.args.iter()) {
                        fg.add_edge(arg.id(), node.id, param.clone())?;
                    }
                    Ok(())
                }
                None => {
                    let Expr::Func(func) = instance.func.as_ref() else {
                        return Err(CompileError::graph_internal("call instance holds a non-function"));
                    };

                    build_expr(ctx, &instance.func, fg)?;
                    fg.add_vertex(
                        node.id,
                        VertexKind::Call { name: node.name.to_string(), builtin: None },
                        format!("call:{}", node.name),
                        position,
                        source,
                    );
                    fg.add_edge(instance.func.id(), node.id, format!("call:{}", node.name))?;
                    for (param, arg) in func.params.iter().zip(node.args.iter()) {
                        fg.add_edge(arg.id(), node.id, param.name.text)?;
                    }
                    Ok(())
                }
            }
        }
        Expr::Any(_) => Err(CompileError::graph_internal("placeholder expressions never reach the graph")),
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

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::{
        compile::{context::CompileContext, interpolate::interpolate_prog, resolver::{set_scope, ModuleSet}, unify::unify},
        file::SourceFile,
        nom_tools::State,
        parser,
    };

    use super::graph;

    fn build(code: &str) -> crate::graph::FuncGraph {
        let state: &'static State = Box::leak(Box::new(State::new(SourceFile::new(
            vec!["<memory>".into()],
            code.to_string(),
        ))));
        let (_, prog) = parser::parse(state).unwrap_or_else(|error| panic!("{code}: {error}"));
        let prog = Rc::new(interpolate_prog(&prog, &state.indexer).unwrap());

        let mut ctx = CompileContext::new(state.indexer.clone());
        let modules = ModuleSet::single(prog.clone());
        set_scope(&mut ctx, &modules).unwrap();
        unify(&mut ctx, &prog).unwrap();
        graph(&ctx, &prog).unwrap()
    }

    #[test]
    fn chained_variables_produce_pass_through_vertices() {
        let fg = build("test \"t\" { int64ptr => $c, }\n$c = $b\n$b = $a\n$a = 42");
        let text = fg.text();

        for vertex in ["int(42)", "var(a)", "var(b)", "var(c)", "str(\"t\")"] {
            assert!(text.contains(&format!("vertex: {vertex}")), "missing {vertex} in:\n{text}");
        }
        assert!(text.contains("edge: int(42) -> var(a) # var:a"));
        assert!(text.contains("edge: var(a) -> var(b) # var:b"));
        assert!(text.contains("edge: var(b) -> var(c) # var:c"));
        assert!(text.contains("edge: var(c) -> res(test) # int64ptr"));
    }

    #[test]
    fn operator_calls_label_edges_by_signature() {
        let fg = build("test \"t\" { int64ptr => 42 + 13, }");
        let text = fg.text();

        assert!(text.contains("vertex: call:operator"));
        assert!(text.contains("edge: str(\"+\") -> call:operator # x"));
        assert!(text.contains("edge: int(42) -> call:operator # a"));
        assert!(text.contains("edge: int(13) -> call:operator # b"));
        assert!(text.contains("edge: call:operator -> res(test) # int64ptr"));
    }

    #[test]
    fn shadowed_producers_stay_out_of_the_graph() {
        let fg = build("$x = \"hello\"\nif true { $x = \"world\"\ntest \"t\" { stringptr => $x, } }");
        let text = fg.text();

        assert!(text.contains("vertex: str(\"world\")"));
        assert!(text.contains("edge: str(\"world\") -> var(x) # var:x"));
        assert!(!text.contains("str(\"hello\")"));
    }

    #[test]
    fn function_calls_wire_the_callee() {
        let fg = build("func double($x) { $x + $x }\ntest \"t\" { int64ptr => double(21), }");
        let text = fg.text();

        assert!(text.contains("vertex: func(double)"));
        assert!(text.contains("vertex: call:double"));
        assert!(text.contains("edge: func(double) -> call:double # call:double"));
        assert!(text.contains("edge: int(21) -> call:double # x"));
        assert!(text.contains("# body"));
    }

    #[test]
    fn if_expressions_wire_three_edges() {
        let fg = build("$a = if true { 1 } else { 2 }\ntest \"t\" { int64ptr => $a, }");
        let text = fg.text();

        assert!(text.contains("edge: bool(true) -> if # c"));
        assert!(text.contains("edge: int(1) -> if # a"));
        assert!(text.contains("edge: int(2) -> if # b"));
    }

    #[test]
    fn deterministic_output() {
        let code = "test \"t\" { int64ptr => 1 + 2, stringptr => \"s\", }";
        assert_eq!(build(code).text(), build(code).text());
    }
}
