//! String interpolation.
//!
//! Rewrites string literals containing `${…}` segments into equivalent
//! expression trees after Init and before SetScope: the static pieces and
//! the referenced variables become leaves of a left-folded chain of
//! two-argument `concat` calls. Nodes without interpolation are returned
//! unchanged (sharing the original `Rc`), so applying the pass twice is
//! equivalent to applying it once. This is the only transformation allowed
//! to change a node's kind.

use std::borrow::Cow;
use std::rc::Rc;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use crate::{
    ast::{BindStmt, CallExpr, ClassStmt, EdgeHalf, EdgeStmt, Expr, FuncExpr, FuncKind, FuncStmt, IfExpr, IfStmt, IncludeStmt, ListExpr, MapExpr, NodeId, Prog, ResContent, ResEdge, ResField, ResMeta, ResStmt, Stmt, StrExpr, StructExpr, VarExpr},
    compile::error::CompileError,
    nom_tools::ToRange,
};

fn next_id(indexer: &Arc<AtomicUsize>) -> NodeId {
    NodeId(indexer.fetch_add(1, std::sync::atomic::Ordering::SeqCst))
}

/// One parsed segment of an interpolated string
enum Piece<'base> {
    /// A static piece of text
    Lit(Cow<'base, str>),
    /// A `${name}` variable reference
    Var(Cow<'base, str>),
}

/// Slices a cooked string value, preserving borrowing when possible
fn slice<'base>(value: &Cow<'base, str>, range: std::ops::Range<usize>) -> Cow<'base, str> {
    match value {
        Cow::Borrowed(text) => Cow::Borrowed(&text[range]),
        Cow::Owned(text) => Cow::Owned(text[range].to_string()),
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Splits a string value into literal and variable pieces.
///
/// Returns `None` when the value contains no `${…}` segment at all.
fn split<'base>(node: &StrExpr<'base>) -> Result<Option<Vec<Piece<'base>>>, CompileError> {
    let value = node.value.as_ref();
    if !value.contains("${") {
        return Ok(None);
    }

    let mut pieces = Vec::new();
    let mut rest = 0usize;

    while let Some(offset) = value[rest..].find("${") {
        let start = rest + offset;
        if start > rest {
            pieces.push(Piece::Lit(slice(&node.value, rest..start)));
        }

        let Some(len) = value[start + 2..].find('}') else {
            return Err(CompileError::bad_interpolation(
                "unterminated '${' segment",
                node.span.to_range(),
                node.span.state.file.clone(),
            ));
        };

        let name_range = start + 2..start + 2 + len;
        let name = &value[name_range.clone()];
        if name.is_empty() || !name.chars().all(is_name_char) || name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(CompileError::bad_interpolation(
                format!("'{name}' is not a variable name"),
                node.span.to_range(),
                node.span.state.file.clone(),
            ));
        }

        pieces.push(Piece::Var(slice(&node.value, name_range)));
        rest = start + 2 + len + 1;
    }

    if rest < value.len() {
        pieces.push(Piece::Lit(slice(&node.value, rest..value.len())));
    }

    Ok(Some(pieces))
}

/// Builds the replacement expression for an interpolated string literal
fn expand<'base>(node: &StrExpr<'base>, pieces: Vec<Piece<'base>>, indexer: &Arc<AtomicUsize>) -> Rc<Expr<'base>> {
    let piece_expr = |piece: Piece<'base>| -> Rc<Expr<'base>> {
        match piece {
            Piece::Lit(value) => Rc::new(Expr::Str(StrExpr {
                id: next_id(indexer),
                span: node.span.clone(),
                value,
            })),
            Piece::Var(name) => Rc::new(Expr::Var(VarExpr {
                id: next_id(indexer),
                span: node.span.clone(),
                name,
            })),
        }
    };

    let mut pieces = pieces.into_iter();
    let mut acc = piece_expr(pieces.next().expect("split never returns an empty piece list"));

    for piece in pieces {
        let id = next_id(indexer);
        acc = Rc::new(Expr::Call(CallExpr {
            id,
            span: node.span.clone(),
            name: Cow::Borrowed("concat"),
            args: vec![acc, piece_expr(piece)],
            is_var: false,
            orig: id,
        }));
    }

    acc
}

/// Interpolates an expression, returning the original `Rc` when nothing
/// inside it changed
pub fn interpolate_expr<'base>(expr: &Rc<Expr<'base>>, indexer: &Arc<AtomicUsize>) -> Result<Rc<Expr<'base>>, CompileError> {
    match expr.as_ref() {
        Expr::Str(node) => match split(node)? {
            Some(pieces) => Ok(expand(node, pieces, indexer)),
            None => Ok(expr.clone()),
        },
        Expr::Bool(_) | Expr::Int(_) | Expr::Float(_) | Expr::Var(_) | Expr::Any(_) => Ok(expr.clone()),
        Expr::List(node) => {
            let elems = node.elems.iter().map(|elem| interpolate_expr(elem, indexer)).collect::<Result<Vec<_>, _>>()?;
            if elems.iter().zip(node.elems.iter()).all(|(new, old)| Rc::ptr_eq(new, old)) {
                return Ok(expr.clone());
            }
            Ok(Rc::new(Expr::List(ListExpr { id: node.id, span: node.span.clone(), elems })))
        }
        Expr::Map(node) => {
            let mut changed = false;
            let mut entries = Vec::with_capacity(node.entries.len());
            for (key, val) in node.entries.iter() {
                let new_key = interpolate_expr(key, indexer)?;
                let new_val = interpolate_expr(val, indexer)?;
                changed |= !Rc::ptr_eq(&new_key, key) || !Rc::ptr_eq(&new_val, val);
                entries.push((new_key, new_val));
            }
            if !changed {
                return Ok(expr.clone());
            }
            Ok(Rc::new(Expr::Map(MapExpr { id: node.id, span: node.span.clone(), entries })))
        }
        Expr::Struct(node) => {
            let mut changed = false;
            let mut fields = Vec::with_capacity(node.fields.len());
            for (name, field) in node.fields.iter() {
                let new_field = interpolate_expr(field, indexer)?;
                changed |= !Rc::ptr_eq(&new_field, field);
                fields.push((name.clone(), new_field));
            }
            if !changed {
                return Ok(expr.clone());
            }
            Ok(Rc::new(Expr::Struct(StructExpr { id: node.id, span: node.span.clone(), fields })))
        }
        Expr::Func(node) => match &node.kind {
            FuncKind::Body(body) => {
                let new_body = interpolate_expr(body, indexer)?;
                if Rc::ptr_eq(&new_body, body) {
                    return Ok(expr.clone());
                }
                Ok(Rc::new(Expr::Func(FuncExpr {
                    id: node.id,
                    span: node.span.clone(),
                    title: node.title.clone(),
                    params: node.params.clone(),
                    ret: node.ret.clone(),
                    kind: FuncKind::Body(new_body),
                })))
            }
            _ => Ok(expr.clone()),
        },
        Expr::Call(node) => {
            let args = node.args.iter().map(|arg| interpolate_expr(arg, indexer)).collect::<Result<Vec<_>, _>>()?;
            if args.iter().zip(node.args.iter()).all(|(new, old)| Rc::ptr_eq(new, old)) {
                return Ok(expr.clone());
            }
            Ok(Rc::new(Expr::Call(CallExpr {
                id: node.id,
                span: node.span.clone(),
                name: node.name.clone(),
                args,
                is_var: node.is_var,
                orig: node.orig,
            })))
        }
        Expr::If(node) => {
            let cond = interpolate_expr(&node.cond, indexer)?;
            let then = interpolate_expr(&node.then, indexer)?;
            let els = interpolate_expr(&node.els, indexer)?;
            if Rc::ptr_eq(&cond, &node.cond) && Rc::ptr_eq(&then, &node.then) && Rc::ptr_eq(&els, &node.els) {
                return Ok(expr.clone());
            }
            Ok(Rc::new(Expr::If(IfExpr { id: node.id, span: node.span.clone(), cond, then, els })))
        }
    }
}

fn interpolate_half<'base>(half: &EdgeHalf<'base>, indexer: &Arc<AtomicUsize>) -> Result<EdgeHalf<'base>, CompileError> {
    Ok(EdgeHalf {
        kind: half.kind.clone(),
        name: interpolate_expr(&half.name, indexer)?,
        field: half.field.clone(),
    })
}

fn interpolate_opt<'base>(cond: &Option<Rc<Expr<'base>>>, indexer: &Arc<AtomicUsize>) -> Result<Option<Rc<Expr<'base>>>, CompileError> {
    cond.as_ref().map(|cond| interpolate_expr(cond, indexer)).transpose()
}

/// Interpolates a statement
pub fn interpolate_stmt<'base>(stmt: &Stmt<'base>, indexer: &Arc<AtomicUsize>) -> Result<Stmt<'base>, CompileError> {
    Ok(match stmt {
        Stmt::Bind(bind) => Stmt::Bind(BindStmt {
            id: bind.id,
            name: bind.name.clone(),
            expr: interpolate_expr(&bind.expr, indexer)?,
        }),
        Stmt::Func(func_stmt) => Stmt::Func(FuncStmt {
            id: func_stmt.id,
            name: func_stmt.name.clone(),
            func: interpolate_expr(&func_stmt.func, indexer)?,
        }),
        Stmt::Class(class) => Stmt::Class(ClassStmt {
            id: class.id,
            name: class.name.clone(),
            params: class.params.clone(),
            body: Rc::new(interpolate_prog(&class.body, indexer)?),
        }),
        Stmt::Include(include) => Stmt::Include(IncludeStmt {
            id: include.id,
            name: include.name.clone(),
            args: include.args.iter().map(|arg| interpolate_expr(arg, indexer)).collect::<Result<Vec<_>, _>>()?,
            orig: include.orig,
        }),
        Stmt::Import(import) => Stmt::Import(import.clone()),
        Stmt::If(if_stmt) => Stmt::If(IfStmt {
            id: if_stmt.id,
            cond: interpolate_expr(&if_stmt.cond, indexer)?,
            then: if_stmt.then.as_ref().map(|block| interpolate_prog(block, indexer).map(Rc::new)).transpose()?,
            els: if_stmt.els.as_ref().map(|block| interpolate_prog(block, indexer).map(Rc::new)).transpose()?,
        }),
        Stmt::Res(res) => {
            let mut contents = Vec::with_capacity(res.contents.len());
            for content in res.contents.iter() {
                contents.push(match content {
                    ResContent::Field(field) => ResContent::Field(ResField {
                        field: field.field.clone(),
                        value: interpolate_expr(&field.value, indexer)?,
                        cond: interpolate_opt(&field.cond, indexer)?,
                    }),
                    ResContent::Edge(edge) => ResContent::Edge(ResEdge {
                        property: edge.property,
                        half: interpolate_half(&edge.half, indexer)?,
                        cond: interpolate_opt(&edge.cond, indexer)?,
                    }),
                    ResContent::Meta(meta) => ResContent::Meta(ResMeta {
                        property: meta.property.clone(),
                        value: interpolate_expr(&meta.value, indexer)?,
                        cond: interpolate_opt(&meta.cond, indexer)?,
                    }),
                });
            }
            Stmt::Res(ResStmt {
                id: res.id,
                kind: res.kind.clone(),
                name: interpolate_expr(&res.name, indexer)?,
                contents,
            })
        }
        Stmt::Edge(edge) => Stmt::Edge(EdgeStmt {
            id: edge.id,
            halves: edge.halves.iter().map(|half| interpolate_half(half, indexer)).collect::<Result<Vec<_>, _>>()?,
            notify: edge.notify,
        }),
    })
}

/// Interpolates a whole program
pub fn interpolate_prog<'base>(prog: &Prog<'base>, indexer: &Arc<AtomicUsize>) -> Result<Prog<'base>, CompileError> {
    Ok(Prog {
        id: prog.id,
        stmts: prog.stmts.iter().map(|stmt| interpolate_stmt(stmt, indexer)).collect::<Result<Vec<_>, _>>()?,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{ast::{Expr, Stmt}, file::SourceFile, nom_tools::State, parser};

    use super::interpolate_prog;

    fn interpolated_bind(code: &str) -> String {
        let state = State::new(SourceFile::new(vec!["<memory>".into()], code.to_string()));
        let (_, prog) = parser::parse(&state).unwrap_or_else(|error| panic!("{code}: {error}"));
        let prog = interpolate_prog(&prog, &state.indexer).unwrap();
        match &prog.stmts[0] {
            Stmt::Bind(bind) => bind.expr.to_string(),
            _ => panic!("expected a bind statement"),
        }
    }

    #[test]
    fn plain_strings_are_untouched() {
        assert_eq!(interpolated_bind(r#"$a = "hello""#), r#""hello""#);
    }

    #[test]
    fn single_variable_expands_to_a_var() {
        assert_eq!(interpolated_bind(r#"$a = "${x}""#), "$x");
    }

    #[test]
    fn mixed_segments_fold_into_concat_calls() {
        assert_eq!(
            interpolated_bind(r#"$a = "hello ${who}!""#),
            r#"concat(concat("hello ", $who), "!")"#
        );
    }

    #[test]
    fn dotted_names_are_allowed() {
        assert_eq!(interpolated_bind(r#"$a = "${mod.x}""#), "$mod.x");
    }

    #[test]
    fn interpolation_is_idempotent() {
        let code = r#"$a = "pre ${x} post""#;
        let state = State::new(SourceFile::new(vec!["<memory>".into()], code.to_string()));
        let (_, prog) = parser::parse(&state).unwrap();

        let once = interpolate_prog(&prog, &state.indexer).unwrap();
        let twice = interpolate_prog(&once, &state.indexer).unwrap();

        let as_text = |prog: &crate::ast::Prog| match &prog.stmts[0] {
            Stmt::Bind(bind) => bind.expr.to_string(),
            _ => panic!("expected a bind statement"),
        };
        assert_eq!(as_text(&once), as_text(&twice));
    }

    #[test]
    fn unterminated_segment_is_rejected() {
        let code = r#"$a = "${x""#;
        let state = State::new(SourceFile::new(vec!["<memory>".into()], code.to_string()));
        let (_, prog) = parser::parse(&state).unwrap();
        assert!(interpolate_prog(&prog, &state.indexer).is_err());
    }

    #[test]
    fn sharing_is_kept_for_untouched_subtrees() {
        let code = r#"$a = [1, 2, 3]"#;
        let state = State::new(SourceFile::new(vec!["<memory>".into()], code.to_string()));
        let (_, prog) = parser::parse(&state).unwrap();
        let interpolated = interpolate_prog(&prog, &state.indexer).unwrap();

        let original = match &prog.stmts[0] {
            Stmt::Bind(bind) => bind.expr.clone(),
            _ => panic!("expected a bind statement"),
        };
        let rewritten = match &interpolated.stmts[0] {
            Stmt::Bind(bind) => bind.expr.clone(),
            _ => panic!("expected a bind statement"),
        };
        assert!(std::rc::Rc::ptr_eq(&original, &rewritten));
        assert!(matches!(rewritten.as_ref(), Expr::List(_)));
    }
}
