//! Dependency ordering of program statements.
//!
//! Statements in a program block appear in arbitrary textual order; this
//! pass discovers a correct resolution order and rejects cycles. Producers
//! (bind, func, class) are identified by prefixed tokens (`var:<name>`,
//! `func:<name>`, `class:<name>`); consumers (variable references, calls,
//! includes) consume the same tokens. Within one block a local producer
//! shadows any inherited one, so a statement that consumes its own token is
//! a recursive reference.
//!
//! The pass also marks the statements reachable from the block's
//! output-producing statements; producers nothing consumes are skipped by
//! scope resolution, which is the compiler's dead-code elimination.

use indexmap::{IndexMap, IndexSet};
use log::debug;

use crate::{
    ast::{Expr, FuncKind, NodeId, Prog, Stmt},
    compile::error::CompileError,
    nom_tools::{Span, ToRange},
};

/// The result of ordering one program block.
#[derive(Debug)]
pub struct ProgOrdering {
    /// Statement indices in a valid resolution order
    pub order: Vec<usize>,
    /// Ids of statements reachable from the block's outputs
    pub active: IndexSet<NodeId>,
}

/// Collects the tokens consumed by an expression into `out`.
///
/// Lambda bodies subtract their own parameters: those resolve through the
/// positional-argument stack, not the enclosing block.
fn expr_tokens(expr: &Expr<'_>, out: &mut IndexSet<String>) {
    match expr {
        Expr::Bool(_) | Expr::Int(_) | Expr::Float(_) | Expr::Str(_) | Expr::Any(_) => {}
        Expr::Var(node) => {
            out.insert(format!("var:{}", node.name));
        }
        Expr::Call(node) => {
            if node.is_var {
                out.insert(format!("var:{}", node.name));
            } else {
                out.insert(format!("func:{}", node.name));
            }
            for arg in node.args.iter() {
                expr_tokens(arg, out);
            }
        }
        Expr::Func(node) => {
            if let FuncKind::Body(body) = &node.kind {
                let mut inner = IndexSet::new();
                expr_tokens(body, &mut inner);
                for param in node.params.iter() {
                    inner.shift_remove(&format!("var:{}", param.name.text));
                }
                out.extend(inner);
            }
        }
        Expr::List(node) => {
            for elem in node.elems.iter() {
                expr_tokens(elem, out);
            }
        }
        Expr::Map(node) => {
            for (key, val) in node.entries.iter() {
                expr_tokens(key, out);
                expr_tokens(val, out);
            }
        }
        Expr::Struct(node) => {
            for (_, field) in node.fields.iter() {
                expr_tokens(field, out);
            }
        }
        Expr::If(node) => {
            expr_tokens(&node.cond, out);
            expr_tokens(&node.then, out);
            expr_tokens(&node.els, out);
        }
    }
}

/// Returns the token a statement produces, if any
fn produced_token<'a>(stmt: &'a Stmt<'a>) -> Option<(String, Span<'a>)> {
    match stmt {
        Stmt::Bind(bind) => Some((format!("var:{}", bind.name.text), bind.name.clone())),
        Stmt::Func(func_stmt) => Some((format!("func:{}", func_stmt.name.text), func_stmt.name.clone())),
        Stmt::Class(class) => Some((format!("class:{}", class.name.text), class.name.clone())),
        _ => None,
    }
}

/// Collects the tokens a nested block consumes from outside itself
fn prog_tokens(prog: &Prog<'_>, out: &mut IndexSet<String>) {
    let mut inner = IndexSet::new();
    for stmt in prog.stmts.iter() {
        stmt_tokens(stmt, &mut inner);
    }
    for stmt in prog.stmts.iter() {
        if let Some((token, _)) = produced_token(stmt) {
            inner.shift_remove(&token);
        }
    }
    out.extend(inner);
}

/// Collects the tokens a statement consumes
fn stmt_tokens(stmt: &Stmt<'_>, out: &mut IndexSet<String>) {
    match stmt {
        Stmt::Bind(bind) => expr_tokens(&bind.expr, out),
        Stmt::Func(func_stmt) => expr_tokens(&func_stmt.func, out),
        Stmt::Class(class) => {
            let mut inner = IndexSet::new();
            prog_tokens(&class.body, &mut inner);
            for param in class.params.iter() {
                inner.shift_remove(&format!("var:{}", param.text));
            }
            out.extend(inner);
        }
        Stmt::Include(include) => {
            out.insert(format!("class:{}", include.name.text));
            for arg in include.args.iter() {
                expr_tokens(arg, out);
            }
        }
        Stmt::Import(_) => {}
        Stmt::If(if_stmt) => {
            expr_tokens(&if_stmt.cond, out);
            if let Some(block) = &if_stmt.then {
                prog_tokens(block, out);
            }
            if let Some(block) = &if_stmt.els {
                prog_tokens(block, out);
            }
        }
        Stmt::Res(_) | Stmt::Edge(_) => {
            stmt.apply_exprs(&mut |expr| expr_tokens(expr, out));
        }
    }
}

/// Orders one program block and marks its reachable statements.
pub fn order_prog(prog: &Prog<'_>) -> Result<ProgOrdering, CompileError> {
    // collect local producers; duplicates within one block are rejected
    let mut producers: IndexMap<String, (usize, Span<'_>)> = IndexMap::new();
    for (index, stmt) in prog.stmts.iter().enumerate() {
        if let Some((token, span)) = produced_token(stmt) {
            if let Some((_, old_span)) = producers.get(&token) {
                return Err(CompileError::already_defined(
                    span.to_range(),
                    old_span.to_range(),
                    span.state.file.clone(),
                ));
            }
            producers.insert(token, (index, span));
        }
    }

    // producer → consumers edges for tokens bound in this block
    let count = prog.stmts.len();
    let mut edges: Vec<IndexSet<usize>> = vec![IndexSet::new(); count];
    let mut indegree = vec![0usize; count];
    let mut consumed_from: Vec<IndexSet<usize>> = vec![IndexSet::new(); count];

    for (index, stmt) in prog.stmts.iter().enumerate() {
        let mut consumed = IndexSet::new();
        stmt_tokens(stmt, &mut consumed);

        for token in consumed.iter() {
            if let Some((producer, _)) = producers.get(token) {
                if edges[*producer].insert(index) {
                    indegree[index] += 1;
                    consumed_from[index].insert(*producer);
                }
            }
        }
    }

    // deterministic Kahn sort in statement order
    let mut ready: Vec<usize> = (0..count).filter(|index| indegree[*index] == 0).collect();
    let mut order = Vec::with_capacity(count);
    while let Some(index) = ready.first().copied() {
        ready.remove(0);
        order.push(index);
        for next in edges[index].iter() {
            indegree[*next] -= 1;
            if indegree[*next] == 0 {
                ready.push(*next);
            }
        }
        ready.sort_unstable();
    }

    if order.len() != count {
        // everything still carrying an indegree sits on or behind a cycle
        let cycle: Vec<usize> = (0..count).filter(|index| !order.contains(index)).collect();
        let names: Vec<String> = cycle
            .iter()
            .filter_map(|index| produced_token(&prog.stmts[*index]))
            .map(|(token, _)| token.split(':').nth(1).unwrap_or_default().to_string())
            .collect();
        let span = cycle
            .iter()
            .find_map(|index| produced_token(&prog.stmts[*index]).map(|(_, span)| span))
            .expect("a cycle always involves a producer");

        debug!("ordering cycle over {names:?}");
        return Err(CompileError::recursive_reference(
            names.join(", "),
            span.to_range(),
            span.state.file.clone(),
        ));
    }

    // reachability from output statements; unconsumed producers are dead
    let mut active_indices: IndexSet<usize> = IndexSet::new();
    let mut queue: Vec<usize> = (0..count)
        .filter(|index| !matches!(prog.stmts[*index], Stmt::Bind(_) | Stmt::Func(_) | Stmt::Class(_)))
        .collect();
    while let Some(index) = queue.pop() {
        if active_indices.insert(index) {
            queue.extend(consumed_from[index].iter().copied());
        }
    }

    let active = active_indices.into_iter().map(|index| prog.stmts[index].id()).collect();

    Ok(ProgOrdering { order, active })
}

#[cfg(test)]
mod tests {
    use crate::{ast::Stmt, compile::error::{CompileError, Stage}, file::SourceFile, nom_tools::State, parser};

    use super::order_prog;

    fn order_source(code: &str) -> Result<Vec<usize>, CompileError> {
        let state = State::new(SourceFile::new(vec!["<memory>".into()], code.to_string()));
        let (_, prog) = parser::parse(&state).unwrap_or_else(|error| panic!("{code}: {error}"));
        order_prog(&prog).map(|ordering| ordering.order)
    }

    #[test]
    fn chained_binds_order_by_dependency() {
        // $c depends on $b depends on $a, textual order reversed
        let order = order_source("$c = $b\n$b = $a\n$a = 42").unwrap();
        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let error = order_source("$x = $y\n$y = $x").unwrap_err();
        assert_eq!(error.stage(), Stage::SetScope);
        assert!(matches!(error, CompileError::RecursiveReference(_)));
    }

    #[test]
    fn duplicate_binding_is_rejected() {
        let error = order_source("$x = 1\n$x = 2").unwrap_err();
        assert!(matches!(error, CompileError::AlreadyDefined(_)));
    }

    #[test]
    fn duplicate_function_names_are_rejected() {
        // overloaded user-defined functions are reserved
        let error = order_source("func f($a) { $a }\nfunc f($a, $b) { $a }").unwrap_err();
        assert!(matches!(error, CompileError::AlreadyDefined(_)));
    }

    #[test]
    fn unconsumed_producers_are_inactive() {
        let code = "$unused = 1\n$used = 2\ntest \"t\" { int64ptr => $used, }";
        let state = State::new(SourceFile::new(vec!["<memory>".into()], code.to_string()));
        let (_, prog) = parser::parse(&state).unwrap();
        let ordering = order_prog(&prog).unwrap();

        let used_id = prog.stmts[1].id();
        let unused_id = prog.stmts[0].id();
        let res_id = prog.stmts[2].id();
        assert!(ordering.active.contains(&used_id));
        assert!(ordering.active.contains(&res_id));
        assert!(!ordering.active.contains(&unused_id));
    }

    #[test]
    fn class_bodies_propagate_their_consumption() {
        let code = "$x = 1\nclass c { test \"t\" { int64ptr => $x, } }\ninclude c";
        let state = State::new(SourceFile::new(vec!["<memory>".into()], code.to_string()));
        let (_, prog) = parser::parse(&state).unwrap();
        let ordering = order_prog(&prog).unwrap();

        // the include consumes the class, which consumes $x
        assert_eq!(ordering.order, vec![0, 1, 2]);
        let bind_id = prog.stmts[0].id();
        assert!(ordering.active.contains(&bind_id));
    }

    #[test]
    fn nested_shadowing_does_not_leak_consumption() {
        // the inner block rebinds $x, so the outer $x is never consumed
        let code = "$x = \"hello\"\nif true { $x = \"world\"\ntest \"t\" { stringptr => $x, } }";
        let state = State::new(SourceFile::new(vec!["<memory>".into()], code.to_string()));
        let (_, prog) = parser::parse(&state).unwrap();
        let ordering = order_prog(&prog).unwrap();

        let outer_bind = prog.stmts[0].id();
        assert!(!ordering.active.contains(&outer_bind));
    }

    #[test]
    fn include_waits_for_its_class() {
        let order = order_source("include c\nclass c { }").unwrap();
        assert_eq!(order, vec![1, 0]);
    }
}
