//! Structural validation of the AST, run before interpolation.
//!
//! Init walks the tree and rejects nodes that are syntactically valid but
//! structurally malformed: duplicate function parameters, metaparameter
//! entries naming unknown properties, and send/recv fields on edge chains
//! longer than two halves. Every violation is fatal for the stage.

use indexmap::IndexSet;

use crate::{
    ast::{Expr, FuncKind, Prog, ResContent, Stmt},
    compile::error::CompileError,
    interpret::meta::is_meta_property,
    nom_tools::ToRange,
};

/// Validates a whole program
pub fn init_prog(prog: &Prog<'_>) -> Result<(), CompileError> {
    for stmt in prog.stmts.iter() {
        init_stmt(stmt)?;
    }
    Ok(())
}

fn init_stmt(stmt: &Stmt<'_>) -> Result<(), CompileError> {
    match stmt {
        Stmt::Bind(bind) => init_expr(&bind.expr),
        Stmt::Func(func_stmt) => init_expr(&func_stmt.func),
        Stmt::Class(class) => {
            let mut seen = IndexSet::new();
            for param in class.params.iter() {
                if !seen.insert(param.text) {
                    return Err(CompileError::invalid_node(
                        format!("duplicate class parameter '${}'", param.text),
                        param.to_range(),
                        param.state.file.clone(),
                    ));
                }
            }
            init_prog(&class.body)
        }
        Stmt::Include(include) => {
            for arg in include.args.iter() {
                init_expr(arg)?;
            }
            Ok(())
        }
        Stmt::Import(_) => Ok(()),
        Stmt::If(if_stmt) => {
            init_expr(&if_stmt.cond)?;
            if let Some(block) = &if_stmt.then {
                init_prog(block)?;
            }
            if let Some(block) = &if_stmt.els {
                init_prog(block)?;
            }
            Ok(())
        }
        Stmt::Res(res) => {
            init_expr(&res.name)?;
            for content in res.contents.iter() {
                match content {
                    ResContent::Field(field) => {
                        init_expr(&field.value)?;
                        if let Some(cond) = &field.cond {
                            init_expr(cond)?;
                        }
                    }
                    ResContent::Edge(edge) => {
                        init_expr(&edge.half.name)?;
                        if let Some(span) = &edge.half.field {
                            return Err(CompileError::invalid_node(
                                "send/recv fields are not allowed on resource body edges",
                                span.to_range(),
                                span.state.file.clone(),
                            ));
                        }
                        if let Some(cond) = &edge.cond {
                            init_expr(cond)?;
                        }
                    }
                    ResContent::Meta(meta) => {
                        if !is_meta_property(meta.property.text) && meta.property.text != "meta" {
                            return Err(CompileError::invalid_node(
                                format!("unknown metaparameter '{}'", meta.property.text),
                                meta.property.to_range(),
                                meta.property.state.file.clone(),
                            ));
                        }
                        init_expr(&meta.value)?;
                        if let Some(cond) = &meta.cond {
                            init_expr(cond)?;
                        }
                    }
                }
            }
            Ok(())
        }
        Stmt::Edge(edge) => {
            for half in edge.halves.iter() {
                init_expr(&half.name)?;
            }
            let carrying = edge.halves.iter().filter(|half| half.field.is_some()).count();
            if carrying > 0 && edge.halves.len() != 2 {
                let span = edge.halves[0].kind.clone();
                return Err(CompileError::invalid_node(
                    "send/recv fields require a chain of exactly two halves",
                    span.to_range(),
                    span.state.file.clone(),
                ));
            }
            Ok(())
        }
    }
}

fn init_expr(expr: &Expr<'_>) -> Result<(), CompileError> {
    let mut failure = None;
    expr.apply(&mut |node| {
        if failure.is_some() {
            return;
        }
        if let Expr::Func(func) = node {
            let mut seen = IndexSet::new();
            for param in func.params.iter() {
                if !seen.insert(param.name.text) {
                    failure = Some(CompileError::invalid_node(
                        format!("duplicate parameter '${}'", param.name.text),
                        param.name.to_range(),
                        param.name.state.file.clone(),
                    ));
                    return;
                }
            }
            // a function body cannot be another bare function expression
            if let FuncKind::Body(body) = &func.kind {
                if matches!(body.as_ref(), Expr::Func(_)) {
                    failure = Some(CompileError::invalid_node(
                        "function body must produce a value",
                        func.span.to_range(),
                        func.span.state.file.clone(),
                    ));
                }
            }
        }
    });

    match failure {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
