//! Type unification.
//!
//! The unify stage runs after scope resolution: every node contributes
//! [`invariant::Invariant`]s relating its type to its neighbors'
//! ([`collect`]), and a pluggable [`solver::Solver`] turns the collected
//! list into a total assignment of concrete types. On success every active
//! expression has exactly one non-`Variant` type recorded in the compile
//! context; on failure nothing is recorded at all.

use crate::{
    ast::Prog,
    compile::{context::CompileContext, error::CompileError},
};

mod collect;
pub mod invariant;
pub mod solver;

pub use solver::{SimpleSolver, Solver};

/// Unifies the compilation with the default solver
pub fn unify<'base>(ctx: &mut CompileContext<'base>, root: &Prog<'base>) -> Result<(), CompileError> {
    unify_with(ctx, root, &SimpleSolver)
}

/// Unifies the compilation with the given solver
pub fn unify_with<'base>(
    ctx: &mut CompileContext<'base>,
    root: &Prog<'base>,
    solver: &dyn Solver,
) -> Result<(), CompileError> {
    let invariants = collect::collect(ctx, root)?;
    let assignments = solver.solve(invariants)?;
    ctx.node_types.extend(assignments);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::{
        ast::Stmt,
        compile::{
            context::CompileContext,
            error::{CompileError, Stage},
            interpolate::interpolate_prog,
            resolver::{set_scope, ModuleSet},
        },
        file::SourceFile,
        nom_tools::State,
        parser,
        types::Type,
    };

    use super::unify;

    fn unified(code: &str) -> Result<(CompileContext<'static>, Rc<crate::ast::Prog<'static>>), CompileError> {
        let state: &'static State = Box::leak(Box::new(State::new(SourceFile::new(
            vec!["<memory>".into()],
            code.to_string(),
        ))));
        let (_, prog) = parser::parse(state).unwrap_or_else(|error| panic!("{code}: {error}"));
        let prog = Rc::new(interpolate_prog(&prog, &state.indexer)?);

        let mut ctx = CompileContext::new(state.indexer.clone());
        let modules = ModuleSet::single(prog.clone());
        set_scope(&mut ctx, &modules)?;
        unify(&mut ctx, &prog)?;
        Ok((ctx, prog))
    }

    fn first_bind_type(ctx: &CompileContext<'_>, prog: &crate::ast::Prog<'_>) -> Type {
        match &prog.stmts[0] {
            Stmt::Bind(bind) => ctx.type_of(bind.expr.id()).cloned().expect("bind expression is typed"),
            _ => panic!("expected a bind statement"),
        }
    }

    #[test]
    fn literal_types_solve() {
        let (ctx, prog) = unified("$a = 42\ntest \"t\" { int64ptr => $a, }").unwrap();
        assert_eq!(first_bind_type(&ctx, &prog), Type::Int);
    }

    #[test]
    fn operator_overload_commits_by_operands() {
        let (ctx, prog) = unified("$a = 42 + 13\ntest \"t\" { int64ptr => $a, }").unwrap();
        assert_eq!(first_bind_type(&ctx, &prog), Type::Int);
    }

    #[test]
    fn string_concatenation_uses_the_str_overload() {
        let (ctx, prog) = unified("$a = \"x\" + \"y\"\ntest \"t\" { stringptr => $a, }").unwrap();
        assert_eq!(first_bind_type(&ctx, &prog), Type::Str);
    }

    #[test]
    fn comparison_yields_bool() {
        let (ctx, prog) = unified("$a = 1 < 2\ntest \"t\" { boolptr => $a, }").unwrap();
        assert_eq!(first_bind_type(&ctx, &prog), Type::Bool);
    }

    #[test]
    fn mixed_operands_have_no_signature() {
        let error = unified("$a = 1 + \"x\"\ntest \"t\" { int64ptr => $a, }").unwrap_err();
        assert_eq!(error.stage(), Stage::Unify);
    }

    #[test]
    fn empty_list_solves_from_field_context() {
        let (ctx, prog) = unified("$a = []\ntest \"t\" { onlyshow => $a, }").unwrap();
        assert_eq!(first_bind_type(&ctx, &prog), Type::list(Type::Str));
    }

    #[test]
    fn unconstrained_empty_list_fails() {
        let error = unified("$a = []\ntest \"t\" { int64ptr => len($a), }").unwrap_err();
        assert_eq!(error.stage(), Stage::Unify);
    }

    #[test]
    fn if_expression_branches_must_agree() {
        let error = unified("$a = if true { 1 } else { \"x\" }\ntest \"t\" { int64ptr => $a, }").unwrap_err();
        assert_eq!(error.stage(), Stage::Unify);
    }

    #[test]
    fn call_sites_instantiate_their_own_types() {
        // the same function used at int and str types
        let code = "func id($x) { $x }\n$a = id(42)\n$b = id(\"s\")\ntest \"t\" { int64ptr => $a, stringptr => $b, }";
        let (ctx, prog) = unified(code).unwrap();
        assert_eq!(first_bind_type(&ctx, &prog), Type::Int);
        let _ = prog;
    }

    #[test]
    fn field_type_mismatch_fails() {
        let error = unified("test \"t\" { stringptr => 42, }").unwrap_err();
        assert_eq!(error.stage(), Stage::Unify);
    }

    #[test]
    fn len_is_polymorphic() {
        let (ctx, prog) = unified("$a = len([1, 2, 3])\ntest \"t\" { int64ptr => $a, }").unwrap();
        assert_eq!(first_bind_type(&ctx, &prog), Type::Int);

        let (ctx, prog) = unified("$a = len(\"abc\")\ntest \"t\" { int64ptr => $a, }").unwrap();
        assert_eq!(first_bind_type(&ctx, &prog), Type::Int);
    }

    #[test]
    fn res_name_accepts_str_or_list() {
        unified("test \"t\" { }").unwrap();
        unified("test [\"a\", \"b\"] { }").unwrap();
        let error = unified("test 42 { }").unwrap_err();
        assert_eq!(error.stage(), Stage::Unify);
    }

    #[test]
    fn expression_types_match_expression_values() {
        // type totality: every active expression node is concretely typed
        let (ctx, prog) = unified("$c = $b\n$b = $a\n$a = 42\ntest \"t\" { int64ptr => $c, }").unwrap();
        let mut checked = 0;
        for stmt in prog.stmts.iter() {
            if !ctx.active.contains(&stmt.id()) {
                continue;
            }
            stmt.apply_exprs(&mut |expr| {
                expr.apply(&mut |node| {
                    if let Some(ty) = ctx.type_of(node.id()) {
                        assert!(!ty.has_variant(), "{node} has a variant type");
                        checked += 1;
                    }
                });
            });
        }
        assert!(checked > 0);
    }

    #[test]
    fn send_recv_types_must_match() {
        let code = "test \"t1\" { }\ntest \"t2\" { }\nTest[\"t1\"].hello -> Test[\"t2\"].stringptr";
        unified(code).unwrap();

        let bad = "test \"t1\" { }\ntest \"t2\" { }\nTest[\"t1\"].hello -> Test[\"t2\"].int64ptr";
        let error = unified(bad).unwrap_err();
        assert_eq!(error.stage(), Stage::Unify);
    }

    #[test]
    fn send_recv_on_one_half_only_fails() {
        let code = "test \"t1\" { }\ntest \"t2\" { }\nTest[\"t1\"].hello -> Test[\"t2\"]";
        let error = unified(code).unwrap_err();
        assert!(matches!(error, CompileError::SendRecvMismatch(_)));
    }

    #[test]
    fn copies_are_isolated_between_use_sites() {
        // mutating one use-site's types must not leak into the other:
        // each include instantiates the class body at a different type
        let code = "class c($v) { test \"t${n}\" { } }\n$n = \"x\"\ninclude c(1)\ninclude c(\"two\")";
        let (ctx, _) = unified(code).unwrap();
        assert_eq!(ctx.include_instances.len(), 2);
    }
}
