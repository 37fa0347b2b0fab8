//! Interpretation: producing the resource graph.
//!
//! Once the streaming engine has delivered a value-table snapshot for every
//! function-graph vertex, the interpreter walks the scope-resolved program
//! and emits resources and edges. Conditional contents whose guard
//! evaluates false are skipped; resource name expressions fan out over
//! lists; metaparameters apply aggregate-first so individual assignments
//! override; and every value is re-checked against the resource kind's
//! declared field types with numeric range checks.

use indexmap::IndexMap;

use crate::{
    ast::{EdgeProp, Expr, NodeId, Prog, ResContent, Stmt},
    compile::{context::CompileContext, error::CompileError},
    engine::resources,
    graph::resource::{Resource, ResourceEdge, ResourceGraph},
    nom_tools::ToRange,
    types::Value,
};

pub mod meta;

/// The value-table snapshot keyed by function-vertex identity
pub type ValueTable = IndexMap<NodeId, Value>;

/// Interprets a compiled program against a value-table snapshot
pub fn interpret<'base>(
    ctx: &CompileContext<'base>,
    root: &Prog<'base>,
    table: &ValueTable,
) -> Result<ResourceGraph, CompileError> {
    let mut rg = ResourceGraph::new();
    interpret_prog(ctx, root, table, &mut rg)?;
    Ok(rg)
}

fn value_of<'base>(table: &ValueTable, expr: &std::rc::Rc<Expr<'base>>) -> Result<Value, CompileError> {
    table.get(&expr.id()).cloned().ok_or_else(|| {
        let span = expr.span();
        CompileError::missing_value(span.to_range(), span.state.file.clone())
    })
}

/// Evaluates an optional guard; absent guards hold
fn guard_holds<'base>(
    table: &ValueTable,
    cond: &Option<std::rc::Rc<Expr<'base>>>,
) -> Result<bool, CompileError> {
    let Some(cond) = cond else {
        return Ok(true);
    };
    let value = value_of(table, cond)?;
    value.as_bool().ok_or_else(|| {
        let span = cond.span();
        CompileError::value_type_mismatch(
            "condition",
            "bool",
            value.r#type().to_string(),
            span.to_range(),
            span.state.file.clone(),
        )
    })
}

fn interpret_prog<'base>(
    ctx: &CompileContext<'base>,
    prog: &Prog<'base>,
    table: &ValueTable,
    rg: &mut ResourceGraph,
) -> Result<(), CompileError> {
    for stmt in prog.stmts.iter() {
        if !ctx.active.contains(&stmt.id()) {
            continue;
        }
        interpret_stmt(ctx, stmt, table, rg)?;
    }
    Ok(())
}

fn interpret_stmt<'base>(
    ctx: &CompileContext<'base>,
    stmt: &Stmt<'base>,
    table: &ValueTable,
    rg: &mut ResourceGraph,
) -> Result<(), CompileError> {
    match stmt {
        // bindings contribute no resources of their own
        Stmt::Bind(_) | Stmt::Func(_) | Stmt::Class(_) | Stmt::Import(_) => Ok(()),
        Stmt::Include(include) => {
            if let Some(instance) = ctx.include_instances.get(&include.id) {
                interpret_prog(ctx, &instance.body, table, rg)?;
            }
            Ok(())
        }
        Stmt::If(if_stmt) => {
            let cond = value_of(table, &if_stmt.cond)?;
            let Some(flag) = cond.as_bool() else {
                let span = if_stmt.cond.span();
                return Err(CompileError::value_type_mismatch(
                    "condition",
                    "bool",
                    cond.r#type().to_string(),
                    span.to_range(),
                    span.state.file.clone(),
                ));
            };

            let branch = if flag { &if_stmt.then } else { &if_stmt.els };
            if let Some(block) = branch {
                interpret_prog(ctx, block, table, rg)?;
            }
            Ok(())
        }
        Stmt::Res(res) => interpret_res(res, table, rg),
        Stmt::Edge(edge) => {
            // a chain of N halves produces N-1 edges; send/recv names are
            // propagated to both endpoints of the single pair
            let mut names = Vec::with_capacity(edge.halves.len());
            for half in edge.halves.iter() {
                let value = value_of(table, &half.name)?;
                let Some(name) = value.as_str() else {
                    let span = half.name.span();
                    return Err(CompileError::value_type_mismatch(
                        "edge name",
                        "str",
                        value.r#type().to_string(),
                        span.to_range(),
                        span.state.file.clone(),
                    ));
                };
                names.push(name.to_string());
            }

            for window in 0..edge.halves.len() - 1 {
                let from = &edge.halves[window];
                let to = &edge.halves[window + 1];
                rg.add_edge(ResourceEdge {
                    from_kind: from.kind.text.to_lowercase(),
                    from_name: names[window].clone(),
                    to_kind: to.kind.text.to_lowercase(),
                    to_name: names[window + 1].clone(),
                    notify: edge.notify,
                    send: from.field.as_ref().map(|span| span.text.to_string()),
                    recv: to.field.as_ref().map(|span| span.text.to_string()),
                });
            }
            Ok(())
        }
    }
}

fn interpret_res<'base>(
    res: &crate::ast::ResStmt<'base>,
    table: &ValueTable,
    rg: &mut ResourceGraph,
) -> Result<(), CompileError> {
    let kind_name = res.kind.text;
    let Some(kind) = resources::registry().kind(kind_name) else {
        return Err(CompileError::unknown_kind(
            kind_name,
            res.kind.to_range(),
            res.kind.state.file.clone(),
        ));
    };

    // a string makes one resource, a list of strings fans out
    let name_value = value_of(table, &res.name)?;
    let names: Vec<String> = match &name_value {
        Value::Str(name) => vec![name.clone()],
        Value::List { values, .. } => values
            .iter()
            .map(|value| value.as_str().unwrap_or_default().to_string())
            .collect(),
        other => {
            let span = res.name.span();
            return Err(CompileError::value_type_mismatch(
                "resource name",
                "str or []str",
                other.r#type().to_string(),
                span.to_range(),
                span.state.file.clone(),
            ));
        }
    };

    for name in names {
        let mut resource = Resource::new(kind_name, name.clone());

        for content in res.contents.iter() {
            match content {
                ResContent::Field(field) => {
                    if !guard_holds(table, &field.cond)? {
                        continue;
                    }

                    let Some(declared) = kind.field(field.field.text) else {
                        return Err(CompileError::unknown_field(
                            kind_name,
                            field.field.text,
                            field.field.to_range(),
                            field.field.state.file.clone(),
                        ));
                    };

                    let value = value_of(table, &field.value)?;
                    if value.r#type() != *declared {
                        return Err(CompileError::value_type_mismatch(
                            field.field.text,
                            declared.to_string(),
                            value.r#type().to_string(),
                            field.field.to_range(),
                            field.field.state.file.clone(),
                        ));
                    }

                    resource.fields.insert(field.field.text.to_string(), value);
                }
                ResContent::Edge(edge) => {
                    if !guard_holds(table, &edge.cond)? {
                        continue;
                    }

                    let value = value_of(table, &edge.half.name)?;
                    let Some(target) = value.as_str() else {
                        let span = edge.half.name.span();
                        return Err(CompileError::value_type_mismatch(
                            "edge name",
                            "str",
                            value.r#type().to_string(),
                            span.to_range(),
                            span.state.file.clone(),
                        ));
                    };
                    let target_kind = edge.half.kind.text.to_lowercase();

                    // direction and notification follow the property
                    let (from, to, notify) = match edge.property {
                        EdgeProp::Notify => ((kind_name.to_string(), name.clone()), (target_kind, target.to_string()), true),
                        EdgeProp::Before => ((kind_name.to_string(), name.clone()), (target_kind, target.to_string()), false),
                        EdgeProp::Listen => ((target_kind, target.to_string()), (kind_name.to_string(), name.clone()), true),
                        EdgeProp::Depend => ((target_kind, target.to_string()), (kind_name.to_string(), name.clone()), false),
                    };

                    rg.add_edge(ResourceEdge {
                        from_kind: from.0,
                        from_name: from.1,
                        to_kind: to.0,
                        to_name: to.1,
                        notify,
                        send: None,
                        recv: None,
                    });
                }
                ResContent::Meta(meta_entry) => {
                    if !guard_holds(table, &meta_entry.cond)? {
                        continue;
                    }

                    let value = value_of(table, &meta_entry.value)?;
                    let position = meta_entry.property.to_range();
                    let source = &meta_entry.property.state.file;
                    if meta_entry.property.text == "meta" {
                        resource.meta.apply_aggregate(&value, position, source)?;
                    } else {
                        resource.meta.apply(meta_entry.property.text, &value, position, source)?;
                    }
                }
            }
        }

        rg.add_resource(resource);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::{
        compile::{context::CompileContext, interpolate::interpolate_prog, resolver::{set_scope, ModuleSet}, unify::unify},
        engine::{eval::Seq, Engine},
        file::SourceFile,
        graph::graph,
        nom_tools::State,
        parser,
        types::Value,
    };

    use super::interpret;

    fn run(code: &str) -> Result<crate::graph::resource::ResourceGraph, crate::compile::error::CompileError> {
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
        let fg = graph(&ctx, &prog)?;

        let mut engine = Seq::default();
        engine.setup(fg)?;
        engine.run(&Default::default())?;
        let table = engine.table().clone();

        interpret(&ctx, &prog, &table)
    }

    #[test]
    fn chained_variables_reach_the_resource() {
        let rg = run("test \"t\" { int64ptr => $c, }\n$c = $b\n$b = $a\n$a = 42").unwrap();
        let resource = rg.resource("test", "t").expect("one test resource");
        assert_eq!(resource.fields.get("int64ptr"), Some(&Value::Int(42)));
    }

    #[test]
    fn operators_evaluate() {
        let rg = run("test \"t\" { int64ptr => 42 + 13, }").unwrap();
        let resource = rg.resource("test", "t").unwrap();
        assert_eq!(resource.fields.get("int64ptr"), Some(&Value::Int(55)));
    }

    #[test]
    fn shadowed_binding_wins_inside_the_block() {
        let rg = run("$x = \"hello\"\nif true { $x = \"world\"\ntest \"t\" { stringptr => $x, } }").unwrap();
        let resource = rg.resource("test", "t").unwrap();
        assert_eq!(resource.fields.get("stringptr"), Some(&Value::Str("world".into())));
    }

    #[test]
    fn inactive_branch_emits_nothing() {
        let rg = run("if false { test \"t\" { } } else { test \"u\" { } }").unwrap();
        assert!(rg.resource("test", "t").is_none());
        assert!(rg.resource("test", "u").is_some());
    }

    #[test]
    fn name_lists_fan_out() {
        let rg = run("test [\"a\", \"b\"] { int64ptr => 1, }").unwrap();
        assert!(rg.resource("test", "a").is_some());
        assert!(rg.resource("test", "b").is_some());
        assert_eq!(rg.resources.len(), 2);
    }

    #[test]
    fn conditional_fields_are_skipped() {
        let rg = run("$b = false\ntest \"t\" { int64ptr => 1 if $b, stringptr => \"s\", }").unwrap();
        let resource = rg.resource("test", "t").unwrap();
        assert!(resource.fields.get("int64ptr").is_none());
        assert_eq!(resource.fields.get("stringptr"), Some(&Value::Str("s".into())));
    }

    #[test]
    fn send_recv_edges_are_emitted() {
        let code = "test \"t1\" { int64ptr => 42, }\ntest \"t2\" { int64ptr => 13, }\nTest[\"t1\"].hello -> Test[\"t2\"].stringptr";
        let rg = run(code).unwrap();
        assert_eq!(rg.edges.len(), 1);
        let edge = &rg.edges[0];
        assert_eq!(edge.from_name, "t1");
        assert_eq!(edge.to_name, "t2");
        assert_eq!(edge.send.as_deref(), Some("hello"));
        assert_eq!(edge.recv.as_deref(), Some("stringptr"));
    }

    #[test]
    fn edge_chains_become_pairwise_edges() {
        let code = "test [\"a\", \"b\", \"c\"] { }\nTest[\"a\"] -> Test[\"b\"] -> Test[\"c\"]";
        let rg = run(code).unwrap();
        assert_eq!(rg.edges.len(), 2);
    }

    #[test]
    fn resource_body_edges_follow_their_direction() {
        let code = "test \"t\" { Notify => Test[\"u\"], Depend => Test[\"v\"], }\ntest \"u\" { }\ntest \"v\" { }";
        let rg = run(code).unwrap();

        let notify = rg.edges.iter().find(|edge| edge.notify).expect("notify edge");
        assert_eq!((notify.from_name.as_str(), notify.to_name.as_str()), ("t", "u"));

        let depend = rg.edges.iter().find(|edge| !edge.notify).expect("depend edge");
        assert_eq!((depend.from_name.as_str(), depend.to_name.as_str()), ("v", "t"));
    }

    #[test]
    fn aggregate_meta_applies_before_overrides() {
        let code = "test \"t\" { Meta => struct{noop => false, retry => -1, delay => 0, poll => 0, limit => 0.0, burst => 0, sema => [\"s:1\"], rewatch => false, realize => false, reverse => false, autoedge => true, autogroup => true}, Meta:noop => true, }";
        let rg = run(code).unwrap();
        let resource = rg.resource("test", "t").unwrap();
        assert!(resource.meta.noop);
        assert_eq!(resource.meta.retry, -1);
        assert_eq!(resource.meta.sema, vec!["s:1".to_string()]);
    }

    #[test]
    fn unknown_kind_is_an_interpret_error() {
        let error = run("svc \"x\" { }").unwrap_err();
        assert_eq!(error.stage(), crate::compile::error::Stage::Interpret);
    }

    #[test]
    fn unknown_field_is_an_interpret_error() {
        let error = run("test \"t\" { bogus => 1, }").unwrap_err();
        assert!(matches!(error, crate::compile::error::CompileError::UnknownField(_)));
    }

    #[test]
    fn meta_overflow_is_an_interpret_error() {
        let error = run("test \"t\" { Meta:retry => 1000000, }").unwrap_err();
        assert!(matches!(error, crate::compile::error::CompileError::NumericOverflow(_)));
    }
}
