//! End-to-end scenarios: source text through the full pipeline with the
//! sequential engine, checking both the function graph and the resource
//! graph.

use librill::{
    compile,
    compile::error::{CompileError, Stage},
    engine::{modules::Sources, Seq},
    file::SourceFile,
    graph::resource::ResourceGraph,
    stream_and_interpret, CancelToken,
    types::Value,
};

fn run(code: &str) -> Result<(String, ResourceGraph), CompileError> {
    let sources = Sources::from_root(SourceFile::new(vec!["main".into()], code.to_string()));
    let compilation = compile(&sources, &CancelToken::new())?;
    let fg_text = compilation.fg.text();

    let mut engine = Seq::default();
    let rg = stream_and_interpret(&compilation, &mut engine, &CancelToken::new())?;
    Ok((fg_text, rg))
}

#[test]
fn chained_vars() {
    let code = "test \"t\" { int64ptr => $c, }\n$c = $b\n$b = $a\n$a = 42\n";
    let (fg, rg) = run(code).unwrap();

    for vertex in ["int(42)", "var(a)", "var(b)", "var(c)", "str(\"t\")"] {
        assert!(fg.contains(&format!("vertex: {vertex}")), "missing {vertex}:\n{fg}");
    }
    assert!(fg.contains("edge: int(42) -> var(a) # var:a"));
    assert!(fg.contains("edge: var(a) -> var(b) # var:b"));
    assert!(fg.contains("edge: var(b) -> var(c) # var:c"));
    assert!(fg.contains("edge: var(c) -> res(test) # int64ptr"));

    let resource = rg.resource("test", "t").expect("one test resource");
    assert_eq!(resource.fields.get("int64ptr"), Some(&Value::Int(42)));
}

#[test]
fn simple_operator() {
    let code = "test \"t\" { int64ptr => 42 + 13, }\n";
    let (fg, rg) = run(code).unwrap();

    assert!(fg.contains("edge: str(\"+\") -> call:operator # x"));
    assert!(fg.contains("edge: int(42) -> call:operator # a"));
    assert!(fg.contains("edge: int(13) -> call:operator # b"));
    assert!(fg.contains("edge: call:operator -> res(test) # int64ptr"));

    let resource = rg.resource("test", "t").unwrap();
    assert_eq!(resource.fields.get("int64ptr"), Some(&Value::Int(55)));
}

#[test]
fn nested_scope_shadowing() {
    let code = "$x = \"hello\"\nif true {\n$x = \"world\"\ntest \"t\" { stringptr => $x, }\n}\n";
    let (fg, rg) = run(code).unwrap();

    assert!(fg.contains("edge: str(\"world\") -> var(x) # var:x"));
    assert!(fg.contains("edge: var(x) -> res(test) # stringptr"));
    assert!(!fg.contains("str(\"hello\")"), "dead outer binding leaked into the graph:\n{fg}");

    let resource = rg.resource("test", "t").unwrap();
    assert_eq!(resource.fields.get("stringptr"), Some(&Value::Str("world".into())));
}

#[test]
fn self_referential_vars() {
    let error = run("$x = $y\n$y = $x\n").unwrap_err();
    assert_eq!(error.stage(), Stage::SetScope);
    assert!(matches!(error, CompileError::RecursiveReference(_)));
}

#[test]
fn out_of_scope_if_binding() {
    let error = run("if $b {}\nif true { $b = true }\n").unwrap_err();
    assert_eq!(error.stage(), Stage::SetScope);
    assert!(matches!(error, CompileError::NotInScope(_)));
}

#[test]
fn send_recv_edge() {
    let code = "test \"t1\" { int64ptr => 42, }\ntest \"t2\" { int64ptr => 13, }\nTest[\"t1\"].hello -> Test[\"t2\"].stringptr\n";
    let (_, rg) = run(code).unwrap();

    assert!(rg.resource("test", "t1").is_some());
    assert!(rg.resource("test", "t2").is_some());
    assert_eq!(rg.edges.len(), 1);

    let edge = &rg.edges[0];
    assert_eq!((edge.from_name.as_str(), edge.to_name.as_str()), ("t1", "t2"));
    assert_eq!(edge.send.as_deref(), Some("hello"));
    assert_eq!(edge.recv.as_deref(), Some("stringptr"));
}

#[test]
fn send_recv_field_incompatibility_is_a_unify_error() {
    let code = "test \"t1\" { }\ntest \"t2\" { }\nTest[\"t1\"].hello -> Test[\"t2\"].int64ptr\n";
    let error = run(code).unwrap_err();
    assert_eq!(error.stage(), Stage::Unify);
}

#[test]
fn metaparams_aggregate_then_override() {
    let code = concat!(
        "test \"t\" {\n",
        "Meta => struct{noop => false, retry => -1, delay => 0, poll => 0, limit => 0.0, burst => 0, ",
        "sema => [], rewatch => false, realize => false, reverse => false, autoedge => true, autogroup => true},\n",
        "Meta:noop => true,\n",
        "}\n",
    );
    let (_, rg) = run(code).unwrap();

    let resource = rg.resource("test", "t").unwrap();
    // the aggregate applied first; the individual assignment wins
    assert!(resource.meta.noop);
    assert_eq!(resource.meta.retry, -1);
}

#[test]
fn empty_composites_need_context() {
    // constrained by the field type: fine
    let (_, rg) = run("test \"t\" { onlyshow => [], }").unwrap();
    let resource = rg.resource("test", "t").unwrap();
    assert_eq!(
        resource.fields.get("onlyshow"),
        Some(&Value::List { elem: librill::types::Type::Str, values: vec![] })
    );

    // unconstrained: a unify error
    let error = run("$x = []\ntest \"t\" { int64ptr => len($x), }").unwrap_err();
    assert_eq!(error.stage(), Stage::Unify);
}

#[test]
fn undeclared_name_is_a_scope_error() {
    let error = run("test \"t\" { int64ptr => $nope, }").unwrap_err();
    assert_eq!(error.stage(), Stage::SetScope);
}

#[test]
fn rebinding_in_one_prog_is_a_scope_error() {
    let error = run("$x = 1\n$x = 2\ntest \"t\" { int64ptr => $x, }").unwrap_err();
    assert_eq!(error.stage(), Stage::SetScope);
    assert!(matches!(error, CompileError::AlreadyDefined(_)));

    // with a type change it is still the same scope error
    let error = run("$x = 1\n$x = \"two\"\ntest \"t\" { int64ptr => $x, }").unwrap_err();
    assert_eq!(error.stage(), Stage::SetScope);
}

#[test]
fn include_arity_mismatch_is_a_scope_error() {
    let error = run("class c($a) { }\ninclude c(1, 2)\n").unwrap_err();
    assert_eq!(error.stage(), Stage::SetScope);
    assert!(matches!(error, CompileError::ArityMismatch(_)));
}

#[test]
fn class_include_produces_resources_per_site() {
    let code = "class web($name) {\ntest \"${name}\" { int64ptr => 1, }\n}\ninclude web(\"a\")\ninclude web(\"b\")\n";
    let (_, rg) = run(code).unwrap();
    assert!(rg.resource("test", "a").is_some());
    assert!(rg.resource("test", "b").is_some());
}

#[test]
fn functions_instantiate_per_call_site() {
    let code = "func id($x) { $x }\ntest \"t\" { int64ptr => id(42), stringptr => id(\"s\"), }\n";
    let (_, rg) = run(code).unwrap();
    let resource = rg.resource("test", "t").unwrap();
    assert_eq!(resource.fields.get("int64ptr"), Some(&Value::Int(42)));
    assert_eq!(resource.fields.get("stringptr"), Some(&Value::Str("s".into())));
}

#[test]
fn interpolation_feeds_concat_calls() {
    let code = "$who = \"world\"\ntest \"t\" { stringptr => \"hello ${who}!\", }\n";
    let (fg, rg) = run(code).unwrap();

    assert!(fg.contains("call:concat"), "interpolation did not lower to concat:\n{fg}");
    let resource = rg.resource("test", "t").unwrap();
    assert_eq!(resource.fields.get("stringptr"), Some(&Value::Str("hello world!".into())));
}

#[test]
fn deterministic_emission() {
    let code = "$a = 2 * 3\ntest [\"x\", \"y\"] { int64ptr => $a, }\nTest[\"x\"] -> Test[\"y\"]\n";
    let (fg_a, rg_a) = run(code).unwrap();
    let (fg_b, rg_b) = run(code).unwrap();
    assert_eq!(fg_a, fg_b);
    assert_eq!(rg_a.text(), rg_b.text());
}

#[test]
fn system_imports_evaluate() {
    let code = "import \"math\"\nimport \"strings\"\ntest \"t\" { floatptr => math.pow(2.0, 8.0), stringptr => strings.repeat(\"ab\", 2), }\n";
    let (_, rg) = run(code).unwrap();
    let resource = rg.resource("test", "t").unwrap();
    assert_eq!(resource.fields.get("floatptr"), Some(&Value::Float(256.0)));
    assert_eq!(resource.fields.get("stringptr"), Some(&Value::Str("abab".into())));
}

#[test]
fn if_expression_selects_values() {
    let code = "$cold = false\ntest \"t\" { stringptr => if $cold { \"off\" } else { \"on\" }, }\n";
    let (_, rg) = run(code).unwrap();
    let resource = rg.resource("test", "t").unwrap();
    assert_eq!(resource.fields.get("stringptr"), Some(&Value::Str("on".into())));
}
