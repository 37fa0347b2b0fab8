//! rill language compiler library
//!
//! This is the core library of the rill configuration language: a
//! declarative language describing a desired system state whose inputs
//! change over time. Compilation therefore produces not a one-shot
//! evaluation but a reactive dataflow graph whose outputs are continuously
//! re-derived as inputs change.
//!
//! # Overview
//!
//! The pipeline transforms source text into two artifacts:
//!
//! 1. A **function graph** (FG) — a directed graph of pure value-producing
//!    vertices with labeled edges, consumed by a streaming evaluator.
//! 2. A **resource graph** (RG) — the declarative output graph of named
//!    resources and dependency edges, produced by interpreting the program
//!    against the evaluator's value table.
//!
//! Dataflow: source → AST → Init → Interpolate → Ordering → SetScope →
//! Unify → Graph → evaluator snapshot → Interpret.
//!
//! # Architecture
//!
//! - [`parser`]: nom combinator grammar producing the AST
//! - [`ast`]: statement and expression node families
//! - [`compile`]: init, interpolation, ordering, scope resolution and type
//!   unification, accumulating into a [`compile::CompileContext`]
//! - [`graph`]: function graph construction and the resource graph model
//! - [`interpret`]: resource graph emission from a value-table snapshot
//! - [`engine`]: the streaming evaluator seam, resource kinds, virtual
//!   filesystem and module layout
//! - [`funcs`]: the process-wide builtin function registry
//! - [`report`]: diagnostics rendering and the oracle error format
//!
//! # Usage
//!
//! The main entry points are [`process_code`] for parsing a single unit,
//! [`compile`] for the full front-end, and [`stream_and_interpret`] to
//! drive an engine and produce the resource graph:
//!
//! ```ignore
//! use librill::{compile, engine::{modules::Sources, Seq}, file::SourceFile, CancelToken};
//!
//! let sources = Sources::from_root(SourceFile::new(vec!["main".into()], code));
//! let compilation = compile(&sources, &CancelToken::new())?;
//! let rg = librill::stream_and_interpret(&compilation, &mut Seq::default(), &CancelToken::new())?;
//! ```
//!
//! # Error Handling
//!
//! Every failure is a [`CompileError`] tagged with the pipeline
//! [`Stage`] that produced it; stages are atomic and no partial output is
//! ever emitted.

use std::rc::Rc;

use indexmap::IndexMap;
use nom::Finish;

use ast::Prog;
use compile::{context::CompileContext, resolver, unify};
use engine::modules::Sources;
use graph::resource::ResourceGraph;
use nom_tools::State;

pub mod ast;
pub mod compile;
pub mod engine;
pub mod file;
pub mod funcs;
pub mod graph;
pub mod interpret;
pub mod map;
pub mod nom_tools;

#[rustfmt::skip]
pub mod parser;
pub mod report;
pub mod types;

pub use compile::{CompileError, ModuleSet, Stage};
pub use engine::{CancelToken, Engine, Seq};

/// The artifacts of a successful front-end run.
#[derive(Debug)]
pub struct Compilation<'base> {
    /// Side tables of every stage: scopes, instances, solved types
    pub ctx: CompileContext<'base>,
    /// The interpolated root program
    pub root: Rc<Prog<'base>>,
    /// The reactive function graph
    pub fg: graph::FuncGraph,
}

/// Parses rill source code into an abstract syntax tree.
///
/// The first stage of the pipeline; syntax failures carry the parser's
/// context labels with their source positions.
pub fn process_code<'base>(state: &'base State) -> Result<Prog<'base>, CompileError> {
    match parser::parse(state).finish() {
        Ok((_, prog)) => Ok(prog),
        Err(error) => Err(parser::into_compile_error(error)),
    }
}

fn check_cancel(cancel: &CancelToken, stage: Stage) -> Result<(), CompileError> {
    if cancel.is_cancelled() {
        return Err(CompileError::cancelled(stage));
    }
    Ok(())
}

/// Runs the compiler front-end over a frozen source set.
///
/// Parses every unit, validates and interpolates the trees, resolves
/// scopes and imports, unifies types and builds the function graph. Each
/// stage is atomic; the first error aborts the pipeline.
pub fn compile<'base>(sources: &'base Sources, cancel: &CancelToken) -> Result<Compilation<'base>, CompileError> {
    check_cancel(cancel, Stage::LexParse)?;
    let mut parsed: IndexMap<String, Prog<'base>> = IndexMap::new();
    for unit in sources.units() {
        parsed.insert(unit.key.clone(), process_code(&unit.state)?);
    }

    check_cancel(cancel, Stage::Init)?;
    for prog in parsed.values() {
        compile::init::init_prog(prog)?;
    }

    check_cancel(cancel, Stage::Interpolate)?;
    let indexer = sources.indexer();
    let mut progs: IndexMap<String, Rc<Prog<'base>>> = IndexMap::new();
    for (key, prog) in parsed.into_iter() {
        progs.insert(key, Rc::new(compile::interpolate::interpolate_prog(&prog, &indexer)?));
    }

    let modules = ModuleSet {
        root: sources.root().to_string(),
        progs,
        resolutions: sources.resolutions().clone(),
    };
    let root = modules
        .progs
        .get(&modules.root)
        .cloned()
        .expect("the root unit was just parsed");

    check_cancel(cancel, Stage::SetScope)?;
    let mut ctx = CompileContext::new(indexer);
    resolver::set_scope(&mut ctx, &modules)?;

    check_cancel(cancel, Stage::Unify)?;
    unify::unify(&mut ctx, &root)?;

    check_cancel(cancel, Stage::Graph)?;
    let fg = graph::graph(&ctx, &root)?;

    Ok(Compilation { ctx, root, fg })
}

/// Installs the function graph into an engine, waits for a snapshot, and
/// interprets the program into a resource graph.
///
/// The graph is installed through the engine's transaction API; if the
/// stream fails after the install, the transaction is reversed so the
/// engine is never left with a half-installed graph.
pub fn stream_and_interpret<'base>(
    compilation: &Compilation<'base>,
    engine: &mut dyn Engine,
    cancel: &CancelToken,
) -> Result<ResourceGraph, CompileError> {
    check_cancel(cancel, Stage::Stream)?;

    let mut txn = engine.txn();
    txn.add_graph(compilation.fg.clone());
    txn.commit()?;
    txn.free();

    if let Err(error) = engine.run(cancel) {
        // never leave a half-streamed graph installed
        engine.cleanup()?;
        return Err(error);
    }

    let events = engine.stream();
    if !events.contains(&engine::StreamEvent::SnapshotReady) {
        return Err(CompileError::stream_failure("engine produced no snapshot"));
    }

    check_cancel(cancel, Stage::Interpret)?;
    let table = engine.table().clone();
    interpret::interpret(&compilation.ctx, &compilation.root, &table)
}

#[cfg(test)]
mod tests {
    use crate::{engine::modules::Sources, file::SourceFile, types::Value};

    use super::*;

    fn sources(code: &str) -> Sources {
        Sources::from_root(SourceFile::new(vec!["<memory>".into()], code.to_string()))
    }

    #[test]
    fn full_pipeline_produces_both_artifacts() {
        let sources = sources("$a = 40 + 2\ntest \"t\" { int64ptr => $a, }");
        let compilation = compile(&sources, &CancelToken::new()).unwrap();
        assert!(compilation.fg.num_vertices() > 0);

        let mut engine = Seq::default();
        let rg = stream_and_interpret(&compilation, &mut engine, &CancelToken::new()).unwrap();
        let resource = rg.resource("test", "t").unwrap();
        assert_eq!(resource.fields.get("int64ptr"), Some(&Value::Int(42)));
    }

    #[test]
    fn parse_errors_carry_the_lexparse_stage() {
        let sources = sources("test \"t\" { int64ptr => , }");
        let error = compile(&sources, &CancelToken::new()).unwrap_err();
        assert_eq!(error.stage(), Stage::LexParse);
    }

    #[test]
    fn cancellation_aborts_before_work() {
        let sources = sources("$a = 1\ntest \"t\" { int64ptr => $a, }");
        let cancel = CancelToken::new();
        cancel.cancel();
        let error = compile(&sources, &cancel).unwrap_err();
        assert_eq!(error.stage(), Stage::LexParse);
    }

    #[test]
    fn scope_purity_after_set_scope() {
        // published scopes are never mutated afterwards; compiling twice
        // yields structurally identical outputs
        let code = "$a = 1\ntest \"t\" { int64ptr => $a, }";
        let sources_a = sources(code);
        let sources_b = sources(code);
        let first = compile(&sources_a, &CancelToken::new()).unwrap();
        let second = compile(&sources_b, &CancelToken::new()).unwrap();
        assert_eq!(first.fg.text(), second.fg.text());
    }
}
