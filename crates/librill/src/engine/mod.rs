//! Streaming engine interface and adapters.
//!
//! The compiler hands the finished function graph to a streaming engine and
//! waits for value-table snapshots; everything else about the engine is
//! opaque. This module defines that seam: the [`Engine`] trait, the
//! transactional install API ([`Txn`]), cancellation, stream events and
//! stats, plus the adapters the engine side contributes (resource kinds,
//! virtual filesystem, module layout).
//!
//! [`eval::Seq`] is the in-tree engine: a deterministic, single-threaded
//! evaluator producing exactly one snapshot per committed graph.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::{compile::error::CompileError, graph::FuncGraph, interpret::ValueTable};

pub mod eval;
pub mod modules;
pub mod resources;
pub mod vfs;

pub use eval::Seq;

/// A cooperative cancellation token checked between pipeline stages and
/// inside the engine loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token in the not-cancelled state
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum seconds between update events before the stream errors
    pub update_timeout_secs: u64,
    /// Absolute maximum seconds to wait for the stream
    pub total_timeout_secs: u64,
    /// The tick value substituted for `datetime.now` per snapshot
    pub tick: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            update_timeout_secs: 10,
            total_timeout_secs: 60,
            tick: crate::funcs::registry()
                .get("datetime.now")
                .and_then(|func| {
                    let sig = func.signatures(&[], &[]).pop()?;
                    func.call(&sig, &[]).ok()?.as_int()
                })
                .unwrap_or(0),
        }
    }
}

/// Events delivered over the engine's update stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The engine accepted the graph and started evaluating
    Started,
    /// A complete value-table snapshot is available via `table()`
    SnapshotReady,
    /// A fatal evaluator error; the stream ends
    Error(String),
}

/// Counters an engine exposes for observability.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    /// Snapshots published so far
    pub snapshots: usize,
    /// Individual vertex evaluations performed
    pub vertex_evals: usize,
}

/// The target of a transaction; implemented by engines.
pub trait TxnTarget {
    /// Installs a committed graph
    fn install(&mut self, fg: FuncGraph);
    /// Uninstalls the current graph
    fn uninstall(&mut self);
}

/// A transactional batch of graph changes.
///
/// The compiler never half-installs a function graph: `add_graph` stages,
/// `commit` installs, and `reverse` undoes the batch — including an
/// already-committed install when a later stage fails.
pub struct Txn<'engine> {
    target: &'engine mut dyn TxnTarget,
    pending: Option<FuncGraph>,
    committed: bool,
}

impl<'engine> Txn<'engine> {
    /// Opens a transaction against an engine
    pub fn new(target: &'engine mut dyn TxnTarget) -> Self {
        Self { target, pending: None, committed: false }
    }

    /// Stages a graph for installation
    pub fn add_graph(&mut self, fg: FuncGraph) {
        self.pending = Some(fg);
    }

    /// Installs the staged graph
    pub fn commit(&mut self) -> Result<(), CompileError> {
        let Some(fg) = self.pending.take() else {
            return Err(CompileError::stream_failure("commit without a staged graph"));
        };
        self.target.install(fg);
        self.committed = true;
        Ok(())
    }

    /// Undoes the batch; uninstalls if already committed
    pub fn reverse(&mut self) {
        self.pending = None;
        if self.committed {
            self.target.uninstall();
            self.committed = false;
        }
    }

    /// Releases the transaction's resources
    pub fn free(self) {}
}

/// The streaming function-graph evaluator interface.
///
/// `setup` installs a graph (through a transaction), `run` drives
/// evaluation until at least one snapshot is published, `stream` drains the
/// pending events, and `table` exposes the latest snapshot keyed by
/// function-vertex identity.
pub trait Engine: TxnTarget {
    /// Installs the graph through a one-shot transaction
    fn setup(&mut self, fg: FuncGraph) -> Result<(), CompileError>;

    /// Evaluates until a snapshot is published or the token cancels
    fn run(&mut self, cancel: &CancelToken) -> Result<(), CompileError>;

    /// True once the engine accepted a graph and began evaluating
    fn started(&self) -> bool;

    /// Number of vertices in the installed graph
    fn num_vertices(&self) -> usize;

    /// Opens a transaction for graph changes
    fn txn(&mut self) -> Txn<'_>;

    /// Drains the pending stream events
    fn stream(&mut self) -> Vec<StreamEvent>;

    /// The latest value-table snapshot
    fn table(&self) -> &ValueTable;

    /// Engine counters
    fn stats(&self) -> &Stats;

    /// Releases engine resources; the engine can be set up again
    fn cleanup(&mut self) -> Result<(), CompileError>;
}
