//! The sequential engine.
//!
//! `Seq` is the deterministic, single-threaded implementation of the
//! [`Engine`] interface: it topologically evaluates the installed function
//! graph once per commit and publishes a single value-table snapshot. Its
//! timeouts exist in configuration only; a synchronous evaluator can never
//! hit them. Re-emission on input change is the province of richer
//! engines — with one snapshot, reactive semantics degenerate to a plain
//! evaluation, which keeps oracle outputs stable.

use indexmap::IndexMap;
use log::debug;

use crate::{
    ast::NodeId,
    compile::error::CompileError,
    funcs,
    graph::{FuncGraph, VertexKind},
    interpret::ValueTable,
    types::{FuncImpl, Value},
};

use super::{CancelToken, Config, Engine, Stats, StreamEvent, Txn, TxnTarget};

/// The deterministic sequential engine.
#[derive(Debug, Default)]
pub struct Seq {
    config: Config,
    fg: Option<FuncGraph>,
    table: ValueTable,
    events: Vec<StreamEvent>,
    started: bool,
    stats: Stats,
}

impl Seq {
    /// Creates an engine with the given configuration
    pub fn new(config: Config) -> Self {
        Self { config, ..Self::default() }
    }
}

/// Computes one vertex from its labeled inputs
fn eval_vertex(config: &Config, fg: &FuncGraph, id: NodeId, table: &ValueTable) -> Result<Option<Value>, CompileError> {
    let vertex = fg.vertices.get(&id).expect("vertex ids come from the graph");

    let mut inputs: IndexMap<&str, Value> = IndexMap::new();
    for edge in fg.inputs_of(id) {
        let value = table.get(&edge.from).cloned().ok_or_else(|| {
            CompileError::stream_failure(format!("input '{}' of {} has no value", edge.label, vertex.label))
        })?;
        inputs.insert(edge.label.as_str(), value);
    }

    let input = |label: &str| -> Result<Value, CompileError> {
        inputs
            .get(label)
            .cloned()
            .ok_or_else(|| CompileError::stream_failure(format!("{} is missing input '{label}'", vertex.label)))
    };

    let value = match &vertex.kind {
        VertexKind::Const(value) => Some(value.clone()),
        VertexKind::ListBuilder { elem } => {
            let mut values = Vec::with_capacity(inputs.len());
            for index in 0..inputs.len() {
                values.push(input(&index.to_string())?);
            }
            Some(Value::List { elem: elem.clone(), values })
        }
        VertexKind::MapBuilder { key, val } => {
            let count = inputs.len() / 2;
            let mut entries = Vec::with_capacity(count);
            for index in 0..count {
                entries.push((input(&format!("key:{index}"))?, input(&format!("val:{index}"))?));
            }
            Some(Value::Map { key: key.clone(), val: val.clone(), entries })
        }
        VertexKind::StructBuilder { fields } => {
            let mut values = Vec::with_capacity(fields.len());
            for field in fields.iter() {
                values.push((field.clone(), input(field)?));
            }
            Some(Value::Struct(values))
        }
        VertexKind::Var { name } => Some(input(&format!("var:{name}"))?),
        VertexKind::If => {
            let cond = input("c")?;
            match cond.as_bool() {
                Some(true) => Some(input("a")?),
                Some(false) => Some(input("b")?),
                None => return Err(CompileError::stream_failure("if condition did not produce a bool")),
            }
        }
        VertexKind::Func { body, sig } => Some(Value::Func {
            sig: sig.clone(),
            imp: FuncImpl::Graph { body: *body },
        }),
        VertexKind::Call { builtin: Some(call), .. } => {
            // the engine's tick source backs the canonical stream builtin
            // so snapshots stay deterministic
            if call.name == "datetime.now" {
                Some(Value::Int(config.tick))
            } else {
                let func = funcs::registry()
                    .get(&call.name)
                    .ok_or_else(|| CompileError::stream_failure(format!("builtin '{}' is not registered", call.name)))?;
                let mut args = Vec::new();
                for param in call.param_names() {
                    args.push(input(&param)?);
                }
                Some(func.call(&call.sig, &args)?)
            }
        }
        VertexKind::Call { name, builtin: None } => {
            let callee = input(&format!("call:{name}"))?;
            let Value::Func { imp: FuncImpl::Graph { body }, .. } = callee else {
                return Err(CompileError::stream_failure(format!("callee of {name} is not a graph function")));
            };
            Some(table.get(&body).cloned().ok_or_else(|| {
                CompileError::stream_failure(format!("body of {name} was not evaluated before the call"))
            })?)
        }
        // resource builder sinks produce no value
        VertexKind::Res { .. } => None,
    };

    Ok(value)
}

/// Evaluates the whole graph in dependency order
fn eval_graph(config: &Config, fg: &FuncGraph, cancel: &CancelToken) -> Result<(ValueTable, usize), CompileError> {
    // Kahn order over the labeled edges
    let mut indegree: IndexMap<NodeId, usize> = fg.vertices.keys().map(|id| (*id, 0)).collect();
    for edge in fg.edges.iter() {
        if let Some(count) = indegree.get_mut(&edge.to) {
            *count += 1;
        }
    }
    let mut ready: Vec<NodeId> = indegree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut table = ValueTable::new();
    let mut evaluated = 0usize;

    while let Some(id) = ready.first().copied() {
        ready.remove(0);

        if cancel.is_cancelled() {
            return Err(CompileError::stream_failure("cancelled"));
        }

        if let Some(value) = eval_vertex(config, fg, id, &table)? {
            debug!("seq: {id:?} = {value}");
            table.insert(id, value);
        }
        evaluated += 1;

        for edge in fg.edges.iter().filter(|edge| edge.from == id) {
            let count = indegree.get_mut(&edge.to).expect("edges point at vertices");
            *count -= 1;
            if *count == 0 {
                ready.push(edge.to);
            }
        }
    }

    if evaluated != fg.num_vertices() {
        return Err(CompileError::stream_failure("function graph contains a cycle"));
    }

    Ok((table, evaluated))
}

impl TxnTarget for Seq {
    fn install(&mut self, fg: FuncGraph) {
        self.fg = Some(fg);
        self.started = false;
        self.table.clear();
    }

    fn uninstall(&mut self) {
        self.fg = None;
        self.started = false;
        self.table.clear();
    }
}

impl Engine for Seq {
    fn setup(&mut self, fg: FuncGraph) -> Result<(), CompileError> {
        let mut txn = self.txn();
        txn.add_graph(fg);
        txn.commit()?;
        txn.free();
        Ok(())
    }

    fn run(&mut self, cancel: &CancelToken) -> Result<(), CompileError> {
        let Some(fg) = self.fg.as_ref() else {
            let error = CompileError::stream_failure("no graph installed");
            self.events.push(StreamEvent::Error(error.to_string()));
            return Err(error);
        };

        match eval_graph(&self.config, fg, cancel) {
            Ok((table, evaluated)) => {
                self.table = table;
                self.stats.vertex_evals += evaluated;
                if !self.started {
                    self.started = true;
                    self.events.push(StreamEvent::Started);
                }
                self.stats.snapshots += 1;
                self.events.push(StreamEvent::SnapshotReady);
                Ok(())
            }
            Err(error) => {
                self.events.push(StreamEvent::Error(error.to_string()));
                Err(error)
            }
        }
    }

    fn started(&self) -> bool {
        self.started
    }

    fn num_vertices(&self) -> usize {
        self.fg.as_ref().map(|fg| fg.num_vertices()).unwrap_or(0)
    }

    fn txn(&mut self) -> Txn<'_> {
        Txn::new(self)
    }

    fn stream(&mut self) -> Vec<StreamEvent> {
        std::mem::take(&mut self.events)
    }

    fn table(&self) -> &ValueTable {
        &self.table
    }

    fn stats(&self) -> &Stats {
        &self.stats
    }

    fn cleanup(&mut self) -> Result<(), CompileError> {
        self.uninstall();
        self.events.clear();
        self.stats = Stats::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{file::SourceFile, types::Type};

    fn source() -> SourceFile {
        SourceFile::new(vec!["<memory>".into()], "engine".to_string())
    }

    fn small_graph() -> FuncGraph {
        // int(42) -> var(a)
        let mut fg = FuncGraph::new();
        fg.add_vertex(NodeId(0), VertexKind::Const(Value::Int(42)), "int(42)".into(), 0..2, source());
        fg.add_vertex(NodeId(1), VertexKind::Var { name: "a".into() }, "var(a)".into(), 3..4, source());
        fg.add_edge(NodeId(0), NodeId(1), "var:a").unwrap();
        fg
    }

    #[test]
    fn snapshot_reaches_every_vertex() {
        let mut engine = Seq::default();
        engine.setup(small_graph()).unwrap();
        engine.run(&CancelToken::new()).unwrap();

        assert!(engine.started());
        assert_eq!(engine.num_vertices(), 2);
        assert_eq!(engine.table().get(&NodeId(1)), Some(&Value::Int(42)));

        let events = engine.stream();
        assert_eq!(events, vec![StreamEvent::Started, StreamEvent::SnapshotReady]);
        assert_eq!(engine.stats().snapshots, 1);
        assert_eq!(engine.stats().vertex_evals, 2);
    }

    #[test]
    fn cancellation_stops_the_run() {
        let mut engine = Seq::default();
        engine.setup(small_graph()).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let error = engine.run(&cancel).unwrap_err();
        assert_eq!(error.stage(), crate::compile::error::Stage::Stream);
    }

    #[test]
    fn reversed_transaction_uninstalls() {
        let mut engine = Seq::default();
        let mut txn = engine.txn();
        txn.add_graph(small_graph());
        txn.commit().unwrap();
        txn.reverse();
        txn.free();

        assert_eq!(engine.num_vertices(), 0);
        assert!(engine.run(&CancelToken::new()).is_err());
    }

    #[test]
    fn if_vertex_selects_a_branch() {
        let mut fg = FuncGraph::new();
        fg.add_vertex(NodeId(0), VertexKind::Const(Value::Bool(false)), "bool(false)".into(), 0..1, source());
        fg.add_vertex(NodeId(1), VertexKind::Const(Value::Int(1)), "int(1)".into(), 0..1, source());
        fg.add_vertex(NodeId(2), VertexKind::Const(Value::Int(2)), "int(2)".into(), 0..1, source());
        fg.add_vertex(NodeId(3), VertexKind::If, "if".into(), 0..1, source());
        fg.add_edge(NodeId(0), NodeId(3), "c").unwrap();
        fg.add_edge(NodeId(1), NodeId(3), "a").unwrap();
        fg.add_edge(NodeId(2), NodeId(3), "b").unwrap();

        let mut engine = Seq::default();
        engine.setup(fg).unwrap();
        engine.run(&CancelToken::new()).unwrap();
        assert_eq!(engine.table().get(&NodeId(3)), Some(&Value::Int(2)));
    }

    #[test]
    fn list_builder_collects_in_order() {
        let mut fg = FuncGraph::new();
        fg.add_vertex(NodeId(0), VertexKind::Const(Value::Int(10)), "int(10)".into(), 0..1, source());
        fg.add_vertex(NodeId(1), VertexKind::Const(Value::Int(20)), "int(20)".into(), 0..1, source());
        fg.add_vertex(NodeId(2), VertexKind::ListBuilder { elem: Type::Int }, "list".into(), 0..1, source());
        fg.add_edge(NodeId(0), NodeId(2), "0").unwrap();
        fg.add_edge(NodeId(1), NodeId(2), "1").unwrap();

        let mut engine = Seq::default();
        engine.setup(fg).unwrap();
        engine.run(&CancelToken::new()).unwrap();
        assert_eq!(
            engine.table().get(&NodeId(2)),
            Some(&Value::List { elem: Type::Int, values: vec![Value::Int(10), Value::Int(20)] })
        );
    }

    #[test]
    fn cleanup_resets_the_engine() {
        let mut engine = Seq::default();
        engine.setup(small_graph()).unwrap();
        engine.run(&CancelToken::new()).unwrap();
        engine.cleanup().unwrap();

        assert!(!engine.started());
        assert_eq!(engine.num_vertices(), 0);
        assert_eq!(engine.stats(), &Stats::default());
    }
}
