//! The reactive function graph (FG).
//!
//! Vertices are expression nodes carrying pure value-producing functions;
//! edges are labeled with the argument name the upstream value feeds. The
//! graph is fully owned (no borrows into the source) so it can be handed to
//! the streaming evaluator independently of the compilation that produced
//! it.
//!
//! The serialized text form emits its lines natively sorted, so comparing
//! two graphs is a plain string comparison.

use indexmap::{IndexMap, IndexSet};

use crate::{ast::NodeId, compile::error::CompileError, file::SourceFile, types::{Type, Value}};

mod build;
pub mod resource;

pub use build::graph;

/// A committed builtin call: registry name plus the signature the solver
/// committed to
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinCall {
    /// Registry name of the builtin
    pub name: String,
    /// The committed signature
    pub sig: Type,
}

impl BuiltinCall {
    /// The parameter names of the committed signature, labeling the call
    /// vertex's input edges
    pub fn param_names(&self) -> Vec<String> {
        match &self.sig {
            Type::Func { params, .. } => params.iter().map(|(name, _)| name.clone()).collect(),
            _ => Vec::new(),
        }
    }
}

/// What a vertex computes each time its inputs update.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexKind {
    /// A constant; literals and function values
    Const(Value),
    /// Builds a list from inputs keyed `0`, `1`, …
    ListBuilder {
        /// Declared element type, kept for empty lists
        elem: Type,
    },
    /// Builds a map from inputs keyed `key:0`/`val:0`, …
    MapBuilder {
        /// Declared key type
        key: Type,
        /// Declared value type
        val: Type,
    },
    /// Builds a struct from inputs keyed by field name
    StructBuilder {
        /// Field names in declaration order
        fields: Vec<String>,
    },
    /// Passes through the single input keyed `var:<name>`
    Var {
        /// The variable name
        name: String,
    },
    /// Applies a function to the inputs keyed by parameter name
    Call {
        /// The callee name as written in source
        name: String,
        /// The committed builtin, or `None` when the callee value arrives
        /// over the `call:<name>` edge
        builtin: Option<BuiltinCall>,
    },
    /// Selects between inputs `a` and `b` by input `c`
    If,
    /// A function value over the body vertex
    Func {
        /// Node id of the body expression's vertex
        body: NodeId,
        /// The function's solved signature
        sig: Type,
    },
    /// A resource builder sink; collects the name and field values of one
    /// resource declaration and produces no value of its own
    Res {
        /// The resource kind
        kind: String,
    },
}

/// One vertex of the function graph
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// The expression node this vertex was built from
    pub id: NodeId,
    /// What the vertex computes
    pub kind: VertexKind,
    /// Display label (`int(42)`, `var(a)`, `call:operator`, …)
    pub label: String,
}

/// A labeled edge of the function graph
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    /// Producing vertex
    pub from: NodeId,
    /// Consuming vertex
    pub to: NodeId,
    /// The argument name the value feeds
    pub label: String,
}

/// The reactive function graph.
#[derive(Debug, Clone, Default)]
pub struct FuncGraph {
    /// Vertices keyed by their expression node id
    pub vertices: IndexMap<NodeId, Vertex>,
    /// Edges in insertion order
    pub edges: Vec<GraphEdge>,
    edge_keys: IndexSet<(NodeId, String)>,
    positions: IndexMap<NodeId, (std::ops::Range<usize>, SourceFile)>,
}

impl FuncGraph {
    /// Creates an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the expression already has a vertex
    pub fn has_vertex(&self, id: NodeId) -> bool {
        self.vertices.contains_key(&id)
    }

    /// Adds a vertex, remembering its source position for diagnostics
    pub fn add_vertex(&mut self, id: NodeId, kind: VertexKind, label: String, position: std::ops::Range<usize>, source: SourceFile) {
        self.positions.insert(id, (position.clone(), source));
        self.vertices.insert(id, Vertex { id, kind, label });
    }

    /// Adds an edge; a given key may be added at most once per consumer
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, label: impl Into<String>) -> Result<(), CompileError> {
        let label = label.into();
        if !self.edge_keys.insert((to, label.clone())) {
            let (position, source) = self
                .positions
                .get(&to)
                .cloned()
                .unwrap_or_else(|| (0..0, SourceFile::new(vec!["<unknown>".into()], String::new())));
            return Err(CompileError::duplicate_edge_key(label, position, source));
        }
        self.edges.push(GraphEdge { from, to, label });
        Ok(())
    }

    /// Returns the labeled inputs of a vertex
    pub fn inputs_of(&self, id: NodeId) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |edge| edge.to == id)
    }

    /// Number of vertices
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Serializes the graph as sorted `vertex:`/`edge:` lines
    pub fn text(&self) -> String {
        let mut lines = Vec::new();
        for vertex in self.vertices.values() {
            lines.push(format!("vertex: {}", vertex.label));
        }
        for edge in self.edges.iter() {
            let from = self.vertices.get(&edge.from).map(|vertex| vertex.label.as_str()).unwrap_or("?");
            let to = self.vertices.get(&edge.to).map(|vertex| vertex.label.as_str()).unwrap_or("?");
            lines.push(format!("edge: {from} -> {to} # {}", edge.label));
        }
        lines.sort();
        let mut out = lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceFile {
        SourceFile::new(vec!["<memory>".into()], "graph".to_string())
    }

    #[test]
    fn duplicate_edge_keys_are_rejected() {
        let mut fg = FuncGraph::new();
        fg.add_vertex(NodeId(0), VertexKind::Const(Value::Int(1)), "int(1)".into(), 0..1, source());
        fg.add_vertex(NodeId(1), VertexKind::Const(Value::Int(2)), "int(2)".into(), 0..1, source());
        fg.add_vertex(NodeId(2), VertexKind::ListBuilder { elem: Type::Int }, "list".into(), 0..1, source());

        fg.add_edge(NodeId(0), NodeId(2), "0").unwrap();
        fg.add_edge(NodeId(1), NodeId(2), "1").unwrap();
        let error = fg.add_edge(NodeId(1), NodeId(2), "0").unwrap_err();
        assert!(matches!(error, CompileError::DuplicateEdgeKey(_)));
    }

    #[test]
    fn text_is_sorted() {
        let mut fg = FuncGraph::new();
        fg.add_vertex(NodeId(0), VertexKind::Const(Value::Int(42)), "int(42)".into(), 0..1, source());
        fg.add_vertex(NodeId(1), VertexKind::Var { name: "a".into() }, "var(a)".into(), 0..1, source());
        fg.add_edge(NodeId(0), NodeId(1), "var:a").unwrap();

        let text = fg.text();
        assert_eq!(text, "edge: int(42) -> var(a) # var:a\nvertex: int(42)\nvertex: var(a)\n");
    }

    #[test]
    fn builtin_call_exposes_param_names() {
        let call = BuiltinCall {
            name: "operator".into(),
            sig: Type::func(vec![("x", Type::Str), ("a", Type::Int), ("b", Type::Int)], Type::Int),
        };
        assert_eq!(call.param_names(), vec!["x", "a", "b"]);
    }
}
