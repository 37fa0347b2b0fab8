//! The resource graph (RG).
//!
//! The declarative output of a compilation: named resources with typed
//! field values and metaparameters, and the dependency edges between them.
//! Like the function graph, the serialized text form is natively sorted.

use indexmap::IndexMap;

use crate::{interpret::meta::MetaParams, types::Value};

/// A single named resource
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// The resource kind
    pub kind: String,
    /// The resource name
    pub name: String,
    /// Assigned field values in declaration order
    pub fields: IndexMap<String, Value>,
    /// Resolved metaparameters
    pub meta: MetaParams,
}

impl Resource {
    /// Creates a resource with default metaparameters and no fields
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            fields: IndexMap::new(),
            meta: MetaParams::default(),
        }
    }

    /// The `kind[name]` handle used in edges and text output
    pub fn handle(&self) -> String {
        format!("{}[{}]", self.kind, self.name)
    }
}

/// A dependency edge between two resources
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEdge {
    /// Kind of the source resource
    pub from_kind: String,
    /// Name of the source resource
    pub from_name: String,
    /// Kind of the target resource
    pub to_kind: String,
    /// Name of the target resource
    pub to_name: String,
    /// Whether the edge carries change notifications
    pub notify: bool,
    /// Field sent from the source, for send/recv bindings
    pub send: Option<String>,
    /// Field received on the target, for send/recv bindings
    pub recv: Option<String>,
}

impl ResourceEdge {
    fn text(&self) -> String {
        let mut line = format!(
            "edge: {}[{}] -> {}[{}]",
            self.from_kind, self.from_name, self.to_kind, self.to_name
        );
        let mut tags = Vec::new();
        if self.notify {
            tags.push("notify".to_string());
        }
        if let Some(send) = &self.send {
            tags.push(format!("send={send}"));
        }
        if let Some(recv) = &self.recv {
            tags.push(format!("recv={recv}"));
        }
        if !tags.is_empty() {
            line.push_str(" # ");
            line.push_str(&tags.join(" "));
        }
        line
    }
}

/// The resource graph of one interpretation.
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    /// Resources in emission order
    pub resources: Vec<Resource>,
    /// Deduplicated edges in emission order
    pub edges: Vec<ResourceEdge>,
}

impl ResourceGraph {
    /// Creates an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a resource
    pub fn add_resource(&mut self, resource: Resource) {
        self.resources.push(resource);
    }

    /// Appends an edge unless an identical one exists
    pub fn add_edge(&mut self, edge: ResourceEdge) {
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    /// Looks up a resource by kind and name
    pub fn resource(&self, kind: &str, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|resource| resource.kind == kind && resource.name == name)
    }

    /// Appends everything from another graph
    pub fn merge(&mut self, other: ResourceGraph) {
        self.resources.extend(other.resources);
        for edge in other.edges {
            self.add_edge(edge);
        }
    }

    /// Serializes the graph as sorted `vertex:`/`field:`/`edge:` lines
    pub fn text(&self) -> String {
        let mut lines = Vec::new();
        for resource in self.resources.iter() {
            lines.push(format!("vertex: {}", resource.handle()));
            for (field, value) in resource.fields.iter() {
                lines.push(format!("field: {}.{field} = {value}", resource.handle()));
            }
        }
        for edge in self.edges.iter() {
            lines.push(edge.text());
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

    #[test]
    fn text_lists_resources_fields_and_edges() {
        let mut rg = ResourceGraph::new();
        let mut resource = Resource::new("test", "t");
        resource.fields.insert("int64ptr".into(), Value::Int(42));
        rg.add_resource(resource);
        rg.add_resource(Resource::new("test", "u"));
        rg.add_edge(ResourceEdge {
            from_kind: "test".into(),
            from_name: "t".into(),
            to_kind: "test".into(),
            to_name: "u".into(),
            notify: true,
            send: None,
            recv: None,
        });

        let text = rg.text();
        assert!(text.contains("vertex: test[t]"));
        assert!(text.contains("field: test[t].int64ptr = 42"));
        assert!(text.contains("edge: test[t] -> test[u] # notify"));
    }

    #[test]
    fn identical_edges_are_deduplicated() {
        let mut rg = ResourceGraph::new();
        let edge = ResourceEdge {
            from_kind: "test".into(),
            from_name: "a".into(),
            to_kind: "test".into(),
            to_name: "b".into(),
            notify: false,
            send: None,
            recv: None,
        };
        rg.add_edge(edge.clone());
        rg.add_edge(edge);
        assert_eq!(rg.edges.len(), 1);
    }

    #[test]
    fn send_recv_edges_carry_their_fields() {
        let edge = ResourceEdge {
            from_kind: "test".into(),
            from_name: "t1".into(),
            to_kind: "test".into(),
            to_name: "t2".into(),
            notify: false,
            send: Some("hello".into()),
            recv: Some("stringptr".into()),
        };
        assert_eq!(edge.text(), "edge: test[t1] -> test[t2] # send=hello recv=stringptr");
    }
}
