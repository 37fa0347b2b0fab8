//! Resource kind adapter.
//!
//! The execution engine knows which resource kinds exist and which typed
//! fields each carries; the compiler only consumes that knowledge, through
//! the registry defined here. Field tables feed unification (static field
//! type checks, send/recv compatibility) and interpretation (value checks
//! at assignment time).
//!
//! Two kinds ship built in: `test`, whose fields cover every scalar shape
//! the test suites need, and `noop`, which does nothing but carry a
//! comment.

use std::sync::OnceLock;

use indexmap::{IndexMap, IndexSet};

use crate::types::Type;

/// A resource kind: its name, typed fields, and sendable fields.
#[derive(Debug)]
pub struct Kind {
    /// The kind name as written in source
    pub name: &'static str,
    /// Declared fields and their types, in declaration order
    pub fields: IndexMap<&'static str, Type>,
    /// Fields whose values the resource can send over send/recv edges
    pub sends: IndexSet<&'static str>,
}

impl Kind {
    /// Returns the declared type of a field
    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields.get(name)
    }

    /// Returns true when the field's value can be sent to another resource
    pub fn can_send(&self, name: &str) -> bool {
        self.sends.contains(name)
    }
}

/// The registry of resource kinds known to the engine.
#[derive(Debug)]
pub struct KindRegistry {
    kinds: IndexMap<&'static str, Kind>,
}

impl KindRegistry {
    fn build() -> Self {
        let mut kinds = IndexMap::new();

        let mut test_fields = IndexMap::new();
        test_fields.insert("int64", Type::Int);
        test_fields.insert("int64ptr", Type::Int);
        test_fields.insert("stringptr", Type::Str);
        test_fields.insert("boolptr", Type::Bool);
        test_fields.insert("floatptr", Type::Float);
        test_fields.insert("anotherstr", Type::Str);
        test_fields.insert("hello", Type::Str);
        test_fields.insert("onlyshow", Type::list(Type::Str));
        let mut test_sends = IndexSet::new();
        test_sends.insert("hello");
        kinds.insert("test", Kind {
            name: "test",
            fields: test_fields,
            sends: test_sends,
        });

        let mut noop_fields = IndexMap::new();
        noop_fields.insert("comment", Type::Str);
        kinds.insert("noop", Kind {
            name: "noop",
            fields: noop_fields,
            sends: IndexSet::new(),
        });

        Self { kinds }
    }

    /// Looks up a kind by name
    pub fn kind(&self, name: &str) -> Option<&Kind> {
        self.kinds.get(name)
    }
}

/// Returns the process-wide kind registry, built on first use
pub fn registry() -> &'static KindRegistry {
    static REGISTRY: OnceLock<KindRegistry> = OnceLock::new();
    REGISTRY.get_or_init(KindRegistry::build)
}
