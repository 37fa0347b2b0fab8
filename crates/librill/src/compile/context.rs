//! Compile context: the state threaded through every pipeline stage.
//!
//! The AST is immutable after interpolation, so every per-node result lives
//! here in side tables keyed by [`NodeId`]: solved types, variable targets,
//! per-use-site instantiations of classes and callees, published scopes and
//! loaded modules. The context also owns the node indexer so copies and
//! synthesized nodes get ids that never collide with parsed ones.

use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::{
    ast::{Expr, FuncExpr, FuncKind, NodeId, Prog},
    compile::{error::CompileError, scope::{Scope, ScopeLocation}},
    file::SourceFile,
    funcs,
    nom_tools::{Span, State},
    types::Type,
};

/// A per-call-site instantiation of a callee.
#[derive(Debug, Clone)]
pub struct CallInstance<'base> {
    /// The callee function expression; a fresh copy for rill-defined
    /// functions, the shared registry node for builtins
    pub func: Rc<Expr<'base>>,
    /// The call's argument expressions
    pub args: Vec<Rc<Expr<'base>>>,
    /// Registry name when the callee is a builtin
    pub builtin: Option<String>,
}

/// A per-use-site instantiation of a class body.
#[derive(Debug, Clone)]
pub struct IncludeInstance<'base> {
    /// The instantiated copy of the class body
    pub body: Rc<Prog<'base>>,
}

/// The module an import statement resolved to.
#[derive(Debug, Clone)]
pub struct ImportInstance {
    /// Canonical module key (vfs path, or bare name for system modules)
    pub key: String,
    /// The alias the module's exports are merged under
    pub alias: String,
    /// Whether this is a built-in system module
    pub system: bool,
}

/// The published exports of a loaded module.
#[derive(Debug, Clone)]
pub struct ModuleExports<'base> {
    /// The module's program; `None` for system modules
    pub prog: Option<Rc<Prog<'base>>>,
    /// The module's published scope (variables, functions, classes)
    pub scope: Scope<'base>,
}

/// The central compilation state.
#[derive(Debug)]
pub struct CompileContext<'base> {
    /// Node id counter shared with every parser state of this compilation
    pub indexer: Arc<AtomicUsize>,
    /// Published scope arena
    pub scopes: Vec<Scope<'base>>,
    /// Solved expression types
    pub node_types: IndexMap<NodeId, Type>,
    /// Variable reference → producing expression
    pub var_targets: IndexMap<NodeId, Rc<Expr<'base>>>,
    /// Call site → instantiated callee
    pub call_instances: IndexMap<NodeId, CallInstance<'base>>,
    /// Include site → instantiated class body
    pub include_instances: IndexMap<NodeId, IncludeInstance<'base>>,
    /// Function expression → its definition scope
    pub func_scopes: IndexMap<NodeId, ScopeLocation>,
    /// Class declaration → its definition scope
    pub class_scopes: IndexMap<NodeId, ScopeLocation>,
    /// Statements that survived dead-code elimination and were set-scoped
    pub active: IndexSet<NodeId>,
    /// Import statement → resolved module
    pub imports: IndexMap<NodeId, ImportInstance>,
    /// Loaded modules by canonical key
    pub modules_loaded: IndexMap<String, ModuleExports<'base>>,
    /// Module keys currently being resolved; enforces import DAG-ness
    pub module_stack: Vec<String>,
    /// Shared builtin function nodes by registry name
    pub builtin_nodes: IndexMap<String, Rc<Expr<'base>>>,
    /// Errors accumulated before the stage aborts
    pub errors: Vec<CompileError>,
    /// Parser state used for synthesized nodes
    builtin_state: State,
}

impl<'base> CompileContext<'base> {
    /// Creates a context sharing the given node indexer
    pub fn new(indexer: Arc<AtomicUsize>) -> Self {
        let builtin_state = State::with_indexer(
            SourceFile::new(vec!["<builtin>".into()], String::new()),
            indexer.clone(),
        );
        Self {
            indexer,
            scopes: Vec::new(),
            node_types: IndexMap::new(),
            var_targets: IndexMap::new(),
            call_instances: IndexMap::new(),
            include_instances: IndexMap::new(),
            func_scopes: IndexMap::new(),
            class_scopes: IndexMap::new(),
            active: IndexSet::new(),
            imports: IndexMap::new(),
            modules_loaded: IndexMap::new(),
            module_stack: Vec::new(),
            builtin_nodes: IndexMap::new(),
            errors: Vec::new(),
            builtin_state,
        }
    }

    /// Hands out the next unique node id
    pub fn next_id(&self) -> NodeId {
        NodeId(self.indexer.fetch_add(1, Ordering::SeqCst))
    }

    /// A span for synthesized nodes with no source position
    pub fn synthetic_span(&self) -> Span<'base> {
        Span {
            text: "",
            position: 0..0,
            state: self.builtin_state.clone(),
        }
    }

    /// Publishes a scope into the arena and returns its location
    pub fn publish_scope(&mut self, scope: Scope<'base>) -> ScopeLocation {
        let location = ScopeLocation(self.scopes.len());
        simplelog::debug!("<on-yellow>publishing scope</> {}", location.0);
        self.scopes.push(scope);
        location
    }

    /// Returns a published scope
    pub fn get_scope(&self, location: ScopeLocation) -> Option<&Scope<'base>> {
        self.scopes.get(location.0)
    }

    /// Returns the solved type of an expression, if any
    pub fn type_of(&self, id: NodeId) -> Option<&Type> {
        self.node_types.get(&id)
    }

    /// Returns the shared function-expression node for a registry builtin.
    ///
    /// Builtin nodes are created once per compilation and shared between
    /// every use site, like literal leaves.
    pub fn builtin_func(&mut self, name: &str) -> Option<Rc<Expr<'base>>> {
        if let Some(node) = self.builtin_nodes.get(name) {
            return Some(node.clone());
        }

        let entry = funcs::registry().get(name)?;
        let span = self.synthetic_span();
        let kind = if entry.overloaded() {
            FuncKind::Overload(name.to_string())
        } else {
            FuncKind::Builtin(name.to_string())
        };

        let node = Rc::new(Expr::Func(FuncExpr {
            id: self.next_id(),
            span,
            title: std::borrow::Cow::Owned(name.to_string()),
            params: Vec::new(),
            ret: None,
            kind,
        }));
        self.builtin_nodes.insert(name.to_string(), node.clone());
        Some(node)
    }

    /// Records an error without aborting the current walk
    pub fn add_error(&mut self, error: CompileError) {
        self.errors.push(error);
    }

    /// Returns the accumulated errors as one error, if any
    pub fn take_errors(&mut self) -> Option<CompileError> {
        match self.errors.len() {
            0 => None,
            1 => Some(self.errors.remove(0)),
            _ => Some(CompileError::multiple_errors(std::mem::take(&mut self.errors))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_continue_past_parsed_nodes() {
        let indexer = Arc::new(AtomicUsize::new(7));
        let context = CompileContext::new(indexer);
        assert_eq!(context.next_id(), NodeId(7));
        assert_eq!(context.next_id(), NodeId(8));
    }

    #[test]
    fn builtin_nodes_are_shared() {
        let mut context = CompileContext::new(Arc::new(AtomicUsize::new(0)));
        let first = context.builtin_func("operator").expect("operator is registered");
        let second = context.builtin_func("operator").expect("operator is registered");
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn unknown_builtin_is_none() {
        let mut context = CompileContext::new(Arc::new(AtomicUsize::new(0)));
        assert!(context.builtin_func("no_such_builtin").is_none());
    }

    #[test]
    fn take_errors_folds_multiples() {
        let mut context = CompileContext::new(Arc::new(AtomicUsize::new(0)));
        assert!(context.take_errors().is_none());

        let source = SourceFile::new(vec!["<memory>".into()], "x".to_string());
        context.add_error(CompileError::unsolved(0..1, source.clone()));
        assert!(matches!(context.take_errors(), Some(CompileError::Unsolved(_))));

        context.add_error(CompileError::unsolved(0..1, source.clone()));
        context.add_error(CompileError::unsolved(0..1, source));
        assert!(matches!(context.take_errors(), Some(CompileError::ErrorCollection(_))));
    }
}
