//! Lexical scope for the rill compiler.
//!
//! A [`Scope`] is the triple of maps (variables, functions, classes) plus
//! the positional-argument `indexes` stack and the `chain` of originating
//! include/call nodes used for recursion detection.
//!
//! Scopes are immutable once published into the context arena; callers
//! obtain derived scopes by copy + overwrite, so shadowing across nesting
//! boundaries works while duplicate bindings within one program block are
//! rejected by the validated insert.

use std::borrow::Cow;
use std::rc::Rc;

use crate::{
    ast::{ClassStmt, Expr, NodeId},
    compile::error::CompileError,
    map::{OrderedMap, ValueTrait},
    nom_tools::Span,
};

/// A unique identifier for a published scope within the compile context.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScopeLocation(pub usize);

impl ScopeLocation {
    /// Represents an undefined or unpublished scope location.
    pub const UNDEFINED: Self = ScopeLocation(usize::MAX);
}

impl From<usize> for ScopeLocation {
    fn from(location: usize) -> Self {
        ScopeLocation(location)
    }
}

/// A variable binding: the producing expression and the binding-site span
#[derive(Debug, Clone)]
pub struct ScopeVar<'base> {
    /// The expression the name is bound to; a non-owning reference into the
    /// binding program
    pub expr: Rc<Expr<'base>>,
    /// Span of the binding name, used for duplicate reporting
    pub span: Span<'base>,
}

impl<'base> ValueTrait<'base> for ScopeVar<'base> {
    fn get_span(&self) -> Span<'base> {
        self.span.clone()
    }
}

/// A function binding: the function expression and the declaration span
#[derive(Debug, Clone)]
pub struct ScopeFunc<'base> {
    /// The function expression (rill-defined or builtin)
    pub func: Rc<Expr<'base>>,
    /// Span of the declaration name
    pub span: Span<'base>,
}

impl<'base> ValueTrait<'base> for ScopeFunc<'base> {
    fn get_span(&self) -> Span<'base> {
        self.span.clone()
    }
}

/// A class binding: the class declaration and its name span
#[derive(Debug, Clone)]
pub struct ScopeClass<'base> {
    /// The class declaration
    pub class: Rc<ClassStmt<'base>>,
    /// Span of the declaration name
    pub span: Span<'base>,
}

impl<'base> ValueTrait<'base> for ScopeClass<'base> {
    fn get_span(&self) -> Span<'base> {
        self.span.clone()
    }
}

/// The lexical scope threaded through scope resolution.
#[derive(Debug, Clone, Default)]
pub struct Scope<'base> {
    /// Variable bindings by name
    pub variables: OrderedMap<'base, Cow<'base, str>, ScopeVar<'base>>,
    /// Function bindings by name
    pub functions: OrderedMap<'base, Cow<'base, str>, ScopeFunc<'base>>,
    /// Class bindings by name
    pub classes: OrderedMap<'base, Cow<'base, str>, ScopeClass<'base>>,
    /// Stack of positional-argument lists pushed by call sites
    pub indexes: Vec<Vec<Rc<Expr<'base>>>>,
    /// Originating include/call node ids currently being instantiated
    pub chain: Vec<NodeId>,
}

impl<'base> Scope<'base> {
    /// Creates an empty scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives a child scope by copying; the copy can be overwritten
    /// without affecting the published original
    pub fn derive(&self) -> Scope<'base> {
        self.clone()
    }

    /// Looks up a variable binding
    pub fn get_variable(&self, name: &str) -> Option<&ScopeVar<'base>> {
        self.variables.get(name)
    }

    /// Looks up a function binding
    pub fn get_function(&self, name: &str) -> Option<&ScopeFunc<'base>> {
        self.functions.get(name)
    }

    /// Looks up a class binding
    pub fn get_class(&self, name: &str) -> Option<&ScopeClass<'base>> {
        self.classes.get(name)
    }

    /// Adds a variable binding, rejecting in-scope duplicates
    pub fn add_variable(&mut self, name: Cow<'base, str>, variable: ScopeVar<'base>) -> Result<(), CompileError> {
        simplelog::debug!("scope: add variable <u><b>${name}</b></u>");
        self.variables.validate_insert(name, variable)
    }

    /// Adds (or shadows) a variable binding without duplicate detection;
    /// used when deriving scopes across nesting boundaries
    pub fn shadow_variable(&mut self, name: Cow<'base, str>, variable: ScopeVar<'base>) {
        simplelog::debug!("scope: shadow variable <u><b>${name}</b></u>");
        self.variables.insert(name, variable);
    }

    /// Adds a function binding, rejecting in-scope duplicates
    pub fn add_function(&mut self, name: Cow<'base, str>, function: ScopeFunc<'base>) -> Result<(), CompileError> {
        simplelog::debug!("scope: add function <u><b>{name}</b></u>");
        self.functions.validate_insert(name, function)
    }

    /// Adds (or shadows) a function binding without duplicate detection
    pub fn shadow_function(&mut self, name: Cow<'base, str>, function: ScopeFunc<'base>) {
        self.functions.insert(name, function);
    }

    /// Adds a class binding, rejecting in-scope duplicates
    pub fn add_class(&mut self, name: Cow<'base, str>, class: ScopeClass<'base>) -> Result<(), CompileError> {
        simplelog::debug!("scope: add class <u><b>{name}</b></u>");
        self.classes.validate_insert(name, class)
    }

    /// Adds (or shadows) a class binding without duplicate detection
    pub fn shadow_class(&mut self, name: Cow<'base, str>, class: ScopeClass<'base>) {
        self.classes.insert(name, class);
    }

    /// Returns names in scope that end with the given suffix, for
    /// "did you mean" advice
    pub fn similar_names(&self, name: &str) -> Vec<String> {
        let mut similar = Vec::new();
        for key in self.variables.keys().chain(self.functions.keys()).chain(self.classes.keys()) {
            if key.ends_with(name) || name.ends_with(key.as_ref()) {
                similar.push(key.to_string());
            }
        }
        similar
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::{ast::{Expr, IntExpr}, file::SourceFile, nom_tools::State};

    fn scope_var(state: &State, text: &'static str, start: usize) -> ScopeVar<'static> {
        let span = Span {
            text,
            position: start..start + text.len(),
            state: state.clone(),
        };
        ScopeVar {
            expr: Rc::new(Expr::Int(IntExpr { id: state.next_id(), span: span.clone(), value: 0 })),
            span,
        }
    }

    #[test]
    fn duplicate_variable_in_one_scope_is_rejected() {
        let state = State::new(SourceFile::new(vec!["<memory>".into()], "a a".to_string()));
        let mut scope = Scope::new();

        scope.add_variable("a".into(), scope_var(&state, "a", 0)).unwrap();
        assert!(scope.add_variable("a".into(), scope_var(&state, "a", 2)).is_err());
    }

    #[test]
    fn derived_scope_shadows_without_touching_parent() {
        let state = State::new(SourceFile::new(vec!["<memory>".into()], "x y".to_string()));
        let mut outer = Scope::new();
        outer.add_variable("x".into(), scope_var(&state, "x", 0)).unwrap();

        let mut inner = outer.derive();
        inner.shadow_variable("x".into(), scope_var(&state, "y", 2));

        assert_eq!(outer.get_variable("x").unwrap().span.text, "x");
        assert_eq!(inner.get_variable("x").unwrap().span.text, "y");
    }

    #[test]
    fn similar_names_suggests_suffix_matches() {
        let state = State::new(SourceFile::new(vec!["<memory>".into()], "count".to_string()));
        let mut scope = Scope::new();
        scope.add_variable("count".into(), scope_var(&state, "count", 0)).unwrap();

        assert_eq!(scope.similar_names("count"), vec!["count".to_string()]);
        assert!(scope.similar_names("zzz").is_empty());
    }
}
