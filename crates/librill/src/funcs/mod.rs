//! Built-in function registry.
//!
//! Builtins are registered once at process startup into a read-only
//! registry: plain names for the always-available core functions
//! (`operator`, `concat`, `len`) and dotted names for the functions a
//! system import brings into scope (`math.pow`, `strings.repeat`, …).
//!
//! Overloaded and polymorphic builtins are modeled as sets of monomorphic
//! signatures: during unification the registry entry is asked for its
//! possible signatures given the partial argument types and values known at
//! the call site, and the solver commits to exactly one via an exclusive
//! constraint.

use std::fmt::Debug;
use std::sync::OnceLock;

use indexmap::IndexMap;

use crate::{compile::error::CompileError, types::{Type, Value}};

mod core;
mod datetime;
mod math;
mod operator;
mod strings;

/// A built-in function implementation.
pub trait BuiltinFunc: Send + Sync + Debug {
    /// The registry name, dotted for module members (`math.pow`)
    fn name(&self) -> &'static str;

    /// Possible signatures given partial argument types and values.
    ///
    /// `arg_types[i]`/`arg_values[i]` are `Some` when the i-th argument's
    /// type/value is already known at the call site. An empty slice means
    /// nothing is known, not a zero-argument call.
    fn signatures(&self, arg_types: &[Option<Type>], arg_values: &[Option<Value>]) -> Vec<Type>;

    /// Whether this entry is a set of overloaded signatures rather than a
    /// single implementation
    fn overloaded(&self) -> bool {
        self.signatures(&[], &[]).len() > 1
    }

    /// Applies the function under the committed signature.
    ///
    /// Runs inside the streaming evaluator; failures surface as stream
    /// errors.
    fn call(&self, sig: &Type, args: &[Value]) -> Result<Value, CompileError>;
}

/// The process-wide builtin registry.
#[derive(Debug)]
pub struct Registry {
    funcs: IndexMap<&'static str, &'static dyn BuiltinFunc>,
    modules: IndexMap<&'static str, Vec<&'static str>>,
}

impl Registry {
    fn build() -> Self {
        let mut funcs: IndexMap<&'static str, &'static dyn BuiltinFunc> = IndexMap::new();
        let mut modules: IndexMap<&'static str, Vec<&'static str>> = IndexMap::new();

        for func in [
            &operator::OPERATOR as &'static dyn BuiltinFunc,
            &core::CONCAT,
            &core::LEN,
            &core::FMT_CONCAT,
            &math::POW,
            &math::MIN,
            &math::MAX,
            &strings::TO_LOWER,
            &strings::REPEAT,
            &datetime::NOW,
        ] {
            funcs.insert(func.name(), func);

            if let Some((module, _)) = func.name().split_once('.') {
                modules.entry(module).or_default().push(func.name());
            }
        }

        Self { funcs, modules }
    }

    /// Looks up a builtin by registry name
    pub fn get(&self, name: &str) -> Option<&'static dyn BuiltinFunc> {
        self.funcs.get(name).copied()
    }

    /// Returns the qualified member names of a system module, if registered
    pub fn module(&self, name: &str) -> Option<&[&'static str]> {
        self.modules.get(name).map(|members| members.as_slice())
    }

    /// Returns true if the name denotes a registered system module
    pub fn is_module(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }
}

/// Returns the process-wide builtin registry, built on first use
pub fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::build)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_builtins_are_registered() {
        let registry = registry();
        assert!(registry.get("operator").is_some());
        assert!(registry.get("concat").is_some());
        assert!(registry.get("len").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn system_modules_list_their_members() {
        let registry = registry();
        let math = registry.module("math").expect("math is registered");
        assert!(math.contains(&"math.pow"));
        assert!(registry.is_module("strings"));
        assert!(!registry.is_module("operator"));
    }

    #[test]
    fn overload_classification() {
        let registry = registry();
        assert!(registry.get("operator").unwrap().overloaded());
        assert!(registry.get("len").unwrap().overloaded());
        assert!(!registry.get("concat").unwrap().overloaded());
    }
}
