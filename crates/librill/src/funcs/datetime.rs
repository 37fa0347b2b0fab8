//! The `datetime` system module.

use crate::{compile::error::CompileError, types::{Type, Value}};

use super::BuiltinFunc;

/// Registry instance of `datetime.now`
pub static NOW: NowFunc = NowFunc;

/// The tick value the registry implementation reports when no engine
/// supplies one; engines with a real clock source override it per snapshot
pub static DEFAULT_TICK: i64 = 1609459200;

/// `datetime.now()` — the canonical stream builtin.
///
/// Its vertex re-emits whenever the engine's tick source fires. The
/// deterministic sequential engine emits exactly one snapshot, substituting
/// its configured tick value so oracle outputs stay stable.
#[derive(Debug)]
pub struct NowFunc;

impl BuiltinFunc for NowFunc {
    fn name(&self) -> &'static str {
        "datetime.now"
    }

    fn signatures(&self, _arg_types: &[Option<Type>], _arg_values: &[Option<Value>]) -> Vec<Type> {
        vec![Type::func(vec![], Type::Int)]
    }

    fn call(&self, _sig: &Type, _args: &[Value]) -> Result<Value, CompileError> {
        Ok(Value::Int(DEFAULT_TICK))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_deterministic_without_an_engine() {
        let sig = &NOW.signatures(&[], &[])[0];
        assert_eq!(NOW.call(sig, &[]).unwrap(), Value::Int(DEFAULT_TICK));
        assert_eq!(NOW.call(sig, &[]).unwrap(), Value::Int(DEFAULT_TICK));
    }
}
