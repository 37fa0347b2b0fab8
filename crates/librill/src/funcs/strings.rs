//! The `strings` system module.

use crate::{compile::error::CompileError, types::{Type, Value}};

use super::BuiltinFunc;

/// Registry instance of `strings.to_lower`
pub static TO_LOWER: ToLowerFunc = ToLowerFunc;

/// Registry instance of `strings.repeat`
pub static REPEAT: RepeatFunc = RepeatFunc;

/// `strings.to_lower(a)` lowercases a string
#[derive(Debug)]
pub struct ToLowerFunc;

impl BuiltinFunc for ToLowerFunc {
    fn name(&self) -> &'static str {
        "strings.to_lower"
    }

    fn signatures(&self, _arg_types: &[Option<Type>], _arg_values: &[Option<Value>]) -> Vec<Type> {
        vec![Type::func(vec![("a", Type::Str)], Type::Str)]
    }

    fn call(&self, _sig: &Type, args: &[Value]) -> Result<Value, CompileError> {
        match args.first() {
            Some(Value::Str(value)) => Ok(Value::Str(value.to_lowercase())),
            _ => Err(CompileError::stream_failure("strings.to_lower expects a string")),
        }
    }
}

/// `strings.repeat(a, b)` repeats a string b times
#[derive(Debug)]
pub struct RepeatFunc;

impl BuiltinFunc for RepeatFunc {
    fn name(&self) -> &'static str {
        "strings.repeat"
    }

    fn signatures(&self, _arg_types: &[Option<Type>], _arg_values: &[Option<Value>]) -> Vec<Type> {
        vec![Type::func(vec![("a", Type::Str), ("b", Type::Int)], Type::Str)]
    }

    fn call(&self, _sig: &Type, args: &[Value]) -> Result<Value, CompileError> {
        match (args.first(), args.get(1)) {
            (Some(Value::Str(value)), Some(Value::Int(count))) => {
                let count = usize::try_from(*count)
                    .map_err(|_| CompileError::stream_failure("strings.repeat count must not be negative"))?;
                Ok(Value::Str(value.repeat(count)))
            }
            _ => Err(CompileError::stream_failure("strings.repeat expects a string and an int")),
        }
    }
}
