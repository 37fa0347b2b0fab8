//! The `math` system module.

use crate::{compile::error::CompileError, types::{Type, Value}};

use super::BuiltinFunc;

/// Registry instance of `math.pow`
pub static POW: PowFunc = PowFunc;

/// Registry instance of `math.min`
pub static MIN: MinMaxFunc = MinMaxFunc { name: "math.min", max: false };

/// Registry instance of `math.max`
pub static MAX: MinMaxFunc = MinMaxFunc { name: "math.max", max: true };

/// `math.pow(a, b)` raises a float to a float power
#[derive(Debug)]
pub struct PowFunc;

impl BuiltinFunc for PowFunc {
    fn name(&self) -> &'static str {
        "math.pow"
    }

    fn signatures(&self, _arg_types: &[Option<Type>], _arg_values: &[Option<Value>]) -> Vec<Type> {
        vec![Type::func(vec![("a", Type::Float), ("b", Type::Float)], Type::Float)]
    }

    fn call(&self, _sig: &Type, args: &[Value]) -> Result<Value, CompileError> {
        match (args.first(), args.get(1)) {
            (Some(Value::Float(a)), Some(Value::Float(b))) => Ok(Value::Float(a.powf(*b))),
            _ => Err(CompileError::stream_failure("math.pow expects two floats")),
        }
    }
}

/// `math.min`/`math.max` over two ints
#[derive(Debug)]
pub struct MinMaxFunc {
    name: &'static str,
    max: bool,
}

impl BuiltinFunc for MinMaxFunc {
    fn name(&self) -> &'static str {
        self.name
    }

    fn signatures(&self, _arg_types: &[Option<Type>], _arg_values: &[Option<Value>]) -> Vec<Type> {
        vec![Type::func(vec![("a", Type::Int), ("b", Type::Int)], Type::Int)]
    }

    fn call(&self, _sig: &Type, args: &[Value]) -> Result<Value, CompileError> {
        match (args.first(), args.get(1)) {
            (Some(Value::Int(a)), Some(Value::Int(b))) => {
                Ok(Value::Int(if self.max { *a.max(b) } else { *a.min(b) }))
            }
            _ => Err(CompileError::stream_failure(format!("{} expects two ints", self.name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pow_raises() {
        let sig = &POW.signatures(&[], &[])[0];
        assert_eq!(POW.call(sig, &[Value::Float(2.0), Value::Float(8.0)]).unwrap(), Value::Float(256.0));
    }

    #[test]
    fn min_max_pick_sides() {
        let sig = &MIN.signatures(&[], &[])[0];
        assert_eq!(MIN.call(sig, &[Value::Int(3), Value::Int(5)]).unwrap(), Value::Int(3));
        assert_eq!(MAX.call(sig, &[Value::Int(3), Value::Int(5)]).unwrap(), Value::Int(5));
    }
}
