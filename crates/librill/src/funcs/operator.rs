//! The overloaded `operator` builtin.
//!
//! Every binary and unary operator in source desugars to a call of this
//! function with the operator symbol as its first argument (`x`), so
//! `42 + 13` reaches the evaluator as `operator("+", 42, 13)`. The symbol
//! is almost always a literal, which lets the signature query prune the
//! overload set down before the solver searches it.

use crate::{compile::error::CompileError, types::{Type, Value}};

use super::BuiltinFunc;

/// Registry instance
pub static OPERATOR: OperatorFunc = OperatorFunc;

/// Overload table rows: symbol, operand type, result type, operand count
static OVERLOADS: &[(&str, Type, Type, usize)] = &[
    ("+", Type::Int, Type::Int, 2),
    ("+", Type::Float, Type::Float, 2),
    ("+", Type::Str, Type::Str, 2),
    ("-", Type::Int, Type::Int, 2),
    ("-", Type::Float, Type::Float, 2),
    ("*", Type::Int, Type::Int, 2),
    ("*", Type::Float, Type::Float, 2),
    ("/", Type::Int, Type::Int, 2),
    ("/", Type::Float, Type::Float, 2),
    ("<", Type::Int, Type::Bool, 2),
    ("<", Type::Float, Type::Bool, 2),
    (">", Type::Int, Type::Bool, 2),
    (">", Type::Float, Type::Bool, 2),
    ("<=", Type::Int, Type::Bool, 2),
    ("<=", Type::Float, Type::Bool, 2),
    (">=", Type::Int, Type::Bool, 2),
    (">=", Type::Float, Type::Bool, 2),
    ("==", Type::Int, Type::Bool, 2),
    ("==", Type::Float, Type::Bool, 2),
    ("==", Type::Str, Type::Bool, 2),
    ("==", Type::Bool, Type::Bool, 2),
    ("!=", Type::Int, Type::Bool, 2),
    ("!=", Type::Float, Type::Bool, 2),
    ("!=", Type::Str, Type::Bool, 2),
    ("!=", Type::Bool, Type::Bool, 2),
    ("and", Type::Bool, Type::Bool, 2),
    ("or", Type::Bool, Type::Bool, 2),
    ("not", Type::Bool, Type::Bool, 1),
];

/// The `operator` builtin
#[derive(Debug)]
pub struct OperatorFunc;

fn signature(operand: &Type, result: &Type, operands: usize) -> Type {
    let mut params = vec![("x".to_string(), Type::Str), ("a".to_string(), operand.clone())];
    if operands == 2 {
        params.push(("b".to_string(), operand.clone()));
    }
    Type::Func { params, ret: Box::new(result.clone()) }
}

impl BuiltinFunc for OperatorFunc {
    fn name(&self) -> &'static str {
        "operator"
    }

    fn signatures(&self, arg_types: &[Option<Type>], arg_values: &[Option<Value>]) -> Vec<Type> {
        let symbol = arg_values.first().and_then(|value| value.as_ref()).and_then(|value| value.as_str());
        let operand_count = match arg_types.len() {
            0 => None,
            n => Some(n - 1),
        };

        OVERLOADS
            .iter()
            .filter(|(op, operand, _, operands)| {
                if let Some(symbol) = symbol {
                    if symbol != *op {
                        return false;
                    }
                }
                if let Some(count) = operand_count {
                    if count != *operands {
                        return false;
                    }
                }
                // prune by any operand type already known at the call site
                for known in arg_types.iter().skip(1).flatten() {
                    if known != operand {
                        return false;
                    }
                }
                true
            })
            .map(|(_, operand, result, operands)| signature(operand, result, *operands))
            .collect()
    }

    fn call(&self, sig: &Type, args: &[Value]) -> Result<Value, CompileError> {
        let symbol = args
            .first()
            .and_then(|value| value.as_str())
            .ok_or_else(|| CompileError::stream_failure("operator symbol missing"))?;

        let result = match (symbol, args.get(1), args.get(2)) {
            ("+", Some(Value::Int(a)), Some(Value::Int(b))) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or_else(|| CompileError::stream_failure("integer overflow in '+'"))?,
            ("+", Some(Value::Float(a)), Some(Value::Float(b))) => Value::Float(a + b),
            ("+", Some(Value::Str(a)), Some(Value::Str(b))) => Value::Str(format!("{a}{b}")),
            ("-", Some(Value::Int(a)), Some(Value::Int(b))) => a
                .checked_sub(*b)
                .map(Value::Int)
                .ok_or_else(|| CompileError::stream_failure("integer overflow in '-'"))?,
            ("-", Some(Value::Float(a)), Some(Value::Float(b))) => Value::Float(a - b),
            ("*", Some(Value::Int(a)), Some(Value::Int(b))) => a
                .checked_mul(*b)
                .map(Value::Int)
                .ok_or_else(|| CompileError::stream_failure("integer overflow in '*'"))?,
            ("*", Some(Value::Float(a)), Some(Value::Float(b))) => Value::Float(a * b),
            ("/", Some(Value::Int(a)), Some(Value::Int(b))) => {
                if *b == 0 {
                    return Err(CompileError::stream_failure("division by zero"));
                }
                Value::Int(a / b)
            }
            ("/", Some(Value::Float(a)), Some(Value::Float(b))) => Value::Float(a / b),
            ("<", Some(Value::Int(a)), Some(Value::Int(b))) => Value::Bool(a < b),
            ("<", Some(Value::Float(a)), Some(Value::Float(b))) => Value::Bool(a < b),
            (">", Some(Value::Int(a)), Some(Value::Int(b))) => Value::Bool(a > b),
            (">", Some(Value::Float(a)), Some(Value::Float(b))) => Value::Bool(a > b),
            ("<=", Some(Value::Int(a)), Some(Value::Int(b))) => Value::Bool(a <= b),
            ("<=", Some(Value::Float(a)), Some(Value::Float(b))) => Value::Bool(a <= b),
            (">=", Some(Value::Int(a)), Some(Value::Int(b))) => Value::Bool(a >= b),
            (">=", Some(Value::Float(a)), Some(Value::Float(b))) => Value::Bool(a >= b),
            ("==", Some(a), Some(b)) => Value::Bool(a == b),
            ("!=", Some(a), Some(b)) => Value::Bool(a != b),
            ("and", Some(Value::Bool(a)), Some(Value::Bool(b))) => Value::Bool(*a && *b),
            ("or", Some(Value::Bool(a)), Some(Value::Bool(b))) => Value::Bool(*a || *b),
            ("not", Some(Value::Bool(a)), None) => Value::Bool(!a),
            _ => {
                return Err(CompileError::stream_failure(format!(
                    "operator '{symbol}' cannot be applied to these operands"
                )));
            }
        };

        // the committed signature and the produced value must agree
        if let Type::Func { ret, .. } = sig {
            if result.r#type() != **ret {
                return Err(CompileError::stream_failure(format!(
                    "operator '{symbol}' produced {} where {} was expected",
                    result.r#type(),
                    ret
                )));
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::funcs::BuiltinFunc;

    fn known(values: &[Value]) -> (Vec<Option<Type>>, Vec<Option<Value>>) {
        (
            values.iter().map(|value| Some(value.r#type())).collect(),
            values.iter().map(|value| Some(value.clone())).collect(),
        )
    }

    #[test]
    fn symbol_prunes_the_overload_set() {
        let (types, values) = known(&[Value::Str("+".into())]);
        // only the symbol is known, not the operands
        let sigs = OPERATOR.signatures(&types[..1], &values[..1]);
        assert_eq!(sigs.len(), 3); // int, float, str variants of "+"
    }

    #[test]
    fn operand_types_prune_to_one() {
        let types = vec![Some(Type::Str), Some(Type::Int), Some(Type::Int)];
        let values = vec![Some(Value::Str("+".into())), None, None];
        let sigs = OPERATOR.signatures(&types, &values);
        assert_eq!(sigs.len(), 1);
        assert_eq!(sigs[0], Type::func(vec![("x", Type::Str), ("a", Type::Int), ("b", Type::Int)], Type::Int));
    }

    #[rstest]
    #[case("+", Value::Int(42), Value::Int(13), Value::Int(55))]
    #[case("-", Value::Int(10), Value::Int(4), Value::Int(6))]
    #[case("*", Value::Int(6), Value::Int(7), Value::Int(42))]
    #[case("/", Value::Int(9), Value::Int(2), Value::Int(4))]
    #[case("+", Value::Str("ab".into()), Value::Str("cd".into()), Value::Str("abcd".into()))]
    #[case("<", Value::Int(1), Value::Int(2), Value::Bool(true))]
    #[case("==", Value::Str("x".into()), Value::Str("x".into()), Value::Bool(true))]
    #[case("and", Value::Bool(true), Value::Bool(false), Value::Bool(false))]
    fn binary_application(#[case] op: &str, #[case] a: Value, #[case] b: Value, #[case] expected: Value) {
        let args = [Value::Str(op.into()), a, b];
        let (types, values) = known(&args);
        let sigs = OPERATOR.signatures(&types, &values);
        assert_eq!(sigs.len(), 1, "{op}");
        assert_eq!(OPERATOR.call(&sigs[0], &args).unwrap(), expected);
    }

    #[test]
    fn unary_not() {
        let args = [Value::Str("not".into()), Value::Bool(true)];
        let (types, values) = known(&args);
        let sigs = OPERATOR.signatures(&types, &values);
        assert_eq!(sigs.len(), 1);
        assert_eq!(OPERATOR.call(&sigs[0], &args).unwrap(), Value::Bool(false));
    }

    #[test]
    fn division_by_zero_is_a_stream_error() {
        let args = [Value::Str("/".into()), Value::Int(1), Value::Int(0)];
        let (types, values) = known(&args);
        let sigs = OPERATOR.signatures(&types, &values);
        assert!(OPERATOR.call(&sigs[0], &args).is_err());
    }
}
