//! Core builtins available without any import.

use crate::{compile::error::CompileError, types::{Type, Value}};

use super::BuiltinFunc;

/// Registry instance of `concat`
pub static CONCAT: ConcatFunc = ConcatFunc { name: "concat" };

/// Registry instance of `fmt.concat`, the system-module alias
pub static FMT_CONCAT: ConcatFunc = ConcatFunc { name: "fmt.concat" };

/// Registry instance of `len`
pub static LEN: LenFunc = LenFunc;

/// Two-argument string concatenation.
///
/// Interpolated string literals are rewritten into left-folded chains of
/// this function, so it is the single most common builtin in the graph.
#[derive(Debug)]
pub struct ConcatFunc {
    name: &'static str,
}

impl BuiltinFunc for ConcatFunc {
    fn name(&self) -> &'static str {
        self.name
    }

    fn signatures(&self, _arg_types: &[Option<Type>], _arg_values: &[Option<Value>]) -> Vec<Type> {
        vec![Type::func(vec![("a", Type::Str), ("b", Type::Str)], Type::Str)]
    }

    fn call(&self, _sig: &Type, args: &[Value]) -> Result<Value, CompileError> {
        match (args.first(), args.get(1)) {
            (Some(Value::Str(a)), Some(Value::Str(b))) => Ok(Value::Str(format!("{a}{b}"))),
            _ => Err(CompileError::stream_failure("concat expects two strings")),
        }
    }
}

/// Polymorphic length: strings, lists and maps.
///
/// With an unknown argument type the signature set still contains variant
/// element types; the solver resolves them through the equalities on the
/// argument expression.
#[derive(Debug)]
pub struct LenFunc;

impl BuiltinFunc for LenFunc {
    fn name(&self) -> &'static str {
        "len"
    }

    fn signatures(&self, arg_types: &[Option<Type>], _arg_values: &[Option<Value>]) -> Vec<Type> {
        match arg_types.first().and_then(|t| t.as_ref()) {
            Some(known) => vec![Type::func(vec![("a", known.clone())], Type::Int)],
            None => vec![
                Type::func(vec![("a", Type::Str)], Type::Int),
                Type::func(vec![("a", Type::list(Type::Variant))], Type::Int),
                Type::func(vec![("a", Type::map(Type::Variant, Type::Variant))], Type::Int),
            ],
        }
    }

    fn call(&self, _sig: &Type, args: &[Value]) -> Result<Value, CompileError> {
        match args.first() {
            Some(Value::Str(value)) => Ok(Value::Int(value.chars().count() as i64)),
            Some(Value::List { values, .. }) => Ok(Value::Int(values.len() as i64)),
            Some(Value::Map { entries, .. }) => Ok(Value::Int(entries.len() as i64)),
            _ => Err(CompileError::stream_failure("len expects a string, list or map")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_joins_strings() {
        let sig = &CONCAT.signatures(&[], &[])[0];
        let result = CONCAT.call(sig, &[Value::Str("hello ".into()), Value::Str("world".into())]).unwrap();
        assert_eq!(result, Value::Str("hello world".into()));
    }

    #[test]
    fn len_signatures_follow_known_types() {
        let unknown = LEN.signatures(&[None], &[None]);
        assert_eq!(unknown.len(), 3);
        assert!(unknown[1].has_variant());

        let known = LEN.signatures(&[Some(Type::list(Type::Int))], &[None]);
        assert_eq!(known, vec![Type::func(vec![("a", Type::list(Type::Int))], Type::Int)]);
    }

    #[test]
    fn len_counts_elements() {
        let sig = &LEN.signatures(&[Some(Type::Str)], &[None])[0];
        assert_eq!(LEN.call(sig, &[Value::Str("abc".into())]).unwrap(), Value::Int(3));

        let list = Value::List { elem: Type::Int, values: vec![Value::Int(1), Value::Int(2)] };
        assert_eq!(LEN.call(sig, &[list]).unwrap(), Value::Int(2));
    }

    #[test]
    fn len_is_unknown_for_other_values() {
        let sig = &LEN.signatures(&[Some(Type::Int)], &[None])[0];
        assert!(LEN.call(sig, &[Value::Int(1)]).is_err());
    }
}
