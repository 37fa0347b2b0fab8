//! Type system for the rill language.
//!
//! [`Type`] is the structural type of a value stream and [`Value`] its
//! inhabitant. Types are compared structurally; struct types preserve field
//! order. The `Variant` kind is an underspecified-type placeholder used only
//! inside the unifier for overloaded signatures and must never survive a
//! successful unification.

use std::fmt::{Display, Formatter};

use strum_macros::{EnumDiscriminants, EnumIs};

use crate::ast::NodeId;

/// The structural type of an expression's value stream.
///
/// Comparison is structural: struct field names and order matter, while
/// function parameter names are display-only and ignored.
#[derive(Debug, Clone, EnumDiscriminants, EnumIs)]
#[strum_discriminants(name(TypeKind), vis(pub))]
pub enum Type {
    /// Boolean type
    Bool,
    /// String type
    Str,
    /// 64-bit signed integer type
    Int,
    /// 64-bit float type
    Float,
    /// Homogeneous list type
    List(Box<Type>),
    /// Homogeneous map type
    Map(Box<Type>, Box<Type>),
    /// Struct type with ordered fields
    Struct(Vec<(String, Type)>),
    /// Function type with named, ordered parameters
    Func {
        /// Ordered (name, type) parameters
        params: Vec<(String, Type)>,
        /// Return type
        ret: Box<Type>,
    },
    /// Underspecified-type placeholder; internal to the unifier
    Variant,
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Bool, Type::Bool)
            | (Type::Str, Type::Str)
            | (Type::Int, Type::Int)
            | (Type::Float, Type::Float)
            | (Type::Variant, Type::Variant) => true,
            (Type::List(a), Type::List(b)) => a == b,
            (Type::Map(ak, av), Type::Map(bk, bv)) => ak == bk && av == bv,
            (Type::Struct(a), Type::Struct(b)) => a == b,
            (Type::Func { params: ap, ret: ar }, Type::Func { params: bp, ret: br }) => {
                ap.len() == bp.len()
                    && ap.iter().zip(bp.iter()).all(|((_, a), (_, b))| a == b)
                    && ar == br
            }
            _ => false,
        }
    }
}

impl Type {
    /// Returns true if this type or any nested type is `Variant`
    pub fn has_variant(&self) -> bool {
        match self {
            Type::Variant => true,
            Type::Bool | Type::Str | Type::Int | Type::Float => false,
            Type::List(elem) => elem.has_variant(),
            Type::Map(key, val) => key.has_variant() || val.has_variant(),
            Type::Struct(fields) => fields.iter().any(|(_, t)| t.has_variant()),
            Type::Func { params, ret } => params.iter().any(|(_, t)| t.has_variant()) || ret.has_variant(),
        }
    }

    /// Convenience constructor for list types
    pub fn list(elem: Type) -> Self {
        Type::List(Box::new(elem))
    }

    /// Convenience constructor for map types
    pub fn map(key: Type, val: Type) -> Self {
        Type::Map(Box::new(key), Box::new(val))
    }

    /// Convenience constructor for function types
    pub fn func(params: Vec<(&str, Type)>, ret: Type) -> Self {
        Type::Func {
            params: params.into_iter().map(|(name, t)| (name.to_string(), t)).collect(),
            ret: Box::new(ret),
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Str => write!(f, "str"),
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::List(elem) => write!(f, "[]{elem}"),
            Type::Map(key, val) => write!(f, "map{{{key}: {val}}}"),
            Type::Struct(fields) => {
                write!(f, "struct{{")?;
                for (i, (name, t)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{name} {t}")?;
                }
                write!(f, "}}")
            }
            Type::Func { params, ret } => {
                write!(f, "func(")?;
                for (i, (_, t)) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ") {ret}")
            }
            Type::Variant => write!(f, "variant"),
        }
    }
}

/// The implementation behind a function-typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum FuncImpl {
    /// A rill-defined function; the value of the function is the value of
    /// its body vertex in the function graph
    Graph {
        /// Node id of the body expression's vertex
        body: NodeId,
    },
    /// A built-in function resolved from the process registry
    Builtin {
        /// Registry name of the builtin
        name: String,
    },
}

/// A typed runtime value.
///
/// Every stored value satisfies `value.r#type() == declared type`; list, map
/// and struct values demand all element sub-values share the declared
/// element/field type exactly.
#[derive(Debug, Clone, PartialEq, EnumIs)]
pub enum Value {
    /// Boolean value
    Bool(bool),
    /// String value
    Str(String),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// List value together with its declared element type
    List {
        /// Declared element type
        elem: Type,
        /// Element values
        values: Vec<Value>,
    },
    /// Map value together with its declared key/value types
    Map {
        /// Declared key type
        key: Type,
        /// Declared value type
        val: Type,
        /// Entries in insertion order
        entries: Vec<(Value, Value)>,
    },
    /// Struct value with ordered fields
    Struct(Vec<(String, Value)>),
    /// Function value
    Func {
        /// The function's signature
        sig: Type,
        /// The implementation behind the value
        imp: FuncImpl,
    },
}

impl Value {
    /// Derives the type of this value
    pub fn r#type(&self) -> Type {
        match self {
            Value::Bool(_) => Type::Bool,
            Value::Str(_) => Type::Str,
            Value::Int(_) => Type::Int,
            Value::Float(_) => Type::Float,
            Value::List { elem, .. } => Type::List(Box::new(elem.clone())),
            Value::Map { key, val, .. } => Type::Map(Box::new(key.clone()), Box::new(val.clone())),
            Value::Struct(fields) => Type::Struct(fields.iter().map(|(name, v)| (name.clone(), v.r#type())).collect()),
            Value::Func { sig, .. } => sig.clone(),
        }
    }

    /// Returns the bool payload, if this is a bool value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string payload, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an integer value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(value) => write!(f, "{value}"),
            Value::Str(value) => write!(f, "{value:?}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::List { values, .. } => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            Value::Map { entries, .. } => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Value::Struct(fields) => {
                write!(f, "struct{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, "}}")
            }
            Value::Func { sig, .. } => write!(f, "{sig}"),
        }
    }
}
