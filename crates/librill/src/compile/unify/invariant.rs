//! Type invariants.
//!
//! Each AST node contributes invariants describing how its type relates to
//! its neighbors; the solver turns the collected list into a total type
//! assignment. `Equals` with a `Variant`-carrying type is a shape pattern:
//! the expression must solve to a type the pattern matches, with `Variant`
//! standing for any type.

use std::rc::Rc;

use crate::{ast::Expr, types::Type};

/// A single structural type constraint.
#[derive(Debug, Clone)]
pub enum Invariant<'base> {
    /// The expression has exactly this type; `Variant` inside the type acts
    /// as a wildcard the solver must see filled by other constraints
    Equals {
        /// Constrained expression
        expr: Rc<Expr<'base>>,
        /// Required type or shape pattern
        ty: Type,
    },
    /// Two expressions share one type
    Equality {
        /// One side
        left: Rc<Expr<'base>>,
        /// The other side
        right: Rc<Expr<'base>>,
    },
    /// All expressions share one type
    EqualityList {
        /// The expressions sharing a type
        exprs: Vec<Rc<Expr<'base>>>,
    },
    /// The expression must acquire some concrete type; prevents elision of
    /// otherwise unconstrained placeholders
    Any {
        /// Constrained expression
        expr: Rc<Expr<'base>>,
    },
    /// The expression is a list of the element expression's type
    WrapList {
        /// The list expression
        expr: Rc<Expr<'base>>,
        /// An expression carrying the element type
        elem: Rc<Expr<'base>>,
    },
    /// The expression is a map of the key and value expressions' types
    WrapMap {
        /// The map expression
        expr: Rc<Expr<'base>>,
        /// An expression carrying the key type
        key: Rc<Expr<'base>>,
        /// An expression carrying the value type
        val: Rc<Expr<'base>>,
    },
    /// The expression is a struct of the field expressions' types
    WrapStruct {
        /// The struct expression
        expr: Rc<Expr<'base>>,
        /// Ordered (name, expression) fields
        fields: Vec<(String, Rc<Expr<'base>>)>,
    },
    /// The expression is a function over the parameter expressions' types
    /// returning the body expression's type
    WrapFunc {
        /// The function expression
        expr: Rc<Expr<'base>>,
        /// Ordered (name, expression) parameters
        params: Vec<(String, Rc<Expr<'base>>)>,
        /// The body expression
        ret: Rc<Expr<'base>>,
    },
    /// The expression's type equals the function expression's return type
    WrapCall {
        /// The call expression
        expr: Rc<Expr<'base>>,
        /// The callee function expression
        func: Rc<Expr<'base>>,
    },
    /// All inner invariants hold
    Conjunction {
        /// The inner invariants
        inner: Vec<Invariant<'base>>,
    },
    /// Exactly one inner invariant holds; the solver searches
    Exclusive {
        /// Expression the alternatives compete over, for diagnostics
        expr: Rc<Expr<'base>>,
        /// Human-readable label of the competing construct
        label: String,
        /// The alternatives
        inner: Vec<Invariant<'base>>,
    },
}

impl<'base> Invariant<'base> {
    /// Visits every expression this invariant mentions
    pub fn exprs<F: FnMut(&Rc<Expr<'base>>)>(&self, visit: &mut F) {
        match self {
            Invariant::Equals { expr, .. } | Invariant::Any { expr } => visit(expr),
            Invariant::Equality { left, right } => {
                visit(left);
                visit(right);
            }
            Invariant::EqualityList { exprs } => {
                for expr in exprs.iter() {
                    visit(expr);
                }
            }
            Invariant::WrapList { expr, elem } => {
                visit(expr);
                visit(elem);
            }
            Invariant::WrapMap { expr, key, val } => {
                visit(expr);
                visit(key);
                visit(val);
            }
            Invariant::WrapStruct { expr, fields } => {
                visit(expr);
                for (_, field) in fields.iter() {
                    visit(field);
                }
            }
            Invariant::WrapFunc { expr, params, ret } => {
                visit(expr);
                for (_, param) in params.iter() {
                    visit(param);
                }
                visit(ret);
            }
            Invariant::WrapCall { expr, func } => {
                visit(expr);
                visit(func);
            }
            Invariant::Conjunction { inner } => {
                for invariant in inner.iter() {
                    invariant.exprs(visit);
                }
            }
            Invariant::Exclusive { expr, inner, .. } => {
                visit(expr);
                for invariant in inner.iter() {
                    invariant.exprs(visit);
                }
            }
        }
    }
}

/// Returns true when `actual` fits `pattern`, with `Variant` in the
/// pattern matching any type
pub fn matches_pattern(actual: &Type, pattern: &Type) -> bool {
    match (actual, pattern) {
        (_, Type::Variant) => true,
        (Type::Bool, Type::Bool)
        | (Type::Str, Type::Str)
        | (Type::Int, Type::Int)
        | (Type::Float, Type::Float) => true,
        (Type::List(a), Type::List(b)) => matches_pattern(a, b),
        (Type::Map(ak, av), Type::Map(bk, bv)) => matches_pattern(ak, bk) && matches_pattern(av, bv),
        (Type::Struct(a), Type::Struct(b)) => {
            a.len() == b.len()
                && a.iter().zip(b.iter()).all(|((an, at), (bn, bt))| an == bn && matches_pattern(at, bt))
        }
        (Type::Func { params: ap, ret: ar }, Type::Func { params: bp, ret: br }) => {
            ap.len() == bp.len()
                && ap.iter().zip(bp.iter()).all(|((_, at), (_, bt))| matches_pattern(at, bt))
                && matches_pattern(ar, br)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::matches_pattern;
    use crate::types::Type;

    #[test]
    fn variant_matches_anything() {
        assert!(matches_pattern(&Type::Int, &Type::Variant));
        assert!(matches_pattern(&Type::list(Type::Int), &Type::list(Type::Variant)));
        assert!(matches_pattern(&Type::map(Type::Str, Type::Bool), &Type::map(Type::Variant, Type::Variant)));
    }

    #[test]
    fn shapes_must_agree() {
        assert!(!matches_pattern(&Type::Int, &Type::list(Type::Variant)));
        assert!(!matches_pattern(&Type::list(Type::Int), &Type::list(Type::Str)));
        assert!(!matches_pattern(&Type::Str, &Type::map(Type::Variant, Type::Variant)));
    }
}
