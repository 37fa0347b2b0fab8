//! Invariant solver.
//!
//! The default solver iterates equality and wrap invariants to a fixpoint,
//! then resolves exclusive constraints by search: each alternative is
//! trial-solved against a clone of the state, and exactly one surviving
//! full solution commits. Several alternatives surviving with identical
//! assignments collapse to one; genuinely different survivors are an
//! ambiguity error. The solver never mutates AST nodes; its state is the
//! assignment map threaded through return values, and on failure no
//! expression is left with a partial or `Variant` type.

use std::fmt::Debug;
use std::rc::Rc;

use indexmap::IndexMap;
use log::debug;

use crate::{
    ast::{Expr, NodeId},
    compile::error::CompileError,
    nom_tools::ToRange,
    types::Type,
};

use super::invariant::{matches_pattern, Invariant};

/// A pluggable invariant solver.
pub trait Solver: Debug {
    /// Produces a total assignment of concrete types to every expression
    /// the invariants mention, or fails with a diagnostic
    fn solve<'base>(&self, invariants: Vec<Invariant<'base>>) -> Result<IndexMap<NodeId, Type>, CompileError>;
}

/// The default fixpoint-and-search solver.
#[derive(Debug, Default)]
pub struct SimpleSolver;

impl Solver for SimpleSolver {
    fn solve<'base>(&self, invariants: Vec<Invariant<'base>>) -> Result<IndexMap<NodeId, Type>, CompileError> {
        let flat = flatten(invariants);
        solve_set(flat, IndexMap::new())
    }
}

/// Splices nested conjunctions into a flat worklist
fn flatten(invariants: Vec<Invariant<'_>>) -> Vec<Invariant<'_>> {
    let mut out = Vec::with_capacity(invariants.len());
    for invariant in invariants {
        match invariant {
            Invariant::Conjunction { inner } => out.extend(flatten(inner)),
            other => out.push(other),
        }
    }
    out
}

fn mismatch(expr: &Rc<Expr<'_>>, expected: &Type, actual: &Type) -> CompileError {
    let span = expr.span();
    CompileError::type_mismatch(
        expected.to_string(),
        actual.to_string(),
        span.to_range(),
        span.state.file.clone(),
    )
}

fn unsolved(expr: &Rc<Expr<'_>>) -> CompileError {
    let span = expr.span();
    CompileError::unsolved(span.to_range(), span.state.file.clone())
}

/// Records a concrete type for an expression, failing on contradiction.
/// Returns true when the assignment changed the state.
fn assign<'base>(
    assignments: &mut IndexMap<NodeId, Type>,
    expr: &Rc<Expr<'base>>,
    ty: Type,
) -> Result<bool, CompileError> {
    debug_assert!(!ty.has_variant(), "only concrete types are assigned");
    match assignments.get(&expr.id()) {
        Some(existing) => {
            if *existing != ty {
                return Err(mismatch(expr, existing, &ty));
            }
            Ok(false)
        }
        None => {
            debug!("solver: {:?} := {ty}", expr.id());
            assignments.insert(expr.id(), ty);
            Ok(true)
        }
    }
}

/// Applies one invariant, returning whether any assignment changed
fn apply<'base>(
    invariant: &Invariant<'base>,
    assignments: &mut IndexMap<NodeId, Type>,
) -> Result<bool, CompileError> {
    match invariant {
        Invariant::Equals { expr, ty } => {
            if ty.has_variant() {
                // a shape pattern; check once the expression is solved
                if let Some(actual) = assignments.get(&expr.id()) {
                    if !matches_pattern(actual, ty) {
                        return Err(mismatch(expr, ty, actual));
                    }
                }
                Ok(false)
            } else {
                assign(assignments, expr, ty.clone())
            }
        }
        Invariant::Equality { left, right } => {
            match (assignments.get(&left.id()).cloned(), assignments.get(&right.id()).cloned()) {
                (Some(lt), None) => assign(assignments, right, lt),
                (None, Some(rt)) => assign(assignments, left, rt),
                (Some(lt), Some(rt)) => {
                    if lt != rt {
                        return Err(mismatch(right, &lt, &rt));
                    }
                    Ok(false)
                }
                (None, None) => Ok(false),
            }
        }
        Invariant::EqualityList { exprs } => {
            let known = exprs
                .iter()
                .find_map(|expr| assignments.get(&expr.id()).cloned());
            let Some(ty) = known else {
                return Ok(false);
            };
            let mut progress = false;
            for expr in exprs.iter() {
                progress |= assign(assignments, expr, ty.clone())?;
            }
            Ok(progress)
        }
        Invariant::Any { .. } => Ok(false),
        Invariant::WrapList { expr, elem } => {
            let mut progress = false;
            if let Some(elem_ty) = assignments.get(&elem.id()).cloned() {
                progress |= assign(assignments, expr, Type::List(Box::new(elem_ty)))?;
            }
            if let Some(list_ty) = assignments.get(&expr.id()).cloned() {
                match list_ty {
                    Type::List(inner) => progress |= assign(assignments, elem, *inner)?,
                    other => return Err(mismatch(expr, &Type::list(Type::Variant), &other)),
                }
            }
            Ok(progress)
        }
        Invariant::WrapMap { expr, key, val } => {
            let mut progress = false;
            if let (Some(key_ty), Some(val_ty)) = (
                assignments.get(&key.id()).cloned(),
                assignments.get(&val.id()).cloned(),
            ) {
                progress |= assign(assignments, expr, Type::Map(Box::new(key_ty), Box::new(val_ty)))?;
            }
            if let Some(map_ty) = assignments.get(&expr.id()).cloned() {
                match map_ty {
                    Type::Map(key_ty, val_ty) => {
                        progress |= assign(assignments, key, *key_ty)?;
                        progress |= assign(assignments, val, *val_ty)?;
                    }
                    other => return Err(mismatch(expr, &Type::map(Type::Variant, Type::Variant), &other)),
                }
            }
            Ok(progress)
        }
        Invariant::WrapStruct { expr, fields } => {
            let mut progress = false;
            let known: Option<Vec<(String, Type)>> = fields
                .iter()
                .map(|(name, field)| assignments.get(&field.id()).cloned().map(|ty| (name.clone(), ty)))
                .collect();
            if let Some(field_types) = known {
                progress |= assign(assignments, expr, Type::Struct(field_types))?;
            }
            if let Some(struct_ty) = assignments.get(&expr.id()).cloned() {
                match struct_ty {
                    Type::Struct(field_types) => {
                        if field_types.len() != fields.len()
                            || field_types.iter().zip(fields.iter()).any(|((an, _), (bn, _))| an != bn)
                        {
                            return Err(mismatch(
                                expr,
                                &Type::Struct(fields.iter().map(|(name, _)| (name.clone(), Type::Variant)).collect()),
                                &Type::Struct(field_types),
                            ));
                        }
                        for ((_, ty), (_, field)) in field_types.iter().zip(fields.iter()) {
                            progress |= assign(assignments, field, ty.clone())?;
                        }
                    }
                    other => return Err(mismatch(expr, &Type::Struct(vec![]), &other)),
                }
            }
            Ok(progress)
        }
        Invariant::WrapFunc { expr, params, ret } => {
            let mut progress = false;
            let known: Option<Vec<(String, Type)>> = params
                .iter()
                .map(|(name, param)| assignments.get(&param.id()).cloned().map(|ty| (name.clone(), ty)))
                .collect();
            if let (Some(param_types), Some(ret_ty)) = (known, assignments.get(&ret.id()).cloned()) {
                progress |= assign(assignments, expr, Type::Func { params: param_types, ret: Box::new(ret_ty) })?;
            }
            if let Some(func_ty) = assignments.get(&expr.id()).cloned() {
                match func_ty {
                    Type::Func { params: param_types, ret: ret_ty } => {
                        if param_types.len() != params.len() {
                            return Err(unsolved(expr));
                        }
                        for ((_, ty), (_, param)) in param_types.iter().zip(params.iter()) {
                            progress |= assign(assignments, param, ty.clone())?;
                        }
                        progress |= assign(assignments, ret, *ret_ty)?;
                    }
                    other => {
                        return Err(mismatch(
                            expr,
                            &Type::Func { params: vec![], ret: Box::new(Type::Variant) },
                            &other,
                        ));
                    }
                }
            }
            Ok(progress)
        }
        Invariant::WrapCall { expr, func } => {
            if let Some(func_ty) = assignments.get(&func.id()).cloned() {
                match func_ty {
                    Type::Func { ret, .. } => {
                        return assign(assignments, expr, *ret);
                    }
                    other => {
                        return Err(mismatch(
                            func,
                            &Type::Func { params: vec![], ret: Box::new(Type::Variant) },
                            &other,
                        ));
                    }
                }
            }
            Ok(false)
        }
        // handled by the search step
        Invariant::Conjunction { .. } | Invariant::Exclusive { .. } => Ok(false),
    }
}

/// Verifies the deferred shape patterns and the totality of the assignment
fn final_checks<'base>(
    invariants: &[Invariant<'base>],
    assignments: &IndexMap<NodeId, Type>,
) -> Result<(), CompileError> {
    for invariant in invariants.iter() {
        if let Invariant::Equals { expr, ty } = invariant {
            if ty.has_variant() {
                match assignments.get(&expr.id()) {
                    Some(actual) if matches_pattern(actual, ty) => {}
                    Some(actual) => return Err(mismatch(expr, ty, actual)),
                    None => return Err(unsolved(expr)),
                }
            }
        }
    }

    let mut failure = None;
    for invariant in invariants.iter() {
        invariant.exprs(&mut |expr| {
            if failure.is_some() {
                return;
            }
            match assignments.get(&expr.id()) {
                Some(ty) if !ty.has_variant() => {}
                _ => failure = Some(unsolved(expr)),
            }
        });
        if failure.is_some() {
            break;
        }
    }

    match failure {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Solves a flat invariant set to completion
fn solve_set<'base>(
    invariants: Vec<Invariant<'base>>,
    mut assignments: IndexMap<NodeId, Type>,
) -> Result<IndexMap<NodeId, Type>, CompileError> {
    loop {
        let mut progress = false;
        for invariant in invariants.iter() {
            progress |= apply(invariant, &mut assignments)?;
        }
        if !progress {
            break;
        }
    }

    let exclusive = invariants
        .iter()
        .position(|invariant| matches!(invariant, Invariant::Exclusive { .. }));

    let Some(position) = exclusive else {
        final_checks(&invariants, &assignments)?;
        return Ok(assignments);
    };

    let Invariant::Exclusive { expr, label, inner } = &invariants[position] else {
        unreachable!("position points at an exclusive");
    };

    let mut survivors: Vec<IndexMap<NodeId, Type>> = Vec::new();
    for alternative in inner.iter() {
        let mut trial: Vec<Invariant<'base>> = invariants
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != position)
            .map(|(_, invariant)| invariant.clone())
            .collect();
        trial.extend(flatten(vec![alternative.clone()]));

        match solve_set(trial, assignments.clone()) {
            Ok(result) => {
                // identical survivors collapse; the equalities on
                // neighboring expressions did not distinguish them
                if !survivors.contains(&result) {
                    survivors.push(result);
                }
            }
            Err(error) => {
                debug!("solver: alternative of '{label}' rejected: {error}");
            }
        }
    }

    match survivors.len() {
        0 => {
            let span = expr.span();
            Err(CompileError::no_signature_matches(
                label.clone(),
                span.to_range(),
                span.state.file.clone(),
            ))
        }
        1 => Ok(survivors.pop().expect("exactly one survivor")),
        _ => {
            let span = expr.span();
            Err(CompileError::ambiguous_exclusive(span.to_range(), span.state.file.clone()))
        }
    }
}
