//! Resource metaparameters.
//!
//! Every resource carries a fixed set of execution hints. They can be
//! assigned individually (`Meta:noop => true`) or through the aggregate
//! `Meta => struct{…}` form; the aggregate is applied first and individual
//! assignments override its fields. Numeric properties are range-checked
//! into their narrower storage widths.

use std::sync::OnceLock;

use crate::{compile::error::CompileError, file::SourceFile, types::{Type, Value}};

/// The fixed metaparameter table: name and type of each property.
///
/// `reverse` also accepts a reserved struct form, encoded as an exclusive
/// constraint during unification; only the bool form is interpreted.
pub fn meta_properties() -> &'static [(&'static str, Type)] {
    static PROPERTIES: OnceLock<Vec<(&'static str, Type)>> = OnceLock::new();
    PROPERTIES.get_or_init(|| vec![
        ("noop", Type::Bool),
        ("retry", Type::Int),
        ("delay", Type::Int),
        ("poll", Type::Int),
        ("limit", Type::Float),
        ("burst", Type::Int),
        ("sema", Type::list(Type::Str)),
        ("rewatch", Type::Bool),
        ("realize", Type::Bool),
        ("reverse", Type::Bool),
        ("autoedge", Type::Bool),
        ("autogroup", Type::Bool),
    ])
}

/// Returns true if the name is a recognized metaparameter property
pub fn is_meta_property(name: &str) -> bool {
    meta_properties().iter().any(|(prop, _)| *prop == name)
}

/// Returns the declared type of a metaparameter property
pub fn meta_property_type(name: &str) -> Option<&'static Type> {
    meta_properties().iter().find(|(prop, _)| *prop == name).map(|(_, ty)| ty)
}

/// The struct type of the aggregate `meta` property
pub fn meta_struct_type() -> Type {
    Type::Struct(
        meta_properties()
            .iter()
            .map(|(name, ty)| (name.to_string(), ty.clone()))
            .collect(),
    )
}

/// The reserved struct form of the `reverse` property.
///
/// The exclusive branch for this shape stays present in unification, but
/// interpretation accepts only the bool form until the struct form is
/// specified.
pub fn reverse_struct_type() -> Type {
    Type::Struct(vec![])
}

/// The resolved metaparameters of one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaParams {
    /// Pretend to work, but do nothing
    pub noop: bool,
    /// Retry count on failure; stored narrow
    pub retry: i16,
    /// Delay between retries in milliseconds
    pub delay: u64,
    /// Polling interval in seconds; zero uses event watching
    pub poll: u32,
    /// Maximum average allowed rate of events
    pub limit: f64,
    /// Maximum burst of events allowed through
    pub burst: u32,
    /// Semaphore identifiers this resource holds during execution
    pub sema: Vec<String>,
    /// Re-run the watch loop after each successful apply
    pub rewatch: bool,
    /// Realize the resource even when nothing changed
    pub realize: bool,
    /// Reverse the resource on removal
    pub reverse: bool,
    /// Participate in the automatic edge pass
    pub autoedge: bool,
    /// Participate in the automatic grouping pass
    pub autogroup: bool,
}

impl Default for MetaParams {
    fn default() -> Self {
        Self {
            noop: false,
            retry: 0,
            delay: 0,
            poll: 0,
            limit: 0.0,
            burst: 0,
            sema: Vec::new(),
            rewatch: false,
            realize: false,
            reverse: false,
            autoedge: true,
            autogroup: true,
        }
    }
}

impl MetaParams {
    /// Applies one property assignment with numeric range checks.
    ///
    /// The position and source feed overflow diagnostics.
    pub fn apply(
        &mut self,
        property: &str,
        value: &Value,
        position: std::ops::Range<usize>,
        source: &SourceFile,
    ) -> Result<(), CompileError> {
        let overflow = |raw: i64| CompileError::numeric_overflow(property, raw, position.clone(), source.clone());

        match (property, value) {
            ("noop", Value::Bool(flag)) => self.noop = *flag,
            ("retry", Value::Int(raw)) => self.retry = i16::try_from(*raw).map_err(|_| overflow(*raw))?,
            ("delay", Value::Int(raw)) => self.delay = u64::try_from(*raw).map_err(|_| overflow(*raw))?,
            ("poll", Value::Int(raw)) => self.poll = u32::try_from(*raw).map_err(|_| overflow(*raw))?,
            ("limit", Value::Float(raw)) => self.limit = *raw,
            ("burst", Value::Int(raw)) => self.burst = u32::try_from(*raw).map_err(|_| overflow(*raw))?,
            ("sema", Value::List { values, .. }) => {
                self.sema = values
                    .iter()
                    .map(|value| value.as_str().unwrap_or_default().to_string())
                    .collect();
            }
            ("rewatch", Value::Bool(flag)) => self.rewatch = *flag,
            ("realize", Value::Bool(flag)) => self.realize = *flag,
            ("reverse", Value::Bool(flag)) => self.reverse = *flag,
            ("reverse", Value::Struct(_)) => {
                return Err(CompileError::value_type_mismatch(
                    property,
                    Type::Bool.to_string(),
                    value.r#type().to_string(),
                    position,
                    source.clone(),
                ));
            }
            ("autoedge", Value::Bool(flag)) => self.autoedge = *flag,
            ("autogroup", Value::Bool(flag)) => self.autogroup = *flag,
            _ => {
                let expected = meta_property_type(property)
                    .map(|ty| ty.to_string())
                    .unwrap_or_else(|| "a metaparameter".to_string());
                return Err(CompileError::value_type_mismatch(
                    property,
                    expected,
                    value.r#type().to_string(),
                    position,
                    source.clone(),
                ));
            }
        }
        Ok(())
    }

    /// Applies an aggregate `meta` struct; its fields are applied in table
    /// order so later individual assignments can override them
    pub fn apply_aggregate(
        &mut self,
        value: &Value,
        position: std::ops::Range<usize>,
        source: &SourceFile,
    ) -> Result<(), CompileError> {
        let Value::Struct(fields) = value else {
            return Err(CompileError::value_type_mismatch(
                "meta",
                meta_struct_type().to_string(),
                value.r#type().to_string(),
                position,
                source.clone(),
            ));
        };

        for (name, field_value) in fields.iter() {
            self.apply(name, field_value, position.clone(), source)?;
        }
        Ok(())
    }
}
