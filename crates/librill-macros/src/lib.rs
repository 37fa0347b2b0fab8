//! Procedural macros internal to the rill compiler.
//!
//! Provides the `Diags` derive, which implements librill's `ToDiags`
//! trait: an error type flattens itself, and everything nested inside it,
//! into owned render-ready diagnostic records. The generated code names
//! the trait through `crate::report`, so the derive is only meaningful
//! inside `librill` itself.

use proc_macro::TokenStream;
use crate::diags::expand;
mod diags;

/// Derive macro implementing `ToDiags` on error structs and enums.
///
/// # Attributes
/// - `#[diag(code = "…", help = "…")]` - type level; the error code and
///   static help text of the record. On an enum variant,
///   `#[diag(transparent)]` delegates to the wrapped error instead.
/// - `#[snippet]` - the field carrying the source snippet
/// - `#[diagmarker("…")]` - a position field to highlight; the message may
///   interpolate sibling fields with `{field}` syntax
/// - `#[advice]` - a field carrying computed help text, which overrides
///   the static `help`
/// - `#[nested]` - a collection of errors flattened after this record
#[proc_macro_derive(Diags, attributes(diag, snippet, diagmarker, advice, nested))]
pub fn derive_diags(input: TokenStream) -> TokenStream {
    expand(input)
}
