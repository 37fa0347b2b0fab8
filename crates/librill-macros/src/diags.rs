//! Expansion of the `Diags` derive.
//!
//! Structs are scanned in a single pass over their fields, and the
//! expansion emits one `diags` body: build the record for the error
//! itself, then splice in the flattened records of every `#[nested]`
//! collection. Enums expand to a single match: `#[diag(transparent)]`
//! newtype variants delegate to their payload, anything else falls back
//! to a bare record built from the variant's `Display` output.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DataEnum, DataStruct, DeriveInput, Fields, FieldsNamed, Ident};

/// Type- and variant-level settings: `#[diag(code = "…", help = "…")]`
/// or `#[diag(transparent)]`
#[derive(deluxe::ExtractAttributes, deluxe::ParseMetaItem, Default)]
#[deluxe(attributes(diag))]
struct DiagAttr {
    /// Error code shown in the record's notes
    #[deluxe(default)]
    code: Option<String>,

    /// Static help text
    #[deluxe(default)]
    help: Option<String>,

    /// Delegate to the wrapped error (enum variants only)
    #[deluxe(default)]
    transparent: bool,
}

/// Marker message attribute: `#[diagmarker("…")]`
#[derive(deluxe::ExtractAttributes)]
#[deluxe(attributes(diagmarker))]
struct MarkerAttr(String);

/// Everything the struct expansion needs, collected in one field scan
#[derive(Default)]
struct Shape {
    snippet: Option<Ident>,
    advice: Option<Ident>,
    nested: Vec<Ident>,
    markers: Vec<TokenStream2>,
}

fn has_attr(field: &syn::Field, name: &str) -> bool {
    field.attrs.iter().any(|attr| attr.path().is_ident(name))
}

/// Turns a marker template like `"expected {expected}"` into a `format!`
/// invocation over the named sibling fields
fn marker_message(template: &str) -> TokenStream2 {
    let mut fmt = String::new();
    let mut args: Vec<Ident> = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        fmt.push_str(&rest[..open]);
        let Some(len) = rest[open + 1..].find('}') else {
            panic!("unterminated '{{' in marker message");
        };
        fmt.push_str("{}");
        args.push(format_ident!("{}", &rest[open + 1..open + 1 + len]));
        rest = &rest[open + 1 + len + 1..];
    }
    fmt.push_str(rest);

    quote! { format!(#fmt, #(self.#args),*) }
}

fn scan(fields: &mut FieldsNamed) -> Shape {
    let mut shape = Shape::default();

    for field in fields.named.iter_mut() {
        let name = field.ident.clone().expect("named fields carry idents");
        if has_attr(field, "snippet") {
            shape.snippet = Some(name);
        } else if has_attr(field, "advice") {
            shape.advice = Some(name);
        } else if has_attr(field, "nested") {
            shape.nested.push(name);
        } else if let Ok(MarkerAttr(template)) = deluxe::extract_attributes(field) {
            let message = marker_message(&template);
            shape.markers.push(quote! {
                crate::report::Marker {
                    message: #message,
                    position: self.#name.clone(),
                }
            });
        }
    }

    shape
}

fn option_text(value: &Option<String>) -> TokenStream2 {
    match value {
        Some(text) => quote! { Some(#text.to_string()) },
        None => quote! { None },
    }
}

fn expand_struct(name: Ident, attr: DiagAttr, mut data: DataStruct) -> TokenStream {
    let Fields::Named(fields) = &mut data.fields else {
        return syn::Error::new(name.span(), "`Diags` supports structs with named fields")
            .to_compile_error()
            .into();
    };

    let shape = scan(fields);
    let code = option_text(&attr.code);
    // computed advice beats static help
    let help = match &shape.advice {
        Some(advice) => quote! { Some(self.#advice.to_string()) },
        None => option_text(&attr.help),
    };
    let snippet = match &shape.snippet {
        Some(snippet) => quote! { Some(self.#snippet.clone()) },
        None => quote! { None },
    };
    let markers = &shape.markers;
    let nested = &shape.nested;

    TokenStream::from(quote! {
        impl crate::report::ToDiags for #name {
            fn diags(&self) -> Vec<crate::report::Diag> {
                let mut out = vec![crate::report::Diag {
                    message: self.to_string(),
                    code: #code,
                    help: #help,
                    snippet: #snippet,
                    markers: vec![#(#markers),*],
                }];
                #(
                    for item in self.#nested.iter() {
                        out.extend(crate::report::ToDiags::diags(item));
                    }
                )*
                out
            }
        }
    })
}

fn expand_enum(name: Ident, data: DataEnum) -> TokenStream {
    let mut arms = Vec::new();

    for mut variant in data.variants.into_iter() {
        let attr: DiagAttr = match deluxe::extract_attributes(&mut variant) {
            Ok(attr) => attr,
            Err(error) => return error.to_compile_error().into(),
        };
        let ident = &variant.ident;

        if attr.transparent {
            if !matches!(&variant.fields, Fields::Unnamed(inner) if inner.unnamed.len() == 1) {
                return syn::Error::new(ident.span(), "`#[diag(transparent)]` needs a single-field tuple variant")
                    .to_compile_error()
                    .into();
            }
            arms.push(quote! {
                #name::#ident(inner) => crate::report::ToDiags::diags(inner),
            });
        } else {
            let code = option_text(&attr.code);
            let help = option_text(&attr.help);
            arms.push(quote! {
                #name::#ident { .. } => vec![crate::report::Diag {
                    message: self.to_string(),
                    code: #code,
                    help: #help,
                    snippet: None,
                    markers: Vec::new(),
                }],
            });
        }
    }

    TokenStream::from(quote! {
        impl crate::report::ToDiags for #name {
            fn diags(&self) -> Vec<crate::report::Diag> {
                match self {
                    #(#arms)*
                }
            }
        }
    })
}

/// Entry point of the derive
pub fn expand(input: TokenStream) -> TokenStream {
    let mut input = parse_macro_input!(input as DeriveInput);

    let attr: DiagAttr = match deluxe::extract_attributes(&mut input) {
        Ok(attr) => attr,
        Err(error) => return error.to_compile_error().into(),
    };

    match input.data {
        Data::Struct(data) => expand_struct(input.ident, attr, data),
        Data::Enum(data) => expand_enum(input.ident, data),
        Data::Union(_) => syn::Error::new(input.ident.span(), "`Diags` supports structs and enums")
            .to_compile_error()
            .into(),
    }
}
