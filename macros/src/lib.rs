//! Derive macros for Tally
//!
//! # Available Macros
//!
//! - `#[derive(Action)]` - Generates the `NamedAction` dispatch table for an action enum
//!
//! # Example
//!
//! ```ignore
//! use tally_macros::Action;
//!
//! #[derive(Action, Clone, Debug)]
//! enum CounterAction {
//!     #[action(alias = "addCount")]
//!     Increment,
//!
//!     MultiplyByLast(i64),
//! }
//!
//! // Generated:
//! assert_eq!(CounterAction::Increment.name(), "increment");
//! assert_eq!(CounterAction::known_names(), &["increment", "multiplyByLast"]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, LitStr, Variant};

/// Derive macro for action enums
///
/// Implements `tally_core::action::NamedAction`:
/// - `from_envelope()` - Resolves an envelope by name, decoding the payload if the variant carries one
/// - `name()` - Returns the canonical name of the variant
/// - `known_names()` - Lists every canonical name in declaration order
///
/// Canonical names are the variant names with the first letter lowercased
/// (`MultiplyByLast` → `multiplyByLast`).
///
/// # Attributes
///
/// - `#[action(rename = "...")]` - Replace the canonical name
/// - `#[action(alias = "...")]` - Accept an additional name (repeatable)
///
/// # Supported variants
///
/// - Unit variants: take no payload; a supplied payload is ignored
/// - Single-field tuple variants: the payload is required and must deserialize into the field type
///
/// Any other variant shape is a compile error.
///
/// # Example
///
/// ```ignore
/// #[derive(Action, Clone, Debug)]
/// enum CounterAction {
///     #[action(alias = "ADD_COUNT")]
///     Increment,
///     #[action(rename = "multiplyByLast", alias = "multiCount")]
///     Multiply(i64),
/// }
///
/// let envelope = Envelope::new("multiCount").with_payload(3);
/// assert_eq!(
///     CounterAction::from_envelope(&envelope)?,
///     Some(CounterAction::Multiply(3)),
/// );
/// ```
#[proc_macro_derive(Action, attributes(action))]
pub fn derive_action(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_action(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_action(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;

    let Data::Enum(data_enum) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "#[derive(Action)] can only be used on enums",
        ));
    };

    let mut canonical_names = Vec::new();
    let mut from_envelope_arms = Vec::new();
    let mut name_arms = Vec::new();

    for variant in &data_enum.variants {
        let variant_name = &variant.ident;
        let names = ActionNames::from_variant(variant)?;
        let canonical = names.canonical.as_str();
        let accepted = names.accepted();

        match &variant.fields {
            Fields::Unit => {
                from_envelope_arms.push(quote! {
                    #(#accepted)|* => ::core::result::Result::Ok(::core::option::Option::Some(Self::#variant_name)),
                });
                name_arms.push(quote! { Self::#variant_name => #canonical, });
            },
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
                let field_ty = &fields.unnamed[0].ty;
                from_envelope_arms.push(quote! {
                    #(#accepted)|* => ::tally_core::action::decode_payload::<#field_ty>(
                        #canonical,
                        envelope.payload.as_ref(),
                    )
                    .map(|payload| ::core::option::Option::Some(Self::#variant_name(payload))),
                });
                name_arms.push(quote! { Self::#variant_name(..) => #canonical, });
            },
            _ => {
                return Err(syn::Error::new_spanned(
                    variant,
                    "#[derive(Action)] supports unit variants and single-field tuple variants",
                ));
            },
        }

        canonical_names.push(names.canonical);
    }

    // Duplicate names would make later arms unreachable
    let mut seen = std::collections::HashSet::new();
    for variant in &data_enum.variants {
        for accepted in ActionNames::from_variant(variant)?.accepted() {
            if !seen.insert(accepted.value()) {
                return Err(syn::Error::new_spanned(
                    variant,
                    format!("action name `{}` is used more than once", accepted.value()),
                ));
            }
        }
    }

    let name_match = if name_arms.is_empty() {
        quote! { match *self {} }
    } else {
        quote! {
            match self {
                #(#name_arms)*
            }
        }
    };

    Ok(quote! {
        impl ::tally_core::action::NamedAction for #name {
            fn from_envelope(
                envelope: &::tally_core::action::Envelope,
            ) -> ::core::result::Result<::core::option::Option<Self>, ::tally_core::action::ActionError> {
                match envelope.kind.as_str() {
                    #(#from_envelope_arms)*
                    _ => ::core::result::Result::Ok(::core::option::Option::None),
                }
            }

            fn name(&self) -> &'static str {
                #name_match
            }

            fn known_names() -> &'static [&'static str] {
                &[#(#canonical_names),*]
            }
        }
    })
}

/// Names a variant answers to
struct ActionNames {
    canonical: String,
    aliases: Vec<LitStr>,
    span: proc_macro2::Span,
}

impl ActionNames {
    fn from_variant(variant: &Variant) -> syn::Result<Self> {
        let mut canonical = lower_camel(&variant.ident.to_string());
        let mut aliases: Vec<LitStr> = Vec::new();

        for attr in action_attributes(&variant.attrs) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    let value: LitStr = meta.value()?.parse()?;
                    canonical = value.value();
                    Ok(())
                } else if meta.path.is_ident("alias") {
                    let alias: LitStr = meta.value()?.parse()?;
                    aliases.push(alias);
                    Ok(())
                } else {
                    Err(meta.error("expected `rename = \"...\"` or `alias = \"...\"`"))
                }
            })?;
        }

        Ok(Self {
            canonical,
            aliases,
            span: variant.ident.span(),
        })
    }

    /// Canonical name first, then aliases
    fn accepted(&self) -> Vec<LitStr> {
        std::iter::once(LitStr::new(&self.canonical, self.span))
            .chain(self.aliases.iter().cloned())
            .collect()
    }
}

fn action_attributes(attrs: &[Attribute]) -> impl Iterator<Item = &Attribute> {
    attrs.iter().filter(|attr| attr.path().is_ident("action"))
}

fn lower_camel(ident: &str) -> String {
    let mut chars = ident.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_lowercase().chain(chars).collect()
    })
}
