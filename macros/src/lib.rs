//! Procedural macros for the switchboard broker.
//!
//! - `#[derive(Payload)]`: Implements `switchboard::Payload` for your type, preserving
//!   generics and bounds. For enums, also generates `type_info()` returning the
//!   variant name, so handlers and filters can discriminate payloads without
//!   knowing their shape.
//!
//! Usage:
//! ```rust,ignore
//! use switchboard::Payload;
//!
//! #[derive(Clone, Debug, Payload)]
//! enum Task { Build { target: String }, Cancel(u64), Ping }
//!
//! assert_eq!(Task::Ping.type_info(), "Ping");
//! ```
use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

#[proc_macro_derive(Payload)]
pub fn derive_payload(input: TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let ident = input.ident.clone();
    let generics = input.generics.clone();

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let type_info_impl = match &input.data {
        Data::Enum(data_enum) => {
            let match_arms = data_enum.variants.iter().map(|variant| {
                let variant_ident = &variant.ident;
                let variant_name = variant_ident.to_string();

                let pattern = match &variant.fields {
                    Fields::Unit => quote! { Self::#variant_ident },
                    Fields::Unnamed(_) => quote! { Self::#variant_ident(..) },
                    Fields::Named(_) => quote! { Self::#variant_ident { .. } },
                };

                quote! {
                    #pattern => ::std::borrow::Cow::Borrowed(#variant_name)
                }
            });

            quote! {
                fn type_info(&self) -> ::std::borrow::Cow<'static, str> {
                    match self {
                        #(#match_arms),*
                    }
                }
            }
        }
        // Structs report their bare type name.
        _ => {
            let type_name = ident.to_string();
            quote! {
                fn type_info(&self) -> ::std::borrow::Cow<'static, str> {
                    ::std::borrow::Cow::Borrowed(#type_name)
                }
            }
        }
    };

    let expanded = quote! {
        impl #impl_generics switchboard::Payload for #ident #ty_generics #where_clause {
            #type_info_impl
        }
    };
    TokenStream::from(expanded)
}
