use darling::{util::PathList, FromDeriveInput, FromMeta};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

#[derive(FromMeta)]
struct HeaderArg {
    name: String,
    value: String,
}

#[derive(FromDeriveInput)]
#[darling(attributes(reportable))]
struct ErrorClassArgs {
    ident: syn::Ident,
    generics: syn::Generics,
    name: Option<String>,
    template: Option<String>,
    #[darling(multiple, rename = "header")]
    headers: Vec<HeaderArg>,
    #[darling(default)]
    capabilities: PathList,
}

pub fn derive_error_class(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let expanded = ErrorClassArgs::from_derive_input(&input)
        .and_then(|args| generate_error_class_impl(&args));
    match expanded {
        Ok(tokens) => tokens.into(),
        Err(e) => e.write_errors().into(),
    }
}

fn generate_error_class_impl(args: &ErrorClassArgs) -> darling::Result<TokenStream2> {
    let ident = &args.ident;
    let (impl_generics, ty_generics, where_clause) = args.generics.split_for_impl();

    let class_name = args.name.clone().unwrap_or_else(|| ident.to_string());

    let headers_fn = if args.headers.is_empty() {
        quote!()
    } else {
        let inserts = args
            .headers
            .iter()
            .map(header_append)
            .collect::<darling::Result<Vec<_>>>()?;
        quote! {
            fn headers() -> ::core::option::Option<::reportable_error::axum::http::HeaderMap> {
                let mut headers = ::reportable_error::axum::http::HeaderMap::new();
                #(#inserts)*
                ::core::option::Option::Some(headers)
            }
        }
    };

    let template_fn = match &args.template {
        Some(template) => quote! {
            fn template() -> ::core::option::Option<&'static str> {
                ::core::option::Option::Some(#template)
            }
        },
        None => quote!(),
    };

    let capabilities_fn = if args.capabilities.is_empty() {
        quote!()
    } else {
        let markers = args.capabilities.iter();
        quote! {
            fn capabilities() -> ::reportable_error::CapabilitySet {
                ::reportable_error::CapabilitySet::new()
                    #(.with::<#markers>())*
            }
        }
    };

    Ok(quote! {
        impl #impl_generics ::reportable_error::ErrorClass for #ident #ty_generics #where_clause {
            fn class_name() -> &'static str {
                #class_name
            }

            #headers_fn
            #template_fn
            #capabilities_fn
        }
    })
}

/// Validated here so `from_static` cannot panic at runtime.
fn header_append(header: &HeaderArg) -> darling::Result<TokenStream2> {
    // `HeaderName::from_static` only accepts lowercase names.
    let name = header.name.to_ascii_lowercase();
    if name.is_empty() || !name.bytes().all(is_token_char) {
        return Err(darling::Error::custom(format!(
            "invalid header name `{}`",
            header.name
        )));
    }

    let value = &header.value;
    if !value.bytes().all(|b| b == b'\t' || (0x20..0x7f).contains(&b)) {
        return Err(darling::Error::custom(format!(
            "invalid value for header `{}`",
            header.name
        )));
    }

    Ok(quote! {
        headers.append(
            ::reportable_error::axum::http::HeaderName::from_static(#name),
            ::reportable_error::axum::http::HeaderValue::from_static(#value),
        );
    })
}

fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}
