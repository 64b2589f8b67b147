use proc_macro::TokenStream;

mod capability;
mod error_class;

/// Derive macro for declaring a capability marker
///
/// # Example
/// ```ignore
/// use reportable_error::Capability;
///
/// #[derive(Capability)]
/// pub struct Audited;
/// ```
#[proc_macro_derive(Capability)]
pub fn derive_capability(input: TokenStream) -> TokenStream {
    capability::derive_capability(input)
}

/// Derive macro for the per-class declarations of an error type
///
/// All arguments of the `reportable` attribute are optional:
///
/// - `name = "..."`: class name used in logs and derived class names
/// - `template = "..."`: template rendering the response body
/// - `header(name = "...", value = "...")`: a response header, repeatable
/// - `capabilities(Marker, ...)`: capabilities the type already carries
///
/// # Example
/// ```ignore
/// use reportable_error::{ErrorClass, Reportable};
///
/// #[derive(Debug, ErrorClass)]
/// #[reportable(
///     template = "errors/not_found.html",
///     header(name = "Cache-Control", value = "no-store"),
///     capabilities(Reportable)
/// )]
/// pub struct NotFound;
/// ```
#[proc_macro_derive(ErrorClass, attributes(reportable))]
pub fn derive_error_class(input: TokenStream) -> TokenStream {
    error_class::derive_error_class(input)
}
