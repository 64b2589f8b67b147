use crate::exception::Exception;
use std::collections::HashMap;

/// Variables handed to the template renderer. The exception is bound as
/// `exc`.
pub type Bindings<'a> = HashMap<&'static str, &'a Exception>;

/// Template rendering collaborator supplied by the host.
///
/// Errors are not handled by the extension; they surface as
/// [`ExtensionError::Render`](crate::ExtensionError::Render).
pub trait TemplateRenderer: Send + Sync + 'static {
    fn render(&self, template: &str, bindings: &Bindings<'_>) -> anyhow::Result<String>;
}

impl<F> TemplateRenderer for F
where
    F: Fn(&str, &Bindings<'_>) -> anyhow::Result<String> + Send + Sync + 'static,
{
    fn render(&self, template: &str, bindings: &Bindings<'_>) -> anyhow::Result<String> {
        self(template, bindings)
    }
}
