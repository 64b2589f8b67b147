//! Response synthesis for caught exceptions.

use crate::app::App;
use crate::capability::{CapabilityMarker, CapabilityRegistry, DontWrap, Reportable};
use crate::class::{ErrorClass, ReportableType};
use crate::config::{ConfigService, Settings, Severity};
use crate::error::{ExtensionError, Result};
use crate::exception::{Exception, ExceptionFilter};
use crate::factory::ReportableFactory;
use crate::log::LogSink;
use crate::render::{Bindings, TemplateRenderer};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use std::error::Error as StdError;
use std::sync::{Arc, PoisonError, RwLock};

/// The response triple produced for one caught exception.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub body: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl ErrorResponse {
    pub fn into_parts(self) -> (String, StatusCode, HeaderMap) {
        (self.body, self.status, self.headers)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}

/// What `init` captured from the host application.
struct Binding {
    config: ConfigService,
    logger: Arc<dyn LogSink>,
    renderer: Option<Arc<dyn TemplateRenderer>>,
    template: Option<String>,
}

/// The reportable-error extension.
///
/// Owns the capability registry and the class factory, and, once
/// [`init`](Self::init) has run, the binding to a host [`App`]. Share it
/// behind an `Arc`; the installed handler keeps a reference to it.
pub struct ReportableErrors {
    registry: Arc<CapabilityRegistry>,
    factory: ReportableFactory,
    binding: RwLock<Option<Arc<Binding>>>,
}

impl Default for ReportableErrors {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportableErrors {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(CapabilityRegistry::new()))
    }

    pub fn with_registry(registry: Arc<CapabilityRegistry>) -> Self {
        registry.register::<Reportable>();
        Self {
            factory: ReportableFactory::new(Arc::clone(&registry)),
            registry,
            binding: RwLock::new(None),
        }
    }

    /// Registers [`DontWrap`], so every derived class passes through
    /// layers that would otherwise wrap it.
    pub fn with_dont_wrap(self) -> Self {
        self.registry.register::<DontWrap>();
        self
    }

    /// Adds a capability every class derived from now on will carry.
    pub fn register<M: CapabilityMarker>(&self) -> &Self {
        self.registry.register::<M>();
        self
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn factory(&self) -> &ReportableFactory {
        &self.factory
    }

    /// Reportable class for `E`; see [`ReportableFactory::reportable`].
    pub fn reportable<E: ErrorClass>(&self) -> ReportableType<E> {
        self.factory.reportable::<E>()
    }

    /// Binds to `app` and installs the handler for [`Reportable`]
    /// exceptions. Calling it again rebinds.
    pub fn init(self: &Arc<Self>, app: &App) {
        self.bind(app, None);
    }

    /// Like [`init`](Self::init), rendering every response body with
    /// `template` unless the exception's class declares its own.
    pub fn init_with_template(self: &Arc<Self>, app: &App, template: impl Into<String>) {
        self.bind(app, Some(template.into()));
    }

    fn bind(self: &Arc<Self>, app: &App, template: Option<String>) {
        let binding = Binding {
            config: app.config().clone(),
            logger: Arc::clone(app.logger()),
            renderer: app.renderer().cloned(),
            template,
        };
        *self.binding.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(binding));

        self.registry.register::<Reportable>();
        app.error_handler::<Reportable>(ReportableErrorHandler::new(Arc::clone(self)));
        tracing::info!("Reportable error handler registered");
    }

    pub fn is_configured(&self) -> bool {
        self.binding
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn binding(&self) -> Result<Arc<Binding>> {
        self.binding
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ExtensionError::NotConfigured)
    }

    /// Current `REPORTABLE_ERROR` settings of the bound application.
    pub fn settings(&self) -> Result<Settings> {
        self.binding()?.config.settings()
    }

    /// Computes the response for `exc` and logs the occurrence.
    pub fn handle(&self, exc: &Exception) -> Result<ErrorResponse> {
        let binding = self.binding()?;
        let settings = binding.config.settings()?;

        let severity = settings.loglevel().unwrap_or_else(|e| {
            tracing::warn!("{}; logging at {}", e, Severity::default());
            Severity::default()
        });
        binding
            .logger
            .log(severity, exc.type_name(), &exc.message());

        let template = match exc.class().template().or(binding.template.as_deref()) {
            Some(template) => Some(template),
            None => settings.template()?,
        };
        let body = match template {
            Some(template) => render(&binding, template, exc)?,
            None => exc.report(),
        };

        let status = match exc.status_code() {
            Some(status) => status,
            None => settings.default_status_code()?,
        };

        let headers = match exc.headers().or(exc.class().headers()) {
            Some(headers) => headers.clone(),
            None => settings.headers()?.unwrap_or_default(),
        };

        Ok(ErrorResponse {
            body,
            status,
            headers,
        })
    }

    /// Entry point for untyped errors; anything that is not an
    /// [`Exception`] is rejected.
    pub fn handle_error(&self, error: &(dyn StdError + 'static)) -> Result<ErrorResponse> {
        match error.downcast_ref::<Exception>() {
            Some(exc) => self.handle(exc),
            None => Err(ExtensionError::NotReportable {
                error: error.to_string(),
            }),
        }
    }
}

fn render(binding: &Binding, template: &str, exc: &Exception) -> Result<String> {
    let renderer = binding
        .renderer
        .as_ref()
        .ok_or_else(|| ExtensionError::Render {
            template: template.to_string(),
            source: anyhow::anyhow!("no template renderer is registered"),
        })?;

    let bindings = Bindings::from([("exc", exc)]);
    renderer
        .render(template, &bindings)
        .map_err(|source| ExtensionError::Render {
            template: template.to_string(),
            source,
        })
}

/// Filter installed by [`ReportableErrors::init`].
pub struct ReportableErrorHandler {
    errors: Arc<ReportableErrors>,
}

impl ReportableErrorHandler {
    pub fn new(errors: Arc<ReportableErrors>) -> Self {
        Self { errors }
    }
}

impl ExceptionFilter for ReportableErrorHandler {
    fn name(&self) -> &'static str {
        "reportable_error_handler"
    }

    fn catch(&self, exception: &Exception) -> Result<Response> {
        self.errors.handle(exception).map(IntoResponse::into_response)
    }
}
