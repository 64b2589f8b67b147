//! Host application binding.
//!
//! [`App`] bundles what the extension needs from the surrounding
//! application: the configuration store, the error-dispatch table, a
//! logging sink and an optional template renderer.

use crate::capability::CapabilityMarker;
use crate::config::ConfigService;
use crate::exception::{ExceptionFilter, ExceptionFilters};
use crate::layer::ReportableLayer;
use crate::log::{LogSink, TracingSink};
use crate::render::TemplateRenderer;
use std::sync::Arc;

/// Host application handle.
///
/// Cheap to clone; clones share the configuration store and the filter
/// table.
///
/// # Example
///
/// ```rust,no_run
/// use reportable_error::{App, Exception, ReportableErrors};
/// use axum::{Router, routing::get};
/// use std::sync::Arc;
///
/// async fn show() -> Result<&'static str, Exception> {
///     Err(Exception::new("nothing here"))
/// }
///
/// let app = App::new();
/// let errors = Arc::new(ReportableErrors::new());
/// errors.init(&app);
///
/// let router: Router = Router::new()
///     .route("/", get(show))
///     .layer(app.layer());
/// ```
#[derive(Clone)]
pub struct App {
    config: ConfigService,
    filters: ExceptionFilters,
    logger: Arc<dyn LogSink>,
    renderer: Option<Arc<dyn TemplateRenderer>>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            config: ConfigService::new(),
            filters: ExceptionFilters::new(),
            logger: Arc::new(TracingSink),
            renderer: None,
        }
    }

    pub fn with_config(mut self, config: ConfigService) -> Self {
        self.config = config;
        self
    }

    pub fn with_logger(mut self, logger: impl LogSink) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    pub fn with_renderer(mut self, renderer: impl TemplateRenderer) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    pub fn config(&self) -> &ConfigService {
        &self.config
    }

    pub fn filters(&self) -> &ExceptionFilters {
        &self.filters
    }

    pub fn logger(&self) -> &Arc<dyn LogSink> {
        &self.logger
    }

    pub fn renderer(&self) -> Option<&Arc<dyn TemplateRenderer>> {
        self.renderer.as_ref()
    }

    /// Installs `filter` for exceptions carrying capability `M`.
    pub fn error_handler<M: CapabilityMarker>(&self, filter: impl ExceptionFilter) -> &Self {
        self.filters.register::<M>(filter);
        self
    }

    /// Tower layer routing caught exceptions to the installed filters.
    pub fn layer(&self) -> ReportableLayer {
        ReportableLayer::new(self.filters.clone())
    }
}
