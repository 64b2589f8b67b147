//! # reportable-error
//!
//! Raise errors from axum handlers and have them turned into HTTP
//! responses with a status code, a body and headers, instead of surfacing
//! as bare server errors.
//!
//! ## Features
//!
//! - **Reportable classes**: make any error type reportable with
//!   [`ReportableErrors::reportable`], memoized per type
//! - **Capabilities**: extend the set of markers every derived class carries
//! - **Layered resolution**: instance overrides, class declarations and the
//!   `REPORTABLE_ERROR` configuration section, in that order
//! - **Templates**: render response bodies through a host-supplied renderer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reportable_error::prelude::*;
//! use serde_json::json;
//!
//! #[derive(Debug, ErrorClass)]
//! struct ValueError(String);
//!
//! impl std::fmt::Display for ValueError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         f.write_str(&self.0)
//!     }
//! }
//!
//! impl std::error::Error for ValueError {}
//!
//! impl From<String> for ValueError {
//!     fn from(message: String) -> Self {
//!         Self(message)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = App::new();
//!     app.config()
//!         .set("REPORTABLE_ERROR", json!({ "DEFAULT_STATUS_CODE": 400 }));
//!
//!     let errors = Arc::new(ReportableErrors::new());
//!     errors.init(&app);
//!
//!     let value_error = errors.reportable::<ValueError>();
//!     let router: Router = Router::new()
//!         .route(
//!             "/",
//!             axum::routing::get(move || {
//!                 let value_error = value_error.clone();
//!                 async move { Err::<(), _>(value_error.from_message("bad input")) }
//!             }),
//!         )
//!         .layer(app.layer());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

// Lets the derive macros refer to `::reportable_error` from inside this crate.
extern crate self as reportable_error;

pub mod app;
pub mod capability;
pub mod class;
pub mod config;
pub mod error;
pub mod exception;
pub mod factory;
pub mod handler;
pub mod layer;
pub mod log;
pub mod render;

use std::sync::Arc;

// Re-export core types
pub use app::App;
pub use capability::{
    Capability, CapabilityMarker, CapabilityRegistry, CapabilitySet, DontWrap, Reportable,
};
pub use class::{ErrorClass, ReportableClass, ReportableType};
pub use config::{ConfigService, Settings, Severity};
pub use error::{ExtensionError, Result};
pub use exception::{Exception, ExceptionFilter, ExceptionFilters, Message};
pub use factory::ReportableFactory;
pub use handler::{ErrorResponse, ReportableErrorHandler, ReportableErrors};
pub use layer::{ReportableLayer, ReportableMiddleware};
pub use log::{LogSink, TracingSink};
pub use render::{Bindings, TemplateRenderer};

// Re-export macros
pub use reportable_error_macros::{Capability, ErrorClass};

// Re-export commonly used types from dependencies
pub use axum;

/// Creates the extension and binds it to `app` in one step.
pub fn init(app: &App) -> Arc<ReportableErrors> {
    let errors = Arc::new(ReportableErrors::new());
    errors.init(app);
    errors
}

/// Prelude module for convenient imports
///
/// ```
/// use reportable_error::prelude::*;
/// ```
pub mod prelude {
    pub use crate::app::App;
    pub use crate::capability::{CapabilityMarker, CapabilityRegistry, DontWrap, Reportable};
    pub use crate::class::ReportableType;
    pub use crate::config::{ConfigService, Settings, Severity};
    pub use crate::error::{ExtensionError, Result};
    pub use crate::exception::{Exception, ExceptionFilter};
    pub use crate::handler::{ErrorResponse, ReportableErrors};
    pub use crate::log::LogSink;
    pub use crate::render::{Bindings, TemplateRenderer};
    pub use crate::{Capability, ErrorClass};
    pub use axum::{
        Router,
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    pub use std::sync::Arc;
}
