use crate::capability::{CapabilitySet, Reportable};
use crate::class::{ErrorClass, ReportableClass};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::error::Error as StdError;
use std::fmt;
use std::sync::{Arc, LazyLock};

mod filter;

pub use filter::{ExceptionFilter, ExceptionFilters};

type BoxError = Box<dyn StdError + Send + Sync + 'static>;
type ReportFn = fn(&(dyn StdError + Send + Sync + 'static)) -> String;

static CORE_CLASS: LazyLock<Arc<ReportableClass>> =
    LazyLock::new(|| Arc::new(ReportableClass::base::<Message>()));

/// Plain message error backing [`Exception::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message(pub String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

impl From<String> for Message {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for Message {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl ErrorClass for Message {
    fn class_name() -> &'static str {
        "Reportable"
    }

    fn capabilities() -> CapabilitySet {
        CapabilitySet::new().with::<Reportable>()
    }
}

/// A raised reportable error.
///
/// Carries the original error, the class it was raised as, and the
/// instance-level overrides the handler consults first.
pub struct Exception {
    class: Arc<ReportableClass>,
    source: BoxError,
    report: ReportFn,
    status_code: Option<StatusCode>,
    headers: Option<HeaderMap>,
}

impl Exception {
    /// An instance of the core reportable class.
    pub fn new(message: impl Into<String>) -> Self {
        Self::from_class(Arc::clone(&CORE_CLASS), Message(message.into()))
    }

    pub(crate) fn from_class<E: ErrorClass>(class: Arc<ReportableClass>, error: E) -> Self {
        Self {
            class,
            source: Box::new(error),
            report: report_as::<E>,
            status_code: None,
            headers: None,
        }
    }

    pub fn class(&self) -> &Arc<ReportableClass> {
        &self.class
    }

    /// Runtime class name, as it appears in logs.
    pub fn type_name(&self) -> &str {
        self.class.name()
    }

    pub fn message(&self) -> String {
        self.source.to_string()
    }

    /// Body used when no template is configured.
    pub fn report(&self) -> String {
        (self.report)(self.source.as_ref())
    }

    /// Status code set on this instance, if any.
    pub fn status_code(&self) -> Option<StatusCode> {
        self.status_code
    }

    pub fn set_status_code(&mut self, status: StatusCode) {
        self.status_code = Some(status);
    }

    pub fn with_status_code(mut self, status: StatusCode) -> Self {
        self.set_status_code(status);
        self
    }

    /// Headers set on this instance, if any.
    pub fn headers(&self) -> Option<&HeaderMap> {
        self.headers.as_ref()
    }

    pub fn set_headers(&mut self, headers: HeaderMap) {
        self.headers = Some(headers);
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers
            .get_or_insert_with(HeaderMap::new)
            .insert(name, value);
        self
    }

    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.source.is::<E>()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.source.downcast_ref::<E>()
    }
}

fn report_as<E: ErrorClass>(error: &(dyn StdError + Send + Sync + 'static)) -> String {
    match error.downcast_ref::<E>() {
        Some(error) => error.report(),
        None => error.to_string(),
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exception")
            .field("class", &self.class.name())
            .field("message", &self.message())
            .field("status_code", &self.status_code)
            .field("headers", &self.headers)
            .finish()
    }
}

impl StdError for Exception {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Exception stashed in response extensions for the layer to pick up.
#[derive(Clone, Debug)]
pub(crate) struct Caught(pub(crate) Arc<Exception>);

/// Without the layer the client sees a bare 500; with it, the registered
/// filter replaces this response.
impl IntoResponse for Exception {
    fn into_response(self) -> Response {
        let mut response =
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        response.extensions_mut().insert(Caught(Arc::new(self)));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::CONTENT_TYPE;

    #[derive(Debug)]
    struct Shouting(String);

    impl fmt::Display for Shouting {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl StdError for Shouting {}

    impl ErrorClass for Shouting {
        fn report(&self) -> String {
            self.0.to_uppercase()
        }
    }

    #[test]
    fn test_report_defaults_to_message() {
        let s = "test reportable error";
        let exc = Exception::new(s);
        assert_eq!(exc.report(), s);
        assert_eq!(exc.to_string(), s);
        assert_eq!(exc.type_name(), "Reportable");
        assert!(exc.class().is_subtype_of::<Reportable>());
    }

    #[test]
    fn test_report_uses_class_override() {
        let class = Arc::new(ReportableClass::base::<Shouting>());
        let exc = Exception::from_class(class, Shouting("quiet".to_string()));
        assert_eq!(exc.report(), "QUIET");
        assert_eq!(exc.message(), "quiet");
    }

    #[test]
    fn test_instance_overrides_start_unset() {
        let mut exc = Exception::new("boom");
        assert_eq!(exc.status_code(), None);
        assert!(exc.headers().is_none());

        exc.set_status_code(StatusCode::NOT_FOUND);
        let exc = exc.with_header(CONTENT_TYPE, HeaderValue::from_static("plain/text"));
        assert_eq!(exc.status_code(), Some(StatusCode::NOT_FOUND));
        assert_eq!(
            exc.headers().and_then(|h| h.get(CONTENT_TYPE)),
            Some(&HeaderValue::from_static("plain/text"))
        );
    }

    #[test]
    fn test_into_response_stashes_exception() {
        let response = Exception::new("boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let caught = response.extensions().get::<Caught>().unwrap();
        assert_eq!(caught.0.message(), "boom");
    }

    #[test]
    fn test_downcast_to_original_error() {
        let exc = Exception::new("boom");
        assert!(exc.is::<Message>());
        assert_eq!(exc.downcast_ref::<Message>(), Some(&Message::from("boom")));
        assert!(exc.downcast_ref::<Shouting>().is_none());
    }
}
