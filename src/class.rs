use crate::capability::{short_type_name, Capability, CapabilityMarker, CapabilitySet};
use crate::exception::Exception;
use axum::http::HeaderMap;
use std::any::TypeId;
use std::error::Error as StdError;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Per-class declarations of an error type.
///
/// Every item has a default, so `impl ErrorClass for MyError {}` is enough
/// to make `MyError` usable with the factory. The derive macro fills the
/// declarations from a `#[reportable(...)]` attribute:
///
/// ```
/// use reportable_error::{DontWrap, ErrorClass};
///
/// #[derive(Debug, ErrorClass)]
/// #[reportable(
///     template = "errors/quota.html",
///     header(name = "Retry-After", value = "60"),
///     capabilities(DontWrap)
/// )]
/// struct QuotaExceeded;
///
/// impl std::fmt::Display for QuotaExceeded {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         f.write_str("quota exceeded")
///     }
/// }
///
/// impl std::error::Error for QuotaExceeded {}
/// ```
pub trait ErrorClass: StdError + Send + Sync + 'static {
    /// Name used in logs and as the suffix of derived class names.
    fn class_name() -> &'static str
    where
        Self: Sized,
    {
        short_type_name::<Self>()
    }

    /// Class-level response headers.
    fn headers() -> Option<HeaderMap>
    where
        Self: Sized,
    {
        None
    }

    /// Class-level template for the response body.
    fn template() -> Option<&'static str>
    where
        Self: Sized,
    {
        None
    }

    /// Capabilities the type already carries on its own.
    fn capabilities() -> CapabilitySet
    where
        Self: Sized,
    {
        CapabilitySet::new()
    }

    /// Response body used when no template applies.
    fn report(&self) -> String {
        self.to_string()
    }
}

/// Runtime descriptor of a reportable class.
///
/// This is the value the factory memoizes: two descriptors are the same
/// class exactly when they are the same allocation.
pub struct ReportableClass {
    name: String,
    type_name: &'static str,
    base: TypeId,
    capabilities: CapabilitySet,
    headers: Option<HeaderMap>,
    template: Option<&'static str>,
    derived: bool,
}

impl ReportableClass {
    /// Descriptor for `E` as it is, without wrapping.
    pub(crate) fn base<E: ErrorClass>() -> Self {
        Self {
            name: E::class_name().to_string(),
            type_name: E::class_name(),
            base: TypeId::of::<E>(),
            capabilities: E::capabilities(),
            headers: E::headers(),
            template: E::template(),
            derived: false,
        }
    }

    /// Descriptor combining `E` with `capabilities`.
    pub(crate) fn derive<E: ErrorClass>(capabilities: &CapabilitySet) -> Self {
        let base = Self::base::<E>();
        Self {
            name: format!("Reportable{}", base.type_name),
            capabilities: base.capabilities.union(capabilities),
            derived: true,
            ..base
        }
    }

    /// Class name, `Reportable<Base>` for derived classes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the base error type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn headers(&self) -> Option<&HeaderMap> {
        self.headers.as_ref()
    }

    pub fn template(&self) -> Option<&'static str> {
        self.template
    }

    /// `false` when the base type already carried every capability and was
    /// returned by the factory as is.
    pub fn is_derived(&self) -> bool {
        self.derived
    }

    pub fn is_subtype_of<M: CapabilityMarker>(&self) -> bool {
        self.capabilities.contains_marker::<M>()
    }

    pub fn satisfies(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn derives_from<E: 'static>(&self) -> bool {
        self.base == TypeId::of::<E>()
    }
}

impl fmt::Debug for ReportableClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportableClass")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("capabilities", &self.capabilities)
            .field("derived", &self.derived)
            .finish()
    }
}

/// Typed handle on a reportable class, returned by the factory.
pub struct ReportableType<E> {
    class: Arc<ReportableClass>,
    _marker: PhantomData<fn() -> E>,
}

impl<E: ErrorClass> ReportableType<E> {
    pub(crate) fn new(class: Arc<ReportableClass>) -> Self {
        Self {
            class,
            _marker: PhantomData,
        }
    }

    /// Create an exception instance of this class.
    pub fn new_exception(&self, error: E) -> Exception {
        Exception::from_class(Arc::clone(&self.class), error)
    }

    /// Create an exception instance from a message.
    pub fn from_message(&self, message: impl Into<String>) -> Exception
    where
        E: From<String>,
    {
        self.new_exception(E::from(message.into()))
    }

    pub fn class(&self) -> &Arc<ReportableClass> {
        &self.class
    }

    /// Reference equality of the underlying classes.
    pub fn same_type<F>(&self, other: &ReportableType<F>) -> bool {
        Arc::ptr_eq(&self.class, &other.class)
    }
}

impl<E> Clone for ReportableType<E> {
    fn clone(&self) -> Self {
        Self {
            class: Arc::clone(&self.class),
            _marker: PhantomData,
        }
    }
}

impl<E> fmt::Debug for ReportableType<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReportableType").field(&self.class).finish()
    }
}

impl<E> std::ops::Deref for ReportableType<E> {
    type Target = ReportableClass;

    fn deref(&self) -> &Self::Target {
        &self.class
    }
}
