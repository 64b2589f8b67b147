use crate::capability::{Capability, CapabilityMarker, Reportable};
use crate::error::Result;
use crate::exception::Exception;
use axum::response::Response;
use std::sync::{Arc, PoisonError, RwLock};

/// The ExceptionFilter trait
///
/// Filters turn exceptions caught during request processing into responses.
/// An `Err` is answered by the host's own fallback response.
pub trait ExceptionFilter: Send + Sync + 'static {
    /// Name the filter is registered under, for diagnostics.
    fn name(&self) -> &'static str;

    /// Catch an exception and return a response
    fn catch(&self, exception: &Exception) -> Result<Response>;
}

/// Filters keyed by the capability an exception must carry to reach them.
///
/// The [`Reportable`] filter wins whenever the exception's class carries
/// that capability; otherwise dispatch picks the first registered filter
/// whose capability the class carries. Registering a filter for a
/// capability that already has one replaces it in place.
#[derive(Clone, Default)]
pub struct ExceptionFilters {
    filters: Arc<RwLock<Vec<(Capability, Arc<dyn ExceptionFilter>)>>>,
}

impl ExceptionFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M: CapabilityMarker>(&self, filter: impl ExceptionFilter) -> &Self {
        self.register_for(Capability::of::<M>(), Arc::new(filter))
    }

    pub fn register_for(&self, capability: Capability, filter: Arc<dyn ExceptionFilter>) -> &Self {
        let mut filters = self.filters.write().unwrap_or_else(PoisonError::into_inner);
        match filters.iter_mut().find(|(key, _)| *key == capability) {
            Some(slot) => slot.1 = filter,
            None => filters.push((capability, filter)),
        }
        self
    }

    pub fn get<M: CapabilityMarker>(&self) -> Option<Arc<dyn ExceptionFilter>> {
        let capability = Capability::of::<M>();
        self.read()
            .iter()
            .find(|(key, _)| *key == capability)
            .map(|(_, filter)| Arc::clone(filter))
    }

    pub fn contains<M: CapabilityMarker>(&self) -> bool {
        self.get::<M>().is_some()
    }

    /// Filter responsible for `exception`, if any.
    pub fn find(&self, exception: &Exception) -> Option<Arc<dyn ExceptionFilter>> {
        let core = Capability::of::<Reportable>();
        self.read()
            .iter()
            .filter(|(capability, _)| exception.class().satisfies(capability))
            // `min_by_key` keeps the first of equal keys.
            .min_by_key(|(capability, _)| *capability != core)
            .map(|(_, filter)| Arc::clone(filter))
    }

    /// Runs the responsible filter. `None` when no filter matches.
    pub fn dispatch(&self, exception: &Exception) -> Option<Result<Response>> {
        let filter = self.find(exception)?;
        tracing::debug!("Dispatching {} to {}", exception.type_name(), filter.name());
        Some(filter.catch(exception))
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<(Capability, Arc<dyn ExceptionFilter>)>> {
        self.filters.read().unwrap_or_else(PoisonError::into_inner)
    }
}
