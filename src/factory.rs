use crate::capability::{Capability, CapabilityRegistry, Reportable};
use crate::class::{ErrorClass, ReportableClass, ReportableType};
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::Arc;

/// Derives reportable classes from error types, once per type.
///
/// The first call for a given type fixes its class for the lifetime of the
/// factory; capabilities registered afterwards do not affect it.
pub struct ReportableFactory {
    registry: Arc<CapabilityRegistry>,
    classes: DashMap<TypeId, Arc<ReportableClass>>,
}

impl ReportableFactory {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            classes: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Returns the reportable class for `E`.
    ///
    /// If `E` already carries every registered capability plus
    /// [`Reportable`], the class describes `E` itself; otherwise it is a
    /// derived `Reportable<E>` class carrying the union.
    pub fn reportable<E: ErrorClass>(&self) -> ReportableType<E> {
        // The entry guard holds the shard lock, so concurrent first calls
        // for the same type end up with a single class.
        let class = self
            .classes
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Arc::new(self.classify::<E>()))
            .value()
            .clone();
        ReportableType::new(class)
    }

    fn classify<E: ErrorClass>(&self) -> ReportableClass {
        let mut required = self.registry.registered_markers();
        required.insert(Capability::of::<Reportable>());

        if E::capabilities().is_superset(&required) {
            tracing::debug!("{} is already reportable", E::class_name());
            return ReportableClass::base::<E>();
        }

        let class = ReportableClass::derive::<E>(&required);
        tracing::debug!(
            "Derived {} with capabilities {:?}",
            class.name(),
            class.capabilities()
        );
        class
    }

    /// Whether a class for `E` has been derived already.
    pub fn contains<E: 'static>(&self) -> bool {
        self.classes.contains_key(&TypeId::of::<E>())
    }

    pub fn cached_len(&self) -> usize {
        self.classes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{CapabilityMarker, CapabilitySet, DontWrap};
    use std::error::Error as StdError;
    use std::fmt;

    macro_rules! error_type {
        ($name:ident) => {
            #[derive(Debug)]
            struct $name(String);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl StdError for $name {}

            impl From<String> for $name {
                fn from(message: String) -> Self {
                    Self(message)
                }
            }
        };
    }

    error_type!(ValueError);
    error_type!(AttributeError);
    error_type!(AlreadyReportable);

    impl ErrorClass for ValueError {}
    impl ErrorClass for AttributeError {}

    impl ErrorClass for AlreadyReportable {
        fn capabilities() -> CapabilitySet {
            CapabilitySet::new().with::<Reportable>().with::<DontWrap>()
        }
    }

    struct Mixin;
    impl CapabilityMarker for Mixin {}

    fn factory() -> ReportableFactory {
        let registry = Arc::new(CapabilityRegistry::new());
        registry.register::<Reportable>();
        ReportableFactory::new(registry)
    }

    #[test]
    fn test_factory_returns_reportable_subtype() {
        let factory = factory();
        let class = factory.reportable::<ValueError>();

        assert!(class.is_subtype_of::<Reportable>());
        assert!(class.derives_from::<ValueError>());
        assert_eq!(class.name(), "ReportableValueError");
        assert_eq!(class.type_name(), "ValueError");
    }

    #[test]
    fn test_factory_instances_report_message() {
        let factory = factory();
        let s = "test reportable error";
        let exc = factory.reportable::<ValueError>().from_message(s);
        assert_eq!(exc.report(), s);
        assert_eq!(exc.type_name(), "ReportableValueError");
    }

    #[test]
    fn test_factory_is_memoized_per_type() {
        let factory = factory();
        let exc1 = factory.reportable::<ValueError>();
        let exc2 = factory.reportable::<ValueError>();
        let exc3 = factory.reportable::<AttributeError>();

        assert!(exc1.same_type(&exc2));
        assert!(!exc1.same_type(&exc3));
        assert_eq!(factory.cached_len(), 2);
    }

    #[test]
    fn test_first_call_wins_after_registry_changes() {
        let factory = factory();
        let before = factory.reportable::<ValueError>();

        factory.registry().register::<Mixin>();
        let after = factory.reportable::<ValueError>();

        assert!(before.same_type(&after));
        assert!(!after.is_subtype_of::<Mixin>());
        assert!(factory.reportable::<AttributeError>().is_subtype_of::<Mixin>());
    }

    #[test]
    fn test_registered_mixins_are_combined() {
        let factory = factory();
        factory.registry().register::<Mixin>();
        let class = factory.reportable::<ValueError>();

        assert!(class.is_subtype_of::<Mixin>());
        assert!(class.is_subtype_of::<Reportable>());
        assert!(class.derives_from::<ValueError>());
    }

    #[test]
    fn test_fully_capable_type_is_returned_as_is() {
        let factory = factory();
        factory.registry().register::<DontWrap>();
        let class = factory.reportable::<AlreadyReportable>();

        assert!(!class.is_derived());
        assert_eq!(class.name(), "AlreadyReportable");
    }

    #[test]
    fn test_concurrent_first_calls_share_one_class() {
        let factory = Arc::new(factory());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let factory = Arc::clone(&factory);
                std::thread::spawn(move || factory.reportable::<ValueError>())
            })
            .collect();

        let classes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(classes.windows(2).all(|w| w[0].same_type(&w[1])));
        assert_eq!(factory.cached_len(), 1);
    }
}
