//! Capability markers and the process-wide registry that collects them.
//!
//! A capability is a zero-sized type used as a classification label. The
//! factory combines every registered capability (plus the core [`Reportable`]
//! marker) with an error type to make it reportable.

use dashmap::DashMap;
use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A type-level tag denoting a behavioral contract an error type can carry.
///
/// Usually derived:
///
/// ```
/// use reportable_error::Capability;
///
/// #[derive(Capability)]
/// pub struct Audited;
/// ```
pub trait CapabilityMarker: 'static {
    fn name() -> &'static str {
        short_type_name::<Self>()
    }
}

/// The core marker every reportable class carries.
///
/// The error handler is installed for this capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reportable;

impl CapabilityMarker for Reportable {
    fn name() -> &'static str {
        "Reportable"
    }
}

/// Marks errors that lower layers must pass through untouched instead of
/// wrapping them in their own error types.
#[derive(Debug, Clone, Copy, Default)]
pub struct DontWrap;

impl CapabilityMarker for DontWrap {
    fn name() -> &'static str {
        "DontWrap"
    }
}

/// Type-erased capability marker.
#[derive(Debug, Clone, Copy)]
pub struct Capability {
    id: TypeId,
    name: &'static str,
}

impl Capability {
    pub fn of<M: CapabilityMarker>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: M::name(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<M: CapabilityMarker>(&self) -> bool {
        self.id == TypeId::of::<M>()
    }
}

impl PartialEq for Capability {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Capability {}

impl Hash for Capability {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Unordered set of capabilities.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    inner: HashSet<Capability>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert) for a marker type.
    pub fn with<M: CapabilityMarker>(mut self) -> Self {
        self.insert(Capability::of::<M>());
        self
    }

    /// Returns `true` if the capability was not present yet.
    pub fn insert(&mut self, capability: Capability) -> bool {
        self.inner.insert(capability)
    }

    pub fn contains(&self, capability: &Capability) -> bool {
        self.inner.contains(capability)
    }

    pub fn contains_marker<M: CapabilityMarker>(&self) -> bool {
        self.contains(&Capability::of::<M>())
    }

    pub fn is_superset(&self, other: &CapabilitySet) -> bool {
        self.inner.is_superset(&other.inner)
    }

    pub fn union(&self, other: &CapabilitySet) -> CapabilitySet {
        Self {
            inner: self.inner.union(&other.inner).copied().collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn sorted_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.inner.iter().map(Capability::name).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.sorted_names()).finish()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

impl Extend<Capability> for CapabilitySet {
    fn extend<I: IntoIterator<Item = Capability>>(&mut self, iter: I) {
        self.inner.extend(iter);
    }
}

/// Process-wide, append-only set of capability markers.
///
/// Registration is meant to happen at startup, before the factory derives
/// any class. Classes already derived keep the capabilities they were
/// created with.
#[derive(Default)]
pub struct CapabilityRegistry {
    markers: DashMap<TypeId, Capability>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `M` to the registry. Registering a marker twice is a no-op.
    pub fn register<M: CapabilityMarker>(&self) -> &Self {
        self.register_capability(Capability::of::<M>());
        self
    }

    pub fn register_capability(&self, capability: Capability) -> &Self {
        if self.markers.insert(capability.id, capability).is_none() {
            tracing::debug!("Registered capability: {}", capability.name);
        }
        self
    }

    /// Registers the marker's type and hands the value back unchanged, so a
    /// marker can be declared and registered in one expression.
    pub fn tag<M: CapabilityMarker>(&self, marker: M) -> M {
        self.register::<M>();
        marker
    }

    /// Snapshot of the markers registered so far.
    pub fn registered_markers(&self) -> CapabilitySet {
        self.markers.iter().map(|entry| *entry.value()).collect()
    }

    pub fn contains<M: CapabilityMarker>(&self) -> bool {
        self.markers.contains_key(&TypeId::of::<M>())
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Last path segment of a type name, without generic arguments.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Audited;
    impl CapabilityMarker for Audited {}

    struct Retryable<T>(std::marker::PhantomData<T>);
    impl<T: 'static> CapabilityMarker for Retryable<T> {}

    #[test]
    fn test_register_is_idempotent() {
        let registry = CapabilityRegistry::new();
        registry.register::<Audited>().register::<Audited>();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains::<Audited>());
    }

    #[test]
    fn test_tag_returns_marker_unchanged() {
        let registry = CapabilityRegistry::new();
        let marker = registry.tag(DontWrap);
        assert!(matches!(marker, DontWrap));
        assert!(registry.contains::<DontWrap>());
    }

    #[test]
    fn test_snapshot_is_detached_from_registry() {
        let registry = CapabilityRegistry::new();
        registry.register::<Reportable>();
        let snapshot = registry.registered_markers();

        registry.register::<Audited>();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_marker::<Reportable>());
        assert!(!snapshot.contains_marker::<Audited>());
    }

    #[test]
    fn test_default_marker_name_is_short_type_name() {
        assert_eq!(Audited::name(), "Audited");
        assert_eq!(Retryable::<String>::name(), "Retryable");
        assert_eq!(Capability::of::<Reportable>().to_string(), "Reportable");
    }

    #[test]
    fn test_set_superset_and_union() {
        let core = CapabilitySet::new().with::<Reportable>();
        let full = CapabilitySet::new().with::<Reportable>().with::<DontWrap>();

        assert!(full.is_superset(&core));
        assert!(!core.is_superset(&full));
        assert_eq!(core.union(&full), full);
        assert_eq!(format!("{:?}", full), r#"{"DontWrap", "Reportable"}"#);
    }
}
