#![forbid(unsafe_code)]

//! Per-binding-object subscription bookkeeping and notification dispatch.
//!
//! A [`BindingTrackingState`] owns one [`SubscriptionCache`] per
//! [`CacheKey`] (slot id plus path step). Every subscription it makes carries a
//! handler that knows its own key, so an incoming change is routed to exactly
//! one slot: the cost of a source mutation is O(dependent slots), not
//! O(all bindings on the element).
//!
//! Handlers reach the owning binding object through a [`ListenerGate`], a
//! shared, clearable, non-owning back-reference. Closing the gate silences
//! every handler at once, even ones already snapshotted by an in-flight emit.
//!
//! # Invariants
//!
//! 1. Each cache holds zero or one live subscription.
//! 2. After [`BindingTrackingState::release_all`] (or drop) no subscription made
//!    by this state is live and the gate is closed.
//! 3. Routing never resolves to a slot whose cache was re-pointed or released
//!    since the subscription fired.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::cache::{CacheUpdate, SourceRef, SubscriptionCache, Watch};
use crate::notify::{Change, Notifying, PropertyId, SubscriptionId, Topic};
use crate::table::SlotId;

/// Address of one cache: a slot and the step along its property path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub slot: SlotId,
    pub step: u16,
}

impl CacheKey {
    #[must_use]
    pub const fn new(slot: SlotId, step: u16) -> Self {
        Self { slot, step }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.slot, self.step)
    }
}

/// Receiver of routed notifications; implemented by the binding object.
pub trait TrackingListener {
    fn on_change(&self, key: CacheKey, change: &Change);
}

/// Clearable, non-owning back-reference shared by every handler of one state.
#[derive(Default)]
pub struct ListenerGate {
    listener: RefCell<Option<Weak<dyn TrackingListener>>>,
}

impl ListenerGate {
    pub fn set(&self, listener: Option<Weak<dyn TrackingListener>>) {
        *self.listener.borrow_mut() = listener;
    }

    pub fn close(&self) {
        self.set(None);
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.listener
            .borrow()
            .as_ref()
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    fn listener(&self) -> Option<Rc<dyn TrackingListener>> {
        self.listener.borrow().as_ref().and_then(Weak::upgrade)
    }
}

/// One dependency observed while evaluating a slot.
#[derive(Clone, Debug)]
pub struct Dependency {
    pub watch: Watch,
    /// `None` when the path step evaluated to a non-notifying value.
    pub source: Option<SourceRef>,
}

/// Subscription caches of one binding object, keyed by [`CacheKey`].
pub struct BindingTrackingState {
    caches: BTreeMap<CacheKey, SubscriptionCache>,
    gate: Rc<ListenerGate>,
}

impl BindingTrackingState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            caches: BTreeMap::new(),
            gate: Rc::new(ListenerGate::default()),
        }
    }

    /// Install (or clear) the back-reference handlers dispatch to.
    pub fn set_listener(&self, listener: Option<Weak<dyn TrackingListener>>) {
        self.gate.set(listener);
    }

    /// Shared handle to the gate, so the owner can close it without borrowing
    /// the state.
    #[must_use]
    pub fn gate(&self) -> Rc<ListenerGate> {
        Rc::clone(&self.gate)
    }

    pub fn update_property_changed_listener(
        &mut self,
        key: CacheKey,
        source: Option<SourceRef>,
        property: Option<&'static str>,
    ) -> CacheUpdate {
        let watch = Watch {
            topic: Topic::PropertyChanged,
            property,
        };
        self.update_listener(key, watch, source)
    }

    pub fn update_collection_changed_listener(
        &mut self,
        key: CacheKey,
        source: Option<SourceRef>,
    ) -> CacheUpdate {
        self.update_listener(key, Watch::new(Topic::CollectionChanged), source)
    }

    pub fn update_dependency_property_changed_listener(
        &mut self,
        key: CacheKey,
        source: Option<SourceRef>,
        property: PropertyId,
    ) -> CacheUpdate {
        self.update_listener(key, Watch::new(Topic::DependencyProperty(property)), source)
    }

    pub fn update_vector_changed_listener(
        &mut self,
        key: CacheKey,
        source: Option<SourceRef>,
    ) -> CacheUpdate {
        self.update_listener(key, Watch::new(Topic::VectorChanged), source)
    }

    pub fn update_map_changed_listener(
        &mut self,
        key: CacheKey,
        source: Option<SourceRef>,
    ) -> CacheUpdate {
        self.update_listener(key, Watch::new(Topic::MapChanged), source)
    }

    pub fn update_errors_changed_listener(
        &mut self,
        key: CacheKey,
        source: Option<SourceRef>,
        property: Option<&'static str>,
    ) -> CacheUpdate {
        let watch = Watch {
            topic: Topic::ErrorsChanged,
            property,
        };
        self.update_listener(key, watch, source)
    }

    /// Point the cache at `key` to `source` with `watch`.
    pub fn update_listener(
        &mut self,
        key: CacheKey,
        watch: Watch,
        source: Option<SourceRef>,
    ) -> CacheUpdate {
        if source.is_none() && !self.caches.contains_key(&key) {
            return CacheUpdate::Unchanged;
        }
        let gate = Rc::clone(&self.gate);
        let cache = self.caches.entry(key).or_default();
        let outcome = cache.update(source, watch, move || {
            move |change: &Change| {
                // Upgrade outside the borrow: the listener may re-enter the gate.
                let listener = gate.listener();
                if let Some(listener) = listener {
                    listener.on_change(key, change);
                }
            }
        });
        if outcome == CacheUpdate::Cleared {
            self.caches.remove(&key);
        }
        tracing::trace!(%key, ?outcome, topic = ?watch.topic, "listener updated");
        outcome
    }

    /// Apply the dependencies observed by one evaluation of `slot`.
    ///
    /// Step `i` of `deps` goes to cache `(slot, i)`; caches for steps past the
    /// end (a path that got shorter, e.g. an intermediate turned null) are
    /// released.
    pub fn apply(&mut self, slot: SlotId, deps: Vec<Dependency>) {
        let observed = deps.len();
        for (step, dep) in deps.into_iter().enumerate() {
            let Ok(step) = u16::try_from(step) else {
                tracing::warn!(%slot, "path deeper than u16::MAX steps; rest untracked");
                break;
            };
            self.update_listener(CacheKey::new(slot, step), dep.watch, dep.source);
        }
        let stale: Vec<CacheKey> = self
            .slot_keys(slot)
            .filter(|key| usize::from(key.step) >= observed)
            .collect();
        for key in stale {
            self.caches.remove(&key);
        }
    }

    /// Resolve the slot that must re-run for `change` fired on `key`'s cache.
    ///
    /// `None` if the cache is gone, its source was collected, or the change
    /// concerns a property the cache does not watch.
    #[must_use]
    pub fn route(&self, key: CacheKey, change: &Change) -> Option<SlotId> {
        let cache = self.caches.get(&key)?;
        let watch = cache.watch()?;
        if !watch.wants(change) {
            return None;
        }
        if cache.resolve().is_none() {
            tracing::trace!(%key, "source collected; change ignored");
            return None;
        }
        Some(key.slot)
    }

    /// Release every cache of `slot`.
    pub fn release_slot(&mut self, slot: SlotId) {
        let keys: Vec<CacheKey> = self.slot_keys(slot).collect();
        for key in keys {
            self.caches.remove(&key);
        }
    }

    /// Release every cache. The gate is left as is.
    pub fn release_all(&mut self) {
        let released = self.caches.len();
        self.caches.clear();
        if released > 0 {
            tracing::debug!(released, "released all binding listeners");
        }
    }

    #[must_use]
    pub fn cache(&self, key: CacheKey) -> Option<&SubscriptionCache> {
        self.caches.get(&key)
    }

    /// Number of caches with a live subscription.
    #[must_use]
    pub fn live_subscriptions(&self) -> usize {
        self.caches.values().filter(|c| c.is_subscribed()).count()
    }

    /// `(key, subscription)` pairs in key order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(CacheKey, SubscriptionId)> {
        self.caches
            .iter()
            .filter_map(|(key, cache)| cache.subscription_id().map(|id| (*key, id)))
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Whether any cache currently points at `source`.
    #[must_use]
    pub fn tracks(&self, source: &Rc<dyn Notifying>) -> bool {
        self.caches
            .values()
            .any(|cache| cache.source().is_some_and(|s| s.points_to(source)))
    }

    fn slot_keys(&self, slot: SlotId) -> impl Iterator<Item = CacheKey> + '_ {
        self.caches
            .range(CacheKey::new(slot, 0)..=CacheKey::new(slot, u16::MAX))
            .map(|(key, _)| *key)
    }
}

impl Default for BindingTrackingState {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BindingTrackingState {
    fn drop(&mut self) {
        self.gate.close();
        self.release_all();
    }
}

impl fmt::Debug for BindingTrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingTrackingState")
            .field("caches", &self.caches.len())
            .field("live", &self.live_subscriptions())
            .field("listening", &self.gate.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Notifier;

    struct Source {
        notifier: Notifier,
    }

    impl Notifying for Source {
        fn notifier(&self) -> &Notifier {
            &self.notifier
        }
    }

    fn source() -> Rc<dyn Notifying> {
        Rc::new(Source {
            notifier: Notifier::new(),
        })
    }

    #[derive(Default)]
    struct Recorder {
        routed: RefCell<Vec<CacheKey>>,
    }

    impl TrackingListener for Recorder {
        fn on_change(&self, key: CacheKey, _change: &Change) {
            self.routed.borrow_mut().push(key);
        }
    }

    fn tracked() -> (BindingTrackingState, Rc<Recorder>) {
        let recorder = Rc::new(Recorder::default());
        let state = BindingTrackingState::new();
        let weak: Weak<dyn TrackingListener> = Rc::downgrade(&(recorder.clone() as Rc<dyn TrackingListener>));
        state.set_listener(Some(weak));
        (state, recorder)
    }

    #[test]
    fn routes_to_owning_key_only() {
        let (mut state, recorder) = tracked();
        let a = source();
        let b = source();
        let ka = CacheKey::new(SlotId(0), 0);
        let kb = CacheKey::new(SlotId(1), 0);
        state.update_property_changed_listener(ka, Some(SourceRef::weak(&a)), Some("Name"));
        state.update_property_changed_listener(kb, Some(SourceRef::weak(&b)), Some("Name"));

        a.notifier().property_changed("Name");
        assert_eq!(*recorder.routed.borrow(), vec![ka]);
    }

    #[test]
    fn route_applies_property_filter() {
        let (mut state, _) = tracked();
        let a = source();
        let key = CacheKey::new(SlotId(3), 0);
        state.update_property_changed_listener(key, Some(SourceRef::weak(&a)), Some("Name"));
        assert_eq!(
            state.route(key, &Change::Property { name: Some("Name") }),
            Some(SlotId(3))
        );
        assert_eq!(state.route(key, &Change::Property { name: Some("Age") }), None);
        assert_eq!(state.route(key, &Change::Property { name: None }), Some(SlotId(3)));
    }

    #[test]
    fn apply_trims_shorter_path() {
        let (mut state, _) = tracked();
        let root = source();
        let child = source();
        let slot = SlotId(2);
        state.apply(
            slot,
            vec![
                Dependency {
                    watch: Watch::property(Topic::PropertyChanged, "Address"),
                    source: Some(SourceRef::weak(&root)),
                },
                Dependency {
                    watch: Watch::property(Topic::PropertyChanged, "City"),
                    source: Some(SourceRef::weak(&child)),
                },
            ],
        );
        assert_eq!(state.live_subscriptions(), 2);

        state.apply(
            slot,
            vec![Dependency {
                watch: Watch::property(Topic::PropertyChanged, "Address"),
                source: Some(SourceRef::weak(&root)),
            }],
        );
        assert_eq!(state.live_subscriptions(), 1);
        assert_eq!(child.notifier().subscriber_count(), 0);
        assert_eq!(root.notifier().subscriber_count(), 1);
    }

    #[test]
    fn null_source_clears_cache() {
        let (mut state, _) = tracked();
        let a = source();
        let key = CacheKey::new(SlotId(0), 0);
        state.update_collection_changed_listener(key, Some(SourceRef::weak(&a)));
        assert!(state.tracks(&a));
        let outcome = state.update_collection_changed_listener(key, None);
        assert_eq!(outcome, CacheUpdate::Cleared);
        assert!(state.cache(key).is_none());
        assert_eq!(a.notifier().subscriber_count(), 0);
    }

    #[test]
    fn repeated_update_keeps_subscription() {
        let (mut state, _) = tracked();
        let a = source();
        let key = CacheKey::new(SlotId(0), 0);
        state.update_vector_changed_listener(key, Some(SourceRef::weak(&a)));
        let before = state.snapshot();
        let outcome = state.update_vector_changed_listener(key, Some(SourceRef::weak(&a)));
        assert_eq!(outcome, CacheUpdate::Unchanged);
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn closed_gate_silences_handlers() {
        let (mut state, recorder) = tracked();
        let a = source();
        let key = CacheKey::new(SlotId(0), 0);
        state.update_map_changed_listener(key, Some(SourceRef::weak(&a)));
        state.gate().close();
        a.notifier().map_changed(crate::notify::MapAction::ItemInserted, "k");
        assert!(recorder.routed.borrow().is_empty());
    }

    #[test]
    fn drop_releases_everything() {
        let (mut state, _) = tracked();
        let a = source();
        let width = PropertyId("Width");
        state.update_dependency_property_changed_listener(
            CacheKey::new(SlotId(0), 0),
            Some(SourceRef::weak(&a)),
            width,
        );
        state.update_errors_changed_listener(
            CacheKey::new(SlotId(1), 0),
            Some(SourceRef::weak(&a)),
            None,
        );
        assert_eq!(a.notifier().subscriber_count(), 2);
        let gate = state.gate();
        drop(state);
        assert_eq!(a.notifier().subscriber_count(), 0);
        assert!(!gate.is_open());
    }

    #[test]
    fn release_slot_only_touches_that_slot() {
        let (mut state, _) = tracked();
        let a = source();
        state.update_property_changed_listener(CacheKey::new(SlotId(0), 0), Some(SourceRef::weak(&a)), None);
        state.update_property_changed_listener(CacheKey::new(SlotId(0), 1), Some(SourceRef::weak(&a)), None);
        state.update_property_changed_listener(CacheKey::new(SlotId(1), 0), Some(SourceRef::weak(&a)), None);
        state.release_slot(SlotId(0));
        assert_eq!(state.live_subscriptions(), 1);
        assert!(state.cache(CacheKey::new(SlotId(1), 0)).is_some());
    }

    #[test]
    fn collected_source_routes_nowhere() {
        let (mut state, _) = tracked();
        let a = source();
        let key = CacheKey::new(SlotId(0), 0);
        state.update_property_changed_listener(key, Some(SourceRef::weak(&a)), None);
        drop(a);
        assert_eq!(state.route(key, &Change::Property { name: None }), None);
    }
}
