#![forbid(unsafe_code)]

//! One cached subscription: a source reference plus the handle subscribed on it.
//!
//! # Invariants
//!
//! 1. At most one live [`Subscription`] per cache. Re-pointing always releases
//!    the old handle before subscribing to the new source.
//! 2. Re-pointing to the same source with the same watch is a no-op: the
//!    existing handle is kept (no unsubscribe/subscribe churn).
//! 3. A `None` source clears the cache; nothing stays subscribed.
//! 4. A weak source may resolve to nothing at any time. Readers treat that as
//!    "unavailable", never as an error.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::notify::{Change, Notifying, Subscription, SubscriptionId, Topic};

/// Ownership-tagged handle to a notifying source.
#[derive(Clone)]
pub enum SourceRef {
    /// Non-owning: the source's owner controls its lifetime.
    Weak(Weak<dyn Notifying>),
    /// Owning: used for boxed value sources, which nothing else keeps alive.
    Strong(Rc<dyn Notifying>),
}

impl SourceRef {
    #[must_use]
    pub fn weak(source: &Rc<dyn Notifying>) -> Self {
        Self::Weak(Rc::downgrade(source))
    }

    #[must_use]
    pub fn strong(source: Rc<dyn Notifying>) -> Self {
        Self::Strong(source)
    }

    /// Resolve to the source, or `None` if a weak source has been dropped.
    #[must_use]
    pub fn resolve(&self) -> Option<Rc<dyn Notifying>> {
        match self {
            Self::Weak(weak) => weak.upgrade(),
            Self::Strong(strong) => Some(Rc::clone(strong)),
        }
    }

    #[must_use]
    pub fn is_strong(&self) -> bool {
        matches!(self, Self::Strong(_))
    }

    /// Whether this handle points at `source`.
    #[must_use]
    pub fn points_to(&self, source: &Rc<dyn Notifying>) -> bool {
        match self {
            Self::Weak(weak) => std::ptr::addr_eq(weak.as_ptr(), Rc::as_ptr(source)),
            Self::Strong(strong) => Rc::ptr_eq(strong, source),
        }
    }
}

impl fmt::Debug for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weak(weak) => f
                .debug_tuple("Weak")
                .field(&(weak.strong_count() > 0))
                .finish(),
            Self::Strong(_) => f.write_str("Strong"),
        }
    }
}

/// What a cache listens for on its source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Watch {
    pub topic: Topic,
    /// Property of interest for property/errors notifications; `None` = any.
    pub property: Option<&'static str>,
}

impl Watch {
    #[must_use]
    pub const fn new(topic: Topic) -> Self {
        Self {
            topic,
            property: None,
        }
    }

    #[must_use]
    pub const fn property(topic: Topic, name: &'static str) -> Self {
        Self {
            topic,
            property: Some(name),
        }
    }

    /// Whether `change` concerns this watch.
    ///
    /// A change naming no property ("all properties") matches every filter.
    #[must_use]
    pub fn wants(&self, change: &Change) -> bool {
        if !self.topic.matches(change) {
            return false;
        }
        match (self.property, change) {
            (Some(want), Change::Property { name: Some(got) })
            | (Some(want), Change::Errors { property: Some(got) }) => want == *got,
            _ => true,
        }
    }
}

/// Outcome of [`SubscriptionCache::update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheUpdate {
    /// Same source and watch; the existing subscription is kept.
    Unchanged,
    /// Old subscription (if any) released; new one installed.
    Repointed,
    /// Source was `None`; the cache is now empty.
    Cleared,
}

/// A weak-or-strong source reference plus its subscription handle.
#[derive(Default)]
pub struct SubscriptionCache {
    source: Option<SourceRef>,
    watch: Option<Watch>,
    subscription: Option<Subscription>,
}

impl SubscriptionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the cache at `source`, subscribing with the handler from `make_handler`.
    ///
    /// `make_handler` is only called when a new subscription is actually made.
    pub fn update<H>(
        &mut self,
        source: Option<SourceRef>,
        watch: Watch,
        make_handler: impl FnOnce() -> H,
    ) -> CacheUpdate
    where
        H: Fn(&Change) + 'static,
    {
        let Some(source) = source else {
            let was_set = self.source.is_some() || self.subscription.is_some();
            self.clear();
            return if was_set {
                CacheUpdate::Cleared
            } else {
                CacheUpdate::Unchanged
            };
        };
        let Some(resolved) = source.resolve() else {
            // Collected before we could subscribe: nothing to listen to.
            self.clear();
            return CacheUpdate::Cleared;
        };

        let same_source = self
            .source
            .as_ref()
            .is_some_and(|current| current.points_to(&resolved));
        if same_source && self.watch == Some(watch) && self.is_subscribed() {
            // Keep the handle; only the ownership tag may change.
            if source.is_strong() != self.source.as_ref().is_some_and(SourceRef::is_strong) {
                self.source = Some(source);
            }
            return CacheUpdate::Unchanged;
        }

        // Release first so no moment exists with two live handles.
        self.subscription = None;
        let subscription = resolved
            .notifier()
            .subscribe(watch.topic, make_handler());
        self.source = Some(source);
        self.watch = Some(watch);
        self.subscription = Some(subscription);
        CacheUpdate::Repointed
    }

    /// Release the subscription and forget the source.
    pub fn clear(&mut self) {
        self.subscription = None;
        self.source = None;
        self.watch = None;
    }

    /// The cached source, if still alive.
    #[must_use]
    pub fn resolve(&self) -> Option<Rc<dyn Notifying>> {
        self.source.as_ref().and_then(SourceRef::resolve)
    }

    #[must_use]
    pub fn source(&self) -> Option<&SourceRef> {
        self.source.as_ref()
    }

    #[must_use]
    pub fn watch(&self) -> Option<Watch> {
        self.watch
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }

    #[must_use]
    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        self.subscription.as_ref().map(Subscription::id)
    }
}

impl fmt::Debug for SubscriptionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionCache")
            .field("source", &self.source)
            .field("watch", &self.watch)
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::notify::{Boxed, Notifier};

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

    fn counting() -> (Rc<Cell<usize>>, impl FnOnce() -> Box<dyn Fn(&Change)>) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        (count, move || {
            Box::new(move |_: &Change| c.set(c.get() + 1)) as Box<dyn Fn(&Change)>
        })
    }

    #[test]
    fn subscribes_and_receives() {
        let src = source();
        let mut cache = SubscriptionCache::new();
        let (count, handler) = counting();
        let outcome = cache.update(
            Some(SourceRef::weak(&src)),
            Watch::new(Topic::PropertyChanged),
            handler,
        );
        assert_eq!(outcome, CacheUpdate::Repointed);
        assert!(cache.is_subscribed());
        src.notifier().property_changed("Name");
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn same_source_is_noop() {
        let src = source();
        let mut cache = SubscriptionCache::new();
        let (_, first) = counting();
        cache.update(Some(SourceRef::weak(&src)), Watch::new(Topic::PropertyChanged), first);
        let id = cache.subscription_id();

        let called = Rc::new(Cell::new(false));
        let c = Rc::clone(&called);
        let outcome = cache.update(
            Some(SourceRef::weak(&src)),
            Watch::new(Topic::PropertyChanged),
            move || {
                c.set(true);
                |_: &Change| {}
            },
        );
        assert_eq!(outcome, CacheUpdate::Unchanged);
        assert!(!called.get(), "handler factory must not run for a no-op");
        assert_eq!(cache.subscription_id(), id);
        assert_eq!(src.notifier().subscriber_count(), 1);
    }

    #[test]
    fn repoint_releases_old_source() {
        let a = source();
        let b = source();
        let mut cache = SubscriptionCache::new();
        let (count, h1) = counting();
        cache.update(Some(SourceRef::weak(&a)), Watch::new(Topic::PropertyChanged), h1);
        let (_, h2) = counting();
        let outcome = cache.update(Some(SourceRef::weak(&b)), Watch::new(Topic::PropertyChanged), h2);
        assert_eq!(outcome, CacheUpdate::Repointed);
        assert_eq!(a.notifier().subscriber_count(), 0);
        assert_eq!(b.notifier().subscriber_count(), 1);
        a.notifier().property_changed("Name");
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn changed_watch_resubscribes() {
        let src = source();
        let mut cache = SubscriptionCache::new();
        let (_, h1) = counting();
        cache.update(Some(SourceRef::weak(&src)), Watch::property(Topic::PropertyChanged, "A"), h1);
        let before = cache.subscription_id();
        let (_, h2) = counting();
        cache.update(Some(SourceRef::weak(&src)), Watch::property(Topic::PropertyChanged, "B"), h2);
        assert_ne!(cache.subscription_id(), before);
        assert_eq!(src.notifier().subscriber_count(), 1);
    }

    #[test]
    fn none_clears() {
        let src = source();
        let mut cache = SubscriptionCache::new();
        let (_, h) = counting();
        cache.update(Some(SourceRef::weak(&src)), Watch::new(Topic::CollectionChanged), h);
        let outcome = cache.update(None, Watch::new(Topic::CollectionChanged), || |_: &Change| {});
        assert_eq!(outcome, CacheUpdate::Cleared);
        assert!(!cache.is_subscribed());
        assert!(cache.resolve().is_none());
        assert_eq!(src.notifier().subscriber_count(), 0);
    }

    #[test]
    fn weak_cache_does_not_extend_lifetime() {
        let src = source();
        let mut cache = SubscriptionCache::new();
        let (_, h) = counting();
        cache.update(Some(SourceRef::weak(&src)), Watch::new(Topic::PropertyChanged), h);
        drop(src);
        assert!(cache.resolve().is_none());
        assert!(!cache.is_subscribed());
    }

    #[test]
    fn strong_cache_keeps_boxed_value_alive() {
        let boxed = Boxed::new(5_u32);
        let weak = Rc::downgrade(&boxed);
        let mut cache = SubscriptionCache::new();
        let (count, h) = counting();
        cache.update(
            Some(SourceRef::strong(boxed)),
            Watch::property(Topic::PropertyChanged, Boxed::<u32>::VALUE),
            h,
        );
        let boxed = weak.upgrade().expect("kept alive by the cache");
        boxed.set(6);
        assert_eq!(count.get(), 1);
        drop(boxed);
        cache.clear();
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn watch_property_filter() {
        let watch = Watch::property(Topic::PropertyChanged, "Name");
        assert!(watch.wants(&Change::Property { name: Some("Name") }));
        assert!(!watch.wants(&Change::Property { name: Some("Age") }));
        assert!(watch.wants(&Change::Property { name: None }));
        assert!(!watch.wants(&Change::Errors { property: Some("Name") }));

        let errors = Watch::property(Topic::ErrorsChanged, "Name");
        assert!(errors.wants(&Change::Errors { property: Some("Name") }));
        assert!(!errors.wants(&Change::Errors { property: Some("Age") }));
    }
}
