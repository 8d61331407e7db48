#![forbid(unsafe_code)]

//! Dependency recorder handed to generated evaluators.
//!
//! An evaluator walks its source expression and reports every notifying
//! object it reads through. Each report is one *step*; the binding object turns
//! step `i` into the cache at `(slot, i)` once the evaluation returns.
//!
//! ```ignore
//! |person: &Rc<Person>, cx: &mut Observer| {
//!     cx.property(person, "Address");
//!     let address = person.address()?;   // null: the path stops here
//!     cx.property(&address, "City");
//!     Some(address.city())
//! }
//! ```
//!
//! Early returns are fine: steps not reached this time are released.

use std::rc::Rc;

use crate::cache::{SourceRef, Watch};
use crate::config::ReferenceMode;
use crate::notify::{Boxed, NotifyKind, NotifyKinds, Notifying, PropertyId, Topic};
use crate::table::SlotId;
use crate::tracking::Dependency;

/// Records the sources one slot evaluation depends on.
pub struct Observer {
    slot: SlotId,
    kinds: NotifyKinds,
    mode: ReferenceMode,
    deps: Vec<Dependency>,
}

impl Observer {
    #[must_use]
    pub fn new(slot: SlotId, kinds: NotifyKinds, mode: ReferenceMode) -> Self {
        Self {
            slot,
            kinds,
            mode,
            deps: Vec::new(),
        }
    }

    /// The slot being evaluated.
    #[must_use]
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// Track `name` on `source` (property-changed family).
    pub fn property<S: Notifying>(&mut self, source: &Rc<S>, name: &'static str) -> &mut Self {
        self.track(Watch::property(Topic::PropertyChanged, name), Some(source))
    }

    /// Track every property of `source`.
    pub fn any_property<S: Notifying>(&mut self, source: &Rc<S>) -> &mut Self {
        self.track(Watch::new(Topic::PropertyChanged), Some(source))
    }

    /// Track structural changes of a collection.
    pub fn collection<S: Notifying>(&mut self, source: &Rc<S>) -> &mut Self {
        self.track(Watch::new(Topic::CollectionChanged), Some(source))
    }

    /// Track one dependency property of a dependency object.
    pub fn dependency_property<S: Notifying>(
        &mut self,
        source: &Rc<S>,
        property: PropertyId,
    ) -> &mut Self {
        self.track(Watch::new(Topic::DependencyProperty(property)), Some(source))
    }

    /// Track an observable vector.
    pub fn vector<S: Notifying>(&mut self, source: &Rc<S>) -> &mut Self {
        self.track(Watch::new(Topic::VectorChanged), Some(source))
    }

    /// Track an observable map.
    pub fn map<S: Notifying>(&mut self, source: &Rc<S>) -> &mut Self {
        self.track(Watch::new(Topic::MapChanged), Some(source))
    }

    /// Track validation errors of `source` (`None` = entity-level errors).
    pub fn errors<S: Notifying>(
        &mut self,
        source: &Rc<S>,
        property: Option<&'static str>,
    ) -> &mut Self {
        let watch = Watch {
            topic: Topic::ErrorsChanged,
            property,
        };
        self.track(watch, Some(source))
    }

    /// Track a boxed value and read it.
    ///
    /// The box is cached strongly regardless of [`ReferenceMode`]; a weak
    /// reference to a value nobody else owns would die immediately.
    pub fn boxed<T: Clone + 'static>(&mut self, source: &Rc<Boxed<T>>) -> T {
        let watch = Watch::property(Topic::PropertyChanged, Boxed::<T>::VALUE);
        if self.admit(watch) {
            let strong: Rc<dyn Notifying> = Rc::clone(source) as Rc<dyn Notifying>;
            self.deps.push(Dependency {
                watch,
                source: Some(SourceRef::strong(strong)),
            });
        }
        source.get()
    }

    /// Record a step whose value is not a notifying object.
    ///
    /// Keeps later steps aligned and clears whatever the step cached before.
    pub fn absent(&mut self, kind: NotifyKind) -> &mut Self {
        let topic = match kind {
            NotifyKind::PropertyChanged => Topic::PropertyChanged,
            NotifyKind::CollectionChanged => Topic::CollectionChanged,
            NotifyKind::VectorChanged => Topic::VectorChanged,
            NotifyKind::MapChanged => Topic::MapChanged,
            NotifyKind::ErrorsChanged => Topic::ErrorsChanged,
            NotifyKind::DataContextChanged => Topic::DataContextChanged,
            NotifyKind::DependencyPropertyChanged => Topic::DependencyProperty(PropertyId("")),
        };
        self.deps.push(Dependency {
            watch: Watch::new(topic),
            source: None,
        });
        self
    }

    /// Number of steps recorded so far.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.deps.len()
    }

    /// Consume the observer, yielding the recorded dependencies in step order.
    #[must_use]
    pub fn finish(self) -> Vec<Dependency> {
        self.deps
    }

    fn track<S: Notifying>(&mut self, watch: Watch, source: Option<&Rc<S>>) -> &mut Self {
        if !self.admit(watch) {
            return self;
        }
        let source = source.map(|source| {
            let source: Rc<dyn Notifying> = Rc::clone(source) as Rc<dyn Notifying>;
            match self.mode {
                ReferenceMode::Weak => SourceRef::weak(&source),
                ReferenceMode::Strong => SourceRef::strong(source),
            }
        });
        self.deps.push(Dependency { watch, source });
        self
    }

    /// A rejected step still occupies its index, as an untracked placeholder.
    fn admit(&mut self, watch: Watch) -> bool {
        let kind = watch.topic.kind();
        if self.kinds.accepts(kind) {
            return true;
        }
        self.deps.push(Dependency { watch, source: None });
        tracing::warn!(
            slot = %self.slot,
            %kind,
            "slot observed a notification kind it was not compiled for; not tracked"
        );
        false
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

    fn source() -> Rc<Source> {
        Rc::new(Source {
            notifier: Notifier::new(),
        })
    }

    #[test]
    fn records_steps_in_order() {
        let a = source();
        let b = source();
        let mut cx = Observer::new(SlotId(0), NotifyKinds::empty(), ReferenceMode::Weak);
        cx.property(&a, "Child").vector(&b);
        let deps = cx.finish();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].watch, Watch::property(Topic::PropertyChanged, "Child"));
        assert_eq!(deps[1].watch.topic, Topic::VectorChanged);
    }

    #[test]
    fn weak_mode_does_not_own() {
        let a = source();
        let mut cx = Observer::new(SlotId(0), NotifyKinds::empty(), ReferenceMode::Weak);
        cx.any_property(&a);
        let deps = cx.finish();
        drop(a);
        assert!(deps[0].source.as_ref().and_then(SourceRef::resolve).is_none());
    }

    #[test]
    fn strong_mode_owns() {
        let a = source();
        let mut cx = Observer::new(SlotId(0), NotifyKinds::empty(), ReferenceMode::Strong);
        cx.collection(&a);
        let deps = cx.finish();
        drop(a);
        assert!(deps[0].source.as_ref().and_then(SourceRef::resolve).is_some());
    }

    #[test]
    fn boxed_is_strong_and_unwraps() {
        let boxed = Boxed::new(11_i64);
        let mut cx = Observer::new(SlotId(1), NotifyKinds::empty(), ReferenceMode::Weak);
        assert_eq!(cx.boxed(&boxed), 11);
        let deps = cx.finish();
        assert!(deps[0].source.as_ref().is_some_and(SourceRef::is_strong));
    }

    #[test]
    fn undeclared_kind_keeps_its_step_untracked() {
        let a = source();
        let mut cx = Observer::new(SlotId(0), NotifyKinds::PROPERTY_CHANGED, ReferenceMode::Weak);
        cx.map(&a).property(&a, "Name");
        assert_eq!(cx.steps(), 2);
        let deps = cx.finish();
        assert!(deps[0].source.is_none());
        assert!(deps[1].source.is_some());
        assert_eq!(deps[1].watch, Watch::property(Topic::PropertyChanged, "Name"));
    }

    #[test]
    fn absent_step_has_no_source() {
        let mut cx = Observer::new(SlotId(0), NotifyKinds::empty(), ReferenceMode::Weak);
        cx.absent(NotifyKind::PropertyChanged);
        let deps = cx.finish();
        assert!(deps[0].source.is_none());
    }
}
