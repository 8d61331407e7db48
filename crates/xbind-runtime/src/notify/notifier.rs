#![forbid(unsafe_code)]

//! Single-threaded publish/subscribe transport for change notifications.
//!
//! A [`Notifier`] is embedded in every notifying source. Subscribers register a
//! callback for a [`Topic`] and receive a [`Subscription`] guard; the notifier
//! only keeps a `Weak` to the callback, so the guard is the sole owner.
//!
//! # Invariants
//!
//! 1. Dropping (or [`Subscription::unsubscribe`]-ing) a guard deactivates the
//!    callback immediately, even if an emit is currently iterating.
//! 2. Subscribers are notified in registration order.
//! 3. Callbacks may subscribe, unsubscribe, or emit re-entrantly; `emit`
//!    snapshots the matching callbacks before invoking any of them.
//! 4. Dead entries are pruned lazily on the next `subscribe` or `emit`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::change::{Change, CollectionAction, MapAction, PropertyId, Topic, VectorAction};

thread_local! {
    static NEXT_SUBSCRIPTION_ID: Cell<u64> = const { Cell::new(1) };
}

fn next_subscription_id() -> SubscriptionId {
    NEXT_SUBSCRIPTION_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        SubscriptionId(id)
    })
}

/// Thread-unique identity of one subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// An object that announces changes through a [`Notifier`].
pub trait Notifying: 'static {
    fn notifier(&self) -> &Notifier;
}

struct Listener {
    active: Cell<bool>,
    callback: Box<dyn Fn(&Change)>,
}

struct Entry {
    id: SubscriptionId,
    topic: Topic,
    listener: Weak<Listener>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.listener
            .upgrade()
            .is_some_and(|listener| listener.active.get())
    }
}

#[derive(Default)]
struct Registry {
    entries: Vec<Entry>,
}

/// Change publisher owned by a notifying source.
#[derive(Default)]
pub struct Notifier {
    registry: Rc<RefCell<Registry>>,
}

impl Notifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for changes matching `topic`.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, topic: Topic, callback: impl Fn(&Change) + 'static) -> Subscription {
        let listener = Rc::new(Listener {
            active: Cell::new(true),
            callback: Box::new(callback),
        });
        let id = next_subscription_id();
        {
            let mut registry = self.registry.borrow_mut();
            registry.entries.retain(Entry::is_live);
            registry.entries.push(Entry {
                id,
                topic,
                listener: Rc::downgrade(&listener),
            });
        }
        tracing::trace!(subscription = id.get(), ?topic, "subscribed");
        Subscription {
            id,
            topic,
            listener: Some(listener),
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Deliver `change` to every live subscriber whose topic matches.
    ///
    /// Returns the number of callbacks invoked.
    pub fn emit(&self, change: &Change) -> usize {
        let targets: Vec<Rc<Listener>> = {
            let mut registry = self.registry.borrow_mut();
            registry.entries.retain(Entry::is_live);
            registry
                .entries
                .iter()
                .filter(|entry| entry.topic.matches(change))
                .filter_map(|entry| entry.listener.upgrade())
                .collect()
        };
        let mut delivered = 0;
        for listener in targets {
            // A previous callback in this same emit may have unsubscribed it.
            if listener.active.get() {
                (listener.callback)(change);
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of live subscriptions, over all topics.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry
            .borrow()
            .entries
            .iter()
            .filter(|entry| entry.is_live())
            .count()
    }

    /// Number of live subscriptions for one topic.
    #[must_use]
    pub fn subscriber_count_for(&self, topic: Topic) -> usize {
        self.registry
            .borrow()
            .entries
            .iter()
            .filter(|entry| entry.topic == topic && entry.is_live())
            .count()
    }

    pub fn property_changed(&self, name: &'static str) -> usize {
        self.emit(&Change::Property { name: Some(name) })
    }

    pub fn all_properties_changed(&self) -> usize {
        self.emit(&Change::Property { name: None })
    }

    pub fn collection_changed(&self, action: CollectionAction) -> usize {
        self.emit(&Change::Collection(action))
    }

    pub fn dependency_property_changed(&self, property: PropertyId) -> usize {
        self.emit(&Change::DependencyProperty(property))
    }

    pub fn vector_changed(&self, action: VectorAction, index: u32) -> usize {
        self.emit(&Change::Vector { action, index })
    }

    pub fn map_changed(&self, action: MapAction, key: impl Into<String>) -> usize {
        self.emit(&Change::Map {
            action,
            key: key.into(),
        })
    }

    pub fn errors_changed(&self, property: Option<&'static str>) -> usize {
        self.emit(&Change::Errors { property })
    }

    pub fn data_context_changed(&self) -> usize {
        self.emit(&Change::DataContext)
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// RAII guard for one registered callback. Dropping it unsubscribes.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriptionId,
    topic: Topic,
    listener: Option<Rc<Listener>>,
    registry: Weak<RefCell<Registry>>,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    #[must_use]
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Whether the callback can still fire: not released and the source is alive.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry.strong_count() > 0
            && self
                .listener
                .as_ref()
                .is_some_and(|listener| listener.active.get())
    }

    /// Release the subscription now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        listener.active.set(false);
        if let Some(registry) = self.registry.upgrade() {
            // Busy during an emit: the dead entry is pruned on the next pass.
            if let Ok(mut registry) = registry.try_borrow_mut() {
                registry.entries.retain(|entry| entry.id != self.id);
            }
        }
        tracing::trace!(subscription = self.id.get(), "unsubscribed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id.get())
            .field("topic", &self.topic)
            .field("active", &self.is_active())
            .finish()
    }
}
