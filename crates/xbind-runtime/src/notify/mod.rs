#![forbid(unsafe_code)]

//! Notification transport consumed by the binding runtime.
//!
//! - [`Notifier`]: per-source publisher; callbacks are keyed by [`Topic`].
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`Change`]: tagged payload over the notification families
//!   (property, collection, dependency property, vector, map, errors,
//!   data context).
//! - [`Boxed`]: notifying cell for value-typed sources.
//!
//! # Architecture
//!
//! Everything is single-threaded (`Rc<RefCell<..>>`). The notifier stores
//! callbacks as `Weak` pointers; the [`Subscription`] owns the callback, so a
//! binding releasing its guard can never be called back afterwards.

pub mod boxed;
pub mod change;
pub mod notifier;

pub use boxed::Boxed;
pub use change::{
    Change, CollectionAction, MapAction, NotifyKind, NotifyKinds, PropertyId, Topic,
    VectorAction,
};
pub use notifier::{Notifier, Notifying, Subscription, SubscriptionId};
