#![forbid(unsafe_code)]

//! Runtime for compiled (generated) data bindings.
//!
//! A markup compiler turns every `{x:Bind ...}` expression of an element
//! template into a *slot* of a static [`BindingTable`]. At run time each
//! realized element owns a [`BindingObject`] that:
//!
//! - evaluates slots against a statically typed data root and writes the
//!   results to connected targets;
//! - subscribes to exactly the notifying sources each slot read, one
//!   [`SubscriptionCache`] per path step, and re-evaluates only the dependent
//!   slot when one of them fires;
//! - supports phased evaluation for virtualized lists (phase 0 now, later
//!   phases on later layout passes) and recycling of containers across items.
//!
//! # Architecture
//!
//! Everything is single-threaded (`Rc`/`RefCell`). Sources expose a
//! [`Notifier`]; subscriptions are RAII guards. Caches hold sources weakly by
//! default so a bound list item can be collected while a stale container
//! still references it ([`ReferenceMode`]).
//!
//! ```text
//! BindingTable (static, shared)
//!     │ create()
//!     ▼
//! BindingObject ──owns──▶ BindingTrackingState ──owns──▶ SubscriptionCache × (slot, step)
//!     ▲                          │ handlers
//!     └──── ListenerGate (weak) ─┘
//! ```
//!
//! # Invariants
//!
//! 1. Each subscription cache holds at most one live subscription.
//! 2. After `stop_tracking()` (or drop) no subscription made by the object is
//!    live, and no handler reaches it.
//! 3. Phase progress is monotone within one realization; only a new root,
//!    `invalidate()`, or `recycle()` rewinds it.
//! 4. `update()` on an unchanged root evaluates nothing.

pub mod cache;
pub mod component;
pub mod config;
pub mod context;
pub mod error;
pub mod notify;
pub mod object;
pub mod observer;
pub mod phase;
pub mod root;
pub mod table;
pub mod tracking;

pub use cache::{CacheUpdate, SourceRef, SubscriptionCache, Watch};
pub use component::Bindings;
pub use config::{BindingConfig, ConfigError, ReferenceMode};
pub use context::{ContextElement, DataContextSource};
pub use error::BindingError;
pub use notify::{
    Boxed, Change, CollectionAction, MapAction, Notifier, NotifyKind, NotifyKinds, Notifying,
    PropertyId, Subscription, SubscriptionId, Topic, VectorAction,
};
pub use object::BindingObject;
pub use observer::Observer;
pub use phase::{EvalScope, NextPhase, PhaseScheduler, PhaseState};
pub use root::{ByRef, ByValue, Inspectable, RootKind, inspectable};
pub use table::{BindingTable, BindingTableBuilder, ConnectionDef, ConnectionId, SlotDef, SlotId};
pub use tracking::{BindingTrackingState, CacheKey, Dependency, ListenerGate, TrackingListener};
