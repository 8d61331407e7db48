#![forbid(unsafe_code)]

//! Change notifications: what a source announces and what a subscriber listens for.
//!
//! A [`Change`] is the payload a source emits. A [`Topic`] is the filter a
//! subscriber registers with. The two are tagged variants over the same set of
//! notification families, so routing is a `match`, never a downcast.

use std::fmt;

use bitflags::bitflags;

/// Identifier of a dependency property on a dependency object.
///
/// Dependency-property subscriptions are per `(object, property)` pair, so the
/// id is part of the [`Topic`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub &'static str);

impl PropertyId {
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Notification family, without payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotifyKind {
    PropertyChanged,
    CollectionChanged,
    DependencyPropertyChanged,
    VectorChanged,
    MapChanged,
    ErrorsChanged,
    DataContextChanged,
}

impl NotifyKind {
    /// The single-bit flag for this kind.
    #[must_use]
    pub const fn flag(self) -> NotifyKinds {
        match self {
            Self::PropertyChanged => NotifyKinds::PROPERTY_CHANGED,
            Self::CollectionChanged => NotifyKinds::COLLECTION_CHANGED,
            Self::DependencyPropertyChanged => NotifyKinds::DEPENDENCY_PROPERTY_CHANGED,
            Self::VectorChanged => NotifyKinds::VECTOR_CHANGED,
            Self::MapChanged => NotifyKinds::MAP_CHANGED,
            Self::ErrorsChanged => NotifyKinds::ERRORS_CHANGED,
            Self::DataContextChanged => NotifyKinds::DATA_CONTEXT_CHANGED,
        }
    }
}

impl fmt::Display for NotifyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PropertyChanged => "property-changed",
            Self::CollectionChanged => "collection-changed",
            Self::DependencyPropertyChanged => "dependency-property-changed",
            Self::VectorChanged => "vector-changed",
            Self::MapChanged => "map-changed",
            Self::ErrorsChanged => "errors-changed",
            Self::DataContextChanged => "data-context-changed",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Set of notification kinds a binding slot is compiled to depend on.
    ///
    /// An empty set means "undeclared": every kind is accepted.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct NotifyKinds: u8 {
        const PROPERTY_CHANGED = 1 << 0;
        const COLLECTION_CHANGED = 1 << 1;
        const DEPENDENCY_PROPERTY_CHANGED = 1 << 2;
        const VECTOR_CHANGED = 1 << 3;
        const MAP_CHANGED = 1 << 4;
        const ERRORS_CHANGED = 1 << 5;
        const DATA_CONTEXT_CHANGED = 1 << 6;
    }
}

impl NotifyKinds {
    /// Whether a slot declaring `self` may subscribe to `kind`.
    #[must_use]
    pub fn accepts(self, kind: NotifyKind) -> bool {
        self.is_empty() || self.contains(kind.flag())
    }
}

/// Structural change to an `INotifyCollectionChanged`-style collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionAction {
    Add,
    Remove,
    Replace,
    Move,
    Reset,
}

/// Change to an observable vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VectorAction {
    Reset,
    ItemInserted,
    ItemRemoved,
    ItemChanged,
}

/// Change to an observable map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapAction {
    Reset,
    ItemInserted,
    ItemRemoved,
    ItemChanged,
}

/// A change announced by a notifying source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change {
    /// A named property changed. `None` means "all properties".
    Property { name: Option<&'static str> },
    Collection(CollectionAction),
    DependencyProperty(PropertyId),
    Vector { action: VectorAction, index: u32 },
    Map { action: MapAction, key: String },
    /// Validation errors changed for a property (`None` = entity-level).
    Errors { property: Option<&'static str> },
    /// The inherited data context of an element changed.
    DataContext,
}

impl Change {
    #[must_use]
    pub fn kind(&self) -> NotifyKind {
        match self {
            Self::Property { .. } => NotifyKind::PropertyChanged,
            Self::Collection(_) => NotifyKind::CollectionChanged,
            Self::DependencyProperty(_) => NotifyKind::DependencyPropertyChanged,
            Self::Vector { .. } => NotifyKind::VectorChanged,
            Self::Map { .. } => NotifyKind::MapChanged,
            Self::Errors { .. } => NotifyKind::ErrorsChanged,
            Self::DataContext => NotifyKind::DataContextChanged,
        }
    }

    /// Property name carried by property/errors changes, if any.
    #[must_use]
    pub fn property_name(&self) -> Option<&'static str> {
        match self {
            Self::Property { name } => *name,
            Self::Errors { property } => *property,
            Self::DependencyProperty(id) => Some(id.name()),
            _ => None,
        }
    }
}

/// What a subscriber listens for on one source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    PropertyChanged,
    CollectionChanged,
    DependencyProperty(PropertyId),
    VectorChanged,
    MapChanged,
    ErrorsChanged,
    DataContextChanged,
}

impl Topic {
    #[must_use]
    pub fn kind(self) -> NotifyKind {
        match self {
            Self::PropertyChanged => NotifyKind::PropertyChanged,
            Self::CollectionChanged => NotifyKind::CollectionChanged,
            Self::DependencyProperty(_) => NotifyKind::DependencyPropertyChanged,
            Self::VectorChanged => NotifyKind::VectorChanged,
            Self::MapChanged => NotifyKind::MapChanged,
            Self::ErrorsChanged => NotifyKind::ErrorsChanged,
            Self::DataContextChanged => NotifyKind::DataContextChanged,
        }
    }

    /// Whether `change` is delivered to a subscriber of this topic.
    #[must_use]
    pub fn matches(self, change: &Change) -> bool {
        match (self, change) {
            (Self::DependencyProperty(want), Change::DependencyProperty(got)) => want == *got,
            (Self::DependencyProperty(_), _) => false,
            (topic, change) => topic.kind() == change.kind(),
        }
    }
}
