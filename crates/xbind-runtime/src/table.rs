#![forbid(unsafe_code)]

//! Compiled binding tables: what the markup compiler hands the runtime.
//!
//! A [`BindingTable`] is static, shared by every binding object of one element
//! template, and carries:
//!
//! - connection ids → declared target type;
//! - slot ids → evaluator, dependency kinds, phase tag, and write action.
//!
//! Slot ids are stable compiler-assigned integers; the table keeps slots sorted
//! by id, never by insertion order.
//!
//! # Example
//!
//! ```ignore
//! let table = BindingTable::<ByRef<Person>>::builder("PersonRow")
//!     .connection::<TextBlock>(ConnectionId(1), "NameText")
//!     .slot(
//!         SlotDef::new(SlotId(0), ConnectionId(1)).tracks(NotifyKinds::PROPERTY_CHANGED),
//!         |person: &Rc<Person>, cx: &mut Observer| {
//!             cx.property(person, "Name");
//!             Some(person.name())
//!         },
//!         |text: &TextBlock, name: &String| text.set_text(name),
//!     )
//!     .build()?;
//! let bindings = table.create();
//! ```

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::config::BindingConfig;
use crate::error::BindingError;
use crate::notify::NotifyKinds;
use crate::object::BindingObject;
use crate::observer::Observer;
use crate::phase::{self, NextPhase};
use crate::root::RootKind;

/// Compiler-assigned id of one connected element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub i32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compiler-assigned id of one binding slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static metadata of one slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotDef {
    pub id: SlotId,
    pub connection: ConnectionId,
    /// Phase tag; 0 is the initial phase evaluated by `update`.
    pub phase: u32,
    /// Notification kinds the slot may depend on (empty = any).
    pub kinds: NotifyKinds,
}

impl SlotDef {
    #[must_use]
    pub const fn new(id: SlotId, connection: ConnectionId) -> Self {
        Self {
            id,
            connection,
            phase: 0,
            kinds: NotifyKinds::empty(),
        }
    }

    #[must_use]
    pub const fn phase(mut self, phase: u32) -> Self {
        self.phase = phase;
        self
    }

    #[must_use]
    pub const fn tracks(mut self, kinds: NotifyKinds) -> Self {
        self.kinds = kinds;
        self
    }
}

/// Declared target of one connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionDef {
    pub id: ConnectionId,
    pub name: &'static str,
    target_type: TypeId,
    target_type_name: &'static str,
}

impl ConnectionDef {
    #[must_use]
    pub fn target_type_name(&self) -> &'static str {
        self.target_type_name
    }

    /// Whether `target` has the declared concrete type.
    #[must_use]
    pub fn accepts(&self, target: &dyn Any) -> bool {
        target.type_id() == self.target_type
    }
}

/// Type-erased evaluate/compare/write program of one slot.
pub(crate) trait SlotProgram<Root> {
    fn evaluate(&self, root: &Root, observer: &mut Observer) -> Option<Box<dyn Any>>;
    fn same_value(&self, previous: &dyn Any, next: &dyn Any) -> bool;
    /// Returns false if `target` or `value` is not of the compiled type.
    fn write(&self, target: &dyn Any, value: &dyn Any) -> bool;
    fn target_type(&self) -> TypeId;
}

struct TypedSlot<Root, T, V, E, W> {
    eval: E,
    write: W,
    _types: PhantomData<fn(&Root, &T) -> V>,
}

impl<Root, T, V, E, W> SlotProgram<Root> for TypedSlot<Root, T, V, E, W>
where
    T: 'static,
    V: PartialEq + 'static,
    E: Fn(&Root, &mut Observer) -> Option<V>,
    W: Fn(&T, &V),
{
    fn evaluate(&self, root: &Root, observer: &mut Observer) -> Option<Box<dyn Any>> {
        (self.eval)(root, observer).map(|value| Box::new(value) as Box<dyn Any>)
    }

    fn same_value(&self, previous: &dyn Any, next: &dyn Any) -> bool {
        match (previous.downcast_ref::<V>(), next.downcast_ref::<V>()) {
            (Some(previous), Some(next)) => previous == next,
            _ => false,
        }
    }

    fn write(&self, target: &dyn Any, value: &dyn Any) -> bool {
        match (target.downcast_ref::<T>(), value.downcast_ref::<V>()) {
            (Some(target), Some(value)) => {
                (self.write)(target, value);
                true
            }
            _ => false,
        }
    }

    fn target_type(&self) -> TypeId {
        TypeId::of::<T>()
    }
}

pub(crate) struct CompiledSlot<R: RootKind> {
    pub(crate) def: SlotDef,
    pub(crate) program: Box<dyn SlotProgram<R::Root>>,
}

/// Static binding description of one element template, rooted at `R`.
pub struct BindingTable<R: RootKind> {
    name: &'static str,
    connections: BTreeMap<ConnectionId, ConnectionDef>,
    slots: Vec<CompiledSlot<R>>,
    phases: Rc<[u32]>,
}

impl<R: RootKind> BindingTable<R> {
    #[must_use]
    pub fn builder(name: &'static str) -> BindingTableBuilder<R> {
        BindingTableBuilder {
            name,
            connections: Vec::new(),
            slots: Vec::new(),
        }
    }

    /// Factory entry point: a fresh binding object with default config.
    #[must_use]
    pub fn create(self: &Rc<Self>) -> BindingObject<R> {
        BindingObject::new(Rc::clone(self), BindingConfig::default())
    }

    /// Factory entry point with explicit config.
    #[must_use]
    pub fn create_with(self: &Rc<Self>, config: BindingConfig) -> BindingObject<R> {
        BindingObject::new(Rc::clone(self), config)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn connection(&self, id: ConnectionId) -> Option<&ConnectionDef> {
        self.connections.get(&id)
    }

    pub fn connections(&self) -> impl Iterator<Item = &ConnectionDef> {
        self.connections.values()
    }

    /// Slot metadata in id order.
    pub fn slots(&self) -> impl Iterator<Item = &SlotDef> {
        self.slots.iter().map(|slot| &slot.def)
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Sorted, de-duplicated phase tags of all slots.
    #[must_use]
    pub fn phases(&self) -> &Rc<[u32]> {
        &self.phases
    }

    /// Phase a realization reaches after processing `phase`.
    #[must_use]
    pub fn next_phase_after(&self, phase: u32) -> NextPhase {
        phase::next_after(&self.phases, phase)
    }

    #[must_use]
    pub fn slot_index(&self, id: SlotId) -> Option<usize> {
        self.slots.binary_search_by_key(&id, |slot| slot.def.id).ok()
    }

    pub(crate) fn compiled(&self, index: usize) -> &CompiledSlot<R> {
        &self.slots[index]
    }
}

impl<R: RootKind> fmt::Debug for BindingTable<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingTable")
            .field("name", &self.name)
            .field("root", &R::type_name())
            .field("connections", &self.connections.len())
            .field("slots", &self.slots.len())
            .field("phases", &self.phases)
            .finish()
    }
}

/// Builder for a [`BindingTable`]; validation happens in [`build`](Self::build).
pub struct BindingTableBuilder<R: RootKind> {
    name: &'static str,
    connections: Vec<ConnectionDef>,
    slots: Vec<CompiledSlot<R>>,
}

impl<R: RootKind> BindingTableBuilder<R> {
    /// Declare connection `id` with target type `T`.
    #[must_use]
    pub fn connection<T: 'static>(mut self, id: ConnectionId, name: &'static str) -> Self {
        self.connections.push(ConnectionDef {
            id,
            name,
            target_type: TypeId::of::<T>(),
            target_type_name: std::any::type_name::<T>(),
        });
        self
    }

    /// Add a slot evaluating `eval` against the root and writing through `write`.
    #[must_use]
    pub fn slot<T, V, E, W>(mut self, def: SlotDef, eval: E, write: W) -> Self
    where
        T: 'static,
        V: PartialEq + 'static,
        E: Fn(&R::Root, &mut Observer) -> Option<V> + 'static,
        W: Fn(&T, &V) + 'static,
    {
        self.slots.push(CompiledSlot {
            def,
            program: Box::new(TypedSlot {
                eval,
                write,
                _types: PhantomData,
            }),
        });
        self
    }

    /// Validate and freeze the table.
    pub fn build(self) -> Result<Rc<BindingTable<R>>, BindingError> {
        let name = self.name;
        let mut connections = BTreeMap::new();
        for def in self.connections {
            if connections.insert(def.id, def).is_some() {
                return Err(BindingError::DuplicateConnection {
                    table: name,
                    connection: def.id,
                });
            }
        }

        let mut slots = self.slots;
        slots.sort_by_key(|slot| slot.def.id);
        for pair in slots.windows(2) {
            if pair[0].def.id == pair[1].def.id {
                return Err(BindingError::DuplicateSlot {
                    table: name,
                    slot: pair[0].def.id,
                });
            }
        }
        for slot in &slots {
            let Some(connection) = connections.get(&slot.def.connection) else {
                return Err(BindingError::DanglingSlot {
                    table: name,
                    slot: slot.def.id,
                    connection: slot.def.connection,
                });
            };
            if connection.target_type != slot.program.target_type() {
                return Err(BindingError::TargetTypeMismatch {
                    table: name,
                    connection: connection.id,
                    expected: connection.target_type_name,
                });
            }
        }

        let mut phases: Vec<u32> = slots.iter().map(|slot| slot.def.phase).collect();
        phases.sort_unstable();
        phases.dedup();

        tracing::debug!(
            table = name,
            root = R::type_name(),
            connections = connections.len(),
            slots = slots.len(),
            phases = phases.len(),
            "binding table built"
        );
        Ok(Rc::new(BindingTable {
            name,
            connections,
            slots,
            phases: phases.into(),
        }))
    }
}
