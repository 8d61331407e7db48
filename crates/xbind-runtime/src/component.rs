#![forbid(unsafe_code)]

//! Object-safe surface of a binding object, for hosts that hold many
//! differently-rooted binding objects side by side (a list container does not
//! know its item template's root type).

use std::rc::Rc;

use crate::context::DataContextSource;
use crate::error::BindingError;
use crate::object::BindingObject;
use crate::phase::NextPhase;
use crate::root::{Inspectable, RootKind};
use crate::table::ConnectionId;

/// Lifecycle operations a host drives on a bound element.
pub trait Bindings {
    fn is_initialized(&self) -> bool;
    fn initialize(&self);
    fn update(&self);
    fn set_data_root(&self, data: &Inspectable) -> bool;
    fn connect(&self, connection: ConnectionId, target: Inspectable) -> Result<(), BindingError>;
    fn disconnect_unloaded_object(&self, connection: ConnectionId) -> Result<(), BindingError>;
    fn process_bindings(&self, item: &Inspectable, item_index: usize, phase: u32) -> NextPhase;
    fn recycle(&self);
    fn stop_tracking(&self);
    fn subscribe_for_data_context_changed(&self, element: &Rc<dyn DataContextSource>);
    /// Live subscriptions, for leak checks.
    fn live_subscriptions(&self) -> usize;
}

impl<R: RootKind> Bindings for BindingObject<R> {
    fn is_initialized(&self) -> bool {
        BindingObject::is_initialized(self)
    }

    fn initialize(&self) {
        BindingObject::initialize(self);
    }

    fn update(&self) {
        BindingObject::update(self);
    }

    fn set_data_root(&self, data: &Inspectable) -> bool {
        BindingObject::set_data_root(self, data)
    }

    fn connect(&self, connection: ConnectionId, target: Inspectable) -> Result<(), BindingError> {
        BindingObject::connect(self, connection, target)
    }

    fn disconnect_unloaded_object(&self, connection: ConnectionId) -> Result<(), BindingError> {
        BindingObject::disconnect_unloaded_object(self, connection)
    }

    fn process_bindings(&self, item: &Inspectable, item_index: usize, phase: u32) -> NextPhase {
        BindingObject::process_bindings(self, item, item_index, phase)
    }

    fn recycle(&self) {
        BindingObject::recycle(self);
    }

    fn stop_tracking(&self) {
        BindingObject::stop_tracking(self);
    }

    fn subscribe_for_data_context_changed(&self, element: &Rc<dyn DataContextSource>) {
        BindingObject::subscribe_for_data_context_changed(self, element);
    }

    fn live_subscriptions(&self) -> usize {
        BindingObject::live_subscriptions(self)
    }
}
