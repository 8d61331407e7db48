#![forbid(unsafe_code)]

//! Elements carrying an inherited data context.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::notify::{Notifier, Notifying};
use crate::root::Inspectable;

/// An element whose inherited data context can change.
///
/// Implementors announce changes with [`Notifier::data_context_changed`].
pub trait DataContextSource: Notifying {
    fn data_context(&self) -> Option<Inspectable>;
}

/// Minimal host element with a settable data context.
#[derive(Default)]
pub struct ContextElement {
    name: &'static str,
    data_context: RefCell<Option<Inspectable>>,
    notifier: Notifier,
}

impl ContextElement {
    #[must_use]
    pub fn new(name: &'static str) -> Rc<Self> {
        Rc::new(Self {
            name,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Replace the data context and announce the change.
    ///
    /// Setting the identical object again is silent.
    pub fn set_data_context(&self, data: Option<Inspectable>) {
        {
            let current = self.data_context.borrow();
            let unchanged = match (current.as_ref(), data.as_ref()) {
                (Some(a), Some(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                return;
            }
        }
        *self.data_context.borrow_mut() = data;
        self.notifier.data_context_changed();
    }
}

impl DataContextSource for ContextElement {
    fn data_context(&self) -> Option<Inspectable> {
        self.data_context.borrow().clone()
    }
}

impl Notifying for ContextElement {
    fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}

impl fmt::Debug for ContextElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextElement")
            .field("name", &self.name)
            .field("has_data_context", &self.data_context.borrow().is_some())
            .finish()
    }
}
