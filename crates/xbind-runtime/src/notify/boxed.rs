#![forbid(unsafe_code)]

//! Notifying box around a plain value.
//!
//! A weak reference to a scalar is meaningless: nothing else owns the box, so it
//! would be collected the moment the binding stopped holding it. Binding caches
//! therefore keep a [`Boxed`] source strongly and unwrap it on read.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::notifier::{Notifier, Notifying};

/// A shared, notifying cell holding a value-typed source.
pub struct Boxed<T> {
    value: RefCell<T>,
    notifier: Notifier,
}

impl<T: 'static> Boxed<T> {
    /// Property name announced when the boxed value changes.
    pub const VALUE: &'static str = "Value";

    #[must_use]
    pub fn new(value: T) -> Rc<Self> {
        Rc::new(Self {
            value: RefCell::new(value),
            notifier: Notifier::new(),
        })
    }

    /// Read the boxed value through `f`.
    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        f(&self.value.borrow())
    }

    /// Replace the value and announce `Value` changed.
    ///
    /// Setting an equal value is a no-op.
    pub fn set(&self, value: T)
    where
        T: PartialEq,
    {
        if *self.value.borrow() == value {
            return;
        }
        *self.value.borrow_mut() = value;
        self.notifier.property_changed(Self::VALUE);
    }
}

impl<T: Clone + 'static> Boxed<T> {
    #[must_use]
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }
}

impl<T: 'static> Notifying for Boxed<T> {
    fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}

impl<T: fmt::Debug> fmt::Debug for Boxed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Boxed")
            .field("value", &self.value.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::notify::{Change, Topic};

    #[test]
    fn set_announces_value() {
        let boxed = Boxed::new(3);
        let seen = Rc::new(Cell::new(None));
        let s = Rc::clone(&seen);
        let _sub = boxed
            .notifier()
            .subscribe(Topic::PropertyChanged, move |change: &Change| {
                s.set(change.property_name());
            });
        boxed.set(4);
        assert_eq!(boxed.get(), 4);
        assert_eq!(seen.get(), Some(Boxed::<i32>::VALUE));
    }

    #[test]
    fn equal_set_is_silent() {
        let boxed = Boxed::new(String::from("a"));
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let _sub = boxed
            .notifier()
            .subscribe(Topic::PropertyChanged, move |_| c.set(c.get() + 1));
        boxed.set("a".to_string());
        assert_eq!(count.get(), 0);
        boxed.set("b".to_string());
        assert_eq!(count.get(), 1);
        assert_eq!(boxed.with(String::len), 1);
    }
}
