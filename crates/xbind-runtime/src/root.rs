#![forbid(unsafe_code)]

//! Data roots: how late-bound input becomes the statically typed root.
//!
//! Hosts hand data to a binding object as an [`Inspectable`] (an `Rc<dyn Any>`).
//! The binding object is generic over a [`RootKind`] capability that knows how
//! to resolve that box into the root type the table was compiled for:
//!
//! - [`ByRef<T>`]: reference-typed roots; the box *is* the shared object and the
//!   root is the same allocation (`Rc<T>`).
//! - [`ByValue<T>`]: value-typed roots; the box holds a `T` which is copied out.
//!
//! Resolution failure is the type-safety escape hatch for late-bound input: the
//! caller gets `false` back and the previous root stays in place.

use std::any::Any;
use std::marker::PhantomData;
use std::rc::Rc;

/// Opaque late-bound value handed across the host boundary.
pub type Inspectable = Rc<dyn Any>;

/// Box a value as an [`Inspectable`].
#[must_use]
pub fn inspectable<T: 'static>(value: T) -> Inspectable {
    Rc::new(value)
}

/// Capability resolving an [`Inspectable`] into a typed root.
pub trait RootKind: 'static {
    /// The root as seen by generated evaluators.
    type Root: Clone + 'static;

    /// Resolve `data`, or `None` if it holds another type.
    fn resolve(data: &Inspectable) -> Option<Self::Root>;

    /// Whether two roots denote the same item.
    fn same(a: &Self::Root, b: &Self::Root) -> bool;

    /// Name of the expected root type, for diagnostics.
    fn type_name() -> &'static str;
}

/// Reference-typed root: the inspectable is the object itself.
pub struct ByRef<T>(PhantomData<fn() -> T>);

impl<T: 'static> RootKind for ByRef<T> {
    type Root = Rc<T>;

    fn resolve(data: &Inspectable) -> Option<Rc<T>> {
        Rc::clone(data).downcast::<T>().ok()
    }

    fn same(a: &Rc<T>, b: &Rc<T>) -> bool {
        Rc::ptr_eq(a, b)
    }

    fn type_name() -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Value-typed root: the inspectable boxes a `T` that is copied out.
pub struct ByValue<T>(PhantomData<fn() -> T>);

impl<T: Clone + PartialEq + 'static> RootKind for ByValue<T> {
    type Root = T;

    fn resolve(data: &Inspectable) -> Option<T> {
        data.downcast_ref::<T>().cloned()
    }

    fn same(a: &T, b: &T) -> bool {
        a == b
    }

    fn type_name() -> &'static str {
        std::any::type_name::<T>()
    }
}
