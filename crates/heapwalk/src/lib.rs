//! Object tagging and reachability walking for managed heaps.
//!
//! This crate provides two cooperating pieces for heap-profiling tooling
//! built on top of a garbage-collected VM:
//!
//! - [`TagStore`]: a map from live objects to user-assigned 64-bit tags,
//!   keyed by object identity. The collector reports frees and relocations
//!   through [`TagStore::reconcile`], so tags follow objects across moving
//!   collections and disappear when their object dies.
//! - [`HeapWalker`]: a stop-the-world traversal of the reachable object
//!   graph (or of the whole heap), reporting every root and reference
//!   through caller-supplied callbacks, with tag-based filtering and
//!   primitive payload reporting.
//!
//! The VM itself stays outside: object layout, the class model, root sets,
//! and thread stacks are reached through the [`Heap`] trait, which the host
//! implements. Walks assume the host holds a global pause; tag reads and
//! writes are safe from any thread at any time.
//!
//! Class mirrors get one deliberate twist: tagging a mirror records the tag
//! against the class itself, so the tag survives as long as the class
//! rather than the mirror object.

#![warn(missing_docs)]

mod error;
mod heap;
mod store;
mod walk;
mod wrapper;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::{Error, Result};
pub use heap::{
    DeclaredField, FieldKind, Heap, MethodId, ObjectKind, ObjectRef, PrimitiveType, PrimitiveValue,
    StackRef, StackRefKind, Tag, ThreadDescriptor,
};
pub use store::TagStore;
pub use walk::{
    AdvancedCallbacks, ArrayValuesEvent, BasicCallbacks, HeapFilter, HeapObjectEvent, HeapWalker,
    IterationCallbacks, IterationControl, ObjectFilter, ObjectRefEdge, PrimitiveFieldEvent,
    RefInfo, RefKind, Reference, RootEdge, RootKind, StackRefEdge, StringValueEvent, VisitFlags,
};
