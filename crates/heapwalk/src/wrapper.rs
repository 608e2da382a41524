//! Tag access around callback invocations.
//!
//! A callback sees an object's tag as a mutable slot. The wrapper resolves
//! the tag target up front (class mirrors tag through their descriptor),
//! snapshots the current tag, and commits any change back to the store when
//! it drops. Commit happens exactly when the value changed: a new non-zero
//! value creates or updates the entry, zero removes it.

use crate::heap::{Heap, ObjectRef, Tag};
use crate::store::TagStore;

#[derive(Debug)]
pub(crate) struct CallbackWrapper<'a> {
    store: &'a TagStore,
    target: ObjectRef,
    size: u64,
    class_tag: Tag,
    original_tag: Tag,
    /// The slot the callback mutates.
    pub(crate) tag: Tag,
}

impl<'a> CallbackWrapper<'a> {
    pub(crate) fn new<H: Heap + ?Sized>(store: &'a TagStore, heap: &H, obj: ObjectRef) -> Self {
        let target = heap.tag_target(obj);
        let original_tag = store.get_raw(target);
        Self {
            store,
            target,
            size: heap.object_size(obj),
            class_tag: store.get_raw(heap.class_of(obj)),
            original_tag,
            tag: original_tag,
        }
    }

    pub(crate) const fn size(&self) -> u64 {
        self.size
    }

    pub(crate) const fn class_tag(&self) -> Tag {
        self.class_tag
    }
}

impl Drop for CallbackWrapper<'_> {
    fn drop(&mut self) {
        if self.tag != self.original_tag {
            self.store.set_raw(self.target, self.tag);
        }
    }
}

/// Wrapper pair for an edge: the referenced object plus its referrer.
///
/// A self-referential edge holds a single wrapper; the referrer accessors
/// then read and write the same slot, so a tag set through either side is
/// seen by the other and committed once.
#[derive(Debug)]
pub(crate) struct PairWrapper<'a> {
    pub(crate) obj: CallbackWrapper<'a>,
    referrer: Option<CallbackWrapper<'a>>,
}

impl<'a> PairWrapper<'a> {
    pub(crate) fn new<H: Heap + ?Sized>(
        store: &'a TagStore,
        heap: &H,
        obj: ObjectRef,
        referrer: ObjectRef,
    ) -> Self {
        // Self-reference is judged on the raw identities, before any
        // mirror substitution.
        let referrer = if referrer == obj {
            None
        } else {
            Some(CallbackWrapper::new(store, heap, referrer))
        };
        Self {
            obj: CallbackWrapper::new(store, heap, obj),
            referrer,
        }
    }

    pub(crate) fn referrer_tag(&self) -> Tag {
        self.referrer.as_ref().map_or(self.obj.tag, |w| w.tag)
    }

    pub(crate) fn set_referrer_tag(&mut self, tag: Tag) {
        match self.referrer.as_mut() {
            Some(w) => w.tag = tag,
            None => self.obj.tag = tag,
        }
    }

    pub(crate) fn referrer_class_tag(&self) -> Tag {
        self.referrer
            .as_ref()
            .map_or_else(|| self.obj.class_tag(), CallbackWrapper::class_tag)
    }
}
