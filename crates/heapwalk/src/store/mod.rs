//! The tag store: user tags keyed by object identity, kept correct across
//! collections.
//!
//! All table state sits behind one mutex so tag reads and writes from any
//! thread are safe. The store also owns the walk-serialization mutex; heap
//! walks both read and write tags, so at most one runs at a time.

mod entry;
mod table;

use parking_lot::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::heap::{Heap, ObjectRef, Tag};
use entry::EntryPool;
use table::TagTable;

#[derive(Debug)]
struct StoreInner {
    table: TagTable,
    pool: EntryPool,
}

/// Maps live objects to non-zero user tags.
///
/// Tags follow objects across relocation and vanish on free, provided the
/// collector calls [`TagStore::reconcile`] in every collection pause.
/// Class mirrors are keyed through their class descriptor, so a tag set on
/// a mirror survives as long as the class does.
#[derive(Debug)]
pub struct TagStore {
    inner: Mutex<StoreInner>,
    walk_serial: Mutex<()>,
}

impl TagStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                table: TagTable::new(),
                pool: EntryPool::new(),
            }),
            walk_serial: Mutex::new(()),
        }
    }

    /// The tag of `obj`, or 0 if untagged.
    pub fn get_tag<H: Heap + ?Sized>(&self, heap: &H, obj: ObjectRef) -> Tag {
        self.get_raw(heap.tag_target(obj))
    }

    /// Tag `obj`, overwrite its existing tag, or untag it with 0.
    pub fn set_tag<H: Heap + ?Sized>(&self, heap: &H, obj: ObjectRef, tag: Tag) {
        self.set_raw(heap.tag_target(obj), tag);
    }

    /// Number of tagged objects.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.inner.lock().table.entry_count()
    }

    /// Whether no object is tagged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    /// Every object whose tag appears in `tags`, with its tag.
    ///
    /// Class descriptors are reported through their mirror, matching how
    /// callers named the object when tagging it. Fails only if the result
    /// buffer cannot be allocated; the store is unchanged either way.
    pub fn get_objects_with_tags<H: Heap + ?Sized>(
        &self,
        heap: &H,
        tags: &[Tag],
    ) -> Result<Vec<(ObjectRef, Tag)>> {
        let inner = self.inner.lock();

        let mut count = 0usize;
        inner.table.for_each(|_, tag| {
            if tags.contains(&tag) {
                count += 1;
            }
        });

        let mut results = Vec::new();
        results
            .try_reserve_exact(count)
            .map_err(|_| Error::OutOfMemory)?;

        inner.table.for_each(|object, tag| {
            if tags.contains(&tag) {
                let reported = if heap.is_class_descriptor(object) {
                    heap.mirror_of(object)
                } else {
                    object
                };
                results.push((reported, tag));
            }
        });
        Ok(results)
    }

    /// Collector hook, called inside every collection pause.
    ///
    /// `is_alive` answers liveness per entry, `relocate` maps a surviving
    /// identity to its new value, and `on_freed` receives the tag of every
    /// entry whose object died. Also re-enables table resizing in case a
    /// previous resize failed.
    pub fn reconcile(
        &self,
        is_alive: impl FnMut(ObjectRef) -> bool,
        relocate: impl FnMut(ObjectRef) -> ObjectRef,
        on_freed: impl FnMut(Tag),
    ) {
        let inner = &mut *self.inner.lock();
        inner.table.enable_resizing();
        let stats = inner
            .table
            .reconcile(&mut inner.pool, is_alive, relocate, on_freed);
        tracing::debug!(
            freed = stats.freed,
            moved = stats.moved,
            remaining = inner.table.entry_count(),
            "tag store reconciled"
        );
    }

    /// Tag lookup without mirror substitution. Walk internals resolve the
    /// tag target once and then operate on raw identities.
    pub(crate) fn get_raw(&self, object: ObjectRef) -> Tag {
        self.inner.lock().table.find(object).unwrap_or(0)
    }

    /// Tag update without mirror substitution.
    pub(crate) fn set_raw(&self, object: ObjectRef, tag: Tag) {
        let inner = &mut *self.inner.lock();
        if tag == 0 {
            if let Some(entry) = inner.table.remove(object) {
                inner.pool.release(entry);
            }
        } else if let Some(entry) = inner.table.find_mut(object) {
            entry.tag = tag;
        } else {
            inner.table.add(&mut inner.pool, object, tag);
        }
    }

    /// Serializes heap walks against each other.
    pub(crate) fn walk_guard(&self) -> MutexGuard<'_, ()> {
        self.walk_serial.lock()
    }
}

impl Default for TagStore {
    fn default() -> Self {
        Self::new()
    }
}
