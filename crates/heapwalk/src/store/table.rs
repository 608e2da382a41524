//! Chained hash table keyed by object identity.
//!
//! Buckets hold singly linked entry chains. The table grows through a fixed
//! ladder of sizes when the average chain length passes the load factor, and
//! it is rebuilt in place by [`TagTable::reconcile`] when the collector
//! frees or relocates objects.

use crate::heap::{ObjectRef, Tag};
use crate::store::entry::{drop_chain, EntryPool, TagEntry};

/// Bucket-count ladder. Growth steps to the next size and never shrinks.
const SIZES: &[usize] = &[
    4801, 76831, 307_261, 614_563, 1_228_891, 2_457_733, 4_915_219, 9_830_479, 19_660_831,
    39_321_619, 78_643_219,
];

const DEFAULT_LOAD_FACTOR: f64 = 4.0;

/// Counts reported after a reconcile pass.
#[derive(Clone, Copy, Default, Debug)]
pub(crate) struct ReconcileStats {
    pub(crate) freed: usize,
    pub(crate) moved: usize,
}

#[derive(Debug)]
pub(crate) struct TagTable {
    buckets: Vec<Option<Box<TagEntry>>>,
    size_index: usize,
    entry_count: usize,
    load_factor: f64,
    resize_threshold: usize,
    resizing_enabled: bool,
}

impl TagTable {
    pub(crate) fn new() -> Self {
        Self::with_size_index(0)
    }

    fn with_size_index(size_index: usize) -> Self {
        let size = SIZES[size_index];
        let mut buckets = Vec::new();
        buckets.resize_with(size, || None);
        Self {
            buckets,
            size_index,
            entry_count: 0,
            load_factor: DEFAULT_LOAD_FACTOR,
            resize_threshold: threshold(DEFAULT_LOAD_FACTOR, size),
            resizing_enabled: true,
        }
    }

    fn hash(object: ObjectRef, size: usize) -> usize {
        // Low bits are alignment zeros and carry no information.
        usize::try_from((object.addr() >> 3) % size as u64).unwrap_or(0)
    }

    pub(crate) const fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Clear the sticky resize-failure flag. Called at the start of each
    /// reconcile pass so a transient allocation failure does not disable
    /// growth for the rest of the process.
    pub(crate) fn enable_resizing(&mut self) {
        self.resizing_enabled = true;
    }

    pub(crate) fn find(&self, object: ObjectRef) -> Option<Tag> {
        let pos = Self::hash(object, self.buckets.len());
        let mut cursor = self.buckets[pos].as_deref();
        while let Some(entry) = cursor {
            if entry.object == object {
                return Some(entry.tag);
            }
            cursor = entry.next.as_deref();
        }
        None
    }

    pub(crate) fn find_mut(&mut self, object: ObjectRef) -> Option<&mut TagEntry> {
        let pos = Self::hash(object, self.buckets.len());
        let mut cursor = self.buckets[pos].as_deref_mut();
        while let Some(entry) = cursor {
            if entry.object == object {
                return Some(entry);
            }
            cursor = entry.next.as_deref_mut();
        }
        None
    }

    /// Insert a new entry at the head of its bucket. The object must not
    /// already be present.
    pub(crate) fn add(&mut self, pool: &mut EntryPool, object: ObjectRef, tag: Tag) {
        debug_assert!(self.find(object).is_none(), "duplicate tag entry");
        if self.resizing_enabled
            && self.entry_count >= self.resize_threshold
            && self.size_index + 1 < SIZES.len()
        {
            self.resize();
        }
        let pos = Self::hash(object, self.buckets.len());
        let mut entry = pool.acquire(object, tag);
        entry.next = self.buckets[pos].take();
        self.buckets[pos] = Some(entry);
        self.entry_count += 1;
    }

    /// Unlink and return the entry for `object`, if present.
    pub(crate) fn remove(&mut self, object: ObjectRef) -> Option<Box<TagEntry>> {
        let pos = Self::hash(object, self.buckets.len());
        let mut chain = self.buckets[pos].take();
        let mut removed = None;
        let mut kept: Option<Box<TagEntry>> = None;
        while let Some(mut entry) = chain {
            chain = entry.next.take();
            if entry.object == object {
                removed = Some(entry);
            } else {
                entry.next = kept.take();
                kept = Some(entry);
            }
        }
        self.buckets[pos] = kept;
        if removed.is_some() {
            self.entry_count -= 1;
        }
        removed
    }

    pub(crate) fn for_each(&self, mut f: impl FnMut(ObjectRef, Tag)) {
        for bucket in &self.buckets {
            let mut cursor = bucket.as_deref();
            while let Some(entry) = cursor {
                f(entry.object, entry.tag);
                cursor = entry.next.as_deref();
            }
        }
    }

    fn resize(&mut self) {
        let new_size = SIZES[self.size_index + 1];
        let mut new_buckets: Vec<Option<Box<TagEntry>>> = Vec::new();
        if new_buckets.try_reserve_exact(new_size).is_err() {
            tracing::warn!(new_size, "tag table resize failed; resizing disabled");
            self.resizing_enabled = false;
            return;
        }
        new_buckets.resize_with(new_size, || None);

        for pos in 0..self.buckets.len() {
            let mut chain = self.buckets[pos].take();
            while let Some(mut entry) = chain {
                chain = entry.next.take();
                let new_pos = Self::hash(entry.object, new_size);
                entry.next = new_buckets[new_pos].take();
                new_buckets[new_pos] = Some(entry);
            }
        }

        self.buckets = new_buckets;
        self.size_index += 1;
        self.resize_threshold = threshold(self.load_factor, new_size);
    }

    /// Rebuild the table after a collection.
    ///
    /// Dead entries are recycled into `pool` and announced through
    /// `on_freed`. Moved entries are re-bucketed with a single-visit
    /// guarantee: an entry whose new bucket precedes the scan cursor is
    /// spliced immediately (that bucket is already done), while one whose
    /// new bucket is at or past the cursor is parked on a side list and
    /// spliced only after the scan finishes.
    pub(crate) fn reconcile(
        &mut self,
        pool: &mut EntryPool,
        mut is_alive: impl FnMut(ObjectRef) -> bool,
        mut relocate: impl FnMut(ObjectRef) -> ObjectRef,
        mut on_freed: impl FnMut(Tag),
    ) -> ReconcileStats {
        let mut stats = ReconcileStats::default();
        let mut delayed: Option<Box<TagEntry>> = None;
        let size = self.buckets.len();

        for pos in 0..size {
            let mut chain = self.buckets[pos].take();
            let mut keep: Option<Box<TagEntry>> = None;
            while let Some(mut entry) = chain {
                chain = entry.next.take();

                if !is_alive(entry.object) {
                    on_freed(entry.tag);
                    self.entry_count -= 1;
                    stats.freed += 1;
                    pool.release(entry);
                    continue;
                }

                let new_object = relocate(entry.object);
                let mut dest = pos;
                if new_object != entry.object {
                    stats.moved += 1;
                    entry.object = new_object;
                    dest = Self::hash(new_object, size);
                }

                if dest == pos {
                    entry.next = keep.take();
                    keep = Some(entry);
                } else if dest < pos {
                    entry.next = self.buckets[dest].take();
                    self.buckets[dest] = Some(entry);
                } else {
                    entry.next = delayed.take();
                    delayed = Some(entry);
                }
            }
            self.buckets[pos] = keep;
        }

        while let Some(mut entry) = delayed {
            delayed = entry.next.take();
            let dest = Self::hash(entry.object, size);
            entry.next = self.buckets[dest].take();
            self.buckets[dest] = Some(entry);
        }

        stats
    }
}

impl Drop for TagTable {
    fn drop(&mut self) {
        for bucket in &mut self.buckets {
            drop_chain(bucket.take());
        }
    }
}

fn threshold(load_factor: f64, size: usize) -> usize {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        (load_factor * size as f64) as usize
    }
}
