//! Tag entries and the bounded free-entry pool.

use crate::heap::{ObjectRef, Tag};

/// One `(object, tag)` pair, owned by a bucket chain or by the free pool.
#[derive(Debug)]
pub(crate) struct TagEntry {
    pub(crate) object: ObjectRef,
    pub(crate) tag: Tag,
    pub(crate) next: Option<Box<TagEntry>>,
}

impl TagEntry {
    pub(crate) fn new(object: ObjectRef, tag: Tag) -> Box<Self> {
        Box::new(Self {
            object,
            tag,
            next: None,
        })
    }
}

/// Long chains must not drop recursively.
pub(crate) fn drop_chain(mut head: Option<Box<TagEntry>>) {
    while let Some(mut entry) = head {
        head = entry.next.take();
    }
}

/// Retired entries kept for reuse, capped so a burst of untagging cannot
/// pin memory forever.
#[derive(Debug)]
pub(crate) struct EntryPool {
    free: Option<Box<TagEntry>>,
    free_count: usize,
}

pub(crate) const MAX_FREE_ENTRIES: usize = 4096;

impl EntryPool {
    pub(crate) const fn new() -> Self {
        Self {
            free: None,
            free_count: 0,
        }
    }

    /// Take an entry from the pool or allocate a fresh one.
    pub(crate) fn acquire(&mut self, object: ObjectRef, tag: Tag) -> Box<TagEntry> {
        if let Some(mut entry) = self.free.take() {
            self.free = entry.next.take();
            self.free_count -= 1;
            entry.object = object;
            entry.tag = tag;
            entry
        } else {
            TagEntry::new(object, tag)
        }
    }

    /// Return an entry to the pool, dropping it once the cap is reached.
    pub(crate) fn release(&mut self, mut entry: Box<TagEntry>) {
        if self.free_count < MAX_FREE_ENTRIES {
            entry.next = self.free.take();
            self.free = Some(entry);
            self.free_count += 1;
        }
        // else: entry drops here
    }

    #[cfg(test)]
    pub(crate) const fn free_count(&self) -> usize {
        self.free_count
    }
}

impl Drop for EntryPool {
    fn drop(&mut self) {
        drop_chain(self.free.take());
    }
}
