//! Per-walk visited-set.

use rustc_hash::FxHashSet;

use crate::heap::ObjectRef;

/// Records which objects a walk has already expanded. One instance lives
/// per walk, so no cross-walk state survives.
#[derive(Default, Debug)]
pub(crate) struct ObjectMarker {
    marked: FxHashSet<ObjectRef>,
}

impl ObjectMarker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn visited(&self, obj: ObjectRef) -> bool {
        self.marked.contains(&obj)
    }

    pub(crate) fn mark(&mut self, obj: ObjectRef) {
        let newly = self.marked.insert(obj);
        debug_assert!(newly, "object marked twice in one walk");
    }
}
