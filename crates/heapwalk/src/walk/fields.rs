//! Field maps: stable field indices for edge reporting.
//!
//! Reported field indices run in reverse declaration order over the full
//! declared stream: index = (stream length - 1) - stream position. Entries
//! of the other staticness are skipped without their index being reused, so
//! an index identifies one declared field regardless of which map it came
//! from.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::heap::{DeclaredField, FieldKind, Heap, ObjectRef};

/// One reportable field: its stable index, type, and offset.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FieldDesc {
    pub(crate) index: i32,
    pub(crate) kind: FieldKind,
    pub(crate) offset: u32,
}

/// The reportable fields of one class, in stream order.
#[derive(Debug)]
pub(crate) struct FieldMap {
    fields: Vec<FieldDesc>,
}

impl FieldMap {
    fn build(stream: &[DeclaredField], want_static: bool) -> Self {
        let max_index = i32::try_from(stream.len()).unwrap_or(i32::MAX) - 1;
        let mut fields = Vec::new();
        for (pos, field) in stream.iter().enumerate() {
            if field.is_static != want_static {
                continue;
            }
            fields.push(FieldDesc {
                index: max_index - i32::try_from(pos).unwrap_or(i32::MAX),
                kind: field.kind,
                offset: field.offset,
            });
        }
        Self { fields }
    }

    /// Static fields declared by `desc` itself.
    pub(crate) fn of_static_fields<H: Heap + ?Sized>(heap: &H, desc: ObjectRef) -> Self {
        Self::build(&heap.declared_fields(desc, false), true)
    }

    /// Instance fields of `desc`, inherited ones included.
    pub(crate) fn of_instance_fields<H: Heap + ?Sized>(heap: &H, desc: ObjectRef) -> Self {
        Self::build(&heap.declared_fields(desc, true), false)
    }

    pub(crate) fn fields(&self) -> &[FieldDesc] {
        &self.fields
    }
}

/// Per-walk cache of instance field maps, keyed by class descriptor.
///
/// Instance maps are requested once per visited object; caching by class
/// amortizes the build across instances. The cache lives only as long as
/// one walk.
#[derive(Default, Debug)]
pub(crate) struct FieldMapCache {
    maps: FxHashMap<ObjectRef, Rc<FieldMap>>,
}

impl FieldMapCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn instance_map<H: Heap + ?Sized>(&mut self, heap: &H, desc: ObjectRef) -> Rc<FieldMap> {
        Rc::clone(
            self.maps
                .entry(desc)
                .or_insert_with(|| Rc::new(FieldMap::of_instance_fields(heap, desc))),
        )
    }
}
