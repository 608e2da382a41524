//! Callback protocols, filters, and reference classification.
//!
//! Two protocols are exposed. The *basic* protocol delivers roots, stack
//! references, and object references through three independent callbacks,
//! each returning an [`IterationControl`]. The *advanced* protocol funnels
//! every edge through one reference callback returning [`VisitFlags`], adds
//! tag-based and class-based filtering, and can report primitive payloads.

use bitflags::bitflags;

use crate::heap::{Heap, MethodId, ObjectRef, PrimitiveType, PrimitiveValue, Tag};

// ============================================================================
// Control values
// ============================================================================

/// Basic-protocol callback verdict.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IterationControl {
    /// Keep going; visit the reported object's own references later.
    Continue,
    /// Keep going, but do not visit the reported object's references.
    Ignore,
    /// Stop the whole walk.
    Abort,
}

bitflags! {
    /// Advanced-protocol callback verdict.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct VisitFlags: u32 {
        /// Visit the reported object's own references later.
        const VISIT_OBJECTS = 0x100;
        /// Stop the whole walk.
        const ABORT = 0x8000;
    }
}

bitflags! {
    /// Suppresses advanced-protocol callbacks by tag state. An object is
    /// filtered out when any set bit matches it; filtered edges are still
    /// traversed.
    #[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
    pub struct HeapFilter: u32 {
        /// Skip objects that carry a tag.
        const TAGGED = 0x4;
        /// Skip objects that carry no tag.
        const UNTAGGED = 0x8;
        /// Skip objects whose class carries a tag.
        const CLASS_TAGGED = 0x10;
        /// Skip objects whose class carries no tag.
        const CLASS_UNTAGGED = 0x20;
    }
}

// ============================================================================
// Reference classification
// ============================================================================

/// How one object refers to another, or how a root refers into the heap.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RefKind {
    /// From an object to its class.
    Class,
    /// Through an instance field.
    Field,
    /// Through a static field.
    StaticField,
    /// Through an array element.
    ArrayElement,
    /// From a class to its defining loader.
    ClassLoader,
    /// From a class to its signers array.
    Signers,
    /// From a class to its protection domain.
    ProtectionDomain,
    /// From a class to one of its interfaces.
    Interface,
    /// From a class to its superclass.
    Superclass,
    /// From a class to a constant-pool entry.
    ConstantPool,
    /// Root: external global handle.
    JniGlobal,
    /// Root: system class.
    SystemClass,
    /// Root: object pinned by a monitor.
    Monitor,
    /// Root: local variable on a thread stack.
    StackLocal,
    /// Root: native-interface local handle.
    JniLocal,
    /// Root: a live thread object.
    Thread,
    /// Root: otherwise unclassified.
    Other,
}

/// Root classification delivered by the basic protocol.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RootKind {
    /// External global handle.
    JniGlobal,
    /// System class.
    SystemClass,
    /// Object pinned by a monitor.
    Monitor,
    /// Local variable on a thread stack.
    StackLocal,
    /// Native-interface local handle.
    JniLocal,
    /// A live thread object.
    Thread,
    /// Otherwise unclassified.
    Other,
}

/// Kind-specific detail attached to an advanced-protocol reference.
///
/// Only field, array-element, constant-pool, and stack kinds carry detail;
/// every other kind reports `None`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RefInfo {
    /// Instance field, by field index.
    Field {
        /// Index into the referrer class's field order.
        index: i32,
    },
    /// Static field, by field index.
    StaticField {
        /// Index into the declaring class's field order.
        index: i32,
    },
    /// Array element, by element index.
    ArrayElement {
        /// Element index.
        index: i32,
    },
    /// Constant-pool entry, by pool index.
    ConstantPool {
        /// Constant-pool index.
        index: i32,
    },
    /// Local variable in a stack frame.
    StackLocal {
        /// Tag of the owning thread object.
        thread_tag: Tag,
        /// Id of the owning thread.
        thread_id: i64,
        /// Frame depth, topmost frame is 0.
        depth: i32,
        /// The frame's method.
        method: Option<MethodId>,
        /// Byte offset of the current instruction within the method.
        location: i64,
        /// Local variable slot.
        slot: i32,
    },
    /// Native-interface local handle in a native frame.
    JniLocal {
        /// Tag of the owning thread object.
        thread_tag: Tag,
        /// Id of the owning thread.
        thread_id: i64,
        /// Frame depth, topmost frame is 0.
        depth: i32,
        /// The frame's method.
        method: Option<MethodId>,
    },
}

// ============================================================================
// Basic protocol
// ============================================================================

/// A heap root, as seen by the basic root callback.
#[derive(Debug)]
pub struct RootEdge {
    /// Root classification.
    pub kind: RootKind,
    /// Tag of the object's class.
    pub class_tag: Tag,
    /// Object size in bytes.
    pub size: u64,
    /// The object's tag; assignments here update the store.
    pub tag: Tag,
}

/// A stack-held root, as seen by the basic stack-reference callback.
#[derive(Debug)]
pub struct StackRefEdge {
    /// `StackLocal` or `JniLocal`.
    pub kind: RootKind,
    /// Tag of the object's class.
    pub class_tag: Tag,
    /// Object size in bytes.
    pub size: u64,
    /// The object's tag; assignments here update the store.
    pub tag: Tag,
    /// Tag of the owning thread object.
    pub thread_tag: Tag,
    /// Frame depth, topmost frame is 0.
    pub depth: i32,
    /// The frame's method.
    pub method: Option<MethodId>,
    /// Local slot, or -1 for a native-interface local.
    pub slot: i32,
}

/// An object-to-object edge, as seen by the basic object-reference callback.
#[derive(Debug)]
pub struct ObjectRefEdge {
    /// Edge classification.
    pub kind: RefKind,
    /// Tag of the referenced object's class.
    pub class_tag: Tag,
    /// Referenced object size in bytes.
    pub size: u64,
    /// The referenced object's tag; assignments here update the store.
    pub tag: Tag,
    /// Tag of the referring object. Informational; assignments are ignored.
    pub referrer_tag: Tag,
    /// Field, element, or pool index, or -1 where no index applies.
    pub index: i32,
}

/// The basic protocol's callback set. Absent callbacks degrade gracefully:
/// the object is still scheduled for a visit so traversal stays complete.
#[derive(Default)]
pub struct BasicCallbacks<'h> {
    /// Called once per non-stack root.
    pub root: Option<Box<dyn FnMut(&mut RootEdge) -> IterationControl + 'h>>,
    /// Called once per stack-held root.
    pub stack_ref: Option<Box<dyn FnMut(&mut StackRefEdge) -> IterationControl + 'h>>,
    /// Called once per object-to-object edge.
    pub object_ref: Option<Box<dyn FnMut(&mut ObjectRefEdge) -> IterationControl + 'h>>,
}

impl std::fmt::Debug for BasicCallbacks<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCallbacks")
            .field("root", &self.root.is_some())
            .field("stack_ref", &self.stack_ref.is_some())
            .field("object_ref", &self.object_ref.is_some())
            .finish()
    }
}

// ============================================================================
// Advanced protocol
// ============================================================================

/// One reference, as seen by the advanced reference callback.
///
/// Tag slots are behind accessors because a self-referential edge exposes a
/// single slot for both the object and its referrer.
#[derive(Debug)]
pub struct Reference {
    /// Edge classification.
    pub kind: RefKind,
    /// Kind-specific detail, present only for the kinds that carry any.
    pub info: Option<RefInfo>,
    /// Tag of the referenced object's class.
    pub class_tag: Tag,
    /// Tag of the referring object's class; 0 for roots.
    pub referrer_class_tag: Tag,
    /// Referenced object size in bytes.
    pub size: u64,
    /// Array length if the referenced object is an array.
    pub length: Option<i32>,
    pub(crate) tag: Tag,
    pub(crate) referrer_tag: Tag,
    pub(crate) self_ref: bool,
    pub(crate) has_referrer: bool,
}

impl Reference {
    /// The referenced object's tag.
    #[must_use]
    pub const fn tag(&self) -> Tag {
        self.tag
    }

    /// Update the referenced object's tag. On a self-referential edge the
    /// referrer slot is the same slot.
    pub fn set_tag(&mut self, tag: Tag) {
        self.tag = tag;
    }

    /// The referring object's tag; 0 for roots.
    #[must_use]
    pub const fn referrer_tag(&self) -> Tag {
        if self.self_ref {
            self.tag
        } else {
            self.referrer_tag
        }
    }

    /// Update the referring object's tag. Ignored for roots; on a
    /// self-referential edge this writes the object's own slot.
    pub fn set_referrer_tag(&mut self, tag: Tag) {
        if self.self_ref {
            self.tag = tag;
        } else if self.has_referrer {
            self.referrer_tag = tag;
        }
    }

    pub(crate) const fn referrer_slot(&self) -> Option<Tag> {
        if self.has_referrer && !self.self_ref {
            Some(self.referrer_tag)
        } else {
            None
        }
    }
}

/// A primitive field value, reported by the advanced protocol.
#[derive(Debug)]
pub struct PrimitiveFieldEvent {
    /// `Field` or `StaticField`.
    pub kind: RefKind,
    /// Index into the owner class's field order.
    pub index: i32,
    /// Tag of the owning object's class.
    pub class_tag: Tag,
    /// The owning object's tag; assignments here update the store.
    pub tag: Tag,
    /// The field value.
    pub value: PrimitiveValue,
}

/// The contents of a primitive array, reported by the advanced protocol.
#[derive(Debug)]
pub struct ArrayValuesEvent {
    /// Tag of the array's class.
    pub class_tag: Tag,
    /// Array size in bytes.
    pub size: u64,
    /// The array's tag; assignments here update the store.
    pub tag: Tag,
    /// Element type.
    pub element_type: PrimitiveType,
    /// Element values in index order.
    pub values: Vec<PrimitiveValue>,
}

/// The character data of a string object, reported by the advanced protocol.
#[derive(Debug)]
pub struct StringValueEvent {
    /// Tag of the string's class.
    pub class_tag: Tag,
    /// String object size in bytes.
    pub size: u64,
    /// The string's tag; assignments here update the store.
    pub tag: Tag,
    /// UTF-16 code units.
    pub value: Vec<u16>,
}

/// The advanced protocol's callback set.
#[derive(Default)]
pub struct AdvancedCallbacks<'h> {
    /// Called once per reference (root or edge) that passes the filters.
    pub reference: Option<Box<dyn FnMut(&mut Reference) -> VisitFlags + 'h>>,
    /// Called once per primitive field of each visited object.
    pub primitive_field: Option<Box<dyn FnMut(&mut PrimitiveFieldEvent) -> VisitFlags + 'h>>,
    /// Called once per visited primitive array.
    pub array_values: Option<Box<dyn FnMut(&mut ArrayValuesEvent) -> VisitFlags + 'h>>,
    /// Called once per visited string object.
    pub string_value: Option<Box<dyn FnMut(&mut StringValueEvent) -> VisitFlags + 'h>>,
}

impl std::fmt::Debug for AdvancedCallbacks<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvancedCallbacks")
            .field("reference", &self.reference.is_some())
            .field("primitive_field", &self.primitive_field.is_some())
            .field("array_values", &self.array_values.is_some())
            .field("string_value", &self.string_value.is_some())
            .finish()
    }
}

// ============================================================================
// Heap iteration
// ============================================================================

/// Tag-state filter for the basic whole-heap iteration.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ObjectFilter {
    /// Report only tagged objects.
    Tagged,
    /// Report only untagged objects.
    Untagged,
    /// Report every object.
    Either,
}

/// One heap object, as seen by the whole-heap iteration callbacks.
#[derive(Debug)]
pub struct HeapObjectEvent {
    /// Tag of the object's class.
    pub class_tag: Tag,
    /// Object size in bytes.
    pub size: u64,
    /// The object's tag; assignments here update the store.
    pub tag: Tag,
    /// Array length if the object is an array.
    pub length: Option<i32>,
}

/// Callback set for the filtered whole-heap iteration.
#[derive(Default)]
pub struct IterationCallbacks<'h> {
    /// Called once per object that passes the filters.
    pub object: Option<Box<dyn FnMut(&mut HeapObjectEvent) -> VisitFlags + 'h>>,
    /// Called once per primitive field of each unfiltered object.
    pub primitive_field: Option<Box<dyn FnMut(&mut PrimitiveFieldEvent) -> VisitFlags + 'h>>,
    /// Called once per unfiltered primitive array.
    pub array_values: Option<Box<dyn FnMut(&mut ArrayValuesEvent) -> VisitFlags + 'h>>,
    /// Called once per unfiltered string object.
    pub string_value: Option<Box<dyn FnMut(&mut StringValueEvent) -> VisitFlags + 'h>>,
}

impl std::fmt::Debug for IterationCallbacks<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IterationCallbacks")
            .field("object", &self.object.is_some())
            .field("primitive_field", &self.primitive_field.is_some())
            .field("array_values", &self.array_values.is_some())
            .field("string_value", &self.string_value.is_some())
            .finish()
    }
}

// ============================================================================
// Filter predicates
// ============================================================================

/// Whether the heap filter suppresses an object with the given tag state.
pub(crate) fn filtered_by_tags(obj_tag: Tag, class_tag: Tag, filter: HeapFilter) -> bool {
    if obj_tag == 0 {
        if filter.contains(HeapFilter::UNTAGGED) {
            return true;
        }
    } else if filter.contains(HeapFilter::TAGGED) {
        return true;
    }
    if class_tag == 0 {
        if filter.contains(HeapFilter::CLASS_UNTAGGED) {
            return true;
        }
    } else if filter.contains(HeapFilter::CLASS_TAGGED) {
        return true;
    }
    false
}

/// Whether the exact-class filter suppresses `obj`.
pub(crate) fn filtered_by_class<H: Heap + ?Sized>(
    heap: &H,
    obj: ObjectRef,
    class_filter: Option<ObjectRef>,
) -> bool {
    class_filter.is_some_and(|desc| heap.class_of(obj) != desc)
}
