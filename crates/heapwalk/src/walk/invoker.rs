//! Dispatch from edge discovery to the selected callback protocol.
//!
//! Each `report_*` method classifies one reference and routes it to the
//! basic or advanced invoker. Every method returns whether the walk should
//! continue; false means abort.

use super::context::{
    filtered_by_class, filtered_by_tags, ArrayValuesEvent, IterationControl, ObjectRefEdge,
    PrimitiveFieldEvent, RefInfo, RefKind, Reference, RootEdge, RootKind, StackRefEdge,
    StringValueEvent, VisitFlags,
};
use super::{Mode, Walk};
use crate::heap::{
    Heap, MethodId, ObjectKind, ObjectRef, PrimitiveValue, StackRef, StackRefKind, Tag,
    ThreadDescriptor,
};
use crate::wrapper::{CallbackWrapper, PairWrapper};

impl<H: Heap + ?Sized> Walk<'_, '_, H> {
    // ========================================================================
    // Edge classification
    // ========================================================================

    pub(super) fn report_class_reference(&mut self, referrer: ObjectRef, obj: ObjectRef) -> bool {
        match self.mode {
            Mode::Basic { .. } => self.invoke_basic_object_ref(RefKind::Class, referrer, obj, -1),
            Mode::Advanced { .. } => {
                self.invoke_advanced_ref(RefKind::Class, None, Some(referrer), obj)
            }
        }
    }

    pub(super) fn report_superclass_reference(
        &mut self,
        referrer: ObjectRef,
        obj: ObjectRef,
    ) -> bool {
        match self.mode {
            // The basic protocol predates the superclass kind.
            Mode::Basic { .. } => self.invoke_basic_object_ref(RefKind::Class, referrer, obj, -1),
            Mode::Advanced { .. } => {
                self.invoke_advanced_ref(RefKind::Superclass, None, Some(referrer), obj)
            }
        }
    }

    pub(super) fn report_interface_reference(
        &mut self,
        referrer: ObjectRef,
        obj: ObjectRef,
    ) -> bool {
        match self.mode {
            Mode::Basic { .. } => {
                self.invoke_basic_object_ref(RefKind::Interface, referrer, obj, -1)
            }
            Mode::Advanced { .. } => {
                self.invoke_advanced_ref(RefKind::Interface, None, Some(referrer), obj)
            }
        }
    }

    pub(super) fn report_class_loader_reference(
        &mut self,
        referrer: ObjectRef,
        obj: ObjectRef,
    ) -> bool {
        match self.mode {
            Mode::Basic { .. } => {
                self.invoke_basic_object_ref(RefKind::ClassLoader, referrer, obj, -1)
            }
            Mode::Advanced { .. } => {
                self.invoke_advanced_ref(RefKind::ClassLoader, None, Some(referrer), obj)
            }
        }
    }

    pub(super) fn report_protection_domain_reference(
        &mut self,
        referrer: ObjectRef,
        obj: ObjectRef,
    ) -> bool {
        match self.mode {
            Mode::Basic { .. } => {
                self.invoke_basic_object_ref(RefKind::ProtectionDomain, referrer, obj, -1)
            }
            Mode::Advanced { .. } => {
                self.invoke_advanced_ref(RefKind::ProtectionDomain, None, Some(referrer), obj)
            }
        }
    }

    pub(super) fn report_signers_reference(&mut self, referrer: ObjectRef, obj: ObjectRef) -> bool {
        match self.mode {
            Mode::Basic { .. } => self.invoke_basic_object_ref(RefKind::Signers, referrer, obj, -1),
            Mode::Advanced { .. } => {
                self.invoke_advanced_ref(RefKind::Signers, None, Some(referrer), obj)
            }
        }
    }

    pub(super) fn report_constant_pool_reference(
        &mut self,
        referrer: ObjectRef,
        obj: ObjectRef,
        index: i32,
    ) -> bool {
        match self.mode {
            Mode::Basic { .. } => {
                self.invoke_basic_object_ref(RefKind::ConstantPool, referrer, obj, index)
            }
            Mode::Advanced { .. } => self.invoke_advanced_ref(
                RefKind::ConstantPool,
                Some(RefInfo::ConstantPool { index }),
                Some(referrer),
                obj,
            ),
        }
    }

    pub(super) fn report_field_reference(
        &mut self,
        referrer: ObjectRef,
        obj: ObjectRef,
        index: i32,
    ) -> bool {
        match self.mode {
            Mode::Basic { .. } => self.invoke_basic_object_ref(RefKind::Field, referrer, obj, index),
            Mode::Advanced { .. } => self.invoke_advanced_ref(
                RefKind::Field,
                Some(RefInfo::Field { index }),
                Some(referrer),
                obj,
            ),
        }
    }

    pub(super) fn report_static_field_reference(
        &mut self,
        referrer: ObjectRef,
        obj: ObjectRef,
        index: i32,
    ) -> bool {
        match self.mode {
            Mode::Basic { .. } => {
                self.invoke_basic_object_ref(RefKind::StaticField, referrer, obj, index)
            }
            Mode::Advanced { .. } => self.invoke_advanced_ref(
                RefKind::StaticField,
                Some(RefInfo::StaticField { index }),
                Some(referrer),
                obj,
            ),
        }
    }

    pub(super) fn report_array_element_reference(
        &mut self,
        referrer: ObjectRef,
        obj: ObjectRef,
        index: i32,
    ) -> bool {
        match self.mode {
            Mode::Basic { .. } => {
                self.invoke_basic_object_ref(RefKind::ArrayElement, referrer, obj, index)
            }
            Mode::Advanced { .. } => self.invoke_advanced_ref(
                RefKind::ArrayElement,
                Some(RefInfo::ArrayElement { index }),
                Some(referrer),
                obj,
            ),
        }
    }

    pub(super) fn report_simple_root(&mut self, kind: RefKind, obj: ObjectRef) -> bool {
        match self.mode {
            Mode::Basic { .. } => self.invoke_basic_heap_root(basic_root_kind(kind), obj),
            Mode::Advanced { .. } => self.invoke_advanced_ref(kind, None, None, obj),
        }
    }

    pub(super) fn report_stack_ref(
        &mut self,
        thread: &ThreadDescriptor,
        thread_tag: Tag,
        stack_ref: &StackRef,
    ) -> bool {
        match stack_ref.kind {
            StackRefKind::Local { location, slot } => match self.mode {
                Mode::Basic { .. } => self.invoke_basic_stack_ref(
                    RootKind::StackLocal,
                    thread_tag,
                    stack_ref.depth,
                    stack_ref.method,
                    slot,
                    stack_ref.object,
                ),
                Mode::Advanced { .. } => self.invoke_advanced_ref(
                    RefKind::StackLocal,
                    Some(RefInfo::StackLocal {
                        thread_tag,
                        thread_id: thread.thread_id,
                        depth: stack_ref.depth,
                        method: stack_ref.method,
                        location,
                        slot,
                    }),
                    None,
                    stack_ref.object,
                ),
            },
            StackRefKind::JniLocal => match self.mode {
                Mode::Basic { .. } => self.invoke_basic_stack_ref(
                    RootKind::JniLocal,
                    thread_tag,
                    stack_ref.depth,
                    stack_ref.method,
                    -1,
                    stack_ref.object,
                ),
                Mode::Advanced { .. } => self.invoke_advanced_ref(
                    RefKind::JniLocal,
                    Some(RefInfo::JniLocal {
                        thread_tag,
                        thread_id: thread.thread_id,
                        depth: stack_ref.depth,
                        method: stack_ref.method,
                    }),
                    None,
                    stack_ref.object,
                ),
            },
        }
    }

    // ========================================================================
    // Basic protocol invocation
    // ========================================================================

    fn invoke_basic_heap_root(&mut self, kind: RootKind, obj: ObjectRef) -> bool {
        let heap = self.heap;
        let store = self.store;
        let control = {
            let Mode::Basic { callbacks, .. } = &mut self.mode else {
                unreachable!()
            };
            callbacks
                .root
                .as_mut()
                .map_or(IterationControl::Continue, |cb| {
                    let mut wrapper = CallbackWrapper::new(store, heap, obj);
                    let mut edge = RootEdge {
                        kind,
                        class_tag: wrapper.class_tag(),
                        size: wrapper.size(),
                        tag: wrapper.tag,
                    };
                    let control = cb(&mut edge);
                    wrapper.tag = edge.tag;
                    control
                })
        };
        self.continue_or_visit(control, obj)
    }

    fn invoke_basic_stack_ref(
        &mut self,
        kind: RootKind,
        thread_tag: Tag,
        depth: i32,
        method: Option<MethodId>,
        slot: i32,
        obj: ObjectRef,
    ) -> bool {
        let heap = self.heap;
        let store = self.store;
        let control = {
            let Mode::Basic { callbacks, .. } = &mut self.mode else {
                unreachable!()
            };
            callbacks
                .stack_ref
                .as_mut()
                .map_or(IterationControl::Continue, |cb| {
                    let mut wrapper = CallbackWrapper::new(store, heap, obj);
                    let mut edge = StackRefEdge {
                        kind,
                        class_tag: wrapper.class_tag(),
                        size: wrapper.size(),
                        tag: wrapper.tag,
                        thread_tag,
                        depth,
                        method,
                        slot,
                    };
                    let control = cb(&mut edge);
                    wrapper.tag = edge.tag;
                    control
                })
        };
        self.continue_or_visit(control, obj)
    }

    fn invoke_basic_object_ref(
        &mut self,
        kind: RefKind,
        referrer: ObjectRef,
        obj: ObjectRef,
        index: i32,
    ) -> bool {
        let heap = self.heap;
        let store = self.store;
        let control = {
            let Mode::Basic {
                callbacks,
                last_referrer,
                last_referrer_tag,
            } = &mut self.mode
            else {
                unreachable!()
            };
            match callbacks.object_ref.as_mut() {
                None => IterationControl::Continue,
                Some(cb) => {
                    // One-entry cache: edges are reported in referrer
                    // clusters, so the previous lookup usually still holds.
                    let referrer_tag = if *last_referrer == Some(referrer) {
                        *last_referrer_tag
                    } else {
                        store.get_raw(heap.tag_target(referrer))
                    };
                    let mut wrapper = CallbackWrapper::new(store, heap, obj);
                    let mut edge = ObjectRefEdge {
                        kind,
                        class_tag: wrapper.class_tag(),
                        size: wrapper.size(),
                        tag: wrapper.tag,
                        referrer_tag,
                        index,
                    };
                    let control = cb(&mut edge);
                    wrapper.tag = edge.tag;
                    *last_referrer = Some(referrer);
                    // A self-referential edge may have retagged the
                    // referrer through the object slot.
                    *last_referrer_tag = if referrer == obj {
                        wrapper.tag
                    } else {
                        referrer_tag
                    };
                    control
                }
            }
        };
        self.continue_or_visit(control, obj)
    }

    fn continue_or_visit(&mut self, control: IterationControl, obj: ObjectRef) -> bool {
        match control {
            IterationControl::Continue => {
                self.check_for_visit(obj);
                true
            }
            IterationControl::Ignore => true,
            IterationControl::Abort => false,
        }
    }

    // ========================================================================
    // Advanced protocol invocation
    // ========================================================================

    fn invoke_advanced_ref(
        &mut self,
        kind: RefKind,
        info: Option<RefInfo>,
        referrer: Option<ObjectRef>,
        obj: ObjectRef,
    ) -> bool {
        let heap = self.heap;
        let store = self.store;
        let length = match heap.kind_of(obj) {
            ObjectKind::Instance => None,
            ObjectKind::ObjectArray | ObjectKind::PrimitiveArray => Some(heap.array_length(obj)),
        };
        let flags = {
            let Mode::Advanced {
                callbacks,
                heap_filter,
                class_filter,
            } = &mut self.mode
            else {
                unreachable!()
            };
            // Filtered references are suppressed, not pruned: the referent
            // is still scheduled for a visit.
            if filtered_by_class(heap, obj, *class_filter) {
                VisitFlags::VISIT_OBJECTS
            } else if let Some(referrer) = referrer {
                let mut pair = PairWrapper::new(store, heap, obj, referrer);
                if filtered_by_tags(pair.obj.tag, pair.obj.class_tag(), *heap_filter) {
                    VisitFlags::VISIT_OBJECTS
                } else if let Some(cb) = callbacks.reference.as_mut() {
                    let self_ref = referrer == obj;
                    let mut reference = Reference {
                        kind,
                        info,
                        class_tag: pair.obj.class_tag(),
                        referrer_class_tag: pair.referrer_class_tag(),
                        size: pair.obj.size(),
                        length,
                        tag: pair.obj.tag,
                        referrer_tag: pair.referrer_tag(),
                        self_ref,
                        has_referrer: true,
                    };
                    let flags = cb(&mut reference);
                    pair.obj.tag = reference.tag;
                    if let Some(tag) = reference.referrer_slot() {
                        pair.set_referrer_tag(tag);
                    }
                    flags
                } else {
                    VisitFlags::VISIT_OBJECTS
                }
            } else {
                let mut wrapper = CallbackWrapper::new(store, heap, obj);
                if filtered_by_tags(wrapper.tag, wrapper.class_tag(), *heap_filter) {
                    VisitFlags::VISIT_OBJECTS
                } else if let Some(cb) = callbacks.reference.as_mut() {
                    let mut reference = Reference {
                        kind,
                        info,
                        class_tag: wrapper.class_tag(),
                        referrer_class_tag: 0,
                        size: wrapper.size(),
                        length,
                        tag: wrapper.tag,
                        referrer_tag: 0,
                        self_ref: false,
                        has_referrer: false,
                    };
                    let flags = cb(&mut reference);
                    wrapper.tag = reference.tag;
                    flags
                } else {
                    VisitFlags::VISIT_OBJECTS
                }
            }
        };
        if flags.contains(VisitFlags::ABORT) {
            return false;
        }
        if flags.contains(VisitFlags::VISIT_OBJECTS) {
            self.check_for_visit(obj);
        }
        true
    }

    // ========================================================================
    // Primitive payload reporting (advanced only)
    // ========================================================================

    pub(super) fn reporting_primitive_fields(&self) -> bool {
        matches!(&self.mode, Mode::Advanced { callbacks, .. } if callbacks.primitive_field.is_some())
    }

    pub(super) fn reporting_array_values(&self) -> bool {
        matches!(&self.mode, Mode::Advanced { callbacks, .. } if callbacks.array_values.is_some())
    }

    pub(super) fn reporting_string_values(&self) -> bool {
        matches!(&self.mode, Mode::Advanced { callbacks, .. } if callbacks.string_value.is_some())
    }

    pub(super) fn report_primitive_instance_field(
        &mut self,
        obj: ObjectRef,
        index: i32,
        value: PrimitiveValue,
    ) -> bool {
        self.report_primitive_field(RefKind::Field, obj, index, value)
    }

    pub(super) fn report_primitive_static_field(
        &mut self,
        mirror: ObjectRef,
        index: i32,
        value: PrimitiveValue,
    ) -> bool {
        self.report_primitive_field(RefKind::StaticField, mirror, index, value)
    }

    fn report_primitive_field(
        &mut self,
        kind: RefKind,
        obj: ObjectRef,
        index: i32,
        value: PrimitiveValue,
    ) -> bool {
        let heap = self.heap;
        let store = self.store;
        let flags = {
            let Mode::Advanced {
                callbacks,
                heap_filter,
                class_filter,
            } = &mut self.mode
            else {
                unreachable!()
            };
            if filtered_by_class(heap, obj, *class_filter) {
                VisitFlags::empty()
            } else {
                let mut wrapper = CallbackWrapper::new(store, heap, obj);
                if filtered_by_tags(wrapper.tag, wrapper.class_tag(), *heap_filter) {
                    VisitFlags::empty()
                } else if let Some(cb) = callbacks.primitive_field.as_mut() {
                    let mut event = PrimitiveFieldEvent {
                        kind,
                        index,
                        class_tag: wrapper.class_tag(),
                        tag: wrapper.tag,
                        value,
                    };
                    let flags = cb(&mut event);
                    wrapper.tag = event.tag;
                    flags
                } else {
                    VisitFlags::empty()
                }
            }
        };
        !flags.contains(VisitFlags::ABORT)
    }

    pub(super) fn report_string_value(&mut self, obj: ObjectRef) -> bool {
        let heap = self.heap;
        let store = self.store;
        let flags = {
            let Mode::Advanced {
                callbacks,
                heap_filter,
                class_filter,
            } = &mut self.mode
            else {
                unreachable!()
            };
            if filtered_by_class(heap, obj, *class_filter) {
                VisitFlags::empty()
            } else {
                let mut wrapper = CallbackWrapper::new(store, heap, obj);
                if filtered_by_tags(wrapper.tag, wrapper.class_tag(), *heap_filter) {
                    VisitFlags::empty()
                } else if let Some(cb) = callbacks.string_value.as_mut() {
                    let mut event = StringValueEvent {
                        class_tag: wrapper.class_tag(),
                        size: wrapper.size(),
                        tag: wrapper.tag,
                        value: heap.string_chars(obj),
                    };
                    let flags = cb(&mut event);
                    wrapper.tag = event.tag;
                    flags
                } else {
                    VisitFlags::empty()
                }
            }
        };
        !flags.contains(VisitFlags::ABORT)
    }

    pub(super) fn report_primitive_array_values(&mut self, obj: ObjectRef) -> bool {
        let heap = self.heap;
        let store = self.store;
        let flags = {
            let Mode::Advanced {
                callbacks,
                heap_filter,
                class_filter,
            } = &mut self.mode
            else {
                unreachable!()
            };
            if filtered_by_class(heap, obj, *class_filter) {
                VisitFlags::empty()
            } else {
                let mut wrapper = CallbackWrapper::new(store, heap, obj);
                if filtered_by_tags(wrapper.tag, wrapper.class_tag(), *heap_filter) {
                    VisitFlags::empty()
                } else if let Some(cb) = callbacks.array_values.as_mut() {
                    let (element_type, values) = heap.primitive_array_values(obj);
                    let mut event = ArrayValuesEvent {
                        class_tag: wrapper.class_tag(),
                        size: wrapper.size(),
                        tag: wrapper.tag,
                        element_type,
                        values,
                    };
                    let flags = cb(&mut event);
                    wrapper.tag = event.tag;
                    flags
                } else {
                    VisitFlags::empty()
                }
            }
        };
        !flags.contains(VisitFlags::ABORT)
    }

    fn check_for_visit(&mut self, obj: ObjectRef) {
        if self.following {
            self.visit_stack.push(obj);
        }
    }
}

const fn basic_root_kind(kind: RefKind) -> RootKind {
    match kind {
        RefKind::JniGlobal => RootKind::JniGlobal,
        RefKind::SystemClass => RootKind::SystemClass,
        RefKind::Monitor => RootKind::Monitor,
        RefKind::Thread => RootKind::Thread,
        _ => RootKind::Other,
    }
}
