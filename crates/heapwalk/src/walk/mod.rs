//! Heap reachability walking and whole-heap iteration.
//!
//! A walk collects roots, then drains a visit stack, expanding each object
//! at most once and reporting every reference through the selected callback
//! protocol. All walk state is local to the walk, so nothing observable
//! survives a completed or aborted walk. Walks are serialized against each
//! other and assume the heap is paused for their duration.

mod context;
mod fields;
mod invoker;
mod marker;

pub use context::{
    AdvancedCallbacks, ArrayValuesEvent, BasicCallbacks, HeapFilter, HeapObjectEvent,
    IterationCallbacks, IterationControl, ObjectFilter, ObjectRefEdge, PrimitiveFieldEvent,
    RefInfo, RefKind, Reference, RootEdge, RootKind, StackRefEdge, StringValueEvent, VisitFlags,
};

use context::{filtered_by_class, filtered_by_tags};
use fields::{FieldMap, FieldMapCache};
use marker::ObjectMarker;

use crate::heap::{FieldKind, Heap, ObjectKind, ObjectRef, Tag};
use crate::store::TagStore;
use crate::wrapper::CallbackWrapper;

/// Entry point for reachability walks and heap iteration over one heap and
/// one tag store.
///
/// The caller must hold the heap in a global pause for the duration of any
/// operation here; the walker serializes operations against each other but
/// cannot stop mutators itself.
#[derive(Debug)]
pub struct HeapWalker<'a, H: Heap + ?Sized> {
    heap: &'a H,
    store: &'a TagStore,
}

impl<'a, H: Heap + ?Sized> HeapWalker<'a, H> {
    /// Bind a walker to a heap and its tag store.
    #[must_use]
    pub const fn new(heap: &'a H, store: &'a TagStore) -> Self {
        Self { heap, store }
    }

    /// Walk every object reachable from the roots, reporting through the
    /// basic protocol.
    ///
    /// Roots are always reported. Object-to-object references are followed
    /// only when an object-reference callback is present.
    pub fn walk_roots(&self, callbacks: BasicCallbacks<'_>) {
        let _serial = self.store.walk_guard();
        let _span = tracing::debug_span!("heap_walk", op = "walk_roots").entered();
        let following = callbacks.object_ref.is_some();
        self.basic_walk(callbacks, following, None);
    }

    /// Walk every object reachable from `initial`, reporting each reference
    /// through the basic object-reference callback. The initial object
    /// itself is expanded but not reported.
    pub fn walk_from(
        &self,
        initial: ObjectRef,
        object_ref: impl FnMut(&mut ObjectRefEdge) -> IterationControl,
    ) {
        let _serial = self.store.walk_guard();
        let _span = tracing::debug_span!("heap_walk", op = "walk_from").entered();
        let callbacks = BasicCallbacks {
            object_ref: Some(Box::new(object_ref)),
            ..BasicCallbacks::default()
        };
        self.basic_walk(callbacks, true, Some(initial));
    }

    /// Walk the reachable graph through the advanced protocol.
    ///
    /// Starts from `initial` when given, otherwise from the roots. Filtered
    /// references are not reported but are still traversed.
    pub fn follow_references(
        &self,
        heap_filter: HeapFilter,
        class_filter: Option<ObjectRef>,
        initial: Option<ObjectRef>,
        callbacks: AdvancedCallbacks<'_>,
    ) {
        let _serial = self.store.walk_guard();
        let _span = tracing::debug_span!("heap_walk", op = "follow_references").entered();
        let mut walk = Walk {
            heap: self.heap,
            store: self.store,
            mode: Mode::Advanced {
                callbacks,
                heap_filter,
                class_filter,
            },
            following: true,
            visit_stack: Vec::new(),
            marker: ObjectMarker::new(),
            field_maps: FieldMapCache::new(),
        };
        walk.run(initial);
    }

    /// Visit every object in the heap, reachable or not, with a tag-state
    /// filter and an instance-of class filter.
    pub fn iterate_over_heap(
        &self,
        filter: ObjectFilter,
        class_filter: Option<ObjectRef>,
        mut callback: impl FnMut(&mut HeapObjectEvent) -> IterationControl,
    ) {
        let _serial = self.store.walk_guard();
        let _span = tracing::debug_span!("heap_walk", op = "iterate_over_heap").entered();
        let heap = self.heap;
        let store = self.store;
        let mut aborted = false;
        heap.each_object(&mut |obj| {
            if aborted || !heap.is_visible(obj) {
                return;
            }
            if class_filter.is_some_and(|desc| !heap.is_instance_of(obj, desc)) {
                return;
            }
            let mut wrapper = CallbackWrapper::new(store, heap, obj);
            let selected = match filter {
                ObjectFilter::Tagged => wrapper.tag != 0,
                ObjectFilter::Untagged => wrapper.tag == 0,
                ObjectFilter::Either => true,
            };
            if !selected {
                return;
            }
            let mut event = HeapObjectEvent {
                class_tag: wrapper.class_tag(),
                size: wrapper.size(),
                tag: wrapper.tag,
                length: array_length_of(heap, obj),
            };
            let control = callback(&mut event);
            wrapper.tag = event.tag;
            if control == IterationControl::Abort {
                aborted = true;
            }
        });
    }

    /// Visit every object in the heap with the advanced filter set,
    /// reporting primitive payloads through the optional callbacks.
    pub fn iterate_through_heap(
        &self,
        heap_filter: HeapFilter,
        class_filter: Option<ObjectRef>,
        mut callbacks: IterationCallbacks<'_>,
    ) {
        let _serial = self.store.walk_guard();
        let _span = tracing::debug_span!("heap_walk", op = "iterate_through_heap").entered();
        let heap = self.heap;
        let store = self.store;
        let mut aborted = false;
        heap.each_object(&mut |obj| {
            if aborted || !heap.is_visible(obj) {
                return;
            }
            if filtered_by_class(heap, obj, class_filter) {
                return;
            }
            let mut wrapper = CallbackWrapper::new(store, heap, obj);
            if filtered_by_tags(wrapper.tag, wrapper.class_tag(), heap_filter) {
                return;
            }
            if !iterate_one_object(heap, &mut wrapper, obj, &mut callbacks) {
                aborted = true;
            }
        });
    }

    fn basic_walk(&self, callbacks: BasicCallbacks<'_>, following: bool, initial: Option<ObjectRef>) {
        let mut walk = Walk {
            heap: self.heap,
            store: self.store,
            mode: Mode::Basic {
                callbacks,
                last_referrer: None,
                last_referrer_tag: 0,
            },
            following,
            visit_stack: Vec::new(),
            marker: ObjectMarker::new(),
            field_maps: FieldMapCache::new(),
        };
        walk.run(initial);
    }
}

fn array_length_of<H: Heap + ?Sized>(heap: &H, obj: ObjectRef) -> Option<i32> {
    match heap.kind_of(obj) {
        ObjectKind::Instance => None,
        ObjectKind::ObjectArray | ObjectKind::PrimitiveArray => Some(heap.array_length(obj)),
    }
}

/// Per-object reporting for [`HeapWalker::iterate_through_heap`]. One
/// wrapper carries the tag slot across every callback for the object, so a
/// tag set by one callback is seen by the next. Returns false on abort.
fn iterate_one_object<H: Heap + ?Sized>(
    heap: &H,
    wrapper: &mut CallbackWrapper<'_>,
    obj: ObjectRef,
    callbacks: &mut IterationCallbacks<'_>,
) -> bool {
    if let Some(cb) = callbacks.object.as_mut() {
        let mut event = HeapObjectEvent {
            class_tag: wrapper.class_tag(),
            size: wrapper.size(),
            tag: wrapper.tag,
            length: array_length_of(heap, obj),
        };
        let flags = cb(&mut event);
        wrapper.tag = event.tag;
        if flags.contains(VisitFlags::ABORT) {
            return false;
        }
    }

    if let Some(cb) = callbacks.string_value.as_mut() {
        if heap.kind_of(obj) == ObjectKind::Instance && heap.is_string(obj) {
            let mut event = StringValueEvent {
                class_tag: wrapper.class_tag(),
                size: wrapper.size(),
                tag: wrapper.tag,
                value: heap.string_chars(obj),
            };
            let flags = cb(&mut event);
            wrapper.tag = event.tag;
            if flags.contains(VisitFlags::ABORT) {
                return false;
            }
        }
    }

    if let Some(cb) = callbacks.array_values.as_mut() {
        if heap.kind_of(obj) == ObjectKind::PrimitiveArray {
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
            if flags.contains(VisitFlags::ABORT) {
                return false;
            }
        }
    }

    if let Some(cb) = callbacks.primitive_field.as_mut() {
        if heap.kind_of(obj) == ObjectKind::Instance {
            // Class mirrors report their static fields, everything else its
            // instance fields.
            let (kind, map, owner) = match heap.as_class_descriptor(obj) {
                Some(desc) => (
                    RefKind::StaticField,
                    FieldMap::of_static_fields(heap, desc),
                    desc,
                ),
                None => {
                    if heap.is_class_mirror(obj) {
                        return true; // primitive mirror has no fields
                    }
                    let desc = heap.class_of(obj);
                    (RefKind::Field, FieldMap::of_instance_fields(heap, desc), obj)
                }
            };
            for field in map.fields() {
                let FieldKind::Primitive(ty) = field.kind else {
                    continue;
                };
                let mut event = PrimitiveFieldEvent {
                    kind,
                    index: field.index,
                    class_tag: wrapper.class_tag(),
                    tag: wrapper.tag,
                    value: heap.primitive_field(owner, field.offset, ty),
                };
                let flags = cb(&mut event);
                wrapper.tag = event.tag;
                if flags.contains(VisitFlags::ABORT) {
                    return false;
                }
            }
        }
    }

    true
}

// ============================================================================
// Walk state
// ============================================================================

enum Mode<'h> {
    Basic {
        callbacks: BasicCallbacks<'h>,
        last_referrer: Option<ObjectRef>,
        last_referrer_tag: Tag,
    },
    Advanced {
        callbacks: AdvancedCallbacks<'h>,
        heap_filter: HeapFilter,
        class_filter: Option<ObjectRef>,
    },
}

/// All state of one walk. Dropped when the walk ends, so abort cleanup is
/// unconditional.
struct Walk<'w, 'h, H: Heap + ?Sized> {
    heap: &'w H,
    store: &'w TagStore,
    mode: Mode<'h>,
    /// Whether object-to-object references are traversed at all.
    following: bool,
    visit_stack: Vec<ObjectRef>,
    marker: ObjectMarker,
    field_maps: FieldMapCache,
}

impl<H: Heap + ?Sized> Walk<'_, '_, H> {
    fn run(&mut self, initial: Option<ObjectRef>) {
        let rooted = match initial {
            Some(obj) => {
                self.visit_stack.push(obj);
                true
            }
            None => self.collect_simple_roots() && self.collect_stack_roots(),
        };
        if !rooted || !self.following {
            return;
        }
        while let Some(obj) = self.visit_stack.pop() {
            if self.marker.visited(obj) {
                continue;
            }
            if !self.visit(obj) {
                break;
            }
        }
    }

    fn collect_simple_roots(&mut self) -> bool {
        for obj in self.heap.global_handle_roots() {
            if self.heap.is_visible(obj) && !self.report_simple_root(RefKind::JniGlobal, obj) {
                return false;
            }
        }
        // System-class enumeration can surface plain objects; those are
        // reported as unclassified roots. Class descriptors are reported
        // through their mirror.
        for obj in self.heap.system_class_roots() {
            let (kind, reported) = if self.heap.is_class_descriptor(obj) {
                (RefKind::SystemClass, self.heap.mirror_of(obj))
            } else if self.heap.is_class_mirror(obj) {
                (RefKind::SystemClass, obj)
            } else {
                (RefKind::Other, obj)
            };
            if self.heap.is_visible(reported) && !self.report_simple_root(kind, reported) {
                return false;
            }
        }
        for obj in self.heap.monitor_roots() {
            if self.heap.is_visible(obj) && !self.report_simple_root(RefKind::Monitor, obj) {
                return false;
            }
        }
        for thread in self.heap.threads() {
            if self.heap.is_visible(thread.object)
                && !self.report_simple_root(RefKind::Thread, thread.object)
            {
                return false;
            }
        }
        for obj in self.heap.misc_roots() {
            if self.heap.is_visible(obj) && !self.report_simple_root(RefKind::Other, obj) {
                return false;
            }
        }
        for obj in self.heap.code_roots() {
            if self.heap.is_visible(obj) && !self.report_simple_root(RefKind::Other, obj) {
                return false;
            }
        }
        true
    }

    fn collect_stack_roots(&mut self) -> bool {
        for thread in self.heap.threads() {
            let thread_tag = self.store.get_tag(self.heap, thread.object);
            for stack_ref in self.heap.stack_refs(&thread) {
                if !self.heap.is_visible(stack_ref.object) {
                    continue;
                }
                if !self.report_stack_ref(&thread, thread_tag, &stack_ref) {
                    return false;
                }
            }
        }
        true
    }

    /// Expand one object: report its outgoing references according to its
    /// kind. Returns false when the walk should stop.
    fn visit(&mut self, obj: ObjectRef) -> bool {
        self.marker.mark(obj);
        match self.heap.kind_of(obj) {
            ObjectKind::Instance => {
                if self.heap.is_class_mirror(obj) {
                    // A primitive mirror has nothing to report.
                    self.heap
                        .as_class_descriptor(obj)
                        .is_none_or(|desc| self.iterate_over_class(desc))
                } else {
                    self.iterate_over_object(obj)
                }
            }
            ObjectKind::ObjectArray => self.iterate_over_array(obj),
            ObjectKind::PrimitiveArray => self.iterate_over_type_array(obj),
        }
    }

    fn iterate_over_object(&mut self, obj: ObjectRef) -> bool {
        let desc = self.heap.class_of(obj);
        if !self.report_class_reference(obj, self.heap.mirror_of(desc)) {
            return false;
        }
        let map = self.field_maps.instance_map(self.heap, desc);
        for field in map.fields() {
            match field.kind {
                FieldKind::Reference => {
                    if let Some(target) = self.heap.object_field(obj, field.offset) {
                        if self.heap.is_visible(target)
                            && !self.report_field_reference(obj, target, field.index)
                        {
                            return false;
                        }
                    }
                }
                FieldKind::Primitive(ty) => {
                    if self.reporting_primitive_fields() {
                        let value = self.heap.primitive_field(obj, field.offset, ty);
                        if !self.report_primitive_instance_field(obj, field.index, value) {
                            return false;
                        }
                    }
                }
            }
        }
        if self.reporting_string_values() && self.heap.is_string(obj) && !self.report_string_value(obj)
        {
            return false;
        }
        true
    }

    /// Report the class-structure references of a class, through its
    /// mirror. Unlinked classes have nothing to report.
    fn iterate_over_class(&mut self, desc: ObjectRef) -> bool {
        if !self.heap.is_linked(desc) {
            return true;
        }
        let mirror = self.heap.mirror_of(desc);

        if let Some(superclass) = self.heap.superclass(desc) {
            if !self.report_superclass_reference(mirror, self.heap.mirror_of(superclass)) {
                return false;
            }
        }
        if let Some(loader) = self.heap.class_loader(desc) {
            if self.heap.is_visible(loader) && !self.report_class_loader_reference(mirror, loader) {
                return false;
            }
        }
        if let Some(domain) = self.heap.protection_domain(desc) {
            if self.heap.is_visible(domain)
                && !self.report_protection_domain_reference(mirror, domain)
            {
                return false;
            }
        }
        if let Some(signers) = self.heap.signers(desc) {
            if self.heap.is_visible(signers) && !self.report_signers_reference(mirror, signers) {
                return false;
            }
        }
        for (index, entry) in self.heap.constant_pool_refs(desc) {
            if self.heap.is_visible(entry)
                && !self.report_constant_pool_reference(mirror, entry, index)
            {
                return false;
            }
        }
        for interface in self.heap.interfaces(desc) {
            if !self.report_interface_reference(mirror, self.heap.mirror_of(interface)) {
                return false;
            }
        }
        let map = FieldMap::of_static_fields(self.heap, desc);
        for field in map.fields() {
            match field.kind {
                FieldKind::Reference => {
                    if let Some(target) = self.heap.object_field(desc, field.offset) {
                        if self.heap.is_visible(target)
                            && !self.report_static_field_reference(mirror, target, field.index)
                        {
                            return false;
                        }
                    }
                }
                FieldKind::Primitive(ty) => {
                    if self.reporting_primitive_fields() {
                        let value = self.heap.primitive_field(desc, field.offset, ty);
                        if !self.report_primitive_static_field(mirror, field.index, value) {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    fn iterate_over_array(&mut self, obj: ObjectRef) -> bool {
        let mirror = self.heap.mirror_of(self.heap.class_of(obj));
        if !self.report_class_reference(obj, mirror) {
            return false;
        }
        for index in 0..self.heap.array_length(obj) {
            if let Some(element) = self.heap.array_element(obj, index) {
                if self.heap.is_visible(element)
                    && !self.report_array_element_reference(obj, element, index)
                {
                    return false;
                }
            }
        }
        true
    }

    fn iterate_over_type_array(&mut self, obj: ObjectRef) -> bool {
        let mirror = self.heap.mirror_of(self.heap.class_of(obj));
        if !self.report_class_reference(obj, mirror) {
            return false;
        }
        if self.reporting_array_values() && !self.report_primitive_array_values(obj) {
            return false;
        }
        true
    }
}
