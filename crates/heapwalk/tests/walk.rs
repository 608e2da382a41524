//! Walker behavior: protocols, filters, roots, and payload reporting.

use std::cell::RefCell;

use heapwalk::testing::MockHeap;
use heapwalk::{
    AdvancedCallbacks, BasicCallbacks, FieldKind, Heap, HeapFilter, HeapWalker, IterationCallbacks,
    IterationControl, MethodId, ObjectFilter, PrimitiveType, PrimitiveValue, RefInfo, RefKind,
    RootKind, TagStore, VisitFlags,
};

#[test]
fn test_walk_roots_reports_roots_and_edges() {
    let mut heap = MockHeap::new();
    let class = heap.define_class("A", None);
    heap.add_field(class, FieldKind::Reference, 0, false);
    let a = heap.alloc_instance(class);
    let b = heap.alloc_instance(class);
    heap.set_ref_field(a, 0, Some(b));
    heap.add_global_root(a);

    let store = TagStore::new();
    store.set_tag(&heap, a, 1);
    store.set_tag(&heap, b, 2);
    store.set_tag(&heap, heap.mirror_of(class), 100);

    let roots = RefCell::new(Vec::new());
    let edges = RefCell::new(Vec::new());
    let walker = HeapWalker::new(&heap, &store);
    walker.walk_roots(BasicCallbacks {
        root: Some(Box::new(|edge| {
            roots
                .borrow_mut()
                .push((edge.kind, edge.tag, edge.class_tag));
            IterationControl::Continue
        })),
        stack_ref: None,
        object_ref: Some(Box::new(|edge| {
            edges
                .borrow_mut()
                .push((edge.kind, edge.tag, edge.referrer_tag, edge.index));
            IterationControl::Continue
        })),
    });

    assert_eq!(roots.into_inner(), vec![(RootKind::JniGlobal, 1, 100)]);
    assert_eq!(
        edges.into_inner(),
        vec![
            (RefKind::Class, 100, 1, -1),
            (RefKind::Field, 2, 1, 0),
            (RefKind::Class, 100, 2, -1),
        ]
    );
}

#[test]
fn test_root_kinds() {
    let mut heap = MockHeap::new();
    let class = heap.define_class("A", None);
    let m = heap.alloc_instance(class);
    let x = heap.alloc_instance(class);
    let y = heap.alloc_instance(class);
    heap.add_monitor_root(m);
    heap.add_misc_root(x);
    heap.add_code_root(y);

    let store = TagStore::new();
    let kinds = RefCell::new(Vec::new());
    HeapWalker::new(&heap, &store).walk_roots(BasicCallbacks {
        root: Some(Box::new(|edge| {
            kinds.borrow_mut().push(edge.kind);
            IterationControl::Continue
        })),
        ..BasicCallbacks::default()
    });

    assert_eq!(
        kinds.into_inner(),
        vec![RootKind::Monitor, RootKind::Other, RootKind::Other]
    );
}

#[test]
fn test_system_class_roots_reported_via_mirror() {
    let mut heap = MockHeap::new();
    let class = heap.define_class("A", None);
    let plain = heap.alloc_instance(class);
    heap.add_system_class_root(class);
    heap.add_system_class_root(plain);

    let store = TagStore::new();
    store.set_tag(&heap, heap.mirror_of(class), 100);
    store.set_tag(&heap, plain, 5);

    let roots = RefCell::new(Vec::new());
    HeapWalker::new(&heap, &store).walk_roots(BasicCallbacks {
        root: Some(Box::new(|edge| {
            roots.borrow_mut().push((edge.kind, edge.tag));
            IterationControl::Continue
        })),
        ..BasicCallbacks::default()
    });

    assert_eq!(
        roots.into_inner(),
        vec![(RootKind::SystemClass, 100), (RootKind::Other, 5)]
    );
}

#[test]
fn test_stack_roots_basic() {
    let mut heap = MockHeap::new();
    let thread_class = heap.define_class("Thread", None);
    let class = heap.define_class("A", None);
    let thread = heap.add_thread(thread_class, 7);
    let x = heap.alloc_instance(class);
    let y = heap.alloc_instance(class);
    heap.add_stack_local(7, 2, Some(MethodId(5)), 10, 3, x);
    heap.add_jni_local(7, 1, None, y);

    let store = TagStore::new();
    store.set_tag(&heap, thread, 70);
    store.set_tag(&heap, x, 11);
    store.set_tag(&heap, y, 12);

    let roots = RefCell::new(Vec::new());
    let stack = RefCell::new(Vec::new());
    HeapWalker::new(&heap, &store).walk_roots(BasicCallbacks {
        root: Some(Box::new(|edge| {
            roots.borrow_mut().push((edge.kind, edge.tag));
            IterationControl::Continue
        })),
        stack_ref: Some(Box::new(|edge| {
            stack.borrow_mut().push((
                edge.kind,
                edge.tag,
                edge.thread_tag,
                edge.depth,
                edge.method,
                edge.slot,
            ));
            IterationControl::Continue
        })),
        object_ref: None,
    });

    assert_eq!(roots.into_inner(), vec![(RootKind::Thread, 70)]);
    assert_eq!(
        stack.into_inner(),
        vec![
            (RootKind::StackLocal, 11, 70, 2, Some(MethodId(5)), 3),
            (RootKind::JniLocal, 12, 70, 1, None, -1),
        ]
    );
}

#[test]
fn test_stack_roots_advanced_info() {
    let mut heap = MockHeap::new();
    let thread_class = heap.define_class("Thread", None);
    let class = heap.define_class("A", None);
    let thread = heap.add_thread(thread_class, 7);
    let x = heap.alloc_instance(class);
    heap.add_stack_local(7, 2, Some(MethodId(5)), 10, 3, x);

    let store = TagStore::new();
    store.set_tag(&heap, thread, 70);

    let events = RefCell::new(Vec::new());
    HeapWalker::new(&heap, &store).follow_references(
        HeapFilter::empty(),
        None,
        None,
        AdvancedCallbacks {
            reference: Some(Box::new(|r| {
                events.borrow_mut().push((r.kind, r.info));
                VisitFlags::empty()
            })),
            ..AdvancedCallbacks::default()
        },
    );

    assert_eq!(
        events.into_inner(),
        vec![
            (RefKind::Thread, None),
            (
                RefKind::StackLocal,
                Some(RefInfo::StackLocal {
                    thread_tag: 70,
                    thread_id: 7,
                    depth: 2,
                    method: Some(MethodId(5)),
                    location: 10,
                    slot: 3,
                })
            ),
        ]
    );
}

#[test]
fn test_walk_from_is_repeatable() {
    let mut heap = MockHeap::new();
    let class = heap.define_class("A", None);
    heap.add_field(class, FieldKind::Reference, 0, false);
    let a = heap.alloc_instance(class);
    let b = heap.alloc_instance(class);
    let c = heap.alloc_instance(class);
    heap.set_ref_field(a, 0, Some(b));
    heap.set_ref_field(b, 0, Some(c));

    let store = TagStore::new();
    store.set_tag(&heap, b, 2);
    store.set_tag(&heap, c, 3);

    let walker = HeapWalker::new(&heap, &store);
    let collect = || {
        let edges = RefCell::new(Vec::new());
        walker.walk_from(a, |edge| {
            edges.borrow_mut().push((edge.kind, edge.tag, edge.index));
            IterationControl::Continue
        });
        edges.into_inner()
    };

    let first = collect();
    let second = collect();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_basic_abort_stops_walk() {
    let mut heap = MockHeap::new();
    let class = heap.define_class("A", None);
    let a = heap.alloc_instance(class);
    let b = heap.alloc_instance(class);
    heap.add_global_root(a);
    heap.add_global_root(b);

    let store = TagStore::new();
    let roots = RefCell::new(0);
    let edges = RefCell::new(0);
    HeapWalker::new(&heap, &store).walk_roots(BasicCallbacks {
        root: Some(Box::new(|_| {
            *roots.borrow_mut() += 1;
            IterationControl::Abort
        })),
        stack_ref: None,
        object_ref: Some(Box::new(|_| {
            *edges.borrow_mut() += 1;
            IterationControl::Continue
        })),
    });

    assert_eq!(roots.into_inner(), 1);
    assert_eq!(edges.into_inner(), 0);
}

#[test]
fn test_ignore_prunes_traversal() {
    let mut heap = MockHeap::new();
    let class = heap.define_class("A", None);
    heap.add_field(class, FieldKind::Reference, 0, false);
    let a = heap.alloc_instance(class);
    let b = heap.alloc_instance(class);
    let c = heap.alloc_instance(class);
    heap.set_ref_field(a, 0, Some(b));
    heap.set_ref_field(b, 0, Some(c));

    let store = TagStore::new();
    store.set_tag(&heap, c, 3);

    // Ignore every Field edge: b is reported but never expanded, so no
    // reference to c is ever seen.
    let saw_c = RefCell::new(false);
    HeapWalker::new(&heap, &store).walk_from(a, |edge| {
        if edge.tag == 3 {
            *saw_c.borrow_mut() = true;
        }
        if edge.kind == RefKind::Field {
            IterationControl::Ignore
        } else {
            IterationControl::Continue
        }
    });
    assert!(!saw_c.into_inner());
}

#[test]
fn test_self_reference_updates_cached_referrer_tag() {
    let mut heap = MockHeap::new();
    let class = heap.define_class("S", None);
    heap.add_field(class, FieldKind::Reference, 0, false);
    heap.add_field(class, FieldKind::Reference, 8, false);
    let s = heap.alloc_instance(class);
    let o = heap.alloc_instance(class);
    heap.set_ref_field(s, 0, Some(s));
    heap.set_ref_field(s, 8, Some(o));

    let store = TagStore::new();
    let seen = RefCell::new(Vec::new());
    HeapWalker::new(&heap, &store).walk_from(s, |edge| {
        if edge.kind == RefKind::Field {
            if edge.index == 1 {
                // the self edge: tag the object through its own slot
                edge.tag = 7;
            } else {
                seen.borrow_mut().push(edge.referrer_tag);
            }
        }
        IterationControl::Continue
    });

    // the later edge from s sees the tag set during the self edge
    assert_eq!(seen.into_inner(), vec![7]);
    assert_eq!(store.get_tag(&heap, s), 7);
}

#[test]
fn test_advanced_self_reference_aliases_slots() {
    let mut heap = MockHeap::new();
    let class = heap.define_class("S", None);
    heap.add_field(class, FieldKind::Reference, 0, false);
    heap.add_field(class, FieldKind::Reference, 8, false);
    let s = heap.alloc_instance(class);
    let o = heap.alloc_instance(class);
    heap.set_ref_field(s, 0, Some(s));
    heap.set_ref_field(s, 8, Some(o));

    let store = TagStore::new();
    HeapWalker::new(&heap, &store).follow_references(
        HeapFilter::empty(),
        None,
        Some(s),
        AdvancedCallbacks {
            reference: Some(Box::new(|r| {
                if r.info == Some(RefInfo::Field { index: 1 }) {
                    assert_eq!(r.tag(), r.referrer_tag());
                    r.set_referrer_tag(9);
                    assert_eq!(r.tag(), 9);
                }
                VisitFlags::empty()
            })),
            ..AdvancedCallbacks::default()
        },
    );

    assert_eq!(store.get_tag(&heap, s), 9);
}

#[test]
fn test_heap_filter_suppresses_but_still_traverses() {
    let mut heap = MockHeap::new();
    let class = heap.define_class("A", None);
    heap.add_field(class, FieldKind::Reference, 0, false);
    let a = heap.alloc_instance(class);
    let b = heap.alloc_instance(class);
    let c = heap.alloc_instance(class);
    heap.set_ref_field(a, 0, Some(b));
    heap.set_ref_field(b, 0, Some(c));
    heap.add_global_root(a);

    let store = TagStore::new();
    store.set_tag(&heap, a, 1);
    store.set_tag(&heap, c, 3);

    let events = RefCell::new(Vec::new());
    HeapWalker::new(&heap, &store).follow_references(
        HeapFilter::UNTAGGED,
        None,
        None,
        AdvancedCallbacks {
            reference: Some(Box::new(|r| {
                events.borrow_mut().push((r.kind, r.tag(), r.referrer_tag()));
                VisitFlags::VISIT_OBJECTS
            })),
            ..AdvancedCallbacks::default()
        },
    );

    // b is untagged: its edges are suppressed, yet the edge out of b is
    // still discovered because b is traversed anyway.
    assert_eq!(
        events.into_inner(),
        vec![(RefKind::JniGlobal, 1, 0), (RefKind::Field, 3, 0)]
    );
}

#[test]
fn test_class_filter_reports_matching_targets_only() {
    let mut heap = MockHeap::new();
    let class_a = heap.define_class("A", None);
    let class_b = heap.define_class("B", None);
    heap.add_field(class_a, FieldKind::Reference, 0, false);
    heap.add_field(class_b, FieldKind::Reference, 0, false);
    let a1 = heap.alloc_instance(class_a);
    let b1 = heap.alloc_instance(class_b);
    let c1 = heap.alloc_instance(class_a);
    let b2 = heap.alloc_instance(class_b);
    heap.set_ref_field(a1, 0, Some(b1));
    heap.set_ref_field(b1, 0, Some(c1));
    heap.set_ref_field(c1, 0, Some(b2));
    heap.add_global_root(a1);

    let store = TagStore::new();
    store.set_tag(&heap, a1, 1);
    store.set_tag(&heap, b1, 10);
    store.set_tag(&heap, b2, 20);

    let events = RefCell::new(Vec::new());
    HeapWalker::new(&heap, &store).follow_references(
        HeapFilter::empty(),
        Some(class_b),
        None,
        AdvancedCallbacks {
            reference: Some(Box::new(|r| {
                events.borrow_mut().push((r.kind, r.tag(), r.referrer_tag()));
                VisitFlags::VISIT_OBJECTS
            })),
            ..AdvancedCallbacks::default()
        },
    );

    // only references whose target is a B instance are reported; the
    // filtered A instances are still traversed to reach b2
    assert_eq!(
        events.into_inner(),
        vec![(RefKind::Field, 10, 1), (RefKind::Field, 20, 0)]
    );
}

#[test]
fn test_advanced_abort_stops_walk() {
    let mut heap = MockHeap::new();
    let class = heap.define_class("A", None);
    heap.add_field(class, FieldKind::Reference, 0, false);
    let a = heap.alloc_instance(class);
    let b = heap.alloc_instance(class);
    heap.set_ref_field(a, 0, Some(b));

    let store = TagStore::new();
    let count = RefCell::new(0);
    HeapWalker::new(&heap, &store).follow_references(
        HeapFilter::empty(),
        None,
        Some(a),
        AdvancedCallbacks {
            reference: Some(Box::new(|_| {
                *count.borrow_mut() += 1;
                VisitFlags::ABORT
            })),
            ..AdvancedCallbacks::default()
        },
    );
    assert_eq!(count.into_inner(), 1);
}

#[test]
fn test_class_structure_references() {
    let mut heap = MockHeap::new();
    let base = heap.define_class("Base", None);
    let iface = heap.define_class("Iface", None);
    let holder = heap.define_class("Holder", None);
    let sub = heap.define_class("Sub", Some(base));
    let loader = heap.alloc_instance(holder);
    let domain = heap.alloc_instance(holder);
    let signers = heap.alloc_obj_array(holder, 0);
    let pool_entry = heap.alloc_instance(holder);
    let static_target = heap.alloc_instance(holder);

    heap.set_interfaces(sub, vec![iface]);
    heap.set_class_loader(sub, loader);
    heap.set_protection_domain(sub, domain);
    heap.set_signers(sub, signers);
    heap.add_constant_pool_ref(sub, 12, pool_entry);
    heap.add_field(sub, FieldKind::Reference, 0, true);
    heap.add_field(sub, FieldKind::Reference, 8, false);
    heap.set_static_ref_field(sub, 0, Some(static_target));

    let store = TagStore::new();
    let events = RefCell::new(Vec::new());
    HeapWalker::new(&heap, &store).follow_references(
        HeapFilter::empty(),
        None,
        Some(heap.mirror_of(sub)),
        AdvancedCallbacks {
            reference: Some(Box::new(|r| {
                events.borrow_mut().push((r.kind, r.info));
                VisitFlags::empty()
            })),
            ..AdvancedCallbacks::default()
        },
    );

    assert_eq!(
        events.into_inner(),
        vec![
            (RefKind::Superclass, None),
            (RefKind::ClassLoader, None),
            (RefKind::ProtectionDomain, None),
            (RefKind::Signers, None),
            (RefKind::ConstantPool, Some(RefInfo::ConstantPool { index: 12 })),
            (RefKind::Interface, None),
            (
                RefKind::StaticField,
                Some(RefInfo::StaticField { index: 1 })
            ),
        ]
    );
}

#[test]
fn test_unlinked_class_emits_nothing() {
    let mut heap = MockHeap::new();
    let base = heap.define_class("Base", None);
    let sub = heap.define_class("Sub", Some(base));
    heap.add_field(sub, FieldKind::Reference, 0, true);
    heap.set_unlinked(sub);

    let store = TagStore::new();
    let count = RefCell::new(0);
    HeapWalker::new(&heap, &store).follow_references(
        HeapFilter::empty(),
        None,
        Some(heap.mirror_of(sub)),
        AdvancedCallbacks {
            reference: Some(Box::new(|_| {
                *count.borrow_mut() += 1;
                VisitFlags::VISIT_OBJECTS
            })),
            ..AdvancedCallbacks::default()
        },
    );
    assert_eq!(count.into_inner(), 0);
}

#[test]
fn test_primitive_mirror_emits_nothing() {
    let mut heap = MockHeap::new();
    let mirror = heap.define_primitive_mirror();

    let store = TagStore::new();
    let count = RefCell::new(0);
    HeapWalker::new(&heap, &store).follow_references(
        HeapFilter::empty(),
        None,
        Some(mirror),
        AdvancedCallbacks {
            reference: Some(Box::new(|_| {
                *count.borrow_mut() += 1;
                VisitFlags::VISIT_OBJECTS
            })),
            ..AdvancedCallbacks::default()
        },
    );
    assert_eq!(count.into_inner(), 0);
}

#[test]
fn test_invisible_objects_skipped() {
    let mut heap = MockHeap::new();
    let class = heap.define_class("A", None);
    heap.add_field(class, FieldKind::Reference, 0, false);
    let a = heap.alloc_instance(class);
    let b = heap.alloc_instance(class);
    let c = heap.alloc_instance(class);
    heap.set_ref_field(a, 0, Some(b));
    heap.set_ref_field(b, 0, Some(c));
    heap.add_global_root(a);
    heap.add_global_root(b);
    heap.set_invisible(b);

    let store = TagStore::new();
    store.set_tag(&heap, c, 3);

    let roots = RefCell::new(0);
    let edges = RefCell::new(Vec::new());
    HeapWalker::new(&heap, &store).walk_roots(BasicCallbacks {
        root: Some(Box::new(|_| {
            *roots.borrow_mut() += 1;
            IterationControl::Continue
        })),
        stack_ref: None,
        object_ref: Some(Box::new(|edge| {
            edges.borrow_mut().push((edge.kind, edge.tag));
            IterationControl::Continue
        })),
    });

    // the invisible root is dropped, the edge into b is dropped, and b is
    // never expanded so c stays unreported
    assert_eq!(roots.into_inner(), 1);
    assert_eq!(edges.into_inner(), vec![(RefKind::Class, 0)]);
}

#[test]
fn test_primitive_field_reporting() {
    let mut heap = MockHeap::new();
    let class = heap.define_class("P", None);
    heap.add_field(class, FieldKind::Reference, 0, false);
    heap.add_field(class, FieldKind::Primitive(PrimitiveType::Int), 8, false);
    heap.add_field(class, FieldKind::Primitive(PrimitiveType::Long), 16, true);
    let p = heap.alloc_instance(class);
    heap.set_prim_field(p, 8, PrimitiveValue::Int(42));
    heap.set_static_prim_field(class, 16, PrimitiveValue::Long(7));

    let store = TagStore::new();
    let events = RefCell::new(Vec::new());
    HeapWalker::new(&heap, &store).follow_references(
        HeapFilter::empty(),
        None,
        Some(p),
        AdvancedCallbacks {
            reference: Some(Box::new(|_| VisitFlags::VISIT_OBJECTS)),
            primitive_field: Some(Box::new(|event| {
                events
                    .borrow_mut()
                    .push((event.kind, event.index, event.value));
                VisitFlags::empty()
            })),
            ..AdvancedCallbacks::default()
        },
    );

    assert_eq!(
        events.into_inner(),
        vec![
            (RefKind::Field, 1, PrimitiveValue::Int(42)),
            (RefKind::StaticField, 0, PrimitiveValue::Long(7)),
        ]
    );
}

#[test]
fn test_string_value_reporting() {
    let mut heap = MockHeap::new();
    let class = heap.define_class("String", None);
    let s = heap.alloc_string(class, "hi");

    let store = TagStore::new();
    let values = RefCell::new(Vec::new());
    HeapWalker::new(&heap, &store).follow_references(
        HeapFilter::empty(),
        None,
        Some(s),
        AdvancedCallbacks {
            string_value: Some(Box::new(|event| {
                values.borrow_mut().push(event.value.clone());
                VisitFlags::empty()
            })),
            ..AdvancedCallbacks::default()
        },
    );

    let expected: Vec<u16> = "hi".encode_utf16().collect();
    assert_eq!(values.into_inner(), vec![expected]);
}

#[test]
fn test_array_values_reporting() {
    let mut heap = MockHeap::new();
    let class = heap.define_class("[I", None);
    let arr = heap.alloc_prim_array(
        class,
        PrimitiveType::Int,
        vec![PrimitiveValue::Int(1), PrimitiveValue::Int(2)],
    );

    let store = TagStore::new();
    let events = RefCell::new(Vec::new());
    HeapWalker::new(&heap, &store).follow_references(
        HeapFilter::empty(),
        None,
        Some(arr),
        AdvancedCallbacks {
            array_values: Some(Box::new(|event| {
                events
                    .borrow_mut()
                    .push((event.element_type, event.values.clone()));
                VisitFlags::empty()
            })),
            ..AdvancedCallbacks::default()
        },
    );

    assert_eq!(
        events.into_inner(),
        vec![(
            PrimitiveType::Int,
            vec![PrimitiveValue::Int(1), PrimitiveValue::Int(2)]
        )]
    );
}

#[test]
fn test_array_element_references() {
    let mut heap = MockHeap::new();
    let class = heap.define_class("A", None);
    let arr_class = heap.define_class("[A", None);
    let a = heap.alloc_instance(class);
    let arr = heap.alloc_obj_array(arr_class, 3);
    heap.set_element(arr, 2, Some(a));

    let store = TagStore::new();
    store.set_tag(&heap, a, 1);

    let events = RefCell::new(Vec::new());
    HeapWalker::new(&heap, &store).walk_from(arr, |edge| {
        if edge.kind == RefKind::ArrayElement {
            events.borrow_mut().push((edge.tag, edge.index));
        }
        IterationControl::Continue
    });

    assert_eq!(events.into_inner(), vec![(1, 2)]);
}

#[test]
fn test_iterate_over_heap_filters() {
    let mut heap = MockHeap::new();
    let class_a = heap.define_class("A", None);
    let class_b = heap.define_class("B", Some(class_a));
    let a = heap.alloc_instance(class_a);
    let _b = heap.alloc_instance(class_b);

    let store = TagStore::new();
    store.set_tag(&heap, a, 1);
    let walker = HeapWalker::new(&heap, &store);

    let tagged = RefCell::new(Vec::new());
    walker.iterate_over_heap(ObjectFilter::Tagged, None, |event| {
        tagged.borrow_mut().push(event.tag);
        IterationControl::Continue
    });
    assert_eq!(tagged.into_inner(), vec![1]);

    // subtype filter: only the untagged B instance matches
    let count = RefCell::new(0);
    walker.iterate_over_heap(ObjectFilter::Untagged, Some(class_a), |_| {
        *count.borrow_mut() += 1;
        IterationControl::Continue
    });
    assert_eq!(count.into_inner(), 1);

    // no filters: every visible object, mirrors included
    let all = RefCell::new(0);
    walker.iterate_over_heap(ObjectFilter::Either, None, |_| {
        *all.borrow_mut() += 1;
        IterationControl::Continue
    });
    assert_eq!(all.into_inner(), 5);
}

#[test]
fn test_iterate_over_heap_abort() {
    let mut heap = MockHeap::new();
    let class = heap.define_class("A", None);
    heap.alloc_instance(class);
    heap.alloc_instance(class);

    let store = TagStore::new();
    let count = RefCell::new(0);
    HeapWalker::new(&heap, &store).iterate_over_heap(ObjectFilter::Either, None, |_| {
        *count.borrow_mut() += 1;
        IterationControl::Abort
    });
    assert_eq!(count.into_inner(), 1);
}

#[test]
fn test_iterate_through_heap_with_primitive_callbacks() {
    let mut heap = MockHeap::new();
    let class_a = heap.define_class("A", None);
    heap.add_field(class_a, FieldKind::Primitive(PrimitiveType::Int), 0, false);
    let class_s = heap.define_class("S", None);
    heap.add_field(class_s, FieldKind::Primitive(PrimitiveType::Int), 0, true);
    heap.set_static_prim_field(class_s, 0, PrimitiveValue::Int(9));
    let a = heap.alloc_instance(class_a);
    heap.set_prim_field(a, 0, PrimitiveValue::Int(5));
    let _untagged = heap.alloc_instance(class_a);

    let store = TagStore::new();
    store.set_tag(&heap, a, 1);
    store.set_tag(&heap, heap.mirror_of(class_s), 2);

    let objects = RefCell::new(Vec::new());
    let fields = RefCell::new(Vec::new());
    HeapWalker::new(&heap, &store).iterate_through_heap(
        HeapFilter::UNTAGGED,
        None,
        IterationCallbacks {
            object: Some(Box::new(|event| {
                objects.borrow_mut().push(event.tag);
                VisitFlags::empty()
            })),
            primitive_field: Some(Box::new(|event| {
                fields
                    .borrow_mut()
                    .push((event.kind, event.index, event.value));
                VisitFlags::empty()
            })),
            ..IterationCallbacks::default()
        },
    );

    // heap order: the tagged mirror of S, then the tagged instance of A
    assert_eq!(objects.into_inner(), vec![2, 1]);
    assert_eq!(
        fields.into_inner(),
        vec![
            (RefKind::StaticField, 0, PrimitiveValue::Int(9)),
            (RefKind::Field, 0, PrimitiveValue::Int(5)),
        ]
    );
}

#[test]
fn test_tags_set_during_walk_are_committed() {
    let mut heap = MockHeap::new();
    let class = heap.define_class("A", None);
    heap.add_field(class, FieldKind::Reference, 0, false);
    let a = heap.alloc_instance(class);
    let b = heap.alloc_instance(class);
    heap.set_ref_field(a, 0, Some(b));

    let store = TagStore::new();
    HeapWalker::new(&heap, &store).walk_from(a, |edge| {
        if edge.kind == RefKind::Field {
            edge.tag = 33;
        }
        IterationControl::Continue
    });

    assert_eq!(store.get_tag(&heap, b), 33);
    assert_eq!(store.get_tag(&heap, a), 0);
}
