//! An in-memory [`Heap`] implementation for tests and benches.
//!
//! `MockHeap` models just enough of a managed heap to exercise tagging and
//! walking: classes with descriptors and mirrors, instances with reference
//! and primitive fields, arrays, strings, threads, and every root category.
//! Build the object graph with the `define_*`/`alloc_*` methods, then hand
//! the heap to a [`TagStore`](crate::TagStore) or
//! [`HeapWalker`](crate::HeapWalker).

use rustc_hash::{FxHashMap, FxHashSet};

use crate::heap::{
    DeclaredField, FieldKind, Heap, MethodId, ObjectKind, ObjectRef, PrimitiveType, PrimitiveValue,
    StackRef, StackRefKind, ThreadDescriptor,
};

#[derive(Debug)]
enum Slot {
    Ref(Option<ObjectRef>),
    Prim(PrimitiveValue),
}

#[derive(Debug)]
struct ClassData {
    #[allow(dead_code)]
    name: String,
    mirror: ObjectRef,
    superclass: Option<ObjectRef>,
    interfaces: Vec<ObjectRef>,
    loader: Option<ObjectRef>,
    protection_domain: Option<ObjectRef>,
    signers: Option<ObjectRef>,
    constant_pool: Vec<(i32, ObjectRef)>,
    fields: Vec<DeclaredField>,
    static_values: FxHashMap<u32, Slot>,
    linked: bool,
}

#[derive(Debug)]
enum ObjectData {
    Instance {
        class: ObjectRef,
        fields: FxHashMap<u32, Slot>,
        string: Option<Vec<u16>>,
    },
    Mirror {
        desc: Option<ObjectRef>,
    },
    ObjArray {
        class: ObjectRef,
        elements: Vec<Option<ObjectRef>>,
    },
    PrimArray {
        class: ObjectRef,
        ty: PrimitiveType,
        values: Vec<PrimitiveValue>,
    },
}

/// A scriptable heap. See the module docs.
#[derive(Debug)]
pub struct MockHeap {
    classes: FxHashMap<ObjectRef, ClassData>,
    objects: FxHashMap<ObjectRef, ObjectData>,
    iteration_order: Vec<ObjectRef>,
    invisible: FxHashSet<ObjectRef>,
    global_roots: Vec<ObjectRef>,
    system_classes: Vec<ObjectRef>,
    monitor_roots: Vec<ObjectRef>,
    misc_roots: Vec<ObjectRef>,
    code_roots: Vec<ObjectRef>,
    threads: Vec<ThreadDescriptor>,
    stack_refs: FxHashMap<i64, Vec<StackRef>>,
    class_class: ObjectRef,
    next_addr: u64,
}

impl MockHeap {
    /// A heap containing only the class-of-classes and its mirror.
    #[must_use]
    pub fn new() -> Self {
        let desc = ObjectRef::from_addr(0x1000).expect("nonzero");
        let mirror = ObjectRef::from_addr(0x1010).expect("nonzero");
        let mut heap = Self {
            classes: FxHashMap::default(),
            objects: FxHashMap::default(),
            iteration_order: Vec::new(),
            invisible: FxHashSet::default(),
            global_roots: Vec::new(),
            system_classes: Vec::new(),
            monitor_roots: Vec::new(),
            misc_roots: Vec::new(),
            code_roots: Vec::new(),
            threads: Vec::new(),
            stack_refs: FxHashMap::default(),
            class_class: desc,
            next_addr: 0x1020,
        };
        heap.classes.insert(desc, blank_class("Class", mirror, None));
        heap.objects
            .insert(mirror, ObjectData::Mirror { desc: Some(desc) });
        heap.iteration_order.push(mirror);
        heap
    }

    fn fresh_ref(&mut self) -> ObjectRef {
        let addr = self.next_addr;
        self.next_addr += 16;
        ObjectRef::from_addr(addr).expect("nonzero")
    }

    // --- class building ---

    /// Define a class; returns its descriptor. The mirror is allocated too.
    pub fn define_class(&mut self, name: &str, superclass: Option<ObjectRef>) -> ObjectRef {
        let desc = self.fresh_ref();
        let mirror = self.fresh_ref();
        self.classes
            .insert(desc, blank_class(name, mirror, superclass));
        self.objects
            .insert(mirror, ObjectData::Mirror { desc: Some(desc) });
        self.iteration_order.push(mirror);
        desc
    }

    /// Allocate a mirror with no class behind it, like a primitive type's.
    pub fn define_primitive_mirror(&mut self) -> ObjectRef {
        let mirror = self.fresh_ref();
        self.objects.insert(mirror, ObjectData::Mirror { desc: None });
        self.iteration_order.push(mirror);
        mirror
    }

    fn class_mut(&mut self, desc: ObjectRef) -> &mut ClassData {
        self.classes.get_mut(&desc).expect("unknown class")
    }

    /// Mark a class as not yet linked.
    pub fn set_unlinked(&mut self, desc: ObjectRef) {
        self.class_mut(desc).linked = false;
    }

    /// Append a field to the class's declaration stream.
    pub fn add_field(&mut self, desc: ObjectRef, kind: FieldKind, offset: u32, is_static: bool) {
        self.class_mut(desc).fields.push(DeclaredField {
            kind,
            offset,
            is_static,
        });
    }

    /// Set a class's interfaces.
    pub fn set_interfaces(&mut self, desc: ObjectRef, interfaces: Vec<ObjectRef>) {
        self.class_mut(desc).interfaces = interfaces;
    }

    /// Set a class's defining loader.
    pub fn set_class_loader(&mut self, desc: ObjectRef, loader: ObjectRef) {
        self.class_mut(desc).loader = Some(loader);
    }

    /// Set a class's protection domain.
    pub fn set_protection_domain(&mut self, desc: ObjectRef, domain: ObjectRef) {
        self.class_mut(desc).protection_domain = Some(domain);
    }

    /// Set a class's signers array.
    pub fn set_signers(&mut self, desc: ObjectRef, signers: ObjectRef) {
        self.class_mut(desc).signers = Some(signers);
    }

    /// Add a heap-resident constant-pool entry.
    pub fn add_constant_pool_ref(&mut self, desc: ObjectRef, index: i32, entry: ObjectRef) {
        self.class_mut(desc).constant_pool.push((index, entry));
    }

    /// Write a static reference field.
    pub fn set_static_ref_field(&mut self, desc: ObjectRef, offset: u32, value: Option<ObjectRef>) {
        self.class_mut(desc)
            .static_values
            .insert(offset, Slot::Ref(value));
    }

    /// Write a static primitive field.
    pub fn set_static_prim_field(&mut self, desc: ObjectRef, offset: u32, value: PrimitiveValue) {
        self.class_mut(desc)
            .static_values
            .insert(offset, Slot::Prim(value));
    }

    // --- object allocation ---

    /// Allocate an instance of `class`.
    pub fn alloc_instance(&mut self, class: ObjectRef) -> ObjectRef {
        let obj = self.fresh_ref();
        self.objects.insert(
            obj,
            ObjectData::Instance {
                class,
                fields: FxHashMap::default(),
                string: None,
            },
        );
        self.iteration_order.push(obj);
        obj
    }

    /// Allocate a string instance of `class` with the given contents.
    pub fn alloc_string(&mut self, class: ObjectRef, value: &str) -> ObjectRef {
        let obj = self.fresh_ref();
        self.objects.insert(
            obj,
            ObjectData::Instance {
                class,
                fields: FxHashMap::default(),
                string: Some(value.encode_utf16().collect()),
            },
        );
        self.iteration_order.push(obj);
        obj
    }

    /// Allocate an object array of `class` with `len` null slots.
    pub fn alloc_obj_array(&mut self, class: ObjectRef, len: usize) -> ObjectRef {
        let obj = self.fresh_ref();
        self.objects.insert(
            obj,
            ObjectData::ObjArray {
                class,
                elements: vec![None; len],
            },
        );
        self.iteration_order.push(obj);
        obj
    }

    /// Allocate a primitive array of `class` with the given values.
    pub fn alloc_prim_array(
        &mut self,
        class: ObjectRef,
        ty: PrimitiveType,
        values: Vec<PrimitiveValue>,
    ) -> ObjectRef {
        let obj = self.fresh_ref();
        self.objects
            .insert(obj, ObjectData::PrimArray { class, ty, values });
        self.iteration_order.push(obj);
        obj
    }

    /// Write an instance reference field.
    pub fn set_ref_field(&mut self, obj: ObjectRef, offset: u32, value: Option<ObjectRef>) {
        match self.objects.get_mut(&obj) {
            Some(ObjectData::Instance { fields, .. }) => {
                fields.insert(offset, Slot::Ref(value));
            }
            _ => panic!("not an instance"),
        }
    }

    /// Write an instance primitive field.
    pub fn set_prim_field(&mut self, obj: ObjectRef, offset: u32, value: PrimitiveValue) {
        match self.objects.get_mut(&obj) {
            Some(ObjectData::Instance { fields, .. }) => {
                fields.insert(offset, Slot::Prim(value));
            }
            _ => panic!("not an instance"),
        }
    }

    /// Store into an object array slot.
    pub fn set_element(&mut self, arr: ObjectRef, index: usize, value: Option<ObjectRef>) {
        match self.objects.get_mut(&arr) {
            Some(ObjectData::ObjArray { elements, .. }) => elements[index] = value,
            _ => panic!("not an object array"),
        }
    }

    /// Hide an object from reports.
    pub fn set_invisible(&mut self, obj: ObjectRef) {
        self.invisible.insert(obj);
    }

    // --- roots ---

    /// Add an external global handle root.
    pub fn add_global_root(&mut self, obj: ObjectRef) {
        self.global_roots.push(obj);
    }

    /// Add a system-class root (a descriptor, mirror, or plain object).
    pub fn add_system_class_root(&mut self, obj: ObjectRef) {
        self.system_classes.push(obj);
    }

    /// Add a monitor root.
    pub fn add_monitor_root(&mut self, obj: ObjectRef) {
        self.monitor_roots.push(obj);
    }

    /// Add a miscellaneous root.
    pub fn add_misc_root(&mut self, obj: ObjectRef) {
        self.misc_roots.push(obj);
    }

    /// Add a compiled-code root.
    pub fn add_code_root(&mut self, obj: ObjectRef) {
        self.code_roots.push(obj);
    }

    /// Register a live thread of `class`; returns its thread object.
    pub fn add_thread(&mut self, class: ObjectRef, thread_id: i64) -> ObjectRef {
        let obj = self.alloc_instance(class);
        self.threads.push(ThreadDescriptor {
            object: obj,
            thread_id,
        });
        obj
    }

    /// Add a stack-local reference to a thread's stack.
    pub fn add_stack_local(
        &mut self,
        thread_id: i64,
        depth: i32,
        method: Option<MethodId>,
        location: i64,
        slot: i32,
        object: ObjectRef,
    ) {
        self.stack_refs.entry(thread_id).or_default().push(StackRef {
            kind: StackRefKind::Local { location, slot },
            depth,
            method,
            object,
        });
    }

    /// Add a native-interface local to a thread's stack.
    pub fn add_jni_local(
        &mut self,
        thread_id: i64,
        depth: i32,
        method: Option<MethodId>,
        object: ObjectRef,
    ) {
        self.stack_refs.entry(thread_id).or_default().push(StackRef {
            kind: StackRefKind::JniLocal,
            depth,
            method,
            object,
        });
    }

    fn data(&self, obj: ObjectRef) -> &ObjectData {
        self.objects.get(&obj).expect("unknown object")
    }

    fn class_data(&self, desc: ObjectRef) -> &ClassData {
        self.classes.get(&desc).expect("unknown class")
    }
}

impl Default for MockHeap {
    fn default() -> Self {
        Self::new()
    }
}

fn blank_class(name: &str, mirror: ObjectRef, superclass: Option<ObjectRef>) -> ClassData {
    ClassData {
        name: name.to_owned(),
        mirror,
        superclass,
        interfaces: Vec::new(),
        loader: None,
        protection_domain: None,
        signers: None,
        constant_pool: Vec::new(),
        fields: Vec::new(),
        static_values: FxHashMap::default(),
        linked: true,
    }
}

fn zero_of(ty: PrimitiveType) -> PrimitiveValue {
    match ty {
        PrimitiveType::Boolean => PrimitiveValue::Boolean(false),
        PrimitiveType::Byte => PrimitiveValue::Byte(0),
        PrimitiveType::Char => PrimitiveValue::Char(0),
        PrimitiveType::Short => PrimitiveValue::Short(0),
        PrimitiveType::Int => PrimitiveValue::Int(0),
        PrimitiveType::Long => PrimitiveValue::Long(0),
        PrimitiveType::Float => PrimitiveValue::Float(0.0),
        PrimitiveType::Double => PrimitiveValue::Double(0.0),
    }
}

impl Heap for MockHeap {
    fn object_size(&self, obj: ObjectRef) -> u64 {
        match self.data(obj) {
            ObjectData::Instance { .. } => 32,
            ObjectData::Mirror { .. } => 96,
            ObjectData::ObjArray { elements, .. } => 16 + 8 * elements.len() as u64,
            ObjectData::PrimArray { values, .. } => 16 + 8 * values.len() as u64,
        }
    }

    fn class_of(&self, obj: ObjectRef) -> ObjectRef {
        match self.data(obj) {
            ObjectData::Instance { class, .. }
            | ObjectData::ObjArray { class, .. }
            | ObjectData::PrimArray { class, .. } => *class,
            ObjectData::Mirror { .. } => self.class_class,
        }
    }

    fn kind_of(&self, obj: ObjectRef) -> ObjectKind {
        match self.data(obj) {
            ObjectData::Instance { .. } | ObjectData::Mirror { .. } => ObjectKind::Instance,
            ObjectData::ObjArray { .. } => ObjectKind::ObjectArray,
            ObjectData::PrimArray { .. } => ObjectKind::PrimitiveArray,
        }
    }

    fn is_visible(&self, obj: ObjectRef) -> bool {
        !self.invisible.contains(&obj)
    }

    fn is_instance_of(&self, obj: ObjectRef, desc: ObjectRef) -> bool {
        let mut cursor = Some(self.class_of(obj));
        while let Some(class) = cursor {
            if class == desc {
                return true;
            }
            cursor = self.class_data(class).superclass;
        }
        false
    }

    fn is_class_mirror(&self, obj: ObjectRef) -> bool {
        matches!(self.data(obj), ObjectData::Mirror { .. })
    }

    fn as_class_descriptor(&self, obj: ObjectRef) -> Option<ObjectRef> {
        match self.objects.get(&obj) {
            Some(ObjectData::Mirror { desc }) => *desc,
            _ => None,
        }
    }

    fn is_class_descriptor(&self, obj: ObjectRef) -> bool {
        self.classes.contains_key(&obj)
    }

    fn mirror_of(&self, desc: ObjectRef) -> ObjectRef {
        self.class_data(desc).mirror
    }

    fn is_linked(&self, desc: ObjectRef) -> bool {
        self.class_data(desc).linked
    }

    fn superclass(&self, desc: ObjectRef) -> Option<ObjectRef> {
        self.class_data(desc).superclass
    }

    fn interfaces(&self, desc: ObjectRef) -> Vec<ObjectRef> {
        self.class_data(desc).interfaces.clone()
    }

    fn class_loader(&self, desc: ObjectRef) -> Option<ObjectRef> {
        self.class_data(desc).loader
    }

    fn protection_domain(&self, desc: ObjectRef) -> Option<ObjectRef> {
        self.class_data(desc).protection_domain
    }

    fn signers(&self, desc: ObjectRef) -> Option<ObjectRef> {
        self.class_data(desc).signers
    }

    fn constant_pool_refs(&self, desc: ObjectRef) -> Vec<(i32, ObjectRef)> {
        self.class_data(desc).constant_pool.clone()
    }

    fn declared_fields(&self, desc: ObjectRef, include_inherited: bool) -> Vec<DeclaredField> {
        if !include_inherited {
            return self.class_data(desc).fields.clone();
        }
        let mut chain = Vec::new();
        let mut cursor = Some(desc);
        while let Some(class) = cursor {
            chain.push(class);
            cursor = self.class_data(class).superclass;
        }
        // base-most class first
        chain
            .iter()
            .rev()
            .flat_map(|class| self.class_data(*class).fields.iter().copied())
            .collect()
    }

    fn object_field(&self, owner: ObjectRef, offset: u32) -> Option<ObjectRef> {
        let slot = if let Some(class) = self.classes.get(&owner) {
            class.static_values.get(&offset)
        } else {
            match self.data(owner) {
                ObjectData::Instance { fields, .. } => fields.get(&offset),
                _ => None,
            }
        };
        match slot {
            Some(Slot::Ref(value)) => *value,
            _ => None,
        }
    }

    fn primitive_field(&self, owner: ObjectRef, offset: u32, ty: PrimitiveType) -> PrimitiveValue {
        let slot = if let Some(class) = self.classes.get(&owner) {
            class.static_values.get(&offset)
        } else {
            match self.data(owner) {
                ObjectData::Instance { fields, .. } => fields.get(&offset),
                _ => None,
            }
        };
        match slot {
            Some(Slot::Prim(value)) => *value,
            _ => zero_of(ty),
        }
    }

    fn array_length(&self, obj: ObjectRef) -> i32 {
        let len = match self.data(obj) {
            ObjectData::ObjArray { elements, .. } => elements.len(),
            ObjectData::PrimArray { values, .. } => values.len(),
            _ => 0,
        };
        i32::try_from(len).expect("array too large")
    }

    fn array_element(&self, obj: ObjectRef, index: i32) -> Option<ObjectRef> {
        match self.data(obj) {
            ObjectData::ObjArray { elements, .. } => {
                elements[usize::try_from(index).expect("negative index")]
            }
            _ => None,
        }
    }

    fn primitive_array_values(&self, obj: ObjectRef) -> (PrimitiveType, Vec<PrimitiveValue>) {
        match self.data(obj) {
            ObjectData::PrimArray { ty, values, .. } => (*ty, values.clone()),
            _ => panic!("not a primitive array"),
        }
    }

    fn is_string(&self, obj: ObjectRef) -> bool {
        matches!(
            self.data(obj),
            ObjectData::Instance {
                string: Some(_),
                ..
            }
        )
    }

    fn string_chars(&self, obj: ObjectRef) -> Vec<u16> {
        match self.data(obj) {
            ObjectData::Instance {
                string: Some(chars),
                ..
            } => chars.clone(),
            _ => Vec::new(),
        }
    }

    fn global_handle_roots(&self) -> Vec<ObjectRef> {
        self.global_roots.clone()
    }

    fn system_class_roots(&self) -> Vec<ObjectRef> {
        self.system_classes.clone()
    }

    fn monitor_roots(&self) -> Vec<ObjectRef> {
        self.monitor_roots.clone()
    }

    fn misc_roots(&self) -> Vec<ObjectRef> {
        self.misc_roots.clone()
    }

    fn code_roots(&self) -> Vec<ObjectRef> {
        self.code_roots.clone()
    }

    fn threads(&self) -> Vec<ThreadDescriptor> {
        self.threads.clone()
    }

    fn stack_refs(&self, thread: &ThreadDescriptor) -> Vec<StackRef> {
        self.stack_refs
            .get(&thread.thread_id)
            .cloned()
            .unwrap_or_default()
    }

    fn each_object(&self, f: &mut dyn FnMut(ObjectRef)) {
        for obj in &self.iteration_order {
            f(*obj);
        }
    }
}
