//! Object identity and the heap collaborator interface.
//!
//! Everything this crate knows about the managed heap flows through the
//! [`Heap`] trait: object layout, the class model, root enumeration, and
//! thread stacks. The host VM implements it; this crate never inspects
//! memory directly.

use std::num::NonZeroU64;

/// A user-assigned object tag. Zero means "untagged" and is never stored.
pub type Tag = u64;

// ============================================================================
// Identity
// ============================================================================

/// A stable, address-like identity for one live heap object.
///
/// The value uniquely names the object for hashing and equality while the
/// object is alive. A moving collector invalidates it, which is why the tag
/// store must be reconciled at every collection.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ObjectRef(NonZeroU64);

impl ObjectRef {
    /// Create an identity from a raw address. Returns `None` for zero.
    #[must_use]
    pub fn from_addr(addr: u64) -> Option<Self> {
        NonZeroU64::new(addr).map(Self)
    }

    /// The raw address value backing this identity.
    #[must_use]
    pub const fn addr(self) -> u64 {
        self.0.get()
    }
}

/// Opaque identifier for a method, used when reporting stack-local roots.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct MethodId(pub u64);

// ============================================================================
// Object and value model
// ============================================================================

/// Coarse classification of a heap object, driving edge enumeration.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ObjectKind {
    /// An ordinary instance (including class mirrors).
    Instance,
    /// An array of object references.
    ObjectArray,
    /// An array of primitive values.
    PrimitiveArray,
}

/// Primitive value type codes, matching the field-type codes the class
/// model reports.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PrimitiveType {
    /// `boolean`
    Boolean,
    /// `byte`
    Byte,
    /// `char` (UTF-16 code unit)
    Char,
    /// `short`
    Short,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
}

/// A primitive value copied out of a field or array element.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum PrimitiveValue {
    /// `boolean`
    Boolean(bool),
    /// `byte`
    Byte(i8),
    /// `char`
    Char(u16),
    /// `short`
    Short(i16),
    /// `int`
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
}

impl PrimitiveValue {
    /// The type code of this value.
    #[must_use]
    pub const fn primitive_type(&self) -> PrimitiveType {
        match self {
            Self::Boolean(_) => PrimitiveType::Boolean,
            Self::Byte(_) => PrimitiveType::Byte,
            Self::Char(_) => PrimitiveType::Char,
            Self::Short(_) => PrimitiveType::Short,
            Self::Int(_) => PrimitiveType::Int,
            Self::Long(_) => PrimitiveType::Long,
            Self::Float(_) => PrimitiveType::Float,
            Self::Double(_) => PrimitiveType::Double,
        }
    }
}

/// Whether a declared field holds a reference or a primitive value.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FieldKind {
    /// A reference to another heap object.
    Reference,
    /// A primitive value of the given type.
    Primitive(PrimitiveType),
}

/// One field as declared by the class model, in declaration order.
#[derive(Clone, Copy, Debug)]
pub struct DeclaredField {
    /// Reference or primitive classification.
    pub kind: FieldKind,
    /// Byte offset of the field within its owner.
    pub offset: u32,
    /// True for static fields (owned by the class descriptor).
    pub is_static: bool,
}

// ============================================================================
// Threads and stack references
// ============================================================================

/// A live, non-exiting, externally visible thread.
#[derive(Clone, Copy, Debug)]
pub struct ThreadDescriptor {
    /// The thread's own heap object.
    pub object: ObjectRef,
    /// The thread id the host VM assigns.
    pub thread_id: i64,
}

/// What kind of stack slot holds a reference.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StackRefKind {
    /// A local variable in an interpreted or compiled frame.
    Local {
        /// Byte offset of the current instruction within the method.
        location: i64,
        /// Local variable slot index.
        slot: i32,
    },
    /// A native-interface local handle held by a native frame.
    JniLocal,
}

/// One object reference found while walking a thread's stack.
#[derive(Clone, Copy, Debug)]
pub struct StackRef {
    /// Local variable or native-local classification.
    pub kind: StackRefKind,
    /// Frame depth, topmost frame is 0.
    pub depth: i32,
    /// The frame's method, if one applies.
    pub method: Option<MethodId>,
    /// The referenced object.
    pub object: ObjectRef,
}

// ============================================================================
// The collaborator trait
// ============================================================================

/// The fixed interface to the host VM's object model, class model, and
/// root sets.
///
/// Implementations must guarantee that while a walk is running the heap is
/// quiescent: all mutator threads paused, the heap parsable, and no object
/// moving. Tag get/set paths only require the identity methods and may run
/// concurrently with mutators.
pub trait Heap {
    // --- identity and layout ---

    /// Size of the object in bytes.
    fn object_size(&self, obj: ObjectRef) -> u64;

    /// The class *descriptor* of the object. For a class mirror this is the
    /// descriptor of the mirror class itself, not the mirrored class.
    fn class_of(&self, obj: ObjectRef) -> ObjectRef;

    /// Coarse object classification.
    fn kind_of(&self, obj: ObjectRef) -> ObjectKind;

    /// Whether the object is visible to external tooling. Synthetic and
    /// VM-internal objects answer false and are excluded from every report.
    fn is_visible(&self, obj: ObjectRef) -> bool;

    /// Subtype test: is `obj` an instance of the class named by `desc`?
    fn is_instance_of(&self, obj: ObjectRef, desc: ObjectRef) -> bool;

    // --- mirror / descriptor duality ---

    /// Whether the object is a class mirror (the heap-resident face of a
    /// class, primitive mirrors included).
    fn is_class_mirror(&self, obj: ObjectRef) -> bool;

    /// The class descriptor behind a mirror, or `None` if `obj` is not a
    /// mirror or mirrors a primitive type.
    fn as_class_descriptor(&self, obj: ObjectRef) -> Option<ObjectRef>;

    /// Whether the reference names a class descriptor rather than an
    /// ordinary heap object.
    fn is_class_descriptor(&self, obj: ObjectRef) -> bool;

    /// The mirror of a class descriptor.
    fn mirror_of(&self, desc: ObjectRef) -> ObjectRef;

    /// The identity tags attach to: class mirrors are tagged through their
    /// descriptor, everything else through itself.
    fn tag_target(&self, obj: ObjectRef) -> ObjectRef {
        self.as_class_descriptor(obj).unwrap_or(obj)
    }

    // --- class structure (descriptor-keyed) ---

    /// Whether the class has been linked. Unlinked classes expose no fields
    /// or constant pool.
    fn is_linked(&self, desc: ObjectRef) -> bool;

    /// The superclass descriptor. `None` for the universal base class and
    /// for the base class's own (absent) superclass, so that the
    /// uninteresting top-of-hierarchy edge is never reported.
    fn superclass(&self, desc: ObjectRef) -> Option<ObjectRef>;

    /// Directly implemented interface descriptors.
    fn interfaces(&self, desc: ObjectRef) -> Vec<ObjectRef>;

    /// The defining loader, if any.
    fn class_loader(&self, desc: ObjectRef) -> Option<ObjectRef>;

    /// The protection domain, if any.
    fn protection_domain(&self, desc: ObjectRef) -> Option<ObjectRef>;

    /// The signers array, if any.
    fn signers(&self, desc: ObjectRef) -> Option<ObjectRef>;

    /// Heap-resident constant-pool entries as `(pool index, object)`.
    fn constant_pool_refs(&self, desc: ObjectRef) -> Vec<(i32, ObjectRef)>;

    /// The declared field stream, in declaration order (first declared
    /// first). With `include_inherited`, superclass fields precede the
    /// class's own, base-most class first.
    fn declared_fields(&self, desc: ObjectRef, include_inherited: bool) -> Vec<DeclaredField>;

    // --- field and array access ---

    /// Read a reference field at `offset`. The owner is an object for
    /// instance fields or a class descriptor for static fields.
    fn object_field(&self, owner: ObjectRef, offset: u32) -> Option<ObjectRef>;

    /// Copy a primitive field value at `offset`.
    fn primitive_field(&self, owner: ObjectRef, offset: u32, ty: PrimitiveType) -> PrimitiveValue;

    /// Array length. Only meaningful for array kinds.
    fn array_length(&self, obj: ObjectRef) -> i32;

    /// Element of an object array, `None` for a null slot.
    fn array_element(&self, obj: ObjectRef, index: i32) -> Option<ObjectRef>;

    /// The element type and values of a primitive array.
    fn primitive_array_values(&self, obj: ObjectRef) -> (PrimitiveType, Vec<PrimitiveValue>);

    /// Whether the object is a character-string object.
    fn is_string(&self, obj: ObjectRef) -> bool;

    /// The backing character data of a string object, as UTF-16 units.
    fn string_chars(&self, obj: ObjectRef) -> Vec<u16>;

    // --- roots ---

    /// External global handle roots.
    fn global_handle_roots(&self) -> Vec<ObjectRef>;

    /// Statically preloaded / system classes (descriptors or objects).
    fn system_class_roots(&self) -> Vec<ObjectRef>;

    /// Objects pinned by inflated monitors.
    fn monitor_roots(&self) -> Vec<ObjectRef>;

    /// Miscellaneous VM-maintained roots.
    fn misc_roots(&self) -> Vec<ObjectRef> {
        Vec::new()
    }

    /// Heap-resident roots discovered in compiled-code metadata.
    fn code_roots(&self) -> Vec<ObjectRef> {
        Vec::new()
    }

    /// Live, non-exiting, externally visible threads.
    fn threads(&self) -> Vec<ThreadDescriptor>;

    /// Stack-local and native-local references of one thread, topmost
    /// frame first.
    fn stack_refs(&self, thread: &ThreadDescriptor) -> Vec<StackRef>;

    // --- whole-heap iteration ---

    /// Visit every object in the heap, reachable or not. Used by the
    /// iteration operations, never by reachability walks.
    fn each_object(&self, f: &mut dyn FnMut(ObjectRef));
}
