use crate::ident::TypeIdent;
use std::{mem, ptr};

/// Projects an enclosing instance's base address to a field's storage.
///
/// Returns null when the field is unreachable from the given instance (an
/// absent variant payload); the probe treats an unreachable field as still
/// holding its default value.
pub type Projector = unsafe fn(*const u8) -> *const u8;

/// Lazy shape constructor. Shapes refer to other types (field types, array
/// elements, variant payloads) through these so that self-referential
/// composites don't recurse while the shape itself is being built.
pub type ShapeFn = fn() -> TypeShape;

/// Describes how a type's memory is probed. This is the whole reflection
/// surface the probing core sees; anything that can produce one of these can
/// be probed, real Rust type behind it or not.
pub struct TypeShape {
    pub ident: TypeIdent,
    /// Full instance footprint, trailing padding included.
    pub size: usize,
    pub align: usize,
    pub kind: ShapeKind,
}

pub enum ShapeKind {
    /// Fixed-width scalar probed as one opaque unit.
    Primitive,
    /// Heap-indirected leaf; the stored representation is exactly a pointer.
    Pointer,
    /// A value of the payload type, or nothing: presence flag + payload.
    Nullable(NullableShape),
    /// Inline fixed-length repetition of one element type.
    Array { elem: ShapeFn, len: usize },
    /// Composite with fields. `heap: true` marks a reference-style type:
    /// used as a field it probes as a single pointer, and its own layout
    /// reports heap overhead.
    Struct { heap: bool, fields: Vec<FieldShape> },
}

/// The two accessors a variant encoding exposes. Neither says where the
/// flag or the payload live; the probe discovers both.
pub struct NullableShape {
    pub payload: ShapeFn,
    /// Presence test, applied at the variant's own base address.
    pub is_some: unsafe fn(*const u8) -> bool,
    /// Payload accessor; null while the variant is empty.
    pub project_payload: Projector,
}

pub struct FieldShape {
    pub name: &'static str,
    pub declared_in: &'static str,
    pub shape: ShapeFn,
    pub project: Projector,
}

impl TypeShape {
    #[inline]
    pub fn name(&self) -> &'static str {
        self.ident.name()
    }
}

/// Describes how a type's memory is probed.
///
/// Implemented by `#[derive(Inspect)]`, by the built-in impls below, or by
/// hand for synthetic shapes.
pub trait Inspect: 'static {
    fn shape() -> TypeShape;
}

#[allow(dead_code)]
struct Pair<T> {
    first: T,
    second: T,
}

/// Size of `T` measured as the larger field offset in a two-field holder of
/// two `T`s. Whichever order the compiler picks, the second copy starts
/// exactly one instance footprint in, so the result includes trailing
/// padding.
pub fn instance_size<T>() -> usize {
    mem::offset_of!(Pair::<T>, first).max(mem::offset_of!(Pair::<T>, second))
}

#[inline]
pub fn pointer_width() -> usize {
    mem::size_of::<usize>()
}

macro_rules! primitive_shapes {
    ($($t:ty),* $(,)?) => {
        $(impl Inspect for $t {
            fn shape() -> TypeShape {
                TypeShape {
                    ident: TypeIdent::of::<$t>(),
                    size: instance_size::<$t>(),
                    align: mem::align_of::<$t>(),
                    kind: ShapeKind::Primitive,
                }
            }
        })*
    };
}

primitive_shapes!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, bool, char,
);

// TODO: impl Inspect for tuples up to some arity; until then wrap the tuple
// in a derived tuple struct.

impl<T: Inspect, const N: usize> Inspect for [T; N] {
    fn shape() -> TypeShape {
        TypeShape {
            ident: TypeIdent::of::<[T; N]>(),
            size: instance_size::<[T; N]>(),
            align: mem::align_of::<T>(),
            kind: ShapeKind::Array {
                elem: T::shape,
                len: N,
            },
        }
    }
}

impl<T: Inspect> Inspect for Option<T> {
    fn shape() -> TypeShape {
        unsafe fn is_some<T: 'static>(base: *const u8) -> bool {
            unsafe { (*base.cast::<Option<T>>()).is_some() }
        }

        unsafe fn project_payload<T: 'static>(base: *const u8) -> *const u8 {
            match unsafe { (*base.cast::<Option<T>>()).as_ref() } {
                Some(payload) => ptr::from_ref(payload).cast(),
                None => ptr::null(),
            }
        }

        TypeShape {
            ident: TypeIdent::of::<Option<T>>(),
            size: instance_size::<Option<T>>(),
            align: mem::align_of::<Option<T>>(),
            kind: ShapeKind::Nullable(NullableShape {
                payload: T::shape,
                is_some: is_some::<T>,
                project_payload: project_payload::<T>,
            }),
        }
    }
}

fn pointer_shape<P: 'static>() -> TypeShape {
    TypeShape {
        ident: TypeIdent::of::<P>(),
        size: instance_size::<P>(),
        align: mem::align_of::<P>(),
        kind: ShapeKind::Pointer,
    }
}

impl<T: 'static> Inspect for *const T {
    fn shape() -> TypeShape {
        pointer_shape::<Self>()
    }
}

impl<T: 'static> Inspect for *mut T {
    fn shape() -> TypeShape {
        pointer_shape::<Self>()
    }
}

impl<T: 'static> Inspect for Box<T> {
    fn shape() -> TypeShape {
        pointer_shape::<Self>()
    }
}
