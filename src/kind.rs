use crate::{
    ident::TypeIdent,
    shape::{ShapeKind, TypeShape},
};
use std::collections::HashSet;

/// How a field's memory is probed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Fixed-width scalar, probed as one opaque unit.
    Primitive,
    /// Heap-indirected; exactly one pointer wide, contents opaque.
    Reference,
    /// Presence flag + payload pair at two independently discovered offsets.
    Nullable,
    /// Inline repetition of a primitive element.
    FixedBuffer,
    /// Nested value type, probed by recursive descent.
    Composite,
}

/// Categorizes a field by its type shape. Types in the caller-supplied
/// `opaque` set are primitives for this query, whatever their shape says.
pub(crate) fn classify(shape: &TypeShape, opaque: &HashSet<TypeIdent>) -> FieldKind {
    if opaque.contains(&shape.ident) {
        return FieldKind::Primitive;
    }

    match &shape.kind {
        ShapeKind::Primitive => FieldKind::Primitive,
        ShapeKind::Pointer => FieldKind::Reference,
        ShapeKind::Nullable(_) => FieldKind::Nullable,
        ShapeKind::Array { .. } => FieldKind::FixedBuffer,
        ShapeKind::Struct { heap: true, .. } => FieldKind::Reference,
        ShapeKind::Struct { heap: false, .. } => FieldKind::Composite,
    }
}
