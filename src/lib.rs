// lets the derive's `::memprobe::` paths resolve inside this crate too
extern crate self as memprobe;

pub mod cache;
pub mod error;
pub mod ident;
pub mod kind;
pub mod layout;
pub mod shape;

mod dummy;
mod node;
mod padder;
mod probe;

#[cfg(test)]
mod tests;

pub use cache::LayoutCache;
pub use error::{LayoutError, LayoutResult};
pub use ident::TypeIdent;
pub use kind::FieldKind;
pub use layout::{
    FieldHandle, FieldLayout, FieldsQuery, LayoutQuery, Padding, Segment, TypeLayout, fields_of,
};
pub use memprobe_macros::Inspect;
pub use shape::{
    FieldShape, Inspect, NullableShape, Projector, ShapeFn, ShapeKind, TypeShape, instance_size,
    pointer_width,
};
