use crate::{
    error::{LayoutError, LayoutResult},
    ident::TypeIdent,
    kind::{FieldKind, classify},
    layout::FieldHandle,
    shape::{Inspect, Projector, ShapeFn, ShapeKind, TypeShape, pointer_width},
};
use std::collections::HashSet;

/// Keeps an accessor chain at the same address; the synthetic presence-flag
/// leaf is tested at the variant's own base.
pub(crate) unsafe fn project_here(base: *const u8) -> *const u8 {
    base
}

/// Divergence test applied at the end of a leaf's accessor chain.
pub(crate) enum ZeroTest {
    /// Any non-zero byte within the field's storage.
    Bytes(usize),
    /// Variant presence flag, read through `is_some` at the variant base.
    Flag(unsafe fn(*const u8) -> bool),
}

pub(crate) struct Leaf {
    pub(crate) handle: FieldHandle,
    pub(crate) project: Projector,
    pub(crate) test: ZeroTest,
    /// Filled by the probe pass; absolute within the root instance.
    pub(crate) offset: Option<usize>,
    pub(crate) size: usize,
}

impl Leaf {
    fn new(handle: FieldHandle, project: Projector, test: ZeroTest) -> Self {
        Self {
            handle,
            project,
            test,
            offset: None,
            size: 0,
        }
    }
}

pub(crate) struct FixedNode {
    /// Probes element zero; after resolution its size covers the buffer.
    pub(crate) leaf: Leaf,
    pub(crate) len: usize,
}

/// Presence flag + payload. The flag is probed first so its discovered
/// offset can force the variant present while the payload is probed.
pub(crate) struct NullableNode {
    pub(crate) handle: FieldHandle,
    pub(crate) project: Projector,
    pub(crate) flag: Leaf,
    pub(crate) payload: Box<FieldNode>,
    pub(crate) offset: Option<usize>,
    pub(crate) size: usize,
}

pub(crate) struct CompositeNode {
    pub(crate) handle: FieldHandle,
    pub(crate) project: Projector,
    pub(crate) children: Vec<FieldNode>,
    pub(crate) offset: Option<usize>,
    pub(crate) size: usize,
}

pub(crate) enum FieldNode {
    Primitive(Leaf),
    Reference(Leaf),
    Fixed(FixedNode),
    Nullable(NullableNode),
    Composite(CompositeNode),
}

impl FieldNode {
    pub(crate) fn handle(&self) -> &FieldHandle {
        match self {
            FieldNode::Primitive(leaf) | FieldNode::Reference(leaf) => &leaf.handle,
            FieldNode::Fixed(fixed) => &fixed.leaf.handle,
            FieldNode::Nullable(node) => &node.handle,
            FieldNode::Composite(node) => &node.handle,
        }
    }

    pub(crate) fn offset(&self) -> Option<usize> {
        match self {
            FieldNode::Primitive(leaf) | FieldNode::Reference(leaf) => leaf.offset,
            FieldNode::Fixed(fixed) => fixed.leaf.offset,
            FieldNode::Nullable(node) => node.offset,
            FieldNode::Composite(node) => node.offset,
        }
    }

    pub(crate) fn size(&self) -> usize {
        match self {
            FieldNode::Primitive(leaf) | FieldNode::Reference(leaf) => leaf.size,
            FieldNode::Fixed(fixed) => fixed.leaf.size,
            FieldNode::Nullable(node) => node.size,
            FieldNode::Composite(node) => node.size,
        }
    }
}

pub(crate) struct RootNode {
    pub(crate) ident: TypeIdent,
    pub(crate) size: usize,
    pub(crate) align: usize,
    pub(crate) heap: bool,
    /// The root is itself a variant; its single child expands to the flag
    /// and payload pair in every view.
    pub(crate) nullable_root: bool,
    pub(crate) children: Vec<FieldNode>,
}

/// Builds the probe tree for a root type. Purely structural: no offsets are
/// known yet.
pub(crate) fn build_tree(
    shape: &TypeShape,
    shape_fn: ShapeFn,
    opaque: &HashSet<TypeIdent>,
) -> LayoutResult<RootNode> {
    let mut children = Vec::new();
    let mut nullable_root = false;

    match &shape.kind {
        ShapeKind::Struct { fields, .. } => {
            for field in fields {
                let node =
                    build_field(field.name, field.declared_in, field.shape, field.project, opaque)?;
                if let Some(node) = node {
                    children.push(node);
                }
            }
        }
        ShapeKind::Nullable(_) if !opaque.contains(&shape.ident) => {
            nullable_root = true;
            let node = build_field("value", shape.ident.name(), shape_fn, project_here, opaque)?;
            if let Some(node) = node {
                children.push(node);
            }
        }
        // opaque roots: nothing to descend into
        ShapeKind::Primitive | ShapeKind::Pointer | ShapeKind::Array { .. } => {}
        ShapeKind::Nullable(_) => {}
    }

    Ok(RootNode {
        ident: shape.ident,
        size: shape.size,
        align: shape.align,
        heap: matches!(shape.kind, ShapeKind::Struct { heap: true, .. }),
        nullable_root,
        children,
    })
}

fn build_field(
    name: &'static str,
    declared_in: &'static str,
    shape_fn: ShapeFn,
    project: Projector,
    opaque: &HashSet<TypeIdent>,
) -> LayoutResult<Option<FieldNode>> {
    let shape = shape_fn();
    if shape.size == 0 {
        // zero-sized fields occupy no bytes; there is nothing to discover
        return Ok(None);
    }

    let ident = shape.ident;
    let size = shape.size;
    let kind = classify(&shape, opaque);
    let handle = FieldHandle {
        name,
        declared_in,
        ty: ident,
        kind,
        shape: shape_fn,
    };

    let node = match (kind, shape.kind) {
        (FieldKind::Primitive, _) => {
            FieldNode::Primitive(Leaf::new(handle, project, ZeroTest::Bytes(size)))
        }
        (FieldKind::Reference, _) => {
            FieldNode::Reference(Leaf::new(handle, project, ZeroTest::Bytes(pointer_width())))
        }
        (FieldKind::FixedBuffer, ShapeKind::Array { elem, len }) => {
            let elem_shape = elem();
            if classify(&elem_shape, opaque) != FieldKind::Primitive {
                return Err(LayoutError::UnsupportedField {
                    owner: declared_in,
                    field: name,
                    reason: "fixed buffers must repeat a primitive element",
                });
            }
            FieldNode::Fixed(FixedNode {
                leaf: Leaf::new(handle, project, ZeroTest::Bytes(elem_shape.size)),
                len,
            })
        }
        (FieldKind::Nullable, ShapeKind::Nullable(nullable)) => {
            let flag_handle = FieldHandle {
                name: "is_some",
                declared_in: ident.name(),
                ty: TypeIdent::of::<bool>(),
                kind: FieldKind::Primitive,
                shape: <bool as Inspect>::shape,
            };
            let flag = Leaf::new(flag_handle, project_here, ZeroTest::Flag(nullable.is_some));

            let payload = build_field(
                "value",
                ident.name(),
                nullable.payload,
                nullable.project_payload,
                opaque,
            )?;
            let Some(payload) = payload else {
                return Err(LayoutError::UnsupportedField {
                    owner: declared_in,
                    field: name,
                    reason: "variant payload is zero-sized",
                });
            };

            FieldNode::Nullable(NullableNode {
                handle,
                project,
                flag,
                payload: Box::new(payload),
                offset: None,
                size: 0,
            })
        }
        (FieldKind::Composite, ShapeKind::Struct { fields, .. }) => {
            let mut children = Vec::with_capacity(fields.len());
            for field in &fields {
                let child =
                    build_field(field.name, field.declared_in, field.shape, field.project, opaque)?;
                if let Some(child) = child {
                    children.push(child);
                }
            }

            if children.is_empty() {
                // alignment-only footprint; probe the whole field as one unit
                FieldNode::Primitive(Leaf::new(handle, project, ZeroTest::Bytes(size)))
            } else {
                FieldNode::Composite(CompositeNode {
                    handle,
                    project,
                    children,
                    offset: None,
                    size: 0,
                })
            }
        }
        _ => {
            return Err(LayoutError::UnsupportedField {
                owner: declared_in,
                field: name,
                reason: "shape and classification disagree",
            });
        }
    };

    Ok(Some(node))
}
