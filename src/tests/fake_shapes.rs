//! Drives the probe core through hand-built shapes with no real type behind
//! them: the provider surface is the whole contract.

use crate::{
    FieldShape, Inspect, LayoutError, Segment, ShapeKind, TypeIdent, TypeLayout, TypeShape,
    fields_of,
};
use std::ptr;

struct Synthetic;

unsafe fn shifted(base: *const u8) -> *const u8 {
    unsafe { base.add(3) }
}

impl Inspect for Synthetic {
    fn shape() -> TypeShape {
        TypeShape {
            ident: TypeIdent::of::<Synthetic>(),
            size: 8,
            align: 1,
            kind: ShapeKind::Struct {
                heap: false,
                fields: vec![FieldShape {
                    name: "hi",
                    declared_in: "Synthetic",
                    shape: <u16 as Inspect>::shape,
                    project: shifted,
                }],
            },
        }
    }
}

struct Broken;

unsafe fn nowhere(_base: *const u8) -> *const u8 {
    ptr::null()
}

impl Inspect for Broken {
    fn shape() -> TypeShape {
        TypeShape {
            ident: TypeIdent::of::<Broken>(),
            size: 4,
            align: 1,
            kind: ShapeKind::Struct {
                heap: false,
                fields: vec![FieldShape {
                    name: "ghost",
                    declared_in: "Broken",
                    shape: <u8 as Inspect>::shape,
                    project: nowhere,
                }],
            },
        }
    }
}

#[test]
fn probe_discovers_a_synthetic_field() {
    let fields = fields_of::<Synthetic>().unwrap();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].offset, 3);
    assert_eq!(fields[0].size, 2);
}

#[test]
fn synthetic_layout_pads_both_sides() {
    let layout = TypeLayout::of::<Synthetic>().unwrap();
    assert_eq!(layout.size(), 8);
    assert_eq!(layout.paddings(), 6);

    let spans: Vec<_> = layout
        .segments()
        .iter()
        .map(|s| match s {
            Segment::Field(f) => ("hi", f.offset, f.size),
            Segment::Padding(p) => ("padding", p.offset, p.size),
        })
        .collect();
    assert_eq!(
        spans,
        vec![("padding", 0, 3), ("hi", 3, 2), ("padding", 5, 3)]
    );
}

#[test]
fn unreachable_fields_fail_discovery() {
    let err = fields_of::<Broken>().unwrap_err();
    assert!(matches!(
        err,
        LayoutError::DiscoveryFailed { field: "ghost", .. }
    ));
}
