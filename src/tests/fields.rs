use crate::{FieldKind, FieldsQuery, Inspect, LayoutError, fields_of, pointer_width};
use std::mem::{offset_of, size_of};

#[derive(Clone, Copy, Inspect)]
struct Inner {
    x: f64,
    y: f64,
}

#[derive(Inspect)]
struct Nested {
    inner: Inner,
    tail: u8,
}

#[derive(Inspect)]
struct Block {
    data: [u8; 33],
}

#[derive(Inspect)]
struct Framed {
    tag: u8,
    buf: [u16; 4],
}

#[derive(Inspect)]
struct Refs {
    id: u32,
    data: Box<u64>,
    peer: *const Nested,
}

#[allow(dead_code)]
#[derive(Inspect)]
#[repr(u16)]
enum Opcode {
    Nop = 0,
    Halt = 1,
}

#[derive(Inspect)]
struct Tagged {
    code: Opcode,
    arg: u8,
}

#[derive(Inspect)]
struct StructArray {
    pair: [Inner; 2],
}

#[test]
fn recursive_view_reaches_the_leaves() {
    let fields = fields_of::<Nested>().unwrap();
    let names: Vec<_> = fields.iter().map(|f| f.field.name).collect();
    assert_eq!(fields.len(), 3);
    assert!(names.contains(&"x"));
    assert!(names.contains(&"y"));
    assert!(names.contains(&"tail"));

    let x = fields.iter().find(|f| f.field.name == "x").unwrap();
    assert_eq!(x.offset, offset_of!(Nested, inner) + offset_of!(Inner, x));
    assert_eq!(x.size, 8);
    assert_eq!(x.field.declared_in, std::any::type_name::<Inner>());
}

#[test]
fn shallow_view_reports_composites_whole() {
    let fields = FieldsQuery::new().shallow().compute::<Nested>().unwrap();
    assert_eq!(fields.len(), 2);

    let inner = fields.iter().find(|f| f.field.name == "inner").unwrap();
    assert_eq!(inner.offset, offset_of!(Nested, inner));
    assert_eq!(inner.size, 16);
    assert_eq!(inner.field.kind, FieldKind::Composite);
}

#[test]
fn opaque_override_stops_the_descent() {
    let fields = FieldsQuery::new()
        .opaque::<Inner>()
        .compute::<Nested>()
        .unwrap();
    assert_eq!(fields.len(), 2);

    let inner = fields.iter().find(|f| f.field.name == "inner").unwrap();
    assert_eq!(inner.size, size_of::<Inner>());
    assert_eq!(inner.field.kind, FieldKind::Primitive);
}

#[test]
fn fixed_buffer_spans_all_elements() {
    let fields = fields_of::<Block>().unwrap();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].offset, 0);
    assert_eq!(fields[0].size, 33);
    assert_eq!(fields[0].field.kind, FieldKind::FixedBuffer);

    // the buffer exactly fills its region: no padding, own or nested
    let layout = crate::TypeLayout::of::<Block>().unwrap();
    assert_eq!(layout.size(), 33);
    assert_eq!(layout.paddings(), 0);
}

#[test]
fn fixed_buffer_inside_a_composite() {
    let fields = fields_of::<Framed>().unwrap();
    let buf = fields.iter().find(|f| f.field.name == "buf").unwrap();
    assert_eq!(buf.offset, offset_of!(Framed, buf));
    assert_eq!(buf.size, 8);
}

#[test]
fn reference_fields_are_one_pointer_wide() {
    let fields = fields_of::<Refs>().unwrap();
    assert_eq!(fields.len(), 3);

    let data = fields.iter().find(|f| f.field.name == "data").unwrap();
    assert_eq!(data.offset, offset_of!(Refs, data));
    assert_eq!(data.size, pointer_width());
    assert_eq!(data.field.kind, FieldKind::Reference);

    let peer = fields.iter().find(|f| f.field.name == "peer").unwrap();
    assert_eq!(peer.offset, offset_of!(Refs, peer));
    assert_eq!(peer.size, pointer_width());
}

#[test]
fn enums_probe_at_their_real_width() {
    let fields = fields_of::<Tagged>().unwrap();
    let code = fields.iter().find(|f| f.field.name == "code").unwrap();
    assert_eq!(code.offset, offset_of!(Tagged, code));
    assert_eq!(code.size, 2);
    assert_eq!(code.field.kind, FieldKind::Primitive);
}

#[test]
fn composite_element_buffers_are_rejected() {
    let err = fields_of::<StructArray>().unwrap_err();
    assert!(matches!(
        err,
        LayoutError::UnsupportedField { field: "pair", .. }
    ));
}

#[test]
fn opaque_elements_make_a_buffer_probeable() {
    let fields = FieldsQuery::new()
        .opaque::<Inner>()
        .compute::<StructArray>()
        .unwrap();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].size, 2 * size_of::<Inner>());
}
