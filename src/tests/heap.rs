use crate::{Inspect, TypeLayout, fields_of, pointer_width};
use std::mem::offset_of;

#[derive(Inspect)]
#[inspect(reference)]
struct EmptyObj;

#[derive(Inspect)]
#[inspect(reference)]
struct Obj {
    a: u64,
    b: u8,
}

#[derive(Inspect)]
#[inspect(reference)]
struct Linked {
    value: u64,
    next: *const Linked,
}

#[test]
fn empty_heap_type_is_one_pointer_plus_header() {
    let ptr = pointer_width();
    let layout = TypeLayout::of::<EmptyObj>().unwrap();
    assert_eq!(layout.size(), ptr);
    assert_eq!(layout.overhead(), 2 * ptr);
    assert_eq!(layout.full_size(), 3 * ptr);
    assert!(layout.fields().next().is_none());
}

#[test]
fn heap_size_rounds_to_a_pointer_boundary() {
    let ptr = pointer_width();
    let layout = TypeLayout::of::<Obj>().unwrap();

    // nine occupied bytes, rounded up
    let expected = (9 + ptr - 1) & !(ptr - 1);
    assert_eq!(layout.size(), expected);
    assert_eq!(layout.overhead(), 2 * ptr);
    assert_eq!(layout.full_size(), expected + 2 * ptr);
}

#[test]
fn self_reference_through_a_pointer_terminates() {
    let fields = fields_of::<Linked>().unwrap();
    assert_eq!(fields.len(), 2);

    let next = fields.iter().find(|f| f.field.name == "next").unwrap();
    assert_eq!(next.offset, offset_of!(Linked, next));
    assert_eq!(next.size, pointer_width());
}
