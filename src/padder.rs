use crate::layout::{FieldLayout, Padding, Segment};

/// Merges an unordered, possibly overlapping field list into one ordered
/// sequence of field and padding segments covering `[0, instance_size)`.
///
/// Fields sort by (offset ascending, size descending). Each field opens an
/// occupied region; every later field starting inside that region joins it
/// (union members, explicit overlap), extending it when one runs past the
/// current end. Gaps before, between, and after regions come out as padding.
pub(crate) fn reconcile(mut fields: Vec<FieldLayout>, instance_size: usize) -> Vec<Segment> {
    fields.sort_by(|a, b| a.offset.cmp(&b.offset).then(b.size.cmp(&a.size)));

    let mut segments = Vec::with_capacity(fields.len() + 1);
    if fields.is_empty() {
        return segments;
    }

    let mut frontier = 0;
    let mut i = 0;
    while i < fields.len() {
        let head = &fields[i];
        if head.offset > frontier {
            segments.push(Segment::Padding(Padding {
                offset: frontier,
                size: head.offset - frontier,
            }));
        }

        let mut end = head.offset + head.size;
        segments.push(Segment::Field(fields[i].clone()));
        i += 1;

        while i < fields.len() && fields[i].offset < end {
            end = end.max(fields[i].offset + fields[i].size);
            segments.push(Segment::Field(fields[i].clone()));
            i += 1;
        }

        frontier = end;
    }

    if frontier < instance_size {
        segments.push(Segment::Padding(Padding {
            offset: frontier,
            size: instance_size - frontier,
        }));
    }

    segments
}

/// The probe sees a nested composite only up to its last occupied byte; the
/// type's real footprint extends into its trailing padding. Sizes past 8
/// bytes that end off an 8-byte boundary round up to the next one, capped by
/// the declared instance size. Fixed buffers are exempt (callers skip them).
pub(crate) fn round_composite(apparent: usize, declared: usize) -> usize {
    if apparent > 8 && apparent % 8 != 0 {
        let rounded = (apparent + 7) & !7;
        rounded.min(declared).max(apparent)
    } else {
        apparent
    }
}
