use crate::{
    dummy::Dummy,
    error::{LayoutError, LayoutResult},
    layout::FieldLayout,
    node::{FieldNode, Leaf, NullableNode, RootNode, ZeroTest},
    shape::{Projector, pointer_width},
};
use log::debug;

/// Byte written while scanning value fields. Kept at 1 so forced presence
/// flags, bools, and enum tags stay within their valid encodings.
const VALUE_SENTINEL: u8 = 1;

/// Byte written while scanning reference fields; any non-zero byte makes the
/// stored pointer non-null.
const REFERENCE_SENTINEL: u8 = 0xFF;

struct ProbeCtx {
    owner: &'static str,
    size: usize,
    align: usize,
}

enum LeafMode {
    /// Scan past the first diverging byte to find the field's extent.
    Scan,
    /// Stop at the first diverging byte; a stored reference is exactly one
    /// pointer wide.
    Pointer,
}

/// Fills in the offset and size of every node by toggling bytes of freshly
/// fabricated root instances and watching each field's observed value.
pub(crate) fn resolve(root: &mut RootNode) -> LayoutResult<()> {
    let ctx = ProbeCtx {
        owner: root.ident.name(),
        size: root.size,
        align: root.align,
    };
    let mut chain: Vec<Projector> = Vec::new();
    let mut twiddlers: Vec<usize> = Vec::new();

    for child in &mut root.children {
        resolve_node(&ctx, child, &mut chain, &mut twiddlers)?;
    }

    Ok(())
}

/// Resolves one node and returns its `(offset, size)` span, absolute within
/// the root instance.
fn resolve_node(
    ctx: &ProbeCtx,
    node: &mut FieldNode,
    chain: &mut Vec<Projector>,
    twiddlers: &mut Vec<usize>,
) -> LayoutResult<(usize, usize)> {
    match node {
        FieldNode::Primitive(leaf) => probe_leaf(ctx, leaf, chain, twiddlers, LeafMode::Scan),
        FieldNode::Reference(leaf) => probe_leaf(ctx, leaf, chain, twiddlers, LeafMode::Pointer),
        FieldNode::Fixed(fixed) => {
            let (offset, element_size) =
                probe_leaf(ctx, &mut fixed.leaf, chain, twiddlers, LeafMode::Scan)?;
            fixed.leaf.size = element_size * fixed.len;
            Ok((offset, fixed.leaf.size))
        }
        FieldNode::Nullable(node) => resolve_nullable(ctx, node, chain, twiddlers),
        FieldNode::Composite(node) => {
            chain.push(node.project);
            let mut offset = usize::MAX;
            let mut end = 0;
            for child in &mut node.children {
                let (child_offset, child_size) = resolve_node(ctx, child, chain, twiddlers)?;
                offset = offset.min(child_offset);
                end = end.max(child_offset + child_size);
            }
            chain.pop();

            // deterministic order under overlap
            node.children.sort_by(|a, b| {
                let a_offset = a.offset().unwrap_or(usize::MAX);
                let b_offset = b.offset().unwrap_or(usize::MAX);
                a_offset.cmp(&b_offset).then(b.size().cmp(&a.size()))
            });

            node.offset = Some(offset);
            node.size = end - offset;
            Ok((offset, node.size))
        }
    }
}

fn resolve_nullable(
    ctx: &ProbeCtx,
    node: &mut NullableNode,
    chain: &mut Vec<Projector>,
    twiddlers: &mut Vec<usize>,
) -> LayoutResult<(usize, usize)> {
    chain.push(node.project);
    let (flag_offset, flag_size) = probe_leaf(ctx, &mut node.flag, chain, twiddlers, LeafMode::Scan)?;

    // keep this variant present while its payload is probed
    twiddlers.push(flag_offset);
    let (payload_offset, payload_size) = resolve_node(ctx, &mut node.payload, chain, twiddlers)?;
    twiddlers.pop();
    chain.pop();

    // the compiler may place the flag on either side of the payload
    let offset = flag_offset.min(payload_offset);
    let end = (flag_offset + flag_size).max(payload_offset + payload_size);
    node.offset = Some(offset);
    node.size = end - offset;
    Ok((offset, node.size))
}

/// The byte-toggling scan. For each byte of a re-zeroed root instance: force
/// any enclosing presence flags, set the byte to a sentinel, read the field
/// through the accessor chain, and record where the observed value diverges
/// from the all-zero default.
fn probe_leaf(
    ctx: &ProbeCtx,
    leaf: &mut Leaf,
    chain: &[Projector],
    twiddlers: &[usize],
    mode: LeafMode,
) -> LayoutResult<(usize, usize)> {
    let mut dummy = Dummy::fabricate(ctx.owner, ctx.size, ctx.align)?;
    let sentinel = match mode {
        LeafMode::Scan => VALUE_SENTINEL,
        LeafMode::Pointer => REFERENCE_SENTINEL,
    };

    let mut offset = None;
    let mut last_diverging = 0;

    for i in 0..ctx.size {
        dummy.zero();
        for &flag in twiddlers {
            dummy.poke(flag, 1);
        }
        dummy.poke(i, sentinel);

        let Some(target) = walk(chain, leaf.project, dummy.base()) else {
            continue;
        };

        let diverges = unsafe {
            match leaf.test {
                ZeroTest::Bytes(width) => any_nonzero(target, width),
                ZeroTest::Flag(is_some) => is_some(target),
            }
        };

        if diverges {
            if offset.is_none() {
                offset = Some(i);
                if matches!(mode, LeafMode::Pointer) {
                    leaf.offset = offset;
                    leaf.size = pointer_width();
                    return Ok((i, leaf.size));
                }
            }
            last_diverging = i;
        }
    }

    let Some(offset) = offset else {
        return Err(LayoutError::DiscoveryFailed {
            owner: ctx.owner,
            field: leaf.handle.name,
        });
    };

    leaf.offset = Some(offset);
    leaf.size = last_diverging + 1 - offset;
    debug!(
        "{}::{} resolved at {}..{}",
        ctx.owner,
        leaf.handle.name,
        offset,
        offset + leaf.size
    );
    Ok((offset, leaf.size))
}

/// Walks the accessor chain from the root instance down to the leaf's
/// storage. `None` means the field is unreachable on this instance (an empty
/// enclosing variant) and therefore still holds its default.
fn walk(chain: &[Projector], leaf_project: Projector, base: *const u8) -> Option<*const u8> {
    let mut p = base;
    for &step in chain {
        p = unsafe { step(p) };
        if p.is_null() {
            return None;
        }
    }
    p = unsafe { leaf_project(p) };
    (!p.is_null()).then_some(p)
}

unsafe fn any_nonzero(p: *const u8, width: usize) -> bool {
    (0..width).any(|i| unsafe { *p.add(i) } != 0)
}

/// Collects the resolved tree into the fields-only view: every leaf when
/// `recursive`, the top-level envelopes otherwise. A variant root always
/// reports its flag and payload pair.
pub(crate) fn flatten(root: &RootNode, recursive: bool) -> Vec<FieldLayout> {
    let mut out = Vec::new();

    for child in &root.children {
        if recursive {
            flatten_node(child, &mut out);
        } else if root.nullable_root {
            if let FieldNode::Nullable(node) = child {
                push_leaf(&node.flag, &mut out);
                push_envelope(&node.payload, &mut out);
            } else {
                push_envelope(child, &mut out);
            }
        } else {
            push_envelope(child, &mut out);
        }
    }

    out.sort_by(|a, b| a.offset.cmp(&b.offset).then(b.size.cmp(&a.size)));
    out
}

fn flatten_node(node: &FieldNode, out: &mut Vec<FieldLayout>) {
    match node {
        FieldNode::Primitive(leaf) | FieldNode::Reference(leaf) => push_leaf(leaf, out),
        FieldNode::Fixed(fixed) => push_leaf(&fixed.leaf, out),
        FieldNode::Nullable(nullable) => {
            push_leaf(&nullable.flag, out);
            flatten_node(&nullable.payload, out);
        }
        FieldNode::Composite(composite) => {
            for child in &composite.children {
                flatten_node(child, out);
            }
        }
    }
}

fn push_leaf(leaf: &Leaf, out: &mut Vec<FieldLayout>) {
    debug_assert!(leaf.offset.is_some(), "flatten before resolve");
    out.push(FieldLayout {
        offset: leaf.offset.unwrap_or(0),
        size: leaf.size,
        field: leaf.handle.clone(),
    });
}

fn push_envelope(node: &FieldNode, out: &mut Vec<FieldLayout>) {
    debug_assert!(node.offset().is_some(), "flatten before resolve");
    out.push(FieldLayout {
        offset: node.offset().unwrap_or(0),
        size: node.size(),
        field: node.handle().clone(),
    });
}
