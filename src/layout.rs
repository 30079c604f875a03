use crate::{
    cache::LayoutCache,
    error::LayoutResult,
    ident::TypeIdent,
    kind::FieldKind,
    node::{RootNode, build_tree},
    padder::{reconcile, round_composite},
    probe::{flatten, resolve},
    shape::{Inspect, ShapeFn, TypeShape, pointer_width},
};
use log::trace;
use std::{
    collections::HashSet,
    fmt,
    hash::{Hash, Hasher},
};

/// Names a probed field: what it is called, where it was declared, what
/// static type it has, and how that type is probed.
#[derive(Clone, Debug)]
pub struct FieldHandle {
    pub name: &'static str,
    pub declared_in: &'static str,
    pub ty: TypeIdent,
    pub kind: FieldKind,
    pub(crate) shape: ShapeFn,
}

impl FieldHandle {
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.ty.name()
    }
}

impl PartialEq for FieldHandle {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.declared_in == other.declared_in
            && self.ty == other.ty
            && self.kind == other.kind
    }
}

impl Eq for FieldHandle {}

impl Hash for FieldHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.declared_in.hash(state);
        self.ty.hash(state);
    }
}

/// An occupied byte range attributed to one field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldLayout {
    pub offset: usize,
    pub size: usize,
    pub field: FieldHandle,
}

/// A byte range no declared field occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Padding {
    pub offset: usize,
    pub size: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    Field(FieldLayout),
    Padding(Padding),
}

impl Segment {
    #[inline]
    pub fn offset(&self) -> usize {
        match self {
            Segment::Field(field) => field.offset,
            Segment::Padding(padding) => padding.offset,
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        match self {
            Segment::Field(field) => field.size,
            Segment::Padding(padding) => padding.size,
        }
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.offset() + self.size()
    }
}

/// The discovered layout of one type: its instance size, any fixed heap
/// overhead, the total bytes of padding (own plus nested value-type
/// fields'), and the ordered field/padding segments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeLayout {
    ident: TypeIdent,
    size: usize,
    overhead: usize,
    paddings: usize,
    segments: Vec<Segment>,
}

impl TypeLayout {
    /// Probes `T` and returns its padded layout.
    pub fn of<T: Inspect>() -> LayoutResult<TypeLayout> {
        LayoutQuery::new().compute::<T>()
    }

    /// Like [`TypeLayout::of`], reusing previously computed layouts.
    pub fn of_cached<T: Inspect>(cache: &LayoutCache) -> LayoutResult<TypeLayout> {
        LayoutQuery::new().cache(cache).compute::<T>()
    }

    #[inline]
    pub fn ident(&self) -> TypeIdent {
        self.ident
    }

    /// Instance size, excluding heap overhead.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Fixed per-instance header bytes for heap types; 0 for value types.
    #[inline]
    pub fn overhead(&self) -> usize {
        self.overhead
    }

    #[inline]
    pub fn full_size(&self) -> usize {
        self.size + self.overhead
    }

    /// Padding bytes at this level plus, recursively, inside every
    /// value-type field. Reference fields contribute nothing.
    #[inline]
    pub fn paddings(&self) -> usize {
        self.paddings
    }

    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldLayout> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Field(field) => Some(field),
            Segment::Padding(_) => None,
        })
    }

    fn without_padding_segments(mut self) -> Self {
        self.segments
            .retain(|segment| matches!(segment, Segment::Field(_)));
        self
    }
}

fn write_range(f: &mut fmt::Formatter<'_>, offset: usize, size: usize) -> fmt::Result {
    if size == 1 {
        write!(f, "{offset:>5}")
    } else {
        let range = format!("{}-{}", offset, offset + size - 1);
        write!(f, "{range:>5}")
    }
}

impl fmt::Display for TypeLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Type layout for '{}'", self.ident)?;
        if self.size > 0 {
            writeln!(
                f,
                "Size: {} bytes. Paddings: {} bytes (%{} of empty space)",
                self.size,
                self.paddings,
                self.paddings * 100 / self.size
            )?;
        } else {
            writeln!(f, "Size: 0 bytes.")?;
        }

        for segment in &self.segments {
            write_range(f, segment.offset(), segment.size())?;
            let bytes = if segment.size() == 1 { "byte" } else { "bytes" };
            match segment {
                Segment::Field(field) => writeln!(
                    f,
                    ": {} {} ({} {bytes})",
                    field.field.type_name(),
                    field.field.name,
                    field.size
                )?,
                Segment::Padding(padding) => {
                    writeln!(f, ": padding ({} {bytes})", padding.size)?
                }
            }
        }

        Ok(())
    }
}

/// Builds a padded [`TypeLayout`] request.
pub struct LayoutQuery<'c> {
    include_paddings: bool,
    opaque: HashSet<TypeIdent>,
    cache: Option<&'c LayoutCache>,
}

impl<'c> LayoutQuery<'c> {
    pub fn new() -> Self {
        Self {
            include_paddings: true,
            opaque: HashSet::new(),
            cache: None,
        }
    }

    /// Drop the padding segments from the result. The paddings total is
    /// still computed.
    pub fn without_paddings(mut self) -> Self {
        self.include_paddings = false;
        self
    }

    /// Treat `T` as a single opaque unit instead of descending into it.
    pub fn opaque<T: Inspect>(mut self) -> Self {
        self.opaque.insert(TypeIdent::of::<T>());
        self
    }

    pub fn cache(mut self, cache: &'c LayoutCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn compute<T: Inspect>(&self) -> LayoutResult<TypeLayout> {
        let layout = compute_layout(T::shape(), T::shape, &self.opaque, self.cache)?;
        if self.include_paddings {
            Ok(layout)
        } else {
            Ok(layout.without_padding_segments())
        }
    }
}

/// Builds a fields-only view: no padding segments, overlap reported
/// verbatim, ordered by (offset ascending, size descending).
pub struct FieldsQuery {
    recursive: bool,
    opaque: HashSet<TypeIdent>,
}

impl FieldsQuery {
    pub fn new() -> Self {
        Self {
            recursive: true,
            opaque: HashSet::new(),
        }
    }

    /// Stop at one level: nested composites report as whole units.
    pub fn shallow(mut self) -> Self {
        self.recursive = false;
        self
    }

    /// Treat `T` as a single opaque unit instead of descending into it.
    pub fn opaque<T: Inspect>(mut self) -> Self {
        self.opaque.insert(TypeIdent::of::<T>());
        self
    }

    pub fn compute<T: Inspect>(&self) -> LayoutResult<Vec<FieldLayout>> {
        let shape = T::shape();
        let mut root = build_tree(&shape, T::shape, &self.opaque)?;
        resolve(&mut root)?;
        Ok(flatten(&root, self.recursive))
    }
}

/// Probes `T` and returns every leaf field ordered by offset.
pub fn fields_of<T: Inspect>() -> LayoutResult<Vec<FieldLayout>> {
    FieldsQuery::new().compute::<T>()
}

fn compute_layout(
    shape: TypeShape,
    shape_fn: ShapeFn,
    opaque: &HashSet<TypeIdent>,
    cache: Option<&LayoutCache>,
) -> LayoutResult<TypeLayout> {
    // opaque overrides change the result; only the canonical form is cached
    let cacheable = opaque.is_empty();
    if cacheable {
        if let Some(cache) = cache {
            if let Some(hit) = cache.get(&shape.ident) {
                trace!("layout cache hit for {}", shape.ident);
                return Ok(hit);
            }
        }
    }

    let ident = shape.ident;
    let mut root = build_tree(&shape, shape_fn, opaque)?;
    resolve(&mut root)?;

    let mut fields = flatten(&root, false);
    for field in &mut fields {
        // the probe can't see a nested composite's trailing padding
        if field.field.kind == FieldKind::Composite {
            field.size = round_composite(field.size, (field.field.shape)().size);
        }
    }

    let (size, overhead) = size_and_overhead(&root, &fields);
    let segments = reconcile(fields, size);

    let own_paddings: usize = segments
        .iter()
        .map(|segment| match segment {
            Segment::Padding(padding) => padding.size,
            Segment::Field(_) => 0,
        })
        .sum();

    // count padding inside value-type fields too; reference fields are
    // excluded because the referenced data is not exclusively ours
    let mut nested_paddings = 0;
    for segment in &segments {
        if let Segment::Field(field) = segment {
            if matches!(field.field.kind, FieldKind::Composite | FieldKind::Nullable) {
                let nested = compute_layout((field.field.shape)(), field.field.shape, opaque, cache)?;
                nested_paddings += nested.paddings;
            }
        }
    }

    let layout = TypeLayout {
        ident,
        size,
        overhead,
        paddings: own_paddings + nested_paddings,
        segments,
    };

    if cacheable {
        if let Some(cache) = cache {
            cache.insert(layout.clone());
        }
    }

    Ok(layout)
}

/// Value types report their declared instance size with no overhead. Heap
/// types report their probed field extent rounded up to a pointer boundary,
/// plus two pointer widths of header.
fn size_and_overhead(root: &RootNode, fields: &[FieldLayout]) -> (usize, usize) {
    if !root.heap {
        return (root.size, 0);
    }

    let ptr = pointer_width();
    let overhead = 2 * ptr;
    let Some(end) = fields.iter().map(|field| field.offset + field.size).max() else {
        // an empty heap instance still occupies one pointer
        return (ptr, overhead);
    };

    let mask = ptr - 1;
    ((end + mask) & !mask, overhead)
}
