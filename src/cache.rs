use crate::{ident::TypeIdent, layout::TypeLayout};
use dashmap::DashMap;

/// Caller-owned cache of fully computed layouts.
///
/// Only successful computations are inserted, entries are never evicted, and
/// concurrent first-writer-wins inserts leave published entries untouched.
pub struct LayoutCache {
    layouts: DashMap<TypeIdent, TypeLayout>,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self {
            layouts: DashMap::new(),
        }
    }

    pub(crate) fn get(&self, ident: &TypeIdent) -> Option<TypeLayout> {
        self.layouts.get(ident).map(|entry| entry.value().clone())
    }

    pub(crate) fn insert(&self, layout: TypeLayout) {
        self.layouts.entry(layout.ident()).or_insert(layout);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}
