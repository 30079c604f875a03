use std::{
    any::TypeId,
    fmt,
    hash::{Hash, Hasher},
};

/// Identity of a probed type: its [`TypeId`] plus a diagnostic name.
///
/// Equality and hashing go through the id only; the name is carried for
/// error messages and rendering.
#[derive(Clone, Copy, Debug)]
pub struct TypeIdent {
    id: TypeId,
    name: &'static str,
}

impl TypeIdent {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeIdent {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeIdent {}

impl Hash for TypeIdent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
