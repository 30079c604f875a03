use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayoutError {
    /// The field's shape can't be categorized for probing.
    #[error("field `{field}` of {owner} has an unsupported shape: {reason}")]
    UnsupportedField {
        owner: &'static str,
        field: &'static str,
        reason: &'static str,
    },

    /// A dummy instance of the type can't be allocated.
    #[error("can't create a dummy instance of {0}")]
    Uninstantiable(&'static str),

    /// The byte scan walked the whole instance without the field's observed
    /// value ever diverging from its default.
    #[error("no byte of {owner} changes the observed value of `{field}`")]
    DiscoveryFailed {
        owner: &'static str,
        field: &'static str,
    },
}

pub type LayoutResult<T> = Result<T, LayoutError>;
