use thiserror::Error;

/// Failures with a meaning of their own. Anything else travels as a plain
/// `color_eyre::Report`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SheetError {
    /// A column getter failed for one cell.
    #[error("{0}")]
    Computation(String),
    /// A raw value did not convert to the column type.
    #[error("cannot convert {raw:?} to {type_name}")]
    TypeCoercion { raw: String, type_name: &'static str },
    /// A write was refused.
    #[error("{0}")]
    ReadOnly(&'static str),
    /// No binding for the pressed key under the pending prefix.
    #[error("no command for key \"{key}\" with prefixes \"{prefix}\"")]
    CommandLookup { key: String, prefix: String },
    /// A search or lookup came up empty.
    #[error("{0}")]
    NotFound(String),
    /// An in-command prompt was dismissed.
    #[error("{0}")]
    Cancelled(String),
}

impl SheetError {
    pub fn no_setter() -> Self {
        SheetError::ReadOnly("column is read-only")
    }

    pub fn readonly_mode() -> Self {
        SheetError::ReadOnly("readonly mode")
    }
}
