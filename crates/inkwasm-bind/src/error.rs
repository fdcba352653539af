//! Binding model error types.

use std::path::PathBuf;

/// Errors raised while building or validating the binding model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    /// An error tied to an annotated declaration in a source file.
    #[error("{}:{line}: {message}", file.display())]
    Located {
        file: PathBuf,
        line: usize,
        message: String,
    },

    /// A composite shape wrapped something other than a named type.
    #[error("unsupported indirection: {detail}")]
    Indirection { detail: String },

    /// A marker carried a hint keyword outside the known set.
    #[error("unknown hint '{0}'")]
    UnknownHint(String),
}

impl BindError {
    /// Attach a file and line to an error that has no location yet.
    pub fn at(self, file: impl Into<PathBuf>, line: usize) -> Self {
        match self {
            located @ BindError::Located { .. } => located,
            other => BindError::Located {
                file: file.into(),
                line,
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias for binding model operations.
pub type Result<T> = std::result::Result<T, BindError>;
