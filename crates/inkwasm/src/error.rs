//! Runtime error types.

use crate::kind::ObjectType;

/// Errors returned by boundary operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A dynamically-typed argument is outside the supported kind set.
    #[error("argument {position}: unsupported argument type of {kind}")]
    UnsupportedArgument { position: usize, kind: &'static str },

    /// The script side threw or the target is missing. Details are on the
    /// script console.
    #[error("error while executing/calling JavaScript, see the console log for details")]
    Execution,

    /// The Object's type does not support the requested conversion.
    #[error("invalid type: expected {expected}, found {found}")]
    InvalidType {
        expected: &'static str,
        found: ObjectType,
    },

    /// The number is outside the exactly-representable integer range.
    #[error("number {0} is not an exactly representable integer")]
    OutOfRange(f64),

    /// String bytes received from the script side are not UTF-8.
    #[error("invalid UTF-8 in string value")]
    InvalidUtf8,

    /// A boundary was already installed on this thread.
    #[error("a boundary is already installed on this thread")]
    AlreadyInstalled,

    /// No boundary is installed on this thread.
    #[error("no boundary installed on this thread")]
    NotInstalled,
}

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;
