//! Declaration parser error types.

use std::path::PathBuf;

use inkwasm_bind::BindError;

/// Errors that can occur while discovering annotated declarations.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// A marker or declaration problem located at a file and line.
    #[error(transparent)]
    Declaration(#[from] BindError),

    /// A source file is not valid Rust.
    #[error("{}:{line}: {message}", file.display())]
    Syntax {
        file: PathBuf,
        line: usize,
        message: String,
    },

    /// A `Cargo.toml` could not be deserialized.
    #[error("invalid manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The directory has no `[package]` manifest.
    #[error("no package manifest at {}", path.display())]
    NoPackage { path: PathBuf },

    /// The package has neither a library nor a binary root.
    #[error("package '{name}' has no crate root")]
    NoCrateRoot { name: String },

    /// A `workspace = true` dependency has no workspace entry.
    #[error("dependency '{name}' of {} is inherited from a workspace that does not define it", manifest.display())]
    UnresolvedWorkspaceDependency { name: String, manifest: PathBuf },

    /// I/O error with the offending path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ParseError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ParseError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn located(file: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        ParseError::Declaration(BindError::Located {
            file: file.into(),
            line,
            message: message.into(),
        })
    }
}

/// Result type alias for parser operations.
pub type Result<T> = std::result::Result<T, ParseError>;
