//! Generator error types.

use std::fmt;
use std::path::PathBuf;

use inkwasm_bind::{Function, Hint};
use inkwasm_parser::ParseError;

/// Source position of a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
}

impl Location {
    pub fn of(function: &Function) -> Self {
        Location {
            file: function.file.clone(),
            line: function.line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// Errors that can occur while generating binding artifacts.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// Declaration discovery failed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// No bridge accessor exists for the type in this position.
    #[error("{location}: unsupported {context} type '{type_name}'")]
    UnsupportedType {
        location: Location,
        context: &'static str,
        type_name: String,
    },

    /// Pointer-shaped values can be passed in but never returned.
    #[error("{location}: pointer results are not supported")]
    PointerResult { location: Location },

    /// Exported structs are passed by address and cannot be produced.
    #[error("{location}: exported struct '{name}' cannot be returned, only passed as an argument")]
    StructResult { location: Location, name: String },

    /// The argument or result list does not fit the hint.
    #[error("{location}: '{hint}' {detail}")]
    Arity {
        location: Location,
        hint: Hint,
        detail: String,
    },

    /// More results than one value plus a trailing success flag.
    #[error("{location}: at most one result and a trailing bool success flag are supported, found {count} results")]
    TooManyResults { location: Location, count: usize },

    /// Two declarations of one set share a name.
    #[error("{location}: duplicate name '{name}', first declared at {first}")]
    DuplicateName {
        location: Location,
        name: String,
        first: Location,
    },

    /// A frame or struct layout does not fit 32-bit linear memory.
    #[error("{location}: '{name}' does not fit in 32-bit linear memory")]
    FrameTooLarge { location: Location, name: String },

    /// An exported struct contains itself by value.
    #[error("{location}: exported struct '{name}' contains itself")]
    RecursiveStruct { location: Location, name: String },

    /// `[package.metadata.inkwasm]` could not be deserialized.
    #[error("invalid inkwasm configuration in {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// I/O error with the offending path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A per-package generation task panicked.
    #[error("generation for package '{package}' panicked")]
    Panicked { package: String },
}

impl GenerateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GenerateError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn too_large(function: &Function) -> Self {
        GenerateError::FrameTooLarge {
            location: Location::of(function),
            name: function.host.name.clone(),
        }
    }

    pub(crate) fn arity(function: &Function, detail: impl Into<String>) -> Self {
        GenerateError::Arity {
            location: Location::of(function),
            hint: function.script.hint,
            detail: detail.into(),
        }
    }
}

/// Result type alias for generator operations.
pub type Result<T> = std::result::Result<T, GenerateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_lead_with_location() {
        let location = Location {
            file: PathBuf::from("src/lib.rs"),
            line: 7,
        };
        let err = GenerateError::UnsupportedType {
            location: location.clone(),
            context: "result",
            type_name: "str".into(),
        };
        assert_eq!(err.to_string(), "src/lib.rs:7: unsupported result type 'str'");

        let err = GenerateError::DuplicateName {
            location,
            name: "log".into(),
            first: Location {
                file: PathBuf::from("src/a.rs"),
                line: 2,
            },
        };
        assert_eq!(err.to_string(), "src/lib.rs:7: duplicate name 'log', first declared at src/a.rs:2");
    }
}
