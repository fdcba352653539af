//! Boundary-crossing value descriptors and annotated declarations.
//!
//! An [`Argument`] describes one parameter, result, or exported struct field.
//! Its shape is stored as a closed enum so the mode/sub-type/length
//! invariants hold by construction: only composite modes carry a sub-shape,
//! only arrays carry a length, and a sub-shape is always a named type.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{BindError, Result};

/// Name recorded for unnamed parameters and filler fields.
pub const DISCARD_NAME: &str = "_";

/// Canonical type name of the runtime's boundary handle.
pub const OBJECT_TYPE: &str = "inkwasm.Object";

/// Shape classification of a boundary-crossing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// A named value passed by value.
    Static,
    /// A reference or raw pointer to a named value.
    Pointer,
    /// A fixed-length array stored inline.
    Array,
    /// A dynamic sequence passed as pointer and length.
    Slice,
}

impl Mode {
    /// Whether arguments of this mode carry a sub-shape.
    pub fn has_sub_type(self) -> bool {
        !matches!(self, Mode::Static)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Static => write!(f, "static"),
            Mode::Pointer => write!(f, "pointer"),
            Mode::Array => write!(f, "array"),
            Mode::Slice => write!(f, "slice"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
enum Shape {
    Static {
        #[serde(rename = "type")]
        type_name: String,
    },
    Pointer {
        sub_type: Box<Argument>,
    },
    Array {
        sub_type: Box<Argument>,
        length: u64,
    },
    Slice {
        sub_type: Box<Argument>,
    },
}

/// One boundary-crossing value descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Argument {
    /// Declared identifier, or [`DISCARD_NAME`].
    pub name: String,
    /// Script-visible rename for exported struct fields.
    pub tag: Option<String>,
    #[serde(flatten)]
    shape: Shape,
}

impl Argument {
    /// A named value passed by value.
    pub fn named(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Argument {
            name: name.into(),
            tag: None,
            shape: Shape::Static {
                type_name: type_name.into(),
            },
        }
    }

    /// A pointer to `pointee`, which must itself be a named value.
    pub fn pointer(name: impl Into<String>, pointee: Argument) -> Result<Self> {
        let sub_type = Self::element(pointee, "pointer to")?;
        Ok(Argument {
            name: name.into(),
            tag: None,
            shape: Shape::Pointer { sub_type },
        })
    }

    /// A fixed array of `length` elements.
    pub fn array(name: impl Into<String>, element: Argument, length: u64) -> Result<Self> {
        let sub_type = Self::element(element, "array of")?;
        Ok(Argument {
            name: name.into(),
            tag: None,
            shape: Shape::Array { sub_type, length },
        })
    }

    /// A dynamic sequence of elements.
    pub fn slice(name: impl Into<String>, element: Argument) -> Result<Self> {
        let sub_type = Self::element(element, "slice of")?;
        Ok(Argument {
            name: name.into(),
            tag: None,
            shape: Shape::Slice { sub_type },
        })
    }

    /// Set the exported field rename.
    pub fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }

    fn element(element: Argument, what: &str) -> Result<Box<Argument>> {
        if element.mode() != Mode::Static {
            return Err(BindError::Indirection {
                detail: format!("{what} {} is not representable", element.mode()),
            });
        }
        Ok(Box::new(element))
    }

    /// Shape classification.
    pub fn mode(&self) -> Mode {
        match &self.shape {
            Shape::Static { .. } => Mode::Static,
            Shape::Pointer { .. } => Mode::Pointer,
            Shape::Array { .. } => Mode::Array,
            Shape::Slice { .. } => Mode::Slice,
        }
    }

    /// Canonical type name. Composite shapes report their element's name,
    /// which is also the key used for bridge table lookups.
    pub fn type_name(&self) -> &str {
        match &self.shape {
            Shape::Static { type_name } => type_name,
            Shape::Pointer { sub_type } | Shape::Array { sub_type, .. } | Shape::Slice { sub_type } => {
                sub_type.type_name()
            }
        }
    }

    /// Pointee or element descriptor.
    pub fn sub_type(&self) -> Option<&Argument> {
        match &self.shape {
            Shape::Static { .. } => None,
            Shape::Pointer { sub_type } | Shape::Array { sub_type, .. } | Shape::Slice { sub_type } => {
                Some(sub_type)
            }
        }
    }

    /// Element count of an array.
    pub fn length(&self) -> Option<u64> {
        match &self.shape {
            Shape::Array { length, .. } => Some(*length),
            _ => None,
        }
    }

    /// Whether the argument was declared without a usable name.
    pub fn is_discard(&self) -> bool {
        self.name == DISCARD_NAME
    }

    /// Name used on the script side: the tag when present, else the name.
    pub fn script_name(&self) -> &str {
        self.tag.as_deref().unwrap_or(&self.name)
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shape {
            Shape::Static { type_name } => write!(f, "{type_name}"),
            Shape::Pointer { sub_type } => write!(f, "*{sub_type}"),
            Shape::Array { sub_type, length } => write!(f, "[{sub_type}; {length}]"),
            Shape::Slice { sub_type } => write!(f, "[{sub_type}]"),
        }
    }
}

/// Call shape requested by a marker comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Hint {
    /// Invoke the target.
    Func,
    /// Construct with the target as constructor.
    New,
    /// Read a property.
    Get,
    /// Write a property.
    Set,
    /// Export a struct layout to the script side.
    Export,
}

impl Hint {
    /// Parse a hint keyword.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "func" => Ok(Hint::Func),
            "new" => Ok(Hint::New),
            "get" => Ok(Hint::Get),
            "set" => Ok(Hint::Set),
            "export" => Ok(Hint::Export),
            other => Err(BindError::UnknownHint(other.to_string())),
        }
    }

    /// The keyword as written in a marker.
    pub fn as_str(self) -> &'static str {
        match self {
            Hint::Func => "func",
            Hint::New => "new",
            Hint::Get => "get",
            Hint::Set => "set",
            Hint::Export => "export",
        }
    }

    /// Whether the hint annotates a struct rather than a function.
    pub fn is_export(self) -> bool {
        matches!(self, Hint::Export)
    }
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host side of an annotated declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostSignature {
    /// Function or struct identifier.
    pub name: String,
    /// Parameters, or struct fields for exports.
    pub arguments: Vec<Argument>,
    /// Results in declaration order.
    pub results: Vec<Argument>,
}

/// Script side of an annotated declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptTarget {
    /// Target path or expression; empty for exports.
    pub path: String,
    /// Requested call shape.
    pub hint: Hint,
}

impl ScriptTarget {
    /// Whether the path is relative to the first argument.
    pub fn is_receiver_relative(&self) -> bool {
        self.path.starts_with('.')
    }

    /// The path with the receiver marker stripped; empty when the receiver
    /// itself is the target.
    pub fn member(&self) -> &str {
        self.path.strip_prefix('.').unwrap_or(&self.path)
    }
}

/// One annotated declaration discovered in a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Function {
    /// Source file containing the declaration.
    pub file: PathBuf,
    /// Line of the declaration keyword.
    pub line: usize,
    /// Whether the declaration only exists in test builds.
    pub is_test: bool,
    /// Host-side signature.
    pub host: HostSignature,
    /// Script-side target.
    pub script: ScriptTarget,
}

impl Function {
    /// Build an error located at this declaration.
    pub fn create_error(&self, message: impl fmt::Display) -> BindError {
        BindError::Located {
            file: self.file.clone(),
            line: self.line,
            message: message.to_string(),
        }
    }

    /// Which generated artifact set this declaration belongs to.
    pub fn set(&self) -> DeclarationSet {
        if self.is_test {
            DeclarationSet::Test
        } else {
            DeclarationSet::Release
        }
    }
}

/// Grouping key for discovered declarations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Package {
    /// Package name as declared in its manifest.
    pub name: String,
    /// Package root directory.
    pub dir: PathBuf,
    /// Fully-qualified crate path used in source code.
    pub path: String,
}

/// The two artifact sets generated per package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeclarationSet {
    Release,
    Test,
}

/// All declarations discovered in one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageBindings {
    pub package: Package,
    pub functions: Vec<Function>,
}

impl PackageBindings {
    /// Declarations belonging to one artifact set.
    pub fn select(&self, set: DeclarationSet) -> Vec<&Function> {
        self.functions.iter().filter(|f| f.set() == set).collect()
    }
}
