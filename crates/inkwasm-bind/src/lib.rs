//! Argument model and bridge tables for inkwasm boundary bindings.
//!
//! Describes values crossing the boundary between a wasm32 host module and
//! the script engine embedding it, and maps every shape the parser can
//! produce to the script-side accessor routine and frame width used to move
//! it.
//!
//! ## Modules
//!
//! - [`model`]: Arguments, annotated functions, and packages
//! - [`bridge`]: Load/store bridge tables keyed by mode and type
//! - [`error`]: Shared error type with source-located messages

pub mod bridge;
pub mod error;
pub mod model;

pub use bridge::{lookup, BridgeFuncInfo, Direction, Width};
pub use error::{BindError, Result};
pub use model::{
    Argument, DeclarationSet, Function, Hint, HostSignature, Mode, Package, PackageBindings,
    ScriptTarget, DISCARD_NAME, OBJECT_TYPE,
};
