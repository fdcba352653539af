//! Boundary object runtime for wasm32 modules hosted by a JavaScript engine.
//!
//! The host side of every script value is an [`Object`]: a 16-byte handle
//! carrying a type tag, an inline payload for numbers and booleans, and a
//! reference into the script runtime's object table for everything else.
//! Operations on Objects go through the [`Boundary`] installed on the
//! current thread.
//!
//! ```ignore
//! let document = inkwasm::global().get_property("document")?.scoped();
//! let title = document.get_property("title")?.scoped();
//! println!("{}", title.as_string()?);
//! ```
//!
//! ## Modules
//!
//! - [`abi`]: Argument words and call frames shared with the script runtime
//! - [`args`]: The closed set of call argument kinds
//! - [`runtime`]: Boundary installation and singletons
//! - `sim`: In-process simulated engine (feature `sim`)

pub mod abi;
pub mod args;
pub mod error;
mod kind;
mod object;
pub mod runtime;

#[cfg(target_arch = "wasm32")]
mod js;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use args::{verify_args, Arg, Dynamic};
pub use error::{Error, Result};
pub use kind::ObjectType;
pub use object::{Object, Scoped, MAX_SAFE_INTEGER};
pub use runtime::{global, install, is_installed, null, undefined, Boundary};

#[cfg(target_arch = "wasm32")]
pub use js::JsBoundary;

/// The script-side runtime library. Load it before the generated
/// `inkwasm_js.js` files, then instantiate the module with
/// `globalThis.inkwasm.Internal.instantiate(source)`.
pub const RUNTIME_JS: &str = include_str!("../assets/inkwasm_runtime.js");
