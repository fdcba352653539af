//! Boundary installation and the per-thread runtime.
//!
//! Every [`Object`] operation that needs the script engine goes through the
//! [`Boundary`] installed on the current thread. On `wasm32` the JavaScript
//! boundary is installed on first use; elsewhere a boundary (usually the
//! simulated engine) must be installed explicitly with [`install`].

use std::cell::OnceCell;

use crate::abi::EncodedArgs;
use crate::args::Arg;
use crate::error::{Error, Result};
use crate::kind::ObjectType;
use crate::object::Object;

/// Script-engine routines backing [`Object`] operations.
///
/// Methods returning `Option<Object>` return `None` when the script side
/// threw or the target is missing; the details go to the script console.
/// Returned Objects carry a fresh reference the caller owns.
pub trait Boundary {
    /// The script global object.
    fn global(&self) -> Object;

    /// Release a reference. Releasing twice is reported, not fatal.
    fn free(&self, reference: u32);

    /// `{}` for no arguments, otherwise an array of the arguments.
    fn make(&self, args: &EncodedArgs<'_>) -> Option<Object>;

    fn call(&self, target: &Object, method: &str, args: &EncodedArgs<'_>) -> Option<Object>;

    fn invoke(&self, target: &Object, args: &EncodedArgs<'_>) -> Option<Object>;

    fn construct(&self, target: &Object, args: &EncodedArgs<'_>) -> Option<Object>;

    fn get_property(&self, target: &Object, name: &str) -> Option<Object>;

    fn get_index(&self, target: &Object, index: u32) -> Option<Object>;

    fn set_property(&self, target: &Object, name: &str, value: &Arg<'_>) -> bool;

    /// UTF-8 encode a string into a new byte-array Object.
    fn encode_string(&self, target: &Object) -> Option<Object>;

    /// Copy the bytes of an array-like Object, returning the count copied.
    fn copy_bytes(&self, source: &Object, buf: &mut [u8]) -> usize;

    fn instance_of(&self, target: &Object, constructor: &Object) -> bool;

    fn equal(&self, a: &Object, b: &Object) -> bool;

    fn strict_equal(&self, a: &Object, b: &Object) -> bool;

    fn truthy(&self, target: &Object) -> bool;

    /// Value of a BigInt, `None` when it does not fit in 128 bits.
    fn bigint(&self, target: &Object) -> Option<i128>;
}

struct Runtime {
    boundary: Box<dyn Boundary>,
    global: Object,
    undefined: Object,
    null: Object,
}

impl Runtime {
    fn new(boundary: Box<dyn Boundary>) -> Self {
        let global = boundary.global().into_protected();
        Runtime {
            boundary,
            global,
            undefined: Object::inline(ObjectType::Undefined).into_protected(),
            null: Object::inline(ObjectType::Null).into_protected(),
        }
    }
}

thread_local! {
    static RUNTIME: OnceCell<Runtime> = const { OnceCell::new() };
}

/// Install `boundary` for the current thread.
///
/// Fails with [`Error::AlreadyInstalled`] if a boundary is already in
/// place, including the implicit JavaScript boundary on `wasm32`.
pub fn install(boundary: impl Boundary + 'static) -> Result<()> {
    RUNTIME.with(|cell| {
        if cell.get().is_some() {
            return Err(Error::AlreadyInstalled);
        }
        let runtime = Runtime::new(Box::new(boundary));
        cell.set(runtime).map_err(|_| Error::AlreadyInstalled)?;
        tracing::debug!("boundary installed");
        Ok(())
    })
}

/// Whether a boundary is installed on the current thread.
pub fn is_installed() -> bool {
    RUNTIME.with(|cell| cell.get().is_some())
}

fn try_runtime<R>(f: impl FnOnce(&Runtime) -> R) -> Result<R> {
    RUNTIME.with(|cell| {
        #[cfg(target_arch = "wasm32")]
        let runtime = Some(cell.get_or_init(|| Runtime::new(Box::new(crate::js::JsBoundary))));
        #[cfg(not(target_arch = "wasm32"))]
        let runtime = cell.get();
        runtime.map(f).ok_or(Error::NotInstalled)
    })
}

#[track_caller]
fn runtime<R>(f: impl FnOnce(&Runtime) -> R) -> R {
    match try_runtime(f) {
        Ok(value) => value,
        Err(_) => panic!("inkwasm: no boundary installed on this thread; call inkwasm::install first"),
    }
}

pub(crate) fn try_with<R>(f: impl FnOnce(&dyn Boundary) -> R) -> Result<R> {
    try_runtime(|rt| f(rt.boundary.as_ref()))
}

/// Like [`try_with`] for operations with no error channel.
///
/// # Panics
///
/// Panics if no boundary is installed.
#[track_caller]
pub(crate) fn with<R>(f: impl FnOnce(&dyn Boundary) -> R) -> R {
    runtime(|rt| f(rt.boundary.as_ref()))
}

/// The script global object (`globalThis`). Protected: freeing it is a no-op.
///
/// # Panics
///
/// Panics if no boundary is installed.
#[track_caller]
pub fn global() -> Object {
    runtime(|rt| rt.global)
}

/// The protected `undefined` singleton.
#[track_caller]
pub fn undefined() -> Object {
    runtime(|rt| rt.undefined)
}

/// The protected `null` singleton.
#[track_caller]
pub fn null() -> Object {
    runtime(|rt| rt.null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimEngine;

    #[test]
    fn not_installed() {
        assert!(!is_installed());
        assert_eq!(Object::make(&[]).unwrap_err(), Error::NotInstalled);
        assert!(std::panic::catch_unwind(global).is_err());
    }

    #[test]
    fn install_once() {
        install(SimEngine::new()).unwrap();
        assert!(is_installed());
        assert_eq!(install(SimEngine::new()), Err(Error::AlreadyInstalled));
    }

    #[test]
    fn singletons_are_protected() {
        let engine = SimEngine::new();
        install(engine.clone()).unwrap();
        let g = global();
        assert!(g.is_protected());
        assert_eq!(g.type_of(), ObjectType::Object);
        g.free();
        global().free();
        undefined().free();
        null().free();
        assert_eq!(engine.stats().releases, 0);
        assert!(undefined().is_undefined());
        assert!(null().is_null());
        assert!(undefined().equal(&null()));
    }
}
