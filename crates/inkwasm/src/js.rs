//! The JavaScript boundary, imported from the `inkwasm` import module that
//! [`RUNTIME_JS`](crate::RUNTIME_JS) registers.

use std::mem::MaybeUninit;

use crate::abi::{self, EncodedArgs};
use crate::args::Arg;
use crate::object::Object;
use crate::runtime::Boundary;

#[link(wasm_import_module = "inkwasm")]
extern "C" {
    fn inkwasm_global(out: *mut Object);
    fn inkwasm_free(reference: u32);
    fn inkwasm_make(args: *const u8, count: u32, out: *mut Object) -> u32;
    fn inkwasm_call(
        target: *const Object,
        method: *const u8,
        method_len: u32,
        args: *const u8,
        count: u32,
        out: *mut Object,
    ) -> u32;
    fn inkwasm_invoke(target: *const Object, args: *const u8, count: u32, out: *mut Object) -> u32;
    fn inkwasm_construct(target: *const Object, args: *const u8, count: u32, out: *mut Object) -> u32;
    fn inkwasm_get_property(target: *const Object, name: *const u8, name_len: u32, out: *mut Object) -> u32;
    fn inkwasm_get_index(target: *const Object, index: u32, out: *mut Object) -> u32;
    fn inkwasm_set_property(target: *const Object, name: *const u8, name_len: u32, value: *const u8) -> u32;
    fn inkwasm_encode_string(target: *const Object, out: *mut Object) -> u32;
    fn inkwasm_copy_bytes(source: *const Object, buf: *mut u8, len: u32) -> u32;
    fn inkwasm_instance_of(target: *const Object, constructor: *const Object) -> u32;
    fn inkwasm_equal(a: *const Object, b: *const Object) -> u32;
    fn inkwasm_strict_equal(a: *const Object, b: *const Object) -> u32;
    fn inkwasm_truthy(target: *const Object) -> u32;
    fn inkwasm_bigint(target: *const Object, out: *mut i128) -> u32;
}

/// Run an import that writes an Object into `out` and reports success.
fn produce(f: impl FnOnce(*mut Object) -> u32) -> Option<Object> {
    let mut out = MaybeUninit::<Object>::zeroed();
    let ok = f(out.as_mut_ptr());
    // SAFETY: zeroed is a valid Object and the import writes a whole one.
    (ok != 0).then(|| unsafe { out.assume_init() })
}

/// Boundary backed by the script runtime of the embedding page.
pub struct JsBoundary;

impl Boundary for JsBoundary {
    fn global(&self) -> Object {
        let mut out = MaybeUninit::<Object>::zeroed();
        // SAFETY: the import writes one Object; zeroed is valid regardless.
        unsafe {
            inkwasm_global(out.as_mut_ptr());
            out.assume_init()
        }
    }

    fn free(&self, reference: u32) {
        // SAFETY: plain scalar import.
        unsafe { inkwasm_free(reference) }
    }

    fn make(&self, args: &EncodedArgs<'_>) -> Option<Object> {
        let words = args.as_bytes();
        // SAFETY: the words and their referenced memory outlive the call.
        produce(|out| unsafe { inkwasm_make(words.as_ptr(), args.len() as u32, out) })
    }

    fn call(&self, target: &Object, method: &str, args: &EncodedArgs<'_>) -> Option<Object> {
        let words = args.as_bytes();
        produce(|out| unsafe {
            inkwasm_call(
                target,
                method.as_ptr(),
                method.len() as u32,
                words.as_ptr(),
                args.len() as u32,
                out,
            )
        })
    }

    fn invoke(&self, target: &Object, args: &EncodedArgs<'_>) -> Option<Object> {
        let words = args.as_bytes();
        produce(|out| unsafe { inkwasm_invoke(target, words.as_ptr(), args.len() as u32, out) })
    }

    fn construct(&self, target: &Object, args: &EncodedArgs<'_>) -> Option<Object> {
        let words = args.as_bytes();
        produce(|out| unsafe { inkwasm_construct(target, words.as_ptr(), args.len() as u32, out) })
    }

    fn get_property(&self, target: &Object, name: &str) -> Option<Object> {
        produce(|out| unsafe { inkwasm_get_property(target, name.as_ptr(), name.len() as u32, out) })
    }

    fn get_index(&self, target: &Object, index: u32) -> Option<Object> {
        produce(|out| unsafe { inkwasm_get_index(target, index, out) })
    }

    fn set_property(&self, target: &Object, name: &str, value: &Arg<'_>) -> bool {
        let single = [*value];
        let mut buf = Vec::with_capacity(1);
        let encoded = abi::encode_args(&single, &mut buf);
        // SAFETY: the encoded word and the memory it points at live until return.
        unsafe { inkwasm_set_property(target, name.as_ptr(), name.len() as u32, encoded.as_bytes().as_ptr()) != 0 }
    }

    fn encode_string(&self, target: &Object) -> Option<Object> {
        produce(|out| unsafe { inkwasm_encode_string(target, out) })
    }

    fn copy_bytes(&self, source: &Object, buf: &mut [u8]) -> usize {
        // SAFETY: the script side writes at most `buf.len()` bytes.
        unsafe { inkwasm_copy_bytes(source, buf.as_mut_ptr(), buf.len() as u32) as usize }
    }

    fn instance_of(&self, target: &Object, constructor: &Object) -> bool {
        unsafe { inkwasm_instance_of(target, constructor) != 0 }
    }

    fn equal(&self, a: &Object, b: &Object) -> bool {
        unsafe { inkwasm_equal(a, b) != 0 }
    }

    fn strict_equal(&self, a: &Object, b: &Object) -> bool {
        unsafe { inkwasm_strict_equal(a, b) != 0 }
    }

    fn truthy(&self, target: &Object) -> bool {
        unsafe { inkwasm_truthy(target) != 0 }
    }

    fn bigint(&self, target: &Object) -> Option<i128> {
        let mut out = 0i128;
        (unsafe { inkwasm_bigint(target, &mut out) } != 0).then_some(out)
    }
}
