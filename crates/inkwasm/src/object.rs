//! The boundary handle.

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::ops::Deref;

use bytemuck::{Pod, Zeroable};

use crate::abi::{self, EncodedArg, OBJECT_SIZE};
use crate::args::Arg;
use crate::error::{Error, Result};
use crate::kind::ObjectType;
use crate::runtime;

/// Largest integer a script number represents exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// One script-side value visible to the host.
///
/// Numbers, booleans, `undefined`, and `null` are carried inline. Every
/// other type holds a reference into the script runtime's object table and
/// must be released exactly once with [`Object::free`] (or by wrapping it in
/// a [`Scoped`] guard). `Object` is `Copy` so it can travel through frames
/// and argument lists; copies share the same reference.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct Object {
    /// f64 bits for numbers, 0/1 for booleans, a table index otherwise.
    value: u64,
    typ: u8,
    protected: u8,
    _reserved: [u8; 2],
    /// Length of strings and array-like objects.
    len: u32,
}

const _: () = assert!(mem::size_of::<Object>() == OBJECT_SIZE);
const _: () = assert!(mem::align_of::<Object>() == abi::FRAME_ALIGN);

thread_local! {
    static SCRATCH: RefCell<Vec<EncodedArg>> = const { RefCell::new(Vec::new()) };
}

/// Encode `args` into the thread's scratch buffer and run `f` with the words.
fn with_encoded<R>(args: &[Arg<'_>], f: impl FnOnce(&abi::EncodedArgs<'_>) -> R) -> R {
    SCRATCH.with(|scratch| match scratch.try_borrow_mut() {
        Ok(mut buf) => f(&abi::encode_args(args, &mut buf)),
        // Re-entered from inside a call; fall back to a fresh buffer.
        Err(_) => f(&abi::encode_args(args, &mut Vec::with_capacity(args.len()))),
    })
}

impl Object {
    pub(crate) fn from_raw(value: u64, tag: u8, len: u32) -> Self {
        Object {
            value,
            typ: tag,
            protected: 0,
            _reserved: [0; 2],
            len,
        }
    }

    /// A reference-holding Object with the given table index.
    pub(crate) fn from_reference(typ: ObjectType, reference: u32, len: u32) -> Self {
        Object::from_raw(u64::from(reference), typ.tag(), len)
    }

    /// An inline number.
    pub fn number(value: f64) -> Self {
        Object::from_raw(value.to_bits(), ObjectType::Number.tag(), 0)
    }

    /// An inline boolean.
    pub fn boolean(value: bool) -> Self {
        Object::from_raw(u64::from(value), ObjectType::Boolean.tag(), 0)
    }

    pub(crate) fn inline(typ: ObjectType) -> Self {
        Object::from_raw(0, typ.tag(), 0)
    }

    pub(crate) fn into_protected(mut self) -> Self {
        self.protected = 1;
        self
    }

    pub(crate) fn raw_value(&self) -> u64 {
        self.value
    }

    /// Script-side table index of a reference-holding Object.
    pub fn reference(&self) -> Option<u32> {
        self.type_of().holds_reference().then_some(self.value as u32)
    }

    /// Create `{}` when `args` is empty, otherwise an array of `args`.
    pub fn make(args: &[Arg<'_>]) -> Result<Object> {
        runtime::try_with(|b| with_encoded(args, |encoded| b.make(encoded)))?.ok_or(Error::Execution)
    }

    /// Release the script-side reference. Protected singletons and inline
    /// values are left alone.
    pub fn free(self) {
        if self.is_protected() {
            return;
        }
        if let Some(reference) = self.reference() {
            runtime::with(|b| b.free(reference));
        }
    }

    /// Release the Object when the guard is dropped.
    pub fn scoped(self) -> Scoped {
        Scoped(self)
    }

    pub fn is_protected(&self) -> bool {
        self.protected != 0
    }

    pub fn type_of(&self) -> ObjectType {
        ObjectType::from_tag(self.typ)
    }

    pub fn is_undefined(&self) -> bool {
        self.type_of() == ObjectType::Undefined
    }

    pub fn is_null(&self) -> bool {
        self.type_of() == ObjectType::Null
    }

    /// Length of a string or array-like Object. Use
    /// `get_property("length")` for lengths beyond `u32`.
    pub fn length(&self) -> u32 {
        self.len
    }

    /// Call `method` on this Object. The result must be released.
    pub fn call(&self, method: &str, args: &[Arg<'_>]) -> Result<Object> {
        runtime::try_with(|b| with_encoded(args, |encoded| b.call(self, method, encoded)))?.ok_or(Error::Execution)
    }

    /// Like [`Object::call`], discarding the result.
    pub fn call_void(&self, method: &str, args: &[Arg<'_>]) -> Result<()> {
        self.call(method, args).map(Object::free)
    }

    /// Call this Object as a function. The result must be released.
    pub fn invoke(&self, args: &[Arg<'_>]) -> Result<Object> {
        runtime::try_with(|b| with_encoded(args, |encoded| b.invoke(self, encoded)))?.ok_or(Error::Execution)
    }

    /// Like [`Object::invoke`], discarding the result.
    pub fn invoke_void(&self, args: &[Arg<'_>]) -> Result<()> {
        self.invoke(args).map(Object::free)
    }

    /// Use this Object as a constructor (`new`).
    pub fn construct(&self, args: &[Arg<'_>]) -> Result<Object> {
        runtime::try_with(|b| with_encoded(args, |encoded| b.construct(self, encoded)))?.ok_or(Error::Execution)
    }

    pub fn get_property(&self, name: &str) -> Result<Object> {
        runtime::try_with(|b| b.get_property(self, name))?.ok_or(Error::Execution)
    }

    pub fn get_index(&self, index: u32) -> Result<Object> {
        runtime::try_with(|b| b.get_index(self, index))?.ok_or(Error::Execution)
    }

    pub fn set_property(&self, name: &str, value: Arg<'_>) -> Result<()> {
        if runtime::try_with(|b| b.set_property(self, name, &value))? {
            Ok(())
        } else {
            Err(Error::Execution)
        }
    }

    /// Booleans, and numbers compared against zero.
    pub fn as_bool(&self) -> Result<bool> {
        match self.type_of() {
            ObjectType::Boolean => Ok(self.value != 0),
            ObjectType::Number => {
                let v = f64::from_bits(self.value);
                Ok(v != 0.0 && !v.is_nan())
            }
            found => Err(Error::InvalidType {
                expected: "boolean",
                found,
            }),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self.type_of() {
            ObjectType::Number => Ok(f64::from_bits(self.value)),
            found => Err(Error::InvalidType {
                expected: "number",
                found,
            }),
        }
    }

    /// The number truncated toward zero, if its magnitude is at most
    /// [`MAX_SAFE_INTEGER`].
    pub fn as_int(&self) -> Result<i64> {
        let v = self.as_float()?;
        if !v.is_finite() || v.abs() > MAX_SAFE_INTEGER {
            return Err(Error::OutOfRange(v));
        }
        Ok(v.trunc() as i64)
    }

    /// The exact value of a BigInt, when it fits in 128 bits.
    pub fn as_bigint(&self) -> Result<i128> {
        match self.type_of() {
            ObjectType::BigInt => runtime::try_with(|b| b.bigint(self))?.ok_or(Error::Execution),
            found => Err(Error::InvalidType {
                expected: "bigint",
                found,
            }),
        }
    }

    /// Decode a string, or the bytes of an array-like object, as UTF-8.
    pub fn as_string(&self) -> Result<String> {
        let bytes = self.as_bytes()?;
        String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }

    /// UTF-8 bytes of a string, or the raw bytes of an array-like object.
    pub fn as_bytes(&self) -> Result<Vec<u8>> {
        match self.type_of() {
            ObjectType::String => {
                let encoded = runtime::try_with(|b| b.encode_string(self))?
                    .ok_or(Error::Execution)?
                    .scoped();
                encoded.as_bytes()
            }
            ObjectType::Object => {
                let mut buf = vec![0u8; self.len as usize];
                let copied = self.copy_bytes(&mut buf)?;
                buf.truncate(copied);
                Ok(buf)
            }
            found => Err(Error::InvalidType {
                expected: "string or object",
                found,
            }),
        }
    }

    /// Copy the bytes of an array-like object into `buf`, returning how
    /// many were copied.
    pub fn copy_bytes(&self, buf: &mut [u8]) -> Result<usize> {
        match self.type_of() {
            ObjectType::Object => runtime::try_with(|b| b.copy_bytes(self, buf)),
            found => Err(Error::InvalidType {
                expected: "object",
                found,
            }),
        }
    }

    /// The bytes of an array-like object reinterpreted as `T` elements.
    pub fn to_vec<T: Pod>(&self) -> Result<Vec<T>> {
        let size = mem::size_of::<T>().max(1);
        let mut values = vec![T::zeroed(); self.len as usize / size];
        let copied = self.copy_bytes(bytemuck::cast_slice_mut(&mut values))?;
        values.truncate(copied / size);
        Ok(values)
    }

    /// `this instanceof constructor`.
    pub fn instance_of(&self, constructor: &Object) -> bool {
        runtime::with(|b| b.instance_of(self, constructor))
    }

    /// Script truthiness: `false`, `0`, `NaN`, `""`, `0n`, `null`, and
    /// `undefined` are falsy.
    pub fn truthy(&self) -> bool {
        match self.type_of() {
            ObjectType::Undefined | ObjectType::Null => false,
            ObjectType::Boolean => self.value != 0,
            ObjectType::Number => {
                let v = f64::from_bits(self.value);
                v != 0.0 && !v.is_nan()
            }
            ObjectType::String => self.len > 0,
            ObjectType::BigInt => runtime::with(|b| b.truthy(self)),
            ObjectType::Symbol | ObjectType::Function | ObjectType::Object => true,
        }
    }

    /// Loose equality (`==`).
    pub fn equal(&self, other: &Object) -> bool {
        use ObjectType::*;
        match (self.type_of(), other.type_of()) {
            (Undefined | Null, Undefined | Null) => true,
            (Undefined | Null, _) | (_, Undefined | Null) => false,
            (Number | Boolean, Number | Boolean) => self.numeric() == other.numeric(),
            _ => runtime::with(|b| b.equal(self, other)),
        }
    }

    /// Strict equality (`===`).
    pub fn strict_equal(&self, other: &Object) -> bool {
        use ObjectType::*;
        match (self.type_of(), other.type_of()) {
            (a, b) if a != b => false,
            (Undefined | Null, _) => true,
            (Boolean, _) => self.value == other.value,
            (Number, _) => f64::from_bits(self.value) == f64::from_bits(other.value),
            _ => runtime::with(|b| b.strict_equal(self, other)),
        }
    }

    fn numeric(&self) -> f64 {
        match self.type_of() {
            ObjectType::Boolean => f64::from(u8::from(self.value != 0)),
            _ => f64::from_bits(self.value),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Object");
        s.field("type", &self.type_of());
        match self.type_of() {
            ObjectType::Boolean => s.field("value", &(self.value != 0)),
            ObjectType::Number => s.field("value", &f64::from_bits(self.value)),
            t if t.holds_reference() => s.field("reference", &(self.value as u32)),
            _ => &mut s,
        };
        if self.len != 0 {
            s.field("len", &self.len);
        }
        if self.is_protected() {
            s.field("protected", &true);
        }
        s.finish()
    }
}

/// Releases its Object when dropped.
#[derive(Debug)]
pub struct Scoped(Object);

impl Scoped {
    /// Give up ownership without releasing.
    pub fn into_inner(self) -> Object {
        let object = self.0;
        mem::forget(self);
        object
    }
}

impl Deref for Scoped {
    type Target = Object;

    fn deref(&self) -> &Object {
        &self.0
    }
}

impl Drop for Scoped {
    fn drop(&mut self) {
        self.0.free();
    }
}
