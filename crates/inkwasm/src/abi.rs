//! Wire formats shared with the script runtime.
//!
//! Two layouts cross the boundary:
//!
//! - Argument lists for dynamic calls ([`Object::call`] and friends) are
//!   encoded as a flat array of 16-byte [`EncodedArg`] words, each carrying
//!   an explicit kind discriminant. The script side walks the words without
//!   any reflection on host types.
//! - Generated forwarding functions pass a single pointer to a [`Frame`]:
//!   arguments at their natural alignment in declaration order, results
//!   from the next 8-byte boundary.
//!
//! [`Object::call`]: crate::Object::call

use std::marker::PhantomData;
use std::mem;

use bytemuck::{Pod, Zeroable};

use crate::args::Arg;
use crate::error::Result;
use crate::object::Object;

/// Size of an [`Object`] in frames and argument words.
pub const OBJECT_SIZE: usize = 16;

/// Alignment of a frame and of its result area.
pub const FRAME_ALIGN: usize = 8;

/// Discriminant of an [`EncodedArg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArgKind {
    Object = 0,
    Str = 1,
    F32 = 2,
    F64 = 3,
    Bool = 4,
    I8 = 5,
    I16 = 6,
    I32 = 7,
    I64 = 8,
    I128 = 9,
    Isize = 10,
    U8 = 11,
    U16 = 12,
    U32 = 13,
    U64 = 14,
    U128 = 15,
    Usize = 16,
    Ptr = 17,
    U8s = 18,
    I8s = 19,
    U16s = 20,
    I16s = 21,
    U32s = 22,
    I32s = 23,
    U64s = 24,
    I64s = 25,
}

/// One encoded argument word pair.
///
/// `payload` holds the value itself for scalars, the Object value for
/// Objects, and an address for strings, slices, and 128-bit integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct EncodedArg {
    kind: u8,
    /// Object type tag for Object arguments.
    tag: u8,
    _reserved: [u8; 2],
    /// Byte length of strings, element count of slices, Object length.
    len: u32,
    payload: u64,
}

const _: () = assert!(mem::size_of::<EncodedArg>() == 16);

impl EncodedArg {
    fn new(kind: ArgKind, payload: u64) -> Self {
        EncodedArg {
            kind: kind as u8,
            tag: 0,
            _reserved: [0; 2],
            len: 0,
            payload,
        }
    }

    fn with_len(mut self, len: usize) -> Self {
        self.len = len as u32;
        self
    }

    fn encode(arg: &Arg<'_>) -> Self {
        fn addr<T>(data: *const T) -> u64 {
            data as usize as u64
        }
        match arg {
            Arg::Object(object) => EncodedArg {
                kind: ArgKind::Object as u8,
                tag: object.type_of().tag(),
                _reserved: [0; 2],
                len: object.length(),
                payload: object.raw_value(),
            },
            Arg::Str(s) => Self::new(ArgKind::Str, addr(s.as_ptr())).with_len(s.len()),
            Arg::F32(v) => Self::new(ArgKind::F32, u64::from(v.to_bits())),
            Arg::F64(v) => Self::new(ArgKind::F64, v.to_bits()),
            Arg::Bool(v) => Self::new(ArgKind::Bool, u64::from(*v)),
            Arg::I8(v) => Self::new(ArgKind::I8, i64::from(*v) as u64),
            Arg::I16(v) => Self::new(ArgKind::I16, i64::from(*v) as u64),
            Arg::I32(v) => Self::new(ArgKind::I32, i64::from(*v) as u64),
            Arg::I64(v) => Self::new(ArgKind::I64, *v as u64),
            Arg::I128(v) => Self::new(ArgKind::I128, addr(v as *const i128)),
            Arg::Isize(v) => Self::new(ArgKind::Isize, *v as i64 as u64),
            Arg::U8(v) => Self::new(ArgKind::U8, u64::from(*v)),
            Arg::U16(v) => Self::new(ArgKind::U16, u64::from(*v)),
            Arg::U32(v) => Self::new(ArgKind::U32, u64::from(*v)),
            Arg::U64(v) => Self::new(ArgKind::U64, *v),
            Arg::U128(v) => Self::new(ArgKind::U128, addr(v as *const u128)),
            Arg::Usize(v) => Self::new(ArgKind::Usize, *v as u64),
            Arg::Ptr(v) => Self::new(ArgKind::Ptr, *v as u64),
            Arg::U8s(s) => Self::new(ArgKind::U8s, addr(s.as_ptr())).with_len(s.len()),
            Arg::I8s(s) => Self::new(ArgKind::I8s, addr(s.as_ptr())).with_len(s.len()),
            Arg::U16s(s) => Self::new(ArgKind::U16s, addr(s.as_ptr())).with_len(s.len()),
            Arg::I16s(s) => Self::new(ArgKind::I16s, addr(s.as_ptr())).with_len(s.len()),
            Arg::U32s(s) => Self::new(ArgKind::U32s, addr(s.as_ptr())).with_len(s.len()),
            Arg::I32s(s) => Self::new(ArgKind::I32s, addr(s.as_ptr())).with_len(s.len()),
            Arg::U64s(s) => Self::new(ArgKind::U64s, addr(s.as_ptr())).with_len(s.len()),
            Arg::I64s(s) => Self::new(ArgKind::I64s, addr(s.as_ptr())).with_len(s.len()),
        }
    }

    pub fn kind(&self) -> u8 {
        self.kind
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn payload(&self) -> u64 {
        self.payload
    }
}

/// Encode `args` into `buf`, reusing its capacity.
///
/// The returned view borrows both the arguments (whose memory the words
/// point into) and the buffer, so neither can change while the words are
/// in flight.
pub fn encode_args<'a>(args: &'a [Arg<'a>], buf: &'a mut Vec<EncodedArg>) -> EncodedArgs<'a> {
    buf.clear();
    buf.extend(args.iter().map(EncodedArg::encode));
    EncodedArgs {
        words: buf.as_slice(),
        args: PhantomData,
    }
}

/// Encoded argument words, valid for as long as the source arguments are.
#[derive(Debug, Clone, Copy)]
pub struct EncodedArgs<'a> {
    words: &'a [EncodedArg],
    args: PhantomData<&'a [Arg<'a>]>,
}

impl<'a> EncodedArgs<'a> {
    /// An empty argument list.
    pub fn empty() -> Self {
        EncodedArgs {
            words: &[],
            args: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &'a [EncodedArg] {
        self.words
    }

    /// The words as raw bytes, as read by the script runtime.
    pub fn as_bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.words)
    }

    /// Decode the argument at `index`.
    pub fn get(&self, index: usize) -> Option<Arg<'a>> {
        self.words.get(index).map(|word| self.decode(word))
    }

    pub fn iter(&self) -> impl Iterator<Item = Arg<'a>> + '_ {
        self.words.iter().map(|word| self.decode(word))
    }

    fn decode(&self, word: &EncodedArg) -> Arg<'a> {
        let len = word.len as usize;
        let at = word.payload as usize;
        // SAFETY: every word was produced by `encode_args` from an `Arg<'a>`
        // that outlives this view, so addresses and lengths describe live,
        // initialized memory of the recorded element type.
        unsafe {
            match word.kind {
                k if k == ArgKind::Object as u8 => Arg::Object(Object::from_raw(word.payload, word.tag, word.len)),
                k if k == ArgKind::Str as u8 => {
                    let bytes = std::slice::from_raw_parts(at as *const u8, len);
                    Arg::Str(std::str::from_utf8_unchecked(bytes))
                }
                k if k == ArgKind::F32 as u8 => Arg::F32(f32::from_bits(word.payload as u32)),
                k if k == ArgKind::F64 as u8 => Arg::F64(f64::from_bits(word.payload)),
                k if k == ArgKind::Bool as u8 => Arg::Bool(word.payload != 0),
                k if k == ArgKind::I8 as u8 => Arg::I8(word.payload as i8),
                k if k == ArgKind::I16 as u8 => Arg::I16(word.payload as i16),
                k if k == ArgKind::I32 as u8 => Arg::I32(word.payload as i32),
                k if k == ArgKind::I64 as u8 => Arg::I64(word.payload as i64),
                k if k == ArgKind::I128 as u8 => Arg::I128(*(at as *const i128)),
                k if k == ArgKind::Isize as u8 => Arg::Isize(word.payload as i64 as isize),
                k if k == ArgKind::U8 as u8 => Arg::U8(word.payload as u8),
                k if k == ArgKind::U16 as u8 => Arg::U16(word.payload as u16),
                k if k == ArgKind::U32 as u8 => Arg::U32(word.payload as u32),
                k if k == ArgKind::U64 as u8 => Arg::U64(word.payload),
                k if k == ArgKind::U128 as u8 => Arg::U128(*(at as *const u128)),
                k if k == ArgKind::Usize as u8 => Arg::Usize(word.payload as usize),
                k if k == ArgKind::Ptr as u8 => Arg::Ptr(word.payload as usize),
                k if k == ArgKind::U8s as u8 => Arg::U8s(std::slice::from_raw_parts(at as *const u8, len)),
                k if k == ArgKind::I8s as u8 => Arg::I8s(std::slice::from_raw_parts(at as *const i8, len)),
                k if k == ArgKind::U16s as u8 => Arg::U16s(std::slice::from_raw_parts(at as *const u16, len)),
                k if k == ArgKind::I16s as u8 => Arg::I16s(std::slice::from_raw_parts(at as *const i16, len)),
                k if k == ArgKind::U32s as u8 => Arg::U32s(std::slice::from_raw_parts(at as *const u32, len)),
                k if k == ArgKind::I32s as u8 => Arg::I32s(std::slice::from_raw_parts(at as *const i32, len)),
                k if k == ArgKind::U64s as u8 => Arg::U64s(std::slice::from_raw_parts(at as *const u64, len)),
                _ => Arg::I64s(std::slice::from_raw_parts(at as *const i64, len)),
            }
        }
    }
}

/// A value that can be written into a frame slot.
pub trait Slot: Copy {
    /// Bytes occupied in the frame.
    const WIDTH: usize;

    fn write(self, out: &mut [u8]);
}

/// A value that can be read back from a frame result slot.
pub trait ResultSlot: Sized {
    /// Bytes occupied in the frame.
    const WIDTH: usize;

    fn read(bytes: &[u8]) -> Self;
}

macro_rules! pod_slot {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Slot for $ty {
                const WIDTH: usize = mem::size_of::<$ty>();

                fn write(self, out: &mut [u8]) {
                    out[..<$ty as Slot>::WIDTH].copy_from_slice(bytemuck::bytes_of(&self));
                }
            }

            impl ResultSlot for $ty {
                const WIDTH: usize = mem::size_of::<$ty>();

                fn read(bytes: &[u8]) -> Self {
                    bytemuck::pod_read_unaligned(&bytes[..<$ty as ResultSlot>::WIDTH])
                }
            }
        )*
    };
}

pod_slot!(u8, i8, u16, i16, u32, i32, u64, i64, u128, i128, f32, f64, Object);

// Linear-memory addresses and sizes are 32 bits wide on the wasm32 target.
impl Slot for usize {
    const WIDTH: usize = 4;

    fn write(self, out: &mut [u8]) {
        (self as u32).write(out);
    }
}

impl ResultSlot for usize {
    const WIDTH: usize = 4;

    fn read(bytes: &[u8]) -> Self {
        u32::read(bytes) as usize
    }
}

impl Slot for isize {
    const WIDTH: usize = 4;

    fn write(self, out: &mut [u8]) {
        (self as i32).write(out);
    }
}

impl ResultSlot for isize {
    const WIDTH: usize = 4;

    fn read(bytes: &[u8]) -> Self {
        i32::read(bytes) as isize
    }
}

impl Slot for bool {
    const WIDTH: usize = 1;

    fn write(self, out: &mut [u8]) {
        out[0] = u8::from(self);
    }
}

impl ResultSlot for bool {
    const WIDTH: usize = 1;

    fn read(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

impl Slot for char {
    const WIDTH: usize = 4;

    fn write(self, out: &mut [u8]) {
        u32::from(self).write(out);
    }
}

impl ResultSlot for char {
    const WIDTH: usize = 4;

    fn read(bytes: &[u8]) -> Self {
        char::from_u32(u32::read(bytes)).unwrap_or(char::REPLACEMENT_CHARACTER)
    }
}

/// Width of a string or slice argument: address and length.
pub const SEQUENCE_WIDTH: usize = 8;

/// Width of a pointer argument.
pub const POINTER_WIDTH: usize = 4;

/// An argument and result frame of `N` bytes.
#[derive(Clone)]
#[repr(C, align(8))]
pub struct Frame<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> Default for Frame<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Frame<N> {
    pub fn new() -> Self {
        Frame { bytes: [0; N] }
    }

    /// Pointer handed to the script-side trampoline.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.bytes.as_mut_ptr()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn put<T: Slot>(&mut self, offset: usize, value: T) {
        value.write(&mut self.bytes[offset..offset + T::WIDTH]);
    }

    /// Write array elements back to back.
    pub fn put_array<T: Slot, const L: usize>(&mut self, offset: usize, values: &[T; L]) {
        for (i, value) in values.iter().enumerate() {
            self.put(offset + i * T::WIDTH, *value);
        }
    }

    /// Write a string as address and byte length.
    pub fn put_str(&mut self, offset: usize, value: &str) {
        self.put_sequence(offset, value.as_ptr() as usize, value.len());
    }

    /// Write a slice as address and element count.
    pub fn put_slice<T>(&mut self, offset: usize, value: &[T]) {
        self.put_sequence(offset, value.as_ptr() as usize, value.len());
    }

    /// Write the address of `value`.
    pub fn put_ptr<T: ?Sized>(&mut self, offset: usize, value: *const T) {
        self.put(offset, value as *const u8 as usize);
    }

    fn put_sequence(&mut self, offset: usize, address: usize, len: usize) {
        self.put(offset, address);
        self.put(offset + 4, len);
    }

    pub fn get<T: ResultSlot>(&self, offset: usize) -> T {
        T::read(&self.bytes[offset..offset + T::WIDTH])
    }

    pub fn get_array<T: ResultSlot, const L: usize>(&self, offset: usize) -> [T; L] {
        std::array::from_fn(|i| self.get(offset + i * T::WIDTH))
    }

    /// Read a string result delivered as an Object, releasing the Object
    /// whether or not the conversion succeeds.
    pub fn get_string(&self, offset: usize) -> Result<String> {
        let object: Object = self.get(offset);
        let text = object.as_string();
        object.free();
        text
    }

    /// Read a sequence result delivered as an Object, releasing the Object
    /// whether or not the conversion succeeds.
    pub fn get_vec<T: Pod>(&self, offset: usize) -> Result<Vec<T>> {
        let object: Object = self.get(offset);
        let values = object.to_vec::<T>();
        object.free();
        values
    }
}

/// Called by generated stubs when a script import is used off wasm32.
#[cold]
pub fn unavailable(module: &str, name: &str) -> ! {
    panic!("script import {module}.{name} is only available on wasm32")
}
