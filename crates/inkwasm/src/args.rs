//! Call arguments.
//!
//! [`Arg`] is the closed set of values that can be passed to script-side
//! calls. Heterogeneous values behind `&dyn` go through [`verify_args`],
//! which rejects anything outside that set.

use std::any::Any;

use crate::error::{Error, Result};
use crate::object::Object;

/// One call argument.
#[derive(Debug, Clone, Copy)]
pub enum Arg<'a> {
    Object(Object),
    Str(&'a str),
    F32(f32),
    F64(f64),
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    Isize(isize),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    Usize(usize),
    /// An address in linear memory, passed as a number.
    Ptr(usize),
    U8s(&'a [u8]),
    I8s(&'a [i8]),
    U16s(&'a [u16]),
    I16s(&'a [i16]),
    U32s(&'a [u32]),
    I32s(&'a [i32]),
    U64s(&'a [u64]),
    I64s(&'a [i64]),
}

impl Arg<'_> {
    /// Rust name of the carried type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Arg::Object(_) => "inkwasm::Object",
            Arg::Str(_) => "&str",
            Arg::F32(_) => "f32",
            Arg::F64(_) => "f64",
            Arg::Bool(_) => "bool",
            Arg::I8(_) => "i8",
            Arg::I16(_) => "i16",
            Arg::I32(_) => "i32",
            Arg::I64(_) => "i64",
            Arg::I128(_) => "i128",
            Arg::Isize(_) => "isize",
            Arg::U8(_) => "u8",
            Arg::U16(_) => "u16",
            Arg::U32(_) => "u32",
            Arg::U64(_) => "u64",
            Arg::U128(_) => "u128",
            Arg::Usize(_) => "usize",
            Arg::Ptr(_) => "pointer",
            Arg::U8s(_) => "&[u8]",
            Arg::I8s(_) => "&[i8]",
            Arg::U16s(_) => "&[u16]",
            Arg::I16s(_) => "&[i16]",
            Arg::U32s(_) => "&[u32]",
            Arg::I32s(_) => "&[i32]",
            Arg::U64s(_) => "&[u64]",
            Arg::I64s(_) => "&[i64]",
        }
    }
}

macro_rules! arg_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Arg<'_> {
                fn from(value: $ty) -> Self {
                    Arg::$variant(value)
                }
            }
        )*
    };
}

arg_from! {
    Object => Object,
    f32 => F32,
    f64 => F64,
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    i128 => I128,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    u128 => U128,
    usize => Usize,
}

macro_rules! arg_from_ref {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl<'a> From<&'a $ty> for Arg<'a> {
                fn from(value: &'a $ty) -> Self {
                    Arg::$variant(value)
                }
            }
        )*
    };
}

arg_from_ref! {
    str => Str,
    [u8] => U8s,
    [i8] => I8s,
    [u16] => U16s,
    [i16] => I16s,
    [u32] => U32s,
    [i32] => I32s,
    [u64] => U64s,
    [i64] => I64s,
}

impl<'a> From<&'a String> for Arg<'a> {
    fn from(value: &'a String) -> Self {
        Arg::Str(value)
    }
}

/// A value whose concrete type is inspected at call time.
pub trait Dynamic: Any {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any> Dynamic for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Convert dynamically-typed values into [`Arg`]s, failing on the first
/// value outside the supported kind set.
pub fn verify_args<'a>(values: &[&'a dyn Dynamic]) -> Result<Vec<Arg<'a>>> {
    values
        .iter()
        .copied()
        .enumerate()
        .map(|(position, value): (usize, &'a dyn Dynamic)| {
            classify(value.as_any()).ok_or(Error::UnsupportedArgument {
                position,
                kind: value.type_name(),
            })
        })
        .collect()
}

fn classify(value: &dyn Any) -> Option<Arg<'_>> {
    macro_rules! by_value {
        ($($ty:ty => $variant:ident),* $(,)?) => {
            $(
                if let Some(v) = value.downcast_ref::<$ty>() {
                    return Some(Arg::$variant(*v));
                }
            )*
        };
    }
    macro_rules! by_slice {
        ($($ty:ty => $variant:ident),* $(,)?) => {
            $(
                if let Some(v) = value.downcast_ref::<Vec<$ty>>() {
                    return Some(Arg::$variant(v.as_slice()));
                }
                if let Some(v) = value.downcast_ref::<&'static [$ty]>() {
                    return Some(Arg::$variant(v));
                }
            )*
        };
    }

    by_value! {
        Object => Object,
        f32 => F32,
        f64 => F64,
        bool => Bool,
        i8 => I8,
        i16 => I16,
        i32 => I32,
        i64 => I64,
        i128 => I128,
        isize => Isize,
        u8 => U8,
        u16 => U16,
        u32 => U32,
        u64 => U64,
        u128 => U128,
        usize => Usize,
    }
    if let Some(v) = value.downcast_ref::<String>() {
        return Some(Arg::Str(v));
    }
    if let Some(v) = value.downcast_ref::<&'static str>() {
        return Some(Arg::Str(v));
    }
    if let Some(v) = value.downcast_ref::<*const u8>() {
        return Some(Arg::Ptr(*v as usize));
    }
    by_slice! {
        u8 => U8s,
        i8 => I8s,
        u16 => U16s,
        i16 => I16s,
        u32 => U32s,
        i32 => I32s,
        u64 => U64s,
        i64 => I64s,
    }
    None
}
