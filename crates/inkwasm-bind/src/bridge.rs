//! Bridge tables: (direction, mode, type) → script accessor and frame width.
//!
//! Two static tables, one per direction. Each maps a [`Mode`] to a list of
//! rows keyed by canonical type name, with an optional `"default"` row
//! covering element kinds that are not enumerated. The store table has no
//! pointer rows: pointer-shaped values can be passed in but never returned.
//!
//! Widths describe the wasm32 argument frame, where addresses are 4 bytes.

use std::fmt;

use serde::Serialize;

use crate::model::Mode;

/// Key of the per-mode fallback row.
pub const DEFAULT_KEY: &str = "default";

/// Direction of a boundary crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    /// Script reads a host value out of the frame.
    Load,
    /// Script writes a value into the frame for the host.
    Store,
}

impl Direction {
    /// Script namespace member holding this direction's accessors.
    pub fn namespace(self) -> &'static str {
        match self {
            Direction::Load => "Load",
            Direction::Store => "Set",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Load => write!(f, "load"),
            Direction::Store => write!(f, "store"),
        }
    }
}

/// Byte width of a frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Width {
    /// Statically known width.
    Fixed(u32),
    /// Determined by the value itself at call time.
    Dynamic,
}

impl Width {
    /// The width as written in generated code; `-1` for dynamic widths.
    pub fn as_i32(self) -> i32 {
        match self {
            Width::Fixed(n) => n as i32,
            Width::Dynamic => -1,
        }
    }

    /// The fixed width, if known.
    pub fn fixed(self) -> Option<u32> {
        match self {
            Width::Fixed(n) => Some(n),
            Width::Dynamic => None,
        }
    }
}

/// One row of a bridge table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BridgeFuncInfo {
    /// Accessor routine name inside the direction's namespace.
    pub accessor: &'static str,
    /// Frame width of the value (element width for arrays).
    pub width: Width,
}

impl BridgeFuncInfo {
    const fn fixed(accessor: &'static str, width: u32) -> Self {
        BridgeFuncInfo {
            accessor,
            width: Width::Fixed(width),
        }
    }

    const fn dynamic(accessor: &'static str) -> Self {
        BridgeFuncInfo {
            accessor,
            width: Width::Dynamic,
        }
    }

    /// Fully-qualified script path, e.g. `globalThis.inkwasm.Load.Int32`.
    pub fn path(&self, namespace: &str, direction: Direction) -> String {
        format!("{namespace}.{}.{}", direction.namespace(), self.accessor)
    }
}

type Rows = &'static [(&'static str, BridgeFuncInfo)];

const LOAD_STATIC: Rows = &[
    ("f32", BridgeFuncInfo::fixed("Float32", 4)),
    ("f64", BridgeFuncInfo::fixed("Float64", 8)),
    ("bool", BridgeFuncInfo::fixed("Bool", 1)),
    ("u8", BridgeFuncInfo::fixed("Uint8", 1)),
    ("i8", BridgeFuncInfo::fixed("Int8", 1)),
    ("u16", BridgeFuncInfo::fixed("Uint16", 2)),
    ("i16", BridgeFuncInfo::fixed("Int16", 2)),
    ("u32", BridgeFuncInfo::fixed("Uint32", 4)),
    ("i32", BridgeFuncInfo::fixed("Int32", 4)),
    ("u64", BridgeFuncInfo::fixed("Uint64", 8)),
    ("i64", BridgeFuncInfo::fixed("Int64", 8)),
    ("usize", BridgeFuncInfo::fixed("UintPtr", 4)),
    ("isize", BridgeFuncInfo::fixed("IntPtr", 4)),
    ("char", BridgeFuncInfo::fixed("Rune", 4)),
    ("u128", BridgeFuncInfo::fixed("Uint128", 16)),
    ("i128", BridgeFuncInfo::fixed("Int128", 16)),
    ("str", BridgeFuncInfo::fixed("String", 8)),
    ("String", BridgeFuncInfo::fixed("String", 8)),
    ("inkwasm.object", BridgeFuncInfo::fixed("InkwasmObject", 16)),
];

const LOAD_ARRAY: Rows = &[
    (DEFAULT_KEY, BridgeFuncInfo::dynamic("Array")),
    ("f32", BridgeFuncInfo::fixed("ArrayFloat32", 4)),
    ("f64", BridgeFuncInfo::fixed("ArrayFloat64", 8)),
    ("u8", BridgeFuncInfo::fixed("ArrayUint8", 1)),
    ("i8", BridgeFuncInfo::fixed("ArrayInt8", 1)),
    ("u16", BridgeFuncInfo::fixed("ArrayUint16", 2)),
    ("i16", BridgeFuncInfo::fixed("ArrayInt16", 2)),
    ("u32", BridgeFuncInfo::fixed("ArrayUint32", 4)),
    ("i32", BridgeFuncInfo::fixed("ArrayInt32", 4)),
    ("u64", BridgeFuncInfo::fixed("ArrayUint64", 8)),
    ("i64", BridgeFuncInfo::fixed("ArrayInt64", 8)),
    ("usize", BridgeFuncInfo::fixed("ArrayUintPtr", 4)),
    ("isize", BridgeFuncInfo::fixed("ArrayIntPtr", 4)),
    ("char", BridgeFuncInfo::fixed("ArrayRune", 4)),
];

const LOAD_SLICE: Rows = &[(DEFAULT_KEY, BridgeFuncInfo::fixed("Slice", 8))];

const LOAD_POINTER: Rows = &[(DEFAULT_KEY, BridgeFuncInfo::fixed("Ptr", 4))];

const STORE_STATIC: Rows = &[
    ("f32", BridgeFuncInfo::fixed("Float32", 4)),
    ("f64", BridgeFuncInfo::fixed("Float64", 8)),
    ("bool", BridgeFuncInfo::fixed("Bool", 1)),
    ("u8", BridgeFuncInfo::fixed("Uint8", 1)),
    ("i8", BridgeFuncInfo::fixed("Int8", 1)),
    ("u16", BridgeFuncInfo::fixed("Uint16", 2)),
    ("i16", BridgeFuncInfo::fixed("Int16", 2)),
    ("u32", BridgeFuncInfo::fixed("Uint32", 4)),
    ("i32", BridgeFuncInfo::fixed("Int32", 4)),
    ("u64", BridgeFuncInfo::fixed("Uint64", 8)),
    ("i64", BridgeFuncInfo::fixed("Int64", 8)),
    ("usize", BridgeFuncInfo::fixed("UintPtr", 4)),
    ("isize", BridgeFuncInfo::fixed("IntPtr", 4)),
    ("char", BridgeFuncInfo::fixed("Rune", 4)),
    ("u128", BridgeFuncInfo::fixed("Uint128", 16)),
    ("i128", BridgeFuncInfo::fixed("Int128", 16)),
    // Owned strings come back as an Object holding the encoded bytes.
    ("String", BridgeFuncInfo::fixed("String", 16)),
    ("inkwasm.object", BridgeFuncInfo::fixed("InkwasmObject", 16)),
];

const STORE_ARRAY: Rows = &[
    (DEFAULT_KEY, BridgeFuncInfo::dynamic("Array")),
    ("f32", BridgeFuncInfo::fixed("Float32", 4)),
    ("f64", BridgeFuncInfo::fixed("Float64", 8)),
    ("bool", BridgeFuncInfo::fixed("Bool", 1)),
    ("u8", BridgeFuncInfo::fixed("Uint8", 1)),
    ("i8", BridgeFuncInfo::fixed("Int8", 1)),
    ("u16", BridgeFuncInfo::fixed("Uint16", 2)),
    ("i16", BridgeFuncInfo::fixed("Int16", 2)),
    ("u32", BridgeFuncInfo::fixed("Uint32", 4)),
    ("i32", BridgeFuncInfo::fixed("Int32", 4)),
    ("u64", BridgeFuncInfo::fixed("Uint64", 8)),
    ("i64", BridgeFuncInfo::fixed("Int64", 8)),
    ("usize", BridgeFuncInfo::fixed("UintPtr", 4)),
    ("isize", BridgeFuncInfo::fixed("IntPtr", 4)),
];

// Sequences come back as an Object; the host copies the elements out.
const STORE_SLICE: Rows = &[(DEFAULT_KEY, BridgeFuncInfo::fixed("Slice", 16))];

const STORE_POINTER: Rows = &[];

/// Rows of one (direction, mode) cell.
pub fn rows(direction: Direction, mode: Mode) -> Rows {
    match (direction, mode) {
        (Direction::Load, Mode::Static) => LOAD_STATIC,
        (Direction::Load, Mode::Array) => LOAD_ARRAY,
        (Direction::Load, Mode::Slice) => LOAD_SLICE,
        (Direction::Load, Mode::Pointer) => LOAD_POINTER,
        (Direction::Store, Mode::Static) => STORE_STATIC,
        (Direction::Store, Mode::Array) => STORE_ARRAY,
        (Direction::Store, Mode::Slice) => STORE_SLICE,
        (Direction::Store, Mode::Pointer) => STORE_POINTER,
    }
}

/// Row for exactly this type, without falling back to the default row.
pub fn lookup_exact(direction: Direction, mode: Mode, type_name: &str) -> Option<&'static BridgeFuncInfo> {
    rows(direction, mode)
        .iter()
        .find(|(key, _)| *key != DEFAULT_KEY && *key == type_name)
        .map(|(_, info)| info)
}

/// Row for this type, else the mode's default row.
///
/// `None` means the (direction, mode, type) triple has no accessor at all;
/// callers turn that into a named generation error.
pub fn lookup(direction: Direction, mode: Mode, type_name: &str) -> Option<&'static BridgeFuncInfo> {
    lookup_exact(direction, mode, type_name).or_else(|| {
        rows(direction, mode)
            .iter()
            .find(|(key, _)| *key == DEFAULT_KEY)
            .map(|(_, info)| info)
    })
}

/// Type names with a dedicated static row in the given direction.
pub fn static_types(direction: Direction) -> impl Iterator<Item = &'static str> {
    rows(direction, Mode::Static).iter().map(|(key, _)| *key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODES: [Mode; 4] = [Mode::Static, Mode::Pointer, Mode::Array, Mode::Slice];

    #[test]
    fn static_rows_are_exact() {
        let info = lookup(Direction::Load, Mode::Static, "i32").unwrap();
        assert_eq!(info.accessor, "Int32");
        assert_eq!(info.width, Width::Fixed(4));
        assert!(lookup(Direction::Load, Mode::Static, "HashMap").is_none());
    }

    #[test]
    fn type_names_match_exactly() {
        let info = lookup(Direction::Load, Mode::Static, "inkwasm.Object").unwrap();
        assert_eq!(info.accessor, "InkwasmObject");
        assert_eq!(info.width, Width::Fixed(16));

        assert!(lookup(Direction::Load, Mode::Static, "F64").is_none());
        assert!(lookup(Direction::Store, Mode::Static, "inkwasm.object").is_none());
        assert!(lookup_exact(Direction::Load, Mode::Array, "F32").is_none());
        assert_eq!(lookup(Direction::Load, Mode::Array, "F32").unwrap().accessor, "Array");
    }

    #[test]
    fn composite_modes_fall_back_to_default() {
        let info = lookup(Direction::Load, Mode::Array, "inkwasm.Object").unwrap();
        assert_eq!(info.accessor, "Array");
        assert_eq!(info.width, Width::Dynamic);
        assert_eq!(info.width.as_i32(), -1);

        let typed = lookup(Direction::Load, Mode::Array, "f32").unwrap();
        assert_eq!(typed.accessor, "ArrayFloat32");

        assert_eq!(lookup(Direction::Load, Mode::Slice, "u8").unwrap().width, Width::Fixed(8));
        assert_eq!(lookup(Direction::Load, Mode::Pointer, "Point").unwrap().accessor, "Ptr");
    }

    #[test]
    fn store_table_has_no_pointer_rows() {
        assert!(rows(Direction::Store, Mode::Pointer).is_empty());
        assert!(lookup(Direction::Store, Mode::Pointer, "i32").is_none());
    }

    #[test]
    fn borrowed_strings_cannot_be_returned() {
        assert!(lookup(Direction::Load, Mode::Static, "str").is_some());
        assert!(lookup(Direction::Store, Mode::Static, "str").is_none());
        assert_eq!(
            lookup(Direction::Store, Mode::Static, "String").unwrap().width,
            Width::Fixed(16)
        );
    }

    #[test]
    fn every_static_type_resolves_in_composite_modes() {
        // Anything the parser accepts as a named element must resolve for
        // arrays, slices and (load-side) pointers.
        for direction in [Direction::Load, Direction::Store] {
            for ty in static_types(direction) {
                for mode in MODES {
                    if direction == Direction::Store && mode == Mode::Pointer {
                        continue;
                    }
                    assert!(
                        lookup(direction, mode, ty).is_some(),
                        "{direction} {mode} {ty} has no accessor"
                    );
                }
            }
        }
    }

    #[test]
    fn every_fixed_width_is_positive() {
        for direction in [Direction::Load, Direction::Store] {
            for mode in MODES {
                for (key, info) in rows(direction, mode) {
                    if let Width::Fixed(n) = info.width {
                        assert!(n > 0, "{direction} {mode} {key}");
                    }
                }
            }
        }
    }

    #[test]
    fn accessor_path() {
        let info = lookup(Direction::Store, Mode::Static, "bool").unwrap();
        assert_eq!(
            info.path("globalThis.inkwasm", Direction::Store),
            "globalThis.inkwasm.Set.Bool"
        );
    }
}
