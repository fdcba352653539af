//! Frame plans.
//!
//! Every annotated function crosses the boundary through one frame in
//! linear memory: arguments in declaration order at their alignment, then
//! the result from the next 8-byte boundary, then the optional success
//! flag. The plan fixes accessor, width, and offset for each slot once, and
//! the script, stub, and host emitters all read the same plan.
//!
//! Exported structs are laid out with C rules so the script-side decoder
//! can read them in place; struct arguments travel by address.

use std::collections::{BTreeMap, HashMap};

use inkwasm_bind::bridge::{self, Direction, Width};
use inkwasm_bind::{Argument, DeclarationSet, Function, Hint, Mode, Package, PackageBindings, OBJECT_TYPE};

use crate::error::{GenerateError, Location, Result};

/// Alignment of a frame and of its result area.
pub const FRAME_ALIGN: usize = 8;

/// Value types allowed as array and slice elements.
const ELEMENT_TYPES: &[&str] = &[
    "f32", "f64", "bool", "u8", "i8", "u16", "i16", "u32", "i32", "u64", "i64", "usize", "isize", "char", "u128",
    "i128", OBJECT_TYPE,
];

/// Largest frame or struct linear memory can address.
pub const MAX_FRAME: usize = u32::MAX as usize;

/// Element types without a plain-bytes representation.
const NON_POD_TYPES: &[&str] = &["bool", "char"];

/// Round `value` up to a multiple of `align`.
pub fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

/// Running offset of a frame or struct layout.
struct Cursor<'f> {
    function: &'f Function,
    offset: usize,
}

impl<'f> Cursor<'f> {
    fn new(function: &'f Function) -> Self {
        Cursor { function, offset: 0 }
    }

    fn align(&mut self, align: usize) -> Result<usize> {
        self.offset = self
            .offset
            .checked_next_multiple_of(align)
            .filter(|&offset| offset <= MAX_FRAME)
            .ok_or_else(|| GenerateError::too_large(self.function))?;
        Ok(self.offset)
    }

    fn advance(&mut self, width: usize) -> Result<()> {
        self.offset = self
            .offset
            .checked_add(width)
            .filter(|&offset| offset <= MAX_FRAME)
            .ok_or_else(|| GenerateError::too_large(self.function))?;
        Ok(())
    }

    /// Give `slot` the next offset at its alignment and move past it.
    fn place(&mut self, slot: &mut Slot) -> Result<()> {
        slot.offset = self.align(slot.align)?;
        self.advance(slot.width)
    }
}

/// Byte width of `length` elements.
fn array_width(function: &Function, element: &Element, length: u64) -> Result<(usize, usize)> {
    usize::try_from(length)
        .ok()
        .and_then(|length| Some((length, element.width.checked_mul(length)?)))
        .filter(|&(_, width)| width <= MAX_FRAME)
        .ok_or_else(|| GenerateError::too_large(function))
}

fn is_one_of(list: &[&str], type_name: &str) -> bool {
    list.iter().any(|t| *t == type_name)
}

/// Rust spelling of a canonical type name.
pub fn rust_path(type_name: &str) -> String {
    if type_name == OBJECT_TYPE {
        "::inkwasm::Object".to_string()
    } else if type_name == "str" {
        "&str".to_string()
    } else {
        type_name.replace('.', "::")
    }
}

/// One array or slice element kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Static accessor moving one element.
    pub accessor: &'static str,
    /// Loader reading a whole run of elements into a typed array.
    pub typed: Option<&'static str>,
    pub width: usize,
    pub align: usize,
    pub rust: String,
}

/// How a slot's value is moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotKind {
    /// A scalar or Object moved by one accessor.
    Value { accessor: &'static str },
    /// A string argument: address and byte length.
    Str,
    /// A string result, delivered as an Object holding UTF-8 bytes.
    OwnedString,
    /// An address.
    Pointer,
    /// An exported struct: by address in frames, inline in struct fields.
    Struct { name: String },
    Array { element: Element, length: usize },
    /// A sequence: address and length in, an Object holding bytes out.
    Slice { element: Element },
}

/// One frame slot or struct field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    /// Rust binding name.
    pub name: String,
    /// Name on the script side (struct fields honour their tag).
    pub script_name: String,
    /// Rust type as written in generated code.
    pub rust: String,
    pub kind: SlotKind,
    pub offset: usize,
    pub width: usize,
    pub align: usize,
}

/// C layout of an exported struct.
#[derive(Debug, Clone)]
pub struct StructLayout<'a> {
    pub function: &'a Function,
    pub fields: Vec<Slot>,
    pub size: usize,
    pub align: usize,
}

impl StructLayout<'_> {
    pub fn name(&self) -> &str {
        &self.function.host.name
    }
}

/// The frame of one annotated function.
#[derive(Debug, Clone)]
pub struct FunctionPlan<'a> {
    pub function: &'a Function,
    pub arguments: Vec<Slot>,
    pub result: Option<Slot>,
    /// Offset of the trailing success flag.
    pub flag: Option<usize>,
    pub frame_size: usize,
}

impl FunctionPlan<'_> {
    pub fn name(&self) -> &str {
        &self.function.host.name
    }

    /// Whether the first argument is the receiver of a `.`-relative path.
    pub fn has_receiver(&self) -> bool {
        self.function.script.is_receiver_relative()
    }
}

/// Everything needed to emit one artifact set of a package.
#[derive(Debug, Clone)]
pub struct SetPlan<'a> {
    pub package: &'a Package,
    pub set: DeclarationSet,
    pub functions: Vec<FunctionPlan<'a>>,
    pub exports: Vec<StructLayout<'a>>,
}

impl SetPlan<'_> {
    /// Name of the wasm import module the set's trampolines register under.
    pub fn module(&self) -> String {
        match self.set {
            DeclarationSet::Release => self.package.name.clone(),
            DeclarationSet::Test => format!("{}_test", self.package.name),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.exports.is_empty()
    }
}

/// Plan one artifact set of a package.
pub fn plan_set(bindings: &PackageBindings, set: DeclarationSet) -> Result<SetPlan<'_>> {
    let planner = Planner::new(bindings)?;
    let selected = bindings.select(set);

    check_duplicates(selected.iter().filter(|f| !f.script.hint.is_export()).copied())?;
    check_duplicates(selected.iter().filter(|f| f.script.hint.is_export()).copied())?;

    let mut functions = Vec::new();
    let mut exports = Vec::new();
    for function in selected {
        if function.script.hint.is_export() {
            if let Some(layout) = planner.layouts.get(function.host.name.as_str()) {
                exports.push(layout.clone());
            }
        } else {
            functions.push(planner.function(function)?);
        }
    }
    Ok(SetPlan {
        package: &bindings.package,
        set,
        functions,
        exports,
    })
}

fn check_duplicates<'a>(functions: impl Iterator<Item = &'a Function>) -> Result<()> {
    let mut seen: HashMap<String, &Function> = HashMap::new();
    for function in functions {
        // Frame constants are upper-cased, so names must differ beyond case.
        let key = function.host.name.to_ascii_uppercase();
        if let Some(first) = seen.get(&key) {
            return Err(GenerateError::DuplicateName {
                location: Location::of(function),
                name: function.host.name.clone(),
                first: Location::of(first),
            });
        }
        seen.insert(key, function);
    }
    Ok(())
}

struct Planner<'a> {
    layouts: BTreeMap<&'a str, StructLayout<'a>>,
}

impl<'a> Planner<'a> {
    /// Lay out every exported struct of the package, both sets.
    fn new(bindings: &'a PackageBindings) -> Result<Self> {
        let exports: HashMap<&str, &Function> = bindings
            .functions
            .iter()
            .filter(|f| f.script.hint.is_export())
            .map(|f| (f.host.name.as_str(), f))
            .collect();
        let mut planner = Planner {
            layouts: BTreeMap::new(),
        };
        let mut names: Vec<&str> = exports.keys().copied().collect();
        names.sort_unstable();
        for name in names {
            planner.layout(&exports, name, &mut Vec::new())?;
        }
        Ok(planner)
    }

    /// The exported struct a canonical type name refers to.
    fn export_name(&self, type_name: &str) -> Option<&'a str> {
        let last = type_name.rsplit('.').next().unwrap_or(type_name);
        self.layouts.keys().copied().find(|name| *name == last)
    }

    fn layout(&mut self, exports: &HashMap<&'a str, &'a Function>, name: &'a str, stack: &mut Vec<&'a str>) -> Result<()> {
        if self.layouts.contains_key(name) {
            return Ok(());
        }
        let Some(function) = exports.get(name).copied() else {
            return Ok(());
        };
        if stack.contains(&name) {
            return Err(GenerateError::RecursiveStruct {
                location: Location::of(function),
                name: name.to_string(),
            });
        }
        stack.push(name);
        // Nested structs first, so their sizes are known.
        for field in &function.host.arguments {
            if field.mode() == Mode::Static {
                let last = field.type_name().rsplit('.').next().unwrap_or_default();
                if let Some((nested, _)) = exports.get_key_value(last) {
                    self.layout(exports, *nested, stack)?;
                }
            }
        }
        stack.pop();

        let mut fields = Vec::new();
        let mut cursor = Cursor::new(function);
        let mut align = 1;
        for field in &function.host.arguments {
            let mut slot = self.field(function, field)?;
            cursor.place(&mut slot)?;
            align = align.max(slot.align);
            fields.push(slot);
        }
        let layout = StructLayout {
            function,
            fields,
            size: cursor.align(align)?,
            align,
        };
        self.layouts.insert(name, layout);
        Ok(())
    }

    fn field(&self, function: &Function, field: &Argument) -> Result<Slot> {
        let unsupported = |type_name: String| GenerateError::UnsupportedType {
            location: Location::of(function),
            context: "field",
            type_name,
        };
        let (kind, width, align, rust) = match field.mode() {
            Mode::Static => {
                let t = field.type_name();
                if is_one_of(&["str", "String", "u128", "i128"], t) {
                    return Err(unsupported(t.to_string()));
                }
                if let Some(row) = bridge::lookup(Direction::Load, Mode::Static, t) {
                    let width = fixed(row.width);
                    (SlotKind::Value { accessor: row.accessor }, width, width.min(8), rust_path(t))
                } else if let Some(layout) = self.export_name(t).and_then(|n| self.layouts.get(n)) {
                    let kind = SlotKind::Struct {
                        name: layout.name().to_string(),
                    };
                    (kind, layout.size, layout.align, rust_path(t))
                } else {
                    return Err(unsupported(t.to_string()));
                }
            }
            Mode::Pointer => (SlotKind::Pointer, pointer_width(), pointer_width(), pointer_rust(field)),
            Mode::Array => {
                let element = self.element(function, field, Direction::Load, "field", false)?;
                let (length, width) = array_width(function, &element, field.length().unwrap_or(0))?;
                let align = element.align;
                let rust = format!("[{}; {length}]", element.rust);
                (SlotKind::Array { element, length }, width, align, rust)
            }
            Mode::Slice => return Err(unsupported(field.to_string())),
        };
        Ok(Slot {
            name: field.name.clone(),
            script_name: field.script_name().to_string(),
            rust,
            kind,
            offset: 0,
            width,
            align,
        })
    }

    fn element(
        &self,
        function: &Function,
        argument: &Argument,
        direction: Direction,
        context: &'static str,
        pod_only: bool,
    ) -> Result<Element> {
        let t = argument.type_name();
        let unsupported = || GenerateError::UnsupportedType {
            location: Location::of(function),
            context,
            type_name: argument.to_string(),
        };
        if !is_one_of(ELEMENT_TYPES, t) || (pod_only && is_one_of(NON_POD_TYPES, t)) {
            return Err(unsupported());
        }
        let single = bridge::lookup_exact(direction, Mode::Static, t).ok_or_else(unsupported)?;
        let width = fixed(single.width);
        let run = bridge::lookup(direction, Mode::Array, t).filter(|row| row.width != Width::Dynamic);
        let (accessor, typed) = match (direction, run) {
            (Direction::Load, Some(row)) => (single.accessor, Some(row.accessor)),
            (Direction::Store, Some(row)) => (row.accessor, None),
            (_, None) => (single.accessor, None),
        };
        Ok(Element {
            accessor,
            typed,
            width,
            align: width.min(8),
            rust: rust_path(t),
        })
    }

    fn function(&self, function: &'a Function) -> Result<FunctionPlan<'a>> {
        self.check_arity(function)?;

        let mut arguments = Vec::new();
        let mut cursor = Cursor::new(function);
        for (i, argument) in function.host.arguments.iter().enumerate() {
            let mut slot = self.argument(function, argument, i)?;
            cursor.place(&mut slot)?;
            arguments.push(slot);
        }

        cursor.align(FRAME_ALIGN)?;
        let (value, flagged) = split_results(function)?;
        let result = match value {
            Some(argument) => {
                let mut slot = self.result(function, argument)?;
                cursor.place(&mut slot)?;
                Some(slot)
            }
            None => None,
        };
        let flag = if flagged {
            let offset = cursor.offset;
            cursor.advance(1)?;
            Some(offset)
        } else {
            None
        };

        Ok(FunctionPlan {
            function,
            arguments,
            result,
            flag,
            frame_size: cursor.align(FRAME_ALIGN)?,
        })
    }

    fn check_arity(&self, function: &Function) -> Result<()> {
        let script = &function.script;
        let count = function.host.arguments.len();
        if script.is_receiver_relative() && count == 0 {
            return Err(GenerateError::arity(
                function,
                format!("target '{}' is relative to a receiver, but there are no arguments", script.path),
            ));
        }
        let rest = count - usize::from(script.is_receiver_relative());
        let values = split_results(function)?.0.is_some();
        match script.hint {
            Hint::Get if rest > 1 => Err(GenerateError::arity(
                function,
                format!("takes at most one key argument, found {rest}"),
            )),
            Hint::Get if !values => Err(GenerateError::arity(function, "must return the property value")),
            Hint::Set if !(1..=2).contains(&rest) => Err(GenerateError::arity(
                function,
                format!("takes an optional key and exactly one value, found {rest} arguments"),
            )),
            Hint::Set if !function.host.results.is_empty() => {
                Err(GenerateError::arity(function, "has no results"))
            }
            Hint::Set if rest == 1 && script.is_receiver_relative() && script.member().is_empty() => {
                Err(GenerateError::arity(function, "needs a key or a member to assign to"))
            }
            _ => Ok(()),
        }
    }

    fn argument(&self, function: &Function, argument: &Argument, index: usize) -> Result<Slot> {
        let unsupported = || GenerateError::UnsupportedType {
            location: Location::of(function),
            context: "argument",
            type_name: argument.to_string(),
        };
        let t = argument.type_name();
        let (kind, width, align, rust) = match argument.mode() {
            Mode::Static if is_one_of(&["str", "String"], t) => {
                let row = bridge::lookup(Direction::Load, Mode::Static, t).ok_or_else(unsupported)?;
                (SlotKind::Str, fixed(row.width), pointer_width(), "&str".to_string())
            }
            Mode::Static => {
                if let Some(row) = bridge::lookup(Direction::Load, Mode::Static, t) {
                    let width = fixed(row.width);
                    (SlotKind::Value { accessor: row.accessor }, width, width.min(8), rust_path(t))
                } else if let Some(name) = self.export_name(t) {
                    let kind = SlotKind::Struct { name: name.to_string() };
                    (kind, pointer_width(), pointer_width(), rust_path(t))
                } else {
                    return Err(unsupported());
                }
            }
            Mode::Pointer => (SlotKind::Pointer, pointer_width(), pointer_width(), pointer_rust(argument)),
            Mode::Array => {
                let element = self.element(function, argument, Direction::Load, "array element", false)?;
                let (length, width) = array_width(function, &element, argument.length().unwrap_or(0))?;
                let rust = format!("[{}; {length}]", element.rust);
                let align = element.align;
                (SlotKind::Array { element, length }, width, align, rust)
            }
            Mode::Slice => {
                let element = self.element(function, argument, Direction::Load, "slice element", false)?;
                let row = bridge::lookup(Direction::Load, Mode::Slice, t).ok_or_else(unsupported)?;
                let rust = format!("&[{}]", element.rust);
                (SlotKind::Slice { element }, fixed(row.width), pointer_width(), rust)
            }
        };
        let name = if argument.is_discard() {
            format!("arg{index}")
        } else {
            argument.name.clone()
        };
        Ok(Slot {
            script_name: name.clone(),
            name,
            rust,
            kind,
            offset: 0,
            width,
            align,
        })
    }

    fn result(&self, function: &Function, argument: &Argument) -> Result<Slot> {
        let location = || Location::of(function);
        let unsupported = || GenerateError::UnsupportedType {
            location: location(),
            context: "result",
            type_name: argument.to_string(),
        };
        let t = argument.type_name();
        let (kind, width, rust) = match argument.mode() {
            Mode::Pointer => return Err(GenerateError::PointerResult { location: location() }),
            Mode::Static => match bridge::lookup(Direction::Store, Mode::Static, t) {
                Some(row) if t == "String" => (SlotKind::OwnedString, fixed(row.width), "String".to_string()),
                Some(row) => (SlotKind::Value { accessor: row.accessor }, fixed(row.width), rust_path(t)),
                None => {
                    if let Some(name) = self.export_name(t) {
                        return Err(GenerateError::StructResult {
                            location: location(),
                            name: name.to_string(),
                        });
                    }
                    return Err(unsupported());
                }
            },
            Mode::Array => {
                let element = self.element(function, argument, Direction::Store, "array element", false)?;
                let (length, width) = array_width(function, &element, argument.length().unwrap_or(0))?;
                let rust = format!("[{}; {length}]", element.rust);
                (SlotKind::Array { element, length }, width, rust)
            }
            Mode::Slice => {
                let element = self.element(function, argument, Direction::Store, "slice element", true)?;
                let row = bridge::lookup(Direction::Store, Mode::Slice, t).ok_or_else(unsupported)?;
                let rust = format!("Vec<{}>", element.rust);
                (SlotKind::Slice { element }, fixed(row.width), rust)
            }
        };
        let align = match &kind {
            SlotKind::Array { element, .. } => element.align,
            _ => width.min(8),
        };
        Ok(Slot {
            name: "result".to_string(),
            script_name: "result".to_string(),
            rust,
            kind,
            offset: 0,
            width,
            align,
        })
    }
}

/// Split results into the value result and whether a success flag follows.
fn split_results(function: &Function) -> Result<(Option<&Argument>, bool)> {
    let results = &function.host.results;
    let is_flag = |a: &Argument| a.mode() == Mode::Static && a.type_name() == "bool";
    match results.as_slice() {
        [] => Ok((None, false)),
        [value] => Ok((Some(value), false)),
        [value, flag] if is_flag(flag) => Ok((Some(value), true)),
        _ => Err(GenerateError::TooManyResults {
            location: Location::of(function),
            count: results.len(),
        }),
    }
}

fn fixed(width: Width) -> usize {
    width.fixed().unwrap_or(0) as usize
}

fn pointer_width() -> usize {
    fixed(
        bridge::lookup(Direction::Load, Mode::Pointer, bridge::DEFAULT_KEY)
            .map(|row| row.width)
            .unwrap_or(Width::Fixed(4)),
    )
}

fn pointer_rust(argument: &Argument) -> String {
    format!("*const {}", rust_path(argument.type_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwasm_bind::{HostSignature, ScriptTarget};
    use std::path::PathBuf;

    fn function(name: &str, hint: Hint, path: &str, arguments: Vec<Argument>, results: Vec<Argument>) -> Function {
        Function {
            file: PathBuf::from("src/lib.rs"),
            line: 3,
            is_test: false,
            host: HostSignature {
                name: name.into(),
                arguments,
                results,
            },
            script: ScriptTarget {
                path: path.into(),
                hint,
            },
        }
    }

    fn bindings(functions: Vec<Function>) -> PackageBindings {
        PackageBindings {
            package: Package {
                name: "app".into(),
                dir: PathBuf::from("."),
                path: "app".into(),
            },
            functions,
        }
    }

    fn named(name: &str, t: &str) -> Argument {
        Argument::named(name, t)
    }

    fn point() -> Function {
        function(
            "Point",
            Hint::Export,
            "",
            vec![named("_", "u64"), named("x", "f32"), named("y", "f64"), named("tag", "u8")],
            vec![],
        )
    }

    #[test]
    fn arguments_are_aligned_and_results_start_on_eight() {
        let b = bindings(vec![function(
            "measure",
            Hint::Func,
            ".measure",
            vec![named("o", OBJECT_TYPE), named("flag", "bool"), named("n", "u16")],
            vec![named("_", "u32"), named("_", "bool")],
        )]);
        let plan = plan_set(&b, DeclarationSet::Release).unwrap();
        let f = &plan.functions[0];
        let offsets: Vec<usize> = f.arguments.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0, 16, 18]);
        let result = f.result.as_ref().unwrap();
        assert_eq!(result.offset, 24);
        assert_eq!(result.kind, SlotKind::Value { accessor: "Uint32" });
        assert_eq!(f.flag, Some(28));
        assert_eq!(f.frame_size, 32);
    }

    #[test]
    fn strings_and_sequences() {
        let b = bindings(vec![function(
            "join",
            Hint::Func,
            "globalThis.join",
            vec![
                named("sep", "str"),
                Argument::slice("parts", named("_", "f64")).unwrap(),
                Argument::array("pair", named("_", OBJECT_TYPE), 2).unwrap(),
            ],
            vec![named("_", "String")],
        )]);
        let plan = plan_set(&b, DeclarationSet::Release).unwrap();
        let f = &plan.functions[0];
        assert_eq!(f.arguments[0].kind, SlotKind::Str);
        assert_eq!((f.arguments[1].offset, f.arguments[1].width), (8, 8));
        match &f.arguments[1].kind {
            SlotKind::Slice { element } => {
                assert_eq!(element.typed, Some("ArrayFloat64"));
                assert_eq!(element.accessor, "Float64");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(f.arguments[1].rust, "&[f64]");
        let pair = &f.arguments[2];
        assert_eq!((pair.offset, pair.width), (16, 32));
        assert_eq!(pair.rust, "[::inkwasm::Object; 2]");
        let result = f.result.as_ref().unwrap();
        assert_eq!(result.kind, SlotKind::OwnedString);
        assert_eq!((result.offset, result.width), (48, 16));
        assert_eq!(f.frame_size, 64);
    }

    #[test]
    fn struct_layout_and_by_address_arguments() {
        let b = bindings(vec![
            point(),
            function("draw", Hint::Func, "globalThis.draw", vec![named("p", "geo.Point")], vec![]),
        ]);
        let plan = plan_set(&b, DeclarationSet::Release).unwrap();
        let layout = &plan.exports[0];
        let offsets: Vec<usize> = layout.fields.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0, 8, 16, 24]);
        assert_eq!((layout.size, layout.align), (32, 8));
        assert_eq!(layout.fields[0].script_name, "_");

        let draw = &plan.functions[0];
        assert_eq!(draw.arguments[0].kind, SlotKind::Struct { name: "Point".into() });
        assert_eq!(draw.arguments[0].width, 4);
        assert_eq!(draw.arguments[0].rust, "geo::Point");
    }

    #[test]
    fn rejected_shapes() {
        let cases = vec![
            function("a", Hint::Func, "f", vec![], vec![Argument::pointer("_", named("_", "i32")).unwrap()]),
            function("b", Hint::Func, "f", vec![], vec![named("_", "str")]),
            function("c", Hint::Func, "f", vec![named("m", "HashMap")], vec![]),
            function("d", Hint::Func, "f", vec![], vec![named("_", "i32"), named("_", "i32")]),
            function("e", Hint::Func, "f", vec![], vec![Argument::slice("_", named("_", "bool")).unwrap()]),
            function("g", Hint::Func, "f", vec![], vec![named("_", "Point")]),
        ];
        let expected = [
            "pointer results are not supported",
            "unsupported result type 'str'",
            "unsupported argument type 'HashMap'",
            "found 2 results",
            "unsupported slice element type '[bool]'",
            "exported struct 'Point' cannot be returned",
        ];
        for (case, message) in cases.into_iter().zip(expected) {
            let b = bindings(vec![point(), case]);
            let err = plan_set(&b, DeclarationSet::Release).unwrap_err().to_string();
            assert!(err.starts_with("src/lib.rs:3: "), "{err}");
            assert!(err.contains(message), "{err} does not contain {message}");
        }
    }

    #[test]
    fn hint_arity() {
        let obj = || named("o", OBJECT_TYPE);
        let cases = vec![
            function("a", Hint::Get, ".x", vec![], vec![named("_", "f64")]),
            function("b", Hint::Get, ".", vec![obj(), named("k", "str"), named("j", "str")], vec![named("_", "f64")]),
            function("c", Hint::Get, "globalThis.x", vec![], vec![]),
            function("d", Hint::Set, ".x", vec![obj()], vec![]),
            function("e", Hint::Set, ".x", vec![obj(), named("v", "f64")], vec![named("_", "bool")]),
            function("f", Hint::Set, ".", vec![obj(), named("v", "f64")], vec![]),
        ];
        for case in cases {
            let name = case.host.name.clone();
            let b = bindings(vec![case]);
            assert!(
                matches!(plan_set(&b, DeclarationSet::Release), Err(GenerateError::Arity { .. })),
                "{name} should be rejected"
            );
        }

        let ok = bindings(vec![
            function("g", Hint::Get, ".", vec![obj(), named("k", "str")], vec![named("_", OBJECT_TYPE)]),
            function("s", Hint::Set, ".", vec![obj(), named("k", "str"), named("v", "f64")], vec![]),
            function("t", Hint::Set, "globalThis.title", vec![named("v", "str")], vec![]),
        ]);
        assert_eq!(plan_set(&ok, DeclarationSet::Release).unwrap().functions.len(), 3);
    }

    #[test]
    fn duplicates_are_rejected_per_set() {
        let mut test_log = function("log", Hint::Func, "console.log", vec![], vec![]);
        test_log.is_test = true;
        let b = bindings(vec![function("log", Hint::Func, "console.log", vec![], vec![]), test_log]);
        assert!(plan_set(&b, DeclarationSet::Release).is_ok());
        assert_eq!(plan_set(&b, DeclarationSet::Test).unwrap().module(), "app_test");

        let mut second = function("LOG", Hint::Func, "console.log", vec![], vec![]);
        second.line = 9;
        let b = bindings(vec![function("log", Hint::Func, "console.log", vec![], vec![]), second]);
        let err = plan_set(&b, DeclarationSet::Release).unwrap_err();
        assert_eq!(err.to_string(), "src/lib.rs:9: duplicate name 'LOG', first declared at src/lib.rs:3");
    }

    #[test]
    fn nested_structs_and_unsupported_fields() {
        let line = function(
            "Line",
            Hint::Export,
            "",
            vec![named("_", "u64"), named("from", "Point"), named("to", "Point")],
            vec![],
        );
        let b = bindings(vec![line, point()]);
        let plan = plan_set(&b, DeclarationSet::Release).unwrap();
        let line = plan.exports.iter().find(|l| l.name() == "Line").unwrap();
        assert_eq!(line.fields[1].offset, 8);
        assert_eq!(line.fields[2].offset, 40);
        assert_eq!(line.size, 72);

        let bad = function(
            "Bad",
            Hint::Export,
            "",
            vec![named("_", "u64"), Argument::slice("items", named("_", "u8")).unwrap()],
            vec![],
        );
        let err = plan_set(&bindings(vec![bad]), DeclarationSet::Release).unwrap_err();
        assert!(err.to_string().contains("unsupported field type '[u8]'"), "{err}");
    }

    #[test]
    fn oversized_frames_are_rejected() {
        let huge = |name: &str, length: u64| {
            function(
                name,
                Hint::Func,
                "globalThis.f",
                vec![Argument::array("a", named("_", "u64"), length).unwrap()],
                vec![],
            )
        };
        for case in [huge("wrap", u64::MAX), huge("wide", 1 << 30)] {
            let err = plan_set(&bindings(vec![case]), DeclarationSet::Release).unwrap_err();
            assert!(matches!(err, GenerateError::FrameTooLarge { .. }), "{err}");
            assert!(err.to_string().starts_with("src/lib.rs:3: "), "{err}");
        }

        let result = function(
            "big",
            Hint::Func,
            "globalThis.f",
            vec![Argument::array("a", named("_", "u8"), MAX_FRAME as u64 - 4).unwrap()],
            vec![named("_", "f64")],
        );
        let err = plan_set(&bindings(vec![result]), DeclarationSet::Release).unwrap_err();
        assert!(matches!(err, GenerateError::FrameTooLarge { .. }), "{err}");

        let mut field = point();
        field.host.arguments.push(Argument::array("pad", named("_", "f64"), u64::MAX / 4).unwrap());
        let err = plan_set(&bindings(vec![field]), DeclarationSet::Release).unwrap_err();
        assert!(matches!(err, GenerateError::FrameTooLarge { .. }), "{err}");
    }
}
