//! Safe forwarding functions (`inkwasm_bind.rs`).

use std::collections::BTreeSet;

use inkwasm_bind::Hint;

use super::{frame_const, HEADER};
use crate::plan::{FunctionPlan, SetPlan, Slot, SlotKind, StructLayout};

const ABI: &str = "::inkwasm::abi";

pub(super) fn render(plan: &SetPlan<'_>, stub_file: &str) -> String {
    let mut lines = vec![
        HEADER.to_string(),
        String::new(),
        "#![allow(unreachable_code, unused_imports, clippy::all)]".to_string(),
        String::new(),
        format!("#[path = \"{stub_file}\"]"),
        "mod stub;".to_string(),
        String::new(),
        "use super::*;".to_string(),
    ];

    let mut widths = BTreeSet::new();
    let mut target = BTreeSet::new();
    for function in &plan.functions {
        slot_assertions(function, &mut widths, &mut target);
    }
    for layout in &plan.exports {
        layout_assertions(layout, &mut target);
    }
    if !widths.is_empty() {
        lines.push(String::new());
        lines.push("const _: () = {".to_string());
        lines.extend(widths.into_iter().map(|a| format!("    {a}")));
        lines.push("};".to_string());
    }
    if !target.is_empty() {
        lines.push(String::new());
        lines.push("#[cfg(target_arch = \"wasm32\")]".to_string());
        lines.push("const _: () = {".to_string());
        lines.extend(target.into_iter().map(|a| format!("    {a}")));
        lines.push("};".to_string());
    }

    for function in &plan.functions {
        lines.push(String::new());
        lines.extend(forward(function));
    }
    lines.push(String::new());
    lines.join("\n")
}

fn forward(plan: &FunctionPlan<'_>) -> Vec<String> {
    let name = plan.name();
    let path = &plan.function.script.path;
    let doc = match plan.function.script.hint {
        Hint::New => format!("/// Constructs `{path}`."),
        Hint::Get => format!("/// Reads `{path}`."),
        Hint::Set => format!("/// Writes `{path}`."),
        Hint::Func | Hint::Export => format!("/// Calls `{path}`."),
    };
    let params: Vec<String> = plan.arguments.iter().map(|s| format!("{}: {}", s.name, s.rust)).collect();
    // Strings and sequences arrive as Objects whose conversion can fail.
    let fallible = plan
        .result
        .as_ref()
        .is_some_and(|r| matches!(r.kind, SlotKind::OwnedString | SlotKind::Slice { .. }));
    let value_type = match (&plan.result, plan.flag) {
        (None, _) => None,
        (Some(result), None) => Some(result.rust.clone()),
        (Some(result), Some(_)) => Some(format!("({}, bool)", result.rust)),
    };
    let returns = match value_type {
        None => String::new(),
        Some(t) if fallible => format!(" -> ::inkwasm::Result<{t}>"),
        Some(t) => format!(" -> {t}"),
    };

    let mut lines = vec![
        doc,
        format!("pub fn {name}({}){returns} {{", params.join(", ")),
        format!(
            "    let mut frame = {ABI}::Frame::<{{ stub::{} }}>::new();",
            frame_const(name)
        ),
    ];
    lines.extend(plan.arguments.iter().map(put));
    lines.push(format!("    unsafe {{ stub::{name}(frame.as_mut_ptr()) }};"));
    if let Some(result) = &plan.result {
        let value = get(result);
        match plan.flag {
            Some(flag) if fallible => {
                lines.push(format!("    if !frame.get::<bool>({flag}) {{"));
                lines.push("        return Ok((Default::default(), false));".to_string());
                lines.push("    }".to_string());
                lines.push(format!("    Ok(({value}?, true))"));
            }
            Some(flag) => lines.push(format!("    ({value}, frame.get::<bool>({flag}))")),
            None => lines.push(format!("    {value}")),
        }
    }
    lines.push("}".to_string());
    lines
}

fn put(slot: &Slot) -> String {
    let (name, offset) = (&slot.name, slot.offset);
    match &slot.kind {
        SlotKind::Value { .. } => format!("    frame.put({offset}, {name});"),
        SlotKind::Str => format!("    frame.put_str({offset}, {name});"),
        SlotKind::Pointer => format!("    frame.put_ptr({offset}, {name});"),
        SlotKind::Struct { .. } => format!("    frame.put_ptr({offset}, &{name} as *const {});", slot.rust),
        SlotKind::Array { .. } => format!("    frame.put_array({offset}, &{name});"),
        SlotKind::Slice { .. } => format!("    frame.put_slice({offset}, {name});"),
        SlotKind::OwnedString => format!("    frame.put_str({offset}, &{name});"),
    }
}

fn get(slot: &Slot) -> String {
    let offset = slot.offset;
    match &slot.kind {
        SlotKind::OwnedString => format!("frame.get_string({offset})"),
        SlotKind::Array { element, length } => format!("frame.get_array::<{}, {length}>({offset})", element.rust),
        SlotKind::Slice { element } => format!("frame.get_vec::<{}>({offset})", element.rust),
        _ => format!("frame.get::<{}>({offset})", slot.rust),
    }
}

/// Width checks tying the plan to the runtime's slot traits. Checks that
/// only hold with 32-bit addresses go to `target`.
fn slot_assertions(plan: &FunctionPlan<'_>, widths: &mut BTreeSet<String>, target: &mut BTreeSet<String>) {
    let check = |rust: &str, trait_name: &str, width: usize| {
        format!("assert!(<{rust} as {ABI}::{trait_name}>::WIDTH == {width});")
    };
    for slot in &plan.arguments {
        match &slot.kind {
            SlotKind::Value { .. } => {
                widths.insert(check(&slot.rust, "Slot", slot.width));
            }
            SlotKind::Array { element, .. } => {
                widths.insert(check(&element.rust, "Slot", element.width));
            }
            SlotKind::Str => {
                widths.insert(format!("assert!({ABI}::SEQUENCE_WIDTH == {});", slot.width));
            }
            SlotKind::Slice { element } => {
                widths.insert(format!("assert!({ABI}::SEQUENCE_WIDTH == {});", slot.width));
                target.insert(format!(
                    "assert!(::core::mem::size_of::<{}>() == {});",
                    element.rust, element.width
                ));
            }
            SlotKind::Pointer | SlotKind::Struct { .. } => {
                widths.insert(format!("assert!({ABI}::POINTER_WIDTH == {});", slot.width));
            }
            SlotKind::OwnedString => {}
        }
    }
    if let Some(result) = &plan.result {
        match &result.kind {
            SlotKind::Value { .. } => {
                widths.insert(check(&result.rust, "ResultSlot", result.width));
            }
            SlotKind::Array { element, .. } => {
                widths.insert(check(&element.rust, "ResultSlot", element.width));
            }
            SlotKind::Slice { element } => {
                target.insert(format!(
                    "assert!(::core::mem::size_of::<{}>() == {});",
                    element.rust, element.width
                ));
            }
            _ => {}
        }
    }
}

fn layout_assertions(layout: &StructLayout<'_>, target: &mut BTreeSet<String>) {
    let name = layout.name();
    target.insert(format!("assert!(::core::mem::size_of::<{name}>() == {});", layout.size));
    for field in layout.fields.iter().filter(|f| f.name != inkwasm_bind::DISCARD_NAME) {
        target.insert(format!(
            "assert!(::core::mem::offset_of!({name}, {}) == {});",
            field.name, field.offset
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::plan_set;
    use inkwasm_bind::{Argument, DeclarationSet, Function, HostSignature, Package, PackageBindings, ScriptTarget};
    use std::path::PathBuf;

    fn bindings() -> PackageBindings {
        let function = |name: &str, hint, path: &str, arguments, results| Function {
            file: PathBuf::from("src/lib.rs"),
            line: 1,
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
        };
        PackageBindings {
            package: Package {
                name: "app".into(),
                dir: PathBuf::from("."),
                path: "app".into(),
            },
            functions: vec![
                function(
                    "Point",
                    Hint::Export,
                    "",
                    vec![Argument::named("_", "u64"), Argument::named("x", "f64")],
                    vec![],
                ),
                function(
                    "query",
                    Hint::Func,
                    ".querySelector",
                    vec![Argument::named("doc", "inkwasm.Object"), Argument::named("sel", "str")],
                    vec![Argument::named("_", "inkwasm.Object"), Argument::named("_", "bool")],
                ),
                function(
                    "plot",
                    Hint::Func,
                    "globalThis.plot",
                    vec![
                        Argument::named("p", "Point"),
                        Argument::slice("_", Argument::named("_", "u16")).unwrap(),
                    ],
                    vec![Argument::named("_", "String")],
                ),
            ],
        }
    }

    #[test]
    fn forwarding_functions() {
        let b = bindings();
        let plan = plan_set(&b, DeclarationSet::Release).unwrap();
        let text = render(&plan, "inkwasm_stub.rs");
        assert!(text.starts_with(HEADER));
        assert!(text.contains("#[path = \"inkwasm_stub.rs\"]\nmod stub;"));
        assert!(text.contains(
            "/// Calls `.querySelector`.\n\
             pub fn query(doc: ::inkwasm::Object, sel: &str) -> (::inkwasm::Object, bool) {\n    \
             let mut frame = ::inkwasm::abi::Frame::<{ stub::FRAME_QUERY }>::new();\n    \
             frame.put(0, doc);\n    \
             frame.put_str(16, sel);\n    \
             unsafe { stub::query(frame.as_mut_ptr()) };\n    \
             (frame.get::<::inkwasm::Object>(24), frame.get::<bool>(40))\n}"
        ));
        assert!(text.contains("pub fn plot(p: Point, arg1: &[u16]) -> ::inkwasm::Result<String> {"));
        assert!(text.contains("frame.put_ptr(0, &p as *const Point);"));
        assert!(text.contains("frame.put_slice(4, arg1);"));
        assert!(text.contains("    frame.get_string(16)\n}"));
    }

    #[test]
    fn flagged_conversions_skip_missing_values() {
        let mut b = bindings();
        b.functions[1].host.results[0] = Argument::slice("_", Argument::named("_", "f64")).unwrap();
        let plan = plan_set(&b, DeclarationSet::Release).unwrap();
        let text = render(&plan, "inkwasm_stub.rs");
        assert!(text.contains(
            "pub fn query(doc: ::inkwasm::Object, sel: &str) -> ::inkwasm::Result<(Vec<f64>, bool)> {"
        ));
        assert!(text.contains(
            "    if !frame.get::<bool>(40) {\n        \
             return Ok((Default::default(), false));\n    \
             }\n    \
             Ok((frame.get_vec::<f64>(24)?, true))\n}"
        ));
    }

    #[test]
    fn assertions_are_deduplicated() {
        let b = bindings();
        let plan = plan_set(&b, DeclarationSet::Release).unwrap();
        let text = render(&plan, "inkwasm_stub.rs");
        assert_eq!(text.matches("SEQUENCE_WIDTH == 8").count(), 1);
        assert!(text.contains("assert!(<::inkwasm::Object as ::inkwasm::abi::Slot>::WIDTH == 16);"));
        assert!(text.contains("assert!(<::inkwasm::Object as ::inkwasm::abi::ResultSlot>::WIDTH == 16);"));
        assert!(text.contains("#[cfg(target_arch = \"wasm32\")]\nconst _: () = {"));
        assert!(text.contains("assert!(::core::mem::size_of::<Point>() == 16);"));
        assert!(text.contains("assert!(::core::mem::offset_of!(Point, x) == 8);"));
        assert!(text.contains("assert!(::core::mem::size_of::<u16>() == 2);"));
    }
}
