//! Script trampolines and export decoders (`inkwasm_js.js`).

use inkwasm_bind::Hint;

use super::stub::import_name;
use super::{js_string, HEADER};
use crate::config::GeneratorConfig;
use crate::plan::{FunctionPlan, SetPlan, Slot, SlotKind, StructLayout};

pub(super) fn render(plan: &SetPlan<'_>, config: &GeneratorConfig) -> String {
    let package = js_string(&plan.package.name);
    let mut lines = vec![
        HEADER.to_string(),
        "(() => {".to_string(),
        "    \"use strict\";".to_string(),
        String::new(),
        format!("    const ink = {};", config.namespace),
    ];

    if !plan.exports.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "    ink.Exports[{package}] = Object.assign(ink.Exports[{package}] || {{}}, {{"
        ));
        for layout in &plan.exports {
            lines.extend(decoder(layout, &package));
        }
        lines.push("    });".to_string());
    }

    if config.strict_targets {
        let paths: Vec<String> = plan
            .functions
            .iter()
            .filter(|f| matches!(f.function.script.hint, Hint::Func | Hint::New) && !f.has_receiver())
            .map(|f| js_string(&f.function.script.path))
            .collect();
        if !paths.is_empty() {
            lines.push(String::new());
            lines.push(format!("    ink.Internal.check({package}, [{}]);", paths.join(", ")));
        }
    }

    if !plan.functions.is_empty() {
        let module = js_string(&plan.module());
        lines.push(String::new());
        lines.push(format!(
            "    ink.Imports[{module}] = Object.assign(ink.Imports[{module}] || {{}}, {{"
        ));
        for function in &plan.functions {
            lines.extend(trampoline(function, &package));
        }
        lines.push("    });".to_string());
    }

    lines.push("})();".to_string());
    lines.push(String::new());
    lines.join("\n")
}

fn decoder(layout: &StructLayout<'_>, package: &str) -> Vec<String> {
    let mut lines = vec![format!("        {}: (view, addr) => ({{", js_string(layout.name()))];
    for field in layout.fields.iter().filter(|f| f.name != inkwasm_bind::DISCARD_NAME) {
        let at = format!("addr + {}", field.offset);
        let value = match &field.kind {
            SlotKind::Struct { name } => format!("ink.Exports[{package}][{}](view, {at})", js_string(name)),
            _ => load(field, &at, package),
        };
        lines.push(format!("            {}: {value},", js_string(&field.script_name)));
    }
    lines.push("        }),".to_string());
    lines
}

/// Expression reading `slot` from `at` in the current view.
fn load(slot: &Slot, at: &str, package: &str) -> String {
    match &slot.kind {
        SlotKind::Value { accessor } => format!("ink.Load.{accessor}(view, {at})"),
        SlotKind::Str | SlotKind::OwnedString => format!("ink.Load.String(view, {at})"),
        SlotKind::Pointer => format!("ink.Load.Ptr(view, {at})"),
        SlotKind::Struct { name } => format!(
            "ink.Exports[{package}][{}](view, ink.Load.Ptr(view, {at}))",
            js_string(name)
        ),
        SlotKind::Array { element, length } => match element.typed {
            Some(typed) => format!("ink.Load.{typed}(view, {at}, {length})"),
            None => format!(
                "ink.Load.Array(view, {at}, {length}, ink.Load.{}, {})",
                element.accessor, element.width
            ),
        },
        SlotKind::Slice { element } => format!(
            "ink.Load.Slice(view, {at}, ink.Load.{}, {})",
            element.typed.unwrap_or(element.accessor),
            element.width
        ),
    }
}

/// Statement writing `value` into `slot`.
fn store(slot: &Slot, value: &str) -> String {
    let at = format!("frame + {}", slot.offset);
    match &slot.kind {
        SlotKind::Array { element, length } => format!(
            "ink.Set.Array(view, {at}, {value}, {length}, ink.Set.{}, {});",
            element.accessor, element.width
        ),
        SlotKind::Slice { element } => format!(
            "ink.Set.Slice(view, {at}, {value}, ink.Set.{}, {});",
            element.accessor, element.width
        ),
        SlotKind::OwnedString => format!("ink.Set.String(view, {at}, {value});"),
        SlotKind::Value { accessor } => format!("ink.Set.{accessor}(view, {at}, {value});"),
        SlotKind::Str | SlotKind::Pointer | SlotKind::Struct { .. } => String::new(),
    }
}

/// Script expression performing the call a hint asks for.
fn call(plan: &FunctionPlan<'_>, args: &[String]) -> String {
    let script = &plan.function.script;
    let (target, rest) = if plan.has_receiver() {
        let member = script.member();
        let target = if member.is_empty() {
            args[0].clone()
        } else {
            format!("{}.{member}", args[0])
        };
        (target, &args[1..])
    } else {
        (script.path.clone(), args)
    };
    match (script.hint, rest) {
        (Hint::New, _) => format!("new ({target})({})", rest.join(", ")),
        (Hint::Get, []) => target,
        (Hint::Get, [key, ..]) => format!("{target}[{key}]"),
        (Hint::Set, [value]) => format!("{target} = {value}"),
        (Hint::Set, [key, value, ..]) => format!("{target}[{key}] = {value}"),
        _ => format!("{target}({})", rest.join(", ")),
    }
}

fn trampoline(plan: &FunctionPlan<'_>, package: &str) -> Vec<String> {
    let mut lines = vec![
        format!("        {}: (frame) => {{", js_string(import_name(plan.name()))),
        "            let view = ink.Internal.view();".to_string(),
    ];
    let mut args = Vec::new();
    for (i, slot) in plan.arguments.iter().enumerate() {
        let name = format!("a{i}");
        let value = load(slot, &format!("frame + {}", slot.offset), package);
        lines.push(format!("            const {name} = {value};"));
        args.push(name);
    }

    let expression = call(plan, &args);
    let mut body = Vec::new();
    match &plan.result {
        Some(result) => {
            body.push(format!("const r = {expression};"));
            if plan.flag.is_some() && plan.function.script.hint == Hint::Get {
                body.push(format!(
                    "if (r === undefined) throw new ReferenceError({});",
                    js_string(&format!("inkwasm: {} is undefined", plan.function.script.path))
                ));
            }
            body.push("view = ink.Internal.view();".to_string());
            body.push(store(result, "r"));
        }
        None => body.push(format!("{expression};")),
    }

    match plan.flag {
        Some(flag) => {
            lines.push("            try {".to_string());
            lines.extend(body.into_iter().map(|s| format!("                {s}")));
            lines.push(format!("                ink.Set.Bool(view, frame + {flag}, true);"));
            lines.push("            } catch (e) {".to_string());
            lines.push("                console.error(e);".to_string());
            lines.push(format!("                ink.Set.Bool(ink.Internal.view(), frame + {flag}, false);"));
            lines.push("            }".to_string());
        }
        None => lines.extend(body.into_iter().map(|s| format!("            {s}"))),
    }
    lines.push("        },".to_string());
    lines
}
