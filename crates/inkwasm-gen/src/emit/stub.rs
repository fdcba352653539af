//! Raw import stubs (`inkwasm_stub.rs`).

use super::{frame_const, HEADER};
use crate::plan::SetPlan;

pub(super) fn render(plan: &SetPlan<'_>) -> String {
    let module = plan.module();
    let mut lines = vec![
        HEADER.to_string(),
        String::new(),
        "#![allow(dead_code)]".to_string(),
        String::new(),
    ];

    for function in &plan.functions {
        lines.push(format!(
            "pub(super) const {}: usize = {};",
            frame_const(function.name()),
            function.frame_size
        ));
    }

    if !plan.functions.is_empty() {
        lines.push(String::new());
        lines.push("#[cfg(target_arch = \"wasm32\")]".to_string());
        lines.push(format!("#[link(wasm_import_module = \"{module}\")]"));
        lines.push("unsafe extern \"C\" {".to_string());
        for function in &plan.functions {
            lines.push(format!("    #[link_name = \"{}\"]", import_name(function.name())));
            lines.push(format!("    pub(super) fn {}(frame: *mut u8);", function.name()));
        }
        lines.push("}".to_string());
    }

    for function in &plan.functions {
        lines.push(String::new());
        lines.push("#[cfg(not(target_arch = \"wasm32\"))]".to_string());
        lines.push(format!("pub(super) unsafe fn {}(_frame: *mut u8) {{", function.name()));
        lines.push(format!(
            "    ::inkwasm::abi::unavailable(\"{module}\", \"{}\")",
            import_name(function.name())
        ));
        lines.push("}".to_string());
    }
    lines.push(String::new());
    lines.join("\n")
}

/// Import name of a function: its identifier without a raw prefix.
pub(super) fn import_name(name: &str) -> &str {
    name.trim_start_matches("r#")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::plan_set;
    use inkwasm_bind::{Argument, DeclarationSet, Function, Hint, HostSignature, Package, PackageBindings, ScriptTarget};
    use std::path::PathBuf;

    #[test]
    fn imports_and_fallbacks() {
        let b = PackageBindings {
            package: Package {
                name: "app".into(),
                dir: PathBuf::from("."),
                path: "app".into(),
            },
            functions: vec![Function {
                file: PathBuf::from("tests/web.rs"),
                line: 4,
                is_test: true,
                host: HostSignature {
                    name: "alert".into(),
                    arguments: vec![Argument::named("message", "str")],
                    results: vec![],
                },
                script: ScriptTarget {
                    path: "globalThis.alert".into(),
                    hint: Hint::Func,
                },
            }],
        };
        let plan = plan_set(&b, DeclarationSet::Test).unwrap();
        let text = render(&plan);
        assert!(text.contains("pub(super) const FRAME_ALERT: usize = 8;"));
        assert!(text.contains("#[link(wasm_import_module = \"app_test\")]\nunsafe extern \"C\" {"));
        assert!(text.contains("    #[link_name = \"alert\"]\n    pub(super) fn alert(frame: *mut u8);"));
        assert!(text.contains(
            "#[cfg(not(target_arch = \"wasm32\"))]\npub(super) unsafe fn alert(_frame: *mut u8) {\n    \
             ::inkwasm::abi::unavailable(\"app_test\", \"alert\")\n}"
        ));
    }

    #[test]
    fn raw_identifiers_import_by_plain_name() {
        assert_eq!(import_name("r#type"), "type");
        assert_eq!(import_name("log"), "log");
    }
}
