//! Artifact rendering.
//!
//! Each artifact set of a package renders to three texts: the script
//! trampolines, the raw import stubs, and the safe forwarding functions.
//! Rendering is pure; writing happens in [`crate::writer`].

mod host;
mod script;
mod stub;

use inkwasm_bind::DeclarationSet;

use crate::config::GeneratorConfig;
use crate::plan::SetPlan;

/// First line of every generated file.
pub const HEADER: &str = "// Code generated by inkwasm. DO NOT EDIT.";

/// File names of one artifact set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileNames {
    pub script: &'static str,
    pub stub: &'static str,
    pub host: &'static str,
}

impl FileNames {
    pub fn of(set: DeclarationSet) -> Self {
        match set {
            DeclarationSet::Release => FileNames {
                script: "inkwasm_js.js",
                stub: "inkwasm_stub.rs",
                host: "inkwasm_bind.rs",
            },
            DeclarationSet::Test => FileNames {
                script: "inkwasm_js_test.js",
                stub: "inkwasm_stub_test.rs",
                host: "inkwasm_bind_test.rs",
            },
        }
    }

    pub fn all(self) -> [&'static str; 3] {
        [self.script, self.stub, self.host]
    }
}

/// One generated file: its name and full text, or `None` when the set is
/// empty and the file should not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub name: &'static str,
    pub text: Option<String>,
}

/// Render the three files of one artifact set.
pub fn render(plan: &SetPlan<'_>, config: &GeneratorConfig) -> [Rendered; 3] {
    let names = FileNames::of(plan.set);
    if plan.is_empty() {
        return names.all().map(|name| Rendered { name, text: None });
    }
    [
        Rendered {
            name: names.script,
            text: Some(script::render(plan, config)),
        },
        Rendered {
            name: names.stub,
            text: Some(stub::render(plan)),
        },
        Rendered {
            name: names.host,
            text: Some(host::render(plan, names.stub)),
        },
    ]
}

/// Rust constant holding a function's frame size.
pub(crate) fn frame_const(name: &str) -> String {
    format!("FRAME_{}", name.trim_start_matches("r#").to_ascii_uppercase())
}

/// JSON string literal, safe to splice into script source.
pub(crate) fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_per_set() {
        assert_eq!(FileNames::of(DeclarationSet::Release).stub, "inkwasm_stub.rs");
        assert_eq!(
            FileNames::of(DeclarationSet::Test).all(),
            ["inkwasm_js_test.js", "inkwasm_stub_test.rs", "inkwasm_bind_test.rs"]
        );
    }

    #[test]
    fn literals_and_constants() {
        assert_eq!(js_string("a\"b\n"), "\"a\\\"b\\n\"");
        assert_eq!(frame_const("getElement"), "FRAME_GETELEMENT");
        assert_eq!(frame_const("r#type"), "FRAME_TYPE");
    }
}
