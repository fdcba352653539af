use std::fs;
use std::path::Path;

use inkwasm_bind::bridge::{self, Direction};
use inkwasm_bind::Mode;
use inkwasm_gen::{GenerateError, Generator, Outcome};

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

const APP_LIB: &str = r#"use inkwasm::Object;

//inkwasm:func globalThis.console.log
pub fn log(message: &str) {}

extern "C" {
    //inkwasm:get .
    fn item(list: Object, index: u32) -> Object;

    //inkwasm:func .getContext
    fn context(canvas: Object, kind: &str) -> (Object, bool);

    //inkwasm:func globalThis.sum
    fn sum(values: &[f64], weights: [f32; 4]) -> f64;
}

#[cfg(test)]
mod tests {
    //inkwasm:get globalThis.navigator.userAgent
    fn user_agent() -> String {
        unimplemented!()
    }
}
"#;

fn fixture() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(
        root,
        "app/Cargo.toml",
        "[package]\nname = \"app\"\n\n[dependencies]\ndom = { path = \"../dom\" }\n\n\
         [package.metadata.inkwasm]\nstrict_targets = true\n",
    );
    write(root, "app/src/lib.rs", APP_LIB);
    write(root, "dom/Cargo.toml", "[package]\nname = \"web-dom\"\n");
    write(
        root,
        "dom/src/lib.rs",
        r#"//inkwasm:export
#[repr(C)]
pub struct Rect {
    _filler: u64,
    pub w: f64,
    /// inkwasm:"height"
    pub h: f64,
}

//inkwasm:func globalThis.draw
pub fn draw(rect: Rect) {}
"#,
    );
    tmp
}

fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap()
}

/// Accessor names referenced as `ink.<namespace>.<Name>` in generated script.
fn referenced(text: &str, namespace: &str) -> Vec<String> {
    let needle = format!("ink.{namespace}.");
    text.match_indices(&needle)
        .map(|(at, _)| {
            text[at + needle.len()..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .collect()
        })
        .collect()
}

#[test]
fn generates_every_package() {
    let tmp = fixture();
    let app = tmp.path().join("app");
    let generator = Generator::for_crate(&app).unwrap();
    let report = generator.generate(&app).unwrap();

    assert_eq!(report.packages, vec!["app", "web-dom"]);
    assert_eq!(report.declarations, 7);
    assert_eq!(report.count(Outcome::Written), 9);

    let root = tmp.path();
    let js = read(root, "app/src/inkwasm_js.js");
    assert!(js.starts_with("// Code generated by inkwasm. DO NOT EDIT."));
    assert!(js.contains("ink.Imports[\"app\"]"));
    assert!(js.contains("globalThis.console.log(a0);"));
    assert!(js.contains("const r = a0[a1];"));
    assert!(js.contains("const r = a0.getContext(a1);"));
    assert!(js.contains("ink.Internal.check(\"app\", [\"globalThis.console.log\", \"globalThis.sum\"]);"));

    let stub = read(root, "app/src/inkwasm_stub.rs");
    assert!(stub.contains("#[link(wasm_import_module = \"app\")]"));
    assert!(stub.contains("pub(super) const FRAME_SUM: usize = 32;"));

    let bind = read(root, "app/src/inkwasm_bind.rs");
    assert!(bind.contains("pub fn sum(values: &[f64], weights: [f32; 4]) -> f64 {"));
    assert!(bind.contains("pub fn context(canvas: ::inkwasm::Object, kind: &str) -> (::inkwasm::Object, bool) {"));

    let test_js = read(root, "app/src/inkwasm_js_test.js");
    assert!(test_js.contains("ink.Imports[\"app_test\"]"));
    assert!(read(root, "app/src/inkwasm_bind_test.rs").contains("pub fn user_agent() -> ::inkwasm::Result<String> {"));

    let dom_js = read(root, "dom/src/inkwasm_js.js");
    assert!(dom_js.contains("ink.Exports[\"web-dom\"]"));
    assert!(dom_js.contains("\"height\": ink.Load.Float64(view, addr + 16),"));
    assert!(read(root, "dom/src/inkwasm_bind.rs").contains("assert!(::core::mem::offset_of!(Rect, h) == 16);"));
    assert!(!root.join("dom/src/inkwasm_js_test.js").exists());

    for (namespace, text) in [("Load", &js), ("Set", &js), ("Load", &dom_js), ("Set", &test_js)] {
        for accessor in referenced(text, namespace) {
            assert!(
                inkwasm::RUNTIME_JS.contains(&format!("{accessor}:")),
                "runtime has no {namespace}.{accessor}"
            );
        }
    }
}

#[test]
fn second_run_is_a_no_op_and_stale_files_go() {
    let tmp = fixture();
    let app = tmp.path().join("app");
    let generator = Generator::for_crate(&app).unwrap();
    generator.generate(&app).unwrap();

    let report = generator.generate(&app).unwrap();
    assert_eq!(report.count(Outcome::Written), 0);
    assert_eq!(report.count(Outcome::Unchanged), 9);

    let without_tests = APP_LIB.split("#[cfg(test)]").next().unwrap();
    write(tmp.path(), "app/src/lib.rs", without_tests);
    let report = generator.generate(&app).unwrap();
    assert_eq!(report.count(Outcome::Removed), 3);
    assert!(!tmp.path().join("app/src/inkwasm_bind_test.rs").exists());
    assert!(tmp.path().join("app/src/inkwasm_bind.rs").exists());
}

#[test]
fn invalid_declaration_leaves_files_alone() {
    let tmp = fixture();
    let app = tmp.path().join("app");
    let generator = Generator::for_crate(&app).unwrap();
    generator.generate(&app).unwrap();
    let before = read(tmp.path(), "app/src/inkwasm_js.js");

    write(
        tmp.path(),
        "app/src/lib.rs",
        &APP_LIB.replace("fn sum(values: &[f64], weights: [f32; 4]) -> f64;", "fn sum(values: &[f64]) -> *const f64;"),
    );
    let err = generator.generate(&app).unwrap_err();
    assert!(matches!(err, GenerateError::PointerResult { .. }), "{err}");
    assert!(err.to_string().contains("lib.rs:"), "{err}");
    assert_eq!(read(tmp.path(), "app/src/inkwasm_js.js"), before);
}

#[test]
fn broken_dependency_does_not_block_the_entry_package() {
    let tmp = fixture();
    let app = tmp.path().join("app");
    write(tmp.path(), "dom/src/lib.rs", "//inkwasm:func globalThis.x\npub struct Bad;\n");

    let err = Generator::for_crate(&app).unwrap().generate(&app).unwrap_err();
    assert!(matches!(err, GenerateError::Parse(_)), "{err}");
    assert!(err.to_string().contains("lib.rs:1:"), "{err}");
    assert!(tmp.path().join("app/src/inkwasm_js.js").exists());
    assert!(tmp.path().join("app/src/inkwasm_bind_test.rs").exists());
    assert!(!tmp.path().join("dom/src/inkwasm_js.js").exists());
}

#[test]
fn emptied_dependency_loses_its_files() {
    let tmp = fixture();
    let app = tmp.path().join("app");
    let generator = Generator::for_crate(&app).unwrap();
    generator.generate(&app).unwrap();
    assert!(tmp.path().join("dom/src/inkwasm_bind.rs").exists());

    write(tmp.path(), "dom/src/lib.rs", "pub struct Rect;\n");
    let report = generator.generate(&app).unwrap();
    assert_eq!(report.packages, vec!["app", "web-dom"]);
    assert_eq!(report.count(Outcome::Removed), 3);
    for name in ["inkwasm_js.js", "inkwasm_stub.rs", "inkwasm_bind.rs"] {
        assert!(!tmp.path().join("dom/src").join(name).exists(), "{name} is still there");
    }
}

#[test]
fn runtime_defines_every_bridge_accessor() {
    for direction in [Direction::Load, Direction::Store] {
        for mode in [Mode::Static, Mode::Pointer, Mode::Array, Mode::Slice] {
            for (_, row) in bridge::rows(direction, mode) {
                assert!(
                    inkwasm::RUNTIME_JS.contains(&format!("{}:", row.accessor)),
                    "runtime has no {}.{}",
                    direction.namespace(),
                    row.accessor
                );
            }
        }
    }
}
