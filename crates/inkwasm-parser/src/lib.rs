//! Discovers inkwasm-annotated declarations in Cargo packages.
//!
//! Starting from an entry crate, the parser walks the module tree of every
//! reachable local package, pairs `//inkwasm:<hint>[ <path>]` marker
//! comments with the declaration that follows them, and resolves each
//! declaration into the [`inkwasm_bind`] model.
//!
//! ## Modules
//!
//! - [`error`]: Parser error type
//! - `marker`: Marker comment recognition
//! - `shape`: Rust type syntax to argument shapes
//! - `source`: Per-file marker/declaration pairing
//! - `package`: Manifest loading and module file resolution

pub mod error;
mod marker;
mod package;
mod shape;
mod source;

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use inkwasm_bind::{Function, PackageBindings};

pub use error::{ParseError, Result};

use package::{module_file, CratePackage, ModuleStyle};
use source::FileContext;

/// Default marker prefix.
pub const DEFAULT_PREFIX: &str = "inkwasm";

/// Parser configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// Marker prefix, as in `//<prefix>:func`.
    pub prefix: String,
    /// Whether test-scoped declarations of the entry package are collected.
    pub include_tests: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            prefix: DEFAULT_PREFIX.to_string(),
            include_tests: true,
        }
    }
}

/// Walks package graphs and collects annotated declarations.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    options: ParserOptions,
}

impl Parser {
    pub fn new(options: ParserOptions) -> Self {
        Parser { options }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Parse the entry package in `entry_dir` and every local package it
    /// depends on.
    ///
    /// Packages are visited once each, keyed by canonical directory, and
    /// returned in visit order with the entry package first. Every visited
    /// package is returned, including ones without declarations, so stale
    /// artifacts can be removed. A failure affects only its own entry; the
    /// walk continues through the dependencies of any package whose
    /// manifest could be read.
    pub fn parse_packages(&self, entry_dir: &Path) -> Vec<Result<PackageBindings>> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([(entry_dir.to_path_buf(), true)]);
        let mut found = Vec::new();

        while let Some((dir, is_entry)) = queue.pop_front() {
            let identity = fs::canonicalize(&dir).unwrap_or_else(|_| dir.clone());
            if !seen.insert(identity) {
                continue;
            }

            let krate = match CratePackage::load(&dir) {
                Ok(krate) => krate,
                Err(err) => {
                    tracing::error!(dir = %dir.display(), %err, "cannot load package");
                    found.push(Err(err));
                    continue;
                }
            };
            let include_tests = is_entry && self.options.include_tests;
            match krate.dependency_dirs(include_tests) {
                Ok(deps) => queue.extend(deps.into_iter().map(|dep| (dep, false))),
                Err(err) => {
                    tracing::error!(package = %krate.package.name, %err, "cannot resolve dependencies");
                    found.push(Err(err));
                    continue;
                }
            }

            let parsed = self.parse_crate(&krate, include_tests).map(|functions| {
                tracing::debug!(
                    package = %krate.package.name,
                    declarations = functions.len(),
                    "parsed package"
                );
                PackageBindings {
                    package: krate.package,
                    functions,
                }
            });
            found.push(parsed);
        }
        found
    }

    /// Parse a single package without following its dependencies.
    pub fn parse_package(&self, dir: &Path) -> Result<PackageBindings> {
        let krate = CratePackage::load(dir)?;
        let functions = self.parse_crate(&krate, self.options.include_tests)?;
        Ok(PackageBindings {
            package: krate.package,
            functions,
        })
    }

    fn parse_crate(&self, krate: &CratePackage, include_tests: bool) -> Result<Vec<Function>> {
        let mut walk = ModuleWalk {
            prefix: &self.options.prefix,
            in_runtime: krate.package.path == shape::RUNTIME_CRATE,
            include_tests,
            visited: HashSet::new(),
            functions: Vec::new(),
        };
        for root in &krate.roots {
            walk.visit(root, ModuleStyle::OwnsDirectory, false)?;
        }
        if include_tests {
            for root in &krate.test_roots {
                walk.visit(root, ModuleStyle::OwnsDirectory, true)?;
            }
        }
        Ok(walk.functions)
    }
}

struct ModuleWalk<'a> {
    prefix: &'a str,
    in_runtime: bool,
    include_tests: bool,
    visited: HashSet<PathBuf>,
    functions: Vec<Function>,
}

impl ModuleWalk<'_> {
    fn visit(&mut self, file: &Path, style: ModuleStyle, is_test: bool) -> Result<()> {
        if !self.visited.insert(file.to_path_buf()) {
            return Ok(());
        }
        let source = fs::read_to_string(file).map_err(|err| ParseError::io(file, err))?;
        let ctx = FileContext {
            prefix: self.prefix,
            in_runtime: self.in_runtime,
            include_tests: self.include_tests,
            file_is_test: is_test,
        };
        let parsed = source::parse_source(&ctx, file, &source)?;
        self.functions.extend(parsed.functions);

        for module in parsed.modules {
            match module_file(file, style, &module) {
                Some((child, child_style)) => self.visit(&child, child_style, is_test || module.is_test)?,
                None => tracing::warn!(
                    file = %file.display(),
                    line = module.line,
                    module = %module.name,
                    "module file not found, skipping"
                ),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwasm_bind::{DeclarationSet, Hint, OBJECT_TYPE};

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn parse_all(parser: &Parser, dir: &Path) -> Vec<PackageBindings> {
        parser.parse_packages(dir).into_iter().collect::<Result<_>>().unwrap()
    }

    fn fixture() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(
            root,
            "Cargo.toml",
            "[workspace]\nmembers = [\"app\", \"dom\"]\n[workspace.dependencies]\ndom = { path = \"dom\" }\n",
        );
        write(
            root,
            "app/Cargo.toml",
            "[package]\nname = \"app\"\n[dependencies]\ndom = { workspace = true }\nplain = { path = \"../plain\" }\n[dev-dependencies]\ntesting = { path = \"../testing\" }\n",
        );
        write(
            root,
            "app/src/lib.rs",
            r#"use inkwasm::Object;

mod ffi;

//inkwasm:func globalThis.console.log
pub fn log(message: &str) {}

#[cfg(test)]
mod tests {
    //inkwasm:get globalThis.navigator
    fn navigator() -> (inkwasm::Object, bool) {
        unimplemented!()
    }
}
"#,
        );
        write(
            root,
            "app/src/ffi.rs",
            "extern \"C\" {\n    //inkwasm:func .push\n    fn push(array: inkwasm::Object, value: f64);\n}\n",
        );
        write(
            root,
            "app/tests/web.rs",
            "//inkwasm:func globalThis.check\nfn check(ok: bool) {}\n",
        );
        write(root, "dom/Cargo.toml", "[package]\nname = \"web-dom\"\n[dependencies]\napp = { path = \"../app\" }\n");
        write(
            root,
            "dom/src/lib.rs",
            "//inkwasm:export\npub struct Rect {\n    _filler: u64,\n    pub w: f64,\n}\n",
        );
        write(root, "plain/Cargo.toml", "[package]\nname = \"plain\"\n");
        write(root, "plain/src/lib.rs", "pub fn nothing() {}\n");
        write(root, "testing/Cargo.toml", "[package]\nname = \"testing\"\n");
        write(root, "testing/src/lib.rs", "//inkwasm:func globalThis.assert\npub fn assert(v: bool) {}\n");
        tmp
    }

    #[test]
    fn walks_entry_and_dependencies() {
        let tmp = fixture();
        let parser = Parser::default();
        let packages = parse_all(&parser, &tmp.path().join("app"));
        let names: Vec<&str> = packages.iter().map(|p| p.package.name.as_str()).collect();
        assert_eq!(names, vec!["app", "web-dom", "plain", "testing"]);
        assert!(packages[2].functions.is_empty());

        let app = &packages[0];
        assert_eq!(app.package.path, "app");
        let release = app.select(DeclarationSet::Release);
        let test = app.select(DeclarationSet::Test);
        assert_eq!(release.len(), 2);
        assert_eq!(test.len(), 2);
        assert_eq!(release[1].host.name, "push");
        assert_eq!(release[1].host.arguments[0].type_name(), OBJECT_TYPE);
        assert!(test.iter().any(|f| f.host.name == "check"));
        assert!(test.iter().any(|f| f.script.hint == Hint::Get));

        let dom = &packages[1];
        assert_eq!(dom.package.path, "web_dom");
        assert_eq!(dom.functions[0].script.hint, Hint::Export);
    }

    #[test]
    fn tests_excluded_when_disabled() {
        let tmp = fixture();
        let parser = Parser::new(ParserOptions {
            include_tests: false,
            ..ParserOptions::default()
        });
        let packages = parse_all(&parser, &tmp.path().join("app"));
        assert_eq!(packages.len(), 3);
        assert!(packages[0].functions.iter().all(|f| !f.is_test));
    }

    #[test]
    fn dependency_tests_are_not_collected() {
        let tmp = fixture();
        write(
            tmp.path(),
            "dom/src/lib.rs",
            "#[cfg(test)]\nmod tests {\n    //inkwasm:func globalThis.x\n    fn x() {}\n}\n",
        );
        let packages = parse_all(&Parser::default(), &tmp.path().join("app"));
        let dom = packages.iter().find(|p| p.package.name == "web-dom").unwrap();
        assert!(dom.functions.is_empty());
    }

    #[test]
    fn errors_name_file_and_line() {
        let tmp = fixture();
        write(tmp.path(), "app/src/ffi.rs", "\n//inkwasm:func f\nfn f(p: &&u8) {}\n");
        let mut packages = Parser::default().parse_packages(&tmp.path().join("app"));
        let message = packages.remove(0).unwrap_err().to_string();
        assert!(message.ends_with("ffi.rs:3: pointer to pointer is not supported"), "{message}");
        assert!(packages.iter().all(|p| p.is_ok()));
        assert_eq!(packages.len(), 3);
    }

    #[test]
    fn broken_dependency_does_not_hide_siblings() {
        let tmp = fixture();
        write(tmp.path(), "dom/src/lib.rs", "//inkwasm:func globalThis.x\npub struct Bad;\n");
        write(tmp.path(), "plain/Cargo.toml", "[package\n");
        let packages = Parser::default().parse_packages(&tmp.path().join("app"));
        assert_eq!(packages.len(), 4);
        assert_eq!(packages[0].as_ref().unwrap().functions.len(), 4);
        assert!(packages[1].as_ref().unwrap_err().to_string().contains("lib.rs:1:"));
        assert!(packages[2].is_err());
        assert_eq!(packages[3].as_ref().unwrap().package.name, "testing");
    }

    #[test]
    fn custom_prefix_and_single_package() {
        let tmp = fixture();
        write(tmp.path(), "plain/src/lib.rs", "//js:set .value\npub fn set_value(o: inkwasm::Object, v: f64) {}\n");
        let parser = Parser::new(ParserOptions {
            prefix: "js".into(),
            include_tests: true,
        });
        let plain = parser.parse_package(&tmp.path().join("plain")).unwrap();
        assert_eq!(plain.functions.len(), 1);
        assert_eq!(plain.functions[0].script.hint, Hint::Set);
    }
}
