//! Binding generator for inkwasm declarations.
//!
//! Given the entry crate of a wasm32 program, discovers every annotated
//! declaration in it and its path dependencies, and writes three artifacts
//! per package and declaration set:
//!
//! - `inkwasm_js.js`: script trampolines and export decoders
//! - `inkwasm_stub.rs`: the raw wasm imports and frame sizes
//! - `inkwasm_bind.rs`: safe forwarding functions over the imports
//!
//! The host crate includes the forwarding module next to its declarations:
//!
//! ```ignore
//! mod inkwasm_bind;
//! pub use inkwasm_bind::*;
//! ```
//!
//! ## Modules
//!
//! - [`config`]: `[package.metadata.inkwasm]` settings
//! - [`plan`]: Frame layout shared by all emitters
//! - [`emit`]: Artifact rendering
//! - [`writer`]: Atomic writes and stale-file removal

pub mod config;
pub mod emit;
pub mod error;
pub mod plan;
pub mod writer;

use std::path::{Path, PathBuf};
use std::thread;

use inkwasm_bind::{DeclarationSet, Package, PackageBindings};
use inkwasm_parser::Parser;

pub use config::GeneratorConfig;
pub use emit::Rendered;
pub use error::{GenerateError, Location, Result};
pub use writer::{FileChange, Outcome};

/// Summary of one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// Packages generated, entry first.
    pub packages: Vec<String>,
    /// Annotated declarations across all packages and sets.
    pub declarations: usize,
    pub changes: Vec<FileChange>,
}

impl Report {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.changes.iter().filter(|c| c.outcome == outcome).count()
    }
}

/// Drives discovery, planning, rendering, and writing.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    config: GeneratorConfig,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Self {
        Generator { config }
    }

    /// A generator configured from the entry crate's manifest.
    pub fn for_crate(entry_dir: &Path) -> Result<Self> {
        Ok(Generator::new(GeneratorConfig::load(entry_dir)?))
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Directory receiving a package's artifacts.
    pub fn output_dir(&self, package: &Package) -> PathBuf {
        package.dir.join(&self.config.output_dir)
    }

    /// Render the release and test files of one package. Nothing is written;
    /// an error in either set fails the whole package.
    pub fn render(&self, bindings: &PackageBindings) -> Result<Vec<Rendered>> {
        let mut files = Vec::with_capacity(6);
        for set in [DeclarationSet::Release, DeclarationSet::Test] {
            let plan = plan::plan_set(bindings, set)?;
            files.extend(emit::render(&plan, &self.config));
        }
        Ok(files)
    }

    /// Render and write one package.
    pub fn generate_package(&self, bindings: &PackageBindings) -> Result<Vec<FileChange>> {
        let files = self.render(bindings)?;
        writer::apply(&self.output_dir(&bindings.package), &files)
    }

    /// Generate artifacts for the entry crate in `entry_dir` and all of its
    /// path dependencies.
    ///
    /// Packages are generated in parallel, one task per package that parsed.
    /// A package that fails to parse or generate leaves its own files alone
    /// but does not stop its siblings. Every task runs to completion; the
    /// first failure in package order is returned afterwards.
    pub fn generate(&self, entry_dir: &Path) -> Result<Report> {
        let parsed = Parser::new(self.config.parser_options()).parse_packages(entry_dir);

        let results: Vec<Result<(PackageBindings, Vec<FileChange>)>> = thread::scope(|scope| {
            let tasks: Vec<_> = parsed
                .into_iter()
                .map(|parsed| {
                    parsed.map(|bindings| {
                        tracing::debug!(
                            package = %bindings.package.name,
                            dir = %bindings.package.dir.display(),
                            declarations = bindings.functions.len(),
                            "discovered package"
                        );
                        let name = bindings.package.name.clone();
                        let handle = scope.spawn(move || {
                            let changes = self.generate_package(&bindings);
                            (bindings, changes)
                        });
                        (name, handle)
                    })
                })
                .collect();
            tasks
                .into_iter()
                .map(|task| -> Result<(PackageBindings, Vec<FileChange>)> {
                    let (name, handle) = task?;
                    let (bindings, changes) = handle
                        .join()
                        .map_err(|_| GenerateError::Panicked { package: name })?;
                    Ok((bindings, changes?))
                })
                .collect()
        });

        let mut report = Report::default();
        let mut first_error = None;
        for result in results {
            match result {
                Ok((bindings, changes)) => {
                    report.packages.push(bindings.package.name);
                    report.declarations += bindings.functions.len();
                    report.changes.extend(changes);
                }
                Err(err) => {
                    tracing::error!(%err, "package generation failed");
                    first_error.get_or_insert(err);
                }
            }
        }
        tracing::info!(
            packages = report.packages.len(),
            written = report.count(Outcome::Written),
            removed = report.count(Outcome::Removed),
            failed = first_error.is_some(),
            "generation finished"
        );
        match first_error {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwasm_bind::{Argument, Function, Hint, HostSignature, ScriptTarget};

    fn bindings(dir: &Path, functions: Vec<Function>) -> PackageBindings {
        PackageBindings {
            package: Package {
                name: "app".into(),
                dir: dir.to_path_buf(),
                path: "app".into(),
            },
            functions,
        }
    }

    fn log(is_test: bool) -> Function {
        Function {
            file: PathBuf::from("src/lib.rs"),
            line: 2,
            is_test,
            host: HostSignature {
                name: "log".into(),
                arguments: vec![Argument::named("m", "str")],
                results: vec![],
            },
            script: ScriptTarget {
                path: "console.log".into(),
                hint: Hint::Func,
            },
        }
    }

    #[test]
    fn empty_sets_render_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let files = Generator::default().render(&bindings(tmp.path(), vec![log(false)])).unwrap();
        assert_eq!(files.len(), 6);
        assert!(files[..3].iter().all(|f| f.text.is_some()));
        assert!(files[3..].iter().all(|f| f.text.is_none()));
    }

    #[test]
    fn failing_set_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut bad = log(true);
        bad.host.results = vec![Argument::named("_", "str")];
        let err = Generator::default()
            .generate_package(&bindings(tmp.path(), vec![log(false), bad]))
            .unwrap_err();
        assert!(matches!(err, GenerateError::UnsupportedType { .. }), "{err}");
        assert!(!tmp.path().join("src").exists());
    }

    #[test]
    fn output_dir_is_relative_to_package() {
        let generator = Generator::new(GeneratorConfig {
            output_dir: PathBuf::from("gen"),
            ..GeneratorConfig::default()
        });
        let tmp = tempfile::tempdir().unwrap();
        let changes = generator.generate_package(&bindings(tmp.path(), vec![log(false)])).unwrap();
        assert_eq!(changes.len(), 3);
        assert!(tmp.path().join("gen/inkwasm_bind.rs").exists());
    }
}
