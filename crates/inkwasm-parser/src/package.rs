//! Cargo manifest loading and module file resolution.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use inkwasm_bind::Package;
use serde::Deserialize;

use crate::error::{ParseError, Result};
use crate::source::ModuleDecl;

/// The subset of `Cargo.toml` needed to walk a package graph.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct Manifest {
    #[serde(default)]
    pub package: Option<PackageSection>,
    #[serde(default)]
    pub lib: Option<LibSection>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencySpec>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, DependencySpec>,
    /// `[target.'cfg(..)'.dependencies]` tables, keyed by the cfg string.
    #[serde(default)]
    pub target: BTreeMap<String, TargetSection>,
    #[serde(default)]
    pub workspace: Option<WorkspaceSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PackageSection {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct LibSection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct TargetSection {
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencySpec>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, DependencySpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct WorkspaceSection {
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencySpec>,
}

/// A dependency specification.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum DependencySpec {
    /// Registry version requirement.
    Version(String),
    /// Table form with an optional local source.
    Detailed {
        #[serde(default)]
        path: Option<String>,
        #[serde(default)]
        workspace: Option<bool>,
    },
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| ParseError::io(path, err))?;
        toml::from_str(&text).map_err(|source| ParseError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// A loaded Cargo package ready to be walked.
#[derive(Debug, Clone)]
pub(crate) struct CratePackage {
    pub package: Package,
    pub manifest_path: PathBuf,
    /// Library and binary crate roots that exist on disk.
    pub roots: Vec<PathBuf>,
    /// Integration test crate roots under `tests/`.
    pub test_roots: Vec<PathBuf>,
    manifest: Manifest,
}

impl CratePackage {
    /// Load the package whose `Cargo.toml` lives in `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let manifest_path = dir.join("Cargo.toml");
        let manifest = Manifest::load(&manifest_path)?;
        let Some(section) = &manifest.package else {
            return Err(ParseError::NoPackage {
                path: dir.to_path_buf(),
            });
        };

        let lib_name = manifest.lib.as_ref().and_then(|lib| lib.name.clone());
        let crate_path = lib_name.unwrap_or_else(|| section.name.replace('-', "_"));

        let lib_root = match manifest.lib.as_ref().and_then(|lib| lib.path.as_ref()) {
            Some(path) => dir.join(path),
            None => dir.join("src").join("lib.rs"),
        };
        let roots: Vec<PathBuf> = [lib_root, dir.join("src").join("main.rs")]
            .into_iter()
            .filter(|root| root.is_file())
            .collect();
        if roots.is_empty() {
            return Err(ParseError::NoCrateRoot {
                name: section.name.clone(),
            });
        }

        Ok(CratePackage {
            package: Package {
                name: section.name.clone(),
                dir: dir.to_path_buf(),
                path: crate_path,
            },
            manifest_path,
            roots,
            test_roots: test_roots(dir)?,
            manifest,
        })
    }

    /// Directories of local dependencies, dev-dependencies included on request.
    pub fn dependency_dirs(&self, include_dev: bool) -> Result<Vec<PathBuf>> {
        let mut specs: Vec<(&String, &DependencySpec)> = self.manifest.dependencies.iter().collect();
        for target in self.manifest.target.values() {
            specs.extend(target.dependencies.iter());
        }
        if include_dev {
            specs.extend(self.manifest.dev_dependencies.iter());
            for target in self.manifest.target.values() {
                specs.extend(target.dev_dependencies.iter());
            }
        }

        let mut workspace: Option<(PathBuf, Manifest)> = None;
        let mut dirs = Vec::new();
        for (name, spec) in specs {
            match spec {
                DependencySpec::Detailed { path: Some(path), .. } => dirs.push(self.package.dir.join(path)),
                DependencySpec::Detailed {
                    workspace: Some(true), ..
                } => {
                    if workspace.is_none() {
                        workspace = find_workspace(&self.package.dir)?;
                    }
                    let inherited = workspace
                        .as_ref()
                        .and_then(|(root, manifest)| {
                            let ws = manifest.workspace.as_ref()?;
                            Some((root, ws.dependencies.get(name)?))
                        })
                        .ok_or_else(|| ParseError::UnresolvedWorkspaceDependency {
                            name: name.clone(),
                            manifest: self.manifest_path.clone(),
                        })?;
                    match inherited {
                        (root, DependencySpec::Detailed { path: Some(path), .. }) => dirs.push(root.join(path)),
                        _ => tracing::trace!(dependency = %name, "skipping non-local workspace dependency"),
                    }
                }
                _ => tracing::trace!(dependency = %name, "skipping registry dependency"),
            }
        }
        Ok(dirs)
    }
}

fn test_roots(dir: &Path) -> Result<Vec<PathBuf>> {
    let tests = dir.join("tests");
    if !tests.is_dir() {
        return Ok(Vec::new());
    }
    let mut roots = Vec::new();
    for entry in fs::read_dir(&tests).map_err(|err| ParseError::io(&tests, err))? {
        let path = entry.map_err(|err| ParseError::io(&tests, err))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "rs") {
            roots.push(path);
        }
    }
    roots.sort();
    Ok(roots)
}

/// The nearest ancestor manifest declaring `[workspace]`.
fn find_workspace(dir: &Path) -> Result<Option<(PathBuf, Manifest)>> {
    for ancestor in dir.ancestors() {
        let candidate = ancestor.join("Cargo.toml");
        if !candidate.is_file() {
            continue;
        }
        let manifest = Manifest::load(&candidate)?;
        if manifest.workspace.is_some() {
            return Ok(Some((ancestor.to_path_buf(), manifest)));
        }
    }
    Ok(None)
}

/// How a source file's child modules are located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ModuleStyle {
    /// Crate roots, `mod.rs`, and `#[path]` files: children live beside the file.
    OwnsDirectory,
    /// `name.rs`: children live in `name/`.
    Named,
}

/// Locate the file backing an out-of-line module declaration.
pub(crate) fn module_file(parent: &Path, style: ModuleStyle, decl: &ModuleDecl) -> Option<(PathBuf, ModuleStyle)> {
    let parent_dir = parent.parent().unwrap_or_else(|| Path::new(""));
    let mut base = match style {
        ModuleStyle::OwnsDirectory => parent_dir.to_path_buf(),
        ModuleStyle::Named => parent_dir.join(parent.file_stem()?),
    };

    if let Some(path) = &decl.path_attr {
        let dir = if decl.nesting.is_empty() {
            parent_dir.to_path_buf()
        } else {
            decl.nesting.iter().fold(base, |dir, name| dir.join(name))
        };
        let file = dir.join(path);
        return file.is_file().then_some((file, ModuleStyle::OwnsDirectory));
    }

    for name in &decl.nesting {
        base.push(name);
    }
    let flat = base.join(format!("{}.rs", decl.name));
    if flat.is_file() {
        return Some((flat, ModuleStyle::Named));
    }
    let nested = base.join(&decl.name).join("mod.rs");
    nested.is_file().then_some((nested, ModuleStyle::OwnsDirectory))
}
