//! Generator configuration from `[package.metadata.inkwasm]`.

use std::fs;
use std::path::{Path, PathBuf};

use inkwasm_parser::{ParserOptions, DEFAULT_PREFIX};
use serde::Deserialize;

use crate::error::{GenerateError, Result};

/// Default script namespace holding `Load`, `Set`, `Internal`, `Imports`,
/// and `Exports`.
pub const DEFAULT_NAMESPACE: &str = "globalThis.inkwasm";

/// Settings read from the entry crate's manifest:
///
/// ```toml
/// [package.metadata.inkwasm]
/// prefix = "inkwasm"
/// output_dir = "src"
/// strict_targets = false
/// include_tests = true
/// namespace = "globalThis.inkwasm"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Marker prefix, as in `//<prefix>:func`.
    pub prefix: String,
    /// Artifact directory, relative to each package root.
    pub output_dir: PathBuf,
    /// Make the script artifact check at load time that every fixed target
    /// path resolves.
    pub strict_targets: bool,
    /// Generate the test artifact set of the entry package.
    pub include_tests: bool,
    /// Script expression of the runtime namespace.
    pub namespace: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            prefix: DEFAULT_PREFIX.to_string(),
            output_dir: PathBuf::from("src"),
            strict_targets: false,
            include_tests: true,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct Manifest {
    package: Option<ManifestPackage>,
}

#[derive(Deserialize)]
struct ManifestPackage {
    metadata: Option<Metadata>,
}

#[derive(Deserialize)]
struct Metadata {
    inkwasm: Option<GeneratorConfig>,
}

impl GeneratorConfig {
    /// Read the configuration of the crate in `dir`; defaults when the
    /// manifest has no `[package.metadata.inkwasm]` table.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join("Cargo.toml");
        let text = fs::read_to_string(&path).map_err(|e| GenerateError::io(&path, e))?;
        Self::from_manifest_str(&text).map_err(|source| GenerateError::Config { path, source })
    }

    fn from_manifest_str(text: &str) -> std::result::Result<Self, toml::de::Error> {
        let manifest: Manifest = toml::from_str(text)?;
        Ok(manifest
            .package
            .and_then(|p| p.metadata)
            .and_then(|m| m.inkwasm)
            .unwrap_or_default())
    }

    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            prefix: self.prefix.clone(),
            include_tests: self.include_tests,
        }
    }
}
