//! Artifact writing: atomic replacement, unchanged-file skipping, and
//! stale-file removal.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::emit::Rendered;
use crate::error::{GenerateError, Result};

/// What happened to one artifact file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Written,
    Unchanged,
    /// The set became empty and the stale file was deleted.
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub outcome: Outcome,
}

/// Bring the files in `dir` in line with `rendered`.
pub fn apply(dir: &Path, rendered: &[Rendered]) -> Result<Vec<FileChange>> {
    let mut changes = Vec::new();
    for file in rendered {
        let path = dir.join(file.name);
        let outcome = match &file.text {
            Some(text) => {
                if fs::read_to_string(&path).is_ok_and(|current| current == *text) {
                    tracing::debug!(path = %path.display(), "unchanged");
                    Outcome::Unchanged
                } else {
                    write_atomic(&path, text.as_bytes())?;
                    tracing::info!(path = %path.display(), bytes = text.len(), "wrote");
                    Outcome::Written
                }
            }
            None if path.exists() => {
                fs::remove_file(&path).map_err(|e| GenerateError::io(&path, e))?;
                tracing::warn!(path = %path.display(), "removed stale generated file");
                Outcome::Removed
            }
            None => continue,
        };
        changes.push(FileChange { path, outcome });
    }
    Ok(changes)
}

/// Write through a temporary file in the target directory, then rename.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| GenerateError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| GenerateError::io(dir, e))?;
    tmp.write_all(contents).map_err(|e| GenerateError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| GenerateError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(name: &'static str, text: Option<&str>) -> Rendered {
        Rendered {
            name,
            text: text.map(str::to_string),
        }
    }

    #[test]
    fn writes_skips_and_removes() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("src");

        let changes = apply(&dir, &[rendered("a.rs", Some("one")), rendered("b.rs", None)]).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].outcome, Outcome::Written);
        assert_eq!(fs::read_to_string(dir.join("a.rs")).unwrap(), "one");

        let changes = apply(&dir, &[rendered("a.rs", Some("one"))]).unwrap();
        assert_eq!(changes[0].outcome, Outcome::Unchanged);

        let changes = apply(&dir, &[rendered("a.rs", Some("two"))]).unwrap();
        assert_eq!(changes[0].outcome, Outcome::Written);
        assert_eq!(fs::read_to_string(dir.join("a.rs")).unwrap(), "two");

        let changes = apply(&dir, &[rendered("a.rs", None)]).unwrap();
        assert_eq!(changes[0].outcome, Outcome::Removed);
        assert!(!dir.join("a.rs").exists());
    }

    #[test]
    fn leaves_no_temporaries_behind() {
        let tmp = tempfile::tempdir().unwrap();
        apply(tmp.path(), &[rendered("x.js", Some("x")), rendered("y.js", Some("y"))]).unwrap();
        let mut names: Vec<String> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["x.js", "y.js"]);
    }
}
