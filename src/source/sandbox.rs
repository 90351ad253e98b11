//! Restricts file access to the configured resource directories

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Allowed directories. Empty means unrestricted.
#[derive(Debug, Clone, Default)]
pub struct PathSandbox {
    dirs: Vec<String>,
}

impl PathSandbox {
    pub fn new(dirs: Vec<String>) -> Self {
        Self { dirs }
    }

    pub fn is_restricted(&self) -> bool {
        !self.dirs.is_empty()
    }

    fn contains(&self, canonical: &Path) -> bool {
        self.dirs.iter().any(|dir| {
            std::fs::canonicalize(dir)
                .map(|canonical_dir| canonical.starts_with(canonical_dir))
                .unwrap_or(false)
        })
    }

    /// Check that an existing path lies within an allowed directory
    pub fn check_read(&self, path: &str) -> Result<PathBuf> {
        if !self.is_restricted() {
            return Ok(PathBuf::from(path));
        }

        let canonical = std::fs::canonicalize(path).map_err(|_| Error::PathAccessDenied {
            path: path.to_string(),
        })?;

        if self.contains(&canonical) {
            Ok(canonical)
        } else {
            Err(Error::PathAccessDenied {
                path: path.to_string(),
            })
        }
    }

    /// Check a path that may not exist yet by canonicalizing its parent
    pub fn check_write(&self, path: &str) -> Result<PathBuf> {
        if !self.is_restricted() {
            return Ok(PathBuf::from(path));
        }

        let path_obj = Path::new(path);
        let parent = match path_obj.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let canonical_parent =
            std::fs::canonicalize(parent).map_err(|_| Error::PathAccessDenied {
                path: path.to_string(),
            })?;
        let file_name = path_obj.file_name().ok_or_else(|| Error::PathAccessDenied {
            path: path.to_string(),
        })?;
        let canonical_target = canonical_parent.join(file_name);

        if self.contains(&canonical_target) {
            Ok(canonical_target)
        } else {
            Err(Error::PathAccessDenied {
                path: path.to_string(),
            })
        }
    }
}
