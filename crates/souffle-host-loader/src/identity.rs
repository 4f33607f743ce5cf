use crate::LoadError;
use std::fmt;
use std::path::{Path, PathBuf};

/// Canonical location of a loadable artifact.
///
/// Equality is same-file equivalence: two identities are equal when their
/// paths name the same underlying file, even if the strings differ.
#[derive(Debug, Clone)]
pub struct ArtifactIdentity {
    path: PathBuf,
}

impl ArtifactIdentity {
    /// Resolve `path` (following symlinks) to its canonical form.
    pub fn resolve(path: &Path) -> Result<Self, LoadError> {
        let canonical = std::fs::canonicalize(path).map_err(|source| LoadError::Resolve {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { path: canonical })
    }

    /// Canonical path of the artifact.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether both identities name the same file on disk.
    ///
    /// A file that no longer exists only matches an identical path.
    pub fn same_file(&self, other: &ArtifactIdentity) -> bool {
        self.path == other.path || same_file::is_same_file(&self.path, &other.path).unwrap_or(false)
    }
}

impl PartialEq for ArtifactIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.same_file(other)
    }
}

impl fmt::Display for ArtifactIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
