//! Shared-library load primitive.
//!
//! # Lifetime Requirements
//!
//! Program and relation pointers handed out by an artifact point into the
//! library's memory. A `DylibLoader` keeps every library it opened for its own
//! lifetime, and callers that resolve symbols keep an `Arc<Library>` next to
//! anything derived from it. The global loader is never dropped.

use crate::{ArtifactIdentity, LoadError, LoadPrimitive};
use libloading::Library;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Opens artifacts with the platform dynamic loader and keeps them open.
pub struct DylibLoader {
    libraries: Mutex<Vec<Arc<Library>>>,
}

static DYLIB_LOADER: OnceLock<Arc<DylibLoader>> = OnceLock::new();

impl DylibLoader {
    pub fn new() -> Self {
        Self {
            libraries: Mutex::new(Vec::new()),
        }
    }

    /// Loader used by [`crate::NativeLoader::global()`].
    pub fn global() -> Arc<DylibLoader> {
        DYLIB_LOADER
            .get_or_init(|| Arc::new(DylibLoader::new()))
            .clone()
    }

    /// Libraries opened so far, in load order.
    pub fn libraries(&self) -> Vec<Arc<Library>> {
        self.libraries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for DylibLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadPrimitive for DylibLoader {
    #[cfg(any(unix, windows))]
    fn load(&self, identity: &ArtifactIdentity) -> Result<(), LoadError> {
        // SAFETY: Loading a shared library runs its initialisers. Artifacts are
        // produced by the Souffle compiler for this host; the registry in
        // `NativeLoader` guarantees each file is opened once.
        let library = unsafe { Library::new(identity.path()) }.map_err(|e| {
            LoadError::LoadFailure {
                path: identity.path().to_path_buf(),
                message: e.to_string(),
            }
        })?;

        self.libraries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(library));
        Ok(())
    }

    #[cfg(not(any(unix, windows)))]
    fn load(&self, _identity: &ArtifactIdentity) -> Result<(), LoadError> {
        Err(LoadError::PlatformUnsupported("platform loader"))
    }
}

/// Shared library extension for the current platform, without the dot.
pub fn artifact_extension() -> Result<&'static str, LoadError> {
    if cfg!(target_vendor = "apple") {
        Ok("dylib")
    } else if cfg!(windows) {
        Ok("dll")
    } else if cfg!(unix) {
        Ok("so")
    } else {
        Err(LoadError::PlatformUnsupported("platform extension"))
    }
}

/// Append the platform extension when `path` has none.
pub fn with_artifact_extension(path: &Path) -> Result<PathBuf, LoadError> {
    if path.extension().is_some() {
        return Ok(path.to_path_buf());
    }
    Ok(path.with_extension(artifact_extension()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_extension() {
        let ext = artifact_extension().unwrap();
        if cfg!(target_os = "macos") {
            assert_eq!(ext, "dylib");
        } else if cfg!(windows) {
            assert_eq!(ext, "dll");
        } else {
            assert_eq!(ext, "so");
        }
    }

    #[test]
    fn test_extension_only_added_when_missing() {
        let ext = artifact_extension().unwrap();
        assert_eq!(
            with_artifact_extension(Path::new("simple_program")).unwrap(),
            PathBuf::from(format!("simple_program.{ext}"))
        );
        assert_eq!(
            with_artifact_extension(Path::new("/tmp/build/prog")).unwrap(),
            PathBuf::from(format!("/tmp/build/prog.{ext}"))
        );
        assert_eq!(
            with_artifact_extension(Path::new("prog.bundle")).unwrap(),
            PathBuf::from("prog.bundle")
        );
    }

    #[test]
    fn test_garbage_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("garbage.so");
        std::fs::write(&artifact, b"definitely not a shared library").unwrap();

        let loader = DylibLoader::new();
        let identity = ArtifactIdentity::resolve(&artifact).unwrap();
        let err = loader.load(&identity).unwrap_err();
        assert!(matches!(err, LoadError::LoadFailure { .. }));
        assert!(loader.libraries().is_empty());
    }
}
