//! Process-wide artifact registry.

use crate::{ArtifactIdentity, DylibLoader, LoadError};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// The operation that maps an artifact into the process.
///
/// [`DylibLoader`] is the real implementation; tests substitute a counter.
pub trait LoadPrimitive: Send + Sync {
    fn load(&self, identity: &ArtifactIdentity) -> Result<(), LoadError>;
}

/// Registry of artifacts mapped into this process.
///
/// Entries are never removed. Check, load and record happen under one lock,
/// so racing callers for the same artifact load it exactly once.
pub struct NativeLoader {
    primitive: Arc<dyn LoadPrimitive>,
    loaded: Mutex<Vec<ArtifactIdentity>>,
}

/// Global registry singleton, backed by [`DylibLoader::global()`].
static NATIVE_LOADER: OnceLock<Arc<NativeLoader>> = OnceLock::new();

impl NativeLoader {
    /// Create an isolated registry over `primitive`.
    pub fn new(primitive: Arc<dyn LoadPrimitive>) -> Self {
        Self {
            primitive,
            loaded: Mutex::new(Vec::new()),
        }
    }

    /// Get the process-wide registry.
    ///
    /// Initialised on first call; it outlives every program handle.
    pub fn global() -> Arc<NativeLoader> {
        NATIVE_LOADER
            .get_or_init(|| {
                let primitive: Arc<dyn LoadPrimitive> = DylibLoader::global();
                Arc::new(NativeLoader::new(primitive))
            })
            .clone()
    }

    /// Make sure the artifact at `path` is mapped into the process.
    ///
    /// Loads it if no registered artifact is the same file; otherwise does
    /// nothing. Returns the canonical identity of `path`. Nothing is recorded
    /// when resolution or loading fails.
    pub fn ensure_loaded(&self, path: &Path) -> Result<ArtifactIdentity, LoadError> {
        let identity = ArtifactIdentity::resolve(path)?;

        let mut loaded = self.lock();
        if loaded.iter().any(|known| known.same_file(&identity)) {
            tracing::debug!(artifact = %identity, "artifact already loaded");
            return Ok(identity);
        }

        self.primitive.load(&identity)?;
        tracing::debug!(artifact = %identity, "loaded artifact");
        loaded.push(identity.clone());
        Ok(identity)
    }

    /// Whether `path` resolves to an artifact this registry has loaded.
    pub fn is_loaded(&self, path: &Path) -> bool {
        let Ok(identity) = ArtifactIdentity::resolve(path) else {
            return false;
        };
        self.lock().iter().any(|known| known.same_file(&identity))
    }

    /// Identities loaded so far, in load order.
    pub fn loaded(&self) -> Vec<ArtifactIdentity> {
        self.lock().clone()
    }

    // The list is append-only, so a panic elsewhere cannot leave it torn.
    fn lock(&self) -> MutexGuard<'_, Vec<ArtifactIdentity>> {
        self.loaded.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
