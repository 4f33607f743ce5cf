//! Native artifact loading for souffle-host.
//!
//! A compiled Souffle program is a shared library. Mapping the same library
//! into a process twice is unsafe (duplicate static initialisers register the
//! same program factories twice), and there is no safe way to unload one. This
//! crate therefore keeps a process-wide record of every artifact it has loaded
//! and guarantees at most one load per distinct file.
//!
//! # Identity
//!
//! Artifacts are compared by the file they resolve to (device and inode on
//! Unix, volume and file index on Windows), not by path string, so
//! `./prog.so`, `/abs/prog.so` and a symlink to it are the same artifact.
//!
//! # Lifetime
//!
//! [`NativeLoader::global()`] is created on first use and never torn down.
//! The libraries it opens stay mapped until the process exits.

mod dylib;
mod identity;
mod registry;

pub use dylib::{DylibLoader, artifact_extension, with_artifact_extension};
pub use identity::ArtifactIdentity;
pub use registry::{LoadPrimitive, NativeLoader};

use std::path::PathBuf;

/// Error raised while resolving or loading an artifact.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// No dynamic-loading facility is known for this OS family.
    #[error("unable to determine native {0} for this platform")]
    PlatformUnsupported(&'static str),

    /// The artifact path could not be canonicalised (missing file, bad link).
    #[error("unable to resolve artifact '{}': {source}", path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The platform loader rejected the artifact.
    #[error("failed to load artifact '{}': {message}", path.display())]
    LoadFailure { path: PathBuf, message: String },
}
