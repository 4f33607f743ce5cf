//! Configuration for souffle-host.
//!
//! Loads config from, in increasing precedence:
//! 1. Global: `$XDG_CONFIG_HOME/souffle-host/config.toml` (or the platform
//!    config directory)
//! 2. Per-project: `.souffle-host/config.toml`
//! 3. Environment: `SOUFFLE_HOST_COMPILER` overrides `compiler.program`
//!
//! Example config.toml:
//! ```toml
//! [compiler]
//! program = "/opt/souffle/bin/souffle"
//! flags = ["-w"]
//!
//! [programs]
//! name_policy = "shared"
//! artifact_dir = "build/datalog"
//! ```

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_COMPILER: &str = "souffle";
/// Generator selected with `-s` unless configured.
///
/// Stock Souffle has no `native` generator. The compiler must be a Souffle
/// build or wrapper that understands the configured format and links the
/// entry table from `souffle-host-abi` into the artifact, so that it exports
/// `souffle_host_engine`. Otherwise attaching the result fails with
/// `UnknownProgram`.
pub const DEFAULT_FORMAT: &str = "native";
pub const COMPILER_ENV: &str = "SOUFFLE_HOST_COMPILER";

/// Compiler settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Compiler executable name or path.
    pub program: Option<String>,
    /// Output-format selector passed with `-s`. It must name a generator
    /// whose artifacts export the `souffle_host_engine` entry table.
    pub format: Option<String>,
    /// Extra flags for every compilation.
    pub flags: Option<Vec<String>>,
}

impl CompilerConfig {
    pub fn program(&self) -> &str {
        self.program.as_deref().unwrap_or(DEFAULT_COMPILER)
    }

    pub fn format(&self) -> &str {
        self.format.as_deref().unwrap_or(DEFAULT_FORMAT)
    }

    pub fn flags(&self) -> &[String] {
        self.flags.as_deref().unwrap_or(&[])
    }
}

/// Whether two live program handles may share a name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamePolicy {
    /// A name is held by at most one live handle.
    #[default]
    Unique,
    /// Any number of handles may use the same name.
    Shared,
}

/// Program handle settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProgramsConfig {
    pub name_policy: Option<NamePolicy>,
    /// Where artifacts are looked up (and compiled to) when no path is given.
    pub artifact_dir: Option<PathBuf>,
}

impl ProgramsConfig {
    pub fn name_policy(&self) -> NamePolicy {
        self.name_policy.unwrap_or_default()
    }

    pub fn artifact_dir(&self) -> &Path {
        self.artifact_dir.as_deref().unwrap_or(Path::new("."))
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub compiler: CompilerConfig,
    pub programs: ProgramsConfig,
}

impl HostConfig {
    /// Load configuration for a project rooted at `root`.
    pub fn load(root: &Path) -> Result<Self> {
        Self::load_layers(
            Self::global_config_path().as_deref(),
            root,
            std::env::var(COMPILER_ENV).ok(),
        )
    }

    /// Merge the global file, the project file and the compiler override.
    pub fn load_layers(
        global: Option<&Path>,
        root: &Path,
        compiler_override: Option<String>,
    ) -> Result<Self> {
        let mut config = Self::default();

        if let Some(global) = global {
            if let Some(layer) = Self::load_file(global)? {
                config = config.merge(layer);
            }
        }

        let project = root.join(".souffle-host").join("config.toml");
        if let Some(layer) = Self::load_file(&project)? {
            config = config.merge(layer);
        }

        if let Some(program) = compiler_override.filter(|p| !p.is_empty()) {
            config.compiler.program = Some(program);
        }

        Ok(config)
    }

    /// Global config path, if a config directory can be determined.
    pub fn global_config_path() -> Option<PathBuf> {
        let config_home = std::env::var("XDG_CONFIG_HOME")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(dirs::config_dir)?;
        Some(config_home.join("souffle-host").join("config.toml"))
    }

    /// Parse one config file. A missing or unreadable file is skipped; a
    /// malformed one is an error.
    pub fn load_file(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable config file");
                return Ok(None);
            }
        };
        Self::from_toml(&content)
            .map(Some)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Fields set in `other` override those in `self`.
    pub fn merge(self, other: Self) -> Self {
        Self {
            compiler: CompilerConfig {
                program: other.compiler.program.or(self.compiler.program),
                format: other.compiler.format.or(self.compiler.format),
                flags: other.compiler.flags.or(self.compiler.flags),
            },
            programs: ProgramsConfig {
                name_policy: other.programs.name_policy.or(self.programs.name_policy),
                artifact_dir: other.programs.artifact_dir.or(self.programs.artifact_dir),
            },
        }
    }
}
