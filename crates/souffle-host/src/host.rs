//! The service that loads artifacts and hands out program handles.

use crate::compile::Compiler;
use crate::config::{HostConfig, NamePolicy};
use crate::engine::{Engine, NativeEngine};
use crate::program::Program;
use crate::{Error, Result};
use souffle_host_loader::{NativeLoader, with_artifact_extension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// Program names held by live handles.
#[derive(Debug, Default)]
pub struct NameRegistry {
    live: Mutex<HashMap<String, usize>>,
}

static NAME_REGISTRY: OnceLock<Arc<NameRegistry>> = OnceLock::new();

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by [`Host::new`].
    pub fn global() -> Arc<NameRegistry> {
        NAME_REGISTRY
            .get_or_init(|| Arc::new(NameRegistry::new()))
            .clone()
    }

    /// Record one more live handle named `name`.
    ///
    /// Under [`NamePolicy::Unique`] this fails while any other handle holds
    /// the name. The claim is released when the returned guard drops.
    pub fn claim(self: &Arc<Self>, name: &str, policy: NamePolicy) -> Result<NameClaim> {
        let mut live = self.lock();
        if policy == NamePolicy::Unique && live.contains_key(name) {
            return Err(Error::InvalidArgument(format!(
                "Program with the name '{name}' is already loaded"
            )));
        }
        *live.entry(name.to_string()).or_insert(0) += 1;
        Ok(NameClaim {
            registry: Arc::clone(self),
            name: name.to_string(),
        })
    }

    /// Number of live handles holding `name`.
    pub fn holders(&self, name: &str) -> usize {
        self.lock().get(name).copied().unwrap_or(0)
    }

    fn release(&self, name: &str) {
        let mut live = self.lock();
        if let Some(holders) = live.get_mut(name) {
            *holders -= 1;
            if *holders == 0 {
                live.remove(name);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, usize>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A program name held by one handle.
#[derive(Debug)]
pub struct NameClaim {
    registry: Arc<NameRegistry>,
    name: String,
}

impl Drop for NameClaim {
    fn drop(&mut self) {
        self.registry.release(&self.name);
    }
}

/// Loads artifacts, compiles sources and creates [`Program`]s.
///
/// A `Host` bundles the artifact registry, the engine, the name registry and
/// the configuration. [`Host::new`] uses the process-wide registries and the
/// native engine; [`Host::with_parts`] accepts substitutes.
pub struct Host {
    config: HostConfig,
    loader: Arc<NativeLoader>,
    engine: Rc<dyn Engine>,
    names: Arc<NameRegistry>,
    compiler: Compiler,
}

impl Host {
    pub fn new(config: HostConfig) -> Self {
        Self::with_parts(
            config,
            NativeLoader::global(),
            Rc::new(NativeEngine::global()),
            NameRegistry::global(),
        )
    }

    pub fn with_parts(
        config: HostConfig,
        loader: Arc<NativeLoader>,
        engine: Rc<dyn Engine>,
        names: Arc<NameRegistry>,
    ) -> Self {
        let compiler = Compiler::from_config(&config.compiler);
        Self {
            config,
            loader,
            engine,
            names,
            compiler,
        }
    }

    /// Replace the compiler built from the configuration.
    pub fn with_compiler(mut self, compiler: Compiler) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn loader(&self) -> &Arc<NativeLoader> {
        &self.loader
    }

    pub fn names(&self) -> &Arc<NameRegistry> {
        &self.names
    }

    /// Attach to the compiled program `name`.
    ///
    /// Without a path the artifact is `<artifact_dir>/<name>`. A path without
    /// an extension gets the platform's shared library extension.
    pub fn attach(&self, name: &str, path: Option<&Path>) -> Result<Program> {
        let claim = self.claim(name)?;
        self.attach_claimed(name, path, claim)
    }

    fn claim(&self, name: &str) -> Result<NameClaim> {
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "Program name must be non-empty".to_string(),
            ));
        }
        self.names.claim(name, self.config.programs.name_policy())
    }

    fn attach_claimed(&self, name: &str, path: Option<&Path>, claim: NameClaim) -> Result<Program> {
        let path = match path {
            Some(path) if !path.as_os_str().is_empty() => path.to_path_buf(),
            _ => self.default_artifact(name),
        };
        let path = with_artifact_extension(&path)?;
        let identity = self.loader.ensure_loaded(&path)?;
        let engine = self.engine.create(name)?;
        tracing::debug!(program = name, artifact = %identity, "attached program");

        Ok(Program::new(
            name,
            identity.path().to_path_buf(),
            engine,
            Some(claim),
        ))
    }

    /// Compile Datalog source text and attach to the result.
    ///
    /// The source is written to `<work_dir>/<name>.dl` and compiled to
    /// `<work_dir>/<name>`. Without a work directory a temporary one is
    /// created and removed when the returned program drops.
    ///
    /// The name is claimed before the compiler runs.
    pub fn compile_str(&self, source: &str, name: &str, work_dir: Option<&Path>) -> Result<Program> {
        let claim = self.claim(name)?;
        let (work_dir, scratch) = match work_dir {
            Some(dir) if !dir.as_os_str().is_empty() => (dir.to_path_buf(), None),
            _ => {
                let scratch = tempfile::tempdir()?;
                (scratch.path().to_path_buf(), Some(scratch))
            }
        };
        if !work_dir.is_dir() {
            return Err(Error::InvalidArgument(format!(
                "Output directory '{}' is not a directory",
                work_dir.display()
            )));
        }

        let source_path = work_dir.join(format!("{name}.dl"));
        std::fs::write(&source_path, source)?;
        let output = work_dir.join(name);
        self.compiler.compile(&source_path, &output)?;
        let mut program = self.attach_claimed(name, Some(&output), claim)?;
        program.keep_scratch(scratch);
        Ok(program)
    }

    /// Compile a `.dl` file and attach to the result.
    ///
    /// `name` defaults to the file stem; `output_name` to
    /// `<artifact_dir>/<name>`.
    pub fn compile(
        &self,
        dl_file: &Path,
        name: Option<&str>,
        output_name: Option<&Path>,
    ) -> Result<Program> {
        let name = match name.filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => dl_file
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "cannot derive a program name from '{}'",
                        dl_file.display()
                    ))
                })?,
        };
        let claim = self.claim(&name)?;
        let output = match output_name {
            Some(output) if !output.as_os_str().is_empty() => output.to_path_buf(),
            _ => self.default_artifact(&name),
        };

        self.compiler.compile(dl_file, &output)?;
        self.attach_claimed(&name, Some(&output), claim)
    }

    fn default_artifact(&self, name: &str) -> PathBuf {
        self.config.programs.artifact_dir().join(name)
    }
}
