//! Souffle compiler invocation.

use crate::config::CompilerConfig;
use crate::{Error, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Runs the Souffle compiler to turn a `.dl` file into a loadable artifact.
#[derive(Debug, Clone)]
pub struct Compiler {
    program: PathBuf,
    format: String,
    flags: Vec<String>,
}

impl Compiler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            format: crate::config::DEFAULT_FORMAT.to_string(),
            flags: Vec::new(),
        }
    }

    pub fn from_config(config: &CompilerConfig) -> Self {
        Self {
            program: PathBuf::from(config.program()),
            format: config.format().to_string(),
            flags: config.flags().to_vec(),
        }
    }

    /// Output-format selector passed with `-s`.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Extra flags placed before the source path, e.g. `-w`.
    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.extend(flags.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn arguments(&self, source: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-s".into(),
            self.format.clone().into(),
            "--dl-program".into(),
            output.as_os_str().to_owned(),
        ];
        args.extend(self.flags.iter().map(OsString::from));
        args.push(source.as_os_str().to_owned());
        args
    }

    fn command_line(executable: &Path, args: &[OsString]) -> String {
        std::iter::once(executable.as_os_str())
            .chain(args.iter().map(OsString::as_os_str))
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Compile `source` into the artifact `output` (the compiler adds the
    /// platform extension).
    ///
    /// Fails when the compiler exits non-zero or writes anything to stderr.
    pub fn compile(&self, source: &Path, output: &Path) -> Result<()> {
        let args = self.arguments(source, output);
        let executable = which::which(&self.program).map_err(|e| Error::Compilation {
            command_line: Self::command_line(&self.program, &args),
            diagnostics: format!("compiler not found: {e}"),
        })?;
        let command_line = Self::command_line(&executable, &args);
        tracing::debug!(%command_line, "compiling program");

        let output = match Command::new(&executable).args(&args).output() {
            Ok(output) => output,
            Err(e) => {
                return Err(Error::Compilation {
                    command_line,
                    diagnostics: format!("failed to start compiler: {e}"),
                });
            }
        };
        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.success() && stderr.is_empty() {
            return Ok(());
        }

        let diagnostics = if stderr.is_empty() {
            format!("compiler exited with {}", output.status)
        } else {
            stderr.into_owned()
        };
        Err(Error::Compilation {
            command_line,
            diagnostics,
        })
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::from_config(&CompilerConfig::default())
    }
}
