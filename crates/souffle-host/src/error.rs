use souffle_host_loader::LoadError;
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by souffle-host.
///
/// Engine-reported data errors (`ArityMismatch`, `TypeConversion`) keep the
/// engine's wording; opaque engine failures get the operation and relation
/// prepended by [`Error::context`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unable to determine native {0} for this platform")]
    PlatformUnsupported(&'static str),

    #[error("failed to load artifact '{}': {message}", path.display())]
    LoadFailure { path: PathBuf, message: String },

    #[error("unable to locate program '{0}'; load its artifact first")]
    UnknownProgram(String),

    #[error("no relation named '{0}'")]
    UnknownRelation(String),

    #[error("compilation failed: command line '{command_line}' resulted in\n{diagnostics}")]
    Compilation {
        command_line: String,
        diagnostics: String,
    },

    #[error("Attempted to convert tuple of arity {actual} but relation {relation} has arity {expected}")]
    ArityMismatch {
        relation: String,
        expected: usize,
        actual: usize,
    },

    #[error("Type conversion for tuple element {index} of relation {relation} failed: {message}")]
    TypeConversion {
        relation: String,
        index: usize,
        message: String,
    },

    #[error("Insertion of element {index} failed: {source}")]
    Insertion {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    /// The engine broke its side of the interface contract.
    #[error("engine contract violated: {0}")]
    InvariantViolation(String),

    /// Failure reported by the engine itself, passed through verbatim.
    #[error("{0}")]
    Engine(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Prefix an opaque engine failure with the operation and relation it
    /// came from. Typed errors already carry that detail and pass unchanged.
    pub fn context(self, operation: &str, relation: &str) -> Self {
        match self {
            Error::Engine(message) => {
                Error::Engine(format!("{operation} on relation {relation} failed: {message}"))
            }
            other => other,
        }
    }

    /// The innermost error, looking through `Insertion` wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Insertion { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<LoadError> for Error {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::PlatformUnsupported(what) => Error::PlatformUnsupported(what),
            LoadError::Resolve { path, source } => Error::LoadFailure {
                path,
                message: source.to_string(),
            },
            LoadError::LoadFailure { path, message } => Error::LoadFailure { path, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_message() {
        let err = Error::ArityMismatch {
            relation: "A".into(),
            expected: 2,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Attempted to convert tuple of arity 3 but relation A has arity 2"
        );
    }

    #[test]
    fn test_context_only_touches_engine_errors() {
        let err = Error::Engine("disk full".into()).context("purge", "edge");
        assert_eq!(err.to_string(), "purge on relation edge failed: disk full");

        let err = Error::UnknownRelation("x".into()).context("purge", "edge");
        assert!(matches!(err, Error::UnknownRelation(_)));
    }

    #[test]
    fn test_root_unwraps_insertion() {
        let err = Error::Insertion {
            index: 1,
            source: Box::new(Error::TypeConversion {
                relation: "A".into(),
                index: 0,
                message: "expected number".into(),
            }),
        };
        assert!(err.to_string().starts_with("Insertion of element 1 failed: Type conversion"));
        assert!(matches!(err.root(), Error::TypeConversion { index: 0, .. }));
    }

    #[test]
    fn test_load_error_mapping() {
        let err: Error = LoadError::PlatformUnsupported("platform loader").into();
        assert!(matches!(err, Error::PlatformUnsupported("platform loader")));

        let err: Error = LoadError::LoadFailure {
            path: PathBuf::from("/x.so"),
            message: "bad ELF".into(),
        }
        .into();
        assert!(matches!(err, Error::LoadFailure { .. }));
    }
}
