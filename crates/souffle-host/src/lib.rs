//! Host front end for compiled Souffle programs.
//!
//! A compiled Souffle program is a shared library. This crate maps each
//! artifact into the process once, creates program instances from it, and
//! exposes their relations as typed collections of tuples.
//!
//! # Architecture
//!
//! ```text
//! Host -> NativeLoader (load once) -> Engine::create -> Program -> RelationView -> TypeCodec
//! ```
//!
//! [`Host`] ties the artifact registry, an [`Engine`](engine::Engine), the
//! program-name registry and the configuration together. Programs and
//! relation views talk to the engine only through the traits in [`engine`],
//! implemented by [`NativeEngine`](engine::NativeEngine) for compiled
//! artifacts and [`MemoryEngine`](engine::MemoryEngine) for programs written
//! in Rust.
//!
//! # Example
//!
//! ```no_run
//! use souffle_host::{Host, HostConfig};
//!
//! # fn main() -> souffle_host::Result<()> {
//! let host = Host::new(HostConfig::load(std::path::Path::new("."))?);
//! let program = host.attach("simple_program", None)?;
//! program.run()?;
//! for tuple in program.relation("C")?.tuples()? {
//!     println!("{tuple}");
//! }
//! # Ok(())
//! # }
//! ```

mod codec;
mod compile;
mod config;
pub mod engine;
mod error;
mod host;
mod program;
mod relation;
mod tuple;
mod value;

pub use codec::{AttrType, TypeCodec};
pub use compile::Compiler;
pub use config::{CompilerConfig, HostConfig, NamePolicy, ProgramsConfig};
pub use error::{Error, Result};
pub use host::{Host, NameClaim, NameRegistry};
pub use program::{Program, RelationMap};
pub use relation::{RelationView, Rows};
pub use tuple::{NamedTuple, Provenance, RelationTuple, Row, TupleInput, TupleShape};
pub use value::{AttrKind, Value, conform_tuple};

pub use souffle_host_loader::{
    ArtifactIdentity, DylibLoader, LoadError, LoadPrimitive, NativeLoader, artifact_extension,
};
