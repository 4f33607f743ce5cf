//! Capability interface between program handles and an evaluation engine.
//!
//! A [`Program`](crate::Program) and its [`RelationView`](crate::RelationView)s
//! never touch engine storage directly. They go through these traits, which
//! have two implementations: [`NativeEngine`] over compiled artifacts and
//! [`MemoryEngine`] over programs described in Rust.
//!
//! Engine objects are not reentrant. Handles are `Rc`-based and stay on the
//! thread that created them.

mod memory;
mod native;

pub use memory::{MemoryEngine, ProgramSpec, RelationSpec, Rule};
pub use native::NativeEngine;

use crate::{Result, Value};
use std::path::Path;
use std::rc::Rc;

/// Which relations of a program an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Input,
    Output,
    Internal,
    All,
}

/// A relation exactly as the engine reports it: full-arity tuples, raw
/// metadata, no provenance splitting.
pub trait EngineRelation {
    fn name(&self) -> String;

    /// Primary plus auxiliary arity.
    fn arity(&self) -> usize {
        self.primary_arity() + self.auxiliary_arity()
    }

    fn primary_arity(&self) -> usize;

    fn auxiliary_arity(&self) -> usize;

    /// Names of every attribute, provenance columns included.
    fn attr_names(&self) -> Vec<String>;

    /// `short:long` signature of every attribute.
    fn attr_types(&self) -> Vec<String>;

    fn len(&self) -> Result<usize>;

    /// Membership test on a primary-arity tuple.
    fn contains(&self, tuple: Vec<Value>) -> Result<bool>;

    /// Insert primary-arity tuples. The engine fills any provenance columns.
    fn insert(&self, tuples: Vec<Vec<Value>>) -> Result<()>;

    fn purge(&self) -> Result<()>;

    /// Tuples present when the call is made, yielded lazily. With
    /// `data_only` the auxiliary columns are dropped. Decoding failures are
    /// reported per row.
    fn scan(&self, data_only: bool) -> Result<Box<dyn Iterator<Item = Result<Vec<Value>>>>>;
}

/// One live instance of a program inside an engine.
pub trait EngineProgram {
    fn run(&self) -> Result<()>;

    /// Load input facts, run, print outputs. `None` selects the engine's
    /// default directory.
    fn run_all(&self, input_dir: Option<&Path>, output_dir: Option<&Path>) -> Result<()>;

    fn load_all(&self, input_dir: Option<&Path>) -> Result<()>;

    fn print_all(&self, output_dir: Option<&Path>) -> Result<()>;

    fn num_threads(&self) -> usize;

    fn set_num_threads(&self, threads: usize);

    /// Relations of `category`, in the engine's enumeration order.
    fn relations(&self, category: Category) -> Result<Vec<Rc<dyn EngineRelation>>>;

    /// Delete every tuple of every relation in `category`.
    fn purge(&self, category: Category) -> Result<()>;
}

/// Factory for program instances.
pub trait Engine {
    /// Instantiate the program registered as `name`.
    fn create(&self, name: &str) -> Result<Rc<dyn EngineProgram>>;
}
