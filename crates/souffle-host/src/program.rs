//! Handles onto loaded programs.

use crate::engine::{Category, EngineProgram};
use crate::host::NameClaim;
use crate::relation::RelationView;
use crate::{Error, Result};
use indexmap::IndexMap;
use std::cell::OnceCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

/// Relation views by name, in the engine's enumeration order.
pub type RelationMap = IndexMap<String, RelationView>;

/// One logical instance of a loaded program.
///
/// Relation maps are built on first access and kept until [`Program::refresh`];
/// relation contents are always read live. A `Program` must stay on the
/// thread that created it.
pub struct Program {
    name: String,
    path: PathBuf,
    engine: Rc<dyn EngineProgram>,
    input: OnceCell<RelationMap>,
    output: OnceCell<RelationMap>,
    internal: OnceCell<RelationMap>,
    all: OnceCell<RelationMap>,
    _claim: Option<NameClaim>,
    scratch: Option<TempDir>,
}

impl Program {
    pub(crate) fn new(
        name: &str,
        path: PathBuf,
        engine: Rc<dyn EngineProgram>,
        claim: Option<NameClaim>,
    ) -> Self {
        Self {
            name: name.to_string(),
            path,
            engine,
            input: OnceCell::new(),
            output: OnceCell::new(),
            internal: OnceCell::new(),
            all: OnceCell::new(),
            _claim: claim,
            scratch: None,
        }
    }

    /// Tie a scratch directory's lifetime to this handle.
    pub(crate) fn keep_scratch(&mut self, scratch: Option<TempDir>) {
        self.scratch = scratch;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical path of the artifact this program was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scratch directory holding the source and artifact, for programs
    /// compiled without a work directory.
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(TempDir::path)
    }

    /// Evaluate the program on the current relation contents.
    pub fn run(&self) -> Result<()> {
        tracing::debug!(program = %self.name, "run");
        self.engine.run()
    }

    /// Load inputs, run, print outputs. `None` or an empty path selects the
    /// engine's default directory.
    pub fn run_all(&self, input_dir: Option<&Path>, output_dir: Option<&Path>) -> Result<()> {
        tracing::debug!(program = %self.name, ?input_dir, ?output_dir, "run_all");
        self.engine.run_all(non_empty(input_dir), non_empty(output_dir))
    }

    /// Read input relations from `<dir>/<relation>.facts`.
    pub fn load_all(&self, input_dir: Option<&Path>) -> Result<()> {
        self.engine.load_all(non_empty(input_dir))
    }

    /// Write output relations to `<dir>/<relation>.csv`.
    pub fn print_all(&self, output_dir: Option<&Path>) -> Result<()> {
        self.engine.print_all(non_empty(output_dir))
    }

    pub fn num_threads(&self) -> usize {
        self.engine.num_threads()
    }

    pub fn set_num_threads(&self, threads: usize) {
        self.engine.set_num_threads(threads);
    }

    pub fn input_relations(&self) -> Result<&RelationMap> {
        self.cached(&self.input, Category::Input)
    }

    pub fn output_relations(&self) -> Result<&RelationMap> {
        self.cached(&self.output, Category::Output)
    }

    pub fn internal_relations(&self) -> Result<&RelationMap> {
        self.cached(&self.internal, Category::Internal)
    }

    /// Every relation of the program.
    pub fn relations(&self) -> Result<&RelationMap> {
        self.cached(&self.all, Category::All)
    }

    pub fn relation(&self, name: &str) -> Result<&RelationView> {
        self.relations()?
            .get(name)
            .ok_or_else(|| Error::UnknownRelation(name.to_string()))
    }

    pub fn purge_input_relations(&self) -> Result<()> {
        self.engine.purge(Category::Input)
    }

    pub fn purge_output_relations(&self) -> Result<()> {
        self.engine.purge(Category::Output)
    }

    pub fn purge_internal_relations(&self) -> Result<()> {
        self.engine.purge(Category::Internal)
    }

    /// Purge every relation one at a time. Not atomic: on failure, relations
    /// before the failing one are already empty.
    pub fn purge_all_relations(&self) -> Result<()> {
        for view in self.relations()?.values() {
            view.purge()?;
        }
        Ok(())
    }

    /// Drop the cached relation maps; the next access re-enumerates.
    pub fn refresh(&mut self) {
        self.input.take();
        self.output.take();
        self.internal.take();
        self.all.take();
    }

    fn cached<'a>(&self, cell: &'a OnceCell<RelationMap>, category: Category) -> Result<&'a RelationMap> {
        if let Some(map) = cell.get() {
            return Ok(map);
        }
        let map = self
            .engine
            .relations(category)?
            .into_iter()
            .map(|relation| {
                let view = RelationView::new(relation)?;
                Ok((view.name().to_string(), view))
            })
            .collect::<Result<RelationMap>>()?;
        tracing::debug!(program = %self.name, ?category, relations = map.len(), "built relation map");
        Ok(cell.get_or_init(|| map))
    }
}

fn non_empty(dir: Option<&Path>) -> Option<&Path> {
    dir.filter(|d| !d.as_os_str().is_empty())
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Souffle program '{}' at '{}'", self.name, self.path.display())
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, MemoryEngine, ProgramSpec, RelationSpec, Rule};

    fn program() -> Program {
        let spec = ProgramSpec::new("p")
            .relation(RelationSpec::input("in").attr("x", "i:number"))
            .relation(RelationSpec::output("out").attr("x", "i:number"))
            .fact("in", (1,))
            .rule(Rule::new("out", |f| f.get("in").to_vec()));
        let engine = MemoryEngine::new().with_program(spec).create("p").unwrap();
        Program::new("p", PathBuf::from("/artifacts/p.so"), engine, None)
    }

    #[test]
    fn test_maps_are_cached() {
        let p = program();
        let first = p.relations().unwrap() as *const RelationMap;
        let second = p.relations().unwrap() as *const RelationMap;
        assert_eq!(first, second);
        assert_eq!(p.input_relations().unwrap().keys().collect::<Vec<_>>(), ["in"]);
    }

    #[test]
    fn test_refresh_rebuilds() {
        let mut p = program();
        assert_eq!(p.relations().unwrap().len(), 2);
        p.refresh();
        assert!(p.all.get().is_none());
        assert_eq!(p.relations().unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_relation() {
        let p = program();
        assert!(matches!(p.relation("nope"), Err(Error::UnknownRelation(_))));
    }

    #[test]
    fn test_display() {
        assert_eq!(program().to_string(), "Souffle program 'p' at '/artifacts/p.so'");
    }

    #[test]
    fn test_threads() {
        let p = program();
        p.set_num_threads(4);
        assert_eq!(p.num_threads(), 4);
    }

    #[test]
    fn test_empty_dir_means_default() {
        assert_eq!(non_empty(Some(Path::new(""))), None);
        assert_eq!(non_empty(Some(Path::new("out"))), Some(Path::new("out")));
        assert_eq!(non_empty(None), None);
    }
}
