//! In-process engine for programs described in Rust.
//!
//! Relations are ordered sets keyed by their data columns. Rules are closures
//! over a snapshot of every relation; `run` inserts the declared facts and
//! applies rules until nothing new is derived. Relations declared with
//! provenance record the deriving rule (1-based, 0 for facts and inserts) and
//! the fixpoint round as height.

use super::{Category, Engine, EngineProgram, EngineRelation};
use crate::codec::AttrType;
use crate::tuple::{Provenance, TupleInput};
use crate::value::{AttrKind, Value, conform_tuple};
use crate::{Error, Result};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const RULE_ATTR: &str = "@rule_number";
const LEVEL_ATTR: &str = "@level_number";
const PROVENANCE_TYPE: &str = "i:number";

/// Declaration of one relation.
#[derive(Debug, Clone)]
pub struct RelationSpec {
    name: String,
    category: Category,
    attrs: Vec<(String, String)>,
    provenance: bool,
}

impl RelationSpec {
    fn new(name: &str, category: Category) -> Self {
        Self {
            name: name.to_string(),
            category,
            attrs: Vec::new(),
            provenance: false,
        }
    }

    pub fn input(name: &str) -> Self {
        Self::new(name, Category::Input)
    }

    pub fn output(name: &str) -> Self {
        Self::new(name, Category::Output)
    }

    pub fn internal(name: &str) -> Self {
        Self::new(name, Category::Internal)
    }

    /// Append an attribute with a `short:long` type, e.g. `("a", "i:number")`.
    pub fn attr(mut self, name: &str, signature: &str) -> Self {
        self.attrs.push((name.to_string(), signature.to_string()));
        self
    }

    /// Add the two provenance columns.
    pub fn with_provenance(mut self) -> Self {
        self.provenance = true;
        self
    }
}

/// Read-only view of every relation's data tuples, handed to rule bodies.
#[derive(Debug, Default)]
pub struct Facts {
    tuples: HashMap<String, Vec<Vec<Value>>>,
}

impl Facts {
    /// Data tuples of `relation`; empty for unknown names.
    pub fn get(&self, relation: &str) -> &[Vec<Value>] {
        self.tuples.get(relation).map(Vec::as_slice).unwrap_or(&[])
    }
}

type RuleBody = dyn Fn(&Facts) -> Vec<Vec<Value>>;

/// Derives tuples for `head` from the current facts.
#[derive(Clone)]
pub struct Rule {
    head: String,
    body: Rc<RuleBody>,
}

impl Rule {
    pub fn new(head: &str, body: impl Fn(&Facts) -> Vec<Vec<Value>> + 'static) -> Self {
        Self {
            head: head.to_string(),
            body: Rc::new(body),
        }
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("head", &self.head).finish_non_exhaustive()
    }
}

/// A program: relation declarations, facts, and rules.
#[derive(Debug, Clone)]
pub struct ProgramSpec {
    name: String,
    relations: Vec<RelationSpec>,
    facts: Vec<(String, TupleInput)>,
    rules: Vec<Rule>,
}

impl ProgramSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            relations: Vec::new(),
            facts: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn relation(mut self, relation: RelationSpec) -> Self {
        self.relations.push(relation);
        self
    }

    /// A fact inserted into `relation` at the start of every run.
    pub fn fact(mut self, relation: &str, tuple: impl Into<TupleInput>) -> Self {
        self.facts.push((relation.to_string(), tuple.into()));
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Engine over [`ProgramSpec`]s registered by name.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    programs: HashMap<String, ProgramSpec>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, program: ProgramSpec) {
        self.programs.insert(program.name.clone(), program);
    }

    pub fn with_program(mut self, program: ProgramSpec) -> Self {
        self.register(program);
        self
    }
}

impl Engine for MemoryEngine {
    fn create(&self, name: &str) -> Result<Rc<dyn EngineProgram>> {
        let spec = self
            .programs
            .get(name)
            .ok_or_else(|| Error::UnknownProgram(name.to_string()))?;
        Ok(Rc::new(MemoryProgram::new(spec)?))
    }
}

struct MemoryRelation {
    name: String,
    category: Category,
    names: Vec<String>,
    types: Vec<String>,
    kinds: Vec<AttrKind>,
    provenance: bool,
    tuples: RefCell<BTreeMap<Vec<Value>, Provenance>>,
}

impl MemoryRelation {
    fn new(spec: &RelationSpec) -> Result<Self> {
        let mut names = Vec::with_capacity(spec.attrs.len() + 2);
        let mut types = Vec::with_capacity(spec.attrs.len() + 2);
        let mut kinds = Vec::with_capacity(spec.attrs.len());
        for (name, signature) in &spec.attrs {
            let attr = AttrType::parse(signature)?;
            let kind = AttrKind::from_code(&attr.short).ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "attribute {name} of relation {} has unknown type '{signature}'",
                    spec.name
                ))
            })?;
            names.push(name.clone());
            types.push(signature.clone());
            kinds.push(kind);
        }
        if spec.provenance {
            names.extend([RULE_ATTR.to_string(), LEVEL_ATTR.to_string()]);
            types.extend([PROVENANCE_TYPE.to_string(), PROVENANCE_TYPE.to_string()]);
        }

        Ok(Self {
            name: spec.name.clone(),
            category: spec.category,
            names,
            types,
            kinds,
            provenance: spec.provenance,
            tuples: RefCell::new(BTreeMap::new()),
        })
    }

    fn data_names(&self) -> &[String] {
        &self.names[..self.kinds.len()]
    }

    /// Insert an already conformed tuple; true when it was new.
    fn add(&self, tuple: Vec<Value>, provenance: Provenance) -> bool {
        let mut tuples = self.tuples.borrow_mut();
        if tuples.contains_key(&tuple) {
            return false;
        }
        tuples.insert(tuple, provenance);
        true
    }

    fn data(&self) -> Vec<Vec<Value>> {
        self.tuples.borrow().keys().cloned().collect()
    }
}

const FACT: Provenance = Provenance { rule: 0, height: 0 };

impl EngineRelation for MemoryRelation {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn primary_arity(&self) -> usize {
        self.kinds.len()
    }

    fn auxiliary_arity(&self) -> usize {
        if self.provenance { 2 } else { 0 }
    }

    fn attr_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn attr_types(&self) -> Vec<String> {
        self.types.clone()
    }

    fn len(&self) -> Result<usize> {
        Ok(self.tuples.borrow().len())
    }

    fn contains(&self, tuple: Vec<Value>) -> Result<bool> {
        let tuple = conform_tuple(&self.name, &self.kinds, tuple)?;
        Ok(self.tuples.borrow().contains_key(&tuple))
    }

    fn insert(&self, tuples: Vec<Vec<Value>>) -> Result<()> {
        for (index, tuple) in tuples.into_iter().enumerate() {
            let tuple = conform_tuple(&self.name, &self.kinds, tuple).map_err(|e| {
                Error::Insertion {
                    index,
                    source: Box::new(e),
                }
            })?;
            self.add(tuple, FACT);
        }
        Ok(())
    }

    fn purge(&self) -> Result<()> {
        self.tuples.borrow_mut().clear();
        Ok(())
    }

    fn scan(&self, data_only: bool) -> Result<Box<dyn Iterator<Item = Result<Vec<Value>>>>> {
        let with_provenance = self.provenance && !data_only;
        let rows: Vec<Vec<Value>> = self
            .tuples
            .borrow()
            .iter()
            .map(|(data, provenance)| {
                let mut row = data.clone();
                if with_provenance {
                    row.push(Value::Signed(provenance.rule));
                    row.push(Value::Signed(provenance.height));
                }
                row
            })
            .collect();
        Ok(Box::new(rows.into_iter().map(Ok)))
    }
}

struct MemoryProgram {
    relations: Vec<Rc<MemoryRelation>>,
    facts: Vec<(usize, Vec<Value>)>,
    rules: Vec<(usize, Rc<RuleBody>)>,
    threads: Cell<usize>,
}

impl MemoryProgram {
    fn new(spec: &ProgramSpec) -> Result<Self> {
        let relations = spec
            .relations
            .iter()
            .map(|r| MemoryRelation::new(r).map(Rc::new))
            .collect::<Result<Vec<_>>>()?;

        let position = |name: &str| {
            relations
                .iter()
                .position(|r| r.name == name)
                .ok_or_else(|| Error::UnknownRelation(name.to_string()))
        };

        let mut facts = Vec::with_capacity(spec.facts.len());
        for (relation, tuple) in &spec.facts {
            let index = position(relation)?;
            let target = &relations[index];
            let values = tuple.clone().into_positional(&target.name, target.data_names())?;
            facts.push((index, conform_tuple(&target.name, &target.kinds, values)?));
        }

        let rules = spec
            .rules
            .iter()
            .map(|rule| Ok((position(&rule.head)?, Rc::clone(&rule.body))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            relations,
            facts,
            rules,
            threads: Cell::new(1),
        })
    }

    fn snapshot(&self) -> Facts {
        Facts {
            tuples: self
                .relations
                .iter()
                .map(|r| (r.name.clone(), r.data()))
                .collect(),
        }
    }

    fn selected(&self, category: Category) -> impl Iterator<Item = &Rc<MemoryRelation>> {
        self.relations
            .iter()
            .filter(move |r| category == Category::All || r.category == category)
    }

    fn load_relation(relation: &MemoryRelation, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Engine(format!("cannot open fact file {}: {e}", path.display()))
        })?;
        for (line_no, line) in text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != relation.kinds.len() {
                return Err(Error::Engine(format!(
                    "{}:{}: expected {} columns, found {}",
                    path.display(),
                    line_no + 1,
                    relation.kinds.len(),
                    fields.len()
                )));
            }
            let tuple = fields
                .iter()
                .zip(&relation.kinds)
                .map(|(field, &kind)| Value::parse(field, kind))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::Engine(format!("{}:{}: {e}", path.display(), line_no + 1)))?;
            relation.add(tuple, FACT);
        }
        Ok(())
    }
}

/// Fact files have no quoting, so a delimiter inside a symbol cannot be
/// written back readably.
fn csv_field(relation: &str, value: &Value) -> Result<String> {
    match value {
        Value::Symbol(s) if s.contains(['\t', '\n', '\r']) => Err(Error::Engine(format!(
            "cannot write relation {relation}: symbol {s:?} contains a tab or line break"
        ))),
        value => Ok(value.to_string()),
    }
}

fn directory(dir: Option<&Path>) -> PathBuf {
    dir.map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

impl EngineProgram for MemoryProgram {
    fn run(&self) -> Result<()> {
        for (index, tuple) in &self.facts {
            self.relations[*index].add(tuple.clone(), FACT);
        }

        let mut round = 1;
        loop {
            let facts = self.snapshot();
            let mut changed = false;
            for (rule_index, (head, body)) in self.rules.iter().enumerate() {
                let relation = &self.relations[*head];
                let provenance = Provenance {
                    rule: rule_index as i64 + 1,
                    height: round,
                };
                for tuple in body(&facts) {
                    let tuple = conform_tuple(&relation.name, &relation.kinds, tuple)?;
                    changed |= relation.add(tuple, provenance);
                }
            }
            if !changed {
                return Ok(());
            }
            round += 1;
        }
    }

    fn run_all(&self, input_dir: Option<&Path>, output_dir: Option<&Path>) -> Result<()> {
        self.load_all(input_dir)?;
        self.run()?;
        self.print_all(output_dir)
    }

    fn load_all(&self, input_dir: Option<&Path>) -> Result<()> {
        let dir = directory(input_dir);
        for relation in self.selected(Category::Input) {
            Self::load_relation(relation, &dir.join(format!("{}.facts", relation.name)))?;
        }
        Ok(())
    }

    fn print_all(&self, output_dir: Option<&Path>) -> Result<()> {
        let dir = directory(output_dir);
        for relation in self.selected(Category::Output) {
            let mut out = String::new();
            for tuple in relation.data() {
                let fields = tuple
                    .iter()
                    .map(|value| csv_field(&relation.name, value))
                    .collect::<Result<Vec<_>>>()?;
                out.push_str(&fields.join("\t"));
                out.push('\n');
            }
            fs::write(dir.join(format!("{}.csv", relation.name)), out)?;
        }
        Ok(())
    }

    fn num_threads(&self) -> usize {
        self.threads.get()
    }

    fn set_num_threads(&self, threads: usize) {
        self.threads.set(threads.max(1));
    }

    fn relations(&self, category: Category) -> Result<Vec<Rc<dyn EngineRelation>>> {
        Ok(self
            .selected(category)
            .map(|r| Rc::clone(r) as Rc<dyn EngineRelation>)
            .collect())
    }

    fn purge(&self, category: Category) -> Result<()> {
        for relation in self.selected(category) {
            relation.purge()?;
        }
        Ok(())
    }
}
