//! Shared fixtures: the three-relation program and a host over doubles.

#![allow(dead_code)]

use souffle_host::engine::{MemoryEngine, ProgramSpec, RelationSpec, Rule};
use souffle_host::{
    ArtifactIdentity, Host, HostConfig, LoadError, LoadPrimitive, NameRegistry, NamePolicy,
    NativeLoader, Program, RelationView, Value, artifact_extension,
};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const SIMPLE_PROGRAM: &str = r#"
.decl A(a: number, b: symbol)
.decl B(x: number)
.decl C(y: number)

.input A
A(1, "Hi").
A(2, "Bye").

B(x) :- A(x, _).

C(y) :- B(y).

.output C
"#;

/// `A` input with two facts, `B(x) :- A(x, _)` internal, `C(y) :- B(y)` output.
pub fn simple_program(name: &str) -> ProgramSpec {
    ProgramSpec::new(name)
        .relation(
            RelationSpec::input("A")
                .attr("a", "i:number")
                .attr("b", "s:symbol"),
        )
        .relation(RelationSpec::internal("B").attr("x", "i:number"))
        .relation(RelationSpec::output("C").attr("y", "i:number"))
        .fact("A", (1, "Hi"))
        .fact("A", (2, "Bye"))
        .rule(Rule::new("B", |f| {
            f.get("A").iter().map(|t| vec![t[0].clone()]).collect()
        }))
        .rule(Rule::new("C", |f| f.get("B").to_vec()))
}

/// Records loads instead of mapping anything.
#[derive(Default)]
pub struct CountingLoader {
    loads: AtomicUsize,
}

impl CountingLoader {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl LoadPrimitive for CountingLoader {
    fn load(&self, _identity: &ArtifactIdentity) -> Result<(), LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Fixture {
    pub host: Host,
    pub loader: Arc<CountingLoader>,
    pub dir: tempfile::TempDir,
}

impl Fixture {
    pub fn new(policy: NamePolicy) -> Self {
        Self::with_engine(policy, MemoryEngine::new().with_program(simple_program("simple_program")))
    }

    pub fn with_engine(policy: NamePolicy, engine: MemoryEngine) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let mut config = HostConfig::default();
        config.programs.name_policy = Some(policy);
        config.programs.artifact_dir = Some(dir.path().to_path_buf());

        let counter = Arc::new(CountingLoader::default());
        let host = Host::with_parts(
            config,
            Arc::new(NativeLoader::new(counter.clone())),
            Rc::new(engine),
            Arc::new(NameRegistry::new()),
        );
        Self {
            host,
            loader: counter,
            dir,
        }
    }

    /// Create an (empty) artifact file for `name` in the artifact directory.
    pub fn artifact(&self, name: &str) -> PathBuf {
        let path = self
            .dir
            .path()
            .join(format!("{name}.{}", artifact_extension().unwrap()));
        std::fs::write(&path, b"").unwrap();
        path
    }

    pub fn attach_simple(&self) -> Program {
        self.artifact("simple_program");
        self.host.attach("simple_program", None).unwrap()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Check a relation's metadata and its contents, in iteration order.
pub fn check_relation(
    relation: &RelationView,
    name: &str,
    fields: &[&str],
    long_types: &[&str],
    short_types: &[&str],
    tuples: &[Vec<Value>],
) {
    let full_types: Vec<String> = short_types
        .iter()
        .zip(long_types)
        .map(|(s, l)| format!("{s}:{l}"))
        .collect();
    let signature = format!("<{}>", full_types.join(","));

    assert_eq!(relation.name(), name);
    assert_eq!(relation.arity(), fields.len());
    assert_eq!(relation.signature(), signature);
    assert_eq!(relation.len().unwrap(), tuples.len());
    assert_eq!(
        relation.to_string(),
        format!("Relation {name}({signature}) with {} tuples", tuples.len())
    );
    assert_eq!(relation.attr_types(), long_types);
    assert_eq!(relation.short_attr_types(), short_types);
    assert_eq!(relation.full_attr_types(), full_types);
    assert_eq!(relation.raw_tuples().unwrap(), tuples);

    let shape = relation.named_tuple_shape();
    assert_eq!(shape.name(), format!("{name}_tuple"));
    assert_eq!(shape.fields(), fields);
    for (named, expected) in relation.tuples().unwrap().iter().zip(tuples) {
        for (field, value) in fields.iter().zip(expected) {
            assert_eq!(named.get(field), Some(value));
        }
    }
}

pub fn check_a(program: &Program, tuples: &[Vec<Value>]) {
    check_relation(
        program.relation("A").unwrap(),
        "A",
        &["a", "b"],
        &["number", "symbol"],
        &["i", "s"],
        tuples,
    );
}

pub fn check_b(program: &Program, tuples: &[Vec<Value>]) {
    check_relation(
        program.relation("B").unwrap(),
        "B",
        &["x"],
        &["number"],
        &["i"],
        tuples,
    );
}

pub fn check_c(program: &Program, tuples: &[Vec<Value>]) {
    check_relation(
        program.relation("C").unwrap(),
        "C",
        &["y"],
        &["number"],
        &["i"],
        tuples,
    );
}

pub fn a(x: i64, s: &str) -> Vec<Value> {
    vec![Value::from(x), Value::from(s)]
}

pub fn n(x: i64) -> Vec<Value> {
    vec![Value::from(x)]
}
