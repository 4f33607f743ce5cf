//! Relations carrying rule/height columns.

mod common;

use common::Fixture;
use souffle_host::engine::{MemoryEngine, ProgramSpec, RelationSpec, Rule};
use souffle_host::{NamePolicy, Provenance, Row, Value};

fn reachability() -> ProgramSpec {
    ProgramSpec::new("reach")
        .relation(
            RelationSpec::input("edge")
                .attr("from", "i:number")
                .attr("to", "i:number"),
        )
        .relation(
            RelationSpec::output("path")
                .attr("from", "i:number")
                .attr("to", "i:number")
                .with_provenance(),
        )
        .fact("edge", (1, 2))
        .fact("edge", (2, 3))
        .fact("edge", (3, 4))
        .rule(Rule::new("path", |f| f.get("edge").to_vec()))
        .rule(Rule::new("path", |f| {
            let mut derived = Vec::new();
            for p in f.get("path") {
                for e in f.get("edge") {
                    if p[1] == e[0] {
                        derived.push(vec![p[0].clone(), e[1].clone()]);
                    }
                }
            }
            derived
        }))
}

fn fixture() -> Fixture {
    Fixture::with_engine(
        NamePolicy::Unique,
        MemoryEngine::new().with_program(reachability()),
    )
}

#[test]
fn test_arities_and_attribute_names() {
    let f = fixture();
    f.artifact("reach");
    let program = f.host.attach("reach", None).unwrap();

    let edge = program.relation("edge").unwrap();
    assert_eq!(edge.auxiliary_arity(), 0);
    assert!(!edge.has_provenance());

    let path = program.relation("path").unwrap();
    assert_eq!(path.primary_arity(), 2);
    assert_eq!(path.auxiliary_arity(), 2);
    assert!(path.has_provenance());
    assert_eq!(path.attribute_names(false).len(), path.arity());
    assert_eq!(path.attribute_names(true), ["from", "to"]);
    assert_eq!(
        path.signature(),
        "<i:number,i:number,i:number,i:number>"
    );
}

#[test]
fn test_every_row_has_two_field_provenance() {
    let f = fixture();
    f.artifact("reach");
    let program = f.host.attach("reach", None).unwrap();
    program.run().unwrap();

    let path = program.relation("path").unwrap();
    let rows = path.provenance_tuples().unwrap();
    assert_eq!(rows.len(), 6);
    assert!(rows.iter().all(|r| r.provenance.is_some()));
    assert!(rows.iter().all(|r| r.data.len() == 2));

    let one_to_four = rows
        .iter()
        .find(|r| r.data.values() == [Value::from(1), Value::from(4)])
        .unwrap();
    assert_eq!(one_to_four.provenance, Some(Provenance { rule: 2, height: 3 }));
}

#[test]
fn test_inserted_tuples_are_facts() {
    let f = fixture();
    f.artifact("reach");
    let program = f.host.attach("reach", None).unwrap();
    let path = program.relation("path").unwrap();

    path.insert((8, 9)).unwrap();
    assert!(path.contains((8, 9)).unwrap());

    let rows: Vec<Row> = path
        .iterate(true, true)
        .unwrap()
        .collect::<souffle_host::Result<_>>()
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].provenance(), Some(Provenance { rule: 0, height: 0 }));
    assert_eq!(rows[0].data().get("to"), Some(&Value::from(9)));
}

#[test]
fn test_plain_iteration_can_include_provenance_columns() {
    let f = fixture();
    f.artifact("reach");
    let program = f.host.attach("reach", None).unwrap();
    program.run().unwrap();

    let path = program.relation("path").unwrap();
    for row in path.iterate(false, false).unwrap() {
        let row = row.unwrap();
        assert!(matches!(row, Row::Tuple(_)));
        assert_eq!(row.data().len(), 4);
        assert!(row.data().get("@rule_number").is_some());
    }
    assert!(path.tuples().unwrap().iter().all(|t| t.len() == 2));
}

#[test]
fn test_relation_without_provenance_reports_none() {
    let f = fixture();
    f.artifact("reach");
    let program = f.host.attach("reach", None).unwrap();
    program.run().unwrap();

    let edge = program.relation("edge").unwrap();
    let rows = edge.provenance_tuples().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.provenance.is_none()));
}
