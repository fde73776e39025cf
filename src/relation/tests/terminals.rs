//! Terminal reads and set operations: fetch/first/last/count/map/pluck,
//! aggregates, union, distinct and the raw escape hatch.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use super::{column, fixture};
use crate::association::AssociationSet;
use crate::attribute::{AttrType, Attribute};
use crate::error::RelqError;
use crate::gateway::Row;
use crate::memory::MemoryGateway;
use crate::query::Source;
use crate::relation::{Relation, UnionOpts};
use crate::schema::Schema;
use crate::value::Value;

fn bare_relation(schema: Schema, rows: Vec<Row>) -> Relation {
    let gateway = MemoryGateway::new();
    gateway.insert_all(schema.relation.clone(), rows).unwrap();
    Relation::new(schema, Arc::new(AssociationSet::new()), Arc::new(gateway))
}

#[test]
fn test_fetch_returns_the_single_row() {
    let fx = fixture();
    let row = fx.users.fetch(1).unwrap();
    assert_eq!(row.get("name"), Some(&Value::from("ada")));
}

#[test]
fn test_fetch_missing_key_reports_zero_tuples() {
    let fx = fixture();
    let err = fx.users.fetch(99).unwrap_err();
    assert_eq!(
        err,
        RelqError::TupleCountMismatch {
            expected: 1,
            found: 0
        }
    );
}

#[test]
fn test_fetch_composite_key() {
    let fx = fixture();
    let row = fx
        .memberships
        .fetch(Value::Array(vec![Value::Int(1), Value::Int(100)]))
        .unwrap();
    assert_eq!(row.get("role"), Some(&Value::from("admin")));
}

#[test]
fn test_fetch_arity_must_match_primary_key() {
    let fx = fixture();
    let err = fx.memberships.fetch(1).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid argument: primary key of 'memberships' has 2 column(s), got 1 value(s)"
    );
}

#[test]
fn test_fetch_without_primary_key_is_rejected() {
    let schema = Schema::new("logs").attribute(Attribute::new("line", AttrType::Str));
    let logs = bare_relation(schema, vec![Row::new().with("line", "boot")]);
    let err = logs.fetch(1).unwrap_err();
    assert!(matches!(err, RelqError::InvalidArgument(_)));
}

#[test]
fn test_fetch_duplicate_key_reports_count() {
    let schema = Schema::new("events")
        .attribute(Attribute::new("id", AttrType::Int).primary())
        .attribute(Attribute::new("kind", AttrType::Str));
    let events = bare_relation(
        schema,
        vec![
            Row::new().with("id", 1).with("kind", "created"),
            Row::new().with("id", 1).with("kind", "updated"),
        ],
    );
    let err = events.fetch(1).unwrap_err();
    assert_eq!(
        err,
        RelqError::TupleCountMismatch {
            expected: 1,
            found: 2
        }
    );
}

#[test]
fn test_first_and_last_follow_the_ordering() {
    let fx = fixture();
    let by_age = fx.users.order(["age"]).unwrap();
    let first = by_age.first().unwrap().unwrap();
    let last = by_age.last().unwrap().unwrap();
    assert_eq!(first.get("name"), Some(&Value::from("joan")));
    assert_eq!(last.get("name"), Some(&Value::from("grace")));
}

#[test]
fn test_last_without_ordering_takes_final_row() {
    let fx = fixture();
    let last = fx.users.last().unwrap().unwrap();
    assert_eq!(last.get("name"), Some(&Value::from("joan")));
}

#[test]
fn test_first_on_empty_selection() {
    let fx = fixture();
    let none = fx.users.filter([("name", "zoe")]).unwrap().first().unwrap();
    assert_eq!(none, None);
}

#[test]
fn test_count_map_pluck() {
    let fx = fixture();
    assert_eq!(fx.users.count().unwrap(), 3);

    let lengths = fx.users.map(|row| row.len()).unwrap();
    assert_eq!(lengths, vec![5, 5, 5]);

    assert_eq!(
        fx.users.pluck("name").unwrap(),
        vec![Value::from("ada"), Value::from("grace"), Value::from("joan")]
    );
}

#[test]
fn test_pluck_validates_the_column() {
    let fx = fixture();
    let err = fx.users.pluck("nmae").unwrap_err();
    assert_eq!(
        err,
        RelqError::unknown_attribute("nmae", "users", Some("name".into()))
    );
}

#[test]
fn test_exists_and_is_unique() {
    let fx = fixture();
    assert!(fx.users.exists([("name", "ada")]).unwrap());
    assert!(!fx.users.is_unique([("name", "ada")]).unwrap());
    assert!(!fx.users.exists([("name", "zoe")]).unwrap());
    assert!(fx.users.is_unique([("name", "zoe")]).unwrap());
}

#[test]
fn test_aggregates_respect_the_restriction() {
    let fx = fixture();
    assert_eq!(fx.users.sum("age").unwrap(), Value::Int(109));
    assert_eq!(fx.users.min("age").unwrap(), Value::Int(28));
    assert_eq!(fx.users.max("age").unwrap(), Value::Int(45));
    assert_eq!(fx.users.avg("age").unwrap(), Value::Float(109.0 / 3.0));

    let actives = fx.users.filter([("active", true)]).unwrap();
    assert_eq!(actives.sum("age").unwrap(), Value::Int(81));
}

#[test]
fn test_aggregate_column_is_validated() {
    let fx = fixture();
    assert!(matches!(
        fx.users.sum("aeg").unwrap_err(),
        RelqError::UnknownAttribute { .. }
    ));
}

#[test]
fn test_union_deduplicates_unless_all() {
    let fx = fixture();
    let actives = fx.users.select(["active"]).unwrap();

    let merged = actives.union(&actives, UnionOpts::default()).unwrap();
    assert_eq!(merged.rows().unwrap().len(), 2);

    let kept = actives.union(&actives, UnionOpts::all()).unwrap();
    assert_eq!(kept.rows().unwrap().len(), 6);
}

#[test]
fn test_union_requires_matching_arity() {
    let fx = fixture();
    let wide = fx.users.select(["id", "name"]).unwrap();
    let narrow = fx.users.select(["id"]).unwrap();
    let err = wide.union(&narrow, UnionOpts::default()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid argument: union arity mismatch: 2 column(s) vs 1"
    );
}

#[test]
fn test_union_from_self_wraps_as_derived_source() {
    let fx = fixture();
    let actives = fx.users.select(["active"]).unwrap();
    let wrapped = actives
        .union(
            &actives,
            UnionOpts {
                from_self: true,
                ..UnionOpts::default()
            },
        )
        .unwrap();
    assert!(matches!(wrapped.query().source, Source::Derived { .. }));
    assert_eq!(wrapped.rows().unwrap().len(), 2);
}

#[test]
fn test_distinct_dedups_projected_rows() {
    let fx = fixture();
    let statuses = fx.tasks.select(["status"]).unwrap().distinct();
    assert_eq!(
        column(&statuses.rows().unwrap(), "status"),
        vec![Value::from("open"), Value::from("done")]
    );
}

#[test]
fn test_distinct_on_keeps_first_row_per_key() {
    let fx = fixture();
    let rows = fx
        .tasks
        .order(["id"])
        .unwrap()
        .distinct_on(["user_id"])
        .unwrap()
        .rows()
        .unwrap();
    assert_eq!(column(&rows, "id"), vec![Value::Int(10), Value::Int(12)]);
}

#[test]
fn test_limit_offset_windows_the_rows() {
    let fx = fixture();
    let rows = fx
        .users
        .order(["id"])
        .unwrap()
        .limit_offset(1, 1)
        .rows()
        .unwrap();
    assert_eq!(column(&rows, "id"), vec![Value::Int(2)]);
}

#[test]
fn test_read_is_opaque_to_the_memory_gateway() {
    let fx = fixture();
    let raw = fx.users.read("SELECT * FROM users WHERE age > 30");
    assert!(raw.schema().is_empty());
    assert!(matches!(raw.rows().unwrap_err(), RelqError::Database(_)));
}
