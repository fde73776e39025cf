//! Grouping tests: group/group_append/group_and_count/select_group and
//! HAVING restrictions over aggregates.

use pretty_assertions::assert_eq;

use super::{column, fixture};
use crate::expr::projection::{AggregateExpr, Projection};
use crate::value::Value;

#[test]
fn test_group_and_count() {
    let fx = fixture();
    let counted = fx.tasks.group_and_count(["user_id"]).unwrap();
    assert_eq!(counted.schema().names(), vec!["user_id", "count"]);

    let rows = counted.rows().unwrap();
    assert_eq!(column(&rows, "user_id"), vec![Value::Int(1), Value::Int(2)]);
    assert_eq!(column(&rows, "count"), vec![Value::Int(2), Value::Int(1)]);
}

#[test]
fn test_select_group_projects_keys_only() {
    let fx = fixture();
    let grouped = fx.tasks.select_group(["status"]).unwrap();
    assert_eq!(grouped.schema().names(), vec!["status"]);
    assert_eq!(
        column(&grouped.rows().unwrap(), "status"),
        vec![Value::from("open"), Value::from("done")]
    );
}

#[test]
fn test_group_replaces_and_append_extends() {
    let fx = fixture();
    let base = fx.tasks.group(["status"]).unwrap();
    assert_eq!(base.group(["user_id"]).unwrap().query().group.len(), 1);

    let extended = base.group_append(["user_id"]).unwrap();
    assert_eq!(extended.query().group.len(), 2);

    let rows = extended
        .select(["status", "user_id"])
        .unwrap()
        .rows()
        .unwrap();
    assert_eq!(rows.len(), 3);
}

#[test]
fn test_group_with_closure_keys() {
    let fx = fixture();
    let grouped = fx
        .tasks
        .group_with(["user_id"], |s| Ok(vec![s.attr("status")?.into()]))
        .unwrap();
    assert_eq!(grouped.query().group.len(), 2);
}

#[test]
fn test_having_filters_groups() {
    let fx = fixture();
    let busy = fx
        .tasks
        .group_and_count(["user_id"])
        .unwrap()
        .having([("count", 2)])
        .unwrap();
    let rows = busy.rows().unwrap();
    assert_eq!(column(&rows, "user_id"), vec![Value::Int(1)]);
}

#[test]
fn test_having_with_closure() {
    let fx = fixture();
    let rows = fx
        .tasks
        .group_and_count(["user_id"])
        .unwrap()
        .having_with(|s| s.attr("count")?.gte(2))
        .unwrap()
        .rows()
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("user_id"), Some(&Value::Int(1)));
}

#[test]
fn test_ungrouped_aggregate_projection() {
    let fx = fixture();
    let count_all = |relation: &crate::relation::Relation| {
        relation
            .select([Projection::Aggregate(
                AggregateExpr::count().aliased("total"),
            )])
            .unwrap()
            .rows()
            .unwrap()
    };

    let rows = count_all(&fx.tasks);
    assert_eq!(rows[0].get("total"), Some(&Value::Int(3)));

    // Aggregating an empty selection still yields a single row.
    let empty = fx.tasks.filter([("status", "missing")]).unwrap();
    let rows = count_all(&empty);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("total"), Some(&Value::Int(0)));
}

#[test]
fn test_grouped_sum_per_bucket() {
    let fx = fixture();
    let rows = fx
        .users
        .group(["active"])
        .unwrap()
        .select_with(|s| {
            Ok(vec![
                Projection::from(s.attr("active")?),
                Projection::Aggregate(AggregateExpr::sum("age").aliased("total_age")),
            ])
        })
        .unwrap()
        .rows()
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("active"), Some(&Value::Bool(true)));
    assert_eq!(rows[0].get("total_age"), Some(&Value::Int(81)));
    assert_eq!(rows[1].get("total_age"), Some(&Value::Int(28)));
}
