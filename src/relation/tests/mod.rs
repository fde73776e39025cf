//! Relation test modules.
//!
//! Tests are organized by category:
//! - `projection`: select, select_append, rename/prefix/qualified views
//! - `restriction`: filter/exclude/invert and the closure DSL
//! - `ordering`: order, order_with, reverse, nulls placement
//! - `grouping`: group, group_and_count, select_group, having
//! - `joins`: association resolution and explicit join targets
//! - `terminals`: fetch, first/last, count, map/pluck, aggregates, union

mod grouping;
mod terminals;

use std::sync::Arc;

use crate::association::{Association, AssociationSet};
use crate::attribute::{AttrType, Attribute};
use crate::expr::predicate::{CmpOp, Predicate};
use crate::gateway::Row;
use crate::memory::MemoryGateway;
use crate::relation::Relation;
use crate::schema::Schema;
use crate::value::Value;

pub(crate) struct Fixture {
    pub users: Relation,
    pub tasks: Relation,
    pub memberships: Relation,
}

/// Three users (joan has no email), three tasks (two for ada), and a
/// composite-keyed membership table.
pub(crate) fn fixture() -> Fixture {
    let gateway = Arc::new(MemoryGateway::new());
    gateway
        .insert_all(
            "users",
            vec![
                Row::new()
                    .with("id", 1)
                    .with("name", "ada")
                    .with("email", "ada@example.com")
                    .with("age", 36)
                    .with("active", true),
                Row::new()
                    .with("id", 2)
                    .with("name", "grace")
                    .with("email", "grace@example.com")
                    .with("age", 45)
                    .with("active", true),
                Row::new()
                    .with("id", 3)
                    .with("name", "joan")
                    .with("email", Value::Null)
                    .with("age", 28)
                    .with("active", false),
            ],
        )
        .unwrap();
    gateway
        .insert_all(
            "tasks",
            vec![
                Row::new()
                    .with("id", 10)
                    .with("user_id", 1)
                    .with("title", "fix parser")
                    .with("status", "open"),
                Row::new()
                    .with("id", 11)
                    .with("user_id", 1)
                    .with("title", "write docs")
                    .with("status", "done"),
                Row::new()
                    .with("id", 12)
                    .with("user_id", 2)
                    .with("title", "review patch")
                    .with("status", "open"),
            ],
        )
        .unwrap();
    gateway
        .insert_all(
            "memberships",
            vec![
                Row::new()
                    .with("user_id", 1)
                    .with("group_id", 100)
                    .with("role", "admin"),
                Row::new()
                    .with("user_id", 2)
                    .with("group_id", 100)
                    .with("role", "member"),
            ],
        )
        .unwrap();

    let associations = Arc::new(
        AssociationSet::new()
            .relation("users")
            .relation("tasks")
            .relation("memberships")
            .associate(Association::new("users", "tasks").key("id", "user_id"))
            .associate(Association::new("tasks", "users").key("user_id", "id"))
            .associate(
                Association::new("users", "open_tasks")
                    .target("tasks")
                    .key("id", "user_id")
                    .filter(Predicate::cmp("status", CmpOp::Eq, "open")),
            ),
    );

    let users_schema = Schema::new("users")
        .attribute(Attribute::new("id", AttrType::Int).primary())
        .attribute(Attribute::new("name", AttrType::Str).not_null())
        .attribute(Attribute::new("email", AttrType::Str))
        .attribute(Attribute::new("age", AttrType::Int))
        .attribute(Attribute::new("active", AttrType::Bool));
    let tasks_schema = Schema::new("tasks")
        .attribute(Attribute::new("id", AttrType::Int).primary())
        .attribute(Attribute::new("user_id", AttrType::Int).not_null())
        .attribute(Attribute::new("title", AttrType::Str).not_null())
        .attribute(Attribute::new("status", AttrType::Str));
    let memberships_schema = Schema::new("memberships")
        .attribute(Attribute::new("user_id", AttrType::Int).primary())
        .attribute(Attribute::new("group_id", AttrType::Int).primary())
        .attribute(Attribute::new("role", AttrType::Str));

    Fixture {
        users: Relation::new(users_schema, Arc::clone(&associations), gateway.clone()),
        tasks: Relation::new(tasks_schema, Arc::clone(&associations), gateway.clone()),
        memberships: Relation::new(memberships_schema, associations, gateway),
    }
}

/// Collect one column from materialized rows.
pub(crate) fn column(rows: &[Row], name: &str) -> Vec<Value> {
    rows.iter()
        .map(|r| r.get(name).cloned().unwrap_or(Value::Null))
        .collect()
}
