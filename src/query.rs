//! The immutable query AST handed across the gateway boundary.
//!
//! A `Query` is plain data: no connection, no execution state. Every
//! transformation clones the receiver and returns a new value, so two
//! relations can share a query without observing each other's changes.

use serde::{Deserialize, Serialize};

use crate::expr::predicate::Predicate;
use crate::expr::projection::Projection;
use crate::expr::sort::SortKey;

/// Data source a query reads from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Source {
    /// Named table in the gateway's storage.
    Table(String),
    /// Raw SQL escape hatch. Only SQL-speaking gateways accept it.
    Raw(String),
    /// Derived sub-query under an alias.
    Derived { query: Box<Query>, alias: String },
}

/// Join flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

/// One resolved join: target table, equi-join key pairs and an optional
/// extra ON restriction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub table: String,
    /// `(source column, target column)` pairs, all equi-joined and ANDed.
    pub keys: Vec<(String, String)>,
    pub filter: Option<Predicate>,
}

/// One UNION arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionClause {
    /// UNION ALL keeps duplicates.
    pub all: bool,
    pub query: Query,
}

/// DISTINCT handling.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum DistinctMode {
    #[default]
    None,
    /// Deduplicate whole projected rows.
    All,
    /// Keep the first row per key tuple (canonical column names).
    On(Vec<String>),
}

/// One relational query over a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub source: Source,
    /// Projected output columns; empty means every source column.
    #[serde(default)]
    pub projections: Vec<Projection>,
    #[serde(default)]
    pub restriction: Option<Predicate>,
    #[serde(default)]
    pub having: Option<Predicate>,
    #[serde(default)]
    pub joins: Vec<JoinClause>,
    #[serde(default)]
    pub order: Vec<SortKey>,
    /// Grouping keys; attribute or function projections.
    #[serde(default)]
    pub group: Vec<Projection>,
    #[serde(default)]
    pub unions: Vec<UnionClause>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub distinct: DistinctMode,
}

impl Query {
    /// Query reading a named table.
    pub fn table(name: impl Into<String>) -> Self {
        Self::from_source(Source::Table(name.into()))
    }

    /// Query around a raw SQL string.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::from_source(Source::Raw(sql.into()))
    }

    fn from_source(source: Source) -> Self {
        Self {
            source,
            projections: Vec::new(),
            restriction: None,
            having: None,
            joins: Vec::new(),
            order: Vec::new(),
            group: Vec::new(),
            unions: Vec::new(),
            limit: None,
            offset: None,
            distinct: DistinctMode::None,
        }
    }

    /// Replace the projection list.
    pub fn selected(&self, projections: Vec<Projection>) -> Query {
        let mut next = self.clone();
        next.projections = projections;
        next
    }

    /// AND a predicate into the restriction.
    pub fn filtered(&self, predicate: Predicate) -> Query {
        let mut next = self.clone();
        next.restriction = Some(Predicate::append(next.restriction.take(), predicate));
        next
    }

    /// AND a predicate into the grouped-result restriction.
    pub fn having_also(&self, predicate: Predicate) -> Query {
        let mut next = self.clone();
        next.having = Some(Predicate::append(next.having.take(), predicate));
        next
    }

    /// Negate the accumulated restrictions. A query with neither WHERE
    /// nor HAVING inverts to one matching no rows.
    pub fn inverted(&self) -> Query {
        let mut next = self.clone();
        if next.restriction.is_none() && next.having.is_none() {
            next.restriction = Some(Predicate::Literal(false));
            return next;
        }
        next.restriction = next.restriction.take().map(|p| p.negate());
        next.having = next.having.take().map(|p| p.negate());
        next
    }

    /// Replace the ordering.
    pub fn ordered(&self, keys: Vec<SortKey>) -> Query {
        let mut next = self.clone();
        next.order = keys;
        next
    }

    /// Flip every sort key without reordering them.
    pub fn reversed(&self) -> Query {
        let mut next = self.clone();
        next.order = next.order.iter().map(SortKey::reversed).collect();
        next
    }

    /// Replace the grouping keys.
    pub fn grouped(&self, keys: Vec<Projection>) -> Query {
        let mut next = self.clone();
        next.group = keys;
        next
    }

    /// Append grouping keys.
    pub fn grouped_also(&self, keys: Vec<Projection>) -> Query {
        let mut next = self.clone();
        next.group.extend(keys);
        next
    }

    /// Append a join clause.
    pub fn joined(&self, clause: JoinClause) -> Query {
        let mut next = self.clone();
        next.joins.push(clause);
        next
    }

    /// Set the row limit.
    pub fn bounded(&self, limit: u64) -> Query {
        let mut next = self.clone();
        next.limit = Some(limit);
        next
    }

    /// Set the row offset.
    pub fn shifted(&self, offset: u64) -> Query {
        let mut next = self.clone();
        next.offset = Some(offset);
        next
    }

    /// DISTINCT over whole projected rows.
    pub fn made_distinct(&self) -> Query {
        let mut next = self.clone();
        next.distinct = DistinctMode::All;
        next
    }

    /// DISTINCT ON the given canonical columns.
    pub fn distinct_on(&self, columns: Vec<String>) -> Query {
        let mut next = self.clone();
        next.distinct = DistinctMode::On(columns);
        next
    }

    /// Append a UNION arm.
    pub fn unioned(&self, other: Query, all: bool) -> Query {
        let mut next = self.clone();
        next.unions.push(UnionClause { all, query: other });
        next
    }

    /// Wrap this query as a derived source under an alias, resetting
    /// every outer clause.
    pub fn from_self(&self, alias: impl Into<String>) -> Query {
        Self::from_source(Source::Derived {
            query: Box::new(self.clone()),
            alias: alias.into(),
        })
    }
}
