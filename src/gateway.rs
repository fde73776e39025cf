//! Execution boundary. A gateway materializes query values; the core
//! never talks to storage directly.

use serde::{Deserialize, Serialize};

use crate::error::RelqResult;
use crate::expr::projection::AggregateExpr;
use crate::query::Query;
use crate::value::Value;

/// One materialized tuple: ordered `(column, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    /// Builder: set a column, replacing an existing one of the same name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a column, replacing an existing one of the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Merge another row in; on column-name collision this row's value
    /// wins.
    pub fn merged(&self, other: &Row) -> Row {
        let mut merged = self.clone();
        for (name, value) in &other.columns {
            if merged.get(name).is_none() {
                merged.columns.push((name.clone(), value.clone()));
            }
        }
        merged
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.columns.iter().map(|(_, v)| v)
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// Capability set a relation consumes from its backend.
///
/// Gateways receive the full immutable query AST and own everything
/// beyond it; failures come back as `RelqError::Database` and are never
/// interpreted by the core.
pub trait Gateway: Send + Sync + std::fmt::Debug {
    /// Materialize the query into rows.
    fn rows(&self, query: &Query) -> RelqResult<Vec<Row>>;

    /// Count the rows the query would produce.
    fn count(&self, query: &Query) -> RelqResult<u64>;

    /// Evaluate a single aggregate over the query's rows.
    fn aggregate(&self, query: &Query, agg: &AggregateExpr) -> RelqResult<Value>;
}
