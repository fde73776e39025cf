//! Projection expressions: columns, aggregates and opaque function calls.

use serde::{Deserialize, Serialize};

use crate::attribute::{AttrType, Attribute};
use crate::value::Value;

/// A scalar expression operand usable in predicates, projections and
/// function arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// Canonical column reference.
    Column(String),
    /// Literal value.
    Value(Value),
    /// Nested function call.
    Function(FunctionExpr),
}

impl Operand {
    /// Column reference operand.
    pub fn col(name: impl Into<String>) -> Self {
        Operand::Column(name.into())
    }

    /// Literal value operand.
    pub fn lit(value: impl Into<Value>) -> Self {
        Operand::Value(value.into())
    }
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFn {
    fn default_name(&self) -> &'static str {
        match self {
            AggregateFn::Count => "count",
            AggregateFn::Sum => "sum",
            AggregateFn::Avg => "avg",
            AggregateFn::Min => "min",
            AggregateFn::Max => "max",
        }
    }
}

impl std::fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateFn::Count => write!(f, "COUNT"),
            AggregateFn::Sum => write!(f, "SUM"),
            AggregateFn::Avg => write!(f, "AVG"),
            AggregateFn::Min => write!(f, "MIN"),
            AggregateFn::Max => write!(f, "MAX"),
        }
    }
}

/// An aggregate projection, e.g. `COUNT(*) AS count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateExpr {
    pub func: AggregateFn,
    /// Aggregated column; `None` means `*` (COUNT only).
    pub column: Option<String>,
    pub alias: Option<String>,
}

impl AggregateExpr {
    /// COUNT(*) aggregate.
    pub fn count() -> Self {
        Self {
            func: AggregateFn::Count,
            column: None,
            alias: None,
        }
    }

    /// SUM(column) aggregate.
    pub fn sum(column: impl Into<String>) -> Self {
        Self::of(AggregateFn::Sum, column)
    }

    /// AVG(column) aggregate.
    pub fn avg(column: impl Into<String>) -> Self {
        Self::of(AggregateFn::Avg, column)
    }

    /// MIN(column) aggregate.
    pub fn min(column: impl Into<String>) -> Self {
        Self::of(AggregateFn::Min, column)
    }

    /// MAX(column) aggregate.
    pub fn max(column: impl Into<String>) -> Self {
        Self::of(AggregateFn::Max, column)
    }

    fn of(func: AggregateFn, column: impl Into<String>) -> Self {
        Self {
            func,
            column: Some(column.into()),
            alias: None,
        }
    }

    /// Set the output alias (AS name).
    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Name this aggregate is exposed under in result rows.
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(self.func.default_name())
    }
}

/// An opaque function-call expression yielding a typed column. The core
/// treats these as black boxes; backends render or evaluate them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionExpr {
    pub name: String,
    pub args: Vec<Operand>,
    /// Declared result type, when known.
    pub ty: Option<AttrType>,
    pub alias: Option<String>,
}

impl FunctionExpr {
    /// Start a function call expression.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            ty: None,
            alias: None,
        }
    }

    /// Append an argument.
    pub fn arg(mut self, operand: Operand) -> Self {
        self.args.push(operand);
        self
    }

    /// Declare the result type.
    pub fn returns(mut self, ty: AttrType) -> Self {
        self.ty = Some(ty);
        self
    }

    /// Set the output alias (AS name).
    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Name this expression is exposed under in result rows.
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// One projected output column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// A schema attribute (possibly aliased or qualified).
    Attr(Attribute),
    /// An aggregate over the grouped input.
    Aggregate(AggregateExpr),
    /// An opaque function expression.
    Function(FunctionExpr),
}

impl Projection {
    /// Name this projection is exposed under in result rows.
    pub fn output_name(&self) -> &str {
        match self {
            Projection::Attr(attr) => attr.output_name(),
            Projection::Aggregate(agg) => agg.output_name(),
            Projection::Function(func) => func.output_name(),
        }
    }
}

impl From<Attribute> for Projection {
    fn from(attr: Attribute) -> Self {
        Projection::Attr(attr)
    }
}

impl From<AggregateExpr> for Projection {
    fn from(agg: AggregateExpr) -> Self {
        Projection::Aggregate(agg)
    }
}

impl From<FunctionExpr> for Projection {
    fn from(func: FunctionExpr) -> Self {
        Projection::Function(func)
    }
}
