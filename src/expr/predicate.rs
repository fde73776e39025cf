//! Predicate trees for restrictions (WHERE/HAVING).

use serde::{Deserialize, Serialize};

use crate::expr::projection::Operand;
use crate::value::Value;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    /// Equal (=)
    Eq,
    /// Not equal (!=)
    Ne,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Gte,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Lte,
    /// IN array
    In,
    /// NOT IN array
    NotIn,
    /// LIKE pattern match
    Like,
    /// NOT LIKE pattern match
    NotLike,
    /// Case-insensitive LIKE
    ILike,
    /// IS NULL
    IsNull,
    /// IS NOT NULL
    IsNotNull,
    /// BETWEEN low AND high (value is a two-element array)
    Between,
    /// NOT BETWEEN low AND high
    NotBetween,
}

impl CmpOp {
    /// Whether the operator carries a right-hand value.
    pub fn needs_value(&self) -> bool {
        !matches!(self, CmpOp::IsNull | CmpOp::IsNotNull)
    }
}

/// A predicate over rows, built by restriction operations and composed
/// with `and`/`or`/`negate`. Immutable; combinators return new trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Single comparison.
    Cmp {
        left: Operand,
        op: CmpOp,
        value: Value,
    },
    /// Conjunction of predicates.
    And(Vec<Predicate>),
    /// Disjunction of predicates.
    Or(Vec<Predicate>),
    /// Negation.
    Not(Box<Predicate>),
    /// Constant predicate; `Literal(false)` yields the empty relation.
    Literal(bool),
}

impl Predicate {
    /// Build a comparison against a plain column.
    pub fn cmp(column: impl Into<String>, op: CmpOp, value: impl Into<Value>) -> Self {
        Predicate::Cmp {
            left: Operand::Column(column.into()),
            op,
            value: value.into(),
        }
    }

    /// Conjoin with another predicate, flattening nested conjunctions.
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), right) => {
                left.push(right);
                Predicate::And(left)
            }
            (left, Predicate::And(mut right)) => {
                right.insert(0, left);
                Predicate::And(right)
            }
            (left, right) => Predicate::And(vec![left, right]),
        }
    }

    /// Disjoin with another predicate.
    pub fn or(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::Or(mut left), Predicate::Or(right)) => {
                left.extend(right);
                Predicate::Or(left)
            }
            (Predicate::Or(mut left), right) => {
                left.push(right);
                Predicate::Or(left)
            }
            (left, right) => Predicate::Or(vec![left, right]),
        }
    }

    /// Negate, collapsing double negation.
    pub fn negate(self) -> Predicate {
        match self {
            Predicate::Not(inner) => *inner,
            Predicate::Literal(b) => Predicate::Literal(!b),
            other => Predicate::Not(Box::new(other)),
        }
    }

    /// AND together an optional accumulated predicate and a new one.
    pub fn append(existing: Option<Predicate>, next: Predicate) -> Predicate {
        match existing {
            Some(prior) => prior.and(next),
            None => next,
        }
    }
}
