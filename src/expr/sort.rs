//! Ordering keys.

use serde::{Deserialize, Serialize};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// The opposite direction.
    pub fn flipped(&self) -> Direction {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }
}

/// Placement of NULLs within a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Nulls {
    /// Backend default: last for ascending, first for descending.
    #[default]
    Default,
    First,
    Last,
}

/// One ordering criterion; criteria apply left-to-right as primary,
/// secondary, ... sort keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    /// Canonical column name.
    pub column: String,
    pub direction: Direction,
    #[serde(default)]
    pub nulls: Nulls,
}

impl SortKey {
    /// Ascending key with default nulls placement.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Asc,
            nulls: Nulls::Default,
        }
    }

    /// Descending key with default nulls placement.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Desc,
            nulls: Nulls::Default,
        }
    }

    /// Put NULLs first.
    pub fn nulls_first(mut self) -> Self {
        self.nulls = Nulls::First;
        self
    }

    /// Put NULLs last.
    pub fn nulls_last(mut self) -> Self {
        self.nulls = Nulls::Last;
        self
    }

    /// Flip direction and swap an explicit nulls placement.
    pub fn reversed(&self) -> SortKey {
        SortKey {
            column: self.column.clone(),
            direction: self.direction.flipped(),
            nulls: match self.nulls {
                Nulls::Default => Nulls::Default,
                Nulls::First => Nulls::Last,
                Nulls::Last => Nulls::First,
            },
        }
    }
}
