//! Composable relational queries over typed schemas.
//!
//! Relations are immutable: every builder call returns a new relation,
//! so a base relation can be shared and specialized freely.
//!
//! ```ignore
//! use relq::prelude::*;
//!
//! let adults = users
//!     .select(["id", "name"])?
//!     .filter([("active", true)])?
//!     .order(["name"])?;
//! let rows = adults.rows()?;
//! ```

pub mod association;
pub mod attribute;
pub mod error;
pub mod expr;
pub mod gateway;
pub mod memory;
pub mod query;
pub mod relation;
pub mod schema;
pub mod value;

pub use relation::Relation;

pub mod prelude {
    pub use crate::association::{Association, AssociationSet};
    pub use crate::attribute::{AttrType, Attribute};
    pub use crate::error::{RelqError, RelqResult};
    pub use crate::expr::*;
    pub use crate::gateway::{Gateway, Row};
    pub use crate::memory::MemoryGateway;
    pub use crate::query::{JoinKind, Query};
    pub use crate::relation::{JoinTarget, Relation, UnionOpts};
    pub use crate::schema::{Schema, Selector};
    pub use crate::value::Value;
}
