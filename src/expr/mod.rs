pub mod predicate;
pub mod projection;
pub mod scope;
pub mod sort;

pub use self::predicate::{CmpOp, Predicate};
pub use self::projection::{AggregateExpr, AggregateFn, FunctionExpr, Operand, Projection};
pub use self::scope::{AttrExpr, FunctionCatalog, FunctionDecl, Resolved, Scope};
pub use self::sort::{Direction, Nulls, SortKey};
