//! Closure DSL scope: resolves names to typed attribute expressions or
//! registered functions, with a deterministic fallback order.

use serde::{Deserialize, Serialize};

use crate::attribute::{AttrType, Attribute};
use crate::error::RelqResult;
use crate::expr::predicate::{CmpOp, Predicate};
use crate::expr::projection::{FunctionExpr, Projection};
use crate::expr::sort::SortKey;
use crate::schema::Schema;
use crate::value::Value;

/// A function known to the schema, with its declared result type when
/// one is fixed (`None` when the type follows the arguments).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub ty: Option<AttrType>,
}

/// Registry of functions resolvable inside restriction/order/group
/// closures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCatalog {
    functions: Vec<FunctionDecl>,
}

impl FunctionCatalog {
    /// Empty catalog.
    pub fn empty() -> Self {
        Self {
            functions: Vec::new(),
        }
    }

    /// Catalog preloaded with the portable scalar functions.
    pub fn standard() -> Self {
        let mut catalog = Self::empty();
        catalog.register("lower", Some(AttrType::Str));
        catalog.register("upper", Some(AttrType::Str));
        catalog.register("length", Some(AttrType::Int));
        catalog.register("abs", None);
        catalog.register("round", None);
        catalog.register("coalesce", None);
        catalog
    }

    /// Register a function; re-registering a name replaces its entry.
    pub fn register(&mut self, name: impl Into<String>, ty: Option<AttrType>) {
        let name = name.into();
        if let Some(decl) = self.functions.iter_mut().find(|d| d.name == name) {
            decl.ty = ty;
        } else {
            self.functions.push(FunctionDecl { name, ty });
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.iter().find(|d| d.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.functions.iter()
    }
}

impl Default for FunctionCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// A schema attribute inside a closure, with typed comparison builders.
/// Comparison values are coerced through the attribute's type before
/// entering the predicate.
#[derive(Debug, Clone)]
pub struct AttrExpr {
    attr: Attribute,
}

impl AttrExpr {
    pub(crate) fn new(attr: Attribute) -> Self {
        Self { attr }
    }

    /// Canonical (underlying) column name.
    pub fn name(&self) -> &str {
        &self.attr.name
    }

    pub fn attribute(&self) -> &Attribute {
        &self.attr
    }

    /// Re-alias the attribute for projection closures.
    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.attr.alias = Some(alias.into());
        self
    }

    fn coerced(&self, value: impl Into<Value>) -> RelqResult<Value> {
        self.attr.coerce(value.into())
    }

    fn cmp(&self, op: CmpOp, value: Value) -> Predicate {
        Predicate::cmp(self.name(), op, value)
    }

    pub fn eq(&self, value: impl Into<Value>) -> RelqResult<Predicate> {
        Ok(self.cmp(CmpOp::Eq, self.coerced(value)?))
    }

    pub fn ne(&self, value: impl Into<Value>) -> RelqResult<Predicate> {
        Ok(self.cmp(CmpOp::Ne, self.coerced(value)?))
    }

    pub fn gt(&self, value: impl Into<Value>) -> RelqResult<Predicate> {
        Ok(self.cmp(CmpOp::Gt, self.coerced(value)?))
    }

    pub fn gte(&self, value: impl Into<Value>) -> RelqResult<Predicate> {
        Ok(self.cmp(CmpOp::Gte, self.coerced(value)?))
    }

    pub fn lt(&self, value: impl Into<Value>) -> RelqResult<Predicate> {
        Ok(self.cmp(CmpOp::Lt, self.coerced(value)?))
    }

    pub fn lte(&self, value: impl Into<Value>) -> RelqResult<Predicate> {
        Ok(self.cmp(CmpOp::Lte, self.coerced(value)?))
    }

    /// Membership test; every candidate is coerced element-wise.
    pub fn one_of<I, V>(&self, values: I) -> RelqResult<Predicate>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let coerced = values
            .into_iter()
            .map(|v| self.coerced(v))
            .collect::<RelqResult<Vec<_>>>()?;
        Ok(self.cmp(CmpOp::In, Value::Array(coerced)))
    }

    pub fn not_one_of<I, V>(&self, values: I) -> RelqResult<Predicate>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let coerced = values
            .into_iter()
            .map(|v| self.coerced(v))
            .collect::<RelqResult<Vec<_>>>()?;
        Ok(self.cmp(CmpOp::NotIn, Value::Array(coerced)))
    }

    /// Patterns keep their wildcards and skip type coercion.
    pub fn like(&self, pattern: impl Into<String>) -> Predicate {
        self.cmp(CmpOp::Like, Value::Str(pattern.into()))
    }

    pub fn not_like(&self, pattern: impl Into<String>) -> Predicate {
        self.cmp(CmpOp::NotLike, Value::Str(pattern.into()))
    }

    pub fn ilike(&self, pattern: impl Into<String>) -> Predicate {
        self.cmp(CmpOp::ILike, Value::Str(pattern.into()))
    }

    pub fn is_null(&self) -> Predicate {
        self.cmp(CmpOp::IsNull, Value::Null)
    }

    pub fn not_null(&self) -> Predicate {
        self.cmp(CmpOp::IsNotNull, Value::Null)
    }

    pub fn between(
        &self,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> RelqResult<Predicate> {
        let bounds = vec![self.coerced(low)?, self.coerced(high)?];
        Ok(self.cmp(CmpOp::Between, Value::Array(bounds)))
    }

    pub fn not_between(
        &self,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> RelqResult<Predicate> {
        let bounds = vec![self.coerced(low)?, self.coerced(high)?];
        Ok(self.cmp(CmpOp::NotBetween, Value::Array(bounds)))
    }

    /// Ascending sort key over the underlying column.
    pub fn asc(&self) -> SortKey {
        SortKey::asc(self.name())
    }

    /// Descending sort key over the underlying column.
    pub fn desc(&self) -> SortKey {
        SortKey::desc(self.name())
    }
}

impl From<AttrExpr> for Projection {
    fn from(expr: AttrExpr) -> Self {
        Projection::Attr(expr.attr)
    }
}

/// Either side of the resolution fallback.
#[derive(Debug, Clone)]
pub enum Resolved {
    Attr(AttrExpr),
    Function(FunctionExpr),
}

/// Name-resolution scope handed to restriction/order/group closures.
pub struct Scope<'a> {
    schema: &'a Schema,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Typed attribute expression; unknown names get a did-you-mean
    /// suggestion.
    pub fn attr(&self, name: &str) -> RelqResult<AttrExpr> {
        Ok(AttrExpr::new(self.schema.attr(name)?.clone()))
    }

    /// Opaque function-call builder. The catalog supplies the result
    /// type when the function is registered; unregistered names still
    /// build (backends decide whether they exist).
    pub fn function(&self, name: &str) -> FunctionExpr {
        let expr = FunctionExpr::new(name);
        match self.schema.functions.lookup(name).and_then(|d| d.ty) {
            Some(ty) => expr.returns(ty),
            None => expr,
        }
    }

    /// Deterministic fallback: attribute first, then a registered
    /// function, otherwise the attribute lookup error.
    pub fn resolve(&self, name: &str) -> RelqResult<Resolved> {
        match self.schema.attr(name) {
            Ok(attr) => Ok(Resolved::Attr(AttrExpr::new(attr.clone()))),
            Err(_) if self.schema.functions.lookup(name).is_some() => {
                Ok(Resolved::Function(self.function(name)))
            }
            Err(err) => Err(err),
        }
    }
}
