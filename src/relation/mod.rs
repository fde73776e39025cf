//! Relations: immutable, composable views over a gateway-backed dataset.
//!
//! Every builder method takes `&self` and returns a fresh relation; the
//! receiver is never touched, so a base relation can be shared across
//! threads and specialized independently. Materialization happens only in
//! the terminal reads, which hand the accumulated query to the gateway.

use std::sync::Arc;

use crate::association::AssociationSet;
use crate::error::{RelqError, RelqResult};
use crate::expr::predicate::{CmpOp, Predicate};
use crate::expr::projection::{AggregateExpr, Projection};
use crate::expr::scope::Scope;
use crate::expr::sort::SortKey;
use crate::gateway::{Gateway, Row};
use crate::query::{JoinClause, JoinKind, Query};
use crate::schema::{Schema, Selector};
use crate::value::Value;

#[cfg(test)]
mod tests;

/// What a join call points at.
#[derive(Debug)]
pub enum JoinTarget<'a> {
    /// Association name resolved through the association set.
    Name(&'a str),
    /// Another relation, resolved via its canonical name.
    Relation(&'a Relation),
    /// Explicit target and key pairs, bypassing association lookup.
    On {
        target: String,
        keys: Vec<(String, String)>,
    },
}

impl JoinTarget<'_> {
    /// Explicit join condition on `(source column, target column)` pairs.
    pub fn on<T, K>(target: T, keys: impl IntoIterator<Item = (K, K)>) -> Self
    where
        T: Into<String>,
        K: Into<String>,
    {
        JoinTarget::On {
            target: target.into(),
            keys: keys
                .into_iter()
                .map(|(l, r)| (l.into(), r.into()))
                .collect(),
        }
    }
}

impl<'a> From<&'a str> for JoinTarget<'a> {
    fn from(name: &'a str) -> Self {
        JoinTarget::Name(name)
    }
}

impl<'a> From<&'a Relation> for JoinTarget<'a> {
    fn from(relation: &'a Relation) -> Self {
        JoinTarget::Relation(relation)
    }
}

/// UNION behavior knobs.
#[derive(Debug, Clone, Default)]
pub struct UnionOpts {
    /// Keep duplicates (UNION ALL).
    pub all: bool,
    /// Alias for the derived source when `from_self` is set.
    pub alias: Option<String>,
    /// Wrap the combination as a derived sub-query.
    pub from_self: bool,
}

impl UnionOpts {
    /// UNION ALL.
    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }
}

/// An immutable view over one relation of a gateway.
#[derive(Debug, Clone)]
pub struct Relation {
    name: String,
    schema: Schema,
    query: Query,
    associations: Arc<AssociationSet>,
    gateway: Arc<dyn Gateway>,
}

impl Relation {
    /// Root relation over the schema's canonical table.
    pub fn new(
        schema: Schema,
        associations: Arc<AssociationSet>,
        gateway: Arc<dyn Gateway>,
    ) -> Self {
        let name = schema.relation.clone();
        let query = Query::table(&name);
        Self {
            name,
            schema,
            query,
            associations,
            gateway,
        }
    }

    /// Canonical relation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The accumulated query AST.
    pub fn query(&self) -> &Query {
        &self.query
    }

    fn derive(&self, schema: Schema, query: Query) -> Relation {
        Relation {
            name: self.name.clone(),
            schema,
            query,
            associations: Arc::clone(&self.associations),
            gateway: Arc::clone(&self.gateway),
        }
    }

    // --- projection -------------------------------------------------

    /// Narrow the projection to the given selectors, in order.
    pub fn select<S>(&self, selectors: impl IntoIterator<Item = S>) -> RelqResult<Relation>
    where
        S: Into<Selector>,
    {
        let selectors: Vec<Selector> = selectors.into_iter().map(Into::into).collect();
        let schema = self.schema.project(&selectors)?;
        let projections = self.selector_projections(&selectors)?;
        Ok(self.derive(schema, self.query.selected(projections)))
    }

    /// Alias for `select`.
    pub fn project<S>(&self, selectors: impl IntoIterator<Item = S>) -> RelqResult<Relation>
    where
        S: Into<Selector>,
    {
        self.select(selectors)
    }

    /// Closure form of `select`.
    pub fn select_with<F>(&self, f: F) -> RelqResult<Relation>
    where
        F: FnOnce(&Scope) -> RelqResult<Vec<Projection>>,
    {
        let projections = self.schema.with_scope(f)?;
        let selectors: Vec<Selector> = projections.into_iter().map(Selector::Expr).collect();
        self.select(selectors)
    }

    /// Append selectors to the current projection; on output-name
    /// collision the existing attribute wins.
    pub fn select_append<S>(
        &self,
        selectors: impl IntoIterator<Item = S>,
    ) -> RelqResult<Relation>
    where
        S: Into<Selector>,
    {
        let selectors: Vec<Selector> = selectors.into_iter().map(Into::into).collect();
        let appended = self.schema.project(&selectors)?;
        let schema = self.schema.merge(&appended);

        let mut projections = self.current_projections();
        let mut seen: Vec<String> = self.schema.names().iter().map(|n| n.to_string()).collect();
        for (selector, attr) in selectors.iter().zip(appended.attributes.iter()) {
            let name = attr.output_name();
            if !seen.iter().any(|s| s == name) {
                seen.push(name.to_string());
                projections.push(self.selector_projection(selector)?);
            }
        }
        Ok(self.derive(schema, self.query.selected(projections)))
    }

    /// Closure form of `select_append`.
    pub fn select_append_with<F>(&self, f: F) -> RelqResult<Relation>
    where
        F: FnOnce(&Scope) -> RelqResult<Vec<Projection>>,
    {
        let projections = self.schema.with_scope(f)?;
        let selectors: Vec<Selector> = projections.into_iter().map(Selector::Expr).collect();
        self.select_append(selectors)
    }

    fn selector_projections(&self, selectors: &[Selector]) -> RelqResult<Vec<Projection>> {
        selectors
            .iter()
            .map(|s| self.selector_projection(s))
            .collect()
    }

    fn selector_projection(&self, selector: &Selector) -> RelqResult<Projection> {
        match selector {
            Selector::Name(name) => Ok(Projection::Attr(self.schema.attr(name)?.clone())),
            Selector::Attr(attr) => Ok(Projection::Attr(attr.clone())),
            Selector::Expr(projection) => Ok(projection.clone()),
        }
    }

    /// Current projection list; an unprojected relation projects every
    /// schema attribute.
    fn current_projections(&self) -> Vec<Projection> {
        if self.query.projections.is_empty() {
            self.schema
                .iter()
                .map(|a| Projection::Attr(a.clone()))
                .collect()
        } else {
            self.query.projections.clone()
        }
    }

    // --- restriction ------------------------------------------------

    /// AND value-pair conditions into the restriction. Values coerce
    /// through the schema; arrays become IN lists, NULL becomes IS NULL.
    pub fn filter<I, K, V>(&self, pairs: I) -> RelqResult<Relation>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        match self.pairs_predicate(pairs)? {
            Some(pred) => Ok(self.derive(self.schema.clone(), self.query.filtered(pred))),
            None => Ok(self.clone()),
        }
    }

    /// AND a closure-built predicate into the restriction.
    pub fn filter_with<F>(&self, f: F) -> RelqResult<Relation>
    where
        F: FnOnce(&Scope) -> RelqResult<Predicate>,
    {
        let pred = self.schema.restriction(f)?;
        Ok(self.derive(self.schema.clone(), self.query.filtered(pred)))
    }

    /// Pair conditions first, then the closure predicate.
    pub fn filter_both<I, K, V, F>(&self, pairs: I, f: F) -> RelqResult<Relation>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
        F: FnOnce(&Scope) -> RelqResult<Predicate>,
    {
        self.filter(pairs)?.filter_with(f)
    }

    /// AND value-pair conditions into the grouped-result restriction.
    pub fn having<I, K, V>(&self, pairs: I) -> RelqResult<Relation>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        match self.pairs_predicate(pairs)? {
            Some(pred) => Ok(self.derive(self.schema.clone(), self.query.having_also(pred))),
            None => Ok(self.clone()),
        }
    }

    /// Closure form of `having`.
    pub fn having_with<F>(&self, f: F) -> RelqResult<Relation>
    where
        F: FnOnce(&Scope) -> RelqResult<Predicate>,
    {
        let pred = self.schema.restriction(f)?;
        Ok(self.derive(self.schema.clone(), self.query.having_also(pred)))
    }

    /// Pair conditions first, then the closure predicate, both HAVING.
    pub fn having_both<I, K, V, F>(&self, pairs: I, f: F) -> RelqResult<Relation>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
        F: FnOnce(&Scope) -> RelqResult<Predicate>,
    {
        self.having(pairs)?.having_with(f)
    }

    /// AND the negation of the pair conditions into the restriction.
    pub fn exclude<I, K, V>(&self, pairs: I) -> RelqResult<Relation>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        match self.pairs_predicate(pairs)? {
            Some(pred) => Ok(self.derive(
                self.schema.clone(),
                self.query.filtered(pred.negate()),
            )),
            None => Ok(self.clone()),
        }
    }

    /// Closure form of `exclude`.
    pub fn exclude_with<F>(&self, f: F) -> RelqResult<Relation>
    where
        F: FnOnce(&Scope) -> RelqResult<Predicate>,
    {
        let pred = self.schema.restriction(f)?;
        Ok(self.derive(
            self.schema.clone(),
            self.query.filtered(pred.negate()),
        ))
    }

    /// Negate the accumulated WHERE and HAVING. Inverting an
    /// unrestricted relation yields one matching no rows.
    pub fn invert(&self) -> Relation {
        self.derive(self.schema.clone(), self.query.inverted())
    }

    fn pairs_predicate<I, K, V>(&self, pairs: I) -> RelqResult<Option<Predicate>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let pairs: Vec<(String, Value)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if pairs.is_empty() {
            return Ok(None);
        }
        let coerced = self.schema.coerce_conditions(pairs)?;
        let mut pred: Option<Predicate> = None;
        for (column, value) in coerced {
            let next = match value {
                Value::Null => Predicate::cmp(column, CmpOp::IsNull, Value::Null),
                array @ Value::Array(_) => Predicate::cmp(column, CmpOp::In, array),
                scalar => Predicate::cmp(column, CmpOp::Eq, scalar),
            };
            pred = Some(Predicate::append(pred.take(), next));
        }
        Ok(pred)
    }

    // --- ordering ---------------------------------------------------

    /// Order ascending by the given selectors, replacing any previous
    /// ordering.
    pub fn order<S>(&self, selectors: impl IntoIterator<Item = S>) -> RelqResult<Relation>
    where
        S: Into<Selector>,
    {
        let mut keys = Vec::new();
        for selector in selectors {
            keys.push(self.selector_sort_key(&selector.into())?);
        }
        Ok(self.derive(self.schema.clone(), self.query.ordered(keys)))
    }

    /// Closure form of `order`, for full `(column, direction, nulls)`
    /// keys.
    pub fn order_with<F>(&self, f: F) -> RelqResult<Relation>
    where
        F: FnOnce(&Scope) -> RelqResult<Vec<SortKey>>,
    {
        let keys = self.schema.order(f)?;
        Ok(self.derive(self.schema.clone(), self.query.ordered(keys)))
    }

    /// Flip every sort key's direction without reordering the keys.
    pub fn reverse(&self) -> Relation {
        self.derive(self.schema.clone(), self.query.reversed())
    }

    fn selector_sort_key(&self, selector: &Selector) -> RelqResult<SortKey> {
        match selector {
            Selector::Name(name) => Ok(SortKey::asc(&self.schema.attr(name)?.name)),
            Selector::Attr(attr) => Ok(SortKey::asc(&attr.name)),
            Selector::Expr(projection) => Ok(SortKey::asc(projection.output_name())),
        }
    }

    // --- grouping ---------------------------------------------------

    /// Group by the given selectors, replacing any previous grouping.
    pub fn group<S>(&self, selectors: impl IntoIterator<Item = S>) -> RelqResult<Relation>
    where
        S: Into<Selector>,
    {
        let keys = self.group_keys(selectors)?;
        Ok(self.derive(self.schema.clone(), self.query.grouped(keys)))
    }

    /// Explicit grouping columns first, then closure-derived keys.
    pub fn group_with<S, F>(
        &self,
        selectors: impl IntoIterator<Item = S>,
        f: F,
    ) -> RelqResult<Relation>
    where
        S: Into<Selector>,
        F: FnOnce(&Scope) -> RelqResult<Vec<Projection>>,
    {
        let mut keys = self.group_keys(selectors)?;
        keys.extend(self.schema.group(f)?);
        Ok(self.derive(self.schema.clone(), self.query.grouped(keys)))
    }

    /// Append grouping keys to the existing grouping.
    pub fn group_append<S>(
        &self,
        selectors: impl IntoIterator<Item = S>,
    ) -> RelqResult<Relation>
    where
        S: Into<Selector>,
    {
        let keys = self.group_keys(selectors)?;
        Ok(self.derive(self.schema.clone(), self.query.grouped_also(keys)))
    }

    /// Group by the keys and project them plus `COUNT(*)` as `count`.
    pub fn group_and_count<S>(
        &self,
        selectors: impl IntoIterator<Item = S>,
    ) -> RelqResult<Relation>
    where
        S: Into<Selector>,
    {
        let selectors: Vec<Selector> = selectors.into_iter().map(Into::into).collect();
        let mut projected = selectors.clone();
        projected.push(Selector::from(AggregateExpr::count().aliased("count")));
        self.group(selectors)?.select(projected)
    }

    /// Group by the keys and project exactly those keys.
    pub fn select_group<S>(
        &self,
        selectors: impl IntoIterator<Item = S>,
    ) -> RelqResult<Relation>
    where
        S: Into<Selector>,
    {
        let selectors: Vec<Selector> = selectors.into_iter().map(Into::into).collect();
        self.group(selectors.clone())?.select(selectors)
    }

    fn group_keys<S>(&self, selectors: impl IntoIterator<Item = S>) -> RelqResult<Vec<Projection>>
    where
        S: Into<Selector>,
    {
        selectors
            .into_iter()
            .map(|s| self.selector_projection(&s.into()))
            .collect()
    }

    // --- joins ------------------------------------------------------

    /// Join using the association's stored kind (or INNER for explicit
    /// targets).
    pub fn join<'a>(&self, target: impl Into<JoinTarget<'a>>) -> RelqResult<Relation> {
        self.join_as(target, None)
    }

    pub fn inner_join<'a>(&self, target: impl Into<JoinTarget<'a>>) -> RelqResult<Relation> {
        self.join_as(target, Some(JoinKind::Inner))
    }

    pub fn left_join<'a>(&self, target: impl Into<JoinTarget<'a>>) -> RelqResult<Relation> {
        self.join_as(target, Some(JoinKind::Left))
    }

    pub fn right_join<'a>(&self, target: impl Into<JoinTarget<'a>>) -> RelqResult<Relation> {
        self.join_as(target, Some(JoinKind::Right))
    }

    fn join_as<'a>(
        &self,
        target: impl Into<JoinTarget<'a>>,
        forced: Option<JoinKind>,
    ) -> RelqResult<Relation> {
        let clause = match target.into() {
            JoinTarget::Name(name) => self
                .associations
                .lookup(&self.name, name)?
                .join_clause(forced)?,
            JoinTarget::Relation(relation) => self
                .associations
                .lookup(&self.name, relation.name())?
                .join_clause(forced)?,
            JoinTarget::On { target, keys } => {
                if keys.is_empty() {
                    return Err(RelqError::InvalidArgument(
                        "explicit join requires at least one key pair".into(),
                    ));
                }
                JoinClause {
                    kind: forced.unwrap_or(JoinKind::Inner),
                    table: target,
                    keys,
                    filter: None,
                }
            }
        };
        Ok(self.derive(self.schema.clone(), self.query.joined(clause)))
    }

    // --- bounds and distinct ----------------------------------------

    pub fn limit(&self, n: u64) -> Relation {
        self.derive(self.schema.clone(), self.query.bounded(n))
    }

    pub fn offset(&self, n: u64) -> Relation {
        self.derive(self.schema.clone(), self.query.shifted(n))
    }

    pub fn limit_offset(&self, n: u64, offset: u64) -> Relation {
        self.derive(self.schema.clone(), self.query.bounded(n).shifted(offset))
    }

    /// Deduplicate whole projected rows.
    pub fn distinct(&self) -> Relation {
        self.derive(self.schema.clone(), self.query.made_distinct())
    }

    /// Keep the first row per key tuple.
    pub fn distinct_on<S>(
        &self,
        selectors: impl IntoIterator<Item = S>,
    ) -> RelqResult<Relation>
    where
        S: Into<Selector>,
    {
        let mut columns = Vec::new();
        for selector in selectors {
            columns.push(match selector.into() {
                Selector::Name(name) => self.schema.attr(&name)?.name.clone(),
                Selector::Attr(attr) => attr.name,
                Selector::Expr(projection) => projection.output_name().to_string(),
            });
        }
        Ok(self.derive(self.schema.clone(), self.query.distinct_on(columns)))
    }

    // --- set operations ----------------------------------------------

    /// Combine with another relation. Schemas must agree in arity; the
    /// left schema describes the result.
    pub fn union(&self, other: &Relation, opts: UnionOpts) -> RelqResult<Relation> {
        if self.schema.len() != other.schema.len() {
            return Err(RelqError::InvalidArgument(format!(
                "union arity mismatch: {} column(s) vs {}",
                self.schema.len(),
                other.schema.len()
            )));
        }
        let combined = self.query.unioned(other.query.clone(), opts.all);
        let query = if opts.from_self {
            let alias = opts.alias.unwrap_or_else(|| self.name.clone());
            combined.from_self(alias)
        } else {
            combined
        };
        Ok(self.derive(self.schema.clone(), query))
    }

    // --- schema views ------------------------------------------------

    /// Expose attributes under new output names.
    pub fn rename(&self, pairs: &[(&str, &str)]) -> RelqResult<Relation> {
        let schema = self.schema.rename(pairs)?;
        Ok(self.reprojected(schema))
    }

    /// Alias every attribute as `"<prefix>_<column>"`.
    pub fn prefix(&self, prefix: &str) -> Relation {
        self.reprojected(self.schema.prefix(prefix))
    }

    /// Namespace attributes with the relation's canonical name.
    pub fn qualified(&self) -> Relation {
        self.reprojected(self.schema.qualify())
    }

    fn reprojected(&self, schema: Schema) -> Relation {
        let projections: Vec<Projection> = schema
            .iter()
            .map(|a| Projection::Attr(a.clone()))
            .collect();
        self.derive(schema, self.query.selected(projections))
    }

    // --- raw escape hatch ---------------------------------------------

    /// Wrap a raw SQL string. The result carries an empty schema; only
    /// SQL-speaking gateways can materialize it.
    pub fn read(&self, sql: impl Into<String>) -> Relation {
        self.derive(Schema::new(&self.name), Query::raw(sql))
    }

    // --- aggregates ---------------------------------------------------

    pub fn sum(&self, column: &str) -> RelqResult<Value> {
        self.aggregate_on(column, |c| AggregateExpr::sum(c))
    }

    pub fn min(&self, column: &str) -> RelqResult<Value> {
        self.aggregate_on(column, |c| AggregateExpr::min(c))
    }

    pub fn max(&self, column: &str) -> RelqResult<Value> {
        self.aggregate_on(column, |c| AggregateExpr::max(c))
    }

    pub fn avg(&self, column: &str) -> RelqResult<Value> {
        self.aggregate_on(column, |c| AggregateExpr::avg(c))
    }

    fn aggregate_on(
        &self,
        column: &str,
        make: impl FnOnce(String) -> AggregateExpr,
    ) -> RelqResult<Value> {
        let attr = self.schema.attr(column)?;
        let agg = make(attr.output_name().to_string());
        self.gateway.aggregate(&self.query, &agg)
    }

    // --- terminal reads -----------------------------------------------

    /// Restrict by primary key and expect exactly one row. Composite
    /// keys take an array value, matched positionally.
    pub fn fetch(&self, key: impl Into<Value>) -> RelqResult<Row> {
        let pk = self.schema.primary_key();
        if pk.is_empty() {
            return Err(RelqError::InvalidArgument(format!(
                "relation '{}' has no primary key",
                self.name
            )));
        }
        let values = match key.into() {
            Value::Array(items) => items,
            single => vec![single],
        };
        if values.len() != pk.len() {
            return Err(RelqError::InvalidArgument(format!(
                "primary key of '{}' has {} column(s), got {} value(s)",
                self.name,
                pk.len(),
                values.len()
            )));
        }
        let pairs: Vec<(String, Value)> = pk
            .iter()
            .map(|a| a.name.clone())
            .zip(values)
            .collect();
        let mut rows = self.filter(pairs)?.rows()?;
        match rows.len() {
            1 => Ok(rows.remove(0)),
            found => Err(RelqError::TupleCountMismatch { expected: 1, found }),
        }
    }

    /// First row under the current ordering.
    pub fn first(&self) -> RelqResult<Option<Row>> {
        let mut rows = self.limit(1).rows()?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    /// Last row: the reverse of an explicit ordering, otherwise the
    /// final materialized row.
    pub fn last(&self) -> RelqResult<Option<Row>> {
        if self.query.order.is_empty() {
            Ok(self.rows()?.pop())
        } else {
            self.reverse().first()
        }
    }

    /// Row count of the current dataset.
    pub fn count(&self) -> RelqResult<u64> {
        self.gateway.count(&self.query)
    }

    /// Materialize every row.
    pub fn rows(&self) -> RelqResult<Vec<Row>> {
        self.gateway.rows(&self.query)
    }

    /// Materialize and transform each row.
    pub fn map<T, F>(&self, f: F) -> RelqResult<Vec<T>>
    where
        F: FnMut(&Row) -> T,
    {
        Ok(self.rows()?.iter().map(f).collect())
    }

    /// Extract a single column, validated against the schema.
    pub fn pluck(&self, column: &str) -> RelqResult<Vec<Value>> {
        let name = self.schema.attr(column)?.output_name().to_string();
        Ok(self
            .rows()?
            .into_iter()
            .map(|row| row.get(&name).cloned().unwrap_or(Value::Null))
            .collect())
    }

    /// Whether any row matches the conditions.
    pub fn exists<I, K, V>(&self, pairs: I) -> RelqResult<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Ok(self.filter(pairs)?.limit(1).count()? != 0)
    }

    /// Whether no row matches the conditions.
    pub fn is_unique<I, K, V>(&self, pairs: I) -> RelqResult<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Ok(!self.exists(pairs)?)
    }
}
