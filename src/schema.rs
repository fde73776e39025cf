//! Relation schemas: ordered typed attributes, projection algebra and the
//! closure DSL entry points.
//!
//! # Example
//! ```
//! use relq::schema::Schema;
//!
//! let json = r#"{
//!     "relation": "users",
//!     "attributes": [
//!         { "name": "id", "type": "int", "nullable": false, "primary_key": true },
//!         { "name": "email", "type": "varchar", "nullable": false }
//!     ]
//! }"#;
//!
//! let schema = Schema::from_json(json).unwrap();
//! assert!(schema.contains("email"));
//! ```

use serde::{Deserialize, Serialize};
use strsim::levenshtein;

use crate::attribute::{AttrType, Attribute};
use crate::error::{RelqError, RelqResult};
use crate::expr::predicate::Predicate;
use crate::expr::projection::{AggregateExpr, AggregateFn, FunctionExpr, Projection};
use crate::expr::scope::{AttrExpr, FunctionCatalog, Scope};
use crate::expr::sort::SortKey;
use crate::value::Value;

/// One selectable column: a name resolved against the schema, a fully
/// formed attribute, or a computed projection from the closure DSL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Selector {
    Name(String),
    Attr(Attribute),
    Expr(Projection),
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Selector::Name(name.to_string())
    }
}

impl From<String> for Selector {
    fn from(name: String) -> Self {
        Selector::Name(name)
    }
}

impl From<Attribute> for Selector {
    fn from(attr: Attribute) -> Self {
        Selector::Attr(attr)
    }
}

impl From<Projection> for Selector {
    fn from(projection: Projection) -> Self {
        Selector::Expr(projection)
    }
}

impl From<AggregateExpr> for Selector {
    fn from(agg: AggregateExpr) -> Self {
        Selector::Expr(Projection::Aggregate(agg))
    }
}

impl From<FunctionExpr> for Selector {
    fn from(func: FunctionExpr) -> Self {
        Selector::Expr(Projection::Function(func))
    }
}

impl From<AttrExpr> for Selector {
    fn from(expr: AttrExpr) -> Self {
        Selector::Attr(expr.attribute().clone())
    }
}

/// Ordered, typed attribute set of one relation.
///
/// Schemas are immutable: every transform returns a new schema and leaves
/// the receiver untouched, so relations can share them freely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Canonical relation name.
    pub relation: String,
    pub attributes: Vec<Attribute>,
    /// Functions resolvable inside restriction/order/group closures.
    #[serde(default)]
    pub functions: FunctionCatalog,
}

impl Schema {
    /// Create an empty schema for the named relation.
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            attributes: Vec::new(),
            functions: FunctionCatalog::standard(),
        }
    }

    /// Builder: append an attribute.
    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.attributes.push(attr);
        self
    }

    /// Builder: replace the function catalog.
    pub fn with_functions(mut self, functions: FunctionCatalog) -> Self {
        self.functions = functions;
        self
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    /// Output names in attribute order.
    pub fn names(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.output_name()).collect()
    }

    /// Attributes flagged as (part of) the primary key, in order.
    pub fn primary_key(&self) -> Vec<&Attribute> {
        self.attributes.iter().filter(|a| a.primary_key).collect()
    }

    /// True when a name resolves to an attribute, by output name first,
    /// then by underlying column name.
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.attributes
            .iter()
            .position(|a| a.output_name() == name)
            .or_else(|| self.attributes.iter().position(|a| a.name == name))
    }

    /// Look up an attribute; unknown names fail with a did-you-mean
    /// suggestion.
    pub fn attr(&self, name: &str) -> RelqResult<&Attribute> {
        match self.index_of(name) {
            Some(idx) => Ok(&self.attributes[idx]),
            None => {
                let suggestion =
                    did_you_mean(name, self.attributes.iter().map(|a| a.output_name()));
                Err(RelqError::unknown_attribute(name, &self.relation, suggestion))
            }
        }
    }

    /// Narrow to exactly the selected attributes, in selection order.
    /// Aggregate and function projections synthesize attributes under
    /// their output names.
    pub fn project(&self, selectors: &[Selector]) -> RelqResult<Schema> {
        let mut attributes = Vec::with_capacity(selectors.len());
        for selector in selectors {
            attributes.push(self.resolve_selector(selector)?);
        }
        Ok(Schema {
            relation: self.relation.clone(),
            attributes,
            functions: self.functions.clone(),
        })
    }

    fn resolve_selector(&self, selector: &Selector) -> RelqResult<Attribute> {
        match selector {
            Selector::Name(name) => Ok(self.attr(name)?.clone()),
            Selector::Attr(attr) => Ok(attr.clone()),
            Selector::Expr(projection) => Ok(self.synthesize(projection)),
        }
    }

    fn synthesize(&self, projection: &Projection) -> Attribute {
        match projection {
            Projection::Attr(attr) => attr.clone(),
            Projection::Aggregate(agg) => {
                let ty = self.aggregate_type(agg);
                let attr = Attribute::new(agg.output_name(), ty);
                if agg.func == AggregateFn::Count {
                    attr.not_null()
                } else {
                    attr
                }
            }
            Projection::Function(func) => {
                Attribute::new(func.output_name(), func.ty.unwrap_or(AttrType::Str))
            }
        }
    }

    fn aggregate_type(&self, agg: &AggregateExpr) -> AttrType {
        let column_ty = agg
            .column
            .as_deref()
            .and_then(|c| self.index_of(c))
            .map(|idx| self.attributes[idx].ty);
        match agg.func {
            AggregateFn::Count => AttrType::Int,
            AggregateFn::Avg => match column_ty {
                Some(AttrType::Decimal) => AttrType::Decimal,
                _ => AttrType::Float,
            },
            AggregateFn::Sum | AggregateFn::Min | AggregateFn::Max => {
                column_ty.unwrap_or(AttrType::Float)
            }
        }
    }

    /// Attribute union. Keeps this schema's attributes and order, then
    /// appends the other's; on output-name collision the left attribute
    /// wins. Function catalogs merge the same way.
    pub fn merge(&self, other: &Schema) -> Schema {
        let mut merged = self.clone();
        for attr in &other.attributes {
            if !merged.contains(attr.output_name()) {
                merged.attributes.push(attr.clone());
            }
        }
        for decl in other.functions.iter() {
            if merged.functions.lookup(&decl.name).is_none() {
                merged.functions.register(decl.name.clone(), decl.ty);
            }
        }
        merged
    }

    /// Set output aliases, leaving underlying column names untouched.
    pub fn rename(&self, pairs: &[(&str, &str)]) -> RelqResult<Schema> {
        let mut renamed = self.clone();
        for (old, new) in pairs {
            match renamed.index_of(old) {
                Some(idx) => renamed.attributes[idx].alias = Some((*new).to_string()),
                None => {
                    let suggestion =
                        did_you_mean(old, renamed.attributes.iter().map(|a| a.output_name()));
                    return Err(RelqError::unknown_attribute(
                        *old,
                        &renamed.relation,
                        suggestion,
                    ));
                }
            }
        }
        Ok(renamed)
    }

    /// Alias every attribute as `"<prefix>_<column>"`.
    pub fn prefix(&self, prefix: &str) -> Schema {
        let mut prefixed = self.clone();
        for attr in &mut prefixed.attributes {
            attr.alias = Some(format!("{}_{}", prefix, attr.name));
        }
        prefixed
    }

    /// Namespace unqualified attributes with this relation's name.
    /// Attributes already carrying a source (merged in from a join) keep
    /// theirs.
    pub fn qualify(&self) -> Schema {
        let mut qualified = self.clone();
        for attr in &mut qualified.attributes {
            if attr.source.is_none() {
                attr.source = Some(qualified.relation.clone());
            }
        }
        qualified
    }

    /// Source-qualified column names in attribute order.
    pub fn qualified_columns(&self) -> Vec<String> {
        self.qualify()
            .attributes
            .iter()
            .map(|a| a.qualified_name())
            .collect()
    }

    /// Run a closure against this schema's name-resolution scope.
    pub fn with_scope<T, F>(&self, f: F) -> RelqResult<T>
    where
        F: FnOnce(&Scope) -> RelqResult<T>,
    {
        f(&Scope::new(self))
    }

    /// Build a restriction predicate through the closure DSL.
    pub fn restriction<F>(&self, f: F) -> RelqResult<Predicate>
    where
        F: FnOnce(&Scope) -> RelqResult<Predicate>,
    {
        self.with_scope(f)
    }

    /// Build sort keys through the closure DSL.
    pub fn order<F>(&self, f: F) -> RelqResult<Vec<SortKey>>
    where
        F: FnOnce(&Scope) -> RelqResult<Vec<SortKey>>,
    {
        self.with_scope(f)
    }

    /// Build grouping projections through the closure DSL.
    pub fn group<F>(&self, f: F) -> RelqResult<Vec<Projection>>
    where
        F: FnOnce(&Scope) -> RelqResult<Vec<Projection>>,
    {
        self.with_scope(f)
    }

    /// Coerce condition pairs. Keys resolving to an attribute are
    /// canonicalized to the underlying column name and their values
    /// coerced (arrays element-wise); unresolvable keys pass through
    /// untouched for the backend to interpret.
    pub fn coerce_conditions(
        &self,
        pairs: Vec<(String, Value)>,
    ) -> RelqResult<Vec<(String, Value)>> {
        pairs
            .into_iter()
            .map(|(key, value)| match self.index_of(&key) {
                Some(idx) => {
                    let attr = &self.attributes[idx];
                    Ok((attr.name.clone(), attr.coerce(value)?))
                }
                None => Ok((key, value)),
            })
            .collect()
    }

    /// Load a schema from JSON with type keywords (`"int"`, `"varchar"`,
    /// `"timestamp"`, ...).
    pub fn from_json(json: &str) -> RelqResult<Schema> {
        let def: SchemaDef = serde_json::from_str(json)
            .map_err(|e| RelqError::InvalidArgument(format!("invalid schema JSON: {e}")))?;
        def.build()
    }
}

/// JSON schema definition with textual type keywords.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaDef {
    relation: String,
    attributes: Vec<AttributeDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AttributeDef {
    name: String,
    #[serde(rename = "type", alias = "typ")]
    typ: String,
    #[serde(default = "default_true")]
    nullable: bool,
    #[serde(default)]
    primary_key: bool,
}

fn default_true() -> bool {
    true
}

impl SchemaDef {
    fn build(self) -> RelqResult<Schema> {
        let mut schema = Schema::new(self.relation);
        for def in self.attributes {
            let mut attr = Attribute::new(def.name, AttrType::parse(&def.typ)?);
            attr.nullable = def.nullable;
            if def.primary_key {
                attr = attr.primary();
            }
            schema.attributes.push(attr);
        }
        Ok(schema)
    }
}

/// Find the closest candidate within a length-scaled Levenshtein
/// threshold.
pub(crate) fn did_you_mean<'a, I>(input: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best_match = None;
    let mut min_dist = usize::MAX;

    for cand in candidates {
        let dist = levenshtein(input, cand);

        let threshold = match input.len() {
            0..=2 => 0,
            3..=5 => 2,
            _ => 3,
        };

        if dist <= threshold && dist < min_dist {
            min_dist = dist;
            best_match = Some(cand.to_string());
        }
    }

    best_match
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn users() -> Schema {
        Schema::new("users")
            .attribute(Attribute::new("id", AttrType::Int).primary())
            .attribute(Attribute::new("name", AttrType::Str).not_null())
            .attribute(Attribute::new("email", AttrType::Str))
            .attribute(Attribute::new("age", AttrType::Int))
    }

    #[test]
    fn test_project_keeps_selection_order() {
        let schema = users();
        let projected = schema
            .project(&[Selector::from("email"), Selector::from("id")])
            .unwrap();
        assert_eq!(projected.names(), vec!["email", "id"]);
        assert_eq!(projected.attributes[1].ty, AttrType::Int);
    }

    #[test]
    fn test_project_is_idempotent() {
        let schema = users();
        let selectors = [Selector::from("id"), Selector::from("name")];
        let once = schema.project(&selectors).unwrap();
        let twice = once.project(&selectors).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_project_unknown_name_suggests() {
        let schema = users();
        let err = schema.project(&[Selector::from("emial")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown attribute 'emial' on relation 'users'. Did you mean 'email'?"
        );
    }

    #[test]
    fn test_project_synthesizes_aggregate_attributes() {
        let schema = users();
        let projected = schema
            .project(&[
                Selector::from("name"),
                Selector::from(AggregateExpr::count()),
                Selector::from(AggregateExpr::avg("age")),
            ])
            .unwrap();
        assert_eq!(projected.names(), vec!["name", "count", "avg"]);
        assert_eq!(projected.attributes[1].ty, AttrType::Int);
        assert!(!projected.attributes[1].nullable);
        assert_eq!(projected.attributes[2].ty, AttrType::Float);
    }

    #[test]
    fn test_merge_left_wins_on_collision() {
        let left = users();
        let right = Schema::new("accounts")
            .attribute(Attribute::new("id", AttrType::Uuid))
            .attribute(Attribute::new("balance", AttrType::Decimal));
        let merged = left.merge(&right);
        assert_eq!(merged.names(), vec!["id", "name", "email", "age", "balance"]);
        assert_eq!(merged.attr("id").unwrap().ty, AttrType::Int);
    }

    #[test]
    fn test_rename_sets_alias_and_keeps_column() {
        let schema = users();
        let renamed = schema.rename(&[("email", "contact")]).unwrap();
        assert!(renamed.contains("contact"));
        assert_eq!(renamed.attr("contact").unwrap().name, "email");
        assert!(schema.contains("email"));
    }

    #[test]
    fn test_rename_unknown_name_fails() {
        let err = users().rename(&[("emial", "contact")]).unwrap_err();
        assert!(err.to_string().contains("Did you mean 'email'?"));
    }

    #[test]
    fn test_prefix_aliases_every_attribute() {
        let prefixed = users().prefix("user");
        assert_eq!(
            prefixed.names(),
            vec!["user_id", "user_name", "user_email", "user_age"]
        );
        assert_eq!(prefixed.attr("user_id").unwrap().name, "id");
    }

    #[test]
    fn test_qualify_fills_missing_sources() {
        let schema = users().qualify();
        assert_eq!(schema.attr("id").unwrap().source.as_deref(), Some("users"));
        assert_eq!(
            schema.qualified_columns()[0..2],
            ["users.id".to_string(), "users.name".to_string()]
        );
    }

    #[test]
    fn test_coerce_conditions_canonicalizes_and_passes_unknown_through() {
        let schema = users().rename(&[("email", "contact")]).unwrap();
        let pairs = vec![
            ("contact".to_string(), Value::from("a@b.c")),
            ("age".to_string(), Value::from("33")),
            ("lower(name)".to_string(), Value::from("ada")),
        ];
        let coerced = schema.coerce_conditions(pairs).unwrap();
        assert_eq!(coerced[0].0, "email");
        assert_eq!(coerced[1], ("age".to_string(), Value::Int(33)));
        assert_eq!(coerced[2].0, "lower(name)");
    }

    #[test]
    fn test_from_json_parses_type_keywords() {
        let json = r#"{
            "relation": "orders",
            "attributes": [
                { "name": "id", "type": "uuid", "nullable": false, "primary_key": true },
                { "name": "total", "type": "decimal" },
                { "name": "placed_at", "type": "timestamp" }
            ]
        }"#;
        let schema = Schema::from_json(json).unwrap();
        assert_eq!(schema.relation, "orders");
        assert_eq!(schema.attr("id").unwrap().ty, AttrType::Uuid);
        assert!(schema.attr("id").unwrap().primary_key);
        assert_eq!(schema.attr("total").unwrap().ty, AttrType::Decimal);
        assert_eq!(schema.attr("placed_at").unwrap().ty, AttrType::Time);
    }

    #[test]
    fn test_schema_serde_round_trip() {
        let schema = users().rename(&[("email", "contact")]).unwrap();
        let json = serde_json::to_string(&schema).unwrap();
        let back: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn test_primary_key_collects_flagged_in_order() {
        let schema = Schema::new("memberships")
            .attribute(Attribute::new("user_id", AttrType::Int).primary())
            .attribute(Attribute::new("group_id", AttrType::Int).primary())
            .attribute(Attribute::new("role", AttrType::Str));
        let pk: Vec<&str> = schema.primary_key().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(pk, vec!["user_id", "group_id"]);
    }
}
