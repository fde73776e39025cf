//! Typed column descriptors and value coercion.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RelqError, RelqResult};
use crate::value::Value;

/// Declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrType {
    Bool,
    Int,
    Float,
    Decimal,
    Str,
    Uuid,
    Date,
    Time,
}

impl AttrType {
    /// Type name used in coercion errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Decimal => "Decimal",
            Self::Str => "Str",
            Self::Uuid => "Uuid",
            Self::Date => "Date",
            Self::Time => "Time",
        }
    }

    /// Parse a type keyword as it appears in schema definitions.
    pub fn parse(keyword: &str) -> RelqResult<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Ok(Self::Bool),
            "int" | "integer" | "bigint" => Ok(Self::Int),
            "float" | "double" | "real" => Ok(Self::Float),
            "decimal" | "numeric" => Ok(Self::Decimal),
            "str" | "string" | "text" | "varchar" => Ok(Self::Str),
            "uuid" => Ok(Self::Uuid),
            "date" => Ok(Self::Date),
            "time" | "timestamp" | "datetime" => Ok(Self::Time),
            other => Err(RelqError::InvalidArgument(format!(
                "unknown attribute type '{other}'"
            ))),
        }
    }
}

/// One typed, named column descriptor within a schema.
///
/// Immutable once constructed; the `with_*` builders return modified copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Canonical column name in the underlying source.
    pub name: String,
    /// Declared type, drives coercion.
    pub ty: AttrType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    /// Qualification: the relation this attribute originates from.
    #[serde(default)]
    pub source: Option<String>,
    /// Output alias set by rename/prefix transforms.
    #[serde(default)]
    pub alias: Option<String>,
    /// SQL expression override for computed columns.
    #[serde(default)]
    pub expr: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl Attribute {
    /// Create a nullable attribute of the given type.
    pub fn new(name: impl Into<String>, ty: AttrType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: true,
            primary_key: false,
            source: None,
            alias: None,
            expr: None,
        }
    }

    /// Mark NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Mark as (part of) the primary key. Implies NOT NULL.
    pub fn primary(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Qualify with a source relation name.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the output alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set a SQL expression override.
    pub fn with_expr(mut self, expr: impl Into<String>) -> Self {
        self.expr = Some(expr.into());
        self
    }

    /// Name this attribute is exposed under in the current projection.
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Source-qualified name, `"<source>.<name>"` when qualified.
    pub fn qualified_name(&self) -> String {
        match &self.source {
            Some(q) => format!("{}.{}", q, self.name),
            None => self.name.clone(),
        }
    }

    /// Coerce a raw value into this attribute's declared type.
    ///
    /// Pure: the same input always maps to the same output. Arrays coerce
    /// element-wise (IN lists, composite keys).
    pub fn coerce(&self, raw: Value) -> RelqResult<Value> {
        match raw {
            Value::Null => {
                if self.nullable {
                    Ok(Value::Null)
                } else {
                    Err(RelqError::coercion(
                        &Value::Null,
                        self.ty.name(),
                        format!("attribute '{}' is not nullable", self.output_name()),
                    ))
                }
            }
            Value::Array(items) => {
                let coerced = items
                    .into_iter()
                    .map(|v| self.coerce(v))
                    .collect::<RelqResult<Vec<_>>>()?;
                Ok(Value::Array(coerced))
            }
            other => coerce_scalar(other, self.ty),
        }
    }
}

fn coerce_scalar(value: Value, target: AttrType) -> RelqResult<Value> {
    use AttrType as T;
    match (value, target) {
        (v @ Value::Bool(_), T::Bool) => Ok(v),
        (v @ Value::Int(_), T::Int) => Ok(v),
        (v @ Value::Float(_), T::Float) => Ok(v),
        (v @ Value::Decimal(_), T::Decimal) => Ok(v),
        (v @ Value::Str(_), T::Str) => Ok(v),
        (v @ Value::Uuid(_), T::Uuid) => Ok(v),
        (v @ Value::Date(_), T::Date) => Ok(v),
        (v @ Value::Time(_), T::Time) => Ok(v),

        // Numeric widening.
        (Value::Int(n), T::Float) => Ok(Value::Float(n as f64)),
        (Value::Int(n), T::Decimal) => Ok(Value::Decimal(Decimal::from(n))),
        (Value::Float(n), T::Decimal) => Decimal::from_f64(n)
            .map(Value::Decimal)
            .ok_or_else(|| coercion_err(&Value::Float(n), target, "not representable")),

        // String parsing.
        (Value::Str(s), T::Int) => s
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| coercion_err(&Value::Str(s), target, e.to_string())),
        (Value::Str(s), T::Float) => s
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| coercion_err(&Value::Str(s), target, e.to_string())),
        (Value::Str(s), T::Decimal) => s
            .parse::<Decimal>()
            .map(Value::Decimal)
            .map_err(|e| coercion_err(&Value::Str(s), target, e.to_string())),
        (Value::Str(s), T::Uuid) => Uuid::parse_str(&s)
            .map(Value::Uuid)
            .map_err(|e| coercion_err(&Value::Str(s), target, e.to_string())),
        (Value::Str(s), T::Date) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|e| coercion_err(&Value::Str(s), target, e.to_string())),
        (Value::Str(s), T::Time) => DateTime::parse_from_rfc3339(&s)
            .map(|t| Value::Time(t.with_timezone(&Utc)))
            .map_err(|e| coercion_err(&Value::Str(s), target, e.to_string())),
        (Value::Str(s), T::Bool) => match s.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(coercion_err(&Value::Str(s), target, "expected true/false")),
        },

        (value, target) => {
            let reason = format!("no conversion from {}", value.type_name());
            Err(coercion_err(&value, target, reason))
        }
    }
}

fn coercion_err(value: &Value, target: AttrType, reason: impl Into<String>) -> RelqError {
    RelqError::coercion(value, target.name(), reason)
}
