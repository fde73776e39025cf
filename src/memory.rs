//! In-memory gateway, the reference backend the test suites run against.
//!
//! Tables are plain row vectors behind a `RwLock`; mutation happens only
//! through the fixture `insert` API, query evaluation takes read access.
//! The evaluator interprets the query AST directly and never parses SQL,
//! so raw sources are refused.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::error::{RelqError, RelqResult};
use crate::expr::predicate::{CmpOp, Predicate};
use crate::expr::projection::{AggregateExpr, AggregateFn, FunctionExpr, Operand, Projection};
use crate::expr::sort::{Direction, Nulls, SortKey};
use crate::gateway::{Gateway, Row};
use crate::query::{DistinctMode, JoinClause, JoinKind, Query, Source};
use crate::value::Value;

type Tables = HashMap<String, Vec<Row>>;

/// Reference gateway storing rows in process memory.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    tables: RwLock<Tables>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixture API: append one row to a table, creating the table on
    /// first use.
    pub fn insert(&self, table: impl Into<String>, row: Row) -> RelqResult<()> {
        let mut tables = self.write_tables()?;
        tables.entry(table.into()).or_default().push(row);
        Ok(())
    }

    /// Fixture API: append many rows at once.
    pub fn insert_all(&self, table: impl Into<String>, rows: Vec<Row>) -> RelqResult<()> {
        let mut tables = self.write_tables()?;
        tables.entry(table.into()).or_default().extend(rows);
        Ok(())
    }

    fn write_tables(&self) -> RelqResult<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| RelqError::Database("memory gateway lock poisoned".into()))
    }

    fn read_tables(&self) -> RelqResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| RelqError::Database("memory gateway lock poisoned".into()))
    }
}

impl Gateway for MemoryGateway {
    fn rows(&self, query: &Query) -> RelqResult<Vec<Row>> {
        let tables = self.read_tables()?;
        eval_query(&tables, query)
    }

    fn count(&self, query: &Query) -> RelqResult<u64> {
        let tables = self.read_tables()?;
        Ok(eval_query(&tables, query)?.len() as u64)
    }

    fn aggregate(&self, query: &Query, agg: &AggregateExpr) -> RelqResult<Value> {
        let tables = self.read_tables()?;
        let rows = eval_query(&tables, query)?;
        fold_aggregate(&rows, agg)
    }
}

/// Evaluate one query against the table map. Pipeline order: source,
/// joins, restriction, grouping, having, ordering, DISTINCT ON,
/// projection, DISTINCT, union arms, offset, limit.
fn eval_query(tables: &Tables, query: &Query) -> RelqResult<Vec<Row>> {
    let mut rows = source_rows(tables, &query.source)?;

    for join in &query.joins {
        rows = apply_join(tables, rows, join)?;
    }

    if let Some(pred) = &query.restriction {
        rows = filter_rows(rows, pred)?;
    }

    let grouped = !query.group.is_empty() || has_aggregates(&query.projections);
    if grouped {
        rows = apply_grouping(rows, &query.group, &query.projections)?;
    }

    if let Some(pred) = &query.having {
        rows = filter_rows(rows, pred)?;
    }

    sort_rows(&mut rows, &query.order);

    if let DistinctMode::On(columns) = &query.distinct {
        rows = distinct_on(rows, columns);
    }

    let mut rows = project_rows(rows, &query.projections)?;

    if query.distinct == DistinctMode::All {
        rows = dedup_rows(rows);
    }

    for arm in &query.unions {
        let other = eval_query(tables, &arm.query)?;
        rows.extend(other);
        if !arm.all {
            rows = dedup_rows(rows);
        }
    }

    let offset = query.offset.unwrap_or(0) as usize;
    let rows: Vec<Row> = match query.limit {
        Some(limit) => rows.into_iter().skip(offset).take(limit as usize).collect(),
        None => rows.into_iter().skip(offset).collect(),
    };

    Ok(rows)
}

fn source_rows(tables: &Tables, source: &Source) -> RelqResult<Vec<Row>> {
    match source {
        // Tables never inserted into read as empty.
        Source::Table(name) => Ok(tables.get(name).cloned().unwrap_or_default()),
        Source::Raw(_) => Err(RelqError::Database(
            "memory gateway cannot execute raw SQL".into(),
        )),
        Source::Derived { query, .. } => eval_query(tables, query),
    }
}

fn apply_join(tables: &Tables, left: Vec<Row>, clause: &JoinClause) -> RelqResult<Vec<Row>> {
    let right = tables.get(&clause.table).cloned().unwrap_or_default();
    let right_columns = column_union(&right);
    let left_columns = column_union(&left);
    let mut joined = Vec::new();

    match clause.kind {
        JoinKind::Inner | JoinKind::Left => {
            for l in &left {
                let mut matched = false;
                for r in &right {
                    if keys_match(l, r, &clause.keys) {
                        let merged = l.merged(r);
                        if passes_filter(&merged, &clause.filter)? {
                            joined.push(merged);
                            matched = true;
                        }
                    }
                }
                if !matched && clause.kind == JoinKind::Left {
                    joined.push(l.merged(&null_row(&right_columns)));
                }
            }
        }
        JoinKind::Right => {
            for r in &right {
                let mut matched = false;
                for l in &left {
                    if keys_match(l, r, &clause.keys) {
                        let merged = l.merged(r);
                        if passes_filter(&merged, &clause.filter)? {
                            joined.push(merged);
                            matched = true;
                        }
                    }
                }
                if !matched {
                    joined.push(null_row(&left_columns).merged(r));
                }
            }
        }
    }

    Ok(joined)
}

fn passes_filter(row: &Row, filter: &Option<Predicate>) -> RelqResult<bool> {
    match filter {
        Some(pred) => matches(pred, row),
        None => Ok(true),
    }
}

fn keys_match(left: &Row, right: &Row, keys: &[(String, String)]) -> bool {
    keys.iter().all(|(lk, rk)| {
        match (left.get(lk), right.get(rk)) {
            // NULL keys never join.
            (Some(lv), Some(rv)) => lv.sql_eq(rv),
            _ => false,
        }
    })
}

/// Ordered union of the column names appearing in any row.
fn column_union(rows: &[Row]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for (name, _) in row.columns() {
            if !columns.iter().any(|c| c == name) {
                columns.push(name.to_string());
            }
        }
    }
    columns
}

fn null_row(columns: &[String]) -> Row {
    columns
        .iter()
        .map(|c| (c.clone(), Value::Null))
        .collect()
}

fn filter_rows(rows: Vec<Row>, pred: &Predicate) -> RelqResult<Vec<Row>> {
    let mut kept = Vec::new();
    for row in rows {
        if matches(pred, &row)? {
            kept.push(row);
        }
    }
    Ok(kept)
}

fn matches(pred: &Predicate, row: &Row) -> RelqResult<bool> {
    match pred {
        Predicate::Literal(b) => Ok(*b),
        Predicate::And(parts) => {
            for p in parts {
                if !matches(p, row)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Or(parts) => {
            for p in parts {
                if matches(p, row)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Predicate::Not(inner) => Ok(!matches(inner, row)?),
        Predicate::Cmp { left, op, value } => {
            let lhs = eval_operand(left, row)?;
            Ok(cmp_matches(&lhs, *op, value))
        }
    }
}

fn eval_operand(operand: &Operand, row: &Row) -> RelqResult<Value> {
    match operand {
        Operand::Column(name) => Ok(row.get(name).cloned().unwrap_or(Value::Null)),
        Operand::Value(v) => Ok(v.clone()),
        Operand::Function(func) => eval_function(func, row),
    }
}

/// SQL three-valued comparison collapsed to a boolean: anything
/// involving NULL (except the IS NULL forms) is simply not a match.
fn cmp_matches(lhs: &Value, op: CmpOp, rhs: &Value) -> bool {
    match op {
        CmpOp::IsNull => lhs.is_null(),
        CmpOp::IsNotNull => !lhs.is_null(),
        _ if lhs.is_null() => false,
        CmpOp::Eq => lhs.sql_eq(rhs),
        CmpOp::Ne => !rhs.is_null() && !lhs.sql_eq(rhs),
        CmpOp::Gt => ordered_cmp(lhs, rhs) == Some(Ordering::Greater),
        CmpOp::Gte => matches!(
            ordered_cmp(lhs, rhs),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        ),
        CmpOp::Lt => ordered_cmp(lhs, rhs) == Some(Ordering::Less),
        CmpOp::Lte => matches!(
            ordered_cmp(lhs, rhs),
            Some(Ordering::Less) | Some(Ordering::Equal)
        ),
        CmpOp::In => in_list(lhs, rhs),
        CmpOp::NotIn => {
            let items = match rhs {
                Value::Array(items) => items,
                _ => return false,
            };
            if items.iter().any(Value::is_null) {
                // NOT IN over a list with NULL is never true.
                false
            } else {
                !in_list(lhs, rhs)
            }
        }
        CmpOp::Like => like_values(lhs, rhs, false) == Some(true),
        CmpOp::NotLike => like_values(lhs, rhs, false) == Some(false),
        CmpOp::ILike => like_values(lhs, rhs, true) == Some(true),
        CmpOp::Between => between(lhs, rhs) == Some(true),
        CmpOp::NotBetween => between(lhs, rhs) == Some(false),
    }
}

fn ordered_cmp(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    if rhs.is_null() {
        None
    } else {
        Some(lhs.sql_cmp(rhs))
    }
}

fn in_list(lhs: &Value, rhs: &Value) -> bool {
    match rhs {
        Value::Array(items) => items.iter().any(|item| lhs.sql_eq(item)),
        single => lhs.sql_eq(single),
    }
}

fn like_values(lhs: &Value, pattern: &Value, case_insensitive: bool) -> Option<bool> {
    match (lhs, pattern) {
        (Value::Str(text), Value::Str(pat)) => {
            if case_insensitive {
                Some(like_match(&text.to_lowercase(), &pat.to_lowercase()))
            } else {
                Some(like_match(text, pat))
            }
        }
        _ => None,
    }
}

fn between(lhs: &Value, bounds: &Value) -> Option<bool> {
    match bounds {
        Value::Array(items) if items.len() == 2 => {
            let (low, high) = (&items[0], &items[1]);
            if low.is_null() || high.is_null() {
                return None;
            }
            Some(
                lhs.sql_cmp(low) != Ordering::Less && lhs.sql_cmp(high) != Ordering::Greater,
            )
        }
        _ => None,
    }
}

/// SQL LIKE: `%` matches any run, `_` any single character.
fn like_match(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    let (mut ti, mut pi) = (0, 0);
    let mut star: Option<usize> = None;
    let mut star_t = 0;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            ti += 1;
            pi += 1;
        } else if pi < p.len() && p[pi] == '%' {
            star = Some(pi);
            star_t = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            star_t += 1;
            ti = star_t;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '%' {
        pi += 1;
    }
    pi == p.len()
}

fn has_aggregates(projections: &[Projection]) -> bool {
    projections
        .iter()
        .any(|p| matches!(p, Projection::Aggregate(_)))
}

/// Group rows by the key projections and evaluate aggregate projections
/// per bucket. Output rows carry the key columns under their canonical
/// names and each aggregate under its output name.
fn apply_grouping(
    rows: Vec<Row>,
    group: &[Projection],
    projections: &[Projection],
) -> RelqResult<Vec<Row>> {
    let mut buckets: Vec<(Vec<Value>, Vec<Row>)> = Vec::new();
    for row in rows {
        let key = group
            .iter()
            .map(|g| group_key_value(g, &row))
            .collect::<RelqResult<Vec<_>>>()?;
        match buckets.iter_mut().find(|(k, _)| keys_equal(k, &key)) {
            Some((_, bucket)) => bucket.push(row),
            None => buckets.push((key, vec![row])),
        }
    }
    // An ungrouped aggregate still yields one row over no input.
    if group.is_empty() && buckets.is_empty() {
        buckets.push((Vec::new(), Vec::new()));
    }

    let mut grouped = Vec::with_capacity(buckets.len());
    for (key, bucket) in buckets {
        let mut out = Row::new();
        for (g, value) in group.iter().zip(key) {
            out.set(group_key_name(g).to_string(), value);
        }
        for projection in projections {
            if let Projection::Aggregate(agg) = projection {
                out.set(
                    agg.output_name().to_string(),
                    fold_aggregate(&bucket, agg)?,
                );
            }
        }
        grouped.push(out);
    }
    Ok(grouped)
}

fn group_key_value(key: &Projection, row: &Row) -> RelqResult<Value> {
    match key {
        Projection::Attr(attr) => Ok(row.get(&attr.name).cloned().unwrap_or(Value::Null)),
        Projection::Function(func) => eval_function(func, row),
        Projection::Aggregate(agg) => Err(RelqError::Database(format!(
            "cannot group by aggregate '{}'",
            agg.output_name()
        ))),
    }
}

fn group_key_name(key: &Projection) -> &str {
    match key {
        Projection::Attr(attr) => &attr.name,
        other => other.output_name(),
    }
}

/// GROUP BY / DISTINCT equality: NULLs compare equal.
fn keys_equal(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.sql_cmp(y) == Ordering::Equal)
}

fn fold_aggregate(rows: &[Row], agg: &AggregateExpr) -> RelqResult<Value> {
    let values: Vec<&Value> = match &agg.column {
        Some(column) => rows
            .iter()
            .filter_map(|r| r.get(column))
            .filter(|v| !v.is_null())
            .collect(),
        None => Vec::new(),
    };

    match agg.func {
        AggregateFn::Count => match &agg.column {
            None => Ok(Value::Int(rows.len() as i64)),
            Some(_) => Ok(Value::Int(values.len() as i64)),
        },
        AggregateFn::Sum => sum_values(&values),
        AggregateFn::Avg => avg_values(&values),
        AggregateFn::Min => Ok(values
            .iter()
            .min_by(|a, b| a.sql_cmp(b))
            .map(|v| (*v).clone())
            .unwrap_or(Value::Null)),
        AggregateFn::Max => Ok(values
            .iter()
            .max_by(|a, b| a.sql_cmp(b))
            .map(|v| (*v).clone())
            .unwrap_or(Value::Null)),
    }
}

fn sum_values(values: &[&Value]) -> RelqResult<Value> {
    let mut acc: Option<Value> = None;
    for value in values {
        acc = Some(match acc {
            None => (*value).clone(),
            Some(current) => add_values(current, value)?,
        });
    }
    Ok(acc.unwrap_or(Value::Null))
}

fn add_values(a: Value, b: &Value) -> RelqResult<Value> {
    match (&a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_add(*y)
            .map(Value::Int)
            .ok_or_else(|| RelqError::Database("integer overflow in SUM".into())),
        (Value::Int(x), Value::Float(y)) => Ok(Value::Float(*x as f64 + y)),
        (Value::Float(x), Value::Int(y)) => Ok(Value::Float(x + *y as f64)),
        (Value::Float(x), Value::Float(y)) => Ok(Value::Float(x + y)),
        (Value::Decimal(x), Value::Decimal(y)) => Ok(Value::Decimal(x + y)),
        (Value::Decimal(x), Value::Int(y)) => Ok(Value::Decimal(x + Decimal::from(*y))),
        (Value::Int(x), Value::Decimal(y)) => Ok(Value::Decimal(Decimal::from(*x) + y)),
        (Value::Decimal(x), Value::Float(y)) => Decimal::from_f64(*y)
            .map(|d| Value::Decimal(x + d))
            .ok_or_else(|| RelqError::Database("float not representable as decimal".into())),
        (Value::Float(x), Value::Decimal(y)) => Decimal::from_f64(*x)
            .map(|d| Value::Decimal(d + y))
            .ok_or_else(|| RelqError::Database("float not representable as decimal".into())),
        _ => Err(RelqError::Database(format!(
            "cannot sum non-numeric value {a}"
        ))),
    }
}

fn avg_values(values: &[&Value]) -> RelqResult<Value> {
    if values.is_empty() {
        return Ok(Value::Null);
    }
    let sum = sum_values(values)?;
    let n = values.len();
    match sum {
        Value::Int(total) => Ok(Value::Float(total as f64 / n as f64)),
        Value::Float(total) => Ok(Value::Float(total / n as f64)),
        Value::Decimal(total) => Ok(Value::Decimal(total / Decimal::from(n as i64))),
        other => Err(RelqError::Database(format!(
            "cannot average non-numeric value {other}"
        ))),
    }
}

fn sort_rows(rows: &mut [Row], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for key in keys {
            let av = a.get(&key.column).cloned().unwrap_or(Value::Null);
            let bv = b.get(&key.column).cloned().unwrap_or(Value::Null);
            let ord = sort_cmp(&av, &bv, key);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Null placement defaults to the SQL convention: last on ASC, first on
/// DESC; an explicit policy overrides both.
fn sort_cmp(a: &Value, b: &Value, key: &SortKey) -> Ordering {
    let nulls_first = match key.nulls {
        Nulls::First => true,
        Nulls::Last => false,
        Nulls::Default => key.direction == Direction::Desc,
    };
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => {
            if nulls_first {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        (false, true) => {
            if nulls_first {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (false, false) => {
            let ord = a.sql_cmp(b);
            match key.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            }
        }
    }
}

/// Keep the first row per key tuple; assumes the rows are already in
/// their final order.
fn distinct_on(rows: Vec<Row>, columns: &[String]) -> Vec<Row> {
    let mut seen: Vec<Vec<Value>> = Vec::new();
    let mut kept = Vec::new();
    for row in rows {
        let key: Vec<Value> = columns
            .iter()
            .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
            .collect();
        if !seen.iter().any(|s| keys_equal(s, &key)) {
            seen.push(key);
            kept.push(row);
        }
    }
    kept
}

fn project_rows(rows: Vec<Row>, projections: &[Projection]) -> RelqResult<Vec<Row>> {
    if projections.is_empty() {
        return Ok(rows);
    }
    let mut projected = Vec::with_capacity(rows.len());
    for row in rows {
        let mut out = Row::new();
        for projection in projections {
            let value = match projection {
                Projection::Attr(attr) => row
                    .get(&attr.name)
                    .or_else(|| row.get(attr.output_name()))
                    .cloned()
                    .unwrap_or(Value::Null),
                Projection::Aggregate(agg) => {
                    row.get(agg.output_name()).cloned().unwrap_or(Value::Null)
                }
                Projection::Function(func) => eval_function(func, &row)?,
            };
            out.set(projection.output_name().to_string(), value);
        }
        projected.push(out);
    }
    Ok(projected)
}

/// Row equality for DISTINCT/UNION: same column names in the same order,
/// values equal with NULLs comparing equal.
fn rows_equal(a: &Row, b: &Row) -> bool {
    a.len() == b.len()
        && a.columns()
            .zip(b.columns())
            .all(|((an, av), (bn, bv))| an == bn && av.sql_cmp(bv) == Ordering::Equal)
}

fn dedup_rows(rows: Vec<Row>) -> Vec<Row> {
    let mut kept: Vec<Row> = Vec::new();
    for row in rows {
        if !kept.iter().any(|k| rows_equal(k, &row)) {
            kept.push(row);
        }
    }
    kept
}

fn eval_function(func: &FunctionExpr, row: &Row) -> RelqResult<Value> {
    let args = func
        .args
        .iter()
        .map(|a| eval_operand(a, row))
        .collect::<RelqResult<Vec<_>>>()?;

    match func.name.as_str() {
        "lower" => string_fn(&func.name, &args, |s| s.to_lowercase()),
        "upper" => string_fn(&func.name, &args, |s| s.to_uppercase()),
        "length" => {
            let arg = single_arg(&func.name, &args)?;
            match arg {
                Value::Null => Ok(Value::Null),
                Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                other => Err(RelqError::Database(format!(
                    "length expects a string, got {other}"
                ))),
            }
        }
        "abs" => {
            let arg = single_arg(&func.name, &args)?;
            match arg {
                Value::Null => Ok(Value::Null),
                Value::Int(n) => n
                    .checked_abs()
                    .map(Value::Int)
                    .ok_or_else(|| RelqError::Database("integer overflow in abs".into())),
                Value::Float(n) => Ok(Value::Float(n.abs())),
                Value::Decimal(n) => Ok(Value::Decimal(n.abs())),
                other => Err(RelqError::Database(format!(
                    "abs expects a number, got {other}"
                ))),
            }
        }
        "round" => {
            let arg = single_arg(&func.name, &args)?;
            match arg {
                Value::Null => Ok(Value::Null),
                Value::Int(n) => Ok(Value::Int(*n)),
                Value::Float(n) => Ok(Value::Float(n.round())),
                Value::Decimal(n) => Ok(Value::Decimal(n.round())),
                other => Err(RelqError::Database(format!(
                    "round expects a number, got {other}"
                ))),
            }
        }
        "coalesce" => Ok(args
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(Value::Null)),
        other => Err(RelqError::Database(format!("unknown function '{other}'"))),
    }
}

fn single_arg<'a>(name: &str, args: &'a [Value]) -> RelqResult<&'a Value> {
    match args {
        [arg] => Ok(arg),
        _ => Err(RelqError::Database(format!(
            "{name} expects 1 argument, got {}",
            args.len()
        ))),
    }
}

fn string_fn(name: &str, args: &[Value], f: impl Fn(&str) -> String) -> RelqResult<Value> {
    let arg = single_arg(name, args)?;
    match arg {
        Value::Null => Ok(Value::Null),
        Value::Str(s) => Ok(Value::Str(f(s))),
        other => Err(RelqError::Database(format!(
            "{name} expects a string, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::predicate::Predicate;
    use crate::expr::projection::AggregateExpr;

    fn gateway() -> MemoryGateway {
        let gw = MemoryGateway::new();
        gw.insert_all(
            "users",
            vec![
                Row::new().with("id", 1).with("name", "ada").with("age", 36),
                Row::new().with("id", 2).with("name", "grace").with("age", 45),
                Row::new()
                    .with("id", 3)
                    .with("name", "joan")
                    .with("age", Value::Null),
            ],
        )
        .unwrap();
        gw.insert_all(
            "tasks",
            vec![
                Row::new().with("id", 10).with("user_id", 1).with("title", "fix parser"),
                Row::new().with("id", 11).with("user_id", 1).with("title", "write docs"),
                Row::new().with("id", 12).with("user_id", 9).with("title", "orphaned"),
            ],
        )
        .unwrap();
        gw
    }

    #[test]
    fn test_restriction_filters_rows() {
        let gw = gateway();
        let query =
            Query::table("users").filtered(Predicate::cmp("name", CmpOp::Eq, "ada"));
        let rows = gw.rows(&query).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_raw_source_is_refused() {
        let gw = gateway();
        let err = gw.rows(&Query::raw("SELECT 1")).unwrap_err();
        assert!(matches!(err, RelqError::Database(_)));
    }

    #[test]
    fn test_inner_join_drops_unmatched_sides() {
        let gw = gateway();
        let query = Query::table("users").joined(JoinClause {
            kind: JoinKind::Inner,
            table: "tasks".into(),
            keys: vec![("id".into(), "user_id".into())],
            filter: None,
        });
        let rows = gw.rows(&query).unwrap();
        assert_eq!(rows.len(), 2);
        // Collision on "id" keeps the left column.
        assert_eq!(rows[0].get("id"), Some(&Value::Int(1)));
        assert_eq!(rows[0].get("title"), Some(&Value::from("fix parser")));
    }

    #[test]
    fn test_left_join_null_extends_missing_matches() {
        let gw = gateway();
        let query = Query::table("users").joined(JoinClause {
            kind: JoinKind::Left,
            table: "tasks".into(),
            keys: vec![("id".into(), "user_id".into())],
            filter: None,
        });
        let rows = gw.rows(&query).unwrap();
        assert_eq!(rows.len(), 4);
        let unmatched: Vec<&Row> = rows
            .iter()
            .filter(|r| r.get("title") == Some(&Value::Null))
            .collect();
        assert_eq!(unmatched.len(), 2);
    }

    #[test]
    fn test_right_join_keeps_unmatched_right_rows() {
        let gw = gateway();
        let query = Query::table("users").joined(JoinClause {
            kind: JoinKind::Right,
            table: "tasks".into(),
            keys: vec![("id".into(), "user_id".into())],
            filter: None,
        });
        let rows = gw.rows(&query).unwrap();
        assert_eq!(rows.len(), 3);
        let orphan = rows
            .iter()
            .find(|r| r.get("title") == Some(&Value::from("orphaned")))
            .unwrap();
        assert_eq!(orphan.get("name"), Some(&Value::Null));
    }

    #[test]
    fn test_group_and_count() {
        let gw = gateway();
        let query = Query::table("tasks")
            .grouped(vec![Projection::Attr(crate::attribute::Attribute::new(
                "user_id",
                crate::attribute::AttrType::Int,
            ))])
            .selected(vec![
                Projection::Attr(crate::attribute::Attribute::new(
                    "user_id",
                    crate::attribute::AttrType::Int,
                )),
                Projection::Aggregate(AggregateExpr::count()),
            ]);
        let mut rows = gw.rows(&query).unwrap();
        rows.sort_by(|a, b| {
            a.get("user_id")
                .unwrap()
                .sql_cmp(b.get("user_id").unwrap())
        });
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("user_id"), Some(&Value::Int(1)));
        assert_eq!(rows[0].get("count"), Some(&Value::Int(2)));
        assert_eq!(rows[1].get("count"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_order_defaults_nulls_last_on_asc() {
        let gw = gateway();
        let query = Query::table("users").ordered(vec![SortKey::asc("age")]);
        let rows = gw.rows(&query).unwrap();
        let ages: Vec<&Value> = rows.iter().map(|r| r.get("age").unwrap()).collect();
        assert_eq!(
            ages,
            vec![&Value::Int(36), &Value::Int(45), &Value::Null]
        );
    }

    #[test]
    fn test_order_nulls_first_override() {
        let gw = gateway();
        let query =
            Query::table("users").ordered(vec![SortKey::asc("age").nulls_first()]);
        let rows = gw.rows(&query).unwrap();
        assert_eq!(rows[0].get("age"), Some(&Value::Null));
    }

    #[test]
    fn test_limit_offset_window() {
        let gw = gateway();
        let query = Query::table("users")
            .ordered(vec![SortKey::asc("id")])
            .bounded(1)
            .shifted(1);
        let rows = gw.rows(&query).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_like_and_ilike() {
        let gw = gateway();
        let like = Query::table("tasks")
            .filtered(Predicate::cmp("title", CmpOp::Like, "%docs"));
        assert_eq!(gw.rows(&like).unwrap().len(), 1);

        let ilike = Query::table("tasks")
            .filtered(Predicate::cmp("title", CmpOp::ILike, "FIX%"));
        assert_eq!(gw.rows(&ilike).unwrap().len(), 1);

        let single = Query::table("users")
            .filtered(Predicate::cmp("name", CmpOp::Like, "a_a"));
        assert_eq!(gw.rows(&single).unwrap().len(), 1);
    }

    #[test]
    fn test_distinct_on_keeps_first_row_per_key() {
        let gw = gateway();
        let query = Query::table("tasks")
            .ordered(vec![SortKey::asc("id")])
            .distinct_on(vec!["user_id".into()]);
        let rows = gw.rows(&query).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&Value::Int(10)));
    }

    #[test]
    fn test_union_dedup_vs_all() {
        let gw = gateway();
        let left = Query::table("users");
        let both = left.unioned(Query::table("users"), false);
        assert_eq!(gw.rows(&both).unwrap().len(), 3);

        let all = left.unioned(Query::table("users"), true);
        assert_eq!(gw.rows(&all).unwrap().len(), 6);
    }

    #[test]
    fn test_aggregate_sum_and_avg_skip_nulls() {
        let gw = gateway();
        let query = Query::table("users");
        let sum = gw.aggregate(&query, &AggregateExpr::sum("age")).unwrap();
        assert_eq!(sum, Value::Int(81));
        let avg = gw.aggregate(&query, &AggregateExpr::avg("age")).unwrap();
        assert_eq!(avg, Value::Float(40.5));
        let min = gw.aggregate(&query, &AggregateExpr::min("age")).unwrap();
        assert_eq!(min, Value::Int(36));
    }

    #[test]
    fn test_function_projection_evaluates() {
        let gw = gateway();
        let query = Query::table("users")
            .filtered(Predicate::cmp("id", CmpOp::Eq, 1))
            .selected(vec![Projection::Function(
                FunctionExpr::new("upper")
                    .arg(Operand::col("name"))
                    .aliased("name_uc"),
            )]);
        let rows = gw.rows(&query).unwrap();
        assert_eq!(rows[0].get("name_uc"), Some(&Value::from("ADA")));
    }

    #[test]
    fn test_like_matcher_edge_cases() {
        assert!(like_match("hello", "hello"));
        assert!(like_match("hello", "h%o"));
        assert!(like_match("hello", "%"));
        assert!(like_match("", "%"));
        assert!(!like_match("", "_"));
        assert!(like_match("hello", "_ello"));
        assert!(!like_match("hello", "h_o"));
        assert!(like_match("a%b", "a%b"));
        assert!(!like_match("hello", "hell"));
    }
}
