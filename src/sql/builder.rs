//! Builds parameterized SELECT, INSERT, UPDATE, DELETE against caller-named tables.
//!
//! Statement text uses named `:name` placeholders; [`Statement::compile`] turns them into
//! PostgreSQL positional parameters right before execution.

use crate::error::AccessError;
use crate::sql::ident::{qualified, Ident};
use crate::sql::params::{FilterMap, RecordMap, ScalarValue};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Upper bound for a page of rows.
pub const MAX_LIMIT: i64 = 1000;
/// Page size used when the caller does not give one.
pub const DEFAULT_LIMIT: i64 = 100;

const WHERE_PREFIX: &str = "where";
const SET_PREFIX: &str = "set";
const VALUE_PREFIX: &str = "val";

pub fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(0, MAX_LIMIT)
}

pub fn clamp_offset(offset: i64) -> i64 {
    offset.max(0)
}

/// One named bind parameter and the column it is compared with or written to.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundParam {
    pub name: String,
    pub column: String,
    pub value: ScalarValue,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<BoundParam>,
}

/// Positional form of a [`Statement`], ready for `sqlx::query`.
#[derive(Debug)]
pub struct CompiledStatement<'a> {
    pub sql: String,
    pub values: Vec<&'a ScalarValue>,
}

impl Statement {
    /// Parameter names to values, for logging and responses.
    pub fn params_json(&self) -> Value {
        let map: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.clone(), p.value.to_json()))
            .collect();
        Value::Object(map)
    }

    /// Rewrite `:name` placeholders to `$n`. Text inside double-quoted identifiers and
    /// single-quoted literals is copied untouched, and `::type` casts are left alone.
    /// `casts` maps a column name to a type expression appended to placeholders whose
    /// value is text or null.
    pub fn compile(&self, casts: &HashMap<String, String>) -> CompiledStatement<'_> {
        let mut sql = String::with_capacity(self.sql.len() + self.params.len() * 4);
        let mut values: Vec<&ScalarValue> = Vec::with_capacity(self.params.len());
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut in_ident = false;
        let mut in_literal = false;
        let mut chars = self.sql.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            match c {
                '"' if !in_literal => {
                    in_ident = !in_ident;
                    sql.push(c);
                }
                '\'' if !in_ident => {
                    in_literal = !in_literal;
                    sql.push(c);
                }
                ':' if !in_ident && !in_literal => {
                    let start = i + 1;
                    let mut end = start;
                    while let Some(&(j, n)) = chars.peek() {
                        if n.is_ascii_alphanumeric() || n == '_' {
                            end = j + n.len_utf8();
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let name = &self.sql[start..end];
                    match self.params.iter().find(|p| p.name == name) {
                        Some(p) => {
                            let pos = *positions.entry(p.name.as_str()).or_insert_with(|| {
                                values.push(&p.value);
                                values.len()
                            });
                            sql.push('$');
                            sql.push_str(&pos.to_string());
                            if p.value.takes_column_type() {
                                if let Some(cast) = casts.get(&p.column) {
                                    sql.push_str("::");
                                    sql.push_str(cast);
                                }
                            }
                        }
                        None => {
                            sql.push(':');
                            sql.push_str(name);
                        }
                    }
                }
                _ => sql.push(c),
            }
        }
        CompiledStatement { sql, values }
    }

    fn push_param(&mut self, prefix: &str, index: usize, column: &str, value: &ScalarValue) -> String {
        let name = format!("{}_{}", prefix, index);
        self.params.push(BoundParam {
            name: name.clone(),
            column: column.to_string(),
            value: value.clone(),
        });
        format!(":{}", name)
    }
}

/// Column as it appears in a SELECT list or RETURNING clause.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectedColumn {
    pub name: Ident,
    /// Project as `"col"::text` for types the result normalizer cannot decode natively.
    pub as_text: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Projection {
    #[default]
    All,
    Columns(Vec<ProjectedColumn>),
}

impl Projection {
    fn render(&self) -> String {
        match self {
            Projection::Columns(cols) if !cols.is_empty() => cols
                .iter()
                .map(|c| {
                    let q = c.name.quoted();
                    if c.as_text {
                        format!("{}::text AS {}", q, q)
                    } else {
                        q
                    }
                })
                .collect::<Vec<_>>()
                .join(", "),
            _ => "*".to_string(),
        }
    }
}

/// Conjoined equality predicates over a filter map.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WhereClause {
    /// Predicates joined with AND, without the WHERE keyword. Empty when there are no filters.
    pub sql: String,
    pub params: Vec<BoundParam>,
}

impl WhereClause {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Build `"a" = :where_0 AND "b" IS NULL ...` in filter order. Null values compare with
/// IS NULL and bind nothing; the parameter index follows the predicate position.
pub fn build_where(filters: &FilterMap) -> Result<WhereClause, AccessError> {
    let mut stmt = Statement::default();
    let mut parts = Vec::with_capacity(filters.len());
    for (i, (col, val)) in filters.iter().enumerate() {
        let q = Ident::parse(col)?.quoted();
        if val.is_null() {
            parts.push(format!("{} IS NULL", q));
        } else {
            let ph = stmt.push_param(WHERE_PREFIX, i, col, val);
            parts.push(format!("{} = {}", q, ph));
        }
    }
    Ok(WhereClause {
        sql: parts.join(" AND "),
        params: stmt.params,
    })
}

fn required_where(filters: &FilterMap, op: &str) -> Result<WhereClause, AccessError> {
    if filters.is_empty() {
        return Err(AccessError::Validation(format!(
            "{} requires at least one filter",
            op
        )));
    }
    build_where(filters)
}

/// SELECT with optional filters. `limit` is clamped to [0, 1000], `offset` to [0, inf).
pub fn build_select(
    schema: &Ident,
    table: &Ident,
    filters: &FilterMap,
    limit: i64,
    offset: i64,
    projection: &Projection,
) -> Result<Statement, AccessError> {
    let wc = build_where(filters)?;
    let where_sql = if wc.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", wc.sql)
    };
    Ok(Statement {
        sql: format!(
            "SELECT {} FROM {}{} LIMIT {} OFFSET {}",
            projection.render(),
            qualified(schema, table),
            where_sql,
            clamp_limit(limit),
            clamp_offset(offset)
        ),
        params: wc.params,
    })
}

/// INSERT one row and return it.
pub fn build_insert(
    schema: &Ident,
    table: &Ident,
    record: &RecordMap,
    projection: &Projection,
) -> Result<Statement, AccessError> {
    if record.is_empty() {
        return Err(AccessError::Validation("insert requires at least one column".into()));
    }
    let mut stmt = Statement::default();
    let mut cols = Vec::with_capacity(record.len());
    let mut placeholders = Vec::with_capacity(record.len());
    for (i, (col, val)) in record.iter().enumerate() {
        cols.push(Ident::parse(col)?.quoted());
        placeholders.push(stmt.push_param(VALUE_PREFIX, i, col, val));
    }
    stmt.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        qualified(schema, table),
        cols.join(", "),
        placeholders.join(", "),
        projection.render()
    );
    Ok(stmt)
}

/// UPDATE matching rows and return them. SET parameters are `set_<i>`, WHERE parameters
/// `where_<j>`, so one column may appear on both sides.
pub fn build_update(
    schema: &Ident,
    table: &Ident,
    record: &RecordMap,
    filters: &FilterMap,
    projection: &Projection,
) -> Result<Statement, AccessError> {
    if record.is_empty() {
        return Err(AccessError::Validation("update requires at least one column to set".into()));
    }
    let wc = required_where(filters, "update")?;
    let mut stmt = Statement::default();
    let mut sets = Vec::with_capacity(record.len());
    for (i, (col, val)) in record.iter().enumerate() {
        let q = Ident::parse(col)?.quoted();
        let ph = stmt.push_param(SET_PREFIX, i, col, val);
        sets.push(format!("{} = {}", q, ph));
    }
    stmt.params.extend(wc.params);
    stmt.sql = format!(
        "UPDATE {} SET {} WHERE {} RETURNING {}",
        qualified(schema, table),
        sets.join(", "),
        wc.sql,
        projection.render()
    );
    Ok(stmt)
}

/// DELETE matching rows. The affected-row count comes from the command tag.
pub fn build_delete(schema: &Ident, table: &Ident, filters: &FilterMap) -> Result<Statement, AccessError> {
    let wc = required_where(filters, "delete")?;
    Ok(Statement {
        sql: format!("DELETE FROM {} WHERE {}", qualified(schema, table), wc.sql),
        params: wc.params,
    })
}
