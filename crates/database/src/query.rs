//! Dynamic WHERE-clause composition.
//!
//! Filters arrive as a [`FilterMap`] of column keys to values. A key ending in
//! `_from` becomes `column >= value`, one ending in `_till` becomes
//! `column <= value`, anything else is an exact match. The resulting
//! predicates are folded left to right with a single [`Combinator`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder};
use std::collections::BTreeMap;
use std::fmt;

pub const FROM_SUFFIX: &str = "_from";
pub const TILL_SUFFIX: &str = "_till";

/// A value bound to a statement placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    /// Appends a placeholder for this value to `builder`.
    pub fn push_bind(self, builder: &mut QueryBuilder<'_, Postgres>) {
        match self {
            SqlValue::Null => builder.push_bind(None::<i64>),
            SqlValue::Bool(v) => builder.push_bind(v),
            SqlValue::Int(v) => builder.push_bind(v),
            SqlValue::Decimal(v) => builder.push_bind(v),
            SqlValue::Text(v) => builder.push_bind(v),
            SqlValue::Timestamp(v) => builder.push_bind(v),
        };
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Bool(v) => write!(f, "{v}"),
            SqlValue::Int(v) => write!(f, "{v}"),
            SqlValue::Decimal(v) => write!(f, "{v}"),
            SqlValue::Text(v) => write!(f, "'{v}'"),
            SqlValue::Timestamp(v) => write!(f, "'{}'", v.to_rfc3339()),
        }
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(i64::from(v))
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

/// Column key to value. Keys are static so only declared columns can reach SQL.
pub type FilterMap = BTreeMap<&'static str, SqlValue>;

/// Statically declared filter parameters.
pub trait FilterParams {
    /// The set (non-`None`) fields, keyed by column with an optional range suffix.
    fn filter_map(&self) -> FilterMap;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    pub fn combine(self, left: Predicate, right: Predicate) -> Predicate {
        match self {
            Combinator::And => Predicate::And(Box::new(left), Box::new(right)),
            Combinator::Or => Predicate::Or(Box::new(left), Box::new(right)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(&'static str, SqlValue),
    GtOrEq(&'static str, SqlValue),
    LtOrEq(&'static str, SqlValue),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    /// Builds the predicate for a single filter entry from its key suffix.
    pub fn from_filter(key: &'static str, value: SqlValue) -> Self {
        if let Some(column) = key.strip_suffix(FROM_SUFFIX).filter(|c| !c.is_empty()) {
            return Predicate::GtOrEq(column, value);
        }
        if let Some(column) = key.strip_suffix(TILL_SUFFIX).filter(|c| !c.is_empty()) {
            return Predicate::LtOrEq(column, value);
        }
        Predicate::Eq(key, value)
    }

    /// Renders the predicate into `builder`, recording each bound value in `arguments`.
    pub fn push_to(&self, builder: &mut QueryBuilder<'_, Postgres>, arguments: &mut Vec<SqlValue>) {
        match self {
            Predicate::Eq(column, value) => push_comparison(builder, arguments, column, " = ", value),
            Predicate::GtOrEq(column, value) => {
                push_comparison(builder, arguments, column, " >= ", value)
            }
            Predicate::LtOrEq(column, value) => {
                push_comparison(builder, arguments, column, " <= ", value)
            }
            Predicate::And(left, right) => push_group(builder, arguments, left, " AND ", right),
            Predicate::Or(left, right) => push_group(builder, arguments, left, " OR ", right),
        }
    }
}

fn push_comparison(
    builder: &mut QueryBuilder<'_, Postgres>,
    arguments: &mut Vec<SqlValue>,
    column: &str,
    operator: &str,
    value: &SqlValue,
) {
    builder.push(column).push(operator);
    value.clone().push_bind(builder);
    arguments.push(value.clone());
}

fn push_group(
    builder: &mut QueryBuilder<'_, Postgres>,
    arguments: &mut Vec<SqlValue>,
    left: &Predicate,
    operator: &str,
    right: &Predicate,
) {
    builder.push("(");
    left.push_to(builder, arguments);
    builder.push(operator);
    right.push_to(builder, arguments);
    builder.push(")");
}

/// Folds `filters` into one predicate. An empty map yields `None`, which the
/// caller must treat as "no WHERE clause", not as "match nothing".
pub fn compose(filters: &FilterMap, combinator: Combinator) -> Option<Predicate> {
    filters
        .iter()
        .map(|(&key, value)| Predicate::from_filter(key, value.clone()))
        .reduce(|accumulator, predicate| combinator.combine(accumulator, predicate))
}

/// Appends ` WHERE <predicate>` when there is one.
pub fn push_where(
    builder: &mut QueryBuilder<'_, Postgres>,
    predicate: Option<&Predicate>,
    arguments: &mut Vec<SqlValue>,
) {
    if let Some(predicate) = predicate {
        builder.push(" WHERE ");
        predicate.push_to(builder, arguments);
    }
}
