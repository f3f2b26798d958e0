//! Column types and cell values
//!
//! This module provides the closed set of types a column can declare and the
//! tagged value stored in a cell:
//! - ColumnType: the declared type of a column, checked once at build time
//! - Value: a single cell, including nulls and nested tables
//! - Case folding used by case-insensitive text operators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Declared type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// 64-bit signed integer
    Int,
    /// Boolean
    Bool,
    /// 32-bit floating point
    Float,
    /// 64-bit floating point
    Double,
    /// UTF-8 text
    String,
    /// Raw bytes
    Binary,
    /// Point in time with UTC timezone
    Timestamp,
    /// Nested table
    Table,
    /// Dynamically typed cell, may hold any scalar or null
    Any,
}

impl ColumnType {
    /// Returns the type name
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Int => "Int",
            ColumnType::Bool => "Bool",
            ColumnType::Float => "Float",
            ColumnType::Double => "Double",
            ColumnType::String => "String",
            ColumnType::Binary => "Binary",
            ColumnType::Timestamp => "Timestamp",
            ColumnType::Table => "Table",
            ColumnType::Any => "Any",
        }
    }

    /// Check if the type is numeric
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Int | ColumnType::Float | ColumnType::Double)
    }

    /// Check if values of this type have a total order usable for ranges
    pub fn is_ordered(&self) -> bool {
        self.is_numeric() || matches!(self, ColumnType::Timestamp)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// Unset value in a nullable or Any column
    Null,
    /// 64-bit integer
    Int(i64),
    /// Boolean value
    Bool(bool),
    /// 32-bit floating point
    Float(f32),
    /// 64-bit floating point
    Double(f64),
    /// String value
    String(String),
    /// Binary data
    Binary(Vec<u8>),
    /// DateTime with UTC timezone
    Timestamp(DateTime<Utc>),
    /// Nested table rows
    Table(Vec<Vec<Value>>),
}

impl Value {
    /// Returns the type tag of this value, or None for null
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(ColumnType::Int),
            Value::Bool(_) => Some(ColumnType::Bool),
            Value::Float(_) => Some(ColumnType::Float),
            Value::Double(_) => Some(ColumnType::Double),
            Value::String(_) => Some(ColumnType::String),
            Value::Binary(_) => Some(ColumnType::Binary),
            Value::Timestamp(_) => Some(ColumnType::Timestamp),
            Value::Table(_) => Some(ColumnType::Table),
        }
    }

    /// Type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self.column_type() {
            Some(t) => t.as_str(),
            None => "Null",
        }
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 (any numeric value)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get as byte slice
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Get as timestamp
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Compare two values of the same ordered type.
    ///
    /// Returns None when the types differ, when either side is not ordered,
    /// or when a float comparison involves NaN.
    pub fn partial_compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Sort order over cells of one column: null first, then natural order.
    ///
    /// Floats use `total_cmp` so that the order is total and stable sorting
    /// never sees an inconsistent comparator.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (a, b) => a.partial_compare(b).unwrap_or(Ordering::Equal),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Binary(b) => write!(f, "<{} bytes>", b.len()),
            Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Value::Table(rows) => write!(f, "<table: {} rows>", rows.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Binary(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Binary(b.to_vec())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::Timestamp(dt)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Fold text for case-insensitive comparison.
///
/// Uses the Unicode default lowercase mapping of each character, which does
/// not depend on the process locale.
pub fn fold_case(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_value_types() {
        assert_eq!(Value::from(5i64).column_type(), Some(ColumnType::Int));
        assert_eq!(Value::from(5i32).column_type(), Some(ColumnType::Int));
        assert_eq!(Value::from(1.5f32).column_type(), Some(ColumnType::Float));
        assert_eq!(Value::from(1.5f64).column_type(), Some(ColumnType::Double));
        assert_eq!(Value::from("a").column_type(), Some(ColumnType::String));
        assert_eq!(Value::from(vec![1u8]).column_type(), Some(ColumnType::Binary));
        assert_eq!(Value::Null.column_type(), None);
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_partial_compare_no_coercion() {
        assert_eq!(
            Value::Int(1).partial_compare(&Value::Int(2)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Int(1).partial_compare(&Value::Double(1.0)), None);
        assert_eq!(Value::Double(f64::NAN).partial_compare(&Value::Double(1.0)), None);
    }

    #[test]
    fn test_sort_cmp_nulls_first() {
        assert_eq!(Value::Null.sort_cmp(&Value::Int(-100)), Ordering::Less);
        assert_eq!(Value::Int(3).sort_cmp(&Value::Null), Ordering::Greater);
        let early = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            Value::Timestamp(early).sort_cmp(&Value::Timestamp(late)),
            Ordering::Less
        );
    }

    #[test]
    fn test_fold_case_is_locale_free() {
        assert_eq!(fold_case("USER1"), "user1");
        assert_eq!(fold_case("ÆØÅ"), "æøå");
        assert_eq!(fold_case("İ"), "i\u{307}");
    }

    #[test]
    fn test_column_type_capabilities() {
        assert!(ColumnType::Int.is_ordered());
        assert!(ColumnType::Timestamp.is_ordered());
        assert!(!ColumnType::Timestamp.is_numeric());
        assert!(!ColumnType::String.is_ordered());
        assert!(!ColumnType::Any.is_ordered());
    }
}
