//! Column aggregates over matched rows
//!
//! Null cells are skipped by every aggregate. Result typing:
//! - sum: Int for Int columns, Double for Float/Double columns
//! - minimum/maximum: the column type, None without values. Defined for
//!   every sortable type, Bool included
//! - average: Double, error without values
//! - count: Int number of non-null values

use crate::error::{QueryError, QueryResult};
use crate::value::{ColumnType, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Aggregate operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateKind {
    Sum,
    Minimum,
    Maximum,
    Average,
    Count,
}

impl AggregateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateKind::Sum => "sum",
            AggregateKind::Minimum => "minimum",
            AggregateKind::Maximum => "maximum",
            AggregateKind::Average => "average",
            AggregateKind::Count => "count",
        }
    }

    /// Check that the aggregate is defined for a column type
    pub fn check_column(&self, column: usize, column_type: ColumnType) -> QueryResult<()> {
        let supported = match self {
            AggregateKind::Sum | AggregateKind::Average => column_type.is_numeric(),
            // Bool sorts false before true, and min/max follow the sort order.
            AggregateKind::Minimum | AggregateKind::Maximum => {
                column_type.is_ordered() || column_type == ColumnType::Bool
            }
            AggregateKind::Count => true,
        };
        if supported {
            Ok(())
        } else {
            Err(QueryError::UnsupportedColumnType {
                operation: self.as_str(),
                column,
                column_type,
            })
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AggregateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(AggregateKind::Sum),
            "min" | "minimum" => Ok(AggregateKind::Minimum),
            "max" | "maximum" => Ok(AggregateKind::Maximum),
            "avg" | "average" => Ok(AggregateKind::Average),
            "count" => Ok(AggregateKind::Count),
            other => Err(format!("unknown aggregate: {}", other)),
        }
    }
}

/// Running state of one aggregate
#[derive(Debug, Clone)]
pub struct Accumulator {
    kind: AggregateKind,
    column_type: ColumnType,
    int_sum: i128,
    float_sum: f64,
    count: usize,
    best: Option<Value>,
}

impl Accumulator {
    /// Create an accumulator for a column, failing for unsupported types
    pub fn new(kind: AggregateKind, column: usize, column_type: ColumnType) -> QueryResult<Self> {
        kind.check_column(column, column_type)?;
        Ok(Self {
            kind,
            column_type,
            int_sum: 0,
            float_sum: 0.0,
            count: 0,
            best: None,
        })
    }

    /// Add one cell
    pub fn push(&mut self, value: &Value) {
        if value.is_null() {
            return;
        }

        match self.kind {
            AggregateKind::Count => {}
            AggregateKind::Sum | AggregateKind::Average => match value {
                Value::Int(i) => self.int_sum += *i as i128,
                other => {
                    if let Some(f) = other.as_f64() {
                        self.float_sum += f;
                    }
                }
            },
            AggregateKind::Minimum | AggregateKind::Maximum => {
                let wanted = if self.kind == AggregateKind::Minimum {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                // NaN compares as None and is skipped.
                let replace = match &self.best {
                    None => value.partial_compare(value).is_some(),
                    Some(best) => value.partial_compare(best) == Some(wanted),
                };
                if replace {
                    self.best = Some(value.clone());
                }
            }
        }
        self.count += 1;
    }

    /// Number of non-null cells seen
    pub fn count(&self) -> usize {
        self.count
    }

    /// Produce the aggregate result
    pub fn finish(self) -> QueryResult<Option<Value>> {
        match self.kind {
            AggregateKind::Count => Ok(Some(Value::Int(self.count as i64))),
            AggregateKind::Sum => {
                if self.column_type == ColumnType::Int {
                    let sum = i64::try_from(self.int_sum)
                        .map_err(|_| QueryError::AggregateOverflow("sum"))?;
                    Ok(Some(Value::Int(sum)))
                } else {
                    Ok(Some(Value::Double(self.float_sum)))
                }
            }
            AggregateKind::Average => {
                if self.count == 0 {
                    return Err(QueryError::EmptyAggregate("average"));
                }
                let total = if self.column_type == ColumnType::Int {
                    self.int_sum as f64
                } else {
                    self.float_sum
                };
                Ok(Some(Value::Double(total / self.count as f64)))
            }
            AggregateKind::Minimum | AggregateKind::Maximum => Ok(self.best),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(kind: AggregateKind, column_type: ColumnType, values: &[Value]) -> QueryResult<Option<Value>> {
        let mut acc = Accumulator::new(kind, 0, column_type)?;
        for value in values {
            acc.push(value);
        }
        acc.finish()
    }

    #[test]
    fn test_sum_typing() {
        let ints = [Value::Int(770), Value::Null, Value::Int(875)];
        assert_eq!(run(AggregateKind::Sum, ColumnType::Int, &ints).unwrap(), Some(Value::Int(1645)));
        assert_eq!(run(AggregateKind::Sum, ColumnType::Int, &[]).unwrap(), Some(Value::Int(0)));

        let floats = [Value::Float(1.5), Value::Float(2.5)];
        assert_eq!(
            run(AggregateKind::Sum, ColumnType::Float, &floats).unwrap(),
            Some(Value::Double(4.0))
        );
        assert_eq!(
            run(AggregateKind::Sum, ColumnType::Double, &[]).unwrap(),
            Some(Value::Double(0.0))
        );
    }

    #[test]
    fn test_sum_overflow() {
        let values = [Value::Int(i64::MAX), Value::Int(1)];
        assert_eq!(
            run(AggregateKind::Sum, ColumnType::Int, &values),
            Err(QueryError::AggregateOverflow("sum"))
        );
        let average = run(AggregateKind::Average, ColumnType::Int, &values).unwrap();
        assert!(matches!(average, Some(Value::Double(_))));
    }

    #[test]
    fn test_min_max() {
        let values = [Value::Int(420), Value::Int(327), Value::Null, Value::Int(875)];
        assert_eq!(run(AggregateKind::Minimum, ColumnType::Int, &values).unwrap(), Some(Value::Int(327)));
        assert_eq!(run(AggregateKind::Maximum, ColumnType::Int, &values).unwrap(), Some(Value::Int(875)));
        assert_eq!(run(AggregateKind::Minimum, ColumnType::Int, &[]).unwrap(), None);

        let doubles = [Value::Double(f64::NAN), Value::Double(2.0), Value::Double(-1.0)];
        assert_eq!(
            run(AggregateKind::Minimum, ColumnType::Double, &doubles).unwrap(),
            Some(Value::Double(-1.0))
        );
    }

    #[test]
    fn test_min_max_bool() {
        let flags = [Value::Bool(true), Value::Null, Value::Bool(false)];
        assert_eq!(
            run(AggregateKind::Minimum, ColumnType::Bool, &flags).unwrap(),
            Some(Value::Bool(false))
        );
        assert_eq!(
            run(AggregateKind::Maximum, ColumnType::Bool, &flags).unwrap(),
            Some(Value::Bool(true))
        );
        assert!(Accumulator::new(AggregateKind::Sum, 0, ColumnType::Bool).is_err());
    }

    #[test]
    fn test_average() {
        let values = [Value::Int(1), Value::Int(2)];
        assert_eq!(
            run(AggregateKind::Average, ColumnType::Int, &values).unwrap(),
            Some(Value::Double(1.5))
        );
        assert_eq!(
            run(AggregateKind::Average, ColumnType::Double, &[Value::Null]),
            Err(QueryError::EmptyAggregate("average"))
        );
    }

    #[test]
    fn test_count_skips_nulls() {
        let values = [Value::from("a"), Value::Null, Value::from("b")];
        assert_eq!(
            run(AggregateKind::Count, ColumnType::String, &values).unwrap(),
            Some(Value::Int(2))
        );
    }

    #[test]
    fn test_unsupported_columns() {
        assert!(matches!(
            Accumulator::new(AggregateKind::Sum, 2, ColumnType::Timestamp),
            Err(QueryError::UnsupportedColumnType { column: 2, .. })
        ));
        assert!(Accumulator::new(AggregateKind::Maximum, 0, ColumnType::Timestamp).is_ok());
        assert!(Accumulator::new(AggregateKind::Minimum, 0, ColumnType::String).is_err());
        assert!(Accumulator::new(AggregateKind::Average, 0, ColumnType::Any).is_err());
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("SUM".parse::<AggregateKind>().unwrap(), AggregateKind::Sum);
        assert_eq!("avg".parse::<AggregateKind>().unwrap(), AggregateKind::Average);
        assert!("median".parse::<AggregateKind>().is_err());
    }
}
