//! Serializable query steps
//!
//! A descriptor is the builder vocabulary written down with column names
//! instead of indices, so queries can be stored in fixtures and replayed.

use super::handle::Query;
use super::predicate::Case;
use crate::error::{QueryError, QueryResult};
use crate::table::Table;
use crate::value::{ColumnType, Value};
use serde::{Deserialize, Serialize};

/// One builder call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum QueryStep {
    EqualTo {
        column: String,
        value: Value,
        #[serde(default)]
        case: Case,
    },
    NotEqualTo {
        column: String,
        value: Value,
        #[serde(default)]
        case: Case,
    },
    LessThan {
        column: String,
        value: Value,
    },
    LessThanOrEqual {
        column: String,
        value: Value,
    },
    GreaterThan {
        column: String,
        value: Value,
    },
    GreaterThanOrEqual {
        column: String,
        value: Value,
    },
    Between {
        column: String,
        lo: Value,
        hi: Value,
    },
    BeginsWith {
        column: String,
        text: String,
        #[serde(default)]
        case: Case,
    },
    EndsWith {
        column: String,
        text: String,
        #[serde(default)]
        case: Case,
    },
    Contains {
        column: String,
        text: String,
        #[serde(default)]
        case: Case,
    },
    IsNull {
        column: String,
    },
    IsNotNull {
        column: String,
    },
    Group,
    EndGroup,
    Or,
    Not,
}

/// Ordered list of query steps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    #[serde(default)]
    pub steps: Vec<QueryStep>,
}

impl QueryDescriptor {
    pub fn new(steps: Vec<QueryStep>) -> Self {
        Self { steps }
    }

    /// Build a query over a table
    pub fn to_query(&self, table: &Table) -> QueryResult<Query> {
        let mut query = table.query()?;
        self.apply(&mut query)?;
        Ok(query)
    }

    /// Replay every step onto a query, stopping at the first failure
    pub fn apply(&self, query: &mut Query) -> QueryResult<()> {
        for step in &self.steps {
            apply_step(query, step)?;
        }
        Ok(())
    }
}

fn text_operand(column: usize, value: &Value) -> QueryResult<&str> {
    value
        .as_str()
        .ok_or_else(|| QueryError::type_mismatch(column, ColumnType::String, value.type_name()))
}

fn resolve(query: &Query, name: &str) -> QueryResult<usize> {
    query.builder().schema().require_column(name)
}

fn apply_step(query: &mut Query, step: &QueryStep) -> QueryResult<()> {
    match step {
        QueryStep::EqualTo {
            column,
            value,
            case,
        } => {
            let column = resolve(query, column)?;
            match case {
                Case::Sensitive => query.equal_to(column, value.clone())?,
                Case::Insensitive => {
                    query.equal_to_case(column, text_operand(column, value)?, *case)?
                }
            };
        }
        QueryStep::NotEqualTo {
            column,
            value,
            case,
        } => {
            let column = resolve(query, column)?;
            match case {
                Case::Sensitive => query.not_equal_to(column, value.clone())?,
                Case::Insensitive => {
                    query.not_equal_to_case(column, text_operand(column, value)?, *case)?
                }
            };
        }
        QueryStep::LessThan { column, value } => {
            let column = resolve(query, column)?;
            query.less_than(column, value.clone())?;
        }
        QueryStep::LessThanOrEqual { column, value } => {
            let column = resolve(query, column)?;
            query.less_than_or_equal(column, value.clone())?;
        }
        QueryStep::GreaterThan { column, value } => {
            let column = resolve(query, column)?;
            query.greater_than(column, value.clone())?;
        }
        QueryStep::GreaterThanOrEqual { column, value } => {
            let column = resolve(query, column)?;
            query.greater_than_or_equal(column, value.clone())?;
        }
        QueryStep::Between { column, lo, hi } => {
            let column = resolve(query, column)?;
            query.between(column, lo.clone(), hi.clone())?;
        }
        QueryStep::BeginsWith { column, text, case } => {
            let column = resolve(query, column)?;
            query.begins_with_case(column, text, *case)?;
        }
        QueryStep::EndsWith { column, text, case } => {
            let column = resolve(query, column)?;
            query.ends_with_case(column, text, *case)?;
        }
        QueryStep::Contains { column, text, case } => {
            let column = resolve(query, column)?;
            query.contains_case(column, text, *case)?;
        }
        QueryStep::IsNull { column } => {
            let column = resolve(query, column)?;
            query.is_null(column)?;
        }
        QueryStep::IsNotNull { column } => {
            let column = resolve(query, column)?;
            query.is_not_null(column)?;
        }
        QueryStep::Group => {
            query.group()?;
        }
        QueryStep::EndGroup => {
            query.end_group()?;
        }
        QueryStep::Or => {
            query.or()?;
        }
        QueryStep::Not => {
            query.not()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ResultWindow;
    use crate::schema::ColumnSpec;

    fn table() -> Table {
        let table = Table::new(
            "scores",
            vec![
                ColumnSpec::new("name", ColumnType::String),
                ColumnSpec::new("score", ColumnType::Int),
            ],
        );
        for (name, score) in [("Alice", 420i64), ("bob", 770), ("ALINA", 875)] {
            table.add_row(vec![name.into(), score.into()]).unwrap();
        }
        table
    }

    #[test]
    fn test_replay_steps() {
        let descriptor = QueryDescriptor::new(vec![
            QueryStep::Group,
            QueryStep::BeginsWith {
                column: "name".into(),
                text: "al".into(),
                case: Case::Insensitive,
            },
            QueryStep::Or,
            QueryStep::EqualTo {
                column: "name".into(),
                value: "bob".into(),
                case: Case::Sensitive,
            },
            QueryStep::EndGroup,
            QueryStep::GreaterThan {
                column: "score".into(),
                value: Value::Int(500),
            },
        ]);
        let query = descriptor.to_query(&table()).unwrap();
        assert_eq!(query.count(&ResultWindow::all()).unwrap(), 2);
    }

    #[test]
    fn test_replay_negation() {
        let descriptor: QueryDescriptor = toml::from_str(
            r#"
            [[steps]]
            op = "not"

            [[steps]]
            op = "begins_with"
            column = "name"
            text = "AL"
            case = "insensitive"
            "#,
        )
        .unwrap();
        assert_eq!(descriptor.steps[0], QueryStep::Not);
        let query = descriptor.to_query(&table()).unwrap();
        assert_eq!(query.count(&ResultWindow::all()).unwrap(), 1);
    }

    #[test]
    fn test_unknown_column() {
        let descriptor = QueryDescriptor::new(vec![QueryStep::IsNull {
            column: "missing".into(),
        }]);
        assert_eq!(
            descriptor.to_query(&table()).unwrap_err(),
            QueryError::UnknownColumn("missing".into())
        );
    }

    #[test]
    fn test_insensitive_equality_requires_text() {
        let descriptor = QueryDescriptor::new(vec![QueryStep::EqualTo {
            column: "score".into(),
            value: Value::Int(1),
            case: Case::Insensitive,
        }]);
        assert!(matches!(
            descriptor.to_query(&table()),
            Err(QueryError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_deserialize_from_toml() {
        let descriptor: QueryDescriptor = toml::from_str(
            r#"
            [[steps]]
            op = "equal_to"
            column = "score"
            value = { type = "Int", value = 770 }

            [[steps]]
            op = "or"

            [[steps]]
            op = "contains"
            column = "name"
            text = "LI"
            case = "insensitive"
            "#,
        )
        .unwrap();
        assert_eq!(descriptor.steps.len(), 3);
        assert_eq!(descriptor.steps[1], QueryStep::Or);
        let query = descriptor.to_query(&table()).unwrap();
        assert_eq!(query.count(&ResultWindow::all()).unwrap(), 3);
    }
}
