//! Predicate tree builder
//!
//! The builder validates every comparison against the schema as it is added,
//! so a tree that builds successfully never fails on type grounds while it
//! is evaluated. A failed call leaves the builder unchanged.

use super::predicate::{Case, Group, Node, Operator, Predicate, PredicateTree};
use crate::error::{QueryError, QueryResult};
use crate::schema::TableSchema;
use crate::value::{fold_case, ColumnType, Value};

/// One open scope: the root or an unclosed group
#[derive(Debug, Clone)]
struct Scope {
    group: Group,
    /// Set by `or()` until the next predicate or group lands
    pending_or: bool,
    /// Set by `not()` until the next predicate or group lands
    pending_not: bool,
}

impl Scope {
    fn new() -> Self {
        Self {
            group: Group::new(),
            pending_or: false,
            pending_not: false,
        }
    }

    fn push(&mut self, node: Node) {
        let node = if self.pending_not {
            self.pending_not = false;
            Node::Not(Box::new(node))
        } else {
            node
        };
        if self.pending_or {
            self.group.conjunctions.push(vec![node]);
            self.pending_or = false;
        } else if let Some(conjunction) = self.group.conjunctions.last_mut() {
            conjunction.push(node);
        }
    }

    fn current_is_empty(&self) -> bool {
        self.group
            .conjunctions
            .last()
            .map_or(true, Vec::is_empty)
    }
}

/// Incremental builder of a [`PredicateTree`]
#[derive(Debug, Clone)]
pub struct PredicateBuilder {
    schema: TableSchema,
    /// Open scopes; the first entry is the root and is never popped
    scopes: Vec<Scope>,
}

impl PredicateBuilder {
    /// Create a builder validating against a schema
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            scopes: vec![Scope::new()],
        }
    }

    /// Schema the builder validates against
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Number of currently open groups
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    fn scope(&mut self) -> &mut Scope {
        // The root scope is never popped, so the stack is never empty.
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    /// Check an operator against the column type
    fn check_operator(&self, column: usize, operator: Operator) -> QueryResult<ColumnType> {
        let column_spec = self.schema.column(column)?;
        let column_type = column_spec.column_type;

        let supported = match operator {
            Operator::Equal | Operator::NotEqual => column_type != ColumnType::Table,
            Operator::Between => column_type.is_ordered(),
            Operator::Less | Operator::LessEqual | Operator::Greater | Operator::GreaterEqual => {
                column_type.is_ordered() || column_type == ColumnType::Any
            }
            Operator::BeginsWith | Operator::EndsWith | Operator::Contains => {
                column_type == ColumnType::String
            }
            Operator::IsNull | Operator::IsNotNull => column_spec.accepts_null(),
        };

        if supported {
            Ok(column_type)
        } else {
            Err(QueryError::UnsupportedOperator {
                operator: operator.as_str(),
                column,
                column_type,
            })
        }
    }

    /// Check an operand against the column type
    fn check_operand(
        &self,
        column: usize,
        column_type: ColumnType,
        operator: Operator,
        operand: &Value,
    ) -> QueryResult<()> {
        let Some(operand_type) = operand.column_type() else {
            return Err(QueryError::type_mismatch(column, column_type, "Null"));
        };

        if column_type != ColumnType::Any {
            if operand_type == column_type {
                return Ok(());
            }
            return Err(QueryError::type_mismatch(
                column,
                column_type,
                operand.type_name(),
            ));
        }

        match operand_type {
            ColumnType::Table => Err(QueryError::type_mismatch(
                column,
                column_type,
                operand.type_name(),
            )),
            found if operator.is_ordered() && !found.is_ordered() => {
                Err(QueryError::UnsupportedOperator {
                    operator: operator.as_str(),
                    column,
                    column_type: found,
                })
            }
            _ => Ok(()),
        }
    }

    fn add(
        &mut self,
        column: usize,
        operator: Operator,
        operands: Vec<Value>,
        case: Case,
    ) -> QueryResult<&mut Self> {
        let column_type = self.check_operator(column, operator)?;
        for operand in &operands {
            self.check_operand(column, column_type, operator, operand)?;
        }

        let operands = match case {
            Case::Sensitive => operands,
            Case::Insensitive => operands
                .into_iter()
                .map(|operand| match operand {
                    Value::String(text) => Value::String(fold_case(&text)),
                    other => other,
                })
                .collect(),
        };

        self.scope().push(Node::Leaf(Predicate {
            column,
            operator,
            operands,
            case,
        }));
        Ok(self)
    }

    fn add_text(
        &mut self,
        column: usize,
        operator: Operator,
        text: &str,
        case: Case,
    ) -> QueryResult<&mut Self> {
        if case == Case::Insensitive || operator.is_text() {
            let column_type = self.schema.column_type(column)?;
            if column_type != ColumnType::String {
                return Err(QueryError::UnsupportedOperator {
                    operator: operator.as_str(),
                    column,
                    column_type,
                });
            }
        }
        self.add(column, operator, vec![Value::from(text)], case)
    }

    pub fn equal_to(&mut self, column: usize, value: impl Into<Value>) -> QueryResult<&mut Self> {
        self.add(column, Operator::Equal, vec![value.into()], Case::Sensitive)
    }

    pub fn not_equal_to(
        &mut self,
        column: usize,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add(column, Operator::NotEqual, vec![value.into()], Case::Sensitive)
    }

    pub fn less_than(&mut self, column: usize, value: impl Into<Value>) -> QueryResult<&mut Self> {
        self.add(column, Operator::Less, vec![value.into()], Case::Sensitive)
    }

    pub fn less_than_or_equal(
        &mut self,
        column: usize,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add(column, Operator::LessEqual, vec![value.into()], Case::Sensitive)
    }

    pub fn greater_than(
        &mut self,
        column: usize,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add(column, Operator::Greater, vec![value.into()], Case::Sensitive)
    }

    pub fn greater_than_or_equal(
        &mut self,
        column: usize,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add(column, Operator::GreaterEqual, vec![value.into()], Case::Sensitive)
    }

    /// Inclusive range test. `lo > hi` is accepted and matches nothing.
    pub fn between(
        &mut self,
        column: usize,
        lo: impl Into<Value>,
        hi: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        let operands = vec![lo.into(), hi.into()];
        if operands[0].column_type() != operands[1].column_type() {
            let column_type = self.schema.column_type(column)?;
            return Err(QueryError::type_mismatch(
                column,
                column_type,
                format!("{} and {}", operands[0].type_name(), operands[1].type_name()),
            ));
        }
        self.add(column, Operator::Between, operands, Case::Sensitive)
    }

    /// String equality with explicit case sensitivity
    pub fn equal_to_case(&mut self, column: usize, text: &str, case: Case) -> QueryResult<&mut Self> {
        self.add_text(column, Operator::Equal, text, case)
    }

    /// String inequality with explicit case sensitivity
    pub fn not_equal_to_case(
        &mut self,
        column: usize,
        text: &str,
        case: Case,
    ) -> QueryResult<&mut Self> {
        self.add_text(column, Operator::NotEqual, text, case)
    }

    pub fn begins_with(&mut self, column: usize, text: &str) -> QueryResult<&mut Self> {
        self.add_text(column, Operator::BeginsWith, text, Case::Sensitive)
    }

    pub fn begins_with_case(
        &mut self,
        column: usize,
        text: &str,
        case: Case,
    ) -> QueryResult<&mut Self> {
        self.add_text(column, Operator::BeginsWith, text, case)
    }

    pub fn ends_with(&mut self, column: usize, text: &str) -> QueryResult<&mut Self> {
        self.add_text(column, Operator::EndsWith, text, Case::Sensitive)
    }

    pub fn ends_with_case(
        &mut self,
        column: usize,
        text: &str,
        case: Case,
    ) -> QueryResult<&mut Self> {
        self.add_text(column, Operator::EndsWith, text, case)
    }

    pub fn contains(&mut self, column: usize, text: &str) -> QueryResult<&mut Self> {
        self.add_text(column, Operator::Contains, text, Case::Sensitive)
    }

    pub fn contains_case(&mut self, column: usize, text: &str, case: Case) -> QueryResult<&mut Self> {
        self.add_text(column, Operator::Contains, text, case)
    }

    /// Match null cells of a nullable or Any column
    pub fn is_null(&mut self, column: usize) -> QueryResult<&mut Self> {
        self.add(column, Operator::IsNull, Vec::new(), Case::Sensitive)
    }

    /// Match non-null cells of a nullable or Any column
    pub fn is_not_null(&mut self, column: usize) -> QueryResult<&mut Self> {
        self.add(column, Operator::IsNotNull, Vec::new(), Case::Sensitive)
    }

    /// Open a nested scope
    pub fn group(&mut self) -> QueryResult<&mut Self> {
        self.scopes.push(Scope::new());
        Ok(self)
    }

    /// Close the innermost scope, adding it as one node of its parent
    pub fn end_group(&mut self) -> QueryResult<&mut Self> {
        if self.scopes.len() == 1 {
            return Err(QueryError::UnbalancedGroup(
                "end_group without a matching group".to_string(),
            ));
        }
        if self.scope().pending_or {
            return Err(QueryError::DanglingCombinator(
                "or directly before end_group".to_string(),
            ));
        }
        if self.scope().pending_not {
            return Err(QueryError::DanglingCombinator(
                "not directly before end_group".to_string(),
            ));
        }

        if let Some(closed) = self.scopes.pop() {
            self.scope().push(Node::Group(closed.group));
        }
        Ok(self)
    }

    /// Combine the next predicate or group with OR instead of AND
    pub fn or(&mut self) -> QueryResult<&mut Self> {
        let scope = self.scope();
        if scope.pending_or {
            return Err(QueryError::DanglingCombinator(
                "or directly after or".to_string(),
            ));
        }
        if scope.pending_not {
            return Err(QueryError::DanglingCombinator(
                "or directly after not".to_string(),
            ));
        }
        if scope.current_is_empty() {
            return Err(QueryError::DanglingCombinator(
                "or at the start of a scope".to_string(),
            ));
        }
        scope.pending_or = true;
        Ok(self)
    }

    /// Negate the next predicate or group
    pub fn not(&mut self) -> QueryResult<&mut Self> {
        let scope = self.scope();
        if scope.pending_not {
            return Err(QueryError::DanglingCombinator(
                "not directly after not".to_string(),
            ));
        }
        scope.pending_not = true;
        Ok(self)
    }

    /// Produce the predicate tree. The builder stays usable.
    pub fn build(&self) -> QueryResult<PredicateTree> {
        if self.scopes.len() > 1 {
            return Err(QueryError::UnbalancedGroup(format!(
                "{} group(s) left open",
                self.scopes.len() - 1
            )));
        }
        let root = &self.scopes[0];
        if root.pending_or {
            return Err(QueryError::DanglingCombinator(
                "or without a following predicate".to_string(),
            ));
        }
        if root.pending_not {
            return Err(QueryError::DanglingCombinator(
                "not without a following predicate".to_string(),
            ));
        }
        Ok(PredicateTree::from_root(root.group.clone()))
    }
}
