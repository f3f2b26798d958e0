//! Row matching against a predicate tree

use super::predicate::{Case, Group, Node, Operator, Predicate, PredicateTree};
use crate::error::QueryResult;
use crate::table::ColumnAccessor;
use crate::value::{fold_case, Value};
use std::cmp::Ordering;

impl Predicate {
    /// Evaluate the predicate against one cell.
    ///
    /// Null cells only satisfy `is_null`. Cells whose type tag differs from
    /// the operand (possible in Any columns) never match.
    pub fn matches_value(&self, cell: &Value) -> bool {
        match self.operator {
            Operator::IsNull => return cell.is_null(),
            Operator::IsNotNull => return !cell.is_null(),
            _ => {}
        }

        let operand = self.operand();
        if cell.is_null() || cell.column_type() != operand.column_type() {
            return false;
        }

        match self.operator {
            Operator::Equal => match (self.case, cell, operand) {
                (Case::Insensitive, Value::String(text), Value::String(folded)) => {
                    fold_case(text) == *folded
                }
                _ => cell == operand,
            },
            Operator::NotEqual => match (self.case, cell, operand) {
                (Case::Insensitive, Value::String(text), Value::String(folded)) => {
                    fold_case(text) != *folded
                }
                _ => cell != operand,
            },
            Operator::Less => cell.partial_compare(operand) == Some(Ordering::Less),
            Operator::LessEqual => matches!(
                cell.partial_compare(operand),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Greater => cell.partial_compare(operand) == Some(Ordering::Greater),
            Operator::GreaterEqual => matches!(
                cell.partial_compare(operand),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Between => {
                let upper = self.upper();
                matches!(
                    cell.partial_compare(operand),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(
                    cell.partial_compare(upper),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }
            Operator::BeginsWith | Operator::EndsWith | Operator::Contains => {
                match (cell.as_str(), operand.as_str()) {
                    (Some(text), Some(needle)) => self.text_matches(text, needle),
                    _ => false,
                }
            }
            Operator::IsNull | Operator::IsNotNull => false,
        }
    }

    fn text_matches(&self, text: &str, needle: &str) -> bool {
        let folded;
        let haystack = match self.case {
            Case::Sensitive => text,
            Case::Insensitive => {
                folded = fold_case(text);
                folded.as_str()
            }
        };
        match self.operator {
            Operator::BeginsWith => haystack.starts_with(needle),
            Operator::EndsWith => haystack.ends_with(needle),
            Operator::Contains => haystack.contains(needle),
            _ => false,
        }
    }
}

/// Evaluates predicate trees against rows of an accessor
pub struct Matcher<'a, A: ColumnAccessor + ?Sized> {
    accessor: &'a A,
    tree: &'a PredicateTree,
}

impl<'a, A: ColumnAccessor + ?Sized> Matcher<'a, A> {
    pub fn new(accessor: &'a A, tree: &'a PredicateTree) -> Self {
        Self { accessor, tree }
    }

    /// Check whether the row at a table position matches
    pub fn matches(&self, row: usize) -> QueryResult<bool> {
        self.matches_group(self.tree.root(), row)
    }

    /// OR over conjunctions, AND within each; both short-circuit
    fn matches_group(&self, group: &Group, row: usize) -> QueryResult<bool> {
        for conjunction in group.conjunctions() {
            if self.matches_conjunction(conjunction, row)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn matches_conjunction(&self, nodes: &[Node], row: usize) -> QueryResult<bool> {
        for node in nodes {
            if !self.matches_node(node, row)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn matches_node(&self, node: &Node, row: usize) -> QueryResult<bool> {
        match node {
            Node::Leaf(predicate) => {
                let cell = self.accessor.read_value(predicate.column, row)?;
                Ok(predicate.matches_value(cell))
            }
            Node::Group(group) => self.matches_group(group, row),
            Node::Not(inner) => Ok(!self.matches_node(inner, row)?),
        }
    }
}
