//! Predicate nodes and trees
//!
//! A tree is a root [`Group`]: a disjunction of conjunctions. Consecutive
//! nodes in one conjunction are ANDed; `or()` in the builder starts the next
//! conjunction. A closed group is a single node of its parent conjunction,
//! and `not()` wraps the node that follows it.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

static NULL_OPERAND: Value = Value::Null;

/// Comparison operator of a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    /// Inclusive on both bounds
    Between,
    BeginsWith,
    EndsWith,
    Contains,
    IsNull,
    IsNotNull,
}

impl Operator {
    /// Returns the operator name used in errors and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "equal_to",
            Operator::NotEqual => "not_equal_to",
            Operator::Less => "less_than",
            Operator::LessEqual => "less_than_or_equal",
            Operator::Greater => "greater_than",
            Operator::GreaterEqual => "greater_than_or_equal",
            Operator::Between => "between",
            Operator::BeginsWith => "begins_with",
            Operator::EndsWith => "ends_with",
            Operator::Contains => "contains",
            Operator::IsNull => "is_null",
            Operator::IsNotNull => "is_not_null",
        }
    }

    /// Check if the operator needs an ordered column type
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            Operator::Less
                | Operator::LessEqual
                | Operator::Greater
                | Operator::GreaterEqual
                | Operator::Between
        )
    }

    /// Check if the operator is a text match
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            Operator::BeginsWith | Operator::EndsWith | Operator::Contains
        )
    }

    /// Number of operands the operator takes
    pub fn arity(&self) -> usize {
        match self {
            Operator::IsNull | Operator::IsNotNull => 0,
            Operator::Between => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case sensitivity of text comparisons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Case {
    #[default]
    Sensitive,
    Insensitive,
}

/// A single column comparison.
///
/// Operands have already been checked against the column type. For
/// case-insensitive text comparisons the operand is stored folded.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: usize,
    pub operator: Operator,
    pub operands: Vec<Value>,
    pub case: Case,
}

impl Predicate {
    /// First operand, or null for operators that take none
    pub fn operand(&self) -> &Value {
        self.operands.first().unwrap_or(&NULL_OPERAND)
    }

    /// Second operand (upper bound of `between`)
    pub fn upper(&self) -> &Value {
        self.operands.get(1).unwrap_or(&NULL_OPERAND)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(col {}", self.operator, self.column)?;
        for operand in &self.operands {
            write!(f, ", {}", operand)?;
        }
        if self.case == Case::Insensitive {
            write!(f, ", insensitive")?;
        }
        write!(f, ")")
    }
}

/// Node of a predicate tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf(Predicate),
    Group(Group),
    /// Logical negation. A row matches when the inner node does not, so a
    /// negated comparison matches null cells.
    Not(Box<Node>),
}

impl Node {
    /// Number of leaf predicates under this node
    pub fn leaf_count(&self) -> usize {
        match self {
            Node::Leaf(_) => 1,
            Node::Group(group) => group.leaf_count(),
            Node::Not(inner) => inner.leaf_count(),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Leaf(predicate) => write!(f, "{}", predicate),
            Node::Group(group) => write!(f, "({})", group),
            Node::Not(inner) => write!(f, "NOT {}", inner),
        }
    }
}

/// Disjunction of conjunctions
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub(crate) conjunctions: Vec<Vec<Node>>,
}

impl Group {
    pub(crate) fn new() -> Self {
        Self {
            conjunctions: vec![Vec::new()],
        }
    }

    /// Conjunctions in insertion order
    pub fn conjunctions(&self) -> &[Vec<Node>] {
        &self.conjunctions
    }

    /// Check if the group holds no predicates
    pub fn is_empty(&self) -> bool {
        self.conjunctions.iter().all(Vec::is_empty)
    }

    /// Number of leaf predicates in the group and its subgroups
    pub fn leaf_count(&self) -> usize {
        self.conjunctions.iter().flatten().map(Node::leaf_count).sum()
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, conjunction) in self.conjunctions.iter().enumerate() {
            if i > 0 {
                write!(f, " OR ")?;
            }
            for (j, node) in conjunction.iter().enumerate() {
                if j > 0 {
                    write!(f, " AND ")?;
                }
                write!(f, "{}", node)?;
            }
        }
        Ok(())
    }
}

/// Immutable predicate tree produced by the builder
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateTree {
    root: Group,
}

impl PredicateTree {
    pub(crate) fn from_root(root: Group) -> Self {
        Self { root }
    }

    /// Tree matching every row
    pub fn match_all() -> Self {
        Self { root: Group::new() }
    }

    /// Tree matching cells equal to `value`, or null cells for a null value.
    ///
    /// The operand is not checked against the column type.
    pub(crate) fn value_lookup(column: usize, value: Value) -> Self {
        let predicate = if value.is_null() {
            Predicate {
                column,
                operator: Operator::IsNull,
                operands: Vec::new(),
                case: Case::Sensitive,
            }
        } else {
            Predicate {
                column,
                operator: Operator::Equal,
                operands: vec![value],
                case: Case::Sensitive,
            }
        };
        Self {
            root: Group {
                conjunctions: vec![vec![Node::Leaf(predicate)]],
            },
        }
    }

    /// Root group
    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Check if the tree has no predicates
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

impl Default for PredicateTree {
    fn default() -> Self {
        Self::match_all()
    }
}

impl fmt::Display for PredicateTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "TRUE")
        } else {
            write!(f, "{}", self.root)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(column: usize, operator: Operator, value: i64) -> Node {
        Node::Leaf(Predicate {
            column,
            operator,
            operands: vec![Value::Int(value)],
            case: Case::Sensitive,
        })
    }

    #[test]
    fn test_operator_properties() {
        assert_eq!(Operator::Between.arity(), 2);
        assert_eq!(Operator::IsNull.arity(), 0);
        assert!(Operator::Between.is_ordered());
        assert!(!Operator::Equal.is_ordered());
        assert!(Operator::Contains.is_text());
    }

    #[test]
    fn test_empty_tree() {
        let tree = PredicateTree::match_all();
        assert!(tree.is_empty());
        assert_eq!(tree.to_string(), "TRUE");
    }

    #[test]
    fn test_display_and_leaf_count() {
        let inner = Group {
            conjunctions: vec![
                vec![leaf(0, Operator::Equal, 1)],
                vec![leaf(0, Operator::Equal, 2)],
            ],
        };
        let root = Group {
            conjunctions: vec![vec![Node::Group(inner), leaf(1, Operator::Greater, 5)]],
        };
        let tree = PredicateTree::from_root(root);
        assert_eq!(tree.root().leaf_count(), 3);
        assert_eq!(
            tree.to_string(),
            "(equal_to(col 0, 1) OR equal_to(col 0, 2)) AND greater_than(col 1, 5)"
        );
    }

    #[test]
    fn test_display_negation() {
        let group = Group {
            conjunctions: vec![vec![leaf(0, Operator::Equal, 1)], vec![leaf(1, Operator::Less, 3)]],
        };
        let root = Group {
            conjunctions: vec![vec![
                Node::Not(Box::new(leaf(0, Operator::Greater, 2))),
                Node::Not(Box::new(Node::Group(group))),
            ]],
        };
        let tree = PredicateTree::from_root(root);
        assert_eq!(tree.root().leaf_count(), 3);
        assert_eq!(
            tree.to_string(),
            "NOT greater_than(col 0, 2) AND NOT (equal_to(col 0, 1) OR less_than(col 1, 3))"
        );
    }
}
