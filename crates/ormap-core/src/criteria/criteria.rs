//! The criteria predicate tree.

use std::fmt;
use std::str::FromStr;

use ormap_proto::Value;

use super::error::{ParseError, Span};
use super::evaluator::{self, PropertyLookup};
use super::field::QueryField;
use super::parser;
use crate::error::Result;
use crate::object::ObjectId;

/// Comparison operator of a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    Like,
    NotLike,
    Is,
    IsNot,
    In,
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ComparisonOp::Equals => "=",
            ComparisonOp::NotEquals => "<>",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterThanEqual => ">=",
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessThanEqual => "<=",
            ComparisonOp::Like => "LIKE",
            ComparisonOp::NotLike => "NOT LIKE",
            ComparisonOp::Is => "IS",
            ComparisonOp::IsNot => "IS NOT",
            ComparisonOp::In => "IN",
        };
        f.write_str(text)
    }
}

/// Logical operator of a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => f.write_str("AND"),
            LogicalOp::Or => f.write_str("OR"),
        }
    }
}

/// A predicate over object properties.
///
/// Either a leaf comparison or a binary AND/OR of two criteria. Criteria can
/// be matched in memory, rendered to a canonical string and parsed back.
#[derive(Debug, Clone)]
pub enum Criteria {
    Leaf {
        field: QueryField,
        op: ComparisonOp,
        value: Value,
    },
    Composite {
        left: Box<Criteria>,
        op: LogicalOp,
        right: Box<Criteria>,
    },
}

impl Criteria {
    /// Leaf comparison of a (possibly dotted) property path.
    pub fn leaf(path: &str, op: ComparisonOp, value: impl Into<Value>) -> Self {
        Criteria::Leaf {
            field: QueryField::from_path(path),
            op,
            value: value.into(),
        }
    }

    /// Leaf comparison of an existing field.
    pub fn for_field(field: QueryField, op: ComparisonOp, value: impl Into<Value>) -> Self {
        Criteria::Leaf {
            field,
            op,
            value: value.into(),
        }
    }

    /// `left AND right`.
    pub fn and(left: Criteria, right: Criteria) -> Self {
        Criteria::Composite {
            left: Box::new(left),
            op: LogicalOp::And,
            right: Box::new(right),
        }
    }

    /// `left OR right`.
    pub fn or(left: Criteria, right: Criteria) -> Self {
        Criteria::Composite {
            left: Box::new(left),
            op: LogicalOp::Or,
            right: Box::new(right),
        }
    }

    /// Combine two optional criteria; a missing side yields the other side.
    pub fn combine(left: Option<Criteria>, op: LogicalOp, right: Option<Criteria>) -> Option<Self> {
        match (left, right) {
            (Some(left), Some(right)) => Some(Criteria::Composite {
                left: Box::new(left),
                op,
                right: Box::new(right),
            }),
            (left, right) => left.or(right),
        }
    }

    /// Equality on every primary key property, AND-chained.
    pub fn from_object_id(id: &ObjectId) -> Option<Self> {
        id.iter().fold(None, |acc, (property, value)| {
            let leaf = Criteria::leaf(property, ComparisonOp::Equals, value.clone());
            Criteria::combine(acc, LogicalOp::And, Some(leaf))
        })
    }

    /// Parse a criteria string. Blank input yields `None`.
    pub fn parse(source: &str) -> std::result::Result<Option<Self>, ParseError> {
        parser::parse(source)
    }

    /// Evaluate against an in-memory object or record.
    pub fn is_match(&self, lookup: &dyn PropertyLookup) -> Result<bool> {
        match self {
            Criteria::Leaf { field, op, value } => {
                let actual = lookup.lookup(field).unwrap_or(Value::Null);
                evaluator::compare(&actual, *op, value)
            }
            Criteria::Composite { left, op, right } => match op {
                LogicalOp::And => Ok(left.is_match(lookup)? && right.is_match(lookup)?),
                LogicalOp::Or => Ok(left.is_match(lookup)? || right.is_match(lookup)?),
            },
        }
    }

    /// Whether every leaf carries a prepared field.
    pub fn is_prepared(&self) -> bool {
        self.fields().iter().all(|f| f.is_prepared())
    }

    /// Fields of all leaves, left to right.
    pub fn fields(&self) -> Vec<&QueryField> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, fields: &mut Vec<&'a QueryField>) {
        match self {
            Criteria::Leaf { field, .. } => fields.push(field),
            Criteria::Composite { left, right, .. } => {
                left.collect_fields(fields);
                right.collect_fields(fields);
            }
        }
    }

    /// Visit every leaf mutably, left to right, stopping at the first error.
    pub fn visit_leaves_mut<F>(&mut self, visit: &mut F) -> Result<()>
    where
        F: FnMut(&mut QueryField, ComparisonOp, &mut Value) -> Result<()>,
    {
        match self {
            Criteria::Leaf { field, op, value } => visit(field, *op, value),
            Criteria::Composite { left, right, .. } => {
                left.visit_leaves_mut(visit)?;
                right.visit_leaves_mut(visit)
            }
        }
    }

    /// Hex blake3 digest of the canonical rendering, for cache keys.
    pub fn fingerprint(&self) -> String {
        hex::encode(blake3::hash(self.to_string().as_bytes()).as_bytes())
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criteria::Leaf { field, op, value } => match op {
                ComparisonOp::Is | ComparisonOp::IsNot => write!(f, "{} {} NULL", field, op),
                ComparisonOp::In if !matches!(value, Value::List(_)) => {
                    write!(f, "{} IN ({})", field, value)
                }
                _ => write!(f, "{} {} {}", field, op, value),
            },
            Criteria::Composite { left, op, right } => {
                write!(f, "({}) {} ({})", left, op, right)
            }
        }
    }
}

impl PartialEq for Criteria {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl FromStr for Criteria {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Criteria::parse(s)?.ok_or_else(|| {
            ParseError::new("criteria string is empty", Span::new(0, s.len()))
        })
    }
}
