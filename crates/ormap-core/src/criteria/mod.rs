//! Criteria: composable predicates over object properties.
//!
//! A [`Criteria`] tree can be matched against in-memory objects, rendered to
//! a canonical string, parsed back, and prepared against class metadata by
//! the [`crate::query::QueryBuilder`].

#[allow(clippy::module_inception)]
mod criteria;
mod error;
mod evaluator;
mod field;
mod lexer;
mod parser;

pub use criteria::{ComparisonOp, Criteria, LogicalOp};
pub use error::{ParseError, Span};
pub use evaluator::{compare_values, like_match, values_equal, PropertyLookup};
pub use field::{PropertyPath, QueryField};
pub use lexer::{tokenize, Lexer, SpannedToken, Token};
pub use parser::{parse, Parser};
