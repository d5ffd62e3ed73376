//! Query model for ormap.
//!
//! This module holds the source/join graph, the select query and order
//! criteria consumed by data stores, and the builder that derives them from
//! class metadata.

mod builder;
mod order;
mod select_query;
mod source;

pub use builder::QueryBuilder;
pub use order::{OrderCriteria, OrderField, SortDirection};
pub use select_query::SelectQuery;
pub use source::{Join, JoinField, JoinType, Source};
