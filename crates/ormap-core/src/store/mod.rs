//! Data store backends.
//!
//! The loader talks to storage only through [`DataStore`]. A store receives a
//! prepared [`SelectQuery`] and returns raw [`Record`]s; it never sees live
//! objects.

mod memory;

pub use memory::MemoryStore;

use ormap_proto::Record;

use crate::error::Result;
use crate::query::SelectQuery;

/// A backend able to run select queries.
///
/// Returned records carry every select field keyed by its alias (the property
/// name) and, for every order field with relationship hops, a value keyed by
/// the dotted path. A store that knows the concrete class of a row sets
/// [`Record::class_name`].
pub trait DataStore: Send + Sync {
    /// Run the query, honouring its criteria, discriminator criteria, order
    /// and paging.
    fn execute(&self, query: &SelectQuery) -> Result<Vec<Record>>;

    /// Count matching records, ignoring paging.
    fn count(&self, query: &SelectQuery) -> Result<usize>;
}
