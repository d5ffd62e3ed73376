//! ormap core - catalog, criteria, query building and object loading.
//!
//! A [`Catalog`] describes classes, their tables, properties, relationships
//! and inheritance. [`Criteria`] and [`OrderCriteria`] are resolved against it
//! by the [`QueryBuilder`] into [`SelectQuery`]s, which a [`DataStore`]
//! executes. The [`BusinessObjectLoader`] reconciles the results with an
//! [`IdentityMap`] so that each `(class, key)` has one live object.

pub mod catalog;
pub mod criteria;
pub mod error;
pub mod loader;
pub mod object;
pub mod query;
pub mod store;

pub use catalog::{
    AfterLoadHook, Cardinality, Catalog, ClassDef, InheritanceKind, PropDef, PropType, RelKey,
    RelationshipDef,
};
pub use criteria::{ComparisonOp, Criteria, LogicalOp, ParseError, PropertyLookup, QueryField};
pub use error::{Error, Result};
pub use loader::{BusinessObjectLoader, LoaderConfig};
pub use object::{BusinessObject, BusinessObjectCollection, IdentityKey, IdentityMap, ObjectId, ObjectStatus, Reconciled};
pub use query::{Join, JoinField, JoinType, OrderCriteria, OrderField, QueryBuilder, SelectQuery, SortDirection, Source};
pub use store::{DataStore, MemoryStore};

/// Re-export protocol types.
pub use ormap_proto as proto;
