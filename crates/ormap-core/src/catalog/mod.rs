//! Class metadata catalog.
//!
//! The catalog stores class definitions: table mappings, properties,
//! relationships and inheritance declarations.

mod catalog;
mod entity;
mod field;
mod relation;
mod types;

pub use catalog::Catalog;
pub use entity::{AfterLoadHook, ClassDef, InheritanceKind};
pub use field::PropDef;
pub use relation::{Cardinality, RelKey, RelationshipDef};
pub use types::PropType;
