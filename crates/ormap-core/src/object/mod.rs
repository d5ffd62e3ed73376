//! Live business objects, the identity map and object collections.

mod business_object;
mod collection;
mod identity_map;

pub use business_object::{BusinessObject, IdentityKey, ObjectId, ObjectStatus};
pub use collection::BusinessObjectCollection;
pub use identity_map::{IdentityMap, Reconciled};
