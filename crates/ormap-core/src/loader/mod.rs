//! Business object loading.
//!
//! [`BusinessObjectLoader`] turns criteria into prepared select queries, runs
//! them against a [`DataStore`](crate::store::DataStore) and reconciles the
//! returned records with the [`IdentityMap`](crate::object::IdentityMap).

mod config;
mod object_loader;

pub use config::LoaderConfig;
pub use object_loader::BusinessObjectLoader;
