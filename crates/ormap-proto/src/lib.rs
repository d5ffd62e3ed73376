//! ormap value types.
//!
//! This crate defines the runtime values and raw records that flow between the
//! mapping core and its data stores.
//!
//! # Modules
//!
//! - [`value`] - Runtime values for properties, columns and criteria literals
//! - [`record`] - Raw records returned by a data store
//! - [`error`] - Value conversion errors

pub mod error;
pub mod record;
pub mod value;

pub use error::Error;
pub use record::Record;
pub use value::{format_timestamp, Value};
