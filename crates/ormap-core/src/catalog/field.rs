//! Property definitions for classes.

use super::types::PropType;

/// A mapped property within a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropDef {
    /// Property name as used by criteria and order strings.
    pub name: String,
    /// Physical column name.
    pub field_name: String,
    /// Semantic type of the property.
    pub prop_type: PropType,
    /// Whether the property may be edited after load.
    pub read_only: bool,
}

impl PropDef {
    /// Create a property whose column has the same name.
    pub fn new(name: impl Into<String>, prop_type: PropType) -> Self {
        let name = name.into();
        Self {
            field_name: name.clone(),
            name,
            prop_type,
            read_only: false,
        }
    }

    /// Map the property to a differently named column.
    pub fn with_field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }

    /// Mark the property as read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}
