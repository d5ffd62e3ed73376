//! Property paths and query fields.

use std::fmt;

use crate::query::Source;

/// A dotted property path, split into relationship hops and a terminal property.
///
/// `Car.Owner.Surname` has hops `["Car", "Owner"]` and property `Surname`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PropertyPath {
    /// Relationship names walked before reaching the property.
    pub hops: Vec<String>,
    /// Terminal property name.
    pub property: String,
}

impl PropertyPath {
    /// A path naming a property of the queried class itself.
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            hops: Vec::new(),
            property: property.into(),
        }
    }

    /// Split a dotted path. Surrounding whitespace is ignored.
    pub fn parse(path: &str) -> Self {
        let mut parts: Vec<String> = path.trim().split('.').map(|p| p.trim().to_string()).collect();
        let property = parts.pop().unwrap_or_default();
        Self {
            hops: parts,
            property,
        }
    }

    /// Whether the path walks at least one relationship.
    pub fn has_hops(&self) -> bool {
        !self.hops.is_empty()
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for hop in &self.hops {
            write!(f, "{}.", hop)?;
        }
        write!(f, "{}", self.property)
    }
}

/// One column seen through one table context.
///
/// Unprepared fields only carry their [`PropertyPath`]; preparation against a
/// class attaches the physical column, the owning table and the source chain
/// that reaches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryField {
    /// Path as written by the caller.
    pub path: PropertyPath,
    /// Physical column name. Equals the property name until prepared.
    pub field_name: String,
    /// Source chain rooted at the queried class. Set by preparation.
    pub source: Option<Source>,
    /// Table owning the column. Set by preparation.
    pub entity_name: Option<String>,
}

impl QueryField {
    /// Unprepared field for a property of the queried class.
    pub fn new(property: impl Into<String>) -> Self {
        Self::from_property_path(PropertyPath::new(property))
    }

    /// Unprepared field from a dotted path.
    pub fn from_path(path: &str) -> Self {
        Self::from_property_path(PropertyPath::parse(path))
    }

    /// Unprepared field from a parsed path.
    pub fn from_property_path(path: PropertyPath) -> Self {
        Self {
            field_name: path.property.clone(),
            path,
            source: None,
            entity_name: None,
        }
    }

    /// Prepared field.
    pub fn prepared(
        path: PropertyPath,
        field_name: impl Into<String>,
        source: Source,
        entity_name: impl Into<String>,
    ) -> Self {
        Self {
            path,
            field_name: field_name.into(),
            source: Some(source),
            entity_name: Some(entity_name.into()),
        }
    }

    /// Terminal property name.
    pub fn property_name(&self) -> &str {
        &self.path.property
    }

    /// Whether a source has been attached.
    pub fn is_prepared(&self) -> bool {
        self.source.is_some()
    }

    /// `table.column` when prepared, otherwise the dotted property path.
    pub fn qualified_name(&self) -> String {
        match (&self.entity_name, self.is_prepared()) {
            (Some(entity), true) => format!("{}.{}", entity, self.field_name),
            _ => self.path.to_string(),
        }
    }
}

impl fmt::Display for QueryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}
