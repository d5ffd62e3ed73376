//! Class definitions.

use std::fmt;
use std::sync::Arc;

use super::field::PropDef;
use super::relation::RelationshipDef;
use crate::object::BusinessObject;

/// How a class is mapped relative to its parent class.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InheritanceKind {
    /// No parent class.
    #[default]
    None,
    /// Own table holding own properties, joined to each ancestor's table on the
    /// primary key.
    ClassTable { parent: String },
    /// Shares the root's table; rows are told apart by a discriminator column.
    SingleTable {
        parent: String,
        discriminator: String,
    },
    /// Own table holding every property, including inherited ones.
    ConcreteTable { parent: String },
}

impl InheritanceKind {
    /// Name of the parent class, if any.
    pub fn parent(&self) -> Option<&str> {
        match self {
            InheritanceKind::None => None,
            InheritanceKind::ClassTable { parent }
            | InheritanceKind::SingleTable { parent, .. }
            | InheritanceKind::ConcreteTable { parent } => Some(parent),
        }
    }
}

/// Hook invoked on an object after its values were (re)loaded from a store.
#[derive(Clone)]
pub struct AfterLoadHook(Arc<dyn Fn(&BusinessObject) + Send + Sync>);

impl AfterLoadHook {
    /// Wrap a callback.
    pub fn new(hook: impl Fn(&BusinessObject) + Send + Sync + 'static) -> Self {
        Self(Arc::new(hook))
    }

    /// Invoke the callback.
    pub fn call(&self, object: &BusinessObject) {
        (self.0)(object)
    }
}

impl fmt::Debug for AfterLoadHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AfterLoadHook")
    }
}

/// A class definition: table mapping, properties, relationships and inheritance.
#[derive(Debug, Clone)]
pub struct ClassDef {
    /// Class name (unique within the catalog).
    pub class_name: String,
    /// Physical table name.
    pub table_name: String,
    /// Names of the primary key properties. Empty means inherited.
    pub primary_key: Vec<String>,
    /// Properties declared by this class (not its ancestors).
    pub properties: Vec<PropDef>,
    /// Relationships declared by this class (not its ancestors).
    pub relationships: Vec<RelationshipDef>,
    /// Inheritance declaration.
    pub inheritance: InheritanceKind,
    /// Abstract classes cannot be loaded directly.
    pub is_abstract: bool,
    /// Optional post-load hook.
    pub after_load: Option<AfterLoadHook>,
}

impl ClassDef {
    /// Create a class mapped to a table of the same name.
    pub fn new(class_name: impl Into<String>) -> Self {
        let class_name = class_name.into();
        Self {
            table_name: class_name.clone(),
            class_name,
            primary_key: Vec::new(),
            properties: Vec::new(),
            relationships: Vec::new(),
            inheritance: InheritanceKind::None,
            is_abstract: false,
            after_load: None,
        }
    }

    /// Map the class to a table.
    pub fn with_table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Set the primary key properties.
    pub fn with_primary_key<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = properties.into_iter().map(Into::into).collect();
        self
    }

    /// Add a property.
    pub fn with_property(mut self, property: PropDef) -> Self {
        self.properties.push(property);
        self
    }

    /// Add multiple properties.
    pub fn with_properties(mut self, properties: impl IntoIterator<Item = PropDef>) -> Self {
        self.properties.extend(properties);
        self
    }

    /// Add a relationship.
    pub fn with_relationship(mut self, relationship: RelationshipDef) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Inherit from `parent` using class-table inheritance.
    pub fn inherits_class_table(mut self, parent: impl Into<String>) -> Self {
        self.inheritance = InheritanceKind::ClassTable {
            parent: parent.into(),
        };
        self
    }

    /// Inherit from `parent` using single-table inheritance.
    pub fn inherits_single_table(
        mut self,
        parent: impl Into<String>,
        discriminator: impl Into<String>,
    ) -> Self {
        self.inheritance = InheritanceKind::SingleTable {
            parent: parent.into(),
            discriminator: discriminator.into(),
        };
        self
    }

    /// Inherit from `parent` using concrete-table inheritance.
    pub fn inherits_concrete_table(mut self, parent: impl Into<String>) -> Self {
        self.inheritance = InheritanceKind::ConcreteTable {
            parent: parent.into(),
        };
        self
    }

    /// Mark the class abstract.
    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Install a post-load hook.
    pub fn with_after_load(mut self, hook: impl Fn(&BusinessObject) + Send + Sync + 'static) -> Self {
        self.after_load = Some(AfterLoadHook::new(hook));
        self
    }

    /// Get a property declared by this class, ignoring ASCII case.
    pub fn get_property(&self, name: &str) -> Option<&PropDef> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Get a relationship declared by this class, ignoring ASCII case.
    pub fn get_relationship(&self, name: &str) -> Option<&RelationshipDef> {
        self.relationships
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// Name of the parent class, if any.
    pub fn parent_name(&self) -> Option<&str> {
        self.inheritance.parent()
    }

    /// Check if this class is a single-table inheritance child.
    pub fn is_single_table_child(&self) -> bool {
        matches!(self.inheritance, InheritanceKind::SingleTable { .. })
    }

    /// Discriminator column used by this class, if it is a single-table child.
    pub fn discriminator(&self) -> Option<&str> {
        match &self.inheritance {
            InheritanceKind::SingleTable { discriminator, .. } => Some(discriminator),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PropType;

    #[test]
    fn test_class_builder() {
        let class = ClassDef::new("Person")
            .with_table("tbl_person")
            .with_primary_key(["PersonId"])
            .with_property(PropDef::new("PersonId", PropType::Guid))
            .with_property(PropDef::new("Surname", PropType::String));

        assert_eq!(class.class_name, "Person");
        assert_eq!(class.table_name, "tbl_person");
        assert_eq!(class.primary_key, vec!["PersonId".to_string()]);
        assert!(class.get_property("surname").is_some());
        assert!(class.get_property("nonexistent").is_none());
        assert!(class.parent_name().is_none());
    }

    #[test]
    fn test_inheritance_declarations() {
        let circle = ClassDef::new("Circle").inherits_single_table("Shape", "ShapeType");
        assert!(circle.is_single_table_child());
        assert_eq!(circle.discriminator(), Some("ShapeType"));
        assert_eq!(circle.parent_name(), Some("Shape"));

        let square = ClassDef::new("Square").inherits_class_table("Shape");
        assert!(!square.is_single_table_child());
        assert_eq!(square.parent_name(), Some("Shape"));
    }
}
