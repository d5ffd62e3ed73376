//! Relationship definitions between classes.

/// Cardinality of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// The owner refers to at most one related object.
    Single,
    /// The owner refers to a collection of related objects.
    Multiple,
}

/// One key pair linking an owner property to a related property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelKey {
    /// Property on the owning class.
    pub own_property: String,
    /// Property on the related class.
    pub related_property: String,
}

/// A relationship definition declared on an owning class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDef {
    /// Relationship name (unique within the owning class).
    pub name: String,
    /// Related class name.
    pub related_class: String,
    /// Key pairs; all must match for two objects to be related.
    pub keys: Vec<RelKey>,
    /// Relationship cardinality.
    pub cardinality: Cardinality,
}

impl RelationshipDef {
    /// Create a single relationship (e.g. `Car.Owner`).
    pub fn single(
        name: impl Into<String>,
        related_class: impl Into<String>,
        own_property: impl Into<String>,
        related_property: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            related_class: related_class.into(),
            keys: vec![RelKey {
                own_property: own_property.into(),
                related_property: related_property.into(),
            }],
            cardinality: Cardinality::Single,
        }
    }

    /// Create a multiple relationship (e.g. `Person.Cars`).
    pub fn multiple(
        name: impl Into<String>,
        related_class: impl Into<String>,
        own_property: impl Into<String>,
        related_property: impl Into<String>,
    ) -> Self {
        Self {
            cardinality: Cardinality::Multiple,
            ..Self::single(name, related_class, own_property, related_property)
        }
    }

    /// Add another key pair for composite keys.
    pub fn with_key(
        mut self,
        own_property: impl Into<String>,
        related_property: impl Into<String>,
    ) -> Self {
        self.keys.push(RelKey {
            own_property: own_property.into(),
            related_property: related_property.into(),
        });
        self
    }

    /// Check if this is a multiple relationship.
    pub fn is_multiple(&self) -> bool {
        self.cardinality == Cardinality::Multiple
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_relationship() {
        let rel = RelationshipDef::single("Owner", "Person", "OwnerId", "PersonId");

        assert_eq!(rel.cardinality, Cardinality::Single);
        assert_eq!(rel.related_class, "Person");
        assert_eq!(rel.keys.len(), 1);
        assert!(!rel.is_multiple());
    }

    #[test]
    fn test_composite_multiple_relationship() {
        let rel = RelationshipDef::multiple("Lines", "OrderLine", "OrderNo", "OrderNo")
            .with_key("Branch", "Branch");

        assert!(rel.is_multiple());
        assert_eq!(rel.keys[1].own_property, "Branch");
    }
}
