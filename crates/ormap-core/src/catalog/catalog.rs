//! Catalog registry for class definitions.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{ClassDef, PropDef, RelationshipDef};
use crate::error::{Error, Result};

/// Upper bound on inheritance depth; deeper chains are treated as cycles.
const MAX_INHERITANCE_DEPTH: usize = 64;

/// The registry of class definitions.
///
/// Answers the metadata questions the query builder and loader ask: table
/// mappings, inherited properties and relationships, parents and descendants.
#[derive(Debug, Default)]
pub struct Catalog {
    classes: RwLock<HashMap<String, Arc<ClassDef>>>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class, replacing any previous definition with the same name.
    pub fn register(&self, class: ClassDef) -> Arc<ClassDef> {
        let class = Arc::new(class);
        self.classes
            .write()
            .insert(class.class_name.clone(), Arc::clone(&class));
        class
    }

    /// Builder-style registration.
    pub fn with_class(self, class: ClassDef) -> Self {
        self.register(class);
        self
    }

    /// Get a class definition by name.
    pub fn get(&self, name: &str) -> Option<Arc<ClassDef>> {
        self.classes.read().get(name).cloned()
    }

    /// Get a class definition by name, failing if it is not registered.
    pub fn require(&self, name: &str) -> Result<Arc<ClassDef>> {
        self.get(name)
            .ok_or_else(|| Error::UnknownClass(name.to_string()))
    }

    /// Names of all registered classes, sorted.
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Get the parent class definition.
    pub fn parent(&self, class: &ClassDef) -> Result<Option<Arc<ClassDef>>> {
        class.parent_name().map(|name| self.require(name)).transpose()
    }

    /// All ancestors, nearest first.
    pub fn ancestors(&self, class: &ClassDef) -> Result<Vec<Arc<ClassDef>>> {
        let mut ancestors: Vec<Arc<ClassDef>> = Vec::new();
        let mut current = self.parent(class)?;
        while let Some(parent) = current {
            if ancestors.len() >= MAX_INHERITANCE_DEPTH || parent.class_name == class.class_name {
                return Err(Error::developer(format!(
                    "inheritance chain of class '{}' is cyclic",
                    class.class_name
                )));
            }
            current = self.parent(&parent)?;
            ancestors.push(parent);
        }
        Ok(ancestors)
    }

    /// Direct children of a class, sorted by name.
    pub fn children(&self, class: &ClassDef) -> Vec<Arc<ClassDef>> {
        let mut children: Vec<Arc<ClassDef>> = self
            .classes
            .read()
            .values()
            .filter(|c| c.parent_name() == Some(class.class_name.as_str()))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.class_name.cmp(&b.class_name));
        children
    }

    /// All descendants of a class, depth-first.
    pub fn descendants(&self, class: &ClassDef) -> Vec<Arc<ClassDef>> {
        let mut result = Vec::new();
        let mut stack = self.children(class);
        stack.reverse();
        while let Some(child) = stack.pop() {
            if result.len() >= MAX_INHERITANCE_DEPTH * MAX_INHERITANCE_DEPTH {
                break;
            }
            let mut grandchildren = self.children(&child);
            grandchildren.reverse();
            stack.extend(grandchildren);
            result.push(child);
        }
        result
    }

    /// Check whether `candidate` is `ancestor` or one of its descendants.
    pub fn is_same_or_descendant(&self, candidate: &str, ancestor: &str) -> bool {
        if candidate == ancestor {
            return true;
        }
        match self.get(candidate) {
            Some(class) => self
                .ancestors(&class)
                .map(|ancestors| ancestors.iter().any(|a| a.class_name == ancestor))
                .unwrap_or(false),
            None => false,
        }
    }

    /// Primary key properties, inherited from the nearest ancestor declaring one.
    pub fn primary_key(&self, class: &ClassDef) -> Result<Vec<String>> {
        if !class.primary_key.is_empty() {
            return Ok(class.primary_key.clone());
        }
        for ancestor in self.ancestors(class)? {
            if !ancestor.primary_key.is_empty() {
                return Ok(ancestor.primary_key.clone());
            }
        }
        Err(Error::developer(format!(
            "class '{}' has no primary key",
            class.class_name
        )))
    }

    /// Find a property on the class or its ancestors, returning the declaring class.
    pub fn find_property(
        &self,
        class: &Arc<ClassDef>,
        name: &str,
    ) -> Result<Option<(Arc<ClassDef>, PropDef)>> {
        if let Some(prop) = class.get_property(name) {
            return Ok(Some((Arc::clone(class), prop.clone())));
        }
        for ancestor in self.ancestors(class)? {
            if let Some(prop) = ancestor.get_property(name) {
                let prop = prop.clone();
                return Ok(Some((ancestor, prop)));
            }
        }
        Ok(None)
    }

    /// Find a relationship on the class or its ancestors.
    pub fn find_relationship(
        &self,
        class: &ClassDef,
        name: &str,
    ) -> Result<Option<RelationshipDef>> {
        if let Some(rel) = class.get_relationship(name) {
            return Ok(Some(rel.clone()));
        }
        for ancestor in self.ancestors(class)? {
            if let Some(rel) = ancestor.get_relationship(name) {
                return Ok(Some(rel.clone()));
            }
        }
        Ok(None)
    }

    /// Every property of the class and its ancestors, root first, with the
    /// class declaring each one.
    pub fn all_properties(&self, class: &Arc<ClassDef>) -> Result<Vec<(Arc<ClassDef>, PropDef)>> {
        let mut chain = self.ancestors(class)?;
        chain.reverse();
        chain.push(Arc::clone(class));

        let mut properties = Vec::new();
        for owner in chain {
            for prop in &owner.properties {
                properties.push((Arc::clone(&owner), prop.clone()));
            }
        }
        Ok(properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PropType;

    fn shapes() -> Catalog {
        Catalog::new()
            .with_class(
                ClassDef::new("Shape")
                    .with_primary_key(["ShapeId"])
                    .with_property(PropDef::new("ShapeId", PropType::Int32))
                    .with_property(PropDef::new("Name", PropType::String)),
            )
            .with_class(
                ClassDef::new("Circle")
                    .inherits_single_table("Shape", "ShapeType")
                    .with_property(PropDef::new("Radius", PropType::Int32)),
            )
            .with_class(
                ClassDef::new("FilledCircle")
                    .inherits_single_table("Circle", "ShapeType")
                    .with_property(PropDef::new("Colour", PropType::String)),
            )
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let catalog = shapes();
        let filled = catalog.require("FilledCircle").unwrap();
        let shape = catalog.require("Shape").unwrap();

        let ancestors: Vec<String> = catalog
            .ancestors(&filled)
            .unwrap()
            .iter()
            .map(|c| c.class_name.clone())
            .collect();
        assert_eq!(ancestors, vec!["Circle", "Shape"]);

        let descendants: Vec<String> = catalog
            .descendants(&shape)
            .iter()
            .map(|c| c.class_name.clone())
            .collect();
        assert_eq!(descendants, vec!["Circle", "FilledCircle"]);
        assert!(catalog.is_same_or_descendant("FilledCircle", "Shape"));
        assert!(!catalog.is_same_or_descendant("Shape", "Circle"));
    }

    #[test]
    fn test_inherited_primary_key_and_properties() {
        let catalog = shapes();
        let circle = catalog.require("Circle").unwrap();

        assert_eq!(catalog.primary_key(&circle).unwrap(), vec!["ShapeId"]);

        let (owner, prop) = catalog.find_property(&circle, "name").unwrap().unwrap();
        assert_eq!(owner.class_name, "Shape");
        assert_eq!(prop.name, "Name");

        let names: Vec<String> = catalog
            .all_properties(&circle)
            .unwrap()
            .into_iter()
            .map(|(_, p)| p.name)
            .collect();
        assert_eq!(names, vec!["ShapeId", "Name", "Radius"]);
    }

    #[test]
    fn test_unknown_class() {
        let catalog = Catalog::new();
        assert!(matches!(
            catalog.require("Missing"),
            Err(Error::UnknownClass(name)) if name == "Missing"
        ));
    }

    #[test]
    fn test_cyclic_inheritance_is_rejected() {
        let catalog = Catalog::new()
            .with_class(ClassDef::new("A").inherits_class_table("B"))
            .with_class(ClassDef::new("B").inherits_class_table("A"));
        let a = catalog.require("A").unwrap();
        assert!(matches!(catalog.ancestors(&a), Err(Error::Developer(_))));
    }
}
