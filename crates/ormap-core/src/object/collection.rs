//! Collections of business objects loaded by one select query.

use std::sync::Arc;

use super::business_object::BusinessObject;
use crate::catalog::{Catalog, ClassDef};
use crate::criteria::Criteria;
use crate::error::Result;
use crate::query::SelectQuery;

/// An ordered, paged set of objects plus the edits made to its membership.
///
/// `created` objects stay members across refreshes until saved; `removed`
/// and `marked_for_delete` objects stay out of `items`.
#[derive(Debug)]
pub struct BusinessObjectCollection {
    class: Arc<ClassDef>,
    items: Vec<Arc<BusinessObject>>,
    created: Vec<Arc<BusinessObject>>,
    removed: Vec<Arc<BusinessObject>>,
    marked_for_delete: Vec<Arc<BusinessObject>>,
    select_query: SelectQuery,
    total_count: usize,
}

impl BusinessObjectCollection {
    /// Create an empty collection that loads with `select_query`.
    pub fn new(class: Arc<ClassDef>, select_query: SelectQuery) -> Self {
        Self {
            class,
            items: Vec::new(),
            created: Vec::new(),
            removed: Vec::new(),
            marked_for_delete: Vec::new(),
            select_query,
            total_count: 0,
        }
    }

    pub fn class(&self) -> &Arc<ClassDef> {
        &self.class
    }

    /// Current members, in load order.
    pub fn items(&self) -> &[Arc<BusinessObject>] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<BusinessObject>> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<BusinessObject>> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Objects created through this collection and not yet saved.
    pub fn created(&self) -> &[Arc<BusinessObject>] {
        &self.created
    }

    /// Objects removed from membership.
    pub fn removed(&self) -> &[Arc<BusinessObject>] {
        &self.removed
    }

    /// Objects flagged for deletion through this collection.
    pub fn marked_for_delete(&self) -> &[Arc<BusinessObject>] {
        &self.marked_for_delete
    }

    /// Query used to (re)load the collection.
    pub fn select_query(&self) -> &SelectQuery {
        &self.select_query
    }

    pub fn select_query_mut(&mut self) -> &mut SelectQuery {
        &mut self.select_query
    }

    /// Number of matching records before paging was applied.
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// Whether `object` is a member (by instance).
    pub fn contains(&self, object: &Arc<BusinessObject>) -> bool {
        self.items.iter().any(|o| Arc::ptr_eq(o, object))
    }

    /// Create a new object of the collection's class and add it as a member.
    pub fn create_business_object(&mut self, catalog: &Catalog) -> Result<Arc<BusinessObject>> {
        let object = Arc::new(BusinessObject::new(catalog, &self.class)?);
        self.created.push(Arc::clone(&object));
        self.items.push(Arc::clone(&object));
        Ok(object)
    }

    /// Add an existing object as a member, ignoring duplicates.
    pub fn add(&mut self, object: Arc<BusinessObject>) {
        if !self.contains(&object) {
            self.removed.retain(|o| !Arc::ptr_eq(o, &object));
            self.items.push(object);
        }
    }

    /// Remove a member. Returns `false` if it was not a member.
    ///
    /// Removing an object created through the collection simply forgets it.
    pub fn remove(&mut self, object: &Arc<BusinessObject>) -> bool {
        if !self.take_item(object) {
            return false;
        }
        let was_created = self.created.iter().any(|o| Arc::ptr_eq(o, object));
        if was_created {
            self.created.retain(|o| !Arc::ptr_eq(o, object));
        } else {
            self.removed.push(Arc::clone(object));
        }
        true
    }

    /// Flag a member for deletion and move it out of the items.
    pub fn mark_for_delete(&mut self, object: &Arc<BusinessObject>) -> bool {
        if !self.take_item(object) {
            return false;
        }
        object.mark_for_delete();
        self.created.retain(|o| !Arc::ptr_eq(o, object));
        self.marked_for_delete.push(Arc::clone(object));
        true
    }

    fn take_item(&mut self, object: &Arc<BusinessObject>) -> bool {
        let before = self.items.len();
        self.items.retain(|o| !Arc::ptr_eq(o, object));
        self.items.len() != before
    }

    /// Members matching `criteria`, evaluated in memory.
    pub fn find_all(&self, criteria: &Criteria) -> Result<Vec<Arc<BusinessObject>>> {
        let mut found = Vec::new();
        for object in &self.items {
            if criteria.is_match(object.as_ref())? {
                found.push(Arc::clone(object));
            }
        }
        Ok(found)
    }

    /// Whether a loaded object must stay out of the items.
    pub(crate) fn excludes(&self, object: &Arc<BusinessObject>) -> bool {
        object.is_deleted()
            || object.is_marked_for_delete()
            || self.removed.iter().any(|o| Arc::ptr_eq(o, object))
            || self.marked_for_delete.iter().any(|o| Arc::ptr_eq(o, object))
    }

    /// Replace the members after a load.
    ///
    /// Unsaved created objects are appended to the loaded items. Created
    /// objects that were saved in the meantime are no longer tracked.
    pub(crate) fn set_loaded(&mut self, items: Vec<Arc<BusinessObject>>, total_count: usize) {
        self.created.retain(|o| o.is_new());
        self.marked_for_delete.retain(|o| !o.is_deleted());
        self.items = items;
        for object in &self.created {
            if !self.items.iter().any(|o| Arc::ptr_eq(o, object)) {
                self.items.push(Arc::clone(object));
            }
        }
        self.total_count = total_count;
    }
}
