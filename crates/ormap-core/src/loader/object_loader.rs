//! Loading business objects through the identity map.

use std::sync::Arc;

use ormap_proto::{Record, Value};
use tracing::{debug, instrument, trace, warn};

use super::config::LoaderConfig;
use crate::catalog::{Catalog, ClassDef, RelationshipDef};
use crate::criteria::{ComparisonOp, Criteria, LogicalOp};
use crate::error::{Error, Result};
use crate::object::{BusinessObject, BusinessObjectCollection, IdentityMap, ObjectId, Reconciled};
use crate::query::{QueryBuilder, SelectQuery};
use crate::store::DataStore;

/// Loads objects and collections from a [`DataStore`], guaranteeing at most
/// one live instance per `(class, key)` through a shared [`IdentityMap`].
///
/// Every load goes to the store. The fetched records are then reconciled
/// with whatever is already live:
///
/// - no live instance: the fresh object is registered;
/// - a new (unsaved) or deleted live instance: the fresh object replaces it;
/// - a dirty or editing live instance: it is returned untouched;
/// - a clean live instance: it is refreshed from the record.
///
/// Each hydration runs the class's post-load hook once.
pub struct BusinessObjectLoader {
    catalog: Arc<Catalog>,
    identity_map: Arc<IdentityMap>,
    store: Arc<dyn DataStore>,
    config: LoaderConfig,
}

impl std::fmt::Debug for BusinessObjectLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusinessObjectLoader")
            .field("classes", &self.catalog.class_names())
            .field("live_objects", &self.identity_map.len())
            .field("config", &self.config)
            .finish()
    }
}

impl BusinessObjectLoader {
    /// Create a loader with the default configuration.
    pub fn new(catalog: Arc<Catalog>, identity_map: Arc<IdentityMap>, store: Arc<dyn DataStore>) -> Self {
        Self {
            catalog,
            identity_map,
            store,
            config: LoaderConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn identity_map(&self) -> &Arc<IdentityMap> {
        &self.identity_map
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    fn builder(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(&self.catalog)
    }

    // ----- single objects -----

    /// Load the object with this key, failing if it no longer exists.
    pub fn get_business_object(&self, class_name: &str, id: &ObjectId) -> Result<Arc<BusinessObject>> {
        self.get_business_object_by_key(class_name, id)?
            .ok_or_else(|| Error::ObjectDeletedConcurrently {
                class: class_name.to_string(),
                key: id.to_string(),
            })
    }

    /// Load the object with this key, if it exists.
    pub fn get_business_object_by_key(
        &self,
        class_name: &str,
        id: &ObjectId,
    ) -> Result<Option<Arc<BusinessObject>>> {
        let criteria = key_criteria(id)?;
        self.get_business_object_by_criteria(class_name, criteria)
    }

    /// Load the single object matching `criteria`.
    ///
    /// Fails with [`Error::DuplicateObjects`] when more than one record matches.
    pub fn get_business_object_by_criteria(
        &self,
        class_name: &str,
        criteria: Criteria,
    ) -> Result<Option<Arc<BusinessObject>>> {
        let class = self.catalog.require(class_name)?;
        let query = self.builder().create_select_query(&class, Some(criteria))?;
        self.load_single(&class, &query)
    }

    /// Parse `criteria` and load the single matching object.
    pub fn get_business_object_by_string(
        &self,
        class_name: &str,
        criteria: &str,
    ) -> Result<Option<Arc<BusinessObject>>> {
        let class = self.catalog.require(class_name)?;
        let criteria = Criteria::parse(criteria)?;
        let query = self.builder().create_select_query(&class, criteria)?;
        self.load_single(&class, &query)
    }

    /// Load the single object matching a caller-built query.
    pub fn get_business_object_by_query(
        &self,
        class_name: &str,
        mut query: SelectQuery,
    ) -> Result<Option<Arc<BusinessObject>>> {
        let class = self.catalog.require(class_name)?;
        self.builder().prepare_select_query(&class, &mut query)?;
        self.load_single(&class, &query)
    }

    #[instrument(skip(self, class, query), fields(class = %class.class_name))]
    fn load_single(&self, class: &Arc<ClassDef>, query: &SelectQuery) -> Result<Option<Arc<BusinessObject>>> {
        debug!(query = %query, "query prepared");
        let mut records = self.store.execute(query)?;
        debug!(rows = records.len(), "rows fetched");

        if records.len() > 1 {
            return Err(Error::DuplicateObjects {
                class: class.class_name.clone(),
                criteria: query.criteria().map(ToString::to_string).unwrap_or_default(),
            });
        }
        match records.pop() {
            Some(record) => self.reconcile(class, &record).map(Some),
            None => Ok(None),
        }
    }

    /// Reload a live object from the store.
    ///
    /// New objects are returned unchanged. Objects with edits in progress
    /// cannot be refreshed.
    #[instrument(skip(self, object), fields(identity = %object.identity_key()))]
    pub fn refresh(&self, object: &Arc<BusinessObject>) -> Result<Arc<BusinessObject>> {
        if object.is_new() {
            return Ok(Arc::clone(object));
        }
        if object.is_editing() || object.is_dirty() {
            return Err(Error::EditInProgress {
                class: object.class_name().to_string(),
                key: object.id().to_string(),
            });
        }

        let id = object.id();
        let query = self
            .builder()
            .create_select_query(object.class(), Some(key_criteria(&id)?))?;
        let mut records = self.store.execute(&query)?;
        if records.len() > 1 {
            return Err(Error::DuplicateObjects {
                class: object.class_name().to_string(),
                criteria: query.criteria().map(ToString::to_string).unwrap_or_default(),
            });
        }
        let Some(record) = records.pop() else {
            warn!("object was deleted by another user");
            return Err(Error::ObjectDeletedConcurrently {
                class: object.class_name().to_string(),
                key: id.to_string(),
            });
        };

        if !object.load_from_record_if_clean(&record) {
            return Err(Error::EditInProgress {
                class: object.class_name().to_string(),
                key: id.to_string(),
            });
        }
        object.after_load();
        debug!("object refreshed");
        Ok(Arc::clone(object))
    }

    // ----- collections -----

    /// Load every object of `class_name` matching `criteria`, ordered by
    /// `order_by` (e.g. `"Surname, Owner.Name DESC"`).
    pub fn get_collection(
        &self,
        class_name: &str,
        criteria: Option<Criteria>,
        order_by: &str,
    ) -> Result<BusinessObjectCollection> {
        self.get_collection_with_limit(class_name, criteria, order_by, 0, -1)
    }

    /// Parse `criteria` and load the matching collection.
    pub fn get_collection_by_string(
        &self,
        class_name: &str,
        criteria: &str,
        order_by: &str,
    ) -> Result<BusinessObjectCollection> {
        let criteria = Criteria::parse(criteria)?;
        self.get_collection(class_name, criteria, order_by)
    }

    /// Load one page of a collection: skip `first` sorted records and keep at
    /// most `limit` (negative for all). The collection's total count is the
    /// number of matches before paging.
    pub fn get_collection_with_limit(
        &self,
        class_name: &str,
        criteria: Option<Criteria>,
        order_by: &str,
        first: i64,
        limit: i64,
    ) -> Result<BusinessObjectCollection> {
        let class = self.catalog.require(class_name)?;
        let builder = self.builder();

        let mut query = builder.create_select_query(&class, criteria)?;
        query.set_order_criteria(builder.create_order_criteria(&class, order_by)?)?;
        query.set_first_record_to_load(first)?;
        query.set_limit(limit);

        let mut collection = BusinessObjectCollection::new(class, query);
        self.load_collection(&mut collection)?;
        Ok(collection)
    }

    /// Load a collection with a caller-built query.
    pub fn get_collection_by_query(&self, class_name: &str, mut query: SelectQuery) -> Result<BusinessObjectCollection> {
        let class = self.catalog.require(class_name)?;
        self.builder().prepare_select_query(&class, &mut query)?;

        let mut collection = BusinessObjectCollection::new(class, query);
        self.load_collection(&mut collection)?;
        Ok(collection)
    }

    /// Reload a collection with its own query.
    ///
    /// Unsaved objects created through the collection stay members. Removed
    /// and marked-for-delete objects stay out.
    pub fn refresh_collection(&self, collection: &mut BusinessObjectCollection) -> Result<()> {
        self.load_collection(collection)
    }

    /// Number of objects of `class_name` matching `criteria`, without loading them.
    pub fn get_count(&self, class_name: &str, criteria: Option<Criteria>) -> Result<usize> {
        let class = self.catalog.require(class_name)?;
        let query = self.builder().create_select_query(&class, criteria)?;
        self.store.count(&query)
    }

    /// Objects reached from `object` through a relationship.
    pub fn get_related_collection(
        &self,
        object: &BusinessObject,
        relationship: &str,
    ) -> Result<BusinessObjectCollection> {
        let relationship = self.relationship(object, relationship)?;
        match relationship_criteria(object, &relationship) {
            Some(criteria) => self.get_collection(&relationship.related_class, Some(criteria), ""),
            None => {
                let class = self.catalog.require(&relationship.related_class)?;
                let query = self.builder().create_select_query(&class, None)?;
                Ok(BusinessObjectCollection::new(class, query))
            }
        }
    }

    /// The single object reached from `object` through a relationship.
    /// A null foreign key yields `None`.
    pub fn get_related_business_object(
        &self,
        object: &BusinessObject,
        relationship: &str,
    ) -> Result<Option<Arc<BusinessObject>>> {
        let relationship = self.relationship(object, relationship)?;
        match relationship_criteria(object, &relationship) {
            Some(criteria) => self.get_business_object_by_criteria(&relationship.related_class, criteria),
            None => Ok(None),
        }
    }

    fn relationship(&self, object: &BusinessObject, name: &str) -> Result<RelationshipDef> {
        self.catalog
            .find_relationship(object.class(), name)?
            .ok_or_else(|| Error::RelationshipNotFound {
                relationship: name.to_string(),
                class: object.class_name().to_string(),
            })
    }

    #[instrument(skip(self, collection), fields(class = %collection.class().class_name))]
    fn load_collection(&self, collection: &mut BusinessObjectCollection) -> Result<()> {
        let class = Arc::clone(collection.class());
        let query = collection.select_query();
        debug!(query = %query, "query prepared");

        let records = self.store.execute(&query.without_paging())?;
        debug!(rows = records.len(), "rows fetched");

        let mut loaded = Vec::with_capacity(records.len());
        for record in records {
            let object = self.reconcile(&class, &record)?;
            if collection.excludes(&object) {
                trace!(identity = %object.identity_key(), "excluded from collection");
                continue;
            }
            loaded.push((record, object));
        }

        let order = query.order_criteria();
        if self.config.sort_in_memory && !order.is_empty() {
            loaded.sort_by(|(a, _), (b, _)| order.compare(a, b));
        }

        let total = loaded.len();
        let first = query.first_record_to_load();
        let items: Vec<Arc<BusinessObject>> = if first > total {
            Vec::new()
        } else {
            loaded
                .into_iter()
                .skip(first)
                .take(query.limit().unwrap_or(usize::MAX))
                .map(|(_, object)| object)
                .collect()
        };
        debug!(total, first, returned = items.len(), "window applied");

        collection.set_loaded(items, total);
        Ok(())
    }

    /// Resolve a fetched record against the identity map.
    fn reconcile(&self, queried: &Arc<ClassDef>, record: &Record) -> Result<Arc<BusinessObject>> {
        let class = self.concrete_class(queried, record)?;
        let candidate = Arc::new(BusinessObject::from_record(&self.catalog, &class, record)?);

        match self.identity_map.reconcile(candidate) {
            Reconciled::Registered(object) | Reconciled::Replaced(object) => {
                trace!(identity = %object.identity_key(), "registered loaded object");
                object.after_load();
                Ok(object)
            }
            Reconciled::Existing(live) => {
                if !self.config.refresh_live_objects {
                    trace!(identity = %live.identity_key(), "kept live object");
                } else if live.load_from_record_if_clean(record) {
                    trace!(identity = %live.identity_key(), "refreshed live object");
                    live.after_load();
                } else {
                    trace!(identity = %live.identity_key(), "kept edited live object");
                }
                Ok(live)
            }
        }
    }

    /// Class to instantiate for a record loaded through `queried`.
    fn concrete_class(&self, queried: &Arc<ClassDef>, record: &Record) -> Result<Arc<ClassDef>> {
        if let Some(name) = record.class_name.as_deref() {
            if self.catalog.is_same_or_descendant(name, &queried.class_name) {
                return self.catalog.require(name);
            }
        }
        if let Some(column) = self.builder().discriminator_column(queried)? {
            if let Some(Value::String(name)) = record.get(&column) {
                if self.catalog.is_same_or_descendant(name, &queried.class_name) {
                    return self.catalog.require(name);
                }
            }
        }
        Ok(Arc::clone(queried))
    }
}

fn key_criteria(id: &ObjectId) -> Result<Criteria> {
    Criteria::from_object_id(id).ok_or_else(|| Error::developer("an object id needs at least one key property"))
}

/// Criteria matching the related side of `relationship`, or `None` when one
/// of the owner's key values is null.
fn relationship_criteria(object: &BusinessObject, relationship: &RelationshipDef) -> Option<Criteria> {
    let mut criteria = None;
    for key in &relationship.keys {
        let value = object.get(&key.own_property).unwrap_or(Value::Null);
        if value.is_null() {
            return None;
        }
        let leaf = Criteria::leaf(&key.related_property, ComparisonOp::Equals, value);
        criteria = Criteria::combine(criteria, LogicalOp::And, Some(leaf));
    }
    criteria
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PropDef, PropType};
    use crate::store::MemoryStore;

    fn setup() -> (BusinessObjectLoader, Arc<MemoryStore>) {
        let catalog = Arc::new(
            Catalog::new()
                .with_class(
                    ClassDef::new("Person")
                        .with_primary_key(["PersonId"])
                        .with_property(PropDef::new("PersonId", PropType::Int32))
                        .with_property(PropDef::new("Surname", PropType::String))
                        .with_relationship(RelationshipDef::multiple("Cars", "Car", "PersonId", "OwnerId")),
                )
                .with_class(
                    ClassDef::new("Car")
                        .with_primary_key(["CarId"])
                        .with_property(PropDef::new("CarId", PropType::Int32))
                        .with_property(PropDef::new("OwnerId", PropType::Int32))
                        .with_relationship(RelationshipDef::single("Owner", "Person", "OwnerId", "PersonId")),
                ),
        );
        let store = Arc::new(MemoryStore::new(Arc::clone(&catalog)));
        store
            .load_json(
                "Person",
                r#"[{"PersonId": 1, "Surname": "Smith"}, {"PersonId": 2, "Surname": "Smith"}]"#,
            )
            .unwrap();
        store
            .load_json(
                "Car",
                r#"[{"CarId": 10, "OwnerId": 1}, {"CarId": 11, "OwnerId": 1}, {"CarId": 12, "OwnerId": null}]"#,
            )
            .unwrap();
        let loader = BusinessObjectLoader::new(catalog, Arc::new(IdentityMap::new()), store.clone());
        (loader, store)
    }

    #[test]
    fn test_single_lookups() {
        let (loader, _) = setup();
        let smith = loader
            .get_business_object("Person", &ObjectId::single("PersonId", 1))
            .unwrap();
        assert_eq!(smith.get("Surname"), Some(Value::from("Smith")));
        assert_eq!(smith.load_count(), 1);

        let missing = loader
            .get_business_object_by_key("Person", &ObjectId::single("PersonId", 9))
            .unwrap();
        assert!(missing.is_none());

        let err = loader
            .get_business_object_by_string("Person", "Surname = 'Smith'")
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateObjects { .. }));
        assert!(err.to_string().contains("more than one record"));
    }

    #[test]
    fn test_related_objects() {
        let (loader, _) = setup();
        let smith = loader
            .get_business_object("Person", &ObjectId::single("PersonId", 1))
            .unwrap();
        let cars = loader.get_related_collection(&smith, "Cars").unwrap();
        assert_eq!(cars.len(), 2);

        let owner = loader.get_related_business_object(&cars.items()[0], "Owner").unwrap();
        assert!(Arc::ptr_eq(&owner.unwrap(), &smith));

        let orphan = loader.get_business_object("Car", &ObjectId::single("CarId", 12)).unwrap();
        assert!(loader.get_related_business_object(&orphan, "Owner").unwrap().is_none());

        assert!(matches!(
            loader.get_related_collection(&smith, "Boats"),
            Err(Error::RelationshipNotFound { .. })
        ));
    }

    #[test]
    fn test_refresh_rules() {
        let (loader, store) = setup();
        let smith = loader
            .get_business_object("Person", &ObjectId::single("PersonId", 1))
            .unwrap();

        store
            .update(Record::for_class("Person").with("PersonId", 1).with("Surname", "Smyth"))
            .unwrap();
        loader.refresh(&smith).unwrap();
        assert_eq!(smith.get("Surname"), Some(Value::from("Smyth")));
        assert_eq!(smith.load_count(), 2);

        smith.set_property("Surname", "Edited").unwrap();
        assert!(matches!(loader.refresh(&smith), Err(Error::EditInProgress { .. })));
        smith.cancel_edits();

        store.delete("Person", &ObjectId::single("PersonId", 1)).unwrap();
        assert!(matches!(
            loader.refresh(&smith),
            Err(Error::ObjectDeletedConcurrently { .. })
        ));
    }

    #[test]
    fn test_count_ignores_paging() {
        let (loader, _) = setup();
        assert_eq!(loader.get_count("Car", None).unwrap(), 3);
        let criteria = Criteria::parse("OwnerId = 1").unwrap();
        assert_eq!(loader.get_count("Car", criteria).unwrap(), 2);
        assert!(loader.identity_map().is_empty());
    }
}
