//! Identity map: one live object per identity.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::trace;

use super::business_object::{BusinessObject, IdentityKey};
use crate::error::{Error, Result};

/// Outcome of [`IdentityMap::reconcile`].
#[derive(Debug, Clone)]
pub enum Reconciled {
    /// No live instance existed; the candidate was registered.
    Registered(Arc<BusinessObject>),
    /// The live instance was new (unsaved) or deleted; the candidate
    /// replaced it.
    Replaced(Arc<BusinessObject>),
    /// A persisted live instance exists and was kept.
    Existing(Arc<BusinessObject>),
}

impl Reconciled {
    /// The canonical instance.
    pub fn object(&self) -> &Arc<BusinessObject> {
        match self {
            Reconciled::Registered(o) | Reconciled::Replaced(o) | Reconciled::Existing(o) => o,
        }
    }

    pub fn into_object(self) -> Arc<BusinessObject> {
        match self {
            Reconciled::Registered(o) | Reconciled::Replaced(o) | Reconciled::Existing(o) => o,
        }
    }
}

/// Registry of live objects keyed by `(class, primary key)`.
///
/// Shared as `Arc<IdentityMap>`; all operations are thread-safe and
/// [`IdentityMap::reconcile`] is atomic per identity.
#[derive(Debug, Default)]
pub struct IdentityMap {
    objects: DashMap<IdentityKey, Arc<BusinessObject>>,
}

impl IdentityMap {
    /// Create an empty identity map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object. Fails if its identity is already live.
    pub fn add(&self, object: Arc<BusinessObject>) -> Result<()> {
        let key = object.identity_key();
        match self.objects.entry(key) {
            Entry::Occupied(entry) => Err(Error::AlreadyRegistered {
                class: entry.key().class_name.clone(),
                key: entry.key().key.clone(),
            }),
            Entry::Vacant(entry) => {
                trace!(identity = %entry.key(), "registered object");
                entry.insert(object);
                Ok(())
            }
        }
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.objects.contains_key(key)
    }

    pub fn get(&self, key: &IdentityKey) -> Option<Arc<BusinessObject>> {
        self.objects.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove an object, but only if it is the registered instance.
    pub fn remove(&self, object: &BusinessObject) -> Option<Arc<BusinessObject>> {
        self.objects
            .remove_if(&object.identity_key(), |_, live| std::ptr::eq(live.as_ref(), object))
            .map(|(_, live)| live)
    }

    /// Forget every live object.
    pub fn clear_loaded_objects(&self) {
        self.objects.clear();
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Atomically resolve a freshly loaded candidate against the live instance.
    ///
    /// A vacant identity registers the candidate. A live instance that is new
    /// or deleted is replaced by the candidate. Otherwise the live instance
    /// wins.
    pub fn reconcile(&self, candidate: Arc<BusinessObject>) -> Reconciled {
        match self.objects.entry(candidate.identity_key()) {
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&candidate));
                Reconciled::Registered(candidate)
            }
            Entry::Occupied(mut entry) => {
                let live = entry.get().status();
                if live.is_new || live.is_deleted {
                    entry.insert(Arc::clone(&candidate));
                    Reconciled::Replaced(candidate)
                } else {
                    Reconciled::Existing(Arc::clone(entry.get()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, ClassDef, PropDef, PropType};
    use ormap_proto::Record;
    use std::thread;

    fn catalog() -> Catalog {
        Catalog::new().with_class(
            ClassDef::new("Person")
                .with_primary_key(["PersonId"])
                .with_property(PropDef::new("PersonId", PropType::Int32)),
        )
    }

    fn loaded(catalog: &Catalog, id: i32) -> Arc<BusinessObject> {
        let class = catalog.require("Person").unwrap();
        let record = Record::new().with("PersonId", id);
        Arc::new(BusinessObject::from_record(catalog, &class, &record).unwrap())
    }

    #[test]
    fn test_add_get_remove() {
        let catalog = catalog();
        let map = IdentityMap::new();
        let person = loaded(&catalog, 1);

        map.add(Arc::clone(&person)).unwrap();
        assert!(map.contains(&person.identity_key()));
        assert!(Arc::ptr_eq(&map.get(&person.identity_key()).unwrap(), &person));
        assert!(matches!(
            map.add(loaded(&catalog, 1)),
            Err(Error::AlreadyRegistered { .. })
        ));

        let impostor = loaded(&catalog, 1);
        assert!(map.remove(&impostor).is_none());
        assert!(map.remove(&person).is_some());
        assert!(map.is_empty());
    }

    #[test]
    fn test_reconcile_outcomes() {
        let catalog = catalog();
        let map = IdentityMap::new();
        let first = loaded(&catalog, 1);

        assert!(matches!(map.reconcile(Arc::clone(&first)), Reconciled::Registered(_)));

        let second = loaded(&catalog, 1);
        let outcome = map.reconcile(second);
        assert!(matches!(outcome, Reconciled::Existing(_)));
        assert!(Arc::ptr_eq(outcome.object(), &first));

        let class = catalog.require("Person").unwrap();
        let fresh = Arc::new(BusinessObject::new(&catalog, &class).unwrap());
        fresh.set_property("PersonId", 2).unwrap();
        map.add(Arc::clone(&fresh)).unwrap();
        let candidate = loaded(&catalog, 2);
        let outcome = map.reconcile(Arc::clone(&candidate));
        assert!(matches!(outcome, Reconciled::Replaced(_)));
        assert!(Arc::ptr_eq(&map.get(&candidate.identity_key()).unwrap(), &candidate));

        let deleted = loaded(&catalog, 3);
        map.add(Arc::clone(&deleted)).unwrap();
        deleted.mark_for_delete();
        deleted.mark_as_saved();
        let reloaded = loaded(&catalog, 3);
        let outcome = map.reconcile(Arc::clone(&reloaded));
        assert!(matches!(outcome, Reconciled::Replaced(_)));
        assert!(!outcome.object().is_deleted());
        assert!(Arc::ptr_eq(&map.get(&reloaded.identity_key()).unwrap(), &reloaded));

        map.clear_loaded_objects();
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn test_concurrent_reconcile_yields_one_instance() {
        let catalog = Arc::new(catalog());
        let map = Arc::new(IdentityMap::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let catalog = Arc::clone(&catalog);
                let map = Arc::clone(&map);
                thread::spawn(move || map.reconcile(loaded(&catalog, 7)).into_object())
            })
            .collect();
        let objects: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(map.len(), 1);
        assert!(objects.iter().all(|o| Arc::ptr_eq(o, &objects[0])));
    }
}
