//! Business objects: property bags with identity and edit status.

use std::fmt;
use std::sync::Arc;

use ormap_proto::{Record, Value};
use parking_lot::RwLock;

use crate::catalog::{Catalog, ClassDef, PropDef};
use crate::criteria::{PropertyLookup, QueryField};
use crate::error::{Error, Result};

/// Primary key values of an object, in key order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectId {
    values: Vec<(String, Value)>,
}

impl ObjectId {
    /// Create an empty id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of a single-property key.
    pub fn single(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().with(property, value)
    }

    /// Append a key property.
    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((property.into(), value.into()));
        self
    }

    /// Key properties and values, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(p, v)| (p.as_str(), v))
    }

    /// Value of one key property.
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(p, _)| p.eq_ignore_ascii_case(property))
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether any key value is missing.
    pub fn has_null(&self) -> bool {
        self.values.is_empty() || self.values.iter().any(|(_, v)| v.is_null())
    }
}

impl fmt::Display for ObjectId {
    /// `42` for single keys, `OrderNo=7;Branch=North` for composite keys.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [(_, value)] = self.values.as_slice() {
            return f.write_str(&value.to_key_string());
        }
        for (i, (property, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}={}", property, value.to_key_string())?;
        }
        Ok(())
    }
}

/// Identity map key: class name plus primary key string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub class_name: String,
    pub key: String,
}

impl IdentityKey {
    pub fn new(class_name: impl Into<String>, id: &ObjectId) -> Self {
        Self {
            class_name: class_name.into(),
            key: id.to_string(),
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.class_name, self.key)
    }
}

/// Snapshot of an object's status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjectStatus {
    /// Created in memory and never persisted.
    pub is_new: bool,
    /// Has unsaved changes.
    pub is_dirty: bool,
    /// An edit is in progress.
    pub is_editing: bool,
    /// Deleted from the store.
    pub is_deleted: bool,
    /// Will be deleted on the next save.
    pub is_marked_for_delete: bool,
}

#[derive(Debug)]
struct ObjectState {
    current: Record,
    persisted: Record,
    status: ObjectStatus,
    load_count: u64,
}

/// A live domain object.
///
/// Holds its current and last persisted property values plus status flags
/// behind a lock, so one instance can be shared through the identity map.
pub struct BusinessObject {
    class: Arc<ClassDef>,
    properties: Vec<PropDef>,
    primary_key: Vec<String>,
    state: RwLock<ObjectState>,
}

impl BusinessObject {
    /// Create a new, unsaved object with every property null.
    pub fn new(catalog: &Catalog, class: &Arc<ClassDef>) -> Result<Self> {
        if class.is_abstract {
            return Err(Error::developer(format!(
                "cannot create an instance of abstract class '{}'",
                class.class_name
            )));
        }
        let properties: Vec<PropDef> = catalog
            .all_properties(class)?
            .into_iter()
            .map(|(_, prop)| prop)
            .collect();
        let mut values = Record::for_class(&class.class_name);
        for prop in &properties {
            values.set(prop.name.clone(), Value::Null);
        }
        Ok(Self {
            class: Arc::clone(class),
            primary_key: catalog.primary_key(class)?,
            properties,
            state: RwLock::new(ObjectState {
                persisted: values.clone(),
                current: values,
                status: ObjectStatus {
                    is_new: true,
                    ..Default::default()
                },
                load_count: 0,
            }),
        })
    }

    /// Create a persisted object from a store record.
    ///
    /// The post-load hook is not run; see [`BusinessObject::after_load`].
    pub fn from_record(catalog: &Catalog, class: &Arc<ClassDef>, record: &Record) -> Result<Self> {
        let object = Self::new(catalog, class)?;
        object.load_from_record(record);
        Ok(object)
    }

    pub fn class(&self) -> &Arc<ClassDef> {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        &self.class.class_name
    }

    /// Names of the primary key properties.
    pub fn primary_key_properties(&self) -> &[String] {
        &self.primary_key
    }

    /// Current primary key.
    pub fn id(&self) -> ObjectId {
        let state = self.state.read();
        self.primary_key.iter().fold(ObjectId::new(), |id, property| {
            let value = state.current.get(property).cloned().unwrap_or(Value::Null);
            id.with(property.clone(), value)
        })
    }

    /// Key under which the object lives in an identity map.
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(&self.class.class_name, &self.id())
    }

    /// Current value of a property. Unknown properties yield `None`.
    pub fn get(&self, property: &str) -> Option<Value> {
        self.state.read().current.get(property).cloned()
    }

    /// Last persisted value of a property.
    pub fn persisted(&self, property: &str) -> Option<Value> {
        self.state.read().persisted.get(property).cloned()
    }

    /// Set a property, converting the value to the property's type.
    ///
    /// Starts an edit if none is in progress and marks the object dirty.
    pub fn set_property(&self, property: &str, value: impl Into<Value>) -> Result<()> {
        let prop = self
            .properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(property))
            .ok_or_else(|| Error::PropertyNotFound {
                property: property.to_string(),
                class: self.class.class_name.clone(),
            })?;
        let value = prop.prop_type.convert(&value.into())?;

        let mut state = self.state.write();
        if state.status.is_deleted {
            return Err(Error::developer(format!(
                "cannot edit deleted object {}",
                IdentityKey::new(&self.class.class_name, &self.id_locked(&state.current))
            )));
        }
        if prop.read_only && !state.status.is_new {
            return Err(Error::developer(format!(
                "property '{}' of class '{}' is read-only",
                prop.name, self.class.class_name
            )));
        }
        state.current.set(prop.name.clone(), value);
        state.status.is_editing = true;
        state.status.is_dirty = true;
        Ok(())
    }

    fn id_locked(&self, values: &Record) -> ObjectId {
        self.primary_key.iter().fold(ObjectId::new(), |id, property| {
            id.with(property.clone(), values.get(property).cloned().unwrap_or(Value::Null))
        })
    }

    /// Start an edit.
    pub fn begin_edit(&self) {
        self.state.write().status.is_editing = true;
    }

    /// Discard unsaved changes, including a pending delete.
    pub fn cancel_edits(&self) {
        let mut state = self.state.write();
        state.current = state.persisted.clone();
        state.status.is_dirty = false;
        state.status.is_editing = false;
        state.status.is_marked_for_delete = false;
    }

    /// Flag the object for deletion on the next save.
    pub fn mark_for_delete(&self) {
        let mut state = self.state.write();
        state.status.is_marked_for_delete = true;
        state.status.is_dirty = true;
    }

    /// Record a successful save: current values become the persisted ones.
    /// An object marked for delete becomes deleted.
    pub fn mark_as_saved(&self) {
        let mut state = self.state.write();
        if state.status.is_marked_for_delete {
            state.status.is_deleted = true;
            state.status.is_marked_for_delete = false;
        }
        state.persisted = state.current.clone();
        state.status.is_new = false;
        state.status.is_dirty = false;
        state.status.is_editing = false;
    }

    /// Overwrite current and persisted values from a store record and clear
    /// the new, dirty and editing flags.
    ///
    /// Values that cannot be converted to their property's type are kept as
    /// returned by the store.
    pub fn load_from_record(&self, record: &Record) {
        let mut state = self.state.write();
        self.load_locked(&mut state, record);
    }

    /// Like [`BusinessObject::load_from_record`], but only when the object
    /// has no unsaved edits. The check and the load happen under one lock.
    /// Returns `false` and leaves the object untouched otherwise.
    pub fn load_from_record_if_clean(&self, record: &Record) -> bool {
        let mut state = self.state.write();
        if state.status.is_dirty || state.status.is_editing {
            return false;
        }
        self.load_locked(&mut state, record);
        true
    }

    fn load_locked(&self, state: &mut ObjectState, record: &Record) {
        for prop in &self.properties {
            if let Some(raw) = record.get(&prop.name) {
                let value = prop.prop_type.convert(raw).unwrap_or_else(|_| raw.clone());
                state.current.set(prop.name.clone(), value);
            }
        }
        state.persisted = state.current.clone();
        state.status.is_new = false;
        state.status.is_dirty = false;
        state.status.is_editing = false;
    }

    /// Run the class's post-load hook and count the load.
    pub fn after_load(&self) {
        self.state.write().load_count += 1;
        if let Some(hook) = &self.class.after_load {
            hook.call(self);
        }
    }

    /// Number of times the object was hydrated from a store.
    pub fn load_count(&self) -> u64 {
        self.state.read().load_count
    }

    pub fn status(&self) -> ObjectStatus {
        self.state.read().status
    }

    pub fn is_new(&self) -> bool {
        self.state.read().status.is_new
    }

    pub fn is_dirty(&self) -> bool {
        self.state.read().status.is_dirty
    }

    pub fn is_editing(&self) -> bool {
        self.state.read().status.is_editing
    }

    pub fn is_deleted(&self) -> bool {
        self.state.read().status.is_deleted
    }

    pub fn is_marked_for_delete(&self) -> bool {
        self.state.read().status.is_marked_for_delete
    }
}

impl PropertyLookup for BusinessObject {
    /// Only properties of the object itself resolve; relationship paths do not.
    fn lookup(&self, field: &QueryField) -> Option<Value> {
        if field.path.has_hops() {
            return None;
        }
        self.get(field.property_name())
    }
}

impl fmt::Debug for BusinessObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("BusinessObject")
            .field("class", &self.class.class_name)
            .field("values", &state.current.values)
            .field("status", &state.status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PropType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static HOOK_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn catalog() -> Catalog {
        Catalog::new().with_class(
            ClassDef::new("Person")
                .with_primary_key(["PersonId"])
                .with_property(PropDef::new("PersonId", PropType::Int32))
                .with_property(PropDef::new("Surname", PropType::String))
                .with_property(PropDef::new("Created", PropType::DateTime).read_only())
                .with_after_load(|_| {
                    HOOK_CALLS.fetch_add(1, Ordering::SeqCst);
                }),
        )
    }

    #[test]
    fn test_object_id_strings() {
        assert_eq!(ObjectId::single("PersonId", 42).to_string(), "42");
        let id = ObjectId::new().with("OrderNo", 7).with("Branch", "North");
        assert_eq!(id.to_string(), "OrderNo=7;Branch=North");
        assert_eq!(id.get("branch"), Some(&Value::from("North")));
        assert!(ObjectId::single("PersonId", Value::Null).has_null());
    }

    #[test]
    fn test_new_object_and_edits() {
        let catalog = catalog();
        let class = catalog.require("Person").unwrap();
        let person = BusinessObject::new(&catalog, &class).unwrap();
        assert!(person.is_new());
        assert_eq!(person.get("Surname"), Some(Value::Null));

        person.set_property("PersonId", "5").unwrap();
        assert_eq!(person.get("PersonId"), Some(Value::Int32(5)));
        assert!(person.is_dirty() && person.is_editing());
        assert_eq!(person.identity_key(), IdentityKey::new("Person", &ObjectId::single("PersonId", 5)));

        assert!(matches!(
            person.set_property("Height", 2),
            Err(Error::PropertyNotFound { .. })
        ));

        person.mark_as_saved();
        assert!(!person.is_new() && !person.is_dirty());

        person.set_property("Surname", "Smith").unwrap();
        person.cancel_edits();
        assert_eq!(person.get("Surname"), Some(Value::Null));
        assert!(matches!(
            person.set_property("Created", Value::now()),
            Err(Error::Developer(_))
        ));
    }

    #[test]
    fn test_mark_for_delete_then_save() {
        let catalog = catalog();
        let class = catalog.require("Person").unwrap();
        let record = Record::new().with("PersonId", 1).with("Surname", "Smith");
        let person = BusinessObject::from_record(&catalog, &class, &record).unwrap();

        person.mark_for_delete();
        assert!(person.is_marked_for_delete());
        person.mark_as_saved();
        assert!(person.is_deleted());
        assert!(!person.is_marked_for_delete());
        assert!(person.set_property("Surname", "Jones").is_err());
    }

    #[test]
    fn test_load_if_clean_keeps_edits() {
        let catalog = catalog();
        let class = catalog.require("Person").unwrap();
        let person = BusinessObject::from_record(
            &catalog,
            &class,
            &Record::new().with("PersonId", 1).with("Surname", "Smith"),
        )
        .unwrap();
        let fresh = Record::new().with("PersonId", 1).with("Surname", "Smyth");

        person.set_property("Surname", "Edited").unwrap();
        assert!(!person.load_from_record_if_clean(&fresh));
        assert_eq!(person.get("Surname"), Some(Value::from("Edited")));
        assert!(person.is_dirty() && person.is_editing());

        person.cancel_edits();
        person.begin_edit();
        assert!(!person.load_from_record_if_clean(&fresh));
        assert_eq!(person.get("Surname"), Some(Value::from("Smith")));

        person.cancel_edits();
        assert!(person.load_from_record_if_clean(&fresh));
        assert_eq!(person.persisted("Surname"), Some(Value::from("Smyth")));
    }

    #[test]
    fn test_load_from_record_and_hook() {
        let catalog = catalog();
        let class = catalog.require("Person").unwrap();
        let record = Record::new().with("personid", 1i64).with("SURNAME", "Smith");
        let person = BusinessObject::from_record(&catalog, &class, &record).unwrap();

        assert!(!person.is_new());
        assert_eq!(person.get("PersonId"), Some(Value::Int32(1)));
        assert_eq!(person.persisted("Surname"), Some(Value::from("Smith")));
        assert_eq!(person.load_count(), 0);

        let before = HOOK_CALLS.load(Ordering::SeqCst);
        person.after_load();
        assert_eq!(person.load_count(), 1);
        assert!(HOOK_CALLS.load(Ordering::SeqCst) > before);
    }
}
