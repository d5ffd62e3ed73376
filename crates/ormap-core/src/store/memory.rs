//! In-memory data store.

use std::collections::HashMap;
use std::sync::Arc;

use ormap_proto::{Record, Value};
use parking_lot::RwLock;
use tracing::{debug, instrument, trace};

use super::DataStore;
use crate::catalog::{Catalog, ClassDef};
use crate::criteria::{values_equal, PropertyLookup, QueryField};
use crate::error::{Error, Result};
use crate::object::ObjectId;
use crate::query::SelectQuery;

type Tables = HashMap<String, Vec<Record>>;

/// A data store keeping rows in memory, grouped by concrete class.
///
/// Criteria are evaluated in memory, including paths that walk
/// relationships. A query for a class also scans the rows of its
/// descendants.
#[derive(Debug)]
pub struct MemoryStore {
    catalog: Arc<Catalog>,
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store over a catalog.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a row. The record must name its concrete class and carry a
    /// non-null primary key.
    ///
    /// Values are converted to their property types and single-table
    /// children get their discriminator column set.
    #[instrument(skip(self, record), fields(class = ?record.class_name))]
    pub fn insert(&self, record: Record) -> Result<()> {
        let class = self.record_class(&record)?;
        let row = self.normalize(&class, record)?;
        let id = self.row_id(&class, &row)?;
        if id.has_null() {
            return Err(Error::Store(format!(
                "row of class '{}' has a null primary key '{}'",
                class.class_name, id
            )));
        }

        let mut tables = self.tables.write();
        if self.position(&tables, &class, &id)?.is_some() {
            return Err(Error::Store(format!(
                "duplicate key '{}' for class '{}'",
                id, class.class_name
            )));
        }
        trace!(key = %id, "inserted row");
        tables.entry(class.class_name.clone()).or_default().push(row);
        Ok(())
    }

    /// Merge the record's values into the stored row with the same key.
    /// Returns `false` when no such row exists.
    pub fn update(&self, record: Record) -> Result<bool> {
        let class = self.record_class(&record)?;
        let changes = self.normalize(&class, record)?;
        let id = self.row_id(&class, &changes)?;

        let mut tables = self.tables.write();
        let Some((table, index)) = self.position(&tables, &class, &id)? else {
            return Ok(false);
        };
        if let Some(row) = tables.get_mut(&table).and_then(|rows| rows.get_mut(index)) {
            for (name, value) in changes.values {
                row.set(name, value);
            }
        }
        Ok(true)
    }

    /// Delete the row of `class_name` (or a descendant) with this key.
    /// Returns `false` when no such row exists.
    pub fn delete(&self, class_name: &str, id: &ObjectId) -> Result<bool> {
        let class = self.catalog.require(class_name)?;
        let mut tables = self.tables.write();
        let Some((table, index)) = self.position(&tables, &class, id)? else {
            return Ok(false);
        };
        if let Some(rows) = tables.get_mut(&table) {
            rows.remove(index);
        }
        Ok(true)
    }

    /// Insert every object of a JSON array as a row of `class_name`.
    /// Returns the number of rows inserted. Items that are not objects are
    /// rejected; rows before the offending item stay inserted.
    pub fn load_json(&self, class_name: &str, json: &str) -> Result<usize> {
        let parsed: serde_json::Value = serde_json::from_str(json)?;
        let serde_json::Value::Array(items) = parsed else {
            return Err(Error::Store(format!(
                "expected a JSON array of objects for class '{}'",
                class_name
            )));
        };
        let mut inserted = 0;
        for (index, item) in items.iter().enumerate() {
            if !item.is_object() {
                return Err(Error::Store(format!(
                    "item {} of the JSON array for class '{}' is not an object",
                    index, class_name
                )));
            }
            let mut record = Record::from_json(item);
            record.class_name = Some(class_name.to_string());
            self.insert(record)?;
            inserted += 1;
        }
        debug!(class = class_name, rows = inserted, "loaded json rows");
        Ok(inserted)
    }

    /// Total number of rows.
    pub fn len(&self) -> usize {
        self.tables.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record_class(&self, record: &Record) -> Result<Arc<ClassDef>> {
        let name = record
            .class_name
            .as_deref()
            .ok_or_else(|| Error::developer("records written to a memory store must name their class"))?;
        self.catalog.require(name)
    }

    fn normalize(&self, class: &Arc<ClassDef>, mut record: Record) -> Result<Record> {
        for (_, prop) in self.catalog.all_properties(class)? {
            if let Some(raw) = record.get(&prop.name) {
                let value = prop.prop_type.convert(raw)?;
                record.set(prop.name.clone(), value);
            }
        }
        if let Some(column) = class.discriminator() {
            record.set(column, Value::String(class.class_name.clone()));
        }
        record.class_name = Some(class.class_name.clone());
        Ok(record)
    }

    fn row_id(&self, class: &ClassDef, row: &Record) -> Result<ObjectId> {
        Ok(self
            .catalog
            .primary_key(class)?
            .into_iter()
            .fold(ObjectId::new(), |id, property| {
                let value = row.get(&property).cloned().unwrap_or(Value::Null);
                id.with(property, value)
            }))
    }

    /// Table and index of the row with key `id` anywhere in the hierarchy
    /// containing `class`.
    fn position(&self, tables: &Tables, class: &Arc<ClassDef>, id: &ObjectId) -> Result<Option<(String, usize)>> {
        let root = self
            .catalog
            .ancestors(class)?
            .pop()
            .unwrap_or_else(|| Arc::clone(class));
        for name in hierarchy(&self.catalog, &root) {
            let Some(rows) = tables.get(&name) else {
                continue;
            };
            for (index, row) in rows.iter().enumerate() {
                if id.iter().all(|(property, value)| {
                    row.get(property).is_some_and(|stored| values_equal(stored, value))
                }) {
                    return Ok(Some((name, index)));
                }
            }
        }
        Ok(None)
    }

    fn matching_rows<'t>(&self, tables: &'t Tables, query: &SelectQuery) -> Result<Vec<RowContext<'t>>> {
        let class = self.catalog.require(&query.class_name)?;
        let criteria = query.effective_criteria();
        let mut matches = Vec::new();
        for name in hierarchy(&self.catalog, &class) {
            for row in tables.get(&name).into_iter().flatten() {
                let context = RowContext {
                    catalog: Arc::clone(&self.catalog),
                    tables,
                    row,
                };
                let keep = match &criteria {
                    Some(criteria) => criteria.is_match(&context)?,
                    None => true,
                };
                if keep {
                    matches.push(context);
                }
            }
        }
        Ok(matches)
    }
}

impl DataStore for MemoryStore {
    #[instrument(skip(self, query), fields(class = %query.class_name))]
    fn execute(&self, query: &SelectQuery) -> Result<Vec<Record>> {
        let tables = self.tables.read();
        let matches = self.matching_rows(&tables, query)?;

        let mut records: Vec<Record> = matches.iter().map(|row| row.project(query)).collect();
        if !query.order_criteria().is_empty() {
            records.sort_by(|a, b| query.order_criteria().compare(a, b));
        }
        let records: Vec<Record> = records
            .into_iter()
            .skip(query.first_record_to_load())
            .take(query.limit().unwrap_or(usize::MAX))
            .collect();

        debug!(matched = matches.len(), returned = records.len(), "executed query");
        Ok(records)
    }

    fn count(&self, query: &SelectQuery) -> Result<usize> {
        let tables = self.tables.read();
        Ok(self.matching_rows(&tables, query)?.len())
    }
}

/// Class names whose rows a query on `class` scans: the class and its
/// descendants.
fn hierarchy(catalog: &Catalog, class: &ClassDef) -> Vec<String> {
    std::iter::once(class.class_name.clone())
        .chain(catalog.descendants(class).into_iter().map(|c| c.class_name.clone()))
        .collect()
}

/// One stored row, able to resolve relationship paths to related rows.
struct RowContext<'t> {
    catalog: Arc<Catalog>,
    tables: &'t Tables,
    row: &'t Record,
}

impl<'t> RowContext<'t> {
    /// Output record: select fields by alias plus related order values by path.
    fn project(&self, query: &SelectQuery) -> Record {
        if query.fields.is_empty() {
            return self.row.clone();
        }
        let mut record = Record {
            class_name: self.row.class_name.clone(),
            values: Vec::with_capacity(query.fields.len()),
        };
        for (alias, field) in &query.fields {
            record.set(alias.clone(), self.lookup(field).unwrap_or(Value::Null));
        }
        for order in query.order_criteria().fields() {
            if order.field.path.has_hops() {
                record.set(order.lookup_key(), self.lookup(&order.field).unwrap_or(Value::Null));
            }
        }
        record
    }

    /// First row reached from `row` through relationship `hop`.
    fn follow(&self, row: &'t Record, hop: &str) -> Option<&'t Record> {
        let class = self.catalog.get(row.class_name.as_deref()?)?;
        let relationship = self.catalog.find_relationship(&class, hop).ok()??;
        let related = self.catalog.get(&relationship.related_class)?;

        let tables = self.tables;
        hierarchy(&self.catalog, &related)
            .into_iter()
            .flat_map(move |name| tables.get(&name).into_iter().flatten())
            .find(|candidate| {
                relationship.keys.iter().all(|key| {
                    match (row.get(&key.own_property), candidate.get(&key.related_property)) {
                        (Some(own), Some(theirs)) => !own.is_null() && values_equal(own, theirs),
                        _ => false,
                    }
                })
            })
    }
}

impl PropertyLookup for RowContext<'_> {
    fn lookup(&self, field: &QueryField) -> Option<Value> {
        let mut row = self.row;
        for hop in &field.path.hops {
            row = self.follow(row, hop)?;
        }
        row.get(&field.path.property).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PropDef, PropType, RelationshipDef};
    use crate::criteria::Criteria;
    use crate::query::QueryBuilder;

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::new()
                .with_class(
                    ClassDef::new("Person")
                        .with_primary_key(["PersonId"])
                        .with_property(PropDef::new("PersonId", PropType::Int32))
                        .with_property(PropDef::new("Surname", PropType::String)),
                )
                .with_class(
                    ClassDef::new("Car")
                        .with_primary_key(["CarId"])
                        .with_property(PropDef::new("CarId", PropType::Int32))
                        .with_property(PropDef::new("Make", PropType::String))
                        .with_property(PropDef::new("OwnerId", PropType::Int32))
                        .with_relationship(RelationshipDef::single("Owner", "Person", "OwnerId", "PersonId")),
                )
                .with_class(
                    ClassDef::new("Shape")
                        .with_primary_key(["ShapeId"])
                        .with_property(PropDef::new("ShapeId", PropType::Int32)),
                )
                .with_class(ClassDef::new("Circle").inherits_single_table("Shape", "ShapeType")),
        )
    }

    fn store() -> MemoryStore {
        let store = MemoryStore::new(catalog());
        store
            .load_json("Person", r#"[{"PersonId": 1, "Surname": "Smith"}, {"PersonId": 2, "Surname": "Jones"}]"#)
            .unwrap();
        store
            .load_json(
                "Car",
                r#"[{"CarId": 10, "Make": "Ford", "OwnerId": 1},
                    {"CarId": 11, "Make": "Audi", "OwnerId": 2},
                    {"CarId": 12, "Make": "Fiat", "OwnerId": 1}]"#,
            )
            .unwrap();
        store
    }

    fn query(store: &MemoryStore, class: &str, criteria: &str, order_by: &str) -> SelectQuery {
        let class = store.catalog.require(class).unwrap();
        let builder = QueryBuilder::new(&store.catalog);
        let criteria = Criteria::parse(criteria).unwrap();
        let mut query = builder.create_select_query(&class, criteria).unwrap();
        let order = builder.create_order_criteria(&class, order_by).unwrap();
        query.set_order_criteria(order).unwrap();
        query
    }

    #[test]
    fn test_insert_converts_and_rejects_duplicates() {
        let store = store();
        assert_eq!(store.len(), 5);

        let err = store
            .insert(Record::for_class("Person").with("PersonId", "1"))
            .unwrap_err();
        assert!(matches!(err, Error::Store(_)));

        let err = store.insert(Record::new().with("PersonId", 3)).unwrap_err();
        assert!(matches!(err, Error::Developer(_)));
    }

    #[test]
    fn test_criteria_through_relationship_and_order() {
        let store = store();
        let query = query(&store, "Car", "Owner.Surname = 'Smith'", "Make DESC");
        let records = store.execute(&query).unwrap();

        let makes: Vec<&str> = records
            .iter()
            .filter_map(|r| r.get("Make").and_then(Value::as_str))
            .collect();
        assert_eq!(makes, vec!["Fiat", "Ford"]);
        assert_eq!(records[0].class_name.as_deref(), Some("Car"));
        assert_eq!(store.count(&query).unwrap(), 2);
    }

    #[test]
    fn test_related_order_values_and_paging() {
        let store = store();
        let mut query = query(&store, "Car", "", "Owner.Surname, Make");
        query.set_first_record_to_load(1).unwrap();
        query.set_limit(1);

        let records = store.execute(&query).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("Make"), Some(&Value::from("Fiat")));
        assert_eq!(records[0].get("Owner.Surname"), Some(&Value::from("Smith")));
        assert_eq!(store.count(&query).unwrap(), 3);
    }

    #[test]
    fn test_single_table_rows_carry_discriminator() {
        let store = MemoryStore::new(catalog());
        store.insert(Record::for_class("Shape").with("ShapeId", 1)).unwrap();
        store.insert(Record::for_class("Circle").with("ShapeId", 2)).unwrap();

        let circles = store.execute(&query(&store, "Circle", "", "")).unwrap();
        assert_eq!(circles.len(), 1);
        assert_eq!(circles[0].get("ShapeType"), Some(&Value::from("Circle")));

        let shapes = store.execute(&query(&store, "Shape", "", "ShapeId")).unwrap();
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].get("ShapeType"), Some(&Value::Null));
    }

    #[test]
    fn test_update_and_delete() {
        let store = store();
        assert!(store
            .update(Record::for_class("Person").with("PersonId", 2).with("Surname", "Brown"))
            .unwrap());
        let records = store.execute(&query(&store, "Person", "Surname = Brown", "")).unwrap();
        assert_eq!(records.len(), 1);

        assert!(store.delete("Person", &ObjectId::single("PersonId", 2)).unwrap());
        assert!(!store.delete("Person", &ObjectId::single("PersonId", 2)).unwrap());
        assert!(!store
            .update(Record::for_class("Person").with("PersonId", 2))
            .unwrap());
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_load_json_requires_array() {
        let store = MemoryStore::new(catalog());
        assert!(matches!(
            store.load_json("Person", r#"{"PersonId": 1}"#),
            Err(Error::Store(_))
        ));
        assert!(matches!(store.load_json("Person", "not json"), Err(Error::Json(_))));
    }

    #[test]
    fn test_rows_need_a_key() {
        let store = MemoryStore::new(catalog());
        assert!(matches!(store.load_json("Person", "[1, 2]"), Err(Error::Store(_))));
        assert!(matches!(
            store.load_json("Person", r#"[{"Surname": "Smith"}]"#),
            Err(Error::Store(_))
        ));
        assert!(matches!(
            store.insert(Record::for_class("Person").with("PersonId", Value::Null)),
            Err(Error::Store(_))
        ));
        assert!(store.is_empty());
    }
}
