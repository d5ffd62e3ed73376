//! Builds select queries from class metadata.

use std::sync::Arc;

use ormap_proto::Value;

use super::order::{OrderCriteria, OrderField};
use super::select_query::SelectQuery;
use super::source::{JoinField, JoinType, Source};
use crate::catalog::{Catalog, ClassDef, InheritanceKind, PropDef};
use crate::criteria::{ComparisonOp, Criteria, LogicalOp, PropertyPath, QueryField};
use crate::error::{Error, Result};

/// Resolves property paths, relationship chains and inheritance mappings
/// against a [`Catalog`].
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'a> {
    catalog: &'a Catalog,
}

impl<'a> QueryBuilder<'a> {
    /// Create a builder over a catalog.
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Select query loading `class`, with every mapped field and the
    /// discriminator filter. The criteria, if any, is prepared first.
    pub fn create_select_query(
        &self,
        class: &Arc<ClassDef>,
        criteria: Option<Criteria>,
    ) -> Result<SelectQuery> {
        let source = self.create_source(class)?;
        let mut query = SelectQuery::new(&class.class_name, Some(source));

        for (owner, prop) in self.catalog.all_properties(class)? {
            let (source_name, table) = self.column_home(class, &owner.class_name)?;
            let field = QueryField::prepared(
                PropertyPath::new(&prop.name),
                &prop.field_name,
                Source::with_entity(source_name, &table),
                &table,
            );
            query.add_field(prop.name.clone(), field);
        }

        if let Some(column) = self.discriminator_column(class)? {
            if !query.fields.contains_key(&column) {
                let field = self.discriminator_field(class, &column)?;
                query.add_field(column, field);
            }
        }

        query.set_discriminator_criteria(self.discriminator_criteria(class)?);

        if let Some(mut criteria) = criteria {
            self.prepare_criteria(class, &mut criteria)?;
            query.set_criteria(Some(criteria))?;
        }
        Ok(query)
    }

    /// Prepare a caller-built query: fill in the source, fields and
    /// discriminator filter when missing and prepare its criteria and order.
    ///
    /// A query without a class name is bound to `class`; a query naming a
    /// different class is rejected.
    pub fn prepare_select_query(&self, class: &Arc<ClassDef>, query: &mut SelectQuery) -> Result<()> {
        if query.class_name.is_empty() {
            query.class_name = class.class_name.clone();
        } else if query.class_name != class.class_name {
            return Err(Error::developer(format!(
                "cannot load '{}' with a query built for '{}'",
                class.class_name, query.class_name
            )));
        }

        let mut source = query.source().cloned();
        self.prepare_source(class, &mut source)?;
        query.set_source(source);

        if query.fields.is_empty() {
            query.fields = self.create_select_query(class, None)?.fields;
        }
        if query.discriminator_criteria().is_none() {
            query.set_discriminator_criteria(self.discriminator_criteria(class)?);
        }
        if let Some(mut criteria) = query.criteria().cloned() {
            self.prepare_criteria(class, &mut criteria)?;
            query.set_criteria(Some(criteria))?;
        }
        let mut order = query.order_criteria().clone();
        self.prepare_order_criteria(class, &mut order)?;
        query.set_order_criteria(order)
    }

    /// The class's source with its inheritance joins.
    ///
    /// Class-table children join each ancestor's table on the primary key.
    /// Single-table children use the table of their nearest non-single-table
    /// ancestor. Concrete-table children need no joins.
    pub fn create_source(&self, class: &Arc<ClassDef>) -> Result<Source> {
        self.catalog.ancestors(class)?;
        let owner = self.table_owner(class)?;
        let mut source = Source::with_entity(&class.class_name, &owner.table_name);

        if let InheritanceKind::ClassTable { parent } = &owner.inheritance {
            let parent = self.catalog.require(parent)?;
            let parent_source = self.create_source(&parent)?;
            let key_columns = self.key_columns(&owner)?;
            if let Some(join) = source.inherit_from(Some(parent_source)) {
                for column in key_columns {
                    join.add_join_field(JoinField::new(column.clone(), column));
                }
            }
        }
        Ok(source)
    }

    /// Resolve every leaf of `criteria` against `class`.
    ///
    /// Attaches physical fields and source chains and converts literals to
    /// their property's type. Leaves that are already prepared are skipped.
    pub fn prepare_criteria(&self, class: &Arc<ClassDef>, criteria: &mut Criteria) -> Result<()> {
        criteria.visit_leaves_mut(&mut |field, op, value| {
            if field.is_prepared() {
                return Ok(());
            }
            let (prepared, prop) = self.resolve_field(class, &field.path, JoinType::Inner)?;
            match op {
                ComparisonOp::Is | ComparisonOp::IsNot => {}
                ComparisonOp::Like | ComparisonOp::NotLike => {
                    if !matches!(value, Value::String(_)) {
                        *value = Value::String(value.to_key_string());
                    }
                }
                _ => {
                    *value = prop.prop_type.convert(value).map_err(|source| {
                        Error::InvalidCriteriaValue {
                            property: field.path.to_string(),
                            source,
                        }
                    })?;
                }
            }
            *field = prepared;
            Ok(())
        })
    }

    /// Resolve a query source against `class`.
    ///
    /// `None` becomes the class's source. A source named after the class is
    /// kept. A source named after a relationship (with optional nested joins
    /// naming further relationships) is replaced by the class's source joined
    /// through that relationship chain.
    pub fn prepare_source(&self, class: &Arc<ClassDef>, source: &mut Option<Source>) -> Result<()> {
        let hops = match source.as_ref() {
            None => {
                *source = Some(self.create_source(class)?);
                return Ok(());
            }
            Some(existing) if existing.name() == class.class_name => return Ok(()),
            Some(existing) => {
                let mut hops = vec![existing.name().to_string()];
                let mut current = existing.child_source();
                while let Some(child) = current {
                    hops.push(child.name().to_string());
                    current = child.child_source();
                }
                hops
            }
        };

        let (chain, _) = self.relationship_chain(class, &hops, JoinType::Inner)?;
        let mut resolved = self.create_source(class)?;
        resolved.merge_with(&chain)?;
        *source = Some(resolved);
        Ok(())
    }

    /// Parse and resolve `"path [ASC|DESC], ..."`. Blank input yields empty
    /// order criteria.
    pub fn create_order_criteria(&self, class: &Arc<ClassDef>, order_by: &str) -> Result<OrderCriteria> {
        let mut order = OrderCriteria::new();
        if order_by.trim().is_empty() {
            return Ok(order);
        }
        for term in order_by.split(',') {
            let field = OrderField::parse(term).ok_or_else(|| Error::InvalidOrderCriteria {
                term: term.trim().to_string(),
                class: class.class_name.clone(),
                reason: "expected 'property [ASC|DESC]'".to_string(),
            })?;
            order.add(field);
        }
        self.prepare_order_criteria(class, &mut order)?;
        Ok(order)
    }

    /// Resolve unprepared order fields against `class` (left outer joins).
    pub fn prepare_order_criteria(&self, class: &Arc<ClassDef>, order: &mut OrderCriteria) -> Result<()> {
        for order_field in order.fields_mut() {
            if order_field.field.is_prepared() {
                continue;
            }
            let (prepared, _) = self
                .resolve_field(class, &order_field.field.path, JoinType::LeftOuter)
                .map_err(|err| Error::InvalidOrderCriteria {
                    term: order_field.to_string(),
                    class: class.class_name.clone(),
                    reason: err.to_string(),
                })?;
            order_field.field = prepared;
        }
        Ok(())
    }

    /// Single-table inheritance filter for `class`.
    ///
    /// OR-chains `discriminator = '<Name>'` for the class (when it is a
    /// single-table child) and every single-table descendant sharing its table.
    /// A hierarchy root also matches rows whose discriminator is null.
    pub fn discriminator_criteria(&self, class: &Arc<ClassDef>) -> Result<Option<Criteria>> {
        let Some(column) = self.discriminator_column(class)? else {
            return Ok(None);
        };
        let field = self.discriminator_field(class, &column)?;

        let mut criteria = if class.is_single_table_child() {
            None
        } else {
            Some(Criteria::for_field(field.clone(), ComparisonOp::Is, Value::Null))
        };

        for member in self.single_table_members(class)? {
            let leaf = Criteria::for_field(
                field.clone(),
                ComparisonOp::Equals,
                Value::String(member.class_name.clone()),
            );
            criteria = Criteria::combine(criteria, LogicalOp::Or, Some(leaf));
        }
        Ok(criteria)
    }

    /// Discriminator column used by `class`'s table, if any.
    pub fn discriminator_column(&self, class: &Arc<ClassDef>) -> Result<Option<String>> {
        if let Some(column) = class.discriminator() {
            return Ok(Some(column.to_string()));
        }
        Ok(self
            .single_table_members(class)?
            .iter()
            .find_map(|member| member.discriminator().map(str::to_string)))
    }

    /// The class itself (when a single-table child) followed by its
    /// single-table descendants stored in the same table.
    fn single_table_members(&self, class: &Arc<ClassDef>) -> Result<Vec<Arc<ClassDef>>> {
        let owner = self.table_owner(class)?;
        let mut members = Vec::new();
        if class.is_single_table_child() {
            members.push(Arc::clone(class));
        }
        for descendant in self.catalog.descendants(class) {
            if descendant.is_single_table_child()
                && self.table_owner(&descendant)?.class_name == owner.class_name
            {
                members.push(descendant);
            }
        }
        Ok(members)
    }

    fn discriminator_field(&self, class: &Arc<ClassDef>, column: &str) -> Result<QueryField> {
        let owner = self.table_owner(class)?;
        Ok(QueryField::prepared(
            PropertyPath::new(column),
            column,
            Source::with_entity(&class.class_name, &owner.table_name),
            &owner.table_name,
        ))
    }

    /// Resolve a property path to a prepared field rooted at `class`.
    fn resolve_field(
        &self,
        class: &Arc<ClassDef>,
        path: &PropertyPath,
        join_type: JoinType,
    ) -> Result<(QueryField, PropDef)> {
        let (source, target) = self.relationship_chain(class, &path.hops, join_type)?;
        let (owner, prop) = self
            .catalog
            .find_property(&target, &path.property)?
            .ok_or_else(|| Error::PropertyNotFound {
                property: path.property.clone(),
                class: target.class_name.clone(),
            })?;
        let (_, table) = self.column_home(&target, &owner.class_name)?;
        let field = QueryField::prepared(path.clone(), &prop.field_name, source, table);
        Ok((field, prop))
    }

    /// Walk `hops` from `class`, returning the class's bare source joined
    /// through the chain and the class at the end of it.
    ///
    /// Joined sources are named after the relationship that reaches them.
    fn relationship_chain(
        &self,
        class: &Arc<ClassDef>,
        hops: &[String],
        join_type: JoinType,
    ) -> Result<(Source, Arc<ClassDef>)> {
        let mut current = Arc::clone(class);
        let mut links = Vec::with_capacity(hops.len());
        for hop in hops {
            let relationship = self
                .catalog
                .find_relationship(&current, hop)?
                .ok_or_else(|| Error::RelationshipNotFound {
                    relationship: hop.clone(),
                    class: current.class_name.clone(),
                })?;
            let related = self.catalog.require(&relationship.related_class)?;
            let mut join_fields = Vec::with_capacity(relationship.keys.len());
            for key in &relationship.keys {
                join_fields.push(JoinField::new(
                    self.column_name(&current, &key.own_property)?,
                    self.column_name(&related, &key.related_property)?,
                ));
            }
            links.push((relationship.name, Arc::clone(&related), join_fields));
            current = related;
        }

        let mut tail: Option<(Source, Vec<JoinField>)> = None;
        for (name, related, join_fields) in links.into_iter().rev() {
            let mut source = self.create_source(&related)?.with_name(name);
            if let Some((child, child_fields)) = tail.take() {
                attach(&mut source, child, child_fields, join_type);
            }
            tail = Some((source, join_fields));
        }

        let owner = self.table_owner(class)?;
        let mut root = Source::with_entity(&class.class_name, &owner.table_name);
        if let Some((child, join_fields)) = tail {
            attach(&mut root, child, join_fields, join_type);
        }
        Ok((root, current))
    }

    /// Class whose table physically holds `class`'s own columns.
    fn table_owner(&self, class: &Arc<ClassDef>) -> Result<Arc<ClassDef>> {
        if !class.is_single_table_child() {
            return Ok(Arc::clone(class));
        }
        self.catalog
            .ancestors(class)?
            .into_iter()
            .find(|ancestor| !ancestor.is_single_table_child())
            .ok_or_else(|| {
                Error::developer(format!(
                    "single-table class '{}' has no root table",
                    class.class_name
                ))
            })
    }

    /// Source name and table holding the columns declared by `declaring`,
    /// as seen from a query on `class`.
    fn column_home(&self, class: &Arc<ClassDef>, declaring: &str) -> Result<(String, String)> {
        let mut home = (
            class.class_name.clone(),
            self.table_owner(class)?.table_name.clone(),
        );
        let mut current = Arc::clone(class);
        loop {
            if current.class_name == declaring {
                return Ok(home);
            }
            let Some(parent) = self.catalog.parent(&current)? else {
                return Err(Error::developer(format!(
                    "class '{}' does not inherit from '{}'",
                    class.class_name, declaring
                )));
            };
            if let InheritanceKind::ClassTable { .. } = current.inheritance {
                home = (
                    parent.class_name.clone(),
                    self.table_owner(&parent)?.table_name.clone(),
                );
            }
            current = parent;
        }
    }

    fn column_name(&self, class: &Arc<ClassDef>, property: &str) -> Result<String> {
        self.catalog
            .find_property(class, property)?
            .map(|(_, prop)| prop.field_name)
            .ok_or_else(|| Error::PropertyNotFound {
                property: property.to_string(),
                class: class.class_name.clone(),
            })
    }

    fn key_columns(&self, class: &Arc<ClassDef>) -> Result<Vec<String>> {
        self.catalog
            .primary_key(class)?
            .iter()
            .map(|name| self.column_name(class, name))
            .collect()
    }
}

fn attach(parent: &mut Source, child: Source, join_fields: Vec<JoinField>, join_type: JoinType) {
    if let Some(join) = parent.join_to_source(Some(child)) {
        join.join_type = join_type;
        for field in join_fields {
            join.add_join_field(field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PropType, RelationshipDef};
    use pretty_assertions::assert_eq;

    fn catalog() -> Catalog {
        Catalog::new()
            .with_class(
                ClassDef::new("Person")
                    .with_primary_key(["PersonId"])
                    .with_property(PropDef::new("PersonId", PropType::Int32))
                    .with_property(PropDef::new("Surname", PropType::String).with_field_name("Surname_field"))
                    .with_property(PropDef::new("DateOfBirth", PropType::DateTime))
                    .with_relationship(RelationshipDef::multiple("Cars", "Car", "PersonId", "OwnerId")),
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
            .with_class(
                ClassDef::new("Party")
                    .with_table("tbl_party")
                    .with_primary_key(["PartyId"])
                    .with_property(PropDef::new("PartyId", PropType::Int32))
                    .with_property(PropDef::new("Name", PropType::String)),
            )
            .with_class(
                ClassDef::new("Customer")
                    .with_table("tbl_customer")
                    .inherits_class_table("Party")
                    .with_property(PropDef::new("CreditLimit", PropType::Float64)),
            )
            .with_class(
                ClassDef::new("Employee")
                    .with_table("tbl_employee")
                    .inherits_concrete_table("Party")
                    .with_property(PropDef::new("Salary", PropType::Float64)),
            )
    }

    fn prepared(catalog: &Catalog, class: &str, criteria: &str) -> Result<Criteria> {
        let class = catalog.require(class)?;
        let mut criteria = Criteria::parse(criteria)?.expect("non-blank criteria");
        QueryBuilder::new(catalog).prepare_criteria(&class, &mut criteria)?;
        Ok(criteria)
    }

    #[test]
    fn test_prepare_resolves_field_name_and_converts_value() {
        let catalog = catalog();
        let criteria = prepared(&catalog, "Person", "Surname = Smith AND PersonId = '7'").unwrap();
        assert!(criteria.is_prepared());
        assert_eq!(
            criteria.to_string(),
            "(Person.Surname_field = 'Smith') AND (Person.PersonId = 7)"
        );
    }

    #[test]
    fn test_prepare_resolves_today_sentinel() {
        let catalog = catalog();
        let criteria = prepared(&catalog, "Person", "DateOfBirth < today").unwrap();
        match criteria {
            Criteria::Leaf { value, .. } => assert_eq!(value, Value::today()),
            other => panic!("expected leaf, got {}", other),
        }
    }

    #[test]
    fn test_prepare_through_relationship() {
        let catalog = catalog();
        let criteria = prepared(&catalog, "Car", "Owner.Surname = 'Smith'").unwrap();
        let Criteria::Leaf { field, .. } = &criteria else {
            panic!("expected leaf");
        };
        assert_eq!(field.qualified_name(), "Person.Surname_field");
        let source = field.source.as_ref().unwrap();
        assert_eq!(source.name(), "Car");
        assert_eq!(source.child_source().unwrap().name(), "Owner");
        assert_eq!(
            source.joins()[0].join_fields,
            vec![JoinField::new("OwnerId", "PersonId")]
        );
    }

    #[test]
    fn test_prepare_is_idempotent() {
        let catalog = catalog();
        let car = catalog.require("Car").unwrap();
        let builder = QueryBuilder::new(&catalog);

        let mut criteria = Criteria::leaf("Owner.Surname", ComparisonOp::Equals, "Smith");
        builder.prepare_criteria(&car, &mut criteria).unwrap();
        let first = criteria.to_string();
        builder.prepare_criteria(&car, &mut criteria).unwrap();
        assert_eq!(criteria.to_string(), first);

        let query = builder.create_select_query(&car, Some(criteria.clone())).unwrap();
        let joins = query.source().unwrap().join_count();
        let mut again = query.clone();
        again.set_criteria(Some(criteria)).unwrap();
        assert_eq!(joins, 1);
        assert_eq!(again.source().unwrap().join_count(), joins);
    }

    #[test]
    fn test_prepare_errors() {
        let catalog = catalog();
        assert!(matches!(
            prepared(&catalog, "Car", "Driver.Surname = 'x'"),
            Err(Error::RelationshipNotFound { relationship, class })
                if relationship == "Driver" && class == "Car"
        ));
        assert!(matches!(
            prepared(&catalog, "Car", "Owner.Height = 2"),
            Err(Error::PropertyNotFound { property, class })
                if property == "Height" && class == "Person"
        ));
        assert!(matches!(
            prepared(&catalog, "Car", "CarId = 'abc'"),
            Err(Error::InvalidCriteriaValue { .. })
        ));
    }

    #[test]
    fn test_class_table_source_and_fields() {
        let catalog = catalog();
        let customer = catalog.require("Customer").unwrap();
        let builder = QueryBuilder::new(&catalog);

        let source = builder.create_source(&customer).unwrap();
        assert_eq!(
            source.to_string(),
            "tbl_customer AS Customer JOIN tbl_party AS Party ON Customer.PartyId = Party.PartyId"
        );

        let query = builder.create_select_query(&customer, None).unwrap();
        let names: Vec<&str> = query.fields.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["PartyId", "Name", "CreditLimit"]);
        assert_eq!(query.fields["Name"].qualified_name(), "tbl_party.Name");
        assert_eq!(query.fields["CreditLimit"].qualified_name(), "tbl_customer.CreditLimit");
        assert!(query.discriminator_criteria().is_none());

        let criteria = prepared(&catalog, "Customer", "Name = 'Acme'").unwrap();
        assert_eq!(criteria.to_string(), "tbl_party.Name = 'Acme'");
    }

    #[test]
    fn test_concrete_table_keeps_inherited_columns_local() {
        let catalog = catalog();
        let employee = catalog.require("Employee").unwrap();
        let builder = QueryBuilder::new(&catalog);

        let source = builder.create_source(&employee).unwrap();
        assert!(source.inheritance_joins().is_empty());
        assert_eq!(source.join_count(), 0);
        assert_eq!(source.to_string(), "tbl_employee AS Employee");

        let query = builder.create_select_query(&employee, None).unwrap();
        let names: Vec<&str> = query.fields.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["PartyId", "Name", "Salary"]);
        assert_eq!(query.fields["Name"].qualified_name(), "tbl_employee.Name");
        assert_eq!(query.fields["PartyId"].qualified_name(), "tbl_employee.PartyId");
        assert!(query.discriminator_criteria().is_none());

        let criteria = prepared(&catalog, "Employee", "Name = 'Ann'").unwrap();
        assert_eq!(criteria.to_string(), "tbl_employee.Name = 'Ann'");
    }

    #[test]
    fn test_prepare_select_query_binds_class() {
        let catalog = catalog();
        let person = catalog.require("Person").unwrap();
        let builder = QueryBuilder::new(&catalog);

        let mut query = SelectQuery::default();
        builder.prepare_select_query(&person, &mut query).unwrap();
        assert_eq!(query.class_name, "Person");
        assert_eq!(query.source().map(Source::name), Some("Person"));

        let mut query = SelectQuery::new("Car", Some(Source::new("Person")));
        let err = builder.prepare_select_query(&person, &mut query).unwrap_err();
        assert!(matches!(err, Error::Developer(_)));
    }

    #[test]
    fn test_discriminator_for_root_and_children() {
        let catalog = catalog();
        let builder = QueryBuilder::new(&catalog);

        let shape = catalog.require("Shape").unwrap();
        assert_eq!(
            builder.discriminator_criteria(&shape).unwrap().unwrap().to_string(),
            "((Shape.ShapeType IS NULL) OR (Shape.ShapeType = 'Circle')) \
             OR (Shape.ShapeType = 'FilledCircle')"
        );

        let circle = catalog.require("Circle").unwrap();
        assert_eq!(
            builder.discriminator_criteria(&circle).unwrap().unwrap().to_string(),
            "(Shape.ShapeType = 'Circle') OR (Shape.ShapeType = 'FilledCircle')"
        );

        let filled = catalog.require("FilledCircle").unwrap();
        assert_eq!(
            builder.discriminator_criteria(&filled).unwrap().unwrap().to_string(),
            "Shape.ShapeType = 'FilledCircle'"
        );

        let person = catalog.require("Person").unwrap();
        assert!(builder.discriminator_criteria(&person).unwrap().is_none());
    }

    #[test]
    fn test_single_table_select_includes_discriminator_field() {
        let catalog = catalog();
        let circle = catalog.require("Circle").unwrap();
        let query = QueryBuilder::new(&catalog).create_select_query(&circle, None).unwrap();

        assert_eq!(query.source().unwrap().entity_name(), "Shape");
        let names: Vec<&str> = query.fields.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["ShapeId", "Name", "Radius", "ShapeType"]);
    }

    #[test]
    fn test_prepare_source() {
        let catalog = catalog();
        let car = catalog.require("Car").unwrap();
        let builder = QueryBuilder::new(&catalog);

        let mut source = None;
        builder.prepare_source(&car, &mut source).unwrap();
        assert_eq!(source.as_ref().unwrap().name(), "Car");

        let mut source = Some(Source::new("Owner"));
        builder.prepare_source(&car, &mut source).unwrap();
        let source = source.unwrap();
        assert_eq!(source.name(), "Car");
        assert_eq!(source.child_source().unwrap().name(), "Owner");
        assert_eq!(source.child_source().unwrap().entity_name(), "Person");

        let mut source = Some(Source::new("Wheels"));
        assert!(matches!(
            builder.prepare_source(&car, &mut source),
            Err(Error::RelationshipNotFound { .. })
        ));
    }

    #[test]
    fn test_create_order_criteria() {
        let catalog = catalog();
        let car = catalog.require("Car").unwrap();
        let builder = QueryBuilder::new(&catalog);

        let order = builder.create_order_criteria(&car, "Owner.Surname DESC, Make").unwrap();
        assert_eq!(order.to_string(), "Owner.Surname DESC, Make ASC");
        let owner_source = order.fields()[0].field.source.as_ref().unwrap();
        assert_eq!(owner_source.joins()[0].join_type, JoinType::LeftOuter);

        assert!(builder.create_order_criteria(&car, "  ").unwrap().is_empty());
        assert!(matches!(
            builder.create_order_criteria(&car, "Colour"),
            Err(Error::InvalidOrderCriteria { term, class, .. }) if term == "Colour ASC" && class == "Car"
        ));
        assert!(matches!(
            builder.create_order_criteria(&car, "Make upward"),
            Err(Error::InvalidOrderCriteria { term, .. }) if term == "Make upward"
        ));
    }
}
