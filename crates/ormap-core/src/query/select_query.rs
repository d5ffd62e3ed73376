//! The select query handed to data stores.

use std::fmt;

use indexmap::IndexMap;

use super::order::OrderCriteria;
use super::source::Source;
use crate::criteria::{Criteria, LogicalOp, QueryField};
use crate::error::{Error, Result};

/// A structured select: source graph, fields, filters, ordering and paging.
///
/// Setting criteria or order criteria merges the joins their prepared fields
/// carry into the query source.
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    /// Class the query loads.
    pub class_name: String,
    source: Option<Source>,
    /// Selected fields keyed by alias, in select order.
    pub fields: IndexMap<String, QueryField>,
    criteria: Option<Criteria>,
    discriminator_criteria: Option<Criteria>,
    order_criteria: OrderCriteria,
    first_record_to_load: usize,
    limit: Option<usize>,
}

impl SelectQuery {
    /// Create a query for `class_name` over `source`.
    pub fn new(class_name: impl Into<String>, source: Option<Source>) -> Self {
        Self {
            class_name: class_name.into(),
            source,
            ..Default::default()
        }
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    /// Replace the source graph.
    pub fn set_source(&mut self, source: Option<Source>) {
        self.source = source;
    }

    /// Add a selected field.
    pub fn add_field(&mut self, alias: impl Into<String>, field: QueryField) {
        self.fields.insert(alias.into(), field);
    }

    pub fn criteria(&self) -> Option<&Criteria> {
        self.criteria.as_ref()
    }

    /// Set the filter, merging the joins of its prepared fields into the source.
    pub fn set_criteria(&mut self, criteria: Option<Criteria>) -> Result<()> {
        if let Some(criteria) = &criteria {
            self.merge_field_sources(criteria.fields().into_iter(), "criteria")?;
        }
        self.criteria = criteria;
        Ok(())
    }

    pub fn discriminator_criteria(&self) -> Option<&Criteria> {
        self.discriminator_criteria.as_ref()
    }

    /// Set the inheritance discriminator filter.
    pub fn set_discriminator_criteria(&mut self, criteria: Option<Criteria>) {
        self.discriminator_criteria = criteria;
    }

    /// The filter a store must apply: criteria AND discriminator criteria.
    pub fn effective_criteria(&self) -> Option<Criteria> {
        Criteria::combine(
            self.criteria.clone(),
            LogicalOp::And,
            self.discriminator_criteria.clone(),
        )
    }

    pub fn order_criteria(&self) -> &OrderCriteria {
        &self.order_criteria
    }

    /// Set the ordering, merging the joins of its prepared fields into the source.
    pub fn set_order_criteria(&mut self, order: OrderCriteria) -> Result<()> {
        self.merge_field_sources(order.fields().iter().map(|o| &o.field), "order criteria")?;
        self.order_criteria = order;
        Ok(())
    }

    fn merge_field_sources<'a>(
        &mut self,
        fields: impl Iterator<Item = &'a QueryField>,
        what: &str,
    ) -> Result<()> {
        let source = self.source.as_mut().ok_or_else(|| {
            Error::developer(format!(
                "cannot set {} on a query for '{}' that has no source",
                what, self.class_name
            ))
        })?;
        for field in fields {
            if let Some(field_source) = &field.source {
                source.merge_with(field_source)?;
            }
        }
        Ok(())
    }

    /// Index of the first record returned (zero based).
    pub fn first_record_to_load(&self) -> usize {
        self.first_record_to_load
    }

    /// Set the first record to return. Negative values are rejected.
    pub fn set_first_record_to_load(&mut self, first: i64) -> Result<()> {
        self.first_record_to_load =
            usize::try_from(first).map_err(|_| Error::IndexOutOfRange { first })?;
        Ok(())
    }

    /// Maximum number of records returned; `None` is unbounded.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Set the limit. Negative values mean unbounded.
    pub fn set_limit(&mut self, limit: i64) {
        self.limit = usize::try_from(limit).ok();
    }

    /// Copy of this query with paging removed.
    pub fn without_paging(&self) -> Self {
        Self {
            first_record_to_load: 0,
            limit: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for SelectQuery {
    /// Pseudo-SQL rendering, used in traces and error messages.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.fields.is_empty() {
            f.write_str("*")?;
        }
        for (i, field) in self.fields.values().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", field)?;
        }
        if let Some(source) = &self.source {
            write!(f, " FROM {}", source)?;
        }
        if let Some(criteria) = self.effective_criteria() {
            write!(f, " WHERE {}", criteria)?;
        }
        if !self.order_criteria.is_empty() {
            write!(f, " ORDER BY {}", self.order_criteria)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        if self.first_record_to_load > 0 {
            write!(f, " OFFSET {}", self.first_record_to_load)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{ComparisonOp, PropertyPath};
    use crate::query::{JoinField, OrderField};

    fn field_through(relationship: &str, property: &str, join_field: (&str, &str)) -> QueryField {
        let mut source = Source::new("Person");
        source
            .join_to_source(Some(Source::new(relationship)))
            .unwrap()
            .add_join_field(JoinField::new(join_field.0, join_field.1));
        QueryField::prepared(
            PropertyPath {
                hops: vec![relationship.to_string()],
                property: property.to_string(),
            },
            property,
            source,
            relationship,
        )
    }

    #[test]
    fn test_paging_setters() {
        let mut query = SelectQuery::new("Person", Some(Source::new("Person")));
        query.set_first_record_to_load(3).unwrap();
        query.set_limit(4);
        assert_eq!(query.first_record_to_load(), 3);
        assert_eq!(query.limit(), Some(4));

        query.set_limit(-1);
        assert_eq!(query.limit(), None);

        let err = query.set_first_record_to_load(-1).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { first: -1 }));
        assert_eq!(query.first_record_to_load(), 3);
    }

    #[test]
    fn test_set_criteria_requires_source() {
        let mut query = SelectQuery::new("Person", None);
        let criteria = Criteria::leaf("Surname", ComparisonOp::Equals, "Smith");
        assert!(matches!(
            query.set_criteria(Some(criteria)),
            Err(Error::Developer(_))
        ));
        assert!(matches!(
            query.set_order_criteria(OrderCriteria::new().with(OrderField::asc("Surname"))),
            Err(Error::Developer(_))
        ));
    }

    #[test]
    fn test_criteria_and_order_joins_merge_into_source() {
        let mut query = SelectQuery::new("Person", Some(Source::new("Person")));
        let criteria = Criteria::for_field(
            field_through("Car", "Make", ("PersonId", "OwnerId")),
            ComparisonOp::Equals,
            "Ford",
        );
        query.set_criteria(Some(criteria)).unwrap();

        let order = OrderCriteria::new().with(OrderField {
            field: field_through("Car", "Model", ("PersonId", "OwnerId")),
            direction: crate::query::SortDirection::Asc,
        });
        query.set_order_criteria(order).unwrap();

        let source = query.source().unwrap();
        assert_eq!(source.join_count(), 1);
        assert_eq!(source.joins()[0].join_fields.len(), 1);
    }

    #[test]
    fn test_effective_criteria_includes_discriminator() {
        let mut query = SelectQuery::new("Circle", Some(Source::new("Circle")));
        query
            .set_criteria(Some(Criteria::leaf("Radius", ComparisonOp::GreaterThan, 2)))
            .unwrap();
        query.set_discriminator_criteria(Some(Criteria::leaf(
            "ShapeType",
            ComparisonOp::Equals,
            "Circle",
        )));
        assert_eq!(
            query.effective_criteria().unwrap().to_string(),
            "(Radius > 2) AND (ShapeType = 'Circle')"
        );
        assert_eq!(
            query.to_string(),
            "SELECT * FROM Circle WHERE (Radius > 2) AND (ShapeType = 'Circle')"
        );
    }
}
