//! Order criteria.

use std::cmp::Ordering;
use std::fmt;

use ormap_proto::Value;

use crate::criteria::{compare_values, PropertyLookup, QueryField};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("ASC"),
            SortDirection::Desc => f.write_str("DESC"),
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderField {
    pub field: QueryField,
    pub direction: SortDirection,
}

impl OrderField {
    /// Create an ascending sort key for a dotted path.
    pub fn asc(path: &str) -> Self {
        Self {
            field: QueryField::from_path(path),
            direction: SortDirection::Asc,
        }
    }

    /// Create a descending sort key for a dotted path.
    pub fn desc(path: &str) -> Self {
        Self {
            field: QueryField::from_path(path),
            direction: SortDirection::Desc,
        }
    }

    /// Parse `path [ASC|DESC]`. Returns `None` when the term is malformed.
    pub fn parse(term: &str) -> Option<Self> {
        let mut words = term.split_whitespace();
        let path = words.next()?;
        let direction = match words.next() {
            None => SortDirection::Asc,
            Some(word) if word.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            Some(word) if word.eq_ignore_ascii_case("desc") => SortDirection::Desc,
            Some(_) => return None,
        };
        if words.next().is_some() || path.split('.').any(str::is_empty) {
            return None;
        }
        Some(Self {
            field: QueryField::from_path(path),
            direction,
        })
    }

    /// Key under which a store returns this field's value.
    pub fn lookup_key(&self) -> String {
        self.field.path.to_string()
    }
}

impl fmt::Display for OrderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field.path, self.direction)
    }
}

/// An ordered list of sort keys; later keys break ties of earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderCriteria {
    fields: Vec<OrderField>,
}

impl OrderCriteria {
    /// Create empty order criteria.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sort key.
    pub fn add(&mut self, field: OrderField) {
        self.fields.push(field);
    }

    /// Builder-style [`OrderCriteria::add`].
    pub fn with(mut self, field: OrderField) -> Self {
        self.add(field);
        self
    }

    /// Sort keys in priority order.
    pub fn fields(&self) -> &[OrderField] {
        &self.fields
    }

    /// Mutable sort keys.
    pub fn fields_mut(&mut self) -> &mut [OrderField] {
        &mut self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Compare two rows. Nulls and missing values sort first; values of
    /// incompatible types compare equal.
    pub fn compare(&self, a: &dyn PropertyLookup, b: &dyn PropertyLookup) -> Ordering {
        for order in &self.fields {
            let left = a.lookup(&order.field).unwrap_or(Value::Null);
            let right = b.lookup(&order.field).unwrap_or(Value::Null);
            let ordering = match (left.is_null(), right.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => compare_values(&left, &right).unwrap_or(Ordering::Equal),
            };
            let ordering = match order.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for OrderCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}
