//! Source and join graph.
//!
//! A [`Source`] names a table context and carries two join lists: relationship
//! joins (filter/order aids) and inheritance joins (which assemble one logical
//! row from several physical tables). The graph is an owned tree; a join
//! refers to its parent by name only, so cloning a query never shares join
//! state with another query.

use std::fmt;

use crate::error::{Error, Result};

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinType {
    /// Rows without a match are dropped.
    #[default]
    Inner,
    /// Rows without a match are kept.
    LeftOuter,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "JOIN"),
            JoinType::LeftOuter => write!(f, "LEFT JOIN"),
        }
    }
}

/// A pair of physical columns equated by a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinField {
    /// Column on the source side.
    pub from_field: String,
    /// Column on the target side.
    pub to_field: String,
}

impl JoinField {
    /// Create a join field pair.
    pub fn new(from_field: impl Into<String>, to_field: impl Into<String>) -> Self {
        Self {
            from_field: from_field.into(),
            to_field: to_field.into(),
        }
    }
}

/// An edge from a named source to a target source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Name of the source this join hangs off.
    pub from_source: String,
    /// Target source, which may carry further joins.
    pub to_source: Source,
    /// Join type.
    pub join_type: JoinType,
    /// Column pairs equated by the join.
    pub join_fields: Vec<JoinField>,
}

impl Join {
    /// Create a join without any join fields.
    pub fn new(from_source: impl Into<String>, to_source: Source, join_type: JoinType) -> Self {
        Self {
            from_source: from_source.into(),
            to_source,
            join_type,
            join_fields: Vec::new(),
        }
    }

    /// Add a join field pair unless an equal pair exists.
    pub fn add_join_field(&mut self, field: JoinField) {
        if !self.join_fields.contains(&field) {
            self.join_fields.push(field);
        }
    }

    /// Builder-style [`Join::add_join_field`].
    pub fn with_join_field(mut self, from_field: impl Into<String>, to_field: impl Into<String>) -> Self {
        self.add_join_field(JoinField::new(from_field, to_field));
        self
    }
}

/// A named table context with relationship and inheritance joins.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Source {
    name: String,
    entity_name: String,
    joins: Vec<Join>,
    inheritance_joins: Vec<Join>,
}

impl Source {
    /// Create a source whose entity (table) name equals its name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            entity_name: name.clone(),
            name,
            joins: Vec::new(),
            inheritance_joins: Vec::new(),
        }
    }

    /// Create a source with a distinct entity (table) name.
    pub fn with_entity(name: impl Into<String>, entity_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_name: entity_name.into(),
            joins: Vec::new(),
            inheritance_joins: Vec::new(),
        }
    }

    /// Rename the source, keeping its joins attached.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        for join in self.joins.iter_mut().chain(self.inheritance_joins.iter_mut()) {
            join.from_source = self.name.clone();
        }
        self
    }

    /// Logical name (class or relationship name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical table name.
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Whether the source has no name.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// Relationship joins.
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Inheritance joins.
    pub fn inheritance_joins(&self) -> &[Join] {
        &self.inheritance_joins
    }

    /// Append a relationship join to `child`.
    ///
    /// Returns the existing join when one to a same-named target is present.
    /// `None` is a no-op.
    pub fn join_to_source(&mut self, child: Option<Source>) -> Option<&mut Join> {
        let child = child?;
        Some(Self::push_join(&self.name, &mut self.joins, child, JoinType::Inner))
    }

    /// Append an inheritance join to an ancestor's source.
    ///
    /// Same idempotence rules as [`Source::join_to_source`].
    pub fn inherit_from(&mut self, ancestor: Option<Source>) -> Option<&mut Join> {
        let ancestor = ancestor?;
        Some(Self::push_join(
            &self.name,
            &mut self.inheritance_joins,
            ancestor,
            JoinType::Inner,
        ))
    }

    fn push_join<'a>(
        from: &str,
        joins: &'a mut Vec<Join>,
        child: Source,
        join_type: JoinType,
    ) -> &'a mut Join {
        let index = match joins.iter().position(|j| j.to_source.name == child.name) {
            Some(index) => index,
            None => {
                joins.push(Join::new(from, child, join_type));
                joins.len() - 1
            }
        };
        &mut joins[index]
    }

    /// Target of the first relationship join.
    pub fn child_source(&self) -> Option<&Source> {
        self.joins.first().map(|j| &j.to_source)
    }

    /// End of the first-join chain, or this source when it has no joins.
    pub fn child_source_leaf(&self) -> &Source {
        let mut current = self;
        while let Some(child) = current.child_source() {
            current = child;
        }
        current
    }

    /// Merge another graph rooted at a same-named source into this one.
    ///
    /// Joins to same-named targets are merged recursively and their join
    /// fields unioned; other joins are adopted as-is. Relationship and
    /// inheritance joins merge independently. Merging an unnamed source is a
    /// no-op.
    pub fn merge_with(&mut self, other: &Source) -> Result<()> {
        if other.is_empty() {
            return Ok(());
        }
        if self.name != other.name {
            return Err(Error::developer(format!(
                "cannot merge source '{}' into source '{}': sources must share a name",
                other.name, self.name
            )));
        }
        Self::merge_joins(&mut self.joins, &other.joins)?;
        Self::merge_joins(&mut self.inheritance_joins, &other.inheritance_joins)
    }

    fn merge_joins(local: &mut Vec<Join>, incoming: &[Join]) -> Result<()> {
        for join in incoming {
            match local
                .iter_mut()
                .find(|j| j.to_source.name == join.to_source.name)
            {
                Some(existing) => {
                    existing.to_source.merge_with(&join.to_source)?;
                    for field in &join.join_fields {
                        existing.add_join_field(field.clone());
                    }
                }
                None => local.push(join.clone()),
            }
        }
        Ok(())
    }

    /// Total number of joins in the graph, both kinds, at every depth.
    pub fn join_count(&self) -> usize {
        self.joins
            .iter()
            .chain(self.inheritance_joins.iter())
            .map(|j| 1 + j.to_source.join_count())
            .sum()
    }

    /// Find a source by name anywhere in the graph.
    pub fn find(&self, name: &str) -> Option<&Source> {
        if self.name == name {
            return Some(self);
        }
        self.joins
            .iter()
            .chain(self.inheritance_joins.iter())
            .find_map(|j| j.to_source.find(name))
    }

    fn fmt_joins(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for join in self.inheritance_joins.iter().chain(self.joins.iter()) {
            write!(
                f,
                " {} {} AS {}",
                join.join_type,
                join.to_source.entity_name,
                join.to_source.name
            )?;
            for (i, field) in join.join_fields.iter().enumerate() {
                let keyword = if i == 0 { "ON" } else { "AND" };
                write!(
                    f,
                    " {} {}.{} = {}.{}",
                    keyword, join.from_source, field.from_field, join.to_source.name, field.to_field
                )?;
            }
            join.to_source.fmt_joins(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for Source {
    /// Renders a FROM-clause style description, used in traces.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == self.entity_name {
            write!(f, "{}", self.name)?;
        } else {
            write!(f, "{} AS {}", self.entity_name, self.name)?;
        }
        self.fmt_joins(f)
    }
}
