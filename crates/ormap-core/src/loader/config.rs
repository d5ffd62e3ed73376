//! Loader configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`BusinessObjectLoader`](super::BusinessObjectLoader).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Re-sort loaded collections by their order criteria after
    /// reconciliation instead of trusting the store's order.
    pub sort_in_memory: bool,

    /// Overwrite clean live objects with freshly loaded values.
    /// Dirty or editing objects are never overwritten.
    pub refresh_live_objects: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            sort_in_memory: true,       // Stable in-memory sort after reconcile
            refresh_live_objects: true, // Clean live objects see store changes
        }
    }
}

impl LoaderConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether collections are sorted in memory.
    pub fn sort_in_memory(mut self, sort: bool) -> Self {
        self.sort_in_memory = sort;
        self
    }

    /// Set whether clean live objects are refreshed on load.
    pub fn refresh_live_objects(mut self, refresh: bool) -> Self {
        self.refresh_live_objects = refresh;
        self
    }
}
