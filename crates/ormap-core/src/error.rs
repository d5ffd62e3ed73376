//! Core error types.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the mapping core.
#[derive(Debug, Error)]
pub enum Error {
    /// A should-be-unique lookup matched several records.
    #[error(
        "loading a '{class}' with criteria '{criteria}' returned more than one record \
         when only one was expected"
    )]
    DuplicateObjects { class: String, criteria: String },

    /// A previously known key no longer exists in the store.
    #[error(
        "the '{class}' with key '{key}' could not be loaded; it may have been deleted \
         by another user"
    )]
    ObjectDeletedConcurrently { class: String, key: String },

    /// A refresh was requested on an object that is being edited.
    #[error("cannot refresh '{class}' with key '{key}' while it is being edited")]
    EditInProgress { class: String, key: String },

    /// Paging started before the first record.
    #[error("first record to load must be zero or greater, got {first}")]
    IndexOutOfRange { first: i64 },

    /// A relationship name in a path or source is not declared on the class.
    #[error("relationship '{relationship}' is not defined on class '{class}'")]
    RelationshipNotFound { relationship: String, class: String },

    /// A property name in a path is not declared on the class.
    #[error("property '{property}' is not defined on class '{class}'")]
    PropertyNotFound { property: String, class: String },

    /// An order-by term could not be resolved.
    #[error("invalid order criteria '{term}' for class '{class}': {reason}")]
    InvalidOrderCriteria {
        term: String,
        class: String,
        reason: String,
    },

    /// A criteria literal cannot be converted to its property's type.
    #[error("invalid value for property '{property}': {source}")]
    InvalidCriteriaValue {
        property: String,
        #[source]
        source: ormap_proto::Error,
    },

    /// A criteria string could not be parsed.
    #[error("criteria parse error: {0}")]
    CriteriaParse(#[from] crate::criteria::ParseError),

    /// No class definition is registered under this name.
    #[error("class '{0}' is not registered in the catalog")]
    UnknownClass(String),

    /// An identity is already live in the identity map.
    #[error("an object of class '{class}' with key '{key}' is already registered")]
    AlreadyRegistered { class: String, key: String },

    /// Programmer misuse of the API.
    #[error("developer error: {0}")]
    Developer(String),

    /// Value conversion error.
    #[error("value error: {0}")]
    Value(#[from] ormap_proto::Error),

    /// JSON input error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure reported by a data store.
    #[error("store error: {0}")]
    Store(String),
}

impl Error {
    /// Create a developer error.
    pub fn developer(message: impl Into<String>) -> Self {
        Error::Developer(message.into())
    }

    /// Whether this error signals inconsistent data rather than misuse.
    pub fn is_data_inconsistency(&self) -> bool {
        matches!(
            self,
            Error::DuplicateObjects { .. } | Error::ObjectDeletedConcurrently { .. }
        )
    }
}
