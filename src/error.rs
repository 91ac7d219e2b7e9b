// Copyright 2025 Oxide Computer Company

use thiserror::Error;

use crate::{
    category::{Category, ValueKind},
    model::Dialect,
};

/// A merge that could not complete. No partial document accompanies an
/// error.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A collision resolved to `fail`, either by strategy or by decision.
    #[error("{category} collision on '{name}': {reason}")]
    Collision {
        category: Category,
        name: String,
        reason: String,
    },

    #[error("{action} not supported for {category} collisions")]
    UnsupportedAction {
        action: &'static str,
        category: Category,
    },

    #[error("custom value for {category} '{name}' must be a {expected}, found a {found}")]
    CustomMismatch {
        category: Category,
        name: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("at least two documents are required to merge, got {0}")]
    NotEnoughDocuments(usize),

    #[error("{document} is declared as {declared} but is a {actual} document")]
    DialectMismatch {
        document: String,
        declared: Dialect,
        actual: Dialect,
    },

    #[error("cannot merge {document} ({found}) into {expected} documents")]
    MixedDialects {
        document: String,
        expected: Dialect,
        found: Dialect,
    },

    #[error("invalid configuration")]
    Config(#[from] ConfigError),
}

/// A configuration that fails validation at build time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("the deduplicate-if-equivalent strategy requires an equivalence depth other than none")]
    DeduplicateWithoutDepth,

    #[error("the {0} strategy cannot be used for paths")]
    RenameForPaths(crate::collision::Strategy),

    #[error("namespace prefix for {source_id} must be a non-empty identifier, got '{prefix}'")]
    InvalidPrefix { source_id: String, prefix: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::Strategy;

    #[test]
    fn messages() {
        let err = MergeError::UnsupportedAction {
            action: "rename",
            category: Category::Path,
        };
        assert_eq!(err.to_string(), "rename not supported for path collisions");

        let err = MergeError::CustomMismatch {
            category: Category::Schema,
            name: "User".to_string(),
            expected: ValueKind::Schema,
            found: ValueKind::PathItem,
        };
        assert_eq!(
            err.to_string(),
            "custom value for schema 'User' must be a schema, found a path item"
        );

        let err = MergeError::from(ConfigError::RenameForPaths(Strategy::RenameLeft));
        assert!(std::error::Error::source(&err).is_some());
    }
}
