// Copyright 2025 Oxide Computer Company

//! What a collision is, and the ways it can be resolved.

use std::fmt;

use serde::Serialize;

use crate::{
    category::{Category, ComponentValue, CustomValue},
    model::Location,
    operations::OperationContext,
};

/// The configured way of resolving collisions when no decision handler
/// overrides it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Keep the entry already in the merged document.
    #[default]
    AcceptLeft,
    /// Replace it with the incoming entry.
    AcceptRight,
    /// Abort the merge.
    Fail,
    /// Move the existing entry to a new name; the incoming entry takes the
    /// original name.
    RenameLeft,
    /// Give the incoming entry a new name.
    RenameRight,
    /// Keep one entry if both are equivalent, otherwise fail.
    DeduplicateIfEquivalent,
}

impl Strategy {
    pub fn is_rename(self) -> bool {
        matches!(self, Strategy::RenameLeft | Strategy::RenameRight)
    }

    /// The decision this strategy stands for.
    pub fn resolution(self) -> Resolution {
        match self {
            Strategy::AcceptLeft => Resolution::AcceptLeft,
            Strategy::AcceptRight => Resolution::AcceptRight,
            Strategy::Fail => Resolution::Fail,
            Strategy::RenameLeft => Resolution::Rename(RenameSide::Left),
            Strategy::RenameRight => Resolution::Rename(RenameSide::Right),
            Strategy::DeduplicateIfEquivalent => Resolution::Deduplicate,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::AcceptLeft => "accept-left",
            Strategy::AcceptRight => "accept-right",
            Strategy::Fail => "fail",
            Strategy::RenameLeft => "rename-left",
            Strategy::RenameRight => "rename-right",
            Strategy::DeduplicateIfEquivalent => "deduplicate-if-equivalent",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenameSide {
    Left,
    Right,
}

/// What a decision handler asks for.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    /// Defer to the configured strategy.
    Continue,
    AcceptLeft,
    AcceptRight,
    Rename(RenameSide),
    Deduplicate,
    Fail,
    /// Replace the entry with this value, which must be of the kind the
    /// collection holds.
    Custom(CustomValue),
}

impl Resolution {
    pub fn label(&self) -> &'static str {
        match self {
            Resolution::Continue => "continue",
            Resolution::AcceptLeft => "accept-left",
            Resolution::AcceptRight => "accept-right",
            Resolution::Rename(_) => "rename",
            Resolution::Deduplicate => "deduplicate",
            Resolution::Fail => "fail",
            Resolution::Custom(_) => "custom",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub resolution: Resolution,
    pub message: Option<String>,
}

impl Decision {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            message: None,
        }
    }

    pub fn defer() -> Self {
        Self::new(Resolution::Continue)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl From<Resolution> for Decision {
    fn from(resolution: Resolution) -> Self {
        Self::new(resolution)
    }
}

/// Everything known about one collision at the time it is detected.
#[derive(Clone, Debug)]
pub struct CollisionContext<'a> {
    pub category: Category,
    pub name: &'a str,
    /// JSON pointer of the colliding entry, e.g. `#/components/schemas/User`.
    pub path: String,
    pub left_source: &'a str,
    pub right_source: &'a str,
    pub left_location: Option<Location>,
    pub right_location: Option<Location>,
    pub left: ComponentValue<'a>,
    pub right: ComponentValue<'a>,
    /// The strategy that applies if the handler defers.
    pub strategy: Strategy,
    pub left_operations: Option<OperationContext>,
    pub right_operations: Option<OperationContext>,
}

/// A caller-supplied hook consulted for every collision in the categories
/// it is registered for.
///
/// An error is not fatal: it is recorded as a warning and the configured
/// strategy applies.
pub trait CollisionHandler {
    fn decide(&self, collision: &CollisionContext<'_>) -> anyhow::Result<Decision>;
}

impl<F> CollisionHandler for F
where
    F: Fn(&CollisionContext<'_>) -> anyhow::Result<Decision>,
{
    fn decide(&self, collision: &CollisionContext<'_>) -> anyhow::Result<Decision> {
        self(collision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReferenceOr, Schema};

    #[test]
    fn closures_are_handlers() {
        let handler = |collision: &CollisionContext<'_>| {
            if collision.category == Category::Schema {
                Ok(Decision::new(Resolution::Rename(RenameSide::Right)).with_message("schema"))
            } else {
                anyhow::bail!("no opinion on {}", collision.category)
            }
        };

        let left = ReferenceOr::Item(Schema::default());
        let right = ReferenceOr::Item(Schema::default());
        let collision = CollisionContext {
            category: Category::Schema,
            name: "User",
            path: "#/components/schemas/User".to_string(),
            left_source: "a.yaml",
            right_source: "b.yaml",
            left_location: None,
            right_location: None,
            left: ComponentValue::Schema(&left),
            right: ComponentValue::Schema(&right),
            strategy: Strategy::default(),
            left_operations: None,
            right_operations: None,
        };

        let decision = handler.decide(&collision).unwrap();
        assert_eq!(decision.resolution, Resolution::Rename(RenameSide::Right));
        assert_eq!(decision.message.as_deref(), Some("schema"));

        let collision = CollisionContext {
            category: Category::Path,
            ..collision
        };
        assert!(handler.decide(&collision).is_err());
    }

    #[test]
    fn strategies_map_to_resolutions() {
        assert_eq!(Strategy::default(), Strategy::AcceptLeft);
        assert_eq!(
            Strategy::RenameLeft.resolution(),
            Resolution::Rename(RenameSide::Left)
        );
        assert_eq!(Strategy::DeduplicateIfEquivalent.to_string(), "deduplicate-if-equivalent");
    }
}
