// Copyright 2025 Oxide Computer Company

//! Meld
//!
//! Merge OpenAPI and Swagger documents into one, resolving name collisions,
//! collapsing structurally identical schemas, and keeping every internal
//! reference pointing at the right place.

mod alias;
mod category;
mod collision;
mod compare;
mod config;
mod context;
mod dedup;
mod error;
mod merge;
pub mod model;
mod operations;
mod path;
mod resolve;
mod resolver;
mod rewrite;
mod schema;
mod setops;
mod stats;
mod warning;

pub use alias::{AliasTable, AliasTables};
pub use category::{Category, ComponentValue, CustomValue, StrategyScope, ValueKind};
pub use collision::{
    CollisionContext, CollisionHandler, Decision, RenameSide, Resolution, Strategy,
};
pub use compare::{Comparator, Difference, Equivalence, EquivalenceDepth, compare};
pub use config::{
    MergeConfig, MergeConfigBuilder, NameGenerator, RenameContext, Template, source_stem,
};
pub use context::{NodeId, Scope};
pub use dedup::{Deduplication, deduplicate};
pub use error::{ConfigError, MergeError};
pub use merge::{MergeOutput, merge};
pub use model::{Dialect, Document, Location, LocationIndex, SourceDocument};
pub use operations::{OperationContext, OperationGraph, OperationRef, PrimaryOperationPolicy};
pub use path::{DiffPath, DocumentPath};
pub use rewrite::Rewriter;
pub use stats::Statistics;
pub use warning::{
    CollisionEvent, CollisionReport, Outcome, Severity, Warning, WarningCategory,
};
