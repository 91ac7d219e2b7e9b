// Copyright 2025 Oxide Computer Company

//! Merge configuration.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::Path,
    sync::{Arc, LazyLock},
};

use regex::{Captures, Regex};

use crate::{
    category::{Category, StrategyScope},
    collision::{CollisionHandler, Strategy},
    compare::EquivalenceDepth,
    error::ConfigError,
    operations::{OperationContext, PrimaryOperationPolicy},
};

/// What a name generator knows about the entry it is renaming.
#[derive(Clone, Debug)]
pub struct RenameContext<'a> {
    pub category: Category,
    /// Source identifier of the document the renamed entry came from.
    pub source: &'a str,
    /// Position of that document among the merge inputs.
    pub index: usize,
    pub operations: Option<&'a OperationContext>,
}

/// Produces the new name of a renamed entry. The merge appends a numeric
/// suffix if the generated name is already taken.
pub trait NameGenerator {
    fn generate(&self, name: &str, context: &RenameContext<'_>) -> String;
}

impl<F> NameGenerator for F
where
    F: Fn(&str, &RenameContext<'_>) -> String,
{
    fn generate(&self, name: &str, context: &RenameContext<'_>) -> String {
        self(name, context)
    }
}

/// A name template with `{placeholder}` substitution.
///
/// Recognized placeholders are `{name}`, `{source}` (the file stem of the
/// source identifier, reduced to `[A-Za-z0-9_]`), `{index}`, and, when
/// operation context is enabled, `{operation_id}`, `{path}`, `{method}` and
/// `{tag}` of the primary operation. Placeholders without a value expand to
/// nothing; unrecognized ones are left as written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template(String);

impl Template {
    pub const DEFAULT: &'static str = "{name}_{source}";

    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Template {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

impl NameGenerator for Template {
    fn generate(&self, name: &str, context: &RenameContext<'_>) -> String {
        static PLACEHOLDER: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

        let primary = context.operations.and_then(|ops| ops.primary.as_ref());
        PLACEHOLDER
            .replace_all(&self.0, |caps: &Captures<'_>| match &caps[1] {
                "name" => name.to_string(),
                "source" => source_stem(context.source),
                "index" => context.index.to_string(),
                "operation_id" => primary
                    .and_then(|op| op.operation_id.as_deref())
                    .map(sanitize)
                    .unwrap_or_default(),
                "path" => primary.map(|op| sanitize(&op.path)).unwrap_or_default(),
                "method" => primary.map(|op| op.method.clone()).unwrap_or_default(),
                "tag" => primary
                    .and_then(|op| op.tags.first())
                    .map(|tag| sanitize(tag))
                    .unwrap_or_default(),
                _ => caps[0].to_string(),
            })
            .into_owned()
    }
}

/// The file stem of a source identifier, usable as part of a name.
pub fn source_stem(source: &str) -> String {
    let stem = Path::new(source)
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    sanitize(&stem)
}

fn sanitize(text: &str) -> String {
    static INVALID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]+").unwrap());
    INVALID
        .replace_all(text, "_")
        .trim_matches('_')
        .to_string()
}

/// Validated configuration of a merge. Build one with
/// [`MergeConfig::builder`].
///
/// The default configuration keeps the existing entry on every collision,
/// deduplicates tags by name, merges array fields, renames with the
/// `{name}_{source}` template, has no namespace prefixes, compares schemas
/// deeply, and produces no collision report. Semantic deduplication,
/// operation context and decision handlers are off.
#[derive(Clone)]
pub struct MergeConfig {
    default_strategy: Strategy,
    path_strategy: Option<Strategy>,
    schema_strategy: Option<Strategy>,
    component_strategy: Option<Strategy>,
    deduplicate_tags: bool,
    merge_arrays: bool,
    name_generator: Arc<dyn NameGenerator>,
    prefixes: BTreeMap<String, String>,
    always_apply_prefix: bool,
    equivalence: EquivalenceDepth,
    collision_report: bool,
    semantic_deduplication: bool,
    operation_context: bool,
    primary_operation: PrimaryOperationPolicy,
    handler: Option<Arc<dyn CollisionHandler>>,
    handler_categories: BTreeSet<Category>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            default_strategy: Strategy::AcceptLeft,
            path_strategy: None,
            schema_strategy: None,
            component_strategy: None,
            deduplicate_tags: true,
            merge_arrays: true,
            name_generator: Arc::new(Template::default()),
            prefixes: BTreeMap::new(),
            always_apply_prefix: false,
            equivalence: EquivalenceDepth::Deep,
            collision_report: false,
            semantic_deduplication: false,
            operation_context: false,
            primary_operation: PrimaryOperationPolicy::FirstEncountered,
            handler: None,
            handler_categories: BTreeSet::new(),
        }
    }
}

impl fmt::Debug for MergeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeConfig")
            .field("default_strategy", &self.default_strategy)
            .field("path_strategy", &self.path_strategy)
            .field("schema_strategy", &self.schema_strategy)
            .field("component_strategy", &self.component_strategy)
            .field("deduplicate_tags", &self.deduplicate_tags)
            .field("merge_arrays", &self.merge_arrays)
            .field("prefixes", &self.prefixes)
            .field("always_apply_prefix", &self.always_apply_prefix)
            .field("equivalence", &self.equivalence)
            .field("collision_report", &self.collision_report)
            .field("semantic_deduplication", &self.semantic_deduplication)
            .field("operation_context", &self.operation_context)
            .field("primary_operation", &self.primary_operation)
            .field("handler", &self.handler.is_some())
            .field("handler_categories", &self.handler_categories)
            .finish_non_exhaustive()
    }
}

impl MergeConfig {
    pub fn builder() -> MergeConfigBuilder {
        MergeConfigBuilder::default()
    }

    /// The strategy governing collisions in a category.
    pub fn strategy_for(&self, category: Category) -> Strategy {
        let specific = match category.strategy_scope() {
            StrategyScope::Path => self.path_strategy,
            StrategyScope::Schema => self.schema_strategy,
            StrategyScope::Component => self.component_strategy,
        };
        specific.unwrap_or(self.default_strategy)
    }

    pub fn prefix_for(&self, source: &str) -> Option<&str> {
        self.prefixes.get(source).map(String::as_str)
    }

    pub fn always_apply_prefix(&self) -> bool {
        self.always_apply_prefix
    }

    pub fn deduplicate_tags(&self) -> bool {
        self.deduplicate_tags
    }

    pub fn merge_arrays(&self) -> bool {
        self.merge_arrays
    }

    pub fn equivalence(&self) -> EquivalenceDepth {
        self.equivalence
    }

    pub fn collision_report(&self) -> bool {
        self.collision_report
    }

    pub fn semantic_deduplication(&self) -> bool {
        self.semantic_deduplication
    }

    pub fn operation_context(&self) -> bool {
        self.operation_context
    }

    pub fn primary_operation(&self) -> PrimaryOperationPolicy {
        self.primary_operation
    }

    pub fn name_generator(&self) -> &dyn NameGenerator {
        self.name_generator.as_ref()
    }

    /// The decision handler, if one is registered for this category.
    pub fn handler_for(&self, category: Category) -> Option<&dyn CollisionHandler> {
        let handles = self.handler_categories.is_empty()
            || self.handler_categories.contains(&category);
        self.handler.as_deref().filter(|_| handles)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let strategies = [
            Some(self.default_strategy),
            self.path_strategy,
            self.schema_strategy,
            self.component_strategy,
        ];
        if self.equivalence == EquivalenceDepth::None
            && strategies.contains(&Some(Strategy::DeduplicateIfEquivalent))
        {
            return Err(ConfigError::DeduplicateWithoutDepth);
        }

        if let Some(strategy) = self.path_strategy.filter(|s| s.is_rename()) {
            return Err(ConfigError::RenameForPaths(strategy));
        }

        static IDENTIFIER: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());
        for (source, prefix) in &self.prefixes {
            if !IDENTIFIER.is_match(prefix) {
                return Err(ConfigError::InvalidPrefix {
                    source_id: source.clone(),
                    prefix: prefix.clone(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Default)]
pub struct MergeConfigBuilder {
    config: MergeConfig,
}

impl MergeConfigBuilder {
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config.default_strategy = strategy;
        self
    }

    pub fn path_strategy(mut self, strategy: Strategy) -> Self {
        self.config.path_strategy = Some(strategy);
        self
    }

    pub fn schema_strategy(mut self, strategy: Strategy) -> Self {
        self.config.schema_strategy = Some(strategy);
        self
    }

    pub fn component_strategy(mut self, strategy: Strategy) -> Self {
        self.config.component_strategy = Some(strategy);
        self
    }

    pub fn deduplicate_tags(mut self, enabled: bool) -> Self {
        self.config.deduplicate_tags = enabled;
        self
    }

    pub fn merge_arrays(mut self, enabled: bool) -> Self {
        self.config.merge_arrays = enabled;
        self
    }

    pub fn name_generator(mut self, generator: impl NameGenerator + 'static) -> Self {
        self.config.name_generator = Arc::new(generator);
        self
    }

    pub fn template(self, template: impl Into<String>) -> Self {
        self.name_generator(Template::new(template))
    }

    /// Rename entries of the document with this source identifier by
    /// prepending `prefix`.
    pub fn prefix(mut self, source: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.config.prefixes.insert(source.into(), prefix.into());
        self
    }

    /// Prefix every renamable component of a source with a configured
    /// prefix, not just the colliding ones.
    pub fn always_apply_prefix(mut self, enabled: bool) -> Self {
        self.config.always_apply_prefix = enabled;
        self
    }

    pub fn equivalence(mut self, depth: EquivalenceDepth) -> Self {
        self.config.equivalence = depth;
        self
    }

    pub fn collision_report(mut self, enabled: bool) -> Self {
        self.config.collision_report = enabled;
        self
    }

    pub fn semantic_deduplication(mut self, enabled: bool) -> Self {
        self.config.semantic_deduplication = enabled;
        self
    }

    pub fn operation_context(mut self, enabled: bool) -> Self {
        self.config.operation_context = enabled;
        self
    }

    pub fn primary_operation(mut self, policy: PrimaryOperationPolicy) -> Self {
        self.config.primary_operation = policy;
        self
    }

    /// Consult `handler` for collisions in `categories`, or in every
    /// category if `categories` is empty.
    pub fn handler(
        mut self,
        handler: impl CollisionHandler + 'static,
        categories: impl IntoIterator<Item = Category>,
    ) -> Self {
        self.config.handler = Some(Arc::new(handler));
        self.config.handler_categories = categories.into_iter().collect();
        self
    }

    pub fn build(self) -> Result<MergeConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collision::{CollisionContext, Decision},
        operations::OperationRef,
    };

    fn context<'a>(source: &'a str, operations: Option<&'a OperationContext>) -> RenameContext<'a> {
        RenameContext {
            category: Category::Schema,
            source,
            index: 1,
            operations,
        }
    }

    #[test]
    fn default_template() {
        let name = Template::default().generate("User", &context("specs/billing-v2.yaml", None));
        assert_eq!(name, "User_billing_v2");
    }

    #[test]
    fn operation_placeholders() {
        let operations = OperationContext {
            primary: Some(OperationRef {
                path: "/users/{id}".to_string(),
                method: "get".to_string(),
                operation_id: Some("getUser".to_string()),
                tags: vec!["users".to_string()],
                status_code: Some("200".to_string()),
            }),
            ..Default::default()
        };
        let template = Template::new("{tag}_{operation_id}_{name}{index}_{unknown}");
        let name = template.generate("User", &context("a.json", Some(&operations)));
        assert_eq!(name, "users_getUser_User1_{unknown}");

        // Without operation context the placeholders are empty.
        let name = Template::new("{name}{operation_id}").generate("User", &context("a", None));
        assert_eq!(name, "User");
    }

    #[test]
    fn strategies_by_category() {
        let config = MergeConfig::builder()
            .strategy(Strategy::Fail)
            .schema_strategy(Strategy::RenameRight)
            .build()
            .unwrap();
        assert_eq!(config.strategy_for(Category::Schema), Strategy::RenameRight);
        assert_eq!(config.strategy_for(Category::Path), Strategy::Fail);
        assert_eq!(config.strategy_for(Category::Header), Strategy::Fail);
    }

    #[test]
    fn validation() {
        let err = MergeConfig::builder()
            .schema_strategy(Strategy::DeduplicateIfEquivalent)
            .equivalence(EquivalenceDepth::None)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::DeduplicateWithoutDepth);

        let err = MergeConfig::builder()
            .path_strategy(Strategy::RenameLeft)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::RenameForPaths(Strategy::RenameLeft));

        let err = MergeConfig::builder().prefix("a.yaml", "").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPrefix { .. }));

        assert!(MergeConfig::builder().prefix("a.yaml", "Billing").build().is_ok());
    }

    #[test]
    fn handler_categories() {
        let config = MergeConfig::builder()
            .handler(
                |_: &CollisionContext<'_>| Ok::<_, anyhow::Error>(Decision::defer()),
                [Category::Schema],
            )
            .build()
            .unwrap();
        assert!(config.handler_for(Category::Schema).is_some());
        assert!(config.handler_for(Category::Path).is_none());
        assert!(MergeConfig::default().handler_for(Category::Schema).is_none());
    }
}
