// Copyright 2025 Oxide Computer Company

//! Merging whole documents: the order collections are visited in, applying
//! the resolver's plans, metadata, and the final deduplication pass.

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::{
    alias::AliasTables,
    category::{Category, Component},
    collision::RenameSide,
    compare::{Comparator, Equivalence, EquivalenceDepth},
    config::MergeConfig,
    context::Scope,
    dedup::deduplicate,
    error::MergeError,
    model::{Dialect, Document, OpenApi, SourceDocument, Swagger, Tag},
    operations::OperationGraph,
    path::DocumentPath,
    resolver::{Action, Journal, Origins, Resolver, Source},
    rewrite::{Rewriter, rename_key},
    stats::Statistics,
    warning::{CollisionReport, Severity, Warning, WarningCategory},
};

/// The result of a successful merge.
#[derive(Clone, Debug)]
pub struct MergeOutput {
    pub document: Document,
    /// Number of name collisions encountered across all collections.
    pub collisions: usize,
    /// Every non-fatal decision, in the order it was made.
    pub warnings: Vec<Warning>,
    /// Present when collision reporting is enabled.
    pub report: Option<CollisionReport>,
    pub statistics: Statistics,
}

/// Merge `documents` left to right into one document.
///
/// All documents must be of the same dialect, and each must be of the
/// dialect it is declared as. The first document is the starting point;
/// each subsequent one is absorbed into the accumulated result, with name
/// collisions resolved as `config` directs.
pub fn merge(
    documents: Vec<SourceDocument>,
    config: &MergeConfig,
) -> Result<MergeOutput, MergeError> {
    let count = documents.len();
    let Some(expected) = documents.first().map(|first| first.dialect) else {
        return Err(MergeError::NotEnoughDocuments(count));
    };
    if count < 2 {
        return Err(MergeError::NotEnoughDocuments(count));
    }

    for SourceDocument {
        dialect,
        source,
        document,
        ..
    } in &documents
    {
        let actual = document.dialect();
        if *dialect != actual {
            return Err(MergeError::DialectMismatch {
                document: source.clone(),
                declared: *dialect,
                actual,
            });
        }
        if *dialect != expected {
            return Err(MergeError::MixedDialects {
                document: source.clone(),
                expected,
                found: *dialect,
            });
        }
    }

    let mut documents = documents.into_iter();
    let Some(first) = documents.next() else {
        return Err(MergeError::NotEnoughDocuments(count));
    };
    let mut merger = Merger::new(config, first);
    for document in documents {
        merger.absorb(document)?;
    }
    Ok(merger.finish())
}

struct Merger<'c> {
    config: &'c MergeConfig,
    dialect: Dialect,
    /// The accumulated document; "left" in every collision.
    document: Document,
    sources: Vec<Source>,
    origins: Origins,
    journal: Journal,
}

/// The document being absorbed; "right" in every collision.
struct Incoming {
    index: usize,
    document: Document,
    left_operations: Option<OperationGraph>,
    right_operations: Option<OperationGraph>,
}

impl<'c> Merger<'c> {
    fn new(config: &'c MergeConfig, first: SourceDocument) -> Self {
        let SourceDocument {
            dialect,
            source,
            mut document,
            locations,
        } = first;
        debug!("starting merge from {source} ({dialect})");

        let mut journal = Journal::new(config.collision_report());
        if config.always_apply_prefix() {
            apply_prefix(config, dialect, &mut document, &source, &mut journal);
        }

        let origins = Category::ALL
            .into_iter()
            .flat_map(|category| {
                names(&document, category)
                    .into_iter()
                    .map(move |name| ((category, name), 0))
            })
            .collect();

        Self {
            config,
            dialect,
            document,
            sources: vec![Source {
                id: source,
                locations,
            }],
            origins,
            journal,
        }
    }

    fn absorb(&mut self, source: SourceDocument) -> Result<(), MergeError> {
        let SourceDocument {
            source,
            mut document,
            locations,
            ..
        } = source;
        let index = self.sources.len();
        debug!("merging {source} (document {})", index + 1);

        if self.config.always_apply_prefix() {
            apply_prefix(
                self.config,
                self.dialect,
                &mut document,
                &source,
                &mut self.journal,
            );
        }

        let (left_operations, right_operations) = if self.config.operation_context() {
            (operation_graph(&self.document), operation_graph(&document))
        } else {
            (None, None)
        };
        self.sources.push(Source {
            id: source,
            locations,
        });

        let mut incoming = Incoming {
            index,
            document,
            left_operations,
            right_operations,
        };

        // A collection is merged before every collection whose entries can
        // reference it, so each rename is rewritten before the referencing
        // entries move into the accumulated document.
        self.merge_collection(
            Category::Schema,
            &mut incoming,
            |d| Some(d.schemas()),
            |d| Some(d.schemas_mut()),
        )?;
        self.merge_collection(
            Category::Example,
            &mut incoming,
            Document::examples,
            Document::examples_mut,
        )?;
        self.merge_collection(
            Category::Header,
            &mut incoming,
            Document::headers,
            Document::headers_mut,
        )?;
        self.merge_collection(
            Category::Link,
            &mut incoming,
            Document::links,
            Document::links_mut,
        )?;
        self.merge_collection(
            Category::SecurityScheme,
            &mut incoming,
            Document::security_schemes,
            Document::security_schemes_mut,
        )?;
        self.merge_collection(
            Category::Parameter,
            &mut incoming,
            Document::parameters,
            Document::parameters_mut,
        )?;
        self.merge_collection(
            Category::RequestBody,
            &mut incoming,
            Document::request_bodies,
            Document::request_bodies_mut,
        )?;
        self.merge_collection(
            Category::Response,
            &mut incoming,
            Document::responses,
            Document::responses_mut,
        )?;
        self.merge_collection(
            Category::Callback,
            &mut incoming,
            Document::callbacks,
            Document::callbacks_mut,
        )?;
        self.merge_collection(
            Category::Path,
            &mut incoming,
            |d| Some(d.paths()),
            |d| Some(d.paths_mut()),
        )?;
        self.merge_collection(
            Category::Webhook,
            &mut incoming,
            Document::webhooks,
            Document::webhooks_mut,
        )?;

        self.merge_metadata(incoming.document, index);
        Ok(())
    }

    /// Resolve the collisions of one collection, then move the incoming
    /// entries into the accumulated document.
    fn merge_collection<T: Component>(
        &mut self,
        category: Category,
        incoming: &mut Incoming,
        get: impl Fn(&Document) -> Option<&IndexMap<String, T>>,
        get_mut: impl Fn(&mut Document) -> Option<&mut IndexMap<String, T>>,
    ) -> Result<(), MergeError> {
        let Some(right) = get(&incoming.document).filter(|right| !right.is_empty()) else {
            return Ok(());
        };
        let Some(left) = get(&self.document) else {
            return Ok(());
        };

        let mut comparator = Comparator::with_scopes(
            self.config.equivalence(),
            Scope::for_document(&self.document),
            Scope::for_document(&incoming.document),
        );
        let mut resolver = Resolver {
            config: self.config,
            dialect: self.dialect,
            sources: &self.sources,
            origins: &self.origins,
            incoming: incoming.index,
            left_operations: incoming.left_operations.as_ref(),
            right_operations: incoming.right_operations.as_ref(),
            journal: &mut self.journal,
        };
        let mut plan = resolver.merge_category(category, left, right, |name, left, right| {
            if category == Category::Schema {
                comparator.compare_named(name, name)
            } else {
                // Only schemas have a structural comparison.
                Equivalence {
                    equivalent: left == right,
                    differences: Vec::new(),
                }
            }
        })?;

        let mut left_aliases = AliasTables::new();
        let mut right_aliases = AliasTables::new();
        for (name, action) in &plan {
            let Action::Rename { side, to } = action else {
                continue;
            };
            match side {
                RenameSide::Left => {
                    if let Some(left) = get_mut(&mut self.document) {
                        rename_key(left, name, to);
                    }
                    if let Some(origin) = self.origins.remove(&(category, name.clone())) {
                        self.origins.insert((category, to.clone()), origin);
                    }
                    left_aliases.insert(category, name.as_str(), to.as_str());
                }
                RenameSide::Right => {
                    if let Some(right) = get_mut(&mut incoming.document) {
                        rename_key(right, name, to);
                    }
                    right_aliases.insert(category, name.as_str(), to.as_str());
                }
            }
        }
        Rewriter::new(self.dialect, &left_aliases).rewrite(&mut self.document);
        Rewriter::new(self.dialect, &right_aliases).rewrite(&mut incoming.document);

        let entries = get_mut(&mut incoming.document)
            .map(std::mem::take)
            .unwrap_or_default();
        let Some(left) = get_mut(&mut self.document) else {
            return Ok(());
        };
        for (name, value) in entries {
            let value = match plan.remove(&name) {
                Some(Action::KeepLeft) => continue,
                Some(Action::Replace(custom)) => {
                    left.insert(name, custom);
                    continue;
                }
                Some(Action::TakeRight | Action::Rename { .. }) | None => value,
            };
            self.origins.insert((category, name.clone()), incoming.index);
            left.insert(name, value);
        }

        Ok(())
    }

    /// Fold the incoming document's top-level fields into the accumulated
    /// document. The first document's singular fields win.
    fn merge_metadata(&mut self, incoming: Document, index: usize) {
        let config = self.config;
        let first = self
            .sources
            .first()
            .map(|source| source.id.clone())
            .unwrap_or_default();
        let mut overrides = Vec::new();

        let (left_info, right_info) = (self.document.info(), incoming.info());
        if left_info != right_info {
            overrides.push((
                "#/info",
                format!(
                    "kept info '{}' version {} from {first}, ignored '{}' version {}",
                    left_info.title, left_info.version, right_info.title, right_info.version
                ),
            ));
        }

        match (&mut self.document, incoming) {
            (Document::OpenApi(left), Document::OpenApi(right)) => {
                let OpenApi {
                    servers,
                    security,
                    tags,
                    external_docs,
                    extensions,
                    ..
                } = *right;
                if config.merge_arrays() {
                    append_unique(&mut left.servers, servers);
                    append_unique(&mut left.security, security);
                    merge_tags(&mut left.tags, tags, config.deduplicate_tags());
                }
                left.external_docs = left.external_docs.take().or(external_docs);
                merge_extensions(&mut left.extensions, extensions);
            }
            (Document::Swagger(left), Document::Swagger(right)) => {
                let Swagger {
                    host,
                    base_path,
                    schemes,
                    consumes,
                    produces,
                    security,
                    tags,
                    external_docs,
                    extensions,
                    ..
                } = *right;
                if config.merge_arrays() {
                    append_unique(&mut left.schemes, schemes);
                    append_unique(&mut left.consumes, consumes);
                    append_unique(&mut left.produces, produces);
                    append_unique(&mut left.security, security);
                    merge_tags(&mut left.tags, tags, config.deduplicate_tags());
                }
                if let Some(message) = first_wins("host", &mut left.host, host) {
                    overrides.push(("#/host", message));
                }
                if let Some(message) = first_wins("basePath", &mut left.base_path, base_path) {
                    overrides.push(("#/basePath", message));
                }
                left.external_docs = left.external_docs.take().or(external_docs);
                merge_extensions(&mut left.extensions, extensions);
            }
            // Mixed dialects are rejected before merging starts.
            _ => {}
        }

        let Some(source) = self.sources.get(index) else {
            return;
        };
        for (path, message) in overrides {
            warn!("{}: {message}", source.id);
            let location = source.location(path);
            self.journal.warn(
                Warning::new(
                    WarningCategory::MetadataOverride,
                    Severity::Info,
                    path,
                    message,
                    &source.id,
                )
                .with_location(location),
            );
        }
    }

    fn finish(self) -> MergeOutput {
        let Merger {
            config,
            dialect,
            mut document,
            sources,
            origins,
            mut journal,
        } = self;

        let mut deduplicated = 0;
        if config.semantic_deduplication() {
            let result = {
                let scope = Scope::for_document(&document);
                // Collapsing schemas always takes a deep comparison, whatever
                // depth the collision strategies use.
                let mut comparator =
                    Comparator::with_scopes(EquivalenceDepth::Deep, scope.clone(), scope);
                deduplicate(document.schemas(), |left, right| {
                    comparator.compare_named(left, right)
                })
            };

            if result.removed > 0 {
                let collection = Category::Schema
                    .collection_pointer(dialect)
                    .unwrap_or_default();
                let mut aliases = AliasTables::new();
                for (old, canonical) in result.aliases.iter() {
                    let source = origins
                        .get(&(Category::Schema, old.to_string()))
                        .and_then(|&index| sources.get(index));
                    let path = DocumentPath::entry(collection, old).to_string();
                    let location = source.and_then(|source| source.location(&path));
                    journal.warn(
                        Warning::new(
                            WarningCategory::Deduplicated,
                            Severity::Info,
                            path,
                            format!("equivalent to '{canonical}', references rewritten"),
                            source.map(|source| source.id.as_str()).unwrap_or_default(),
                        )
                        .with_location(location)
                        .with_context("canonical", canonical),
                    );
                    aliases.insert(Category::Schema, old, canonical);
                }

                *document.schemas_mut() = result.canonical;
                Rewriter::new(dialect, &aliases).rewrite(&mut document);
                deduplicated = result.removed;
            }
        }

        let statistics = Statistics::collect(&document);
        info!(
            "merged {} documents: {} collisions, {} schemas deduplicated, {} warnings",
            sources.len(),
            journal.collisions,
            deduplicated,
            journal.warnings.len()
        );

        MergeOutput {
            document,
            collisions: journal.collisions,
            warnings: journal.warnings,
            report: journal.report,
            statistics,
        }
    }
}

fn operation_graph(document: &Document) -> Option<OperationGraph> {
    OperationGraph::build(document)
        .inspect_err(|error| warn!("operation context unavailable: {error:#}"))
        .ok()
}

/// Rename every renamable entry of a document to carry its source's
/// namespace prefix.
fn apply_prefix(
    config: &MergeConfig,
    dialect: Dialect,
    document: &mut Document,
    source: &str,
    journal: &mut Journal,
) {
    let Some(prefix) = config.prefix_for(source) else {
        return;
    };

    let mut aliases = AliasTables::new();
    for category in Category::RENAMABLE {
        let Some(collection) = category.collection_pointer(dialect) else {
            continue;
        };
        let existing = names(document, category);
        for name in &existing {
            let prefixed = format!("{prefix}{name}");
            // Prefixing onto a name the document already uses would chain
            // two renames together.
            if existing.contains(&prefixed)
                || !rename_entry(document, category, name, &prefixed)
            {
                debug!("not prefixing {category} '{name}' of {source}: '{prefixed}' exists");
                continue;
            }
            journal.warn(
                Warning::new(
                    WarningCategory::Renamed,
                    Severity::Info,
                    DocumentPath::entry(collection, name).to_string(),
                    format!("prefixed to '{prefixed}'"),
                    source,
                )
                .with_context("prefix", prefix),
            );
            aliases.insert(category, name.as_str(), prefixed);
        }
    }

    Rewriter::new(dialect, &aliases).rewrite(document);
}

/// Entry names of a collection, in document order.
fn names(document: &Document, category: Category) -> Vec<String> {
    fn keys<T>(collection: Option<&IndexMap<String, T>>) -> Vec<String> {
        collection
            .map(|collection| collection.keys().cloned().collect())
            .unwrap_or_default()
    }

    match category {
        Category::Schema => keys(Some(document.schemas())),
        Category::Path => keys(Some(document.paths())),
        Category::Webhook => keys(document.webhooks()),
        Category::Response => keys(document.responses()),
        Category::Parameter => keys(document.parameters()),
        Category::Example => keys(document.examples()),
        Category::RequestBody => keys(document.request_bodies()),
        Category::Header => keys(document.headers()),
        Category::SecurityScheme => keys(document.security_schemes()),
        Category::Link => keys(document.links()),
        Category::Callback => keys(document.callbacks()),
    }
}

/// Rename an entry in place. Fails if the new name is taken.
fn rename_entry(document: &mut Document, category: Category, old: &str, new: &str) -> bool {
    fn rename<T>(collection: Option<&mut IndexMap<String, T>>, old: &str, new: &str) -> bool {
        collection.is_some_and(|collection| {
            !collection.contains_key(new) && rename_key(collection, old, new)
        })
    }

    match category {
        Category::Schema => rename(Some(document.schemas_mut()), old, new),
        Category::Path => rename(Some(document.paths_mut()), old, new),
        Category::Webhook => rename(document.webhooks_mut(), old, new),
        Category::Response => rename(document.responses_mut(), old, new),
        Category::Parameter => rename(document.parameters_mut(), old, new),
        Category::Example => rename(document.examples_mut(), old, new),
        Category::RequestBody => rename(document.request_bodies_mut(), old, new),
        Category::Header => rename(document.headers_mut(), old, new),
        Category::SecurityScheme => rename(document.security_schemes_mut(), old, new),
        Category::Link => rename(document.links_mut(), old, new),
        Category::Callback => rename(document.callbacks_mut(), old, new),
    }
}

fn append_unique<T: PartialEq>(left: &mut Vec<T>, right: Vec<T>) {
    for item in right {
        if !left.contains(&item) {
            left.push(item);
        }
    }
}

fn merge_tags(left: &mut Vec<Tag>, right: Vec<Tag>, by_name: bool) {
    for tag in right {
        if by_name && left.iter().any(|existing| existing.name == tag.name) {
            continue;
        }
        left.push(tag);
    }
}

fn merge_extensions(
    left: &mut IndexMap<String, serde_json::Value>,
    right: IndexMap<String, serde_json::Value>,
) {
    for (key, value) in right {
        left.entry(key).or_insert(value);
    }
}

/// Keep the first value of a singular field, describing any different
/// value that was dropped.
fn first_wins(field: &str, left: &mut Option<String>, right: Option<String>) -> Option<String> {
    let right = right?;
    match left {
        None => {
            *left = Some(right);
            None
        }
        Some(existing) if *existing != right => {
            Some(format!("kept {field} '{existing}', ignored '{right}'"))
        }
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_wins() {
        let mut host = None;
        assert_eq!(first_wins("host", &mut host, Some("a.example.com".into())), None);
        assert_eq!(host.as_deref(), Some("a.example.com"));

        let message = first_wins("host", &mut host, Some("b.example.com".into()));
        assert_eq!(
            message.as_deref(),
            Some("kept host 'a.example.com', ignored 'b.example.com'")
        );
        assert_eq!(first_wins("host", &mut host, Some("a.example.com".into())), None);
        assert_eq!(first_wins("host", &mut host, None), None);
    }

    #[test]
    fn tags_merge_by_name() {
        let tag = |name: &str, description: &str| Tag {
            name: name.to_string(),
            description: Some(description.to_string()),
            extensions: IndexMap::new(),
        };

        let mut tags = vec![tag("users", "first")];
        merge_tags(&mut tags, vec![tag("users", "second"), tag("orders", "o")], true);
        assert_eq!(tags, [tag("users", "first"), tag("orders", "o")]);

        let mut tags = vec![tag("users", "first")];
        merge_tags(&mut tags, vec![tag("users", "second")], false);
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn arrays_skip_exact_duplicates() {
        let mut schemes = vec!["https".to_string()];
        append_unique(&mut schemes, vec!["http".to_string(), "https".to_string()]);
        assert_eq!(schemes, ["https", "http"]);
    }
}
