// Copyright 2025 Oxide Computer Company

//! The parsed document tree.
//!
//! These types are deliberately permissive: every object keeps the keys it
//! does not model in an `extensions` map, so a document survives a merge
//! without losing content the engine does not need to understand.

mod openapi;
mod schema;
mod swagger;

use std::{collections::BTreeMap, fmt};

use anyhow::{Context as _, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use openapi::*;
pub use schema::*;
pub use swagger::*;

/// Either a `$ref` to a reusable component or the component itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReferenceOr<T> {
    Reference {
        #[serde(rename = "$ref")]
        reference: String,
    },
    Item(T),
}

impl<T> ReferenceOr<T> {
    pub fn reference(reference: impl Into<String>) -> Self {
        ReferenceOr::Reference {
            reference: reference.into(),
        }
    }

    pub fn as_item(&self) -> Option<&T> {
        match self {
            ReferenceOr::Reference { .. } => None,
            ReferenceOr::Item(item) => Some(item),
        }
    }

    pub fn as_reference(&self) -> Option<&str> {
        match self {
            ReferenceOr::Reference { reference } => Some(reference),
            ReferenceOr::Item(_) => None,
        }
    }
}

/// The two document families the engine understands. They differ in the
/// shape of the top level and in where reusable components live, and
/// therefore in the prefixes of references.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dialect {
    /// Swagger 2.0: `#/definitions/...`, `#/parameters/...`, ...
    Swagger2,
    /// OpenAPI 3.x: `#/components/<collection>/...`
    OpenApi3,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Swagger2 => write!(f, "Swagger 2.0"),
            Dialect::OpenApi3 => write!(f, "OpenAPI 3.x"),
        }
    }
}

/// Accessors for a named collection that may not exist in every dialect.
/// The optional last field is the collection's Swagger 2.0 location.
macro_rules! collection {
    ($get:ident, $get_mut:ident, $ty:ty, $($openapi:ident).+ $(, $swagger:ident)?) => {
        pub fn $get(&self) -> Option<&IndexMap<String, $ty>> {
            match self {
                Document::OpenApi(api) => Some(&api.$($openapi).+),
                Document::Swagger(_api) => None $(.or(Some(&_api.$swagger)))?,
            }
        }

        pub fn $get_mut(&mut self) -> Option<&mut IndexMap<String, $ty>> {
            match self {
                Document::OpenApi(api) => Some(&mut api.$($openapi).+),
                Document::Swagger(_api) => None $(.or(Some(&mut _api.$swagger)))?,
            }
        }
    };
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Document {
    Swagger(Box<Swagger>),
    OpenApi(Box<OpenApi>),
}

impl Document {
    /// Deserialize a document, choosing the dialect from its version field.
    pub fn from_value(raw: &Value) -> anyhow::Result<Self> {
        if let Some(version) = raw.get("openapi").and_then(Value::as_str) {
            if !version.starts_with("3.") {
                bail!("unsupported OpenAPI version {version}");
            }
            let api = OpenApi::deserialize(raw).context("error deserializing OpenAPI document")?;
            Ok(Document::OpenApi(Box::new(api)))
        } else if let Some(version) = raw.get("swagger").and_then(Value::as_str) {
            if !version.starts_with("2.") {
                bail!("unsupported Swagger version {version}");
            }
            let api = Swagger::deserialize(raw).context("error deserializing Swagger document")?;
            Ok(Document::Swagger(Box::new(api)))
        } else {
            bail!("document has neither an 'openapi' nor a 'swagger' version field")
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Document::Swagger(_) => Dialect::Swagger2,
            Document::OpenApi(_) => Dialect::OpenApi3,
        }
    }

    pub fn info(&self) -> &Info {
        match self {
            Document::Swagger(api) => &api.info,
            Document::OpenApi(api) => &api.info,
        }
    }

    pub fn paths(&self) -> &IndexMap<String, PathItem> {
        match self {
            Document::Swagger(api) => &api.paths,
            Document::OpenApi(api) => &api.paths,
        }
    }

    /// The collection of named schemas: `definitions` or
    /// `components.schemas`.
    pub fn schemas(&self) -> &IndexMap<String, ReferenceOr<Schema>> {
        match self {
            Document::Swagger(api) => &api.definitions,
            Document::OpenApi(api) => &api.components.schemas,
        }
    }

    pub fn schemas_mut(&mut self) -> &mut IndexMap<String, ReferenceOr<Schema>> {
        match self {
            Document::Swagger(api) => &mut api.definitions,
            Document::OpenApi(api) => &mut api.components.schemas,
        }
    }

    pub fn paths_mut(&mut self) -> &mut IndexMap<String, PathItem> {
        match self {
            Document::Swagger(api) => &mut api.paths,
            Document::OpenApi(api) => &mut api.paths,
        }
    }

    collection!(webhooks, webhooks_mut, PathItem, webhooks);
    collection!(responses, responses_mut, ReferenceOr<Response>, components.responses, responses);
    collection!(parameters, parameters_mut, ReferenceOr<Parameter>, components.parameters, parameters);
    collection!(examples, examples_mut, ReferenceOr<Example>, components.examples);
    collection!(request_bodies, request_bodies_mut, ReferenceOr<RequestBody>, components.request_bodies);
    collection!(headers, headers_mut, ReferenceOr<Header>, components.headers);
    collection!(
        security_schemes,
        security_schemes_mut,
        ReferenceOr<SecurityScheme>,
        components.security_schemes,
        security_definitions
    );
    collection!(links, links_mut, ReferenceOr<Link>, components.links);
    collection!(callbacks, callbacks_mut, ReferenceOr<Callback>, components.callbacks);

    pub fn tags(&self) -> &[Tag] {
        match self {
            Document::Swagger(api) => &api.tags,
            Document::OpenApi(api) => &api.tags,
        }
    }

    pub fn to_value(&self) -> anyhow::Result<Value> {
        serde_json::to_value(self).context("error serializing merged document")
    }
}

/// A line/column position in a source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Source positions keyed by JSON pointer (`#/components/schemas/User`),
/// produced by whatever parser read the source text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocationIndex {
    positions: BTreeMap<String, Location>,
}

impl LocationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pointer: impl Into<String>, location: Location) {
        self.positions.insert(pointer.into(), location);
    }

    pub fn get(&self, pointer: &str) -> Option<Location> {
        self.positions.get(pointer).copied()
    }
}

impl FromIterator<(String, Location)> for LocationIndex {
    fn from_iter<I: IntoIterator<Item = (String, Location)>>(iter: I) -> Self {
        Self {
            positions: iter.into_iter().collect(),
        }
    }
}

/// One input to a merge: a parsed document, the dialect the caller declares
/// it to be, and where it came from.
#[derive(Clone, Debug)]
pub struct SourceDocument {
    pub dialect: Dialect,
    pub source: String,
    pub document: Document,
    pub locations: Option<LocationIndex>,
}

impl SourceDocument {
    pub fn new(source: impl Into<String>, document: Document) -> Self {
        Self {
            dialect: document.dialect(),
            source: source.into(),
            document,
            locations: None,
        }
    }

    /// Parse a document from a JSON tree, declaring its dialect up front.
    pub fn from_value(
        source: impl Into<String>,
        dialect: Dialect,
        raw: &Value,
    ) -> anyhow::Result<Self> {
        let source = source.into();
        let document =
            Document::from_value(raw).with_context(|| format!("error reading {source}"))?;
        Ok(Self {
            dialect,
            source,
            document,
            locations: None,
        })
    }

    pub fn with_locations(mut self, locations: LocationIndex) -> Self {
        self.locations = Some(locations);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn reference_or_prefers_reference() {
        let value: ReferenceOr<Schema> =
            serde_json::from_value(json!({ "$ref": "#/components/schemas/User" })).unwrap();
        assert_eq!(value.as_reference(), Some("#/components/schemas/User"));

        let value: ReferenceOr<Schema> =
            serde_json::from_value(json!({ "type": "string" })).unwrap();
        assert!(value.as_item().is_some());
    }

    #[test]
    fn dialect_detection() {
        let v3 = Document::from_value(&json!({
            "openapi": "3.1.0",
            "info": { "title": "a", "version": "1" },
            "paths": {},
        }))
        .unwrap();
        assert_eq!(v3.dialect(), Dialect::OpenApi3);

        let v2 = Document::from_value(&json!({
            "swagger": "2.0",
            "info": { "title": "a", "version": "1" },
            "paths": {},
        }))
        .unwrap();
        assert_eq!(v2.dialect(), Dialect::Swagger2);

        assert!(Document::from_value(&json!({ "info": {} })).is_err());
        assert!(Document::from_value(&json!({ "openapi": "4.0.0" })).is_err());
    }

    #[test]
    fn document_round_trips_unknown_keys() {
        let raw = json!({
            "openapi": "3.0.3",
            "info": { "title": "a", "version": "1", "x-logo": "logo.png" },
            "paths": {},
            "x-internal": true,
        });
        let doc = Document::from_value(&raw).unwrap();
        assert_eq!(doc.to_value().unwrap(), raw);
    }
}
