// Copyright 2025 Oxide Computer Company

use std::borrow::Cow;

use indexmap::IndexMap;

use crate::{
    category::Category,
    model::{Dialect, Document, ReferenceOr, Schema},
    path::unescape_json_pointer_segment,
};

/// Stable identifier of a named schema within one document: its index in the
/// document's schema collection. Two schemas reached through references are
/// the same node exactly when they have the same `NodeId`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

/// The named schemas references are resolved against, along with the prefix
/// those references carry in this document's dialect.
#[derive(Clone, Debug)]
pub struct Scope<'a> {
    schemas: &'a IndexMap<String, ReferenceOr<Schema>>,
    prefix: String,
}

impl<'a> Scope<'a> {
    pub fn new(schemas: &'a IndexMap<String, ReferenceOr<Schema>>, dialect: Dialect) -> Self {
        let prefix = Category::Schema
            .reference_prefix(dialect)
            .unwrap_or_default();
        Self { schemas, prefix }
    }

    pub fn for_document(document: &'a Document) -> Self {
        Self::new(document.schemas(), document.dialect())
    }

    /// The schema name a reference points at, if it points into this scope's
    /// collection. The pointer segment is unescaped.
    pub fn name_of<'r>(&self, reference: &'r str) -> Option<Cow<'r, str>> {
        reference
            .strip_prefix(self.prefix.as_str())
            .map(unescape_json_pointer_segment)
    }

    /// Look up a named schema, returning its identifier.
    pub fn get(&self, name: &str) -> Option<(NodeId, &'a ReferenceOr<Schema>)> {
        self.schemas
            .get_full(name)
            .map(|(index, _, schema)| (NodeId(index), schema))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
