// Copyright 2025 Oxide Computer Company

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::model::Document;

/// Counts of what a merged document contains.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub paths: usize,
    pub operations: usize,
    pub webhooks: usize,
    pub schemas: usize,
    pub responses: usize,
    pub parameters: usize,
    pub examples: usize,
    pub request_bodies: usize,
    pub headers: usize,
    pub security_schemes: usize,
    pub links: usize,
    pub callbacks: usize,
    pub tags: usize,
    pub servers: usize,
}

impl Statistics {
    pub fn collect(document: &Document) -> Self {
        fn count<T>(collection: Option<&IndexMap<String, T>>) -> usize {
            collection.map_or(0, IndexMap::len)
        }

        let operations = document
            .paths()
            .values()
            .chain(document.webhooks().into_iter().flat_map(IndexMap::values))
            .map(|item| item.iter().count())
            .sum();
        let servers = match document {
            Document::OpenApi(api) => api.servers.len(),
            Document::Swagger(_) => 0,
        };

        Self {
            paths: document.paths().len(),
            operations,
            webhooks: count(document.webhooks()),
            schemas: document.schemas().len(),
            responses: count(document.responses()),
            parameters: count(document.parameters()),
            examples: count(document.examples()),
            request_bodies: count(document.request_bodies()),
            headers: count(document.headers()),
            security_schemes: count(document.security_schemes()),
            links: count(document.links()),
            callbacks: count(document.callbacks()),
            tags: document.tags().len(),
            servers,
        }
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            paths,
            operations,
            webhooks,
            schemas,
            responses,
            parameters,
            examples,
            request_bodies,
            headers,
            security_schemes,
            links,
            callbacks,
            tags,
            servers,
        } = self;

        writeln!(f, "paths: {paths} ({operations} operations)")?;
        let rows = [
            ("webhooks", webhooks),
            ("schemas", schemas),
            ("responses", responses),
            ("parameters", parameters),
            ("examples", examples),
            ("request bodies", request_bodies),
            ("headers", headers),
            ("security schemes", security_schemes),
            ("links", links),
            ("callbacks", callbacks),
            ("tags", tags),
            ("servers", servers),
        ];
        for (label, count) in rows.into_iter().filter(|(_, count)| **count > 0) {
            writeln!(f, "{label}: {count}")?;
        }
        Ok(())
    }
}
