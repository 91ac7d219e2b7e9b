// Copyright 2025 Oxide Computer Company

//! Keep references consistent after entries change their names.
//!
//! The rewriter walks the owned document tree once and never follows a
//! reference, so self-referential schemas need no guard.

use indexmap::IndexMap;
use serde_json::Value;

use crate::{
    alias::{AliasTable, AliasTables},
    category::Category,
    model::{
        Callback, Dialect, Document, Header, Link, MediaType, Parameter, PathItem, ReferenceOr,
        RequestBody, Response, Schema, SecurityRequirement,
    },
    path::{escape_json_pointer_segment, unescape_json_pointer_segment},
};

pub struct Rewriter<'a> {
    /// Reference prefix and alias table of every aliased collection.
    collections: Vec<(String, &'a AliasTable)>,
    schemas: Option<(String, &'a AliasTable)>,
    security_schemes: Option<&'a AliasTable>,
}

impl<'a> Rewriter<'a> {
    pub fn new(dialect: Dialect, aliases: &'a AliasTables) -> Self {
        let collections = aliases
            .iter()
            .filter_map(|(category, table)| {
                category
                    .reference_prefix(dialect)
                    .map(|prefix| (prefix, table))
            })
            .collect();
        let schemas = aliases.table(Category::Schema).and_then(|table| {
            Category::Schema
                .reference_prefix(dialect)
                .map(|prefix| (prefix, table))
        });

        Self {
            collections,
            schemas,
            security_schemes: aliases.table(Category::SecurityScheme),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty() && self.security_schemes.is_none()
    }

    pub fn rewrite(&self, document: &mut Document) {
        if self.is_empty() {
            return;
        }

        match document {
            Document::OpenApi(api) => {
                self.paths(&mut api.paths);
                self.paths(&mut api.webhooks);
                self.security(&mut api.security);

                let components = &mut api.components;
                components.schemas.values_mut().for_each(|s| self.schema(s));
                components.responses.values_mut().for_each(|r| self.response(r));
                components.parameters.values_mut().for_each(|p| self.parameter(p));
                components
                    .examples
                    .values_mut()
                    .for_each(|e| self.reference_only(e));
                components
                    .request_bodies
                    .values_mut()
                    .for_each(|b| self.request_body(b));
                components.headers.values_mut().for_each(|h| self.header(h));
                components
                    .security_schemes
                    .values_mut()
                    .for_each(|s| self.reference_only(s));
                components.links.values_mut().for_each(|l| self.reference_only(l));
                components.callbacks.values_mut().for_each(|c| self.callback(c));
            }
            Document::Swagger(api) => {
                self.paths(&mut api.paths);
                self.security(&mut api.security);
                api.definitions.values_mut().for_each(|s| self.schema(s));
                api.parameters.values_mut().for_each(|p| self.parameter(p));
                api.responses.values_mut().for_each(|r| self.response(r));
                api.security_definitions
                    .values_mut()
                    .for_each(|s| self.reference_only(s));
            }
        }
    }

    /// Rewrite a reference that names an aliased entry of any collection.
    fn reference(&self, reference: &mut String) {
        for (prefix, table) in &self.collections {
            let Some(name) = reference.strip_prefix(prefix.as_str()) else {
                continue;
            };
            let renamed = table
                .get(&unescape_json_pointer_segment(name))
                .map(|new| format!("{prefix}{}", escape_json_pointer_segment(new)));
            if let Some(renamed) = renamed {
                *reference = renamed;
            }
            return;
        }
    }

    fn reference_only<T>(&self, value: &mut ReferenceOr<T>) {
        if let ReferenceOr::Reference { reference } = value {
            self.reference(reference);
        }
    }

    fn schema(&self, schema: &mut ReferenceOr<Schema>) {
        let schema = match schema {
            ReferenceOr::Reference { reference } => return self.reference(reference),
            ReferenceOr::Item(schema) => schema,
        };

        if let (Some(discriminator), Some((prefix, table))) =
            (schema.discriminator.as_mut(), self.schemas.as_ref())
        {
            // Mapping values are either full references or bare names.
            for target in discriminator.mapping.values_mut() {
                let replacement = match target.strip_prefix(prefix.as_str()) {
                    Some(name) => table
                        .get(&unescape_json_pointer_segment(name))
                        .map(|new| format!("{prefix}{}", escape_json_pointer_segment(new))),
                    None => table.get(target).map(str::to_string),
                };
                if let Some(replacement) = replacement {
                    *target = replacement;
                }
            }
        }

        for child in schema.children_mut() {
            self.schema(child);
        }
        self.extensions(&mut schema.extensions);
    }

    /// Unmodelled keywords and `x-` extensions may still carry references.
    fn extensions(&self, extensions: &mut IndexMap<String, Value>) {
        extensions.values_mut().for_each(|v| self.value(v));
    }

    fn value(&self, value: &mut Value) {
        match value {
            Value::Object(object) => {
                for (key, child) in object.iter_mut() {
                    match (key.as_str(), child) {
                        ("$ref", Value::String(reference)) => self.reference(reference),
                        (_, child) => self.value(child),
                    }
                }
            }
            Value::Array(items) => items.iter_mut().for_each(|v| self.value(v)),
            _ => {}
        }
    }

    fn content(&self, content: &mut IndexMap<String, MediaType>) {
        for media in content.values_mut() {
            if let Some(schema) = &mut media.schema {
                self.schema(schema);
            }
            media
                .examples
                .values_mut()
                .for_each(|e| self.reference_only(e));
            self.extensions(&mut media.extensions);
        }
    }

    fn parameter(&self, parameter: &mut ReferenceOr<Parameter>) {
        let parameter = match parameter {
            ReferenceOr::Reference { reference } => return self.reference(reference),
            ReferenceOr::Item(parameter) => parameter,
        };
        if let Some(schema) = &mut parameter.schema {
            self.schema(schema);
        }
        self.content(&mut parameter.content);
        parameter
            .examples
            .values_mut()
            .for_each(|e| self.reference_only(e));
        self.extensions(&mut parameter.extensions);
    }

    fn request_body(&self, body: &mut ReferenceOr<RequestBody>) {
        match body {
            ReferenceOr::Reference { reference } => self.reference(reference),
            ReferenceOr::Item(body) => {
                self.content(&mut body.content);
                self.extensions(&mut body.extensions);
            }
        }
    }

    fn response(&self, response: &mut ReferenceOr<Response>) {
        let response = match response {
            ReferenceOr::Reference { reference } => return self.reference(reference),
            ReferenceOr::Item(response) => response,
        };
        response.headers.values_mut().for_each(|h| self.header(h));
        self.content(&mut response.content);
        response
            .links
            .values_mut()
            .for_each(|l| self.reference_only::<Link>(l));
        if let Some(schema) = &mut response.schema {
            self.schema(schema);
        }
        self.extensions(&mut response.extensions);
    }

    fn header(&self, header: &mut ReferenceOr<Header>) {
        let header = match header {
            ReferenceOr::Reference { reference } => return self.reference(reference),
            ReferenceOr::Item(header) => header,
        };
        if let Some(schema) = &mut header.schema {
            self.schema(schema);
        }
        self.content(&mut header.content);
        self.extensions(&mut header.extensions);
    }

    fn callback(&self, callback: &mut ReferenceOr<Callback>) {
        match callback {
            ReferenceOr::Reference { reference } => self.reference(reference),
            ReferenceOr::Item(Callback(paths)) => self.paths(paths),
        }
    }

    fn paths(&self, paths: &mut IndexMap<String, PathItem>) {
        for item in paths.values_mut() {
            self.path_item(item);
        }
    }

    fn path_item(&self, item: &mut PathItem) {
        item.parameters.iter_mut().for_each(|p| self.parameter(p));
        for (_, operation) in item.iter_mut() {
            operation.parameters.iter_mut().for_each(|p| self.parameter(p));
            if let Some(body) = &mut operation.request_body {
                self.request_body(body);
            }
            operation
                .responses
                .values_mut()
                .for_each(|r| self.response(r));
            operation
                .callbacks
                .values_mut()
                .for_each(|c| self.callback(c));
            if let Some(security) = &mut operation.security {
                self.security(security);
            }
            self.extensions(&mut operation.extensions);
        }
        self.extensions(&mut item.extensions);
    }

    /// Security requirements name schemes by bare key.
    fn security(&self, requirements: &mut [SecurityRequirement]) {
        let Some(table) = self.security_schemes else {
            return;
        };
        for requirement in requirements {
            if requirement.keys().any(|key| table.get(key).is_some()) {
                *requirement = std::mem::take(requirement)
                    .into_iter()
                    .map(|(key, scopes)| (table.resolve(&key).to_string(), scopes))
                    .collect();
            }
        }
    }
}

/// Rename an entry of a collection in place, keeping its position.
pub(crate) fn rename_key<T>(map: &mut IndexMap<String, T>, old: &str, new: &str) -> bool {
    let Some(index) = map.get_index_of(old) else {
        return false;
    };
    let Some(value) = map.shift_remove(old) else {
        return false;
    };
    let (last, _) = map.insert_full(new.to_string(), value);
    map.move_index(last, index);
    true
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn document(value: serde_json::Value) -> Document {
        Document::from_value(&value).unwrap()
    }

    #[test]
    fn rewrites_references_mappings_and_security() {
        let mut doc = document(json!({
            "openapi": "3.0.3",
            "info": { "title": "a", "version": "1" },
            "security": [{ "oauth": ["read"] }],
            "paths": {
                "/pets": {
                    "post": {
                        "security": [{ "oauth": [] }, { "key": [] }],
                        "requestBody": { "content": { "application/json": {
                            "schema": { "$ref": "#/components/schemas/Location" },
                        } } },
                        "responses": {
                            "200": { "$ref": "#/components/responses/Ok" },
                        },
                    },
                },
            },
            "components": {
                "schemas": {
                    "Pet": {
                        "oneOf": [
                            { "$ref": "#/components/schemas/Cat" },
                            { "$ref": "#/components/schemas/Dog" },
                        ],
                        "discriminator": {
                            "propertyName": "kind",
                            "mapping": {
                                "cat": "#/components/schemas/Cat",
                                "dog": "Dog",
                            },
                        },
                    },
                    "Node": {
                        "type": "object",
                        "properties": {
                            "next": { "$ref": "#/components/schemas/Node" },
                        },
                    },
                },
                "responses": {
                    "Ok": { "description": "ok" },
                },
            },
        }));

        let mut aliases = AliasTables::new();
        aliases.insert(Category::Schema, "Location", "Address");
        aliases.insert(Category::Schema, "Cat", "Feline");
        aliases.insert(Category::Schema, "Dog", "Canine");
        aliases.insert(Category::SecurityScheme, "oauth", "oauth_b");
        Rewriter::new(Dialect::OpenApi3, &aliases).rewrite(&mut doc);

        let value = doc.to_value().unwrap();
        assert_eq!(
            value.pointer("/paths/~1pets/post/requestBody/content/application~1json/schema/$ref"),
            Some(&json!("#/components/schemas/Address"))
        );
        assert_eq!(
            value.pointer("/paths/~1pets/post/responses/200/$ref"),
            Some(&json!("#/components/responses/Ok"))
        );
        assert_eq!(
            value.pointer("/components/schemas/Pet/oneOf/0/$ref"),
            Some(&json!("#/components/schemas/Feline"))
        );
        assert_eq!(
            value.pointer("/components/schemas/Pet/discriminator/mapping"),
            Some(&json!({ "cat": "#/components/schemas/Feline", "dog": "Canine" }))
        );
        assert_eq!(
            value.pointer("/components/schemas/Node/properties/next/$ref"),
            Some(&json!("#/components/schemas/Node"))
        );
        assert_eq!(value["security"], json!([{ "oauth_b": ["read"] }]));
        assert_eq!(
            value.pointer("/paths/~1pets/post/security"),
            Some(&json!([{ "oauth_b": [] }, { "key": [] }]))
        );
    }

    #[test]
    fn unmodelled_keywords_and_extensions() {
        let mut doc = document(json!({
            "openapi": "3.1.0",
            "info": { "title": "a", "version": "1" },
            "paths": {
                "/users": {
                    "get": {
                        "x-returns": { "$ref": "#/components/schemas/User" },
                        "responses": {},
                    },
                },
            },
            "components": {
                "schemas": {
                    "Index": {
                        "type": "object",
                        "patternProperties": {
                            "^u": { "$ref": "#/components/schemas/User" },
                        },
                        "$defs": {
                            "Entry": { "$ref": "#/components/schemas/User" },
                        },
                        "dependencies": {
                            "owner": { "$ref": "#/components/schemas/User" },
                        },
                        "x-see-also": [{ "$ref": "#/components/schemas/User" }],
                    },
                },
            },
        }));

        let mut aliases = AliasTables::new();
        aliases.insert(Category::Schema, "User", "User_b");
        Rewriter::new(Dialect::OpenApi3, &aliases).rewrite(&mut doc);

        let value = doc.to_value().unwrap();
        let expected = json!("#/components/schemas/User_b");
        let index = &value["components"]["schemas"]["Index"];
        assert_eq!(index["patternProperties"]["^u"]["$ref"], expected);
        assert_eq!(index["$defs"]["Entry"]["$ref"], expected);
        assert_eq!(index["dependencies"]["owner"]["$ref"], expected);
        assert_eq!(index["x-see-also"][0]["$ref"], expected);
        assert_eq!(
            value.pointer("/paths/~1users/get/x-returns/$ref"),
            Some(&expected)
        );
    }

    #[test]
    fn escaped_names() {
        let mut doc = document(json!({
            "openapi": "3.0.3",
            "info": { "title": "a", "version": "1" },
            "paths": {},
            "components": {
                "schemas": {
                    "List": {
                        "type": "array",
                        "items": { "$ref": "#/components/schemas/v1~1User" },
                    },
                },
            },
        }));

        let mut aliases = AliasTables::new();
        aliases.insert(Category::Schema, "v1/User", "v2/User");
        Rewriter::new(Dialect::OpenApi3, &aliases).rewrite(&mut doc);

        let value = doc.to_value().unwrap();
        assert_eq!(
            value.pointer("/components/schemas/List/items/$ref"),
            Some(&json!("#/components/schemas/v2~1User"))
        );
    }

    #[test]
    fn swagger_prefixes() {
        let mut doc = document(json!({
            "swagger": "2.0",
            "info": { "title": "a", "version": "1" },
            "paths": {
                "/users": {
                    "get": {
                        "parameters": [{ "$ref": "#/parameters/Limit" }],
                        "responses": {
                            "200": {
                                "description": "ok",
                                "schema": { "$ref": "#/definitions/Person" },
                            },
                        },
                    },
                },
            },
        }));

        let mut aliases = AliasTables::new();
        aliases.insert(Category::Schema, "Person", "User");
        aliases.insert(Category::Parameter, "Limit", "PageSize");
        Rewriter::new(Dialect::Swagger2, &aliases).rewrite(&mut doc);

        let value = doc.to_value().unwrap();
        let get = &value["paths"]["/users"]["get"];
        assert_eq!(get["parameters"][0]["$ref"], json!("#/parameters/PageSize"));
        assert_eq!(
            get["responses"]["200"]["schema"]["$ref"],
            json!("#/definitions/User")
        );
    }

    #[test]
    fn rename_key_keeps_position() {
        let mut map: IndexMap<String, u32> =
            [("a".to_string(), 1), ("b".to_string(), 2), ("c".to_string(), 3)]
                .into_iter()
                .collect();
        assert!(rename_key(&mut map, "b", "z"));
        assert_eq!(map.keys().collect::<Vec<_>>(), ["a", "z", "c"]);
        assert!(!rename_key(&mut map, "missing", "y"));
    }
}
