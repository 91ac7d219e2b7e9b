// Copyright 2025 Oxide Computer Company

//! Locations within documents and within schema trees.
//!
//! Two kinds of path are tracked while merging:
//!
//! - [`DocumentPath`] is a JSON pointer (`#/components/schemas/User`) naming
//!   an entry in a document. It is what warnings and collision contexts
//!   report, and what source location indexes are keyed by.
//! - [`DiffPath`] is the dotted/bracketed location of a difference inside a
//!   schema tree (`properties.address.type`, `allOf[1]`). It is maintained as
//!   a stack while the comparator recurses so that descending and unwinding
//!   never rebuild the string from scratch.

use std::{borrow::Cow, fmt};

/// A JSON pointer into a document, guaranteed to start with `#`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentPath {
    path: String,
}

impl DocumentPath {
    /// The document root, `#`.
    pub fn root() -> Self {
        Self {
            path: "#".to_string(),
        }
    }

    /// The pointer for a named entry of a collection, e.g.
    /// `entry("#/components/schemas", "User")`.
    pub fn entry(collection: &str, name: &str) -> Self {
        Self {
            path: format!("{}/{}", collection, escape_json_pointer_segment(name)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Escape a segment for use in a JSON pointer per RFC 6901.
pub(crate) fn escape_json_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Undo [`escape_json_pointer_segment`]. `~1` is replaced first, so `~01`
/// becomes `~1` and not `/`.
pub(crate) fn unescape_json_pointer_segment(segment: &str) -> Cow<'_, str> {
    if segment.contains('~') {
        Cow::Owned(segment.replace("~1", "/").replace("~0", "~"))
    } else {
        Cow::Borrowed(segment)
    }
}

/// The location of a difference within a schema tree.
///
/// Segments are pushed as the comparator descends and popped as it returns;
/// the rendered text is kept in a single buffer that is truncated on pop.
#[derive(Clone, Debug, Default)]
pub struct DiffPath {
    rendered: String,
    marks: Vec<usize>,
}

impl DiffPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descend into a named keyword or property.
    pub fn push_field(&mut self, field: &str) {
        self.marks.push(self.rendered.len());
        if !self.rendered.is_empty() {
            self.rendered.push('.');
        }
        self.rendered.push_str(field);
    }

    /// Descend into an element of the list at the current location.
    pub fn push_index(&mut self, index: usize) {
        use std::fmt::Write;

        self.marks.push(self.rendered.len());
        // Writing to a String cannot fail.
        let _ = write!(self.rendered, "[{index}]");
    }

    /// Return to the location before the most recent push.
    pub fn pop(&mut self) {
        if let Some(mark) = self.marks.pop() {
            self.rendered.truncate(mark);
        }
    }

    /// The path of a leaf keyword beneath the current location, without
    /// pushing it.
    pub fn leaf(&self, field: &str) -> String {
        if self.rendered.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", self.rendered, field)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }
}

impl fmt::Display for DiffPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_path_entry() {
        let path = DocumentPath::entry("#/components/schemas", "User");
        assert_eq!(path.as_str(), "#/components/schemas/User");
        assert_eq!(DocumentPath::root().to_string(), "#");
    }

    #[test]
    fn document_path_entry_escapes() {
        // Paths with special characters get escaped.
        let path = DocumentPath::entry("#/paths", "/users/{id}/posts");
        assert_eq!(path.as_str(), "#/paths/~1users~1{id}~1posts");
    }

    #[test]
    fn tilde_is_escaped_before_slash() {
        assert_eq!(escape_json_pointer_segment("~1"), "~01");
        assert_eq!(escape_json_pointer_segment("x/~y"), "x~1~0y");
    }

    #[test]
    fn unescape_inverts_escape() {
        for segment in ["User", "a/b", "~1", "x/~y", "~~//"] {
            let escaped = escape_json_pointer_segment(segment);
            assert_eq!(unescape_json_pointer_segment(&escaped), segment);
        }
        assert!(matches!(
            unescape_json_pointer_segment("User"),
            Cow::Borrowed("User")
        ));
    }

    #[test]
    fn diff_path_renders_fields_and_indices() {
        let mut path = DiffPath::new();
        assert_eq!(path.as_str(), "");

        path.push_field("properties");
        path.push_field("address");
        assert_eq!(path.leaf("type"), "properties.address.type");

        path.pop();
        path.pop();
        path.push_field("allOf");
        path.push_index(1);
        assert_eq!(path.as_str(), "allOf[1]");

        path.push_field("items");
        assert_eq!(path.as_str(), "allOf[1].items");
    }

    #[test]
    fn diff_path_pop_unwinds_exactly() {
        let mut path = DiffPath::new();
        path.push_field("properties");
        path.push_field("city");
        path.pop();
        path.push_field("zip");
        assert_eq!(path.as_str(), "properties.zip");

        path.pop();
        path.pop();
        assert_eq!(path.as_str(), "");

        // Popping an empty path is a no-op.
        path.pop();
        assert_eq!(path.as_str(), "");
    }

    #[test]
    fn diff_path_leaf_at_root() {
        let path = DiffPath::new();
        assert_eq!(path.leaf("type"), "type");
    }
}
