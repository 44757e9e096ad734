/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use value::Value;

use crate::locks::HostLock;

/// A document as stored in the host: an ordered list of field/value pairs,
/// the shape a hash reply has.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    fields: Vec<(Arc<str>, Value)>,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name.as_ref() == field)
            .map(|(_, value)| value)
    }

    /// Field/value pairs in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_ref(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<N: Into<Arc<str>>> FromIterator<(N, Value)> for Document {
    fn from_iter<T: IntoIterator<Item = (N, Value)>>(iter: T) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }
}

/// The host's in-memory key-space.
///
/// The [`HostLock`] models the host's global lock protocol: the pipeline's
/// buffer-and-locker bracket takes it before any downstream stage touches
/// live documents, exactly as it would around the real host's command loop.
#[derive(Debug, Default)]
pub struct Keyspace {
    lock: HostLock,
    docs: RwLock<HashMap<Arc<str>, Document>>,
}

impl Keyspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// The global lock bracketing key-space access.
    pub fn lock(&self) -> &HostLock {
        &self.lock
    }

    pub fn insert_document(&self, key: impl Into<Arc<str>>, document: Document) {
        self.docs.write().insert(key.into(), document);
    }

    pub fn remove_document(&self, key: &str) -> bool {
        self.docs.write().remove(key).is_some()
    }

    /// Fetch a document by key. Values are ref-counted, so the clone is
    /// shallow.
    pub fn document(&self, key: &str) -> Option<Document> {
        self.docs.read().get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn document_preserves_field_order() {
        let doc: Document = [
            ("title", Value::string("hello")),
            ("rank", Value::number(3.0)),
        ]
        .into_iter()
        .collect();

        let names: Vec<&str> = doc.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["title", "rank"]);
        assert_eq!(doc.len(), 2);
        assert!(!doc.is_empty());
        assert_eq!(doc.get("rank"), Some(&Value::number(3.0)));
        assert_eq!(doc.get("missing"), None);
    }

    #[test]
    fn keyspace_round_trip() {
        let ks = Keyspace::new();
        let doc: Document = [("body", Value::string("x"))].into_iter().collect();
        ks.insert_document("doc:1", doc.clone());

        assert_eq!(ks.document("doc:1"), Some(doc));
        assert_eq!(ks.document("doc:2"), None);
        assert!(ks.remove_document("doc:1"));
        assert!(!ks.remove_document("doc:1"));
    }
}
