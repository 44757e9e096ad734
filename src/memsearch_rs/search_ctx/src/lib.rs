/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! The execution context a query pipeline runs against: the index spec (with
//! its version counter and read/write lock), the host's in-memory key-space
//! behind its global lock, and the optional sharding hook.

mod keyspace;
mod locks;
mod sharding;

pub use keyspace::{Document, Keyspace};
pub use locks::{HostLock, SpecLock};
pub use sharding::{HashSlotSharder, NUM_SLOTS, Sharder, SlotRange};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use doc_table::{DocId, DocTable};

/// The index specification a pipeline executes against.
///
/// Carries the document metadata table, a version counter bumped on every
/// index mutation, and the spec lock the pipeline holds in read mode for the
/// duration of a pull.
#[derive(Debug, Default)]
pub struct IndexSpec {
    doc_table: DocTable,
    version: AtomicU64,
    lock: SpecLock,
}

impl IndexSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn doc_table(&self) -> &DocTable {
        &self.doc_table
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Record an index mutation. Buffered pipeline stages compare versions
    /// across a lock gap to decide whether re-validation is needed.
    pub fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    /// Delete a document from the index: flags its metadata and bumps the
    /// spec version. Live borrows observe the flag.
    pub fn delete_document(&self, doc_id: DocId) -> bool {
        let deleted = self.doc_table.set_deleted_flag(doc_id);
        if deleted {
            self.bump_version();
            tracing::debug!(doc_id, version = self.version(), "document deleted");
        }
        deleted
    }

    pub fn lock(&self) -> &SpecLock {
        &self.lock
    }
}

/// Cheaply cloneable handle bundling everything a pipeline needs from its
/// surroundings.
#[derive(Clone, Debug)]
pub struct SearchContext {
    spec: Arc<IndexSpec>,
    keyspace: Arc<Keyspace>,
    sharder: Option<Arc<dyn Sharder>>,
}

impl SearchContext {
    pub fn new(spec: Arc<IndexSpec>, keyspace: Arc<Keyspace>) -> Self {
        Self {
            spec,
            keyspace,
            sharder: None,
        }
    }

    /// Install a sharding hook; the source RP then drops documents whose
    /// key hashes outside this shard's slot range.
    pub fn with_sharder(mut self, sharder: Arc<dyn Sharder>) -> Self {
        self.sharder = Some(sharder);
        self
    }

    pub fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    pub fn sharder(&self) -> Option<&dyn Sharder> {
        self.sharder.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn version_bumps_on_delete() {
        let spec = IndexSpec::new();
        spec.doc_table().put(1, "doc:1", None);

        let v0 = spec.version();
        assert!(spec.delete_document(1));
        assert!(spec.version() > v0);

        // deleting an unknown document is not a mutation
        let v1 = spec.version();
        assert!(!spec.delete_document(42));
        assert_eq!(spec.version(), v1);
    }

    #[test]
    fn context_clones_share_spec() {
        let spec = Arc::new(IndexSpec::new());
        let keyspace = Arc::new(Keyspace::new());
        let sctx = SearchContext::new(Arc::clone(&spec), keyspace);
        let clone = sctx.clone();

        spec.bump_version();
        assert_eq!(clone.spec().version(), sctx.spec().version());
    }
}
