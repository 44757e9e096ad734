/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! The document metadata table.
//!
//! Every indexed document has a [`DocumentMetadata`] entry carrying its key,
//! flags, and sorting vector. The query pipeline borrows entries through
//! [`DocTable::borrow`]; the borrow is ref-counted and returned when the
//! [`DmdRef`] is dropped, which protects against a concurrent deletion
//! releasing memory under a live search result.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU16, Ordering};

use enumflags2::{BitFlags, bitflags};
use parking_lot::RwLock;
use sorting_vector::SortingVector;

/// Monotonically assigned numeric document identifier, unique within one
/// engine instance.
pub type DocId = u64;

#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum DocumentFlag {
    /// The document was deleted from the index. Borrowed metadata stays
    /// alive until the last borrow is returned, but readers must treat the
    /// entry as gone.
    Deleted = 0x01,
}

pub type DocumentFlags = BitFlags<DocumentFlag>;

/// Metadata of a single indexed document.
///
/// Flags are atomic: a deletion may land while buffered search results still
/// hold borrows, and those borrows re-check the flag before yielding.
#[derive(Debug)]
pub struct DocumentMetadata {
    doc_id: DocId,
    key: Arc<str>,
    flags: AtomicU8,
    sort_vector: Option<Arc<SortingVector>>,
    ref_count: AtomicU16,
}

impl DocumentMetadata {
    pub const fn doc_id(&self) -> DocId {
        self.doc_id
    }

    /// The key under which the document lives in the host's key-space.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn flags(&self) -> DocumentFlags {
        DocumentFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    pub fn is_deleted(&self) -> bool {
        self.flags().contains(DocumentFlag::Deleted)
    }

    /// The document's pre-sorted vector of sortable field values, if the
    /// schema has sortable fields.
    pub fn sort_vector(&self) -> Option<&Arc<SortingVector>> {
        self.sort_vector.as_ref()
    }

    /// Number of outstanding borrows, the table's own reference included.
    pub fn ref_count(&self) -> u16 {
        self.ref_count.load(Ordering::Relaxed)
    }
}

/// A ref-counted borrow of a [`DocumentMetadata`] entry.
///
/// Dropping the reference is the single release point: a search result that
/// is cleared, destroyed, or filtered out returns its borrow here.
#[derive(Debug)]
pub struct DmdRef(Arc<DocumentMetadata>);

impl Deref for DmdRef {
    type Target = DocumentMetadata;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Clone for DmdRef {
    fn clone(&self) -> Self {
        let old = self.0.ref_count.fetch_add(1, Ordering::Relaxed);
        assert!(old < u16::MAX, "overflow of dmd ref_count");
        Self(Arc::clone(&self.0))
    }
}

impl Drop for DmdRef {
    fn drop(&mut self) {
        self.0.ref_count.fetch_sub(1, Ordering::Relaxed);
    }
}

/// The table of all document metadata, keyed by document id.
#[derive(Debug, Default)]
pub struct DocTable {
    docs: RwLock<HashMap<DocId, Arc<DocumentMetadata>>>,
}

impl DocTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document. The table holds the baseline reference.
    pub fn put(&self, doc_id: DocId, key: impl Into<Arc<str>>, sort_vector: Option<SortingVector>) {
        let dmd = Arc::new(DocumentMetadata {
            doc_id,
            key: key.into(),
            flags: AtomicU8::new(0),
            sort_vector: sort_vector.map(Arc::new),
            ref_count: AtomicU16::new(1),
        });
        self.docs.write().insert(doc_id, dmd);
    }

    /// Borrow the metadata of `doc_id`, incrementing its reference count.
    /// Returns `None` for unknown ids.
    pub fn borrow(&self, doc_id: DocId) -> Option<DmdRef> {
        let docs = self.docs.read();
        let dmd = docs.get(&doc_id)?;
        let old = dmd.ref_count.fetch_add(1, Ordering::Relaxed);
        assert!(old < u16::MAX, "overflow of dmd ref_count");
        Some(DmdRef(Arc::clone(dmd)))
    }

    /// Mark a document deleted. The entry is removed from the table; live
    /// borrows keep the metadata alive and observe the flag.
    pub fn mark_deleted(&self, doc_id: DocId) -> bool {
        let mut docs = self.docs.write();
        let Some(dmd) = docs.remove(&doc_id) else {
            return false;
        };
        dmd.flags
            .fetch_or(DocumentFlag::Deleted as u8, Ordering::Release);
        dmd.ref_count.fetch_sub(1, Ordering::Relaxed);
        true
    }

    /// Set the deleted flag without unlinking the entry. Used when an index
    /// mutation invalidates documents that are still being swept.
    pub fn set_deleted_flag(&self, doc_id: DocId) -> bool {
        let docs = self.docs.read();
        let Some(dmd) = docs.get(&doc_id) else {
            return false;
        };
        dmd.flags
            .fetch_or(DocumentFlag::Deleted as u8, Ordering::Release);
        true
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn borrow_and_return() {
        let table = DocTable::new();
        table.put(1, "doc:1", None);
        assert_eq!(table.len(), 1);
        assert!(!table.is_empty());

        let dmd = table.borrow(1).expect("doc exists");
        assert_eq!(dmd.doc_id(), 1);
        assert_eq!(dmd.key(), "doc:1");
        assert_eq!(dmd.ref_count(), 2);

        drop(dmd);
        let again = table.borrow(1).unwrap();
        assert_eq!(again.ref_count(), 2);
    }

    #[test]
    fn unknown_doc_is_none() {
        let table = DocTable::new();
        assert!(table.borrow(7).is_none());
    }

    #[test]
    fn clone_tracks_refcount() {
        let table = DocTable::new();
        table.put(1, "doc:1", None);

        let a = table.borrow(1).unwrap();
        let b = a.clone();
        assert_eq!(b.ref_count(), 3);
        drop(a);
        assert_eq!(b.ref_count(), 2);
    }

    #[test]
    fn deletion_is_visible_to_live_borrows() {
        let table = DocTable::new();
        table.put(1, "doc:1", None);

        let dmd = table.borrow(1).unwrap();
        assert!(!dmd.is_deleted());

        assert!(table.mark_deleted(1));
        assert!(dmd.is_deleted());
        // entry is unlinked, new borrows fail
        assert!(table.borrow(1).is_none());
        // the live borrow is the only one left
        assert_eq!(dmd.ref_count(), 1);
    }

    #[test]
    fn sort_vector_is_shared_not_copied() {
        let mut sv = SortingVector::new(1);
        sv.try_insert_num(0, 1.5).unwrap();

        let table = DocTable::new();
        table.put(1, "doc:1", Some(sv));

        let a = table.borrow(1).unwrap();
        let b = a.clone();
        let (sa, sb) = (a.sort_vector().unwrap(), b.sort_vector().unwrap());
        assert!(Arc::ptr_eq(sa, sb));
        assert_eq!(sa.get(0).and_then(value::Value::as_num), Some(1.5));
    }
}
