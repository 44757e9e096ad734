/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! The posting-list iterator contract the pipeline's source pulls from.
//!
//! The inverted index and its combinator iterators live elsewhere; this
//! crate fixes the interface between them and the query pipeline, plus the
//! [`IdList`] iterator used as a simple concrete source.

pub mod id_list;

pub use id_list::IdList;

use doc_table::DocId;
use field_lookup::LookupKey;
use thiserror::Error;
use value::Value;

/// A metric computed during index iteration (e.g. a vector distance) that a
/// downstream processor copies into the result row.
#[derive(Clone, Debug, PartialEq)]
pub struct YieldableMetric {
    pub key: LookupKey,
    pub value: Value,
}

/// One posting entry, reused by the iterator across `read` calls.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexResult {
    pub doc_id: DocId,
    /// Aggregate term frequency of the entry.
    pub freq: u32,
    /// Metrics yielded by the iterators that produced this entry.
    pub metrics: Vec<YieldableMetric>,
}

impl IndexResult {
    pub fn with_doc_id(doc_id: DocId) -> Self {
        Self {
            doc_id,
            ..Self::default()
        }
    }
}

/// An iterator failure indication.
#[derive(Debug, Error)]
pub enum IteratorError {
    /// The iterator has reached the time limit for execution.
    #[error("reached time limit")]
    TimedOut,
    /// The iterator failed to read from the inverted index.
    #[error("failed to read from inverted index")]
    IoError(#[from] std::io::Error),
}

/// The outcome of a successful [`IndexIterator::read`].
#[derive(Debug, PartialEq)]
pub enum ReadOutcome<'iterator> {
    /// The iterator advanced to a valid entry.
    Valid(&'iterator mut IndexResult),
    /// The iterator advanced, but the position holds no valid entry (e.g. an
    /// intersection landed on a non-matching document). The caller should
    /// read again.
    NotFound,
}

pub trait IndexIterator {
    /// Read the next entry.
    ///
    /// Returns `Ok(None)` once the iterator is depleted; every later call
    /// must keep returning `Ok(None)`. `Ok(Some(ReadOutcome::NotFound))`
    /// asks the caller to pull again.
    fn read(&mut self) -> Result<Option<ReadOutcome<'_>>, IteratorError>;

    /// The last doc id that was read, 0 before the first read.
    fn last_doc_id(&self) -> DocId;

    /// `true` once `read` is guaranteed to return `Ok(None)`.
    fn at_eof(&self) -> bool;

    /// Rewind the iterator to the beginning and reset its properties.
    fn rewind(&mut self);
}
