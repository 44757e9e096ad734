/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

use doc_table::{DmdRef, DocId};
use field_lookup::Row;
use index_iterators::IndexResult;

/// Human-readable justification of a score, built by scoring functions when
/// explaining is requested. A node's children explain its factors.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScoreExplain {
    pub description: String,
    pub children: Vec<ScoreExplain>,
}

impl ScoreExplain {
    pub fn leaf(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            children: Vec::new(),
        }
    }
}

/// The object the whole processing chain works on.
///
/// It carries the snapshot of the index scan entry, the borrowed document
/// metadata, and the row of field values loaded by the chain. The record is
/// owned by whichever processor currently operates on it; clearing or
/// dropping it returns the metadata borrow (encoded in [`DmdRef`]'s
/// destructor).
#[derive(Debug, Default)]
pub struct SearchResult {
    doc_id: DocId,
    score: f64,
    score_explain: Option<Box<ScoreExplain>>,
    dmd: Option<DmdRef>,
    /// Snapshot of the source iterator's current posting entry. Cleared by
    /// the sorter before the record becomes heap-resident.
    index_result: Option<IndexResult>,
    /// Row data. Use the lookup keys to access.
    row: Row,
}

impl SearchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the search result so it can be refilled. Keeps the row's
    /// allocated capacity and sorting-vector binding; returns the metadata
    /// borrow.
    pub fn clear(&mut self) {
        self.score = 0.0;
        self.score_explain = None;

        // drop the dmd before the rest, maintaining the clear order the
        // serialization layer relies on
        let _ = self.dmd.take();

        self.index_result = None;
        self.row.wipe();
    }

    pub const fn doc_id(&self) -> DocId {
        self.doc_id
    }

    pub const fn set_doc_id(&mut self, doc_id: DocId) {
        self.doc_id = doc_id;
    }

    pub const fn score(&self) -> f64 {
        self.score
    }

    pub const fn set_score(&mut self, score: f64) {
        self.score = score;
    }

    pub fn score_explain(&self) -> Option<&ScoreExplain> {
        self.score_explain.as_deref()
    }

    pub fn set_score_explain(&mut self, explain: Option<Box<ScoreExplain>>) {
        self.score_explain = explain;
    }

    pub fn dmd(&self) -> Option<&DmdRef> {
        self.dmd.as_ref()
    }

    pub fn set_dmd(&mut self, dmd: Option<DmdRef>) {
        self.dmd = dmd;
    }

    pub fn index_result(&self) -> Option<&IndexResult> {
        self.index_result.as_ref()
    }

    pub fn set_index_result(&mut self, index_result: Option<IndexResult>) {
        self.index_result = index_result;
    }

    pub fn row(&self) -> &Row {
        &self.row
    }

    pub fn row_mut(&mut self) -> &mut Row {
        &mut self.row
    }

    /// Split borrow for loaders: the metadata alongside the mutable row.
    pub fn dmd_and_row_mut(&mut self) -> (Option<&DmdRef>, &mut Row) {
        (self.dmd.as_ref(), &mut self.row)
    }
}
