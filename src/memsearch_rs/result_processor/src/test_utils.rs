/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Helpers for pipeline tests: a canned index/host fixture, a source
//! processor yielding pre-scored records, and drain utilities.

use std::collections::VecDeque;
use std::sync::Arc;

use doc_table::DocId;
use index_iterators::IndexResult;
use search_ctx::{Document, IndexSpec, Keyspace, SearchContext};
use sorting_vector::SortingVector;
use value::Value;

use crate::{
    Context, Error, QueryIterator, QueryOptions, ResultProcessor, ResultProcessorType,
    SearchResult,
};

/// An index spec plus key-space with documents keyed `doc:<id>`.
pub struct Fixture {
    pub sctx: SearchContext,
    pub spec: Arc<IndexSpec>,
    pub keyspace: Arc<Keyspace>,
}

impl Fixture {
    pub fn new() -> Self {
        let spec = Arc::new(IndexSpec::new());
        let keyspace = Arc::new(Keyspace::new());
        let sctx = SearchContext::new(Arc::clone(&spec), Arc::clone(&keyspace));
        Self {
            sctx,
            spec,
            keyspace,
        }
    }

    /// A fixture with the given documents registered in the metadata table
    /// (without sorting vectors or stored fields).
    pub fn with_docs(doc_ids: &[DocId]) -> Self {
        let fixture = Self::new();
        for &doc_id in doc_ids {
            fixture.add_doc(doc_id, None);
        }
        fixture
    }

    pub fn add_doc(&self, doc_id: DocId, sort_vector: Option<SortingVector>) {
        self.spec
            .doc_table()
            .put(doc_id, format!("doc:{doc_id}"), sort_vector);
    }

    /// Store document fields in the host key-space.
    pub fn put_fields(&self, doc_id: DocId, fields: &[(&str, Value)]) {
        let document: Document = fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        self.keyspace.insert_document(format!("doc:{doc_id}"), document);
    }

    pub fn query_iterator(&self) -> QueryIterator {
        QueryIterator::new(self.sctx.clone(), QueryOptions::default())
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A stand-in for the index source plus scorer: emits the given
/// `(doc_id, score)` pairs, borrowing metadata and counting totals the way
/// the real source does, then ends with EOF or the configured status.
pub struct ScoredSource {
    items: VecDeque<(DocId, f64)>,
    tail: Option<Error>,
}

/// A source yielding the given records and then EOF.
pub fn scored_source(items: &[(DocId, f64)]) -> ScoredSource {
    ScoredSource {
        items: items.iter().copied().collect(),
        tail: None,
    }
}

/// A source yielding the given records and then the given terminal status,
/// over and over.
pub fn scored_source_with_tail(items: &[(DocId, f64)], tail: Error) -> ScoredSource {
    ScoredSource {
        items: items.iter().copied().collect(),
        tail: Some(tail),
    }
}

impl ResultProcessor for ScoredSource {
    fn ty(&self) -> ResultProcessorType {
        ResultProcessorType::Index
    }

    fn next(&mut self, mut cx: Context<'_>, res: &mut SearchResult) -> Result<Option<()>, Error> {
        let Some((doc_id, score)) = self.items.pop_front() else {
            return match self.tail {
                Some(status) => Err(status),
                None => Ok(None),
            };
        };

        let state = cx.state();
        let dmd = state.sctx.spec().doc_table().borrow(doc_id);
        state.total_results += 1;

        res.set_doc_id(doc_id);
        res.set_score(score);
        if let Some(dmd) = &dmd {
            res.row_mut().set_sorting_vector(dmd.sort_vector().cloned());
        }
        res.set_dmd(dmd);
        res.set_index_result(Some(IndexResult::with_doc_id(doc_id)));
        Ok(Some(()))
    }
}

/// Drain a pipeline, returning the yielded doc ids. Stops at the first
/// non-`OK` status.
pub fn drain_doc_ids(qitr: &mut QueryIterator) -> Vec<DocId> {
    drain_with_status(qitr).0.into_iter().map(|(id, _)| id).collect()
}

/// Drain a pipeline, returning `(doc_id, score)` pairs.
pub fn drain_scored(qitr: &mut QueryIterator) -> Vec<(DocId, f64)> {
    drain_with_status(qitr).0
}

/// Drain a pipeline, returning the yielded records and the terminal
/// status.
pub fn drain_with_status(
    qitr: &mut QueryIterator,
) -> (Vec<(DocId, f64)>, Result<Option<()>, Error>) {
    let mut drained = Vec::new();
    let mut res = SearchResult::new();
    loop {
        match qitr.next(&mut res) {
            Ok(Some(())) => {
                drained.push((res.doc_id(), res.score()));
                res.clear();
            }
            status => return (drained, status),
        }
    }
}
