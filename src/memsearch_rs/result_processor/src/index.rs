/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! The base result processor — the topmost processor of every chain.
//!
//! It takes the raw entries from the index iterator and builds the search
//! result to be sent downstream, filtering out deleted documents and (when
//! slot trimming is active) documents outside this shard's slot range.

use index_iterators::{IndexIterator, IteratorError, ReadOutcome};
use query_error::QueryErrorCode;

use crate::timeout::TimeoutChecker;
use crate::{Context, Error, ResultProcessor, ResultProcessorType, SearchResult};

pub struct IndexSource {
    /// The root index iterator. A query with no root filter has 0 results.
    iter: Option<Box<dyn IndexIterator + Send>>,
    timeout: TimeoutChecker,
}

impl IndexSource {
    pub fn new(iter: Option<Box<dyn IndexIterator + Send>>) -> Self {
        Self {
            iter,
            timeout: TimeoutChecker::default(),
        }
    }

    pub fn root_iterator_mut(&mut self) -> Option<&mut dyn IndexIterator> {
        self.iter
            .as_deref_mut()
            .map(|iter| iter as &mut dyn IndexIterator)
    }
}

impl ResultProcessor for IndexSource {
    fn ty(&self) -> ResultProcessorType {
        ResultProcessorType::Index
    }

    fn next(&mut self, mut cx: Context<'_>, res: &mut SearchResult) -> Result<Option<()>, Error> {
        if self.timeout.check(cx.state().deadline) {
            return Err(Error::TimedOut);
        }

        let Some(iter) = self.iter.as_deref_mut() else {
            return Ok(None);
        };

        // Read from the root filter until we have a valid result
        loop {
            let entry = match iter.read() {
                Ok(Some(ReadOutcome::Valid(entry))) => entry,
                Ok(Some(ReadOutcome::NotFound)) => continue,
                Ok(None) => return Ok(None),
                Err(IteratorError::TimedOut) => return Err(Error::TimedOut),
                Err(err) => {
                    cx.state()
                        .err
                        .set_code_and_message(QueryErrorCode::Generic, err.to_string());
                    return Err(Error::Error);
                }
            };

            let state = cx.state();
            let Some(dmd) = state.sctx.spec().doc_table().borrow(entry.doc_id) else {
                continue;
            };
            if dmd.is_deleted() {
                continue;
            }

            if let Some(sharder) = state.sctx.sharder() {
                let slot = sharder.slot_of(dmd.key());
                if !sharder.slot_range().contains(slot) {
                    continue;
                }
            }

            // Increment the total results barring deleted results
            state.total_results += 1;

            res.set_doc_id(entry.doc_id);
            res.set_score(0.0);
            res.row_mut().set_sorting_vector(dmd.sort_vector().cloned());
            res.set_dmd(Some(dmd));
            res.set_index_result(Some(entry.clone()));
            return Ok(Some(()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;
    use index_iterators::IdList;
    use pretty_assertions::assert_eq;
    use search_ctx::{HashSlotSharder, SlotRange};
    use std::sync::Arc;

    #[test]
    fn skips_deleted_documents() {
        let fixture = test_utils::Fixture::with_docs(&[1, 2, 3]);
        fixture.sctx.spec().doc_table().set_deleted_flag(2);

        let mut qitr = fixture.query_iterator();
        qitr.push(IndexSource::new(Some(Box::new(IdList::new(vec![1, 2, 3])))));

        let ids = test_utils::drain_doc_ids(&mut qitr);
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(qitr.total_results(), 2);
    }

    #[test]
    fn missing_metadata_is_skipped() {
        // only doc 1 is registered in the table
        let fixture = test_utils::Fixture::with_docs(&[1]);

        let mut qitr = fixture.query_iterator();
        qitr.push(IndexSource::new(Some(Box::new(IdList::new(vec![1, 5])))));

        let ids = test_utils::drain_doc_ids(&mut qitr);
        assert_eq!(ids, vec![1]);
        assert_eq!(qitr.total_results(), 1);
    }

    #[test]
    fn no_root_filter_means_no_results() {
        let fixture = test_utils::Fixture::with_docs(&[]);
        let mut qitr = fixture.query_iterator();
        qitr.push(IndexSource::new(None));

        let mut res = SearchResult::new();
        assert_eq!(qitr.next(&mut res), Ok(None));
        assert_eq!(qitr.total_results(), 0);
    }

    #[test]
    fn slot_filter_drops_out_of_range_keys() {
        use search_ctx::Sharder;

        let fixture = test_utils::Fixture::with_docs(&[1, 2]);

        let full = HashSlotSharder::new(SlotRange {
            first: 0,
            last: search_ctx::NUM_SLOTS - 1,
        });
        let mut qitr = crate::QueryIterator::new(
            fixture.sctx.clone().with_sharder(Arc::new(full)),
            crate::QueryOptions::default(),
        );
        qitr.push(IndexSource::new(Some(Box::new(IdList::new(vec![1, 2])))));
        assert_eq!(test_utils::drain_doc_ids(&mut qitr), vec![1, 2]);

        // narrow the shard to exactly doc:1's slot
        let slot = full.slot_of("doc:1");
        let narrow = HashSlotSharder::new(SlotRange {
            first: slot,
            last: slot,
        });
        let expected: Vec<u64> = [1u64, 2]
            .into_iter()
            .filter(|id| narrow.slot_of(&format!("doc:{id}")) == slot)
            .collect();

        let mut qitr = crate::QueryIterator::new(
            fixture.sctx.clone().with_sharder(Arc::new(narrow)),
            crate::QueryOptions::default(),
        );
        qitr.push(IndexSource::new(Some(Box::new(IdList::new(vec![1, 2])))));
        assert_eq!(test_utils::drain_doc_ids(&mut qitr), expected);
    }

    #[test]
    fn sticky_eof() {
        let fixture = test_utils::Fixture::with_docs(&[1]);
        let mut qitr = fixture.query_iterator();
        qitr.push(IndexSource::new(Some(Box::new(IdList::new(vec![1])))));

        let mut res = SearchResult::new();
        assert_eq!(qitr.next(&mut res), Ok(Some(())));
        assert_eq!(qitr.next(&mut res), Ok(None));
        assert_eq!(qitr.next(&mut res), Ok(None));
    }
}
