/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! An iterator that yields entries from a sorted list of unique document
//! ids given on construction, optionally with per-entry metrics.

use doc_table::DocId;

use crate::{IndexIterator, IndexResult, IteratorError, ReadOutcome, YieldableMetric};

pub struct IdList {
    /// Sorted, duplicate-free list of document IDs to iterate over.
    ids: Vec<DocId>,
    /// Metrics attached to each entry, in lockstep with `ids`. Empty when
    /// the source yields no metrics.
    metrics: Vec<Vec<YieldableMetric>>,
    /// The current position of the iterator (a.k.a the next entry to return
    /// from `read`). When `offset` equals the length of `ids`, the iterator
    /// is at EOF.
    offset: usize,
    /// A reusable result object to avoid allocations on each `read` call.
    result: IndexResult,
}

impl IdList {
    /// Creates a new ID-list iterator. The ids must be sorted and unique.
    pub fn new(ids: Vec<DocId>) -> Self {
        Self::with_metrics(ids, Vec::new())
    }

    /// Same as [`IdList::new`] with per-entry metrics in lockstep with the
    /// id list. `metrics` must be empty or of the same length as `ids`.
    pub fn with_metrics(ids: Vec<DocId>, metrics: Vec<Vec<YieldableMetric>>) -> Self {
        debug_assert!(ids.is_sorted_by(|a, b| a < b), "IDs must be sorted and unique");
        debug_assert!(metrics.is_empty() || metrics.len() == ids.len());

        Self {
            ids,
            metrics,
            offset: 0,
            result: IndexResult::default(),
        }
    }
}

impl IndexIterator for IdList {
    fn read(&mut self) -> Result<Option<ReadOutcome<'_>>, IteratorError> {
        let Some(&doc_id) = self.ids.get(self.offset) else {
            return Ok(None);
        };

        self.result.doc_id = doc_id;
        self.result.freq = 1;
        self.result.metrics = self
            .metrics
            .get(self.offset)
            .cloned()
            .unwrap_or_default();
        self.offset += 1;

        Ok(Some(ReadOutcome::Valid(&mut self.result)))
    }

    fn last_doc_id(&self) -> DocId {
        match self.offset {
            0 => 0,
            _ => self.ids[self.offset - 1],
        }
    }

    fn at_eof(&self) -> bool {
        self.offset >= self.ids.len()
    }

    fn rewind(&mut self) {
        self.offset = 0;
        self.result = IndexResult::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn read_doc_id(it: &mut IdList) -> Option<DocId> {
        match it.read().unwrap() {
            Some(ReadOutcome::Valid(res)) => Some(res.doc_id),
            Some(ReadOutcome::NotFound) => panic!("id list never yields NotFound"),
            None => None,
        }
    }

    #[test]
    fn yields_ids_in_order_then_eof() {
        let mut it = IdList::new(vec![2, 5, 9]);
        assert_eq!(read_doc_id(&mut it), Some(2));
        assert_eq!(read_doc_id(&mut it), Some(5));
        assert_eq!(it.last_doc_id(), 5);
        assert_eq!(read_doc_id(&mut it), Some(9));
        assert!(it.at_eof());
        // EOF is sticky
        assert_eq!(read_doc_id(&mut it), None);
        assert_eq!(read_doc_id(&mut it), None);
    }

    #[test]
    fn rewind_starts_over() {
        let mut it = IdList::new(vec![1, 2]);
        while read_doc_id(&mut it).is_some() {}
        it.rewind();
        assert_eq!(it.last_doc_id(), 0);
        assert_eq!(read_doc_id(&mut it), Some(1));
    }

    #[test]
    fn metrics_travel_with_entries() {
        let mut lookup = field_lookup::FieldLookup::new();
        let key = lookup.get_key_write("__dist");

        let mut it = IdList::with_metrics(
            vec![1, 2],
            vec![
                vec![YieldableMetric {
                    key: key.clone(),
                    value: value::Value::number(0.5),
                }],
                vec![],
            ],
        );

        let Some(ReadOutcome::Valid(res)) = it.read().unwrap() else {
            panic!("expected entry");
        };
        assert_eq!(res.metrics.len(), 1);
        assert_eq!(res.metrics[0].value, value::Value::number(0.5));

        let Some(ReadOutcome::Valid(res)) = it.read().unwrap() else {
            panic!("expected entry");
        };
        assert!(res.metrics.is_empty());
    }
}
