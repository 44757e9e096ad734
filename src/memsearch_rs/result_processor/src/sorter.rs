/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! The sorting processor.
//!
//! The sorter is a reducer: it keeps accumulating upstream results into a
//! min-max heap of the top N until upstream reports EOF (or a timeout the
//! policy converts to "return what you have"), then starts yielding by
//! popping from the top of the heap. The min-max heap lets it both discard
//! the current worst on overflow and drain best-first.
//!
//! Records admitted to the heap drop their index-entry snapshot; from the
//! sorter downstream nothing references the index scan.

use std::cmp::Ordering;

use field_lookup::{LoadDocumentOptions, LoadMode, LookupKey, load_document};
use search_config::{SearchConfig, TimeoutPolicy};

use crate::util::{Comparator, MinMaxHeap};
use crate::{Context, Error, QueryState, ResultProcessor, ResultProcessorType, SearchResult};

/// Most sort keys a field sort considers; the ascending bitmap has room for
/// far more, this bounds the per-comparison work.
pub const MAX_SORT_FIELDS: usize = 16;

/// One bit per sort key: set means ascending order for that key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AscendingMap(u64);

impl AscendingMap {
    pub const fn all_descending() -> Self {
        Self(0)
    }

    pub const fn ascending(self, index: usize) -> bool {
        self.0 & (1 << index) != 0
    }

    pub const fn with_ascending(self, index: usize) -> Self {
        Self(self.0 | (1 << index))
    }
}

impl From<u64> for AscendingMap {
    fn from(bits: u64) -> Self {
        Self(bits)
    }
}

/// The heap ordering: by score, or by sort keys with per-key direction.
/// "Greater" means closer to the top of the final output.
#[derive(Debug)]
pub(crate) struct SortCriteria {
    fields: Option<(Vec<LookupKey>, AscendingMap)>,
}

impl SortCriteria {
    fn by_score() -> Self {
        Self { fields: None }
    }

    fn by_fields(keys: Vec<LookupKey>, ascending: AscendingMap) -> Self {
        Self {
            fields: Some((keys, ascending)),
        }
    }
}

impl Comparator<SearchResult> for SortCriteria {
    fn compare(&self, a: &SearchResult, b: &SearchResult) -> Ordering {
        match &self.fields {
            None => cmp_by_score(a, b),
            Some((keys, ascending)) => cmp_by_fields(keys, *ascending, a, b),
        }
    }
}

/// Greater score wins; ties go to the lower doc id so newer results are
/// yielded later.
fn cmp_by_score(a: &SearchResult, b: &SearchResult) -> Ordering {
    match a.score().partial_cmp(&b.score()) {
        Some(Ordering::Less) => Ordering::Less,
        Some(Ordering::Greater) => Ordering::Greater,
        _ => {
            if a.doc_id() > b.doc_id() {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
    }
}

fn cmp_by_fields(
    keys: &[LookupKey],
    ascending: AscendingMap,
    a: &SearchResult,
    b: &SearchResult,
) -> Ordering {
    let mut asc = false;
    for (i, key) in keys.iter().take(MAX_SORT_FIELDS).enumerate() {
        let v1 = a.row().get(key);
        let v2 = b.row().get(key);
        asc = ascending.ascending(i);

        let rc = match (v1, v2) {
            // a missing side loses outright, direction notwithstanding
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (None, None) => return flip(doc_id_order(a, b), asc),
            (Some(v1), Some(v2)) => v1.cmp_values(v2),
        };

        if rc != Ordering::Equal {
            return flip(rc, asc);
        }
    }

    // full tie: fall back to doc id, inverted like the last examined key
    flip(doc_id_order(a, b), asc)
}

fn doc_id_order(a: &SearchResult, b: &SearchResult) -> Ordering {
    if a.doc_id() < b.doc_id() {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

fn flip(ord: Ordering, ascending: bool) -> Ordering {
    if ascending { ord.reverse() } else { ord }
}

/// Sort keys plus the lazily computed subset that must be loaded from the
/// host because the rows do not already carry them.
#[derive(Debug)]
struct FieldSortState {
    keys: Vec<LookupKey>,
    load_keys: Option<Vec<LookupKey>>,
}

enum Step {
    /// A record was consumed into the heap (or discarded); pull again.
    Queued,
    /// Upstream is exhausted; switch to yielding.
    Drained,
}

pub struct Sorter {
    /// Bound on the heap - top N results. 0 lets the heap grow dynamically.
    size: usize,
    /// How many results to yield at most. 0 means no cap.
    yield_cap: usize,
    /// Used when popping results after we are done accumulating.
    yielded: usize,
    heap: MinMaxHeap<SearchResult, SortCriteria>,
    /// Pooled result - recycled between accumulate steps to avoid
    /// allocations. Disabled by the `no_mem_pool` configuration.
    pooled: Option<SearchResult>,
    no_mem_pool: bool,
    fields: Option<FieldSortState>,
    draining: bool,
}

impl Sorter {
    /// Top-K by score. `max_results` is capped by the configuration; a
    /// request above the unsorted-mode threshold grows dynamically instead
    /// of evicting.
    pub fn by_score(max_results: usize, config: &SearchConfig) -> Self {
        Self::new(max_results, SortCriteria::by_score(), None, config)
    }

    /// Top-K by sort keys with per-key direction.
    pub fn by_fields(
        max_results: usize,
        keys: Vec<LookupKey>,
        ascending: AscendingMap,
        config: &SearchConfig,
    ) -> Self {
        let criteria = SortCriteria::by_fields(keys.clone(), ascending);
        let fields = FieldSortState {
            keys,
            load_keys: None,
        };
        Self::new(max_results, criteria, Some(fields), config)
    }

    fn new(
        max_results: usize,
        criteria: SortCriteria,
        fields: Option<FieldSortState>,
        config: &SearchConfig,
    ) -> Self {
        let capped = max_results.min(config.max_search_results);
        let size = if capped == 0 || capped > config.max_results_to_unsorted_mode {
            0
        } else {
            capped
        };

        Self {
            size,
            yield_cap: capped,
            yielded: 0,
            heap: MinMaxHeap::with_capacity(size + 1, criteria),
            pooled: None,
            no_mem_pool: config.no_mem_pool,
            fields,
            draining: false,
        }
    }

    fn stash_pooled(&mut self, res: SearchResult) {
        if !self.no_mem_pool {
            self.pooled = Some(res);
        }
    }

    /// One accumulate step: pull a record from upstream and fold it into
    /// the heap.
    fn accumulate(&mut self, cx: &mut Context<'_>) -> Result<Step, Error> {
        let mut h = match self.pooled.take() {
            Some(mut pooled) => {
                pooled.row_mut().wipe();
                pooled
            }
            None => SearchResult::new(),
        };

        match cx.upstream_next(&mut h) {
            Ok(Some(())) => {}
            // upstream has finished - switch to the yield state. A timeout
            // under the Return policy keeps everything accumulated so far.
            Ok(None) => {
                self.stash_pooled(h);
                return Ok(Step::Drained);
            }
            Err(Error::TimedOut) if cx.state().timeout_policy == TimeoutPolicy::Return => {
                self.stash_pooled(h);
                return Ok(Step::Drained);
            }
            Err(err) => {
                self.stash_pooled(h);
                return Err(err);
            }
        }

        // If the sort keys are not in the row yet, load them from the host.
        if self.load_missing_sort_fields(cx, &mut h).is_err() {
            // failure to fetch the doc: release the dmd, reduce the result
            // count and move on
            h.clear();
            cx.state().total_results -= 1;
            self.stash_pooled(h);
            return Ok(Step::Queued);
        }

        let state = cx.state();
        let full = self.size != 0 && self.heap.len() >= self.size;
        if !full {
            // the heap-resident record must not alias the index scan
            h.set_index_result(None);
            if h.score() < state.min_score {
                state.min_score = h.score();
            }
            self.heap.push(h);
        } else {
            // update the min score from the heap floor; irrelevant to
            // sort-by mode but hardly costs anything
            if let Some(floor_score) = self.heap.peek_min().map(SearchResult::score) {
                if floor_score > state.min_score {
                    state.min_score = floor_score;
                }
            }

            let replaces = self
                .heap
                .peek_min()
                .is_some_and(|floor| self.heap.comparator().compare(&h, floor) == Ordering::Greater);
            if replaces {
                h.set_index_result(None);
                let evicted = self.heap.replace_min(h);
                if let Some(mut evicted) = evicted {
                    evicted.clear();
                    self.stash_pooled(evicted);
                }
            } else {
                // the record does not make the cut; recycle it
                h.clear();
                self.stash_pooled(h);
            }
        }

        Ok(Step::Queued)
    }

    /// Compute (once) and load the sort keys missing from the row. An error
    /// means the document could not be fetched.
    fn load_missing_sort_fields(
        &mut self,
        cx: &mut Context<'_>,
        h: &mut SearchResult,
    ) -> Result<(), field_lookup::LoadDocumentError> {
        let Some(fields) = self.fields.as_mut() else {
            return Ok(());
        };
        if h.dmd().is_none() {
            return Ok(());
        }

        if fields.load_keys.is_none() {
            let row = h.row();
            let load_keys = if row.is_blank() {
                // nothing is present at all: every key needs loading
                fields.keys.clone()
            } else {
                fields
                    .keys
                    .iter()
                    .filter(|key| row.get(key).is_none())
                    .cloned()
                    .collect()
            };
            fields.load_keys = Some(load_keys);
        }

        let Some(load_keys) = fields.load_keys.as_deref() else {
            return Ok(());
        };
        if load_keys.is_empty() {
            return Ok(());
        }

        let QueryState { lookup, sctx, .. } = cx.state();
        let (dmd, row) = h.dmd_and_row_mut();
        let Some(dmd) = dmd else {
            return Ok(());
        };
        let options = LoadDocumentOptions {
            keyspace: sctx.keyspace(),
            dmd,
            keys: load_keys,
            mode: LoadMode::KeyList,
        };
        load_document(lookup, row, &options)
    }

    /// Yield - pop the current top result from the heap.
    fn yield_next(&mut self, res: &mut SearchResult) -> Result<Option<()>, Error> {
        // make sure we don't overshoot the requested size, unless the heap
        // size is dynamic
        if self.yield_cap != 0 && self.yielded >= self.yield_cap {
            return Ok(None);
        }
        let Some(top) = self.heap.pop_max() else {
            return Ok(None);
        };
        self.yielded += 1;
        *res = top;
        Ok(Some(()))
    }
}

impl ResultProcessor for Sorter {
    fn ty(&self) -> ResultProcessorType {
        ResultProcessorType::Sorter
    }

    fn next(&mut self, mut cx: Context<'_>, res: &mut SearchResult) -> Result<Option<()>, Error> {
        while !self.draining {
            match self.accumulate(&mut cx)? {
                Step::Queued => {}
                Step::Drained => {
                    tracing::trace!(buffered = self.heap.len(), "sorter drained; yielding");
                    self.draining = true;
                }
            }
        }
        self.yield_next(res)
    }
}
