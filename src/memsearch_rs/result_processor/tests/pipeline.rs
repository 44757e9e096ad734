/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! End-to-end pipeline tests: full chains from the index source to the
//! draining caller.

use std::collections::HashMap;

use doc_table::DocumentMetadata;
use index_iterators::{IdList, IndexIterator, IndexResult, IteratorError, ReadOutcome};
use pretty_assertions::assert_eq;
use result_processor::test_utils::{
    Fixture, drain_doc_ids, drain_scored, drain_with_status, scored_source,
    scored_source_with_tail,
};
use result_processor::{
    AscendingMap, Counter, Error, IndexSource, Pager, Profile, QueryIterator, QueryOptions,
    ResultProcessorType, Scorer, ScoringFunction, ScoringFunctionArgs, SearchResult, Sorter,
};
use search_config::{SearchConfig, TimeoutPolicy};
use sorting_vector::SortingVector;
use value::Value;

/// Scores documents from a fixed table; unknown documents score zero.
struct TableScorer {
    scores: HashMap<u64, f64>,
}

impl TableScorer {
    fn new(scores: &[(u64, f64)]) -> Self {
        Self {
            scores: scores.iter().copied().collect(),
        }
    }
}

impl ScoringFunction for TableScorer {
    fn score(
        &mut self,
        _args: &mut ScoringFunctionArgs,
        index_result: Option<&IndexResult>,
        _dmd: Option<&DocumentMetadata>,
        _min_score: f64,
    ) -> f64 {
        index_result
            .and_then(|entry| self.scores.get(&entry.doc_id))
            .copied()
            .unwrap_or(0.0)
    }
}

fn config() -> SearchConfig {
    SearchConfig::default()
}

#[test]
fn score_top_3_with_ties() {
    let fixture = Fixture::with_docs(&[1, 2, 3, 4, 5]);
    let mut qitr = fixture.query_iterator();
    qitr.push(IndexSource::new(Some(Box::new(IdList::new(vec![
        1, 2, 3, 4, 5,
    ])))));
    qitr.push(Scorer::new(TableScorer::new(&[
        (1, 1.0),
        (2, 3.0),
        (3, 2.0),
        (4, 3.0),
        (5, 2.0),
    ])));
    qitr.push(Sorter::by_score(3, &config()));

    let yielded = drain_scored(&mut qitr);
    // ties broken by the lower doc id first
    assert_eq!(yielded, vec![(2, 3.0), (4, 3.0), (3, 2.0)]);
    assert_eq!(qitr.total_results(), 5);
}

#[test]
fn filter_out_shrinks_the_totals() {
    struct FilterOutDoc2;
    impl ScoringFunction for FilterOutDoc2 {
        fn score(
            &mut self,
            _args: &mut ScoringFunctionArgs,
            index_result: Option<&IndexResult>,
            _dmd: Option<&DocumentMetadata>,
            _min_score: f64,
        ) -> f64 {
            if index_result.is_some_and(|entry| entry.doc_id == 2) {
                result_processor::FILTER_OUT
            } else {
                1.0
            }
        }
    }

    let fixture = Fixture::with_docs(&[1, 2, 3, 4, 5]);
    let mut qitr = fixture.query_iterator();
    qitr.push(IndexSource::new(Some(Box::new(IdList::new(vec![
        1, 2, 3, 4, 5,
    ])))));
    qitr.push(Scorer::new(FilterOutDoc2));
    qitr.push(Sorter::by_score(10, &config()));

    let ids = drain_doc_ids(&mut qitr);
    assert!(!ids.contains(&2));
    assert_eq!(qitr.total_results(), 4);
}

#[test]
fn pager_after_sorter() {
    let fixture = Fixture::with_docs(&[1, 2, 3, 4, 5]);
    let mut qitr = fixture.query_iterator();
    qitr.push(IndexSource::new(Some(Box::new(IdList::new(vec![
        1, 2, 3, 4, 5,
    ])))));
    qitr.push(Scorer::new(TableScorer::new(&[
        (1, 1.0),
        (2, 3.0),
        (3, 2.0),
        (4, 3.0),
        (5, 2.0),
    ])));
    qitr.push(Sorter::by_score(5, &config()));
    qitr.push(Pager::new(2, 2));

    assert_eq!(drain_scored(&mut qitr), vec![(3, 2.0), (5, 2.0)]);
}

#[test]
fn sort_by_field_ascending() {
    let fixture = Fixture::new();
    for (doc_id, name) in [(1, "b"), (2, "a"), (3, "c")] {
        let mut sv = SortingVector::new(1);
        sv.try_insert_string(0, name).unwrap();
        fixture.add_doc(doc_id, Some(sv));
    }

    let mut qitr = fixture.query_iterator();
    let name_key = qitr
        .state_mut()
        .lookup
        .register_schema_field("name", Some(0), Default::default());
    qitr.push(IndexSource::new(Some(Box::new(IdList::new(vec![1, 2, 3])))));
    qitr.push(Sorter::by_fields(
        10,
        vec![name_key],
        AscendingMap::all_descending().with_ascending(0),
        &config(),
    ));

    assert_eq!(drain_doc_ids(&mut qitr), vec![2, 1, 3]);
}

#[test]
fn sort_by_field_loads_missing_values_from_the_host() {
    // no sorting vectors; the sorter must fetch the sort key from the
    // key-space, discarding documents it cannot fetch
    let fixture = Fixture::with_docs(&[1, 2, 3]);
    fixture.put_fields(1, &[("name", Value::string("b"))]);
    // doc 2 is absent from the key-space
    fixture.put_fields(3, &[("name", Value::string("a"))]);

    let mut qitr = fixture.query_iterator();
    let name_key = qitr.state_mut().lookup.get_key_load("name");
    qitr.push(IndexSource::new(Some(Box::new(IdList::new(vec![1, 2, 3])))));
    qitr.push(Sorter::by_fields(
        10,
        vec![name_key],
        AscendingMap::all_descending().with_ascending(0),
        &config(),
    ));

    assert_eq!(drain_doc_ids(&mut qitr), vec![3, 1]);
    assert_eq!(qitr.total_results(), 2);
}

#[test]
fn timeout_under_return_policy_keeps_partial_results() {
    let fixture = Fixture::with_docs(&[1, 2]);
    let mut qitr = fixture.query_iterator();
    qitr.push(scored_source_with_tail(
        &[(1, 1.0), (2, 2.0)],
        Error::TimedOut,
    ));
    qitr.push(Sorter::by_score(10, &config()));

    let (yielded, status) = drain_with_status(&mut qitr);
    assert_eq!(yielded, vec![(2, 2.0), (1, 1.0)]);
    // the caller sees a clean end of stream, not the timeout
    assert_eq!(status, Ok(None));
    assert_eq!(qitr.total_results(), 2);
}

#[test]
fn timeout_under_fail_policy_discards_everything() {
    let fixture = Fixture::with_docs(&[1, 2]);
    let mut qitr = QueryIterator::new(
        fixture.sctx.clone(),
        QueryOptions {
            deadline: None,
            timeout_policy: TimeoutPolicy::Fail,
        },
    );
    qitr.push(scored_source_with_tail(
        &[(1, 1.0), (2, 2.0)],
        Error::TimedOut,
    ));
    qitr.push(Sorter::by_score(10, &config()));

    let (yielded, status) = drain_with_status(&mut qitr);
    assert_eq!(yielded, vec![]);
    assert_eq!(status, Err(Error::TimedOut));
}

#[test]
fn fatal_iterator_errors_populate_the_err_slot() {
    struct BrokenIterator;
    impl IndexIterator for BrokenIterator {
        fn read(&mut self) -> Result<Option<ReadOutcome<'_>>, IteratorError> {
            Err(IteratorError::IoError(std::io::Error::other("disk on fire")))
        }
        fn last_doc_id(&self) -> u64 {
            0
        }
        fn at_eof(&self) -> bool {
            false
        }
        fn rewind(&mut self) {}
    }

    let fixture = Fixture::with_docs(&[1]);
    let mut qitr = fixture.query_iterator();
    qitr.push(IndexSource::new(Some(Box::new(BrokenIterator))));

    let (yielded, status) = drain_with_status(&mut qitr);
    assert_eq!(yielded, vec![]);
    assert_eq!(status, Err(Error::Error));
    assert!(!qitr.error().is_ok());
}

#[test]
fn dmd_borrows_are_returned_when_the_pipeline_ends() {
    let fixture = Fixture::with_docs(&[1, 2, 3, 4, 5]);
    {
        let mut qitr = fixture.query_iterator();
        qitr.push(IndexSource::new(Some(Box::new(IdList::new(vec![
            1, 2, 3, 4, 5,
        ])))));
        qitr.push(Scorer::new(TableScorer::new(&[(3, 5.0)])));
        // k=2 forces evictions; evicted records must release their borrows
        qitr.push(Sorter::by_score(2, &config()));
        drain_doc_ids(&mut qitr);
    }

    for doc_id in 1..=5 {
        let dmd = fixture.spec.doc_table().borrow(doc_id).unwrap();
        assert_eq!(dmd.ref_count(), 2, "doc {doc_id} leaked a borrow");
    }
}

#[test]
fn profilers_wrap_every_stage() {
    let fixture = Fixture::with_docs(&[1, 2, 3]);
    let mut qitr = fixture.query_iterator();
    qitr.push(IndexSource::new(Some(Box::new(IdList::new(vec![1, 2, 3])))));
    qitr.push(Scorer::new(TableScorer::new(&[])));
    qitr.push(Sorter::by_score(10, &config()));
    qitr.add_profilers();

    assert_eq!(
        qitr.chain_types(),
        vec![
            ResultProcessorType::Index,
            ResultProcessorType::Profile,
            ResultProcessorType::Scorer,
            ResultProcessorType::Profile,
            ResultProcessorType::Sorter,
            ResultProcessorType::Profile,
        ]
    );

    drain_doc_ids(&mut qitr);
    let report = qitr.profile_report();
    assert_eq!(report.len(), 3);

    // the sorter was pulled 3 results + 1 EOF through its profiler
    let (ty, stats) = &report[2];
    assert_eq!(*ty, ResultProcessorType::Sorter);
    assert_eq!(stats.count, 4);

    // the source served 3 results + 1 EOF to the scorer
    let (ty, stats) = &report[0];
    assert_eq!(*ty, ResultProcessorType::Index);
    assert_eq!(stats.count, 4);
}

#[test]
fn counter_compensates_its_profiler() {
    let fixture = Fixture::with_docs(&[1, 2, 3]);
    let mut qitr = fixture.query_iterator();
    qitr.push(scored_source(&[(1, 1.0), (2, 1.0), (3, 1.0)]));
    qitr.push(Counter::new());
    qitr.add_profilers();

    let (yielded, status) = drain_with_status(&mut qitr);
    assert_eq!(yielded, vec![]);
    assert_eq!(status, Ok(None));

    let counter = qitr.end_as::<Counter>();
    assert!(counter.is_none(), "the end of the chain is a profiler");

    let report = qitr.profile_report();
    assert_eq!(report.len(), 2);

    // the source profiler saw 3 results + 1 EOF, plus the counter's
    // compensation for the EOF it swallowed
    let (ty, stats) = &report[0];
    assert_eq!(*ty, ResultProcessorType::Index);
    assert_eq!(stats.count, 5);
}

#[test]
fn counter_reports_the_drained_total() {
    let fixture = Fixture::with_docs(&[1, 2, 3]);
    let mut qitr = fixture.query_iterator();
    qitr.push(scored_source(&[(1, 1.0), (2, 1.0), (3, 1.0)]));
    qitr.push(Counter::new());

    let mut res = SearchResult::new();
    assert_eq!(qitr.next(&mut res), Ok(None));
    assert_eq!(qitr.end_as::<Counter>().map(Counter::count), Some(3));

    // EOF is idempotent and the tally stays put
    assert_eq!(qitr.next(&mut res), Ok(None));
    assert_eq!(qitr.end_as::<Counter>().map(Counter::count), Some(3));
}

#[test]
fn update_timeout_rearms_the_source() {
    let fixture = Fixture::with_docs(&[1]);
    let mut qitr = fixture.query_iterator();
    qitr.push(IndexSource::new(Some(Box::new(IdList::new(vec![1])))));

    // an already-expired deadline times out on the first pull
    qitr.update_timeout(Some(std::time::Instant::now() - std::time::Duration::from_millis(1)));
    let mut res = SearchResult::new();
    assert_eq!(qitr.next(&mut res), Err(Error::TimedOut));

    // re-arming lets the pipeline proceed
    qitr.update_timeout(None);
    assert_eq!(qitr.next(&mut res), Ok(Some(())));
    assert_eq!(res.doc_id(), 1);
}

#[test]
fn root_filter_is_reachable_through_the_handle() {
    let fixture = Fixture::with_docs(&[1]);
    let mut qitr = fixture.query_iterator();
    qitr.push(IndexSource::new(Some(Box::new(IdList::new(vec![1])))));
    qitr.push(Scorer::new(TableScorer::new(&[])));

    assert!(qitr.root_filter().is_some());

    let mut other = fixture.query_iterator();
    other.push(scored_source(&[]));
    assert!(other.root_filter().is_none());
}

#[test]
fn processor_types_render_their_profile_names() {
    assert_eq!(ResultProcessorType::Index.to_string(), "Index");
    assert_eq!(ResultProcessorType::Pager.to_string(), "Pager/Limiter");
    assert_eq!(
        ResultProcessorType::BufferAndLocker.to_string(),
        "Buffer and Locker"
    );
    assert_eq!(ResultProcessorType::Metrics.to_string(), "Metrics Applier");
}

#[test]
fn query_options_derive_from_the_config() {
    let mut cfg = config();
    cfg.query_timeout_ms = 0;
    cfg.timeout_policy = TimeoutPolicy::Fail;
    let options = QueryOptions::from_config(&cfg);
    assert_eq!(options.deadline, None);
    assert_eq!(options.timeout_policy, TimeoutPolicy::Fail);

    cfg.query_timeout_ms = 50;
    let options = QueryOptions::from_config(&cfg);
    assert!(options.deadline.is_some());
}

#[test]
fn profile_wrapper_type_is_transparent_to_results() {
    let fixture = Fixture::with_docs(&[1, 2]);
    let mut qitr = fixture.query_iterator();
    qitr.push(scored_source(&[(1, 2.0), (2, 1.0)]));
    qitr.push(Profile::new());

    assert_eq!(drain_scored(&mut qitr), vec![(1, 2.0), (2, 1.0)]);
}
