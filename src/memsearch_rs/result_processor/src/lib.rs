/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! The query execution pipeline.
//!
//! A pipeline is a singly-linked chain of result processors (RPs) anchored
//! in a [`QueryIterator`]. The chain's root is the index source; its end is
//! what the server drains. Pulling a record from the end recursively pulls
//! from upstream: each processor receives a [`Context`] exposing its
//! upstream prefix of the chain plus the per-query [`QueryState`].

pub mod buffer;
pub mod counter;
pub mod index;
pub mod loader;
pub mod metrics;
pub mod pager;
pub mod profile;
pub mod scorer;
pub mod search_result;
pub mod sorter;
pub mod test_utils;
mod timeout;
pub mod util;

pub use buffer::{BufferAndLocker, Unlocker};
pub use counter::Counter;
pub use index::IndexSource;
pub use loader::Loader;
pub use metrics::MetricsLoader;
pub use pager::Pager;
pub use profile::{Profile, ProfileStats};
pub use scorer::{FILTER_OUT, Scorer, ScoringFunction, ScoringFunctionArgs};
pub use search_result::{ScoreExplain, SearchResult};
pub use sorter::{AscendingMap, MAX_SORT_FIELDS, Sorter};

use std::any::Any;
use std::time::Instant;

use field_lookup::FieldLookup;
use index_iterators::IndexIterator;
use query_error::QueryError;
use search_config::{SearchConfig, TimeoutPolicy};
use search_ctx::SearchContext;
use strum::Display;

/// Non-`OK` statuses a result processor can report.
///
/// `EOF` is not an error and is modeled as `Ok(None)`; see
/// [`ResultProcessor::next`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The reducer upstream is still accumulating. Internal to the sorter;
    /// never visible outside the pipeline.
    Paused,
    /// Execution halted because the deadline was exceeded.
    TimedOut,
    /// Aborted because of an error. The handle's [`QueryState::err`] slot
    /// has more information.
    Error,
}

/// The type tag of a result processor, used for profiling output and for
/// the few places that dispatch on their neighbor's identity.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum ResultProcessorType {
    #[strum(serialize = "Index")]
    Index,
    #[strum(serialize = "Scorer")]
    Scorer,
    #[strum(serialize = "Metrics Applier")]
    Metrics,
    #[strum(serialize = "Sorter")]
    Sorter,
    #[strum(serialize = "Pager/Limiter")]
    Pager,
    #[strum(serialize = "Loader")]
    Loader,
    #[strum(serialize = "Buffer and Locker")]
    BufferAndLocker,
    #[strum(serialize = "Unlocker")]
    Unlocker,
    #[strum(serialize = "Profile")]
    Profile,
    #[strum(serialize = "Counter")]
    Counter,
}

/// A node in the pull-based pipeline.
///
/// Processors are `Send`: a whole pipeline is handed to a worker-pool
/// thread and driven there.
pub trait ResultProcessor: Any + Send {
    /// The type tag of this result processor.
    fn ty(&self) -> ResultProcessorType;

    /// Pull the next [`SearchResult`] from this processor into `res`.
    ///
    /// Returns `Ok(Some(()))` if a result was produced (the caller owns it)
    /// and `Ok(None)` to indicate the end of the stream. After returning
    /// `Ok(None)` once, every further call must keep returning `Ok(None)`.
    ///
    /// # Errors
    ///
    /// [`Error::TimedOut`] when the deadline fired, [`Error::Error`] for
    /// fatal failures (the handle's `err` slot is populated).
    /// [`Error::Paused`] never escapes the sorter.
    fn next(&mut self, cx: Context<'_>, res: &mut SearchResult) -> Result<Option<()>, Error>;
}

/// Per-query state shared by every processor of one execution.
#[derive(Debug)]
pub struct QueryState {
    /// Count of records that passed the filters. Incremented by the source,
    /// decremented on filter-out or load failure.
    pub total_results: usize,
    /// Lowest score currently in the sorter heap, used as a pruning hint
    /// for the scorer.
    pub min_score: f64,
    /// Slot for the first fatal error.
    pub err: QueryError,
    /// Absolute deadline after which operations return `TimedOut`.
    /// `None` means unlimited.
    pub deadline: Option<Instant>,
    /// The timeout policy, resolved at construction.
    pub timeout_policy: TimeoutPolicy,
    /// Handle to the index spec, host key-space, and sharding hook.
    pub sctx: SearchContext,
    /// The per-query field-lookup registry.
    pub lookup: FieldLookup,
    /// True while this pipeline holds the index-spec read lock.
    pub holds_spec_lock: bool,
    /// True while this pipeline's buffer-and-locker bracket holds the
    /// host's global lock.
    pub holds_host_lock: bool,
}

/// What a result processor sees of its surroundings: the strict upstream
/// prefix of the chain, and the per-query state.
pub struct Context<'a> {
    upstream: &'a mut [Box<dyn ResultProcessor>],
    state: &'a mut QueryState,
}

impl Context<'_> {
    /// Pull the next result from the upstream processor.
    ///
    /// Returns `Ok(None)` when there is no upstream; only the source
    /// processor legitimately sits at the root and it never pulls.
    pub fn upstream_next(&mut self, res: &mut SearchResult) -> Result<Option<()>, Error> {
        let Some((current, prefix)) = self.upstream.split_last_mut() else {
            return Ok(None);
        };
        let cx = Context {
            upstream: prefix,
            state: &mut *self.state,
        };
        current.next(cx, res)
    }

    pub fn state(&mut self) -> &mut QueryState {
        self.state
    }

    /// Compensate the immediately-upstream profiler for a pull it will
    /// never see (the counter's swallowed EOF).
    pub fn bump_upstream_profiler(&mut self) {
        if let Some((last, _)) = self.upstream.split_last_mut() {
            let any: &mut dyn Any = last.as_mut();
            if let Some(profile) = any.downcast_mut::<Profile>() {
                profile.stats_mut().count += 1;
            }
        }
    }
}

/// Options fixing a pipeline's timeout behavior at construction.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryOptions {
    pub deadline: Option<Instant>,
    pub timeout_policy: TimeoutPolicy,
}

impl QueryOptions {
    /// Derive options from a configuration snapshot: the deadline is
    /// `now + query_timeout_ms` (unlimited when 0) and the policy is the
    /// configured one.
    pub fn from_config(config: &SearchConfig) -> Self {
        let deadline = (config.query_timeout_ms > 0)
            .then(|| Instant::now() + std::time::Duration::from_millis(config.query_timeout_ms));
        Self {
            deadline,
            timeout_policy: config.timeout_policy,
        }
    }
}

/// The pipeline handle: owns the chain and the per-query state.
///
/// Destroying the handle destroys every processor and releases any lock the
/// pipeline still holds.
pub struct QueryIterator {
    rps: Vec<Box<dyn ResultProcessor>>,
    state: QueryState,
}

impl QueryIterator {
    /// Create an empty pipeline. The timeout policy in `options` is
    /// resolved against the global configuration snapshot, here and never
    /// again.
    pub fn new(sctx: SearchContext, options: QueryOptions) -> Self {
        let config = SearchConfig::global();
        Self {
            rps: Vec::new(),
            state: QueryState {
                total_results: 0,
                min_score: 0.0,
                err: QueryError::default(),
                deadline: options.deadline,
                timeout_policy: options.timeout_policy.resolve(&config),
                sctx,
                lookup: FieldLookup::new(),
                holds_spec_lock: false,
                holds_host_lock: false,
            },
        }
    }

    /// Append a processor at the end of the chain; it becomes the new end
    /// and its upstream is the previous end.
    pub fn push<P: ResultProcessor>(&mut self, rp: P) {
        self.rps.push(Box::new(rp));
    }

    /// Pull the next record from the end of the chain.
    pub fn next(&mut self, res: &mut SearchResult) -> Result<Option<()>, Error> {
        let mut cx = Context {
            upstream: &mut self.rps,
            state: &mut self.state,
        };
        cx.upstream_next(res)
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }

    pub fn total_results(&self) -> usize {
        self.state.total_results
    }

    pub fn error(&self) -> &QueryError {
        &self.state.err
    }

    /// Re-arm the deadline; pipelines are re-armed between batched
    /// invocations (cursor reads).
    pub fn update_timeout(&mut self, deadline: Option<Instant>) {
        self.state.deadline = deadline;
    }

    /// Take the index-spec read lock on behalf of this pipeline. The
    /// buffer-and-locker may drop it mid-execution; drop releases it
    /// otherwise.
    pub fn acquire_spec_read_lock(&mut self) {
        if !self.state.holds_spec_lock {
            self.state.sctx.spec().lock().lock_read();
            self.state.holds_spec_lock = true;
        }
    }

    /// The root index iterator, when the root processor is an index source.
    /// On a coordinator the root is a network processor and there is no
    /// root filter.
    pub fn root_filter(&mut self) -> Option<&mut dyn IndexIterator> {
        let root = self.rps.first_mut()?;
        let any: &mut dyn Any = root.as_mut();
        any.downcast_mut::<IndexSource>()?.root_iterator_mut()
    }

    /// Wrap every link of the chain with a profiler so per-stage timing is
    /// attributable.
    pub fn add_profilers(&mut self) {
        let mut wrapped = Vec::with_capacity(self.rps.len() * 2);
        for rp in self.rps.drain(..) {
            wrapped.push(rp);
            wrapped.push(Box::new(Profile::new()) as Box<dyn ResultProcessor>);
        }
        self.rps = wrapped;
    }

    /// Per-stage profiling report: each profiler paired with the type of
    /// the processor it measures.
    pub fn profile_report(&self) -> Vec<(ResultProcessorType, ProfileStats)> {
        let mut report = Vec::new();
        for window in self.rps.windows(2) {
            let any: &dyn Any = window[1].as_ref();
            if let Some(profile) = any.downcast_ref::<Profile>() {
                report.push((window[0].ty(), profile.stats().clone()));
            }
        }
        report
    }

    /// The chain's processor types, root first.
    pub fn chain_types(&self) -> Vec<ResultProcessorType> {
        self.rps.iter().map(|rp| rp.ty()).collect()
    }

    /// Borrow the end processor as a concrete type, e.g. to read a
    /// counter's tally after draining.
    pub fn end_as<P: ResultProcessor>(&self) -> Option<&P> {
        let any: &dyn Any = self.rps.last()?.as_ref();
        any.downcast_ref::<P>()
    }
}

impl Drop for QueryIterator {
    fn drop(&mut self) {
        if self.state.holds_host_lock {
            self.state.sctx.keyspace().lock().unlock();
            self.state.holds_host_lock = false;
        }
        if self.state.holds_spec_lock {
            self.state.sctx.spec().lock().unlock_read();
            self.state.holds_spec_lock = false;
        }
    }
}
