/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! The scoring processor.
//!
//! It takes results from upstream and applies a scoring function to each
//! one. It is not part of the chain when running in sort-by mode.

use doc_table::DocumentMetadata;
use index_iterators::IndexResult;

use crate::{Context, Error, ResultProcessor, ResultProcessorType, ScoreExplain, SearchResult};

/// The special score instructing the scorer to disregard a result and
/// decrease the total number of results.
pub const FILTER_OUT: f64 = f64::NEG_INFINITY;

/// Mutable context handed to the scoring function on every call.
#[derive(Debug, Default)]
pub struct ScoringFunctionArgs {
    /// Scratch slot for a score explanation. When the function fills it,
    /// the scorer steals it into the search result.
    pub explain: Option<Box<ScoreExplain>>,
}

/// A scoring function. Extensions register implementations; the engine
/// ships frequency-based defaults.
pub trait ScoringFunction {
    /// Score one result. `min_score` is the lowest score currently held by
    /// the downstream top-K heap and may be used to short-circuit: anything
    /// below it will be discarded anyway.
    fn score(
        &mut self,
        args: &mut ScoringFunctionArgs,
        index_result: Option<&IndexResult>,
        dmd: Option<&DocumentMetadata>,
        min_score: f64,
    ) -> f64;
}

/// Adapter letting plain closures act as scoring functions.
struct FnScoringFunction<F>(F);

impl<F> ScoringFunction for FnScoringFunction<F>
where
    F: FnMut(&mut ScoringFunctionArgs, Option<&IndexResult>, Option<&DocumentMetadata>, f64) -> f64,
{
    fn score(
        &mut self,
        args: &mut ScoringFunctionArgs,
        index_result: Option<&IndexResult>,
        dmd: Option<&DocumentMetadata>,
        min_score: f64,
    ) -> f64 {
        (self.0)(args, index_result, dmd, min_score)
    }
}

pub struct Scorer {
    function: Box<dyn ScoringFunction + Send>,
    args: ScoringFunctionArgs,
}

impl Scorer {
    pub fn new(function: impl ScoringFunction + Send + 'static) -> Self {
        Self {
            function: Box::new(function),
            args: ScoringFunctionArgs::default(),
        }
    }

    /// A scorer over a plain function or closure.
    pub fn from_fn<F>(function: F) -> Self
    where
        F: FnMut(&mut ScoringFunctionArgs, Option<&IndexResult>, Option<&DocumentMetadata>, f64) -> f64
            + Send
            + 'static,
    {
        Self::new(FnScoringFunction(function))
    }
}

impl ResultProcessor for Scorer {
    fn ty(&self) -> ResultProcessorType {
        ResultProcessorType::Scorer
    }

    fn next(&mut self, mut cx: Context<'_>, res: &mut SearchResult) -> Result<Option<()>, Error> {
        loop {
            if cx.upstream_next(res)?.is_none() {
                return Ok(None);
            }

            let min_score = cx.state().min_score;
            let score = self.function.score(
                &mut self.args,
                res.index_result(),
                res.dmd().map(|dmd| &**dmd),
                min_score,
            );
            res.set_score(score);
            if let Some(explain) = self.args.explain.take() {
                res.set_score_explain(Some(explain));
            }

            // The filter-out sentinel disregards the result and takes back
            // the total the upstream processor counted.
            if score == FILTER_OUT {
                cx.state().total_results -= 1;
                res.clear();
                continue;
            }

            return Ok(Some(()));
        }
    }
}
