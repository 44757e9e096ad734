/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! The profiling processor: a transparent link that accumulates the call
//! count and wall time of everything upstream of it. When profiling is on,
//! one is inserted after every processor so per-stage timing is
//! attributable (see `QueryIterator::add_profilers`).

use std::time::{Duration, Instant};

use crate::{Context, Error, ResultProcessor, ResultProcessorType, SearchResult};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileStats {
    pub time: Duration,
    pub count: u64,
}

impl ProfileStats {
    pub fn duration_ms(&self) -> f64 {
        self.time.as_secs_f64() * 1e3
    }
}

#[derive(Debug, Default)]
pub struct Profile {
    stats: ProfileStats,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &ProfileStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut ProfileStats {
        &mut self.stats
    }
}

impl ResultProcessor for Profile {
    fn ty(&self) -> ResultProcessorType {
        ResultProcessorType::Profile
    }

    fn next(&mut self, mut cx: Context<'_>, res: &mut SearchResult) -> Result<Option<()>, Error> {
        let start = Instant::now();
        let status = cx.upstream_next(res);
        self.stats.time += start.elapsed();
        self.stats.count += 1;
        status
    }
}
