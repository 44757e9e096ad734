/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! The counting processor: drains its upstream, counting successful pulls
//! and clearing each record immediately. It never yields a record.

use crate::{Context, Error, ResultProcessor, ResultProcessorType, SearchResult};

#[derive(Debug, Default)]
pub struct Counter {
    count: usize,
    done: bool,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

impl ResultProcessor for Counter {
    fn ty(&self) -> ResultProcessorType {
        ResultProcessorType::Counter
    }

    fn next(&mut self, mut cx: Context<'_>, res: &mut SearchResult) -> Result<Option<()>, Error> {
        if self.done {
            return Ok(None);
        }

        let status = loop {
            match cx.upstream_next(res) {
                Ok(Some(())) => {
                    self.count += 1;
                    res.clear();
                }
                other => break other,
            }
        };

        if matches!(status, Ok(None)) {
            self.done = true;
        }

        // This processor never pulls through to the caller, so in profile
        // mode the wrapper just upstream is one call short; compensate.
        cx.bump_upstream_profiler();

        status
    }
}
