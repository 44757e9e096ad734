/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Additional-values loader.
//!
//! Sits close above the index source and copies the metrics yielded by the
//! iterators (e.g. vector distances) into the result row before any
//! processor that needs them.

use crate::{Context, Error, ResultProcessor, ResultProcessorType, SearchResult};

#[derive(Default)]
pub struct MetricsLoader;

impl MetricsLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ResultProcessor for MetricsLoader {
    fn ty(&self) -> ResultProcessorType {
        ResultProcessorType::Metrics
    }

    fn next(&mut self, mut cx: Context<'_>, res: &mut SearchResult) -> Result<Option<()>, Error> {
        if cx.upstream_next(res)?.is_none() {
            return Ok(None);
        }

        let metrics = res
            .index_result()
            .map(|entry| entry.metrics.clone())
            .unwrap_or_default();
        for metric in metrics {
            res.row_mut().write_key(&metric.key, metric.value);
        }

        Ok(Some(()))
    }
}
