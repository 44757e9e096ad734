/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! The value loader.
//!
//! Fetches document fields from the host's key-space into the result row,
//! either an explicit key list or every field of the document. The loader
//! must run inside a buffer-and-locker bracket: it touches live keys.

use field_lookup::{LoadDocumentOptions, LoadMode, LookupKey, load_document};

use crate::{Context, Error, QueryState, ResultProcessor, ResultProcessorType, SearchResult};

pub struct Loader {
    /// Explicit return keys; empty means "load all fields".
    keys: Vec<LookupKey>,
}

impl Loader {
    pub fn new(keys: Vec<LookupKey>) -> Self {
        Self { keys }
    }

    pub fn all_keys() -> Self {
        Self { keys: Vec::new() }
    }
}

impl ResultProcessor for Loader {
    fn ty(&self) -> ResultProcessorType {
        ResultProcessorType::Loader
    }

    fn next(&mut self, mut cx: Context<'_>, res: &mut SearchResult) -> Result<Option<()>, Error> {
        if cx.upstream_next(res)?.is_none() {
            return Ok(None);
        }

        // A result whose document is gone passes through unloaded; the
        // reply layer renders the empty row. Documented behavior, keep it
        // covered by tests if it ever changes.
        if res.dmd().is_none_or(|dmd| dmd.is_deleted()) {
            return Ok(Some(()));
        }

        let mode = if self.keys.is_empty() {
            LoadMode::AllKeys
        } else {
            LoadMode::KeyList
        };

        let QueryState { lookup, sctx, .. } = cx.state();
        let (dmd, row) = res.dmd_and_row_mut();
        let Some(dmd) = dmd else {
            return Ok(Some(()));
        };
        let options = LoadDocumentOptions {
            keyspace: sctx.keyspace(),
            dmd,
            keys: &self.keys,
            mode,
        };

        // if loading the document failed, the caller gets an empty row
        if let Err(err) = load_document(lookup, row, &options) {
            tracing::debug!(doc_id = res.doc_id(), %err, "document load failed");
        }
        Ok(Some(()))
    }
}
