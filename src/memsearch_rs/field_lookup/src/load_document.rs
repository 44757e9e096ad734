/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Populate a result [`Row`] from the host's key-space.
//!
//! Callers must hold the host's global lock; the pipeline guarantees this
//! by placing loaders downstream of a buffer-and-locker bracket.

use doc_table::DmdRef;
use search_ctx::Keyspace;
use thiserror::Error;

use crate::{LookupKey, LookupKeyFlag, FieldLookup, Row};

/// Which fields to load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadMode {
    /// Load exactly the given keys.
    KeyList,
    /// Load every field the document has.
    AllKeys,
}

#[derive(Debug, Error)]
pub enum LoadDocumentError {
    /// The document key no longer exists in the key-space.
    #[error("document {0:?} not found in key-space")]
    DocumentMissing(String),
}

/// Options for [`load_document`].
#[derive(Debug)]
pub struct LoadDocumentOptions<'a> {
    pub keyspace: &'a Keyspace,
    pub dmd: &'a DmdRef,
    /// Keys to load under [`LoadMode::KeyList`]; ignored for `AllKeys`.
    pub keys: &'a [LookupKey],
    pub mode: LoadMode,
}

/// Load document fields into `dst_row`.
///
/// Binds the row to the document's sorting vector and then copies the
/// requested fields out of the stored document. Keys that the document does
/// not have are simply left absent; a missing document is an error the
/// caller decides how to treat.
pub fn load_document(
    lookup: &mut FieldLookup,
    dst_row: &mut Row,
    options: &LoadDocumentOptions<'_>,
) -> Result<(), LoadDocumentError> {
    dst_row.set_sorting_vector(options.dmd.sort_vector().cloned());

    let key = options.dmd.key();
    let document = options
        .keyspace
        .document(key)
        .ok_or_else(|| LoadDocumentError::DocumentMissing(key.to_owned()))?;

    match options.mode {
        LoadMode::AllKeys => {
            for (field, value) in document.fields() {
                let key = lookup.get_key_load(field);
                dst_row.write_key(&key, value.clone());
            }
        }
        LoadMode::KeyList => {
            for key in options.keys {
                if !key.flags().contains(LookupKeyFlag::DocSrc) {
                    continue;
                }
                if let Some(value) = document.get(key.name()) {
                    dst_row.write_key(key, value.clone());
                }
            }
        }
    }

    Ok(())
}
