/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Field lookup.
//!
//! A [`FieldLookup`] maps field names to [`LookupKey`] handles once, up
//! front; every later access into a result [`Row`] is then an array index
//! instead of a string comparison. Keys know whether their value lives in
//! the document's sorting vector, in the row's dynamically loaded values, or
//! both.

mod load_document;
mod row;

pub use load_document::{LoadDocumentError, LoadDocumentOptions, LoadMode, load_document};
pub use row::Row;

use std::sync::Arc;

use enumflags2::{BitFlags, bitflags};

#[bitflags]
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum LookupKeyFlag {
    /// The field is part of the document itself and can be loaded from the
    /// host's key-space.
    DocSrc = 0x01,
    /// The field is part of the index schema.
    SchemaSrc = 0x02,
    /// The value can be read from the document's sorting vector.
    SvSrc = 0x04,
    /// The key was created by the query itself (e.g. a yieldable metric),
    /// not found in the document.
    QuerySrc = 0x08,
    /// The key's values are numeric.
    Numeric = 0x10,
}

pub type LookupKeyFlags = BitFlags<LookupKeyFlag>;

/// An opaque handle to a field, resolved once against a [`FieldLookup`].
///
/// Handles are cheap to clone and are stored by value inside result
/// processors for the lifetime of a query.
#[derive(Clone, Debug, PartialEq)]
pub struct LookupKey {
    name: Arc<str>,
    /// Index into a row's dynamic values.
    dst_idx: u16,
    /// Index into the document's sorting vector, for `SvSrc` keys.
    sv_idx: Option<u16>,
    flags: LookupKeyFlags,
}

impl LookupKey {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn dst_idx(&self) -> u16 {
        self.dst_idx
    }

    pub const fn sv_idx(&self) -> Option<u16> {
        self.sv_idx
    }

    pub const fn flags(&self) -> LookupKeyFlags {
        self.flags
    }
}

/// The per-query registry of lookup keys.
#[derive(Debug, Default)]
pub struct FieldLookup {
    keys: Vec<LookupKey>,
}

impl FieldLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema field. `sv_idx` is the field's slot in document
    /// sorting vectors, for sortable fields.
    pub fn register_schema_field(
        &mut self,
        name: impl Into<Arc<str>>,
        sv_idx: Option<u16>,
        extra: LookupKeyFlags,
    ) -> LookupKey {
        let mut flags = LookupKeyFlag::SchemaSrc | LookupKeyFlag::DocSrc | extra;
        if sv_idx.is_some() {
            flags |= LookupKeyFlag::SvSrc;
        }
        self.register(name.into(), sv_idx, flags)
    }

    /// Get a key for reading, or `None` if the field was never registered.
    pub fn get_key(&self, name: &str) -> Option<&LookupKey> {
        self.keys.iter().find(|k| k.name.as_ref() == name)
    }

    /// Get a key for writing, registering it as query-created if unknown.
    pub fn get_key_write(&mut self, name: &str) -> LookupKey {
        if let Some(key) = self.get_key(name) {
            return key.clone();
        }
        self.register(name.into(), None, LookupKeyFlag::QuerySrc.into())
    }

    /// Get a key for loading from the document, registering it if unknown.
    pub fn get_key_load(&mut self, name: &str) -> LookupKey {
        if let Some(key) = self.get_key(name) {
            return key.clone();
        }
        self.register(name.into(), None, LookupKeyFlag::DocSrc.into())
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn register(&mut self, name: Arc<str>, sv_idx: Option<u16>, flags: LookupKeyFlags) -> LookupKey {
        debug_assert!(
            self.get_key(&name).is_none(),
            "field {name:?} registered twice"
        );
        let key = LookupKey {
            name,
            dst_idx: self.keys.len() as u16,
            sv_idx,
            flags,
        };
        self.keys.push(key.clone());
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn schema_field_gets_sv_flag() {
        let mut lookup = FieldLookup::new();
        let key = lookup.register_schema_field("price", Some(0), LookupKeyFlag::Numeric.into());

        assert!(key.flags().contains(LookupKeyFlag::SvSrc));
        assert!(key.flags().contains(LookupKeyFlag::Numeric));
        assert_eq!(key.sv_idx(), Some(0));
        assert_eq!(lookup.get_key("price"), Some(&key));
    }

    #[test]
    fn write_key_is_created_on_demand() {
        let mut lookup = FieldLookup::new();
        let key = lookup.get_key_write("__score_metric");
        assert!(key.flags().contains(LookupKeyFlag::QuerySrc));
        // resolving again yields the same handle
        assert_eq!(lookup.get_key_write("__score_metric"), key);
        assert_eq!(lookup.len(), 1);
    }

    #[test]
    fn dst_indices_are_dense() {
        let mut lookup = FieldLookup::new();
        let a = lookup.register_schema_field("a", None, LookupKeyFlags::empty());
        let b = lookup.register_schema_field("b", Some(3), LookupKeyFlags::empty());
        assert_eq!(a.dst_idx(), 0);
        assert_eq!(b.dst_idx(), 1);
    }
}
