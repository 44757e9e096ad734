/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

use std::sync::Arc;

use sorting_vector::SortingVector;
use value::Value;

use crate::{LookupKey, LookupKeyFlag};

/// Row data for one search result. Abstracts over whether a value comes
/// from the document's sorting vector or was loaded dynamically.
///
/// The sorting-vector binding is shared with the document metadata (it is
/// the same ref-counted vector), so a row never copies sortable values.
#[derive(Clone, Debug, Default)]
pub struct Row {
    /// Sorting vector of the document this row belongs to.
    sv: Option<Arc<SortingVector>>,

    /// Dynamic values obtained from loading or prior processing, indexed by
    /// key `dst_idx`.
    values: Vec<Option<Value>>,

    /// How many values actually exist in `values`. Note that this is not
    /// the length of the array!
    num: u32,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the document's sorting vector. Replaces any previous binding.
    pub fn set_sorting_vector(&mut self, sv: Option<Arc<SortingVector>>) {
        self.sv = sv;
    }

    pub fn sorting_vector(&self) -> Option<&Arc<SortingVector>> {
        self.sv.as_ref()
    }

    /// Number of dynamically written values.
    pub fn num(&self) -> u32 {
        self.num
    }

    /// True when the row has neither a sorting vector nor loaded values.
    pub fn is_blank(&self) -> bool {
        self.sv.is_none() && self.num == 0
    }

    /// Look a key up: a dynamically written value wins, then the sorting
    /// vector for `SvSrc` keys. Null sorting-vector slots read as absent.
    pub fn get(&self, key: &LookupKey) -> Option<&Value> {
        if let Some(value) = self
            .values
            .get(key.dst_idx() as usize)
            .and_then(Option::as_ref)
        {
            return Some(value);
        }

        if key.flags().contains(LookupKeyFlag::SvSrc) {
            let sv = self.sv.as_ref()?;
            let value = sv.get(key.sv_idx()? as usize)?;
            if !value.is_null() {
                return Some(value);
            }
        }

        None
    }

    /// Write a value under a registered key, replacing any previous value.
    pub fn write_key(&mut self, key: &LookupKey, value: Value) {
        let idx = key.dst_idx() as usize;
        if self.values.len() <= idx {
            self.values.resize(idx + 1, None);
        }

        let in_place = &mut self.values[idx];
        if in_place.replace(value).is_none() {
            self.num += 1;
        }
    }

    /// Wipes the dynamic values, retaining allocated storage and the
    /// sorting-vector binding, so the row may be refilled.
    pub fn wipe(&mut self) {
        for value in self.values.iter_mut() {
            if value.take().is_some() {
                self.num -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldLookup, LookupKeyFlags};
    use pretty_assertions::assert_eq;

    fn lookup_with_sv_field() -> (FieldLookup, LookupKey) {
        let mut lookup = FieldLookup::new();
        let key = lookup.register_schema_field("name", Some(0), LookupKeyFlags::empty());
        (lookup, key)
    }

    #[test]
    fn dynamic_value_wins_over_sorting_vector() {
        let (_lookup, key) = lookup_with_sv_field();

        let mut sv = SortingVector::new(1);
        sv.try_insert_string(0, "from-sv").unwrap();

        let mut row = Row::new();
        row.set_sorting_vector(Some(Arc::new(sv)));
        assert_eq!(row.get(&key), Some(&Value::string("from-sv")));

        row.write_key(&key, Value::string("loaded"));
        assert_eq!(row.get(&key), Some(&Value::string("loaded")));
    }

    #[test]
    fn null_sv_slot_reads_as_absent() {
        let (_lookup, key) = lookup_with_sv_field();

        let mut row = Row::new();
        row.set_sorting_vector(Some(Arc::new(SortingVector::new(1))));
        assert_eq!(row.get(&key), None);
    }

    #[test]
    fn wipe_preserves_sorting_vector_binding() {
        let (_lookup, key) = lookup_with_sv_field();

        let mut sv = SortingVector::new(1);
        sv.try_insert_num(0, 7.0).unwrap();

        let mut row = Row::new();
        row.set_sorting_vector(Some(Arc::new(sv)));
        row.write_key(&key, Value::number(9.0));
        assert_eq!(row.num(), 1);

        row.wipe();
        assert_eq!(row.num(), 0);
        // the sorting vector still answers
        assert_eq!(row.get(&key), Some(&Value::number(7.0)));
    }

    #[test]
    fn rewrite_does_not_double_count() {
        let mut lookup = FieldLookup::new();
        let key = lookup.get_key_write("k");

        let mut row = Row::new();
        row.write_key(&key, Value::number(1.0));
        row.write_key(&key, Value::number(2.0));
        assert_eq!(row.num(), 1);
        assert_eq!(row.get(&key), Some(&Value::number(2.0)));
    }
}
