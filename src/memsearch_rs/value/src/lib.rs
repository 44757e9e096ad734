/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Dynamic value cells used across the query pipeline: row data, sorting
//! vectors, and yieldable metrics all carry [`Value`]s.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A single value cell.
///
/// Strings are reference-counted so that cloning a value — which happens
/// whenever a row entry is duplicated or a sorting vector is shared between a
/// document and a result row — never copies the payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// The absence of a value. Sorting-vector slots for fields a document
    /// does not have are null.
    #[default]
    Null,
    /// A double-precision number.
    Number(f64),
    /// An immutable string.
    String(Arc<str>),
}

impl Value {
    pub fn number(num: f64) -> Self {
        Self::Number(num)
    }

    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Self::String(s.into())
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the numeric payload, or `None` for other variants.
    pub const fn as_num(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string payload, or `None` for other variants.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Total ordering over value cells, as used by the field sorter.
    ///
    /// Numbers compare numerically (NaN sorts as equal to everything, the
    /// comparison never poisons the heap), strings compare lexically on
    /// their normalized form. Mixed types order by type rank:
    /// null < number < string.
    pub fn cmp_values(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Self::String(a), Self::String(b)) => a.as_ref().cmp(b.as_ref()),
            (a, b) => a.type_rank().cmp(&b.type_rank()),
        }
    }

    const fn type_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Number(_) => 1,
            Self::String(_) => 2,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "(null)"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for Value {
    fn from(num: f64) -> Self {
        Self::Number(num)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s.into())
    }
}
