/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

use std::fmt::{Debug, Display};
use strum::FromRepr;

/// Error codes a query execution can end with.
#[derive(Clone, Copy, Default, FromRepr, PartialEq, Eq)]
#[repr(u8)]
pub enum QueryErrorCode {
    #[default]
    Ok = 0,
    Generic,
    ConstructPipeline,
    NoDoc,
    BadVal,
    TimedOut,
    OutOfMemory,
}

impl QueryErrorCode {
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    pub const fn to_str(self) -> &'static str {
        match self {
            Self::Ok => "Success (not an error)",
            Self::Generic => "SEARCH_GENERIC: Generic error evaluating the query",
            Self::ConstructPipeline => {
                "SEARCH_CONSTRUCT_PIPELINE: Could not construct query pipeline"
            }
            Self::NoDoc => "SEARCH_DOC_NOT_FOUND: Document not found",
            Self::BadVal => "SEARCH_VALUE_BAD: Invalid value was given",
            Self::TimedOut => "SEARCH_TIMEOUT: Timeout limit was reached",
            Self::OutOfMemory => "SEARCH_OOM: Not enough memory available to execute the query",
        }
    }
}

impl Debug for QueryErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{self}")
    }
}

impl Display for QueryErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.to_str())
    }
}

/// The fatal-error slot carried by a query's pipeline handle.
///
/// The first error wins: once a code is set, later `set_*` calls are
/// ignored, so the error a caller sees is the one that aborted the query.
#[derive(Clone, Debug, Default)]
pub struct QueryError {
    code: QueryErrorCode,
    message: Option<String>,
}

impl QueryError {
    pub const fn is_ok(&self) -> bool {
        self.code.is_ok()
    }

    pub const fn code(&self) -> QueryErrorCode {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub const fn set_code(&mut self, code: QueryErrorCode) {
        if !self.is_ok() {
            return;
        }

        self.code = code;
    }

    pub fn set_code_and_message(&mut self, code: QueryErrorCode, message: impl Into<String>) {
        if !self.is_ok() {
            return;
        }

        self.code = code;
        self.message = Some(message.into());
    }

    /// Clears the error code and message.
    pub fn clear(&mut self) {
        self.code = QueryErrorCode::default();
        self.message = None;
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match &self.message {
            Some(message) => write!(f, "{message}"),
            None => write!(f, "{}", self.code),
        }
    }
}
