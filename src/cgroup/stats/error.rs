//! Defines structured error types for parsing cgroup v1 interface files.
//!
//! This module provides the [`StatParseError`] enum, which encapsulates detailed
//! error reporting for parsing failures encountered while processing cgroup files.
//!
//! # Error Types
//!
//! - [`StatParseError::InvalidValue`]: A single numeric value (e.g., in `memory.limit_in_bytes`) failed to parse.
//! - [`StatParseError::InvalidCounter`]: One entry of a per-CPU counter line failed to parse.
//! - [`StatParseError::EmptyCounters`]: A per-CPU counter file held no values at all.
//! - [`StatParseError::LineTooLong`]: A line did not fit into the scan buffer.
//! - [`StatParseError::Io`]: Wraps underlying I/O errors during file reads.
//!
//! # Integration
//!
//! `StatParseError` converts to an [`std::io::Error`] of kind `InvalidData`, so parsers can
//! return `io::Result`. The original error is recovered with `get_ref` and `downcast_ref`.
//!
//! # Example
//!
//! ```rust
//! use std::io;
//! use cgmeter::cgroup::stats::StatParseError;
//!
//! fn parse_line(val: &str) -> io::Result<u64> {
//!     let value = val.parse::<u64>().map_err(|e| {
//!         StatParseError::InvalidValue {
//!             value: val.to_string(),
//!             line: 1,
//!             source: e,
//!         }
//!     })?;
//!     Ok(value)
//! }
//!
//! parse_line("not-a-number").unwrap_err();
//! ```

use std::num::ParseIntError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatParseError {
    #[error("invalid value at line {line}: '{value}': {source}")]
    InvalidValue {
        value: String,
        line: usize,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid counter for cpu{index}: '{value}': {source}")]
    InvalidCounter {
        index: usize,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("per-cpu counter line is empty")]
    EmptyCounters,

    #[error("line {line} exceeds the scan buffer")]
    LineTooLong { line: usize },

    #[error("error during I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StatParseError> for std::io::Error {
    fn from(err: StatParseError) -> Self {
        match err {
            StatParseError::Io(e) => e,
            StatParseError::InvalidValue { .. }
            | StatParseError::InvalidCounter { .. }
            | StatParseError::EmptyCounters
            | StatParseError::LineTooLong { .. } => {
                std::io::Error::new(std::io::ErrorKind::InvalidData, err)
            }
        }
    }
}

/// Extracts a `StatParseError` from an `std::io::Error` assuming it was wrapped.
///
/// Panics if the inner error is not a `StatParseError`. Intended for use in test assertions only.
#[cfg(test)]
pub(crate) fn extract_stat_parse_error(err: &std::io::Error) -> &StatParseError {
    err.get_ref()
        .and_then(|e| e.downcast_ref::<StatParseError>())
        .unwrap()
}
