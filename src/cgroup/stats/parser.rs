//! Provides the shared parsing abstraction for single-value cgroup files.
//!
//! cgroup v1 exposes many interface files that contain exactly one decimal
//! number, such as `memory.limit_in_bytes` or `memory.failcnt`. Types backed by
//! such a file implement [`SingleLineStat`], usually by delegating to
//! [`read_single_value`].

use std::io::BufRead;

use crate::fsutil::{self, LINE_CAPACITY, LineRead};

use super::StatParseError;

/// A trait for parsing single-line, single-value statistics, such as
/// `memory.limit_in_bytes` or `memory.failcnt` files.
///
/// Implementors provide a method to parse from a buffered reader,
/// returning the strongly typed structure.
pub trait SingleLineStat: Sized + Default {
    /// Parses a single-line statistic from the provided buffered reader.
    ///
    /// # Arguments
    ///
    /// * `buf` - A mutable reference to a type implementing `BufRead` containing the value.
    ///
    /// # Returns
    ///
    /// * `Ok(Self)` if parsing succeeds.
    /// * `Err(std::io::Error)` if reading or parsing fails.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self>;
}

/// Reads the first line of `buf` and parses it as an unsigned 64-bit integer.
///
/// Surrounding whitespace is ignored.
///
/// # Errors
///
/// Returns an error of kind `InvalidData` wrapping [`StatParseError::InvalidValue`] if the
/// line is empty or not a number, or [`StatParseError::LineTooLong`] if it does not fit the
/// scan buffer.
pub fn read_single_value<R: BufRead>(buf: &mut R) -> std::io::Result<u64> {
    let mut line = String::new();
    if fsutil::read_bounded_line(buf, &mut line, LINE_CAPACITY)? == LineRead::Truncated {
        return Err(StatParseError::LineTooLong { line: 1 }.into());
    }

    let value = line.trim();
    let parsed = value
        .parse::<u64>()
        .map_err(|source| StatParseError::InvalidValue {
            value: value.to_string(),
            line: 1,
            source,
        })?;
    Ok(parsed)
}
