//! This module provides parsing utilities for memory statistics as reported in cgroup v1 files.
//!
//! It supports parsing of:
//!
//! - **Hierarchical totals** from `memory.stat`.
//!   Only the `total_`-prefixed lines are kept: they cover the cgroup and all of its
//!   descendants, while the unprefixed lines describe the cgroup alone. Labels are
//!   sanitized and stripped of their `total_` prefix, so `total_cache 1048576` becomes
//!   the entry `cache = 1048576`.
//!
//! - **Single-line scalar statistics** from `memory.limit_in_bytes` and `memory.failcnt`,
//!   parsed into [`MemoryLimit`] and [`FailCount`].
//!
//! # Examples
//!
//! ```rust
//! use cgmeter::cgroup::stats::{MemoryLimit, MemoryTotals, SingleLineStat};
//!
//! let data = "cache 4096\ntotal_cache 1048576\ntotal_rss 2048\n";
//! let totals = MemoryTotals::from_reader(&mut data.as_bytes()).unwrap();
//! assert_eq!(totals.get("cache"), Some(1_048_576));
//! assert_eq!(totals.get("rss"), Some(2048));
//!
//! let limit = MemoryLimit::from_reader(&mut "536870912\n".as_bytes()).unwrap();
//! assert_eq!(limit.limit_bytes, 536_870_912);
//! ```

use std::io::BufRead;

use crate::fsutil::{self, LINE_CAPACITY, LineRead};

use super::SingleLineStat;
use super::parser::read_single_value;

/// Prefix marking hierarchy-wide figures in `memory.stat`.
pub const TOTAL_PREFIX: &str = "total_";

/// A single sanitized `memory.stat` figure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStatEntry {
    /// Metric name, without the `total_` prefix.
    pub label: String,
    pub value: u64,
}

/// The `total_*` figures of a `memory.stat` file, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryTotals {
    entries: Vec<MemoryStatEntry>,
}

impl MemoryTotals {
    pub fn entries(&self) -> &[MemoryStatEntry] {
        &self.entries
    }

    /// Looks up a figure by its sanitized label.
    pub fn get(&self, label: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|entry| entry.label == label)
            .map(|entry| entry.value)
    }

    /// Parses the `total_` lines of a `memory.stat` file.
    ///
    /// Lines that are not totals, that overflow the scan buffer, or that do not hold a
    /// `label value` pair are skipped; only I/O failures abort the read.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if reading from `buf` fails.
    pub fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut totals = MemoryTotals::default();
        let mut line = String::new();
        let mut lineno = 0;

        loop {
            let status = fsutil::read_bounded_line(buf, &mut line, LINE_CAPACITY)?;
            lineno += 1;
            match status {
                LineRead::Eof => break,
                LineRead::Truncated => {
                    log::debug!("skipping overlong memory.stat line {lineno}");
                    continue;
                }
                LineRead::Complete => {}
            }

            if !line.starts_with(TOTAL_PREFIX) {
                continue;
            }
            match parse_total_line(&line) {
                Some(entry) => totals.entries.push(entry),
                None => log::debug!("skipping malformed memory.stat line {lineno}: `{line}`"),
            }
        }

        Ok(totals)
    }
}

/// Rewrites characters that are awkward in metric names: `(` becomes `_`, while `)` and
/// `:` are dropped. Anything after the first newline is cut off.
pub fn sanitize_label(raw: &str) -> String {
    let raw = raw.split('\n').next().unwrap_or_default();
    raw.chars()
        .filter_map(|c| match c {
            '(' => Some('_'),
            ')' | ':' => None,
            c => Some(c),
        })
        .collect()
}

/// Turns one `total_<label> <value>` line into an entry.
fn parse_total_line(line: &str) -> Option<MemoryStatEntry> {
    let sanitized = sanitize_label(line);
    let mut parts = sanitized.split_whitespace();
    let label = parts.next()?.strip_prefix(TOTAL_PREFIX)?;
    let value = parts.next()?.parse::<u64>().ok()?;
    if label.is_empty() {
        return None;
    }

    Some(MemoryStatEntry {
        label: label.to_owned(),
        value,
    })
}

/// Represents the hard memory limit from `memory.limit_in_bytes`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryLimit {
    /// Memory usage limit in bytes. An unlimited cgroup reports a very large
    /// page-aligned value rather than a keyword.
    pub limit_bytes: u64,
}

impl SingleLineStat for MemoryLimit {
    /// Parses a `memory.limit_in_bytes` file.
    ///
    /// # Errors
    ///
    /// Returns an error of kind `std::io::ErrorKind::InvalidData` if the value cannot be parsed as a `u64`.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        Ok(MemoryLimit {
            limit_bytes: read_single_value(buf)?,
        })
    }
}

/// Number of times the memory limit was hit, from `memory.failcnt`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FailCount {
    pub count: u64,
}

impl SingleLineStat for FailCount {
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        Ok(FailCount {
            count: read_single_value(buf)?,
        })
    }
}
