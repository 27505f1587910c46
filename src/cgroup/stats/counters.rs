//! Parsing of the per-CPU cumulative time counters exposed by the cgroup v1 `cpuacct` controller.
//!
//! The files `cpuacct.usage_percpu`, `cpuacct.usage_percpu_user` and
//! `cpuacct.usage_percpu_sys` all share one format: a single line of
//! space-separated nanosecond counters, one per possible CPU, in CPU order.
//!
//! ```rust
//! use cgmeter::cgroup::stats::{PerCpuCounters, SingleLineStat};
//!
//! let data = "1200000 0 88000000 \n";
//! let counters = PerCpuCounters::from_reader(&mut data.as_bytes()).unwrap();
//! assert_eq!(counters.as_slice(), &[1_200_000, 0, 88_000_000]);
//! ```

use std::io::BufRead;

use crate::fsutil::{self, LineRead};

use super::{SingleLineStat, StatParseError};

/// Scan capacity for a counter line: 20 digits and a separator for each of up to 8192
/// possible CPUs, rounded up.
pub const COUNTER_LINE_CAPACITY: usize = 256 * 1024;

/// Cumulative nanosecond counters for each CPU, indexed by CPU id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PerCpuCounters {
    values: Vec<u64>,
}

impl PerCpuCounters {
    /// Number of CPUs reported by the file.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.values
    }
}

impl SingleLineStat for PerCpuCounters {
    /// Parses a `cpuacct.usage_percpu*` line.
    ///
    /// # Errors
    ///
    /// Returns an error of kind `InvalidData` if the line is empty, too long, or holds a
    /// value that is not an unsigned 64-bit integer.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut line = String::new();
        if fsutil::read_bounded_line(buf, &mut line, COUNTER_LINE_CAPACITY)? == LineRead::Truncated {
            return Err(StatParseError::LineTooLong { line: 1 }.into());
        }

        let values = line
            .split_whitespace()
            .enumerate()
            .map(|(index, value)| {
                value
                    .parse::<u64>()
                    .map_err(|source| StatParseError::InvalidCounter {
                        index,
                        value: value.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if values.is_empty() {
            return Err(StatParseError::EmptyCounters.into());
        }

        Ok(Self { values })
    }
}
