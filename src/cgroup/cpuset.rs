//! Parsing of cpuset range lists such as `0-3,8,10-11`.
//!
//! This is the format of `cpuset.cpus` (see
//! [`cpuset(7)`](https://man7.org/linux/man-pages/man7/cpuset.7.html), "List format").

use std::fmt;
use std::num::ParseIntError;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Highest CPU id accepted in a range list.
pub const MAX_CPU_ID: u32 = i32::MAX as u32;

#[derive(Debug, thiserror::Error)]
pub enum CpuSetError {
    #[error("cpu list is empty")]
    Empty,
    #[error("invalid cpu id `{value}`: {source}")]
    InvalidId {
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("cpu id {id} exceeds the maximum of 2147483647")]
    OutOfRange { id: u32 },
    #[error("cpu range `{start}-{end}` is reversed")]
    ReversedRange { start: u32, end: u32 },
}

/// A set of CPU ids, stored as sorted, disjoint, non-adjacent inclusive ranges.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CpuSet {
    ranges: Vec<RangeInclusive<u32>>,
}

impl CpuSet {
    fn from_ranges(mut ranges: Vec<RangeInclusive<u32>>) -> Self {
        ranges.sort_by_key(|range| *range.start());

        let mut merged: Vec<RangeInclusive<u32>> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if *range.start() <= last.end().saturating_add(1) => {
                    if range.end() > last.end() {
                        *last = *last.start()..=*range.end();
                    }
                }
                _ => merged.push(range),
            }
        }

        Self { ranges: merged }
    }

    pub fn contains(&self, cpu: u32) -> bool {
        let idx = self.ranges.partition_point(|range| *range.end() < cpu);
        self.ranges
            .get(idx)
            .is_some_and(|range| range.contains(&cpu))
    }

    /// Number of CPU ids in the set.
    pub fn len(&self) -> usize {
        self.ranges
            .iter()
            .map(|range| (range.end() - range.start()) as usize + 1)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Iterates over the ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().flat_map(|range| range.clone())
    }
}

fn parse_id(value: &str) -> Result<u32, CpuSetError> {
    let id = value
        .trim()
        .parse::<u32>()
        .map_err(|source| CpuSetError::InvalidId {
            value: value.to_owned(),
            source,
        })?;
    if id > MAX_CPU_ID {
        return Err(CpuSetError::OutOfRange { id });
    }
    Ok(id)
}

impl FromStr for CpuSet {
    type Err = CpuSetError;

    /// Parses a comma-separated list of ids and inclusive `a-b` ranges.
    ///
    /// Every entry must be valid; a list that yields no CPU at all is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CpuSetError::Empty);
        }

        let mut ranges = Vec::new();
        for item in s.split(',') {
            let range = match item.split_once('-') {
                Some((start, end)) => {
                    let start = parse_id(start)?;
                    let end = parse_id(end)?;
                    if start > end {
                        return Err(CpuSetError::ReversedRange { start, end });
                    }
                    start..=end
                }
                None => {
                    let id = parse_id(item)?;
                    id..=id
                }
            };
            ranges.push(range);
        }

        Ok(Self::from_ranges(ranges))
    }
}

impl fmt::Display for CpuSet {
    /// Formats the set in range-list form, e.g. `0-3,8`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if range.start() == range.end() {
                write!(f, "{}", range.start())?;
            } else {
                write!(f, "{}-{}", range.start(), range.end())?;
            }
        }
        Ok(())
    }
}
