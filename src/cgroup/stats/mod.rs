//! Parsers for the cgroup v1 interface files read by the samplers and the limit reader.
//!
//! # Main types
//!
//! - [`PerCpuCounters`]: cumulative per-CPU nanosecond counters from `cpuacct.usage_percpu*`.
//! - [`MemoryTotals`]: hierarchy-wide `total_*` figures from `memory.stat`.
//! - [`MemoryLimit`] and [`FailCount`]: single-value memory files.
//!
//! Parsers return [`std::io::Result`]; format problems surface as
//! [`std::io::ErrorKind::InvalidData`] errors wrapping a [`StatParseError`].

mod counters;
mod error;
mod memory;
mod parser;

pub use counters::{COUNTER_LINE_CAPACITY, PerCpuCounters};
pub use error::StatParseError;
pub use memory::{FailCount, MemoryLimit, MemoryStatEntry, MemoryTotals, sanitize_label};
pub use parser::{SingleLineStat, read_single_value};
