use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use crate::emit::MetricsEmitter;
use crate::error::ResultOkLogExt;

use super::stats::{FailCount, MemoryTotals};
use super::utils;

const MEMORY_STAT_FILE: &str = "memory.stat";
const MEMORY_FAILCNT_FILE: &str = "memory.failcnt";

/// One reading of the memory controller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemorySample {
    pub totals: MemoryTotals,
    /// `None` if `memory.failcnt` could not be read this tick.
    pub failcnt: Option<u64>,
}

#[derive(Debug)]
enum StatSource {
    Unopened,
    Open(BufReader<File>),
    Closed,
}

/// Samples `memory.stat` and `memory.failcnt` of a cgroup v1 memory controller.
///
/// `memory.stat` stays open between ticks. If it cannot be opened on the first
/// sample, the sampler never produces anything.
#[derive(Debug)]
pub struct MemoryStatSampler {
    memory_path: PathBuf,
    stat: StatSource,
}

impl MemoryStatSampler {
    pub fn new(memory_path: impl Into<PathBuf>) -> Self {
        Self {
            memory_path: memory_path.into(),
            stat: StatSource::Unopened,
        }
    }

    /// Reads the current totals and fail count.
    ///
    /// Returns `None` if `memory.stat` is unavailable or unreadable.
    pub fn collect(&mut self) -> Option<MemorySample> {
        if let StatSource::Unopened = self.stat {
            self.stat = match utils::open_file(self.memory_path.join(MEMORY_STAT_FILE)) {
                Some(file) => StatSource::Open(file),
                None => StatSource::Closed,
            };
        }

        let StatSource::Open(file) = &mut self.stat else {
            return None;
        };
        let totals =
            utils::read_from_start(file, MemoryTotals::from_reader).ok_log(MEMORY_STAT_FILE)?;
        let failcnt =
            utils::read_stat_file::<FailCount>(self.memory_path.join(MEMORY_FAILCNT_FILE))
                .ok_log(MEMORY_FAILCNT_FILE)
                .map(|failcnt| failcnt.count);

        Some(MemorySample { totals, failcnt })
    }

    /// Samples once and publishes the `cgroup_memory_stats` section.
    pub fn sample(&mut self, emitter: &mut dyn MetricsEmitter) {
        let Some(sample) = self.collect() else {
            return;
        };

        emitter.section("cgroup_memory_stats");
        for entry in sample.totals.entries() {
            emitter.long(&entry.label, entry.value);
        }
        if let Some(failcnt) = sample.failcnt {
            emitter.long("failcnt", failcnt);
        }
        emitter.section_end();
    }
}
