//! Per-CPU utilization derived from the cumulative `cpuacct` counters.
//!
//! Each tick reads the nanosecond counters of every CPU and turns the growth
//! since the previous tick into a percentage of the elapsed wall time:
//!
//! ```text
//! percent = 100 * (current_ns - previous_ns) / (elapsed_secs * 1e9)
//! ```
//!
//! Newer kernels split the counters into `cpuacct.usage_percpu_user` and
//! `cpuacct.usage_percpu_sys`; older ones only provide the combined
//! `cpuacct.usage_percpu`, in which case only a `user` figure is produced.
//! Results are not clamped, so accounting skew can yield values above 100.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::emit::MetricsEmitter;
use crate::error::ResultOkLogExt;

use super::stats::{PerCpuCounters, SingleLineStat};
use super::utils;

/// Intervals at or below this length are too short to produce a meaningful rate.
pub const MIN_ELAPSED_SECS: f64 = 0.1;
const NANOS_PER_SEC: f64 = 1e9;

const USAGE_PERCPU_FILE: &str = "cpuacct.usage_percpu";
const USAGE_PERCPU_USER_FILE: &str = "cpuacct.usage_percpu_user";
const USAGE_PERCPU_SYS_FILE: &str = "cpuacct.usage_percpu_sys";

/// On-disk counter layout of the `cpuacct` controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterLayout {
    /// Separate user and system counter files.
    SplitUserSys,
    /// A single per-CPU counter covering both modes.
    CombinedOnly,
}

/// Utilization of one CPU over the last interval, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoreUtilization {
    pub cpu: usize,
    /// User mode share, or total share with [`CounterLayout::CombinedOnly`].
    pub user: f64,
    /// System mode share; only available with [`CounterLayout::SplitUserSys`].
    pub sys: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CoreCounters {
    user_ns: u64,
    sys_ns: Option<u64>,
}

impl CoreCounters {
    /// A counter still at zero cannot serve as a baseline.
    fn is_baseline(&self) -> bool {
        self.user_ns != 0 && self.sys_ns != Some(0)
    }
}

/// Per-CPU warm-up state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum CoreState {
    /// No usable baseline yet.
    #[default]
    Uninitialized,
    /// A baseline exists but no figure has been produced from it.
    Warmed(CoreCounters),
    /// Figures are being produced.
    Active(CoreCounters),
}

impl CoreState {
    fn baseline(&self) -> Option<CoreCounters> {
        match *self {
            CoreState::Uninitialized => None,
            CoreState::Warmed(counters) | CoreState::Active(counters) => Some(counters),
        }
    }

    /// Records `current` as the new baseline and returns the previous one if a figure
    /// should be computed this tick.
    fn advance(&mut self, current: CoreCounters, ready: bool) -> Option<CoreCounters> {
        let previous = self.baseline().filter(|_| ready);
        *self = match (*self, previous) {
            _ if !current.is_baseline() => CoreState::Uninitialized,
            (_, Some(_)) | (CoreState::Active(_), None) => CoreState::Active(current),
            _ => CoreState::Warmed(current),
        };
        previous
    }
}

#[derive(Debug)]
enum CounterSource {
    Unopened,
    Split {
        user: BufReader<File>,
        sys: BufReader<File>,
    },
    Combined {
        total: BufReader<File>,
    },
    /// Opening failed; the sampler stays idle for the rest of the process lifetime.
    Closed,
}

impl CounterSource {
    fn open(cpuacct_path: &Path) -> Self {
        if let Some(sys) = utils::open_file(cpuacct_path.join(USAGE_PERCPU_SYS_FILE)) {
            return match utils::open_file(cpuacct_path.join(USAGE_PERCPU_USER_FILE)) {
                Some(user) => CounterSource::Split { user, sys },
                None => CounterSource::Closed,
            };
        }

        match utils::open_file(cpuacct_path.join(USAGE_PERCPU_FILE)) {
            Some(total) => CounterSource::Combined { total },
            None => CounterSource::Closed,
        }
    }

    fn layout(&self) -> Option<CounterLayout> {
        match self {
            CounterSource::Split { .. } => Some(CounterLayout::SplitUserSys),
            CounterSource::Combined { .. } => Some(CounterLayout::CombinedOnly),
            CounterSource::Unopened | CounterSource::Closed => None,
        }
    }

    /// Reads one set of counters, or `None` if this tick has to be skipped.
    fn read(&mut self) -> Option<Vec<CoreCounters>> {
        match self {
            CounterSource::Split { user, sys } => {
                let sys = read_counters(sys, USAGE_PERCPU_SYS_FILE)?;
                let user = read_counters(user, USAGE_PERCPU_USER_FILE)?;
                if sys.len() != user.len() {
                    log::debug!(
                        "cpuacct user/sys counter counts differ ({} vs {}); skipping tick",
                        user.len(),
                        sys.len()
                    );
                    return None;
                }
                Some(
                    user.as_slice()
                        .iter()
                        .zip(sys.as_slice())
                        .map(|(&user_ns, &sys_ns)| CoreCounters {
                            user_ns,
                            sys_ns: Some(sys_ns),
                        })
                        .collect(),
                )
            }
            CounterSource::Combined { total } => {
                let total = read_counters(total, USAGE_PERCPU_FILE)?;
                Some(
                    total
                        .as_slice()
                        .iter()
                        .map(|&user_ns| CoreCounters {
                            user_ns,
                            sys_ns: None,
                        })
                        .collect(),
                )
            }
            CounterSource::Unopened | CounterSource::Closed => None,
        }
    }
}

fn read_counters(file: &mut BufReader<File>, name: &str) -> Option<PerCpuCounters> {
    utils::read_from_start(file, PerCpuCounters::from_reader).ok_log(name)
}

fn percent(previous_ns: u64, current_ns: u64, elapsed_secs: f64) -> Option<f64> {
    let delta = current_ns.checked_sub(previous_ns)?;
    Some(100.0 * delta as f64 / (elapsed_secs * NANOS_PER_SEC))
}

/// Stateful sampler turning `cpuacct` counters into per-CPU utilization figures.
#[derive(Debug)]
pub struct CpuUtilizationSampler {
    cpuacct_path: PathBuf,
    source: CounterSource,
    /// One entry per CPU; empty until the CPU count has been learned.
    cores: Vec<CoreState>,
}

impl CpuUtilizationSampler {
    /// Creates a sampler for the `cpuacct` controller mounted at `cpuacct_path`.
    ///
    /// No file is touched until the first sample.
    pub fn new(cpuacct_path: impl Into<PathBuf>) -> Self {
        Self {
            cpuacct_path: cpuacct_path.into(),
            source: CounterSource::Unopened,
            cores: Vec::new(),
        }
    }

    /// The detected counter layout, once the counter files have been opened.
    pub fn layout(&self) -> Option<CounterLayout> {
        self.source.layout()
    }

    /// Number of CPUs learned from the counter files, if any.
    pub fn core_count(&self) -> Option<usize> {
        (!self.cores.is_empty()).then_some(self.cores.len())
    }

    /// Reads the counters and updates the per-CPU baselines.
    ///
    /// Returns `None` if the tick was skipped: the counter files are unavailable or
    /// malformed, or the number of CPUs changed. A change in CPU count drops every
    /// baseline, so figures resume two ticks later.
    ///
    /// Otherwise returns the figures for every CPU that had a baseline, provided `emit`
    /// is set and `elapsed_secs` exceeds [`MIN_ELAPSED_SECS`]. Baselines are refreshed
    /// either way.
    pub fn collect(&mut self, elapsed_secs: f64, emit: bool) -> Option<Vec<CoreUtilization>> {
        if let CounterSource::Unopened = self.source {
            self.source = CounterSource::open(&self.cpuacct_path);
            match self.source.layout() {
                Some(layout) => log::debug!("Using {layout:?} cpuacct counters"),
                None => log::debug!(
                    "No cpuacct counters below {}; CPU sampling disabled",
                    self.cpuacct_path.display()
                ),
            }
        }

        let counters = self.source.read()?;
        if !self.cores.is_empty() && counters.len() != self.cores.len() {
            log::warn!(
                "cpuacct counter count changed from {} to {}; relearning",
                self.cores.len(),
                counters.len()
            );
            self.cores.clear();
            return None;
        }
        if self.cores.is_empty() {
            self.cores = vec![CoreState::default(); counters.len()];
        }

        let ready = emit && elapsed_secs > MIN_ELAPSED_SECS;
        let mut figures = Vec::new();
        for (cpu, (state, current)) in self.cores.iter_mut().zip(counters).enumerate() {
            let Some(previous) = state.advance(current, ready) else {
                continue;
            };
            let Some(user) = percent(previous.user_ns, current.user_ns, elapsed_secs) else {
                log::debug!("cpu{cpu} user counter went backwards");
                continue;
            };
            let sys = match (previous.sys_ns, current.sys_ns) {
                (Some(previous), Some(current)) => {
                    let Some(sys) = percent(previous, current, elapsed_secs) else {
                        log::debug!("cpu{cpu} sys counter went backwards");
                        continue;
                    };
                    Some(sys)
                }
                _ => None,
            };
            figures.push(CoreUtilization { cpu, user, sys });
        }

        Some(figures)
    }

    /// Samples once and, if `emit` is set, publishes the `cgroup_cpuacct_stats` section
    /// with one `cpu<N>` sub-section per CPU that produced a figure.
    pub fn sample(&mut self, elapsed_secs: f64, emit: bool, emitter: &mut dyn MetricsEmitter) {
        let Some(figures) = self.collect(elapsed_secs, emit) else {
            return;
        };
        if !emit {
            return;
        }

        emitter.section("cgroup_cpuacct_stats");
        for figure in &figures {
            emitter.sub(&format!("cpu{}", figure.cpu));
            emitter.double("user", figure.user);
            if let Some(sys) = figure.sys {
                emitter.double("sys", sys);
            }
            emitter.sub_end();
        }
        emitter.section_end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::JsonEmitter;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, values: &[u64]) {
        let line: String = values.iter().map(|v| format!("{v} ")).collect();
        fs::write(dir.path().join(name), format!("{line}\n")).unwrap();
    }

    fn split_dir(user: &[u64], sys: &[u64]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, USAGE_PERCPU_USER_FILE, user);
        write(&dir, USAGE_PERCPU_SYS_FILE, sys);
        dir
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_split_layout_rates() {
        let dir = split_dir(&[1_000, 2_000], &[100, 200]);
        let mut sampler = CpuUtilizationSampler::new(dir.path());

        assert_eq!(sampler.collect(1.0, true), Some(Vec::new()));
        assert_eq!(sampler.layout(), Some(CounterLayout::SplitUserSys));
        assert_eq!(sampler.core_count(), Some(2));

        write(&dir, USAGE_PERCPU_USER_FILE, &[251_001_000, 2_000]);
        write(&dir, USAGE_PERCPU_SYS_FILE, &[100, 500_000_200]);
        let figures = sampler.collect(1.0, true).unwrap();

        assert_eq!(figures.len(), 2);
        assert_eq!(figures[0].cpu, 0);
        assert_close(figures[0].user, 100.0 * 251_000_000.0 / 1e9);
        assert_close(figures[0].sys.unwrap(), 0.0);
        assert_eq!(figures[1].cpu, 1);
        assert_close(figures[1].user, 0.0);
        assert_close(figures[1].sys.unwrap(), 50.0);
    }

    #[test]
    fn test_rate_scales_with_elapsed_time() {
        let dir = split_dir(&[1_000], &[1_000]);
        let mut sampler = CpuUtilizationSampler::new(dir.path());
        sampler.collect(2.0, true);

        write(&dir, USAGE_PERCPU_USER_FILE, &[1_000_001_000]);
        write(&dir, USAGE_PERCPU_SYS_FILE, &[1_000]);
        let figures = sampler.collect(2.0, true).unwrap();
        assert_close(figures[0].user, 50.0);
    }

    #[test]
    fn test_combined_layout_reports_user_only() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, USAGE_PERCPU_FILE, &[10, 20, 30]);
        let mut sampler = CpuUtilizationSampler::new(dir.path());

        assert_eq!(sampler.collect(1.0, true), Some(Vec::new()));
        assert_eq!(sampler.layout(), Some(CounterLayout::CombinedOnly));

        write(&dir, USAGE_PERCPU_FILE, &[10, 100_000_020, 30]);
        let figures = sampler.collect(1.0, true).unwrap();
        assert_eq!(figures.len(), 3);
        assert!(figures.iter().all(|f| f.sys.is_none()));
        assert_close(figures[1].user, 10.0);
    }

    #[test]
    fn test_short_interval_is_not_emitted() {
        let dir = split_dir(&[1_000], &[1_000]);
        let mut sampler = CpuUtilizationSampler::new(dir.path());
        sampler.collect(1.0, true);

        write(&dir, USAGE_PERCPU_USER_FILE, &[50_000_000]);
        assert_eq!(sampler.collect(MIN_ELAPSED_SECS, true), Some(Vec::new()));
        assert_eq!(sampler.collect(0.05, true), Some(Vec::new()));

        // the baseline was refreshed by the skipped ticks
        write(&dir, USAGE_PERCPU_USER_FILE, &[150_000_000]);
        let figures = sampler.collect(1.0, true).unwrap();
        assert_close(figures[0].user, 10.0);
    }

    #[test]
    fn test_no_emit_still_refreshes_baseline() {
        let dir = split_dir(&[1_000], &[1_000]);
        let mut sampler = CpuUtilizationSampler::new(dir.path());
        assert_eq!(sampler.collect(1.0, false), Some(Vec::new()));

        write(&dir, USAGE_PERCPU_USER_FILE, &[900_000_000]);
        assert_eq!(sampler.collect(1.0, false), Some(Vec::new()));

        write(&dir, USAGE_PERCPU_USER_FILE, &[1_000_000_000]);
        let figures = sampler.collect(1.0, true).unwrap();
        assert_close(figures[0].user, 10.0);
    }

    #[test]
    fn test_zero_baseline_is_not_used() {
        let dir = split_dir(&[0, 1_000], &[0, 1_000]);
        let mut sampler = CpuUtilizationSampler::new(dir.path());
        sampler.collect(1.0, true);

        write(&dir, USAGE_PERCPU_USER_FILE, &[10_000_000, 2_000]);
        write(&dir, USAGE_PERCPU_SYS_FILE, &[10_000_000, 2_000]);
        let figures = sampler.collect(1.0, true).unwrap();
        assert_eq!(figures.len(), 1);
        assert_eq!(figures[0].cpu, 1);

        write(&dir, USAGE_PERCPU_USER_FILE, &[20_000_000, 3_000]);
        let figures = sampler.collect(1.0, true).unwrap();
        assert_eq!(figures.len(), 2);
        assert_close(figures[0].user, 1.0);
    }

    #[test]
    fn test_core_count_change_relearns() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, USAGE_PERCPU_FILE, &[1, 1, 1, 1]);
        let mut sampler = CpuUtilizationSampler::new(dir.path());
        sampler.collect(1.0, true);
        assert_eq!(sampler.core_count(), Some(4));

        write(&dir, USAGE_PERCPU_FILE, &[9, 9, 9, 9, 9, 9, 9, 9]);
        assert_eq!(sampler.collect(1.0, true), None);
        assert_eq!(sampler.core_count(), None);

        write(&dir, USAGE_PERCPU_FILE, &[10, 10, 10, 10, 10, 10, 10, 10]);
        assert_eq!(sampler.collect(1.0, true), Some(Vec::new()));
        assert_eq!(sampler.core_count(), Some(8));

        write(&dir, USAGE_PERCPU_FILE, &[20, 20, 20, 20, 20, 20, 20, 20]);
        assert_eq!(sampler.collect(1.0, true).unwrap().len(), 8);
    }

    #[test]
    fn test_values_above_hundred_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, USAGE_PERCPU_FILE, &[1]);
        let mut sampler = CpuUtilizationSampler::new(dir.path());
        sampler.collect(1.0, true);

        write(&dir, USAGE_PERCPU_FILE, &[1_200_000_001]);
        let figures = sampler.collect(1.0, true).unwrap();
        assert_close(figures[0].user, 120.0);
    }

    #[test]
    fn test_counter_going_backwards_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, USAGE_PERCPU_FILE, &[5_000, 5_000]);
        let mut sampler = CpuUtilizationSampler::new(dir.path());
        sampler.collect(1.0, true);

        write(&dir, USAGE_PERCPU_FILE, &[4_000, 6_000]);
        let figures = sampler.collect(1.0, true).unwrap();
        assert_eq!(figures.len(), 1);
        assert_eq!(figures[0].cpu, 1);
    }

    #[test]
    fn test_split_length_mismatch_skips_tick() {
        let dir = split_dir(&[1_000, 1_000], &[1_000, 1_000]);
        let mut sampler = CpuUtilizationSampler::new(dir.path());
        sampler.collect(1.0, true);

        write(&dir, USAGE_PERCPU_SYS_FILE, &[1_000]);
        assert_eq!(sampler.collect(1.0, true), None);
        assert_eq!(sampler.core_count(), Some(2));
    }

    #[test]
    fn test_malformed_counters_skip_tick() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, USAGE_PERCPU_FILE, &[1_000]);
        let mut sampler = CpuUtilizationSampler::new(dir.path());
        sampler.collect(1.0, true);

        fs::write(dir.path().join(USAGE_PERCPU_FILE), "garbage\n").unwrap();
        assert_eq!(sampler.collect(1.0, true), None);

        write(&dir, USAGE_PERCPU_FILE, &[100_001_000]);
        let figures = sampler.collect(1.0, true).unwrap();
        assert_close(figures[0].user, 10.0);
    }

    #[test]
    fn test_missing_files_disable_sampler_permanently() {
        let dir = tempfile::tempdir().unwrap();
        let mut sampler = CpuUtilizationSampler::new(dir.path());
        assert_eq!(sampler.collect(1.0, true), None);
        assert_eq!(sampler.layout(), None);

        write(&dir, USAGE_PERCPU_FILE, &[1_000]);
        assert_eq!(sampler.collect(1.0, true), None);
        assert_eq!(sampler.collect(1.0, true), None);
    }

    #[test]
    fn test_sys_without_user_file_closes_sampler() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, USAGE_PERCPU_SYS_FILE, &[1_000]);
        write(&dir, USAGE_PERCPU_FILE, &[1_000]);
        let mut sampler = CpuUtilizationSampler::new(dir.path());
        assert_eq!(sampler.collect(1.0, true), None);
        assert_eq!(sampler.layout(), None);
    }

    #[test]
    fn test_sample_emits_sections() {
        let dir = split_dir(&[1_000, 1_000], &[1_000, 1_000]);
        let mut sampler = CpuUtilizationSampler::new(dir.path());
        let mut emitter = JsonEmitter::default();

        sampler.sample(1.0, false, &mut emitter);
        assert_eq!(emitter.take(), json!({}));

        write(&dir, USAGE_PERCPU_USER_FILE, &[500_001_000, 1_000]);
        write(&dir, USAGE_PERCPU_SYS_FILE, &[250_001_000, 1_000]);
        sampler.sample(1.0, true, &mut emitter);
        assert_eq!(
            emitter.take(),
            json!({
                "cgroup_cpuacct_stats": {
                    "cpu0": {"user": 50.0, "sys": 25.0},
                    "cpu1": {"user": 0.0, "sys": 0.0},
                }
            })
        );
    }
}
