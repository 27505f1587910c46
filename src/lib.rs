//! cgmeter: resource limits and utilization of a process confined by cgroup v1.
//!
//! At startup the library locates the `memory`, `cpuacct` and `cpuset` controllers
//! through the mount table and reads the static limits: the memory ceiling and the
//! set of CPUs the process may run on. It then samples per-CPU utilization and
//! memory statistics at a fixed interval and reports them as JSON.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use cgroup::CgroupMonitor;
use config::Config;
use emit::JsonEmitter;

pub mod cgroup;
pub mod config;
pub mod emit;
pub mod error;
pub mod fsutil;
pub mod mounts;

/// One line of output.
#[derive(Debug, serde::Serialize)]
pub struct TickReport {
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    pub metrics: serde_json::Value,
}

/// Runs the sampler.
///
/// Prints the `cgroup_config` section once, then one JSON document per tick on
/// stdout. The first tick only establishes CPU counter baselines. If the process is not
/// confined by cgroup v1 the limits are logged as absent and the loop still runs,
/// printing empty metrics.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the sampling task panics,
/// or stdout cannot be written.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    log::debug!("Using {config:?}");

    let mounts_path = config.mounts_path.clone();
    let mut monitor =
        tokio::task::spawn_blocking(move || CgroupMonitor::init(mounts_path)).await?;
    if !monitor.is_enabled() {
        log::info!("No cgroup v1 limits found; cgroup sampling disabled");
    }

    let mut emitter = JsonEmitter::default();
    monitor.report_config(&mut emitter);
    print_report(emitter.take())?;

    let mut interval = tokio::time::interval(config.interval);
    let mut last = Instant::now();
    let mut tick: u64 = 0;
    loop {
        if config.samples.is_some_and(|samples| tick >= samples) {
            return Ok(());
        }
        interval.tick().await;

        let now = Instant::now();
        let elapsed_secs = now.duration_since(last).as_secs_f64();
        last = now;
        let emit = tick > 0;
        log::trace!("Sampling tick {tick} after {elapsed_secs:.3}s");

        let (returned, metrics) = tokio::task::spawn_blocking(move || {
            let mut emitter = JsonEmitter::default();
            let before = Instant::now();
            monitor.sample_cpu(elapsed_secs, emit, &mut emitter);
            monitor.sample_memory(&mut emitter);
            log::trace!("sampling took {} nanoseconds", before.elapsed().as_nanos());
            (monitor, emitter.take())
        })
        .await?;
        monitor = returned;

        print_report(metrics)?;
        tick += 1;
    }
}

fn print_report(metrics: serde_json::Value) -> Result<(), Box<dyn std::error::Error>> {
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let report = TickReport { timestamp, metrics };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}
