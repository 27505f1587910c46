//! Resource limits and utilization of the current process under cgroup v1.
//!
//! At startup the `memory`, `cpuacct` and `cpuset` controllers are located through the
//! mount table and the static limits are read. If any step fails the subsystem stays
//! disabled for the lifetime of the process. Otherwise it can be sampled periodically
//! for per-CPU utilization and memory statistics.
//!
//! # Key Components
//!
//! - [`LimitReader`]: controller discovery and the startup limit snapshot.
//! - [`CpuUtilizationSampler`]: per-CPU user/system utilization from `cpuacct` counters.
//! - [`MemoryStatSampler`]: hierarchical `memory.stat` totals and `memory.failcnt`.
//! - [`CgroupMonitor`]: ties the above together behind a single entry point.
//!
//! # Files Read
//!
//! - `memory.limit_in_bytes`, `memory.stat`, `memory.failcnt`
//! - `cpuacct.usage_percpu_user` and `cpuacct.usage_percpu_sys`, or `cpuacct.usage_percpu`
//! - `cpuset.cpus`
mod cpu;
mod cpuset;
mod limits;
mod memory;
mod monitor;
pub mod stats;
mod utils;

pub use cpu::{CoreUtilization, CounterLayout, CpuUtilizationSampler, MIN_ELAPSED_SECS};
pub use cpuset::{CpuSet, CpuSetError, MAX_CPU_ID};
pub use limits::{
    ControllerPaths, InitError, LimitReader, LimitSnapshot, ResolvedCgroup, SubsystemState,
};
pub use memory::{MemorySample, MemoryStatSampler};
pub use monitor::CgroupMonitor;
