use std::path::PathBuf;

use crate::emit::MetricsEmitter;

use super::cpu::CpuUtilizationSampler;
use super::limits::{LimitReader, LimitSnapshot, SubsystemState};
use super::memory::MemoryStatSampler;

/// Entry point of the cgroup subsystem.
///
/// Discovery happens once in [`CgroupMonitor::init`]. When the process is not confined
/// by cgroup v1 controllers the monitor stays disabled: queries report no limits, every
/// CPU counts as allowed, and sampling emits nothing.
#[derive(Debug, Default)]
pub struct CgroupMonitor {
    state: SubsystemState,
    cpu: Option<CpuUtilizationSampler>,
    memory: Option<MemoryStatSampler>,
}

impl CgroupMonitor {
    /// Discovers the controllers listed in the mount table at `mounts_path`.
    pub fn init(mounts_path: impl Into<PathBuf>) -> Self {
        Self::from_state(LimitReader::new(mounts_path).init())
    }

    pub fn from_state(state: SubsystemState) -> Self {
        let (cpu, memory) = match state.resolved() {
            Some(resolved) => (
                Some(CpuUtilizationSampler::new(&resolved.paths.cpuacct)),
                Some(MemoryStatSampler::new(&resolved.paths.memory)),
            ),
            None => (None, None),
        };
        Self { state, cpu, memory }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    /// The limits read at startup, if the subsystem is enabled.
    pub fn limits(&self) -> Option<&LimitSnapshot> {
        self.state.resolved().map(|resolved| &resolved.limits)
    }

    /// See [`SubsystemState::is_allowed_cpu`].
    pub fn is_allowed_cpu(&self, cpu: u32) -> bool {
        self.state.is_allowed_cpu(cpu)
    }

    /// Emits the `cgroup_config` section, or nothing when disabled.
    pub fn report_config(&self, emitter: &mut dyn MetricsEmitter) {
        if let Some(resolved) = self.state.resolved() {
            resolved.report(emitter);
        }
    }

    /// See [`CpuUtilizationSampler::sample`].
    pub fn sample_cpu(&mut self, elapsed_secs: f64, emit: bool, emitter: &mut dyn MetricsEmitter) {
        if let Some(cpu) = self.cpu.as_mut() {
            cpu.sample(elapsed_secs, emit, emitter);
        }
    }

    /// See [`MemoryStatSampler::sample`].
    pub fn sample_memory(&mut self, emitter: &mut dyn MetricsEmitter) {
        if let Some(memory) = self.memory.as_mut() {
            memory.sample(emitter);
        }
    }
}
