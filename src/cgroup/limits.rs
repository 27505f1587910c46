use std::path::{Path, PathBuf};

use crate::emit::MetricsEmitter;
use crate::mounts;

use super::cpuset::{CpuSet, CpuSetError};
use super::stats::MemoryLimit;
use super::utils;

const MEMORY_CONTROLLER: &str = "memory";
/// Distributions disagree on the order in which the joint cpu/cpuacct hierarchy lists its controllers.
const CPUACCT_CONTROLLERS: [&str; 2] = ["cpu,cpuacct", "cpuacct,cpu"];
const CPUSET_CONTROLLER: &str = "cpuset";

const MEMORY_LIMIT_FILE: &str = "memory.limit_in_bytes";
const CPUSET_CPUS_FILE: &str = "cpuset.cpus";

/// Reasons for running with the cgroup subsystem disabled.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("could not find the `{controller}` cgroup path: {source}")]
    Mount {
        controller: &'static str,
        #[source]
        source: mounts::Error,
    },
    #[error("could not read the memory limit from `{path}`: {source}")]
    MemoryLimit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("memory limit in `{path}` is zero")]
    ZeroMemoryLimit { path: PathBuf },
    #[error("could not read the cpus from `{path}`: {source}")]
    CpuSetRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse the cpus from `{path}`: {source}")]
    CpuSetParse {
        path: PathBuf,
        #[source]
        source: CpuSetError,
    },
}

/// Mount points of the three controllers the monitor depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerPaths {
    pub memory: PathBuf,
    pub cpuacct: PathBuf,
    pub cpuset: PathBuf,
}

/// Static limits the process is confined to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitSnapshot {
    /// Memory ceiling; never zero.
    pub memory_limit_bytes: u64,
    /// CPUs the process may run on; never empty.
    pub allowed_cpus: CpuSet,
}

/// Everything discovered by a successful [`LimitReader::init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCgroup {
    pub paths: ControllerPaths,
    pub limits: LimitSnapshot,
}

impl ResolvedCgroup {
    /// Emits the `cgroup_config` section describing the discovered controllers and limits.
    pub fn report(&self, emitter: &mut dyn MetricsEmitter) {
        emitter.section("cgroup_config");
        emitter.string("memory_path", &self.paths.memory.to_string_lossy());
        emitter.string("cpuacct_path", &self.paths.cpuacct.to_string_lossy());
        emitter.string("cpuset_path", &self.paths.cpuset.to_string_lossy());
        emitter.string("cpus", &self.limits.allowed_cpus.to_string());
        emitter.long("memory_limit_bytes", self.limits.memory_limit_bytes);
        emitter.section_end();
    }
}

/// Whether cgroup-aware monitoring is active. Decided once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubsystemState {
    #[default]
    Disabled,
    Enabled(ResolvedCgroup),
}

impl SubsystemState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, SubsystemState::Enabled(_))
    }

    pub fn resolved(&self) -> Option<&ResolvedCgroup> {
        match self {
            SubsystemState::Enabled(resolved) => Some(resolved),
            SubsystemState::Disabled => None,
        }
    }

    /// Returns `true` if the process may run on `cpu`.
    ///
    /// Without cgroup confinement every CPU is allowed.
    pub fn is_allowed_cpu(&self, cpu: u32) -> bool {
        match self {
            SubsystemState::Disabled => true,
            SubsystemState::Enabled(resolved) => resolved.limits.allowed_cpus.contains(cpu),
        }
    }
}

/// Discovers the cgroup v1 controllers and static limits of the current process.
#[derive(Debug, Clone)]
pub struct LimitReader {
    mounts_path: PathBuf,
}

impl Default for LimitReader {
    fn default() -> Self {
        Self::new(mounts::SELF_MOUNTS_PATH)
    }
}

impl LimitReader {
    /// Creates a reader that scans the given mount table.
    pub fn new(mounts_path: impl Into<PathBuf>) -> Self {
        Self {
            mounts_path: mounts_path.into(),
        }
    }

    /// Runs discovery and decides the subsystem state.
    ///
    /// Any failure disables the subsystem; the reason is logged at debug level.
    pub fn init(&self) -> SubsystemState {
        match self.try_init() {
            Ok(resolved) => {
                log::info!(
                    "Found cgroup limits: cpus={}, memory_limit_bytes={}",
                    resolved.limits.allowed_cpus,
                    resolved.limits.memory_limit_bytes
                );
                SubsystemState::Enabled(resolved)
            }
            Err(err) => {
                log::debug!("{err}. CGroup mode disabled.");
                SubsystemState::Disabled
            }
        }
    }

    /// Resolves all three controllers, then reads the memory ceiling and the allowed CPUs.
    ///
    /// # Errors
    ///
    /// Returns the first [`InitError`] encountered; no partial result is produced.
    pub fn try_init(&self) -> Result<ResolvedCgroup, InitError> {
        let memory = self.resolve(MEMORY_CONTROLLER)?;
        let cpuacct = self.resolve_cpuacct()?;
        let cpuset = self.resolve(CPUSET_CONTROLLER)?;

        let memory_limit_bytes = read_memory_limit(&memory)?;
        let allowed_cpus = read_allowed_cpus(&cpuset)?;

        Ok(ResolvedCgroup {
            paths: ControllerPaths {
                memory,
                cpuacct,
                cpuset,
            },
            limits: LimitSnapshot {
                memory_limit_bytes,
                allowed_cpus,
            },
        })
    }

    fn resolve(&self, controller: &'static str) -> Result<PathBuf, InitError> {
        mounts::resolve_controller(&self.mounts_path, controller)
            .map(mounts::ControllerMount::into_mount_path)
            .map_err(|source| InitError::Mount { controller, source })
    }

    fn resolve_cpuacct(&self) -> Result<PathBuf, InitError> {
        let [preferred, alternate] = CPUACCT_CONTROLLERS;
        self.resolve(preferred).or_else(|err| {
            log::debug!("{err}; retrying as `{alternate}`");
            self.resolve(alternate)
        })
    }
}

fn read_memory_limit(memory_path: &Path) -> Result<u64, InitError> {
    let path = memory_path.join(MEMORY_LIMIT_FILE);
    let limit: MemoryLimit =
        utils::read_stat_file(&path).map_err(|source| InitError::MemoryLimit {
            path: path.clone(),
            source,
        })?;

    if limit.limit_bytes == 0 {
        return Err(InitError::ZeroMemoryLimit { path });
    }
    Ok(limit.limit_bytes)
}

fn read_allowed_cpus(cpuset_path: &Path) -> Result<CpuSet, InitError> {
    let path = cpuset_path.join(CPUSET_CPUS_FILE);
    let contents = std::fs::read_to_string(&path).map_err(|source| InitError::CpuSetRead {
        path: path.clone(),
        source,
    })?;
    contents
        .parse::<CpuSet>()
        .map_err(|source| InitError::CpuSetParse { path, source })
}
