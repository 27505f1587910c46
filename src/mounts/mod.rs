//! Locates cgroup v1 controller mount points from the process mount table.
mod error;
mod parser;
mod resolve;

pub use error::{Error, Result};
pub use parser::{MOUNT_FIELD_COUNT, MountEntry, ParseError, parse_mount_line};
pub use resolve::{ControllerMount, resolve_controller};

/// Default location of the mount table of the calling process.
pub const SELF_MOUNTS_PATH: &str = "/proc/self/mounts";
