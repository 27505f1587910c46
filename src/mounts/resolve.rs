use crate::fsutil::{self, LINE_CAPACITY, LineRead};

use super::parser::parse_mount_line;
use super::{Error, Result};
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// A cgroup controller together with the directory it is mounted at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerMount {
    controller: String,
    mount_path: PathBuf,
}

impl ControllerMount {
    /// The controller name that was searched for, e.g. `cpu,cpuacct`.
    pub fn controller(&self) -> &str {
        &self.controller
    }

    /// Directory holding the controller's interface files.
    pub fn mount_path(&self) -> &Path {
        &self.mount_path
    }

    pub fn into_mount_path(self) -> PathBuf {
        self.mount_path
    }
}

/// Resolves the mount point of a cgroup v1 controller by scanning a mount table.
///
/// The first record whose source is `cgroup` and whose mount options contain
/// `controller` decides the outcome. A mount point of `/` (or an empty one)
/// means the process is not confined by that controller.
///
/// The scan is strict: a single record without exactly six fields aborts the
/// whole lookup.
///
/// # Arguments
///
/// * `path` - Path to a mount table, normally `/proc/self/mounts`.
/// * `controller` - Substring to look for in the mount options.
///
/// # Errors
///
/// - [`Error::FileOpen`] if the file can't be opened.
/// - [`Error::ReadLine`] if reading from the file fails.
/// - [`Error::Parse`] or [`Error::LineTooLong`] on a malformed record.
/// - [`Error::NotConfined`] if the matching mount point is the root.
/// - [`Error::MissingController`] if no record matches.
///
/// # Example
///
/// ```no_run
/// use cgmeter::mounts::resolve_controller;
///
/// let cpuset = resolve_controller("/proc/self/mounts", "cpuset").unwrap();
/// println!("cpuset mounted at {}", cpuset.mount_path().display());
/// ```
pub fn resolve_controller(path: impl AsRef<Path>, controller: &str) -> Result<ControllerMount> {
    let path = path.as_ref();
    let mut buf = fsutil::open_file_reader(path)?;

    resolve_controller_from_reader(&mut buf, path, controller)
}

/// Internal implementation for resolving a controller from a reader.
///
/// `origin` is only used in error messages.
fn resolve_controller_from_reader<R: BufRead>(
    reader: &mut R,
    origin: &Path,
    controller: &str,
) -> Result<ControllerMount> {
    let mut line = String::with_capacity(256);
    let mut lineno = 0;

    loop {
        let status = fsutil::read_bounded_line(reader, &mut line, LINE_CAPACITY).map_err(
            |source| Error::ReadLine {
                path: origin.to_path_buf(),
                source,
            },
        )?;
        lineno += 1;
        match status {
            LineRead::Eof => break,
            LineRead::Truncated => {
                return Err(Error::LineTooLong {
                    path: origin.to_path_buf(),
                    line: lineno,
                });
            }
            LineRead::Complete => {}
        }

        let entry = parse_mount_line(&line).map_err(|source| Error::Parse {
            path: origin.to_path_buf(),
            line: lineno,
            source,
        })?;
        if !entry.is_cgroup_controller(controller) {
            continue;
        }

        if entry.fs_file.is_empty() || entry.fs_file == "/" {
            return Err(Error::NotConfined {
                controller: controller.to_owned(),
                mount_point: entry.fs_file.to_owned(),
            });
        }

        log::debug!(
            "Found `{}` cgroup controller mounted at {}",
            controller,
            entry.fs_file
        );
        return Ok(ControllerMount {
            controller: controller.to_owned(),
            mount_path: PathBuf::from(entry.fs_file),
        });
    }

    Err(Error::MissingController {
        controller: controller.to_owned(),
        path: origin.to_path_buf(),
    })
}
