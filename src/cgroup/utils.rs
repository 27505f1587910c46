use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use crate::fsutil;

use super::stats::SingleLineStat;

/// Rewinds a long-lived file handle to its start and applies the given reader function.
///
/// cgroup interface files regenerate their content on every read from offset zero,
/// so a handle can be reused across ticks instead of being reopened.
pub fn read_from_start<T, R>(
    file: &mut R,
    reader: impl FnOnce(&mut R) -> std::io::Result<T>,
) -> std::io::Result<T>
where
    R: BufRead + Seek,
{
    file.seek(SeekFrom::Start(0))?;
    reader(file)
}

/// Opens, parses and closes a single-value file.
pub fn read_stat_file<T: SingleLineStat>(path: impl AsRef<Path>) -> std::io::Result<T> {
    let mut buf = fsutil::open_file_reader(path).map_err(|err| err.source)?;
    T::from_reader(&mut buf)
}

/// Opens a file for repeated reading, logging the failure if it cannot be opened.
#[inline]
pub fn open_file(path: impl AsRef<Path>) -> Option<BufReader<File>> {
    fsutil::open_file_reader(path)
        .map_err(|err| log::debug!("{err}"))
        .ok()
}
