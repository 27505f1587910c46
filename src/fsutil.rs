use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

/// Capacity used when scanning cgroup and mount table text files line by line.
pub const LINE_CAPACITY: usize = 8192;

/// Error that occurs when opening a file fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to open file `{path}`: {source}")]
pub struct FileOpenError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Opens a file at the given path and wraps it in a [`BufReader`].
///
/// # Errors
///
/// Returns a [`FileOpenError`] if the file cannot be opened.
///
/// # Example
/// ```no_run
/// # use cgmeter::fsutil;
/// let reader = fsutil::open_file_reader("/proc/self/mounts")?;
/// # Ok::<(), fsutil::FileOpenError>(())
/// ```
pub fn open_file_reader(path: impl AsRef<Path>) -> Result<BufReader<File>, FileOpenError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| FileOpenError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

/// Outcome of a single [`read_bounded_line`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRead {
    /// Nothing left to read.
    Eof,
    /// A whole line fit into the buffer.
    Complete,
    /// The line exceeded the capacity; the buffer holds only its prefix and the
    /// remainder of the line was consumed and dropped.
    Truncated,
}

/// Reads one line of at most `capacity` bytes into `line`, without the trailing newline.
///
/// Unlike [`BufRead::read_line`], a line longer than `capacity` never grows the buffer
/// past that size; the overflow is discarded and reported as [`LineRead::Truncated`]
/// so the caller can decide whether a partial line is acceptable. Invalid UTF-8 is
/// replaced lossily.
///
/// # Errors
///
/// Returns any I/O error raised by the underlying reader.
pub fn read_bounded_line<R: BufRead>(
    reader: &mut R,
    line: &mut String,
    capacity: usize,
) -> io::Result<LineRead> {
    line.clear();
    let mut bytes = Vec::with_capacity(capacity.min(256));
    let read = reader
        .by_ref()
        .take(capacity as u64)
        .read_until(b'\n', &mut bytes)?;
    if read == 0 {
        return Ok(LineRead::Eof);
    }

    let status = if bytes.last() == Some(&b'\n') {
        bytes.pop();
        LineRead::Complete
    } else if read < capacity {
        // last line without a trailing newline
        LineRead::Complete
    } else if discard_rest_of_line(reader)? == 0 {
        LineRead::Complete
    } else {
        LineRead::Truncated
    };

    line.push_str(&String::from_utf8_lossy(&bytes));
    Ok(status)
}

/// Consumes input up to and including the next newline.
///
/// Returns the number of bytes dropped, not counting the newline itself.
fn discard_rest_of_line<R: BufRead>(reader: &mut R) -> io::Result<usize> {
    let mut dropped = 0;
    loop {
        let (done, used) = {
            let available = reader.fill_buf()?;
            if available.is_empty() {
                return Ok(dropped);
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    dropped += pos;
                    (true, pos + 1)
                }
                None => {
                    dropped += available.len();
                    (false, available.len())
                }
            }
        };
        reader.consume(used);
        if done {
            return Ok(dropped);
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_open_file_reader_success() {
        let tmp = tempfile::NamedTempFile::new().expect("failed to create temp file");
        let path = tmp.path();
        let reader = open_file_reader(path).expect("should open test file");
        let metadata = reader.get_ref().metadata().unwrap();
        assert!(metadata.is_file());
    }

    #[test]
    fn test_open_file_reader_error() {
        let result = open_file_reader("/definitely/does/not/exist");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.path, PathBuf::from("/definitely/does/not/exist"));
        assert_eq!(err.source.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_bounded_lines_complete() {
        let mut reader = "first\nsecond\nlast".as_bytes();
        let mut line = String::new();

        assert_eq!(
            read_bounded_line(&mut reader, &mut line, 64).unwrap(),
            LineRead::Complete
        );
        assert_eq!(line, "first");
        assert_eq!(
            read_bounded_line(&mut reader, &mut line, 64).unwrap(),
            LineRead::Complete
        );
        assert_eq!(line, "second");
        assert_eq!(
            read_bounded_line(&mut reader, &mut line, 64).unwrap(),
            LineRead::Complete
        );
        assert_eq!(line, "last");
        assert_eq!(
            read_bounded_line(&mut reader, &mut line, 64).unwrap(),
            LineRead::Eof
        );
        assert!(line.is_empty());
    }

    #[test]
    fn test_bounded_line_truncated_then_resumes() {
        let mut reader = "0123456789abcdef\nnext\n".as_bytes();
        let mut line = String::new();

        assert_eq!(
            read_bounded_line(&mut reader, &mut line, 8).unwrap(),
            LineRead::Truncated
        );
        assert_eq!(line, "01234567");
        assert_eq!(
            read_bounded_line(&mut reader, &mut line, 8).unwrap(),
            LineRead::Complete
        );
        assert_eq!(line, "next");
    }

    #[test]
    fn test_bounded_line_exactly_capacity() {
        let mut reader = "abcd\nefgh".as_bytes();
        let mut line = String::new();

        assert_eq!(
            read_bounded_line(&mut reader, &mut line, 4).unwrap(),
            LineRead::Complete
        );
        assert_eq!(line, "abcd");
        assert_eq!(
            read_bounded_line(&mut reader, &mut line, 4).unwrap(),
            LineRead::Complete
        );
        assert_eq!(line, "efgh");
    }
}
