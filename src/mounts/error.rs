use std::path::PathBuf;

use crate::fsutil;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    FileOpen(#[from] fsutil::FileOpenError),
    #[error("failed to read line for file `{path}`: {source}")]
    ReadLine {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse line {line} in file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: super::parser::ParseError,
    },
    #[error("line {line} in file `{path}` exceeds the scan buffer")]
    LineTooLong { path: PathBuf, line: usize },
    #[error("no cgroup mount for controller `{controller}` in file `{path}`")]
    MissingController { controller: String, path: PathBuf },
    #[error("cgroup controller `{controller}` is mounted at `{mount_point}`; process is not confined")]
    NotConfined {
        controller: String,
        mount_point: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
