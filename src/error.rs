use std::{
    io,
    path::{Path, PathBuf},
};

use crate::query::{ParseError, TokenizeError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("`{}` does not exist", .0.display())]
    NotFound(PathBuf),
    #[error("`{}` already exists", .0.display())]
    Exists(PathBuf),
    #[error("`{}` is the only reference to its directory", .0.display())]
    IsADirectory(PathBuf),
    #[error("`{}` is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("`{}` cannot be hard linked across filesystems", .0.display())]
    CrossDevice(PathBuf),
    #[error("{0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Failed to {op} `{}`: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Classify an I/O error from operation `op` on `path`.
    pub(crate) fn io<P>(op: &'static str, path: P, source: io::Error) -> Self
    where
        P: Into<PathBuf>,
    {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path),
            io::ErrorKind::AlreadyExists => Error::Exists(path),
            io::ErrorKind::NotADirectory => Error::NotADirectory(path),
            io::ErrorKind::CrossesDevices => Error::CrossDevice(path),
            _ => Error::Io { op, path, source },
        }
    }

    pub(crate) fn invalid<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Error::InvalidArgument(message.into())
    }

    pub fn is_exists(&self) -> bool {
        matches!(self, Error::Exists(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// The path the error is about, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Error::NotFound(path)
            | Error::Exists(path)
            | Error::IsADirectory(path)
            | Error::NotADirectory(path)
            | Error::CrossDevice(path)
            | Error::Io { path, .. } => Some(path),
            Error::InvalidArgument(_) | Error::Tokenize(_) | Error::Parse(_) => None,
        }
    }
}

/// Attach an operation name and path to `std::io::Result`s.
pub(crate) trait IoResultExt<T> {
    fn during<P>(self, op: &'static str, path: P) -> Result<T>
    where
        P: AsRef<Path>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn during<P>(self, op: &'static str, path: P) -> Result<T>
    where
        P: AsRef<Path>,
    {
        self.map_err(|e| Error::io(op, path.as_ref(), e))
    }
}
