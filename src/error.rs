use std::{io, path::PathBuf};

/// Errors that can occur when opening, writing to or closing a rotating log
/// file.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("Invalid path template '{0}'")]
    InvalidTemplate(String),
    #[error("Failed to create directory '{0}': {1}")]
    CreateDirectoryFailed(PathBuf, #[source] io::Error),
    #[error("Failed to create file '{0}': {1}")]
    CreateFileFailed(PathBuf, #[source] io::Error),
    #[error("Failed to stat file '{0}': {1}")]
    StatFileFailed(PathBuf, #[source] io::Error),
    #[error("Failed to set file permissions for '{path}': {error}")]
    SetFilePermissionsError { path: PathBuf, error: String },
    #[error("Failed to write to '{0}': {1}")]
    WriteFailed(PathBuf, #[source] io::Error),
    #[error("Failed to close '{0}': {1}")]
    CloseFailed(PathBuf, #[source] io::Error),
    /// Returned when writing through a writer that was never constructed.
    #[error("log file not opened")]
    Unopened,
    /// Returned when writing through a writer after [`close`] was called.
    ///
    /// [`close`]: crate::RotatingFileWriter::close
    #[error("log file '{0}' has been closed")]
    Closed(PathBuf),
}

impl WriterError {
    fn io_kind(&self) -> io::ErrorKind {
        match self {
            WriterError::CreateDirectoryFailed(_, err)
            | WriterError::CreateFileFailed(_, err)
            | WriterError::StatFileFailed(_, err)
            | WriterError::WriteFailed(_, err)
            | WriterError::CloseFailed(_, err) => err.kind(),
            WriterError::InvalidTemplate(_) => io::ErrorKind::InvalidInput,
            WriterError::Unopened | WriterError::Closed(_) => io::ErrorKind::NotConnected,
            WriterError::SetFilePermissionsError { .. } => io::ErrorKind::Other,
        }
    }
}

impl From<WriterError> for io::Error {
    fn from(err: WriterError) -> Self {
        io::Error::new(err.io_kind(), err)
    }
}
