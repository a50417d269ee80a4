//! Error taxonomy shared by every layer of the crate
//!
//! Raw OS errors are classified right where the syscall fails (see [`Error::from_errno`]).
//! Everything above the capture strategies only ever matches on these variants.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Generic failure, not worth retrying
    #[error("{0}")]
    Failure(String),

    /// Device is held by another process or in a conflicting mode
    #[error("device or resource busy")]
    Busy,

    /// Parameter or format rejected by the driver
    #[error("invalid argument: {0}")]
    Invalid(String),

    /// Device I/O error, the caller may retry
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No data within the requested wait window
    #[error("timed out")]
    Timeout,

    /// The device lacks a capability the caller asked for
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Path does not name a character device
    #[error("{} is not a character device", .0.display())]
    NotADevice(PathBuf),

    /// Device path exceeds the maximum supported length
    #[error("device path longer than {max} bytes")]
    PathTooLong { max: usize },

    /// Operation issued in the wrong camera or frame state
    #[error("invalid state: {0}")]
    State(&'static str),

    /// A decompressor or converter could not handle its input
    #[error("decode error: {0}")]
    Decode(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Classifies the failure of syscall `op`
    ///
    /// `EBUSY` and `EINVAL` get their own variants, `EIO` stays an I/O error so callers can
    /// retry. Every other errno collapses into [`Error::Failure`].
    pub fn from_errno(op: &str, err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::EBUSY) => Error::Busy,
            Some(libc::EINVAL) => Error::Invalid(format!("{}: {}", op, err)),
            Some(libc::EIO) => Error::Io(err),
            _ => Error::Failure(format!("{}: {}", op, err)),
        }
    }

    /// Whether trying the next format or mode candidate makes sense
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Invalid(_) | Error::NotSupported(_))
    }
}

impl From<jpeg_decoder::Error> for Error {
    fn from(e: jpeg_decoder::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_classification() {
        let busy = io::Error::from_raw_os_error(libc::EBUSY);
        assert!(matches!(Error::from_errno("VIDIOC_S_FMT", busy), Error::Busy));

        let inval = io::Error::from_raw_os_error(libc::EINVAL);
        assert!(matches!(
            Error::from_errno("VIDIOC_S_FMT", inval),
            Error::Invalid(_)
        ));

        let eio = io::Error::from_raw_os_error(libc::EIO);
        match Error::from_errno("read", eio) {
            Error::Io(e) => assert_eq!(e.raw_os_error(), Some(libc::EIO)),
            other => panic!("unexpected {:?}", other),
        }

        let nodev = io::Error::from_raw_os_error(libc::ENODEV);
        assert!(matches!(
            Error::from_errno("VIDIOC_DQBUF", nodev),
            Error::Failure(_)
        ));
    }
}
