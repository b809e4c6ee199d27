//! Error types for the session core
//!
//! Failures are resolved locally: bootstrap returns a `SessionError`,
//! everything after bootstrap logs and skips.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the seat, hotplug and input collaborators
#[derive(Error, Debug)]
pub enum SessionError {
    /// Seat arbiter (libseat) failure
    #[error("seat: {0}")]
    Seat(String),

    /// Hotplug monitor (udev) failure
    #[error("hotplug: {0}")]
    Hotplug(String),

    /// Input decoding engine (libinput) failure
    #[error("input: {0}")]
    Input(String),

    /// A device node could not be opened or inspected
    #[error("device {path}: {message}")]
    Device { path: PathBuf, message: String },

    /// Descriptor level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation needs a bootstrapped session
    #[error("session is not bootstrapped")]
    NotBootstrapped,

    /// The collaborator was compiled out
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

impl SessionError {
    pub fn device(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Device {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_message() {
        let err = SessionError::device("/dev/dri/card0", "EACCES");
        assert_eq!(err.to_string(), "device /dev/dri/card0: EACCES");
    }

    #[test]
    fn test_io_conversion() {
        let err: SessionError = std::io::Error::from_raw_os_error(libc::ENODEV).into();
        assert!(matches!(err, SessionError::Io(_)));
    }
}
