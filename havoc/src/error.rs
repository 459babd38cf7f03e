//! Error types for havoc.

use nix::errno::Errno;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HavocError>;

#[derive(Error, Debug)]
pub enum HavocError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("System call failed: {0}")]
    Sys(#[from] Errno),

    /// Bad worker count, tunable out of range, or nothing to run.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The shared counter table could not be created, sized or mapped.
    #[error("Shared memory error: {message}")]
    SharedMemory { message: String },

    /// Process creation failed.
    #[error("Cannot fork: {0}")]
    Spawn(Errno),

    /// A named operation inside a stressor failed with no retry path.
    #[error("{op} failed: {source}")]
    Operation {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A strided byte read back differently from what was written.
    #[error("detected memory error, offset: {offset}, expected: {expected:#04x}, got: {actual:#04x}")]
    Corruption { offset: usize, expected: u8, actual: u8 },

    #[error("Unexpected error: {message}")]
    Unexpected { message: String },
}

impl HavocError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig { message: message.into() }
    }

    pub fn shared_memory(message: impl Into<String>) -> Self {
        Self::SharedMemory { message: message.into() }
    }

    pub fn op(op: &'static str, source: std::io::Error) -> Self {
        Self::Operation { op, source }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected { message: message.into() }
    }

    /// Interrupted or would-block conditions: retry the same unit, never count it.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(e) | Self::Operation { source: e, .. } => {
                matches!(
                    e.kind(),
                    std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock
                )
            }
            Self::Sys(errno) | Self::Spawn(errno) => {
                matches!(*errno, Errno::EINTR | Errno::EAGAIN)
            }
            _ => false,
        }
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption { .. })
    }
}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::error::HavocError::config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_creation() {
        let err = HavocError::config("test message");
        assert!(matches!(err, HavocError::InvalidConfig { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_error_classification() {
        let interrupted = HavocError::op("write", io::Error::from(io::ErrorKind::Interrupted));
        assert!(interrupted.is_recoverable());

        let eagain = HavocError::Spawn(Errno::EAGAIN);
        assert!(eagain.is_recoverable());

        let enomem = HavocError::Spawn(Errno::ENOMEM);
        assert!(!enomem.is_recoverable());

        let corrupt = HavocError::Corruption { offset: 4096, expected: 0x03, actual: 0x02 };
        assert!(corrupt.is_corruption());
        assert!(!corrupt.is_recoverable());
    }

    #[test]
    fn test_corruption_message_names_offset() {
        let err = HavocError::Corruption { offset: 8192, expected: 0x0f, actual: 0x0e };
        let msg = err.to_string();
        assert!(msg.contains("offset: 8192"));
        assert!(msg.contains("got: 0x0e"));
    }

    #[test]
    fn test_error_macros() {
        let err = config_error!("Number of {} workers must be between 0 and {}", "cpu", 1024);
        assert!(matches!(err, HavocError::InvalidConfig { .. }));
        assert!(err.to_string().contains("cpu workers"));
    }
}
