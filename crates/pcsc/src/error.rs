//! Error types for the PC/SC client

use std::io;
use std::path::PathBuf;

use crate::protocol::{CommandCode, ResultCode};

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// PC/SC client errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The daemon socket could not be opened
    #[error("Cannot connect to the resource manager at {}: {source}", path.display())]
    Connect {
        /// Socket path
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// Reading from or writing to the daemon socket failed
    #[error("Transport error during {command}: {source}")]
    Transport {
        /// Command being exchanged
        command: CommandCode,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// A previous transport failure left the connection unusable
    #[error("Connection to the resource manager is broken")]
    ConnectionBroken,

    /// The daemon answered with a non-success result code
    #[error("{command} failed: {code}")]
    Protocol {
        /// Command that failed
        command: CommandCode,
        /// Raw result code
        code: ResultCode,
    },

    /// The daemon sent data violating the wire invariants
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// More readers reported than the table can hold
    #[error("Reader table capacity exceeded: {count} readers, capacity {capacity}")]
    CapacityExceeded {
        /// Number of readers reported
        count: usize,
        /// Table capacity
        capacity: usize,
    },

    /// An operation needed a reader and none was found
    #[error("No reader available")]
    NoReaderAvailable,

    /// A wait expired
    #[error("{command} timed out")]
    Timeout {
        /// Command that timed out
        command: CommandCode,
    },

    /// A spawned wait was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// The context has already been released
    #[error("Context already released")]
    ContextReleased,

    /// The card has already been disconnected
    #[error("Card already disconnected")]
    CardDisconnected,

    /// A caller-supplied argument is out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The backend does not implement the operation
    #[error("Operation not supported by this backend: {0}")]
    Unsupported(&'static str),

    /// APDU encoding or decoding failed
    #[error(transparent)]
    Apdu(#[from] smartcard_apdu::Error),

    /// Native PC/SC error
    #[cfg(feature = "native")]
    #[error("PC/SC error: {0}")]
    Native(#[from] pcsc::Error),
}

impl Error {
    /// Create a transport error for `command`
    pub const fn transport(command: CommandCode, source: io::Error) -> Self {
        Self::Transport { command, source }
    }

    /// Check a daemon result code, mapping failure to [`Error::Protocol`]
    pub fn check(command: CommandCode, rv: u32) -> Result<()> {
        let code = ResultCode(rv);
        if code.is_success() {
            Ok(())
        } else {
            Err(Self::Protocol { command, code })
        }
    }

    /// Raw result code carried by this error, if any
    pub fn result_code(&self) -> Option<ResultCode> {
        match self {
            Self::Protocol { code, .. } => Some(*code),
            Self::Timeout { .. } => Some(ResultCode::E_TIMEOUT),
            #[cfg(feature = "native")]
            Self::Native(e) => Some(ResultCode(*e as u32)),
            _ => None,
        }
    }

    /// Whether the connection must be re-established after this error
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Transport { .. } | Self::ConnectionBroken
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check() {
        assert!(Error::check(CommandCode::Connect, 0).is_ok());

        let err = Error::check(CommandCode::Connect, 0x8010_000C).unwrap_err();
        assert_eq!(err.result_code(), Some(ResultCode::E_NO_SMARTCARD));
        assert_eq!(
            err.to_string(),
            "Connect failed: No smart card inserted (0x8010000C)"
        );
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_transport_is_fatal() {
        let err = Error::transport(
            CommandCode::Transmit,
            io::Error::from(io::ErrorKind::UnexpectedEof),
        );
        assert!(err.is_fatal());
        assert!(err.to_string().starts_with("Transport error during Transmit"));
        assert!(Error::ConnectionBroken.is_fatal());
    }
}
