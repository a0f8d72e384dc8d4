//! Error type for APDU encoding and decoding

/// Result alias used throughout the crate
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors raised while composing or parsing APDUs
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Response shorter than the two status bytes
    #[error("Malformed response: {0} bytes, at least 2 required")]
    MalformedResponse(usize),

    /// Command data does not fit a short APDU
    #[error("Command data too long: {0} bytes, at most 255 allowed")]
    DataTooLong(usize),

    /// Raw command bytes do not describe a valid short APDU
    #[error("Invalid command length: {0}")]
    InvalidCommandLength(usize),

    /// The underlying card connection failed
    #[error("Transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Create a transport error from anything displayable
    pub fn transport<E: core::fmt::Display>(error: E) -> Self {
        Self::Transport(error.to_string())
    }
}
