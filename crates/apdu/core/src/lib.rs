//! Command and response types for ISO/IEC 7816-4 APDUs
//!
//! This crate provides the codec that sits between an application and a
//! card connection:
//!
//! - [`Command`] composes a short command APDU (CLA, INS, P1, P2, optional
//!   data with an implicit Lc byte, optional Le byte)
//! - [`Response`] splits a raw response into its data field and [`StatusWord`]
//! - [`CardTransport`] is the seam through which a connected card carries the
//!   raw bytes
//!
//! Nothing in here knows how the bytes reach the card.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod atr;
pub mod command;
pub mod response;
pub mod status;
pub mod transport;

mod error;
pub use error::{Error, Result};

pub use atr::Atr;
pub use command::{Command, MAX_SHORT_DATA_LEN};
pub use response::Response;
pub use status::StatusWord;
pub use transport::CardTransport;

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Atr, Bytes, BytesMut, CardTransport, Command, Error, Response, Result, StatusWord,
        status,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let cmd = Command::new(0x00, 0xA4, 0x04, 0x00);
        assert_eq!(cmd.cla, 0x00);
        assert_eq!(cmd.ins, 0xA4);
        assert_eq!(cmd.p1, 0x04);
        assert_eq!(cmd.p2, 0x00);

        let resp = Response::from_bytes(&[0x01, 0x02, 0x03, 0x90, 0x00]).unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.data(), &[0x01, 0x02, 0x03]);
        assert_eq!(resp.status(), StatusWord::new(0x90, 0x00));
    }
}
