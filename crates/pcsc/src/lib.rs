//! pcsc-lite client speaking the daemon's Unix socket protocol
//!
//! The crate talks to `pcscd` directly, without linking the system PC/SC
//! library:
//!
//! - [`PcscLiteClient`] frames the fixed-size request/reply structs over the
//!   daemon socket and implements [`ResourceManager`]
//! - [`Context`] owns one session and keeps the daemon's reader-state table
//! - [`Reader`] is a snapshot of one table entry
//! - [`Card`] is a connected card that carries APDUs through
//!   [`smartcard_apdu::CardTransport`]
//!
//! # Features
//!
//! - `native`: [`backend::NativeBackend`], the same API on top of the
//!   platform PC/SC library
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use smartcard_pcsc::{Context, Scope};
//! use smartcard_pcsc::apdu::{CardTransport, Command};
//!
//! let context = Context::establish(Scope::User)?;
//! let reader = context.wait_for_card_present()?;
//! println!("Card in {}: {}", reader.name(), reader.atr().unwrap_or_default());
//!
//! let mut card = reader.connect()?;
//! let select = Command::new_with_data(0x00, 0xA4, 0x04, 0x00, hex::decode("90725A9E3B1070AA")?);
//! let response = card.transmit_apdu(&select)?;
//! println!("{response}");
//!
//! card.disconnect()?;
//! context.release()?;
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

pub mod backend;
pub mod protocol;

mod card;
mod client;
mod config;
mod context;
mod error;
mod reader;
mod table;
mod wait;

/// APDU codec used by [`Card`]
pub use smartcard_apdu as apdu;

pub use backend::{CardHandle, ContextId, ResourceManager};
pub use card::Card;
pub use client::PcscLiteClient;
pub use config::{
    ClientConfig, Disposition, Protocol, Protocols, Scope, ShareMode, WaitStrategy,
    default_socket_path,
};
pub use context::Context;
pub use error::{Error, Result};
pub use protocol::{CommandCode, ResultCode};
pub use reader::Reader;
pub use table::{ReaderFlags, ReaderStateTable};
pub use wait::{CancellationToken, CardWait};

/// Prelude module containing commonly used types
pub mod prelude {
    pub use crate::apdu::{CardTransport, Command, Response, StatusWord};
    pub use crate::{
        Card, ClientConfig, Context, Error, Reader, ReaderFlags, Result, Scope, WaitStrategy,
    };
}
