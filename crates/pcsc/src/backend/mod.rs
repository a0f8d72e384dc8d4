//! Resource manager backends
//!
//! [`ResourceManager`] is the seam between the session types
//! ([`Context`](crate::Context), [`Reader`](crate::Reader),
//! [`Card`](crate::Card)) and whatever talks to the card service. The
//! socket client [`PcscLiteClient`](crate::PcscLiteClient) speaks the daemon
//! protocol directly; with the `native` feature, [`NativeBackend`] goes
//! through the platform PC/SC library instead.

#[cfg(feature = "native")]
mod native;

use std::fmt;
use std::time::Duration;

use derive_more::Display;

use crate::config::{Disposition, Protocol, Protocols, Scope, ShareMode};
use crate::table::ReaderStateTable;
use crate::{Error, Result};

#[cfg(feature = "native")]
pub use native::NativeBackend;

/// Daemon-issued context identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("{_0:#010x}")]
pub struct ContextId(pub u32);

/// Daemon-issued card handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("{_0:#010x}")]
pub struct CardHandle(pub i32);

/// Operations a card service backend provides
///
/// Every call is a synchronous round trip. Operations with a default body
/// are optional; backends that lack them report [`Error::Unsupported`].
pub trait ResourceManager: fmt::Debug + Send {
    /// Open a context in `scope`
    fn establish_context(&mut self, scope: Scope) -> Result<ContextId>;

    /// Close a context
    fn release_context(&mut self, context: ContextId) -> Result<()>;

    /// Refresh `table` from the service, returning the populated count
    fn sync_reader_states(&mut self, table: &mut ReaderStateTable) -> Result<usize>;

    /// Block until a reader state changes
    ///
    /// Fails with [`Error::Timeout`] once `timeout` expires.
    fn wait_reader_state_change(&mut self, timeout: Duration) -> Result<()>;

    /// Connect to the card in `reader`, named by its raw table bytes
    fn connect(
        &mut self,
        context: ContextId,
        reader: &[u8],
        share_mode: ShareMode,
        preferred: Protocols,
    ) -> Result<(CardHandle, Protocol)>;

    /// Close a card connection
    fn disconnect(&mut self, card: CardHandle, disposition: Disposition) -> Result<()>;

    /// Exchange an APDU, returning the number of bytes written to `recv`
    fn transmit(
        &mut self,
        card: CardHandle,
        protocol: Protocol,
        send: &[u8],
        recv: &mut [u8],
    ) -> Result<usize>;

    /// Re-establish a card connection, returning the new active protocol
    fn reconnect(
        &mut self,
        _card: CardHandle,
        _share_mode: ShareMode,
        _preferred: Protocols,
        _initialization: Disposition,
    ) -> Result<Protocol> {
        Err(Error::Unsupported("reconnect"))
    }

    /// Start an exclusive transaction
    fn begin_transaction(&mut self, _card: CardHandle) -> Result<()> {
        Err(Error::Unsupported("begin_transaction"))
    }

    /// End a transaction
    fn end_transaction(&mut self, _card: CardHandle, _disposition: Disposition) -> Result<()> {
        Err(Error::Unsupported("end_transaction"))
    }

    /// Send a reader control code, returning the number of bytes written to `recv`
    fn control(
        &mut self,
        _card: CardHandle,
        _code: u32,
        _send: &[u8],
        _recv: &mut [u8],
    ) -> Result<usize> {
        Err(Error::Unsupported("control"))
    }

    /// Check that the card handle is still valid
    fn status(&mut self, _card: CardHandle) -> Result<()> {
        Err(Error::Unsupported("status"))
    }

    /// Read a reader attribute, returning the number of bytes written to `buf`
    fn get_attribute(&mut self, _card: CardHandle, _attr: u32, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::Unsupported("get_attribute"))
    }

    /// Write a reader attribute
    fn set_attribute(&mut self, _card: CardHandle, _attr: u32, _value: &[u8]) -> Result<()> {
        Err(Error::Unsupported("set_attribute"))
    }

    /// Abort a blocking call on `context`
    fn cancel(&mut self, _context: ContextId) -> Result<()> {
        Err(Error::Unsupported("cancel"))
    }
}
