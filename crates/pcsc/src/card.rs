//! Connected card handle

use bytes::Bytes;
use smartcard_apdu::{Atr, CardTransport};
use tracing::{debug, trace};

use crate::backend::CardHandle;
use crate::config::{Disposition, Protocol, Protocols, ShareMode};
use crate::context::Context;
use crate::protocol::MAX_BUFFER_SIZE;
use crate::reader::Reader;
use crate::{Error, Result};

/// An open connection to the card in one reader
///
/// After [`disconnect`](Self::disconnect) every operation fails with
/// [`Error::CardDisconnected`]. A card dropped while still connected is
/// disconnected leaving the card as is.
#[derive(Debug)]
pub struct Card {
    context: Context,
    handle: CardHandle,
    protocol: Protocol,
    atr: Atr,
    reader: String,
    connected: bool,
}

impl Card {
    pub(crate) fn connect(reader: &Reader, share_mode: ShareMode, preferred: Protocols) -> Result<Self> {
        let context = reader.context().clone();
        let (handle, protocol) =
            context.connect(reader.entry().name_bytes(), share_mode, preferred)?;
        Ok(Self {
            context,
            handle,
            protocol,
            atr: Atr::from(reader.entry().atr()),
            reader: reader.name().to_owned(),
            connected: true,
        })
    }

    /// Answer To Reset seen when the card was connected
    pub const fn atr(&self) -> &Atr {
        &self.atr
    }

    /// Negotiated protocol
    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Handle issued by the resource manager
    pub const fn handle(&self) -> CardHandle {
        self.handle
    }

    /// Name of the reader holding the card
    pub fn reader_name(&self) -> &str {
        &self.reader
    }

    /// Whether [`disconnect`](Self::disconnect) has not been called yet
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    const fn ensure_connected(&self) -> Result<CardHandle> {
        if self.connected {
            Ok(self.handle)
        } else {
            Err(Error::CardDisconnected)
        }
    }

    /// Send a raw command APDU and return the raw response
    pub fn transmit(&self, command: &[u8]) -> Result<Bytes> {
        let handle = self.ensure_connected()?;
        let mut recv = vec![0u8; self.context.config().receive_capacity];
        let len = self
            .context
            .with_backend_mut(|backend, _| backend.transmit(handle, self.protocol, command, &mut recv))?;
        recv.truncate(len);
        Ok(Bytes::from(recv))
    }

    /// Send a reader control code and return the reader's reply
    pub fn control(&self, code: u32, data: &[u8]) -> Result<Bytes> {
        let handle = self.ensure_connected()?;
        let mut recv = vec![0u8; MAX_BUFFER_SIZE];
        let len = self
            .context
            .with_backend_mut(|backend, _| backend.control(handle, code, data, &mut recv))?;
        recv.truncate(len);
        Ok(Bytes::from(recv))
    }

    /// Check that the connection is still valid
    pub fn status(&self) -> Result<()> {
        let handle = self.ensure_connected()?;
        self.context.with_backend_mut(|backend, _| backend.status(handle))
    }

    /// Read a reader attribute
    pub fn get_attribute(&self, attr: u32) -> Result<Bytes> {
        let handle = self.ensure_connected()?;
        let mut buf = vec![0u8; MAX_BUFFER_SIZE];
        let len = self
            .context
            .with_backend_mut(|backend, _| backend.get_attribute(handle, attr, &mut buf))?;
        buf.truncate(len);
        Ok(Bytes::from(buf))
    }

    /// Write a reader attribute
    pub fn set_attribute(&self, attr: u32, value: &[u8]) -> Result<()> {
        let handle = self.ensure_connected()?;
        self.context
            .with_backend_mut(|backend, _| backend.set_attribute(handle, attr, value))
    }

    /// Start an exclusive transaction
    pub fn begin_transaction(&self) -> Result<()> {
        let handle = self.ensure_connected()?;
        self.context
            .with_backend_mut(|backend, _| backend.begin_transaction(handle))
    }

    /// End the current transaction
    pub fn end_transaction(&self, disposition: Disposition) -> Result<()> {
        let handle = self.ensure_connected()?;
        self.context
            .with_backend_mut(|backend, _| backend.end_transaction(handle, disposition))
    }

    /// Re-establish the connection, returning the new protocol
    pub fn reconnect(
        &mut self,
        share_mode: ShareMode,
        preferred: Protocols,
        initialization: Disposition,
    ) -> Result<Protocol> {
        let handle = self.ensure_connected()?;
        let protocol = self.context.with_backend_mut(|backend, _| {
            backend.reconnect(handle, share_mode, preferred, initialization)
        })?;
        debug!(card = %handle, %protocol, "Card reconnected");
        self.protocol = protocol;
        Ok(protocol)
    }

    /// Disconnect with the context's configured disposition
    pub fn disconnect(&mut self) -> Result<()> {
        self.disconnect_with(self.context.config().disposition)
    }

    /// Disconnect applying `disposition` to the card
    ///
    /// The handle is invalidated even when the resource manager reports an
    /// error.
    pub fn disconnect_with(&mut self, disposition: Disposition) -> Result<()> {
        let handle = self.ensure_connected()?;
        self.connected = false;
        self.context
            .with_backend_mut(|backend, _| backend.disconnect(handle, disposition))
    }
}

impl CardTransport for Card {
    type Error = Error;

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes> {
        self.transmit(command)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl Drop for Card {
    fn drop(&mut self) {
        if self.connected {
            trace!(card = %self.handle, reader = %self.reader, "Disconnecting card on drop");
            if let Err(e) = self.disconnect_with(Disposition::LeaveCard) {
                debug!(card = %self.handle, error = %e, "Failed to disconnect card on drop");
            }
        }
    }
}
