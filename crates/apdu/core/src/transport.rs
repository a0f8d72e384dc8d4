//! Transport trait for APDU exchange with a connected card
//!
//! A transport only moves raw bytes. Command encoding and response decoding
//! are layered on top by the provided methods.

use std::fmt;

use bytes::Bytes;
use tracing::{Level, debug, info, trace, warn};

use crate::{Command, Response};

/// Trait for card transports
///
/// Implementors provide [`do_transmit_raw`](Self::do_transmit_raw); the
/// remaining methods are built on it.
pub trait CardTransport: Send + fmt::Debug {
    /// Error type returned by the transport
    type Error: From<crate::Error> + fmt::Debug;

    /// Send raw APDU bytes to the card and return the raw response bytes
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, Self::Error> {
        trace!(command = %hex::encode(command), "Transmitting raw command");
        let result = self.do_transmit_raw(command);
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode(response), "Received raw response");
            }
            Err(e) => {
                debug!(error = ?e, "Transport error during transmission");
            }
        }
        result
    }

    /// Internal implementation of transmit_raw
    /// This is the method that concrete implementations should override
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, Self::Error>;

    /// Encode `command`, exchange it, and decode the reply
    fn transmit_apdu(&mut self, command: &Command) -> Result<Response, Self::Error> {
        let raw = command.to_bytes()?;
        let response = self.transmit_raw(&raw)?;
        let response = Response::from_bytes(&response)?;

        let status = response.status();
        let level = status.tracing_level();
        if level == Level::DEBUG {
            debug!(command = %command, response = %response, "APDU exchanged");
        } else if level == Level::INFO {
            info!(
                command = %command,
                response = %response,
                status = status.description(),
                "APDU completed with warning"
            );
        } else {
            warn!(
                command = %command,
                response = %response,
                status = status.description(),
                "APDU failed"
            );
        }
        Ok(response)
    }

    /// Check if the transport is still attached to a card
    fn is_connected(&self) -> bool;
}

#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct MockTransport {
    /// Responses handed out in order; the last one repeats
    pub responses: Vec<Bytes>,
    /// Commands that were sent
    pub commands: Vec<Bytes>,
    pub connected: bool,
}

#[cfg(test)]
impl MockTransport {
    pub fn new(responses: Vec<Bytes>) -> Self {
        Self {
            responses,
            commands: Vec::new(),
            connected: true,
        }
    }

    pub fn with_success() -> Self {
        Self::new(vec![Bytes::from_static(&[0x90, 0x00])])
    }
}

#[cfg(test)]
impl CardTransport for MockTransport {
    type Error = crate::Error;

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, Self::Error> {
        if !self.connected {
            return Err(crate::Error::transport("card removed"));
        }

        self.commands.push(Bytes::copy_from_slice(command));

        match self.responses.len() {
            0 => Err(crate::Error::transport("no response queued")),
            1 => Ok(self.responses[0].clone()),
            _ => Ok(self.responses.remove(0)),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
