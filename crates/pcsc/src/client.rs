//! Socket client for the pcsc-lite resource manager daemon

use std::io::{Read, Write};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
#[cfg(unix)]
use std::path::Path;
use std::time::Duration;

use tracing::{debug, trace};
use zerocopy::{FromZeros, IntoBytes};

#[cfg(unix)]
use crate::config::ClientConfig;
use crate::backend::{CardHandle, ContextId, ResourceManager};
use crate::config::{Disposition, Protocol, Protocols, Scope, ShareMode};
use crate::protocol::framer::Framer;
use crate::protocol::layout::{
    AttributeStruct, BeginTransactionStruct, CancelStruct, ConnectStruct, ControlStruct,
    DisconnectStruct, EndTransactionStruct, EstablishStruct, ReaderStateArray, ReaderStateEntry,
    ReconnectStruct, ReleaseStruct, StatusStruct, TransmitStruct, VersionStruct,
    WaitReaderStateChangeStruct,
};
use crate::protocol::{
    CommandCode, MAX_BUFFER_SIZE, MAX_READERNAME, PROTOCOL_VERSION_MAJOR, PROTOCOL_VERSION_MINOR,
    ResultCode,
};
use crate::table::ReaderStateTable;
use crate::{Error, Result};

/// Length of the protocol control information sent with transmit
const PCI_LENGTH: u32 = 8;

/// Client speaking the pcsc-lite wire protocol over a byte stream
///
/// Each operation is a single blocking round trip on the stream. Once an
/// I/O failure occurs the client refuses further calls with
/// [`Error::ConnectionBroken`]; open a new connection to recover.
#[derive(Debug)]
pub struct PcscLiteClient<S> {
    framer: Framer<S>,
}

#[cfg(unix)]
impl PcscLiteClient<UnixStream> {
    /// Connect to the daemon socket at `path` and run the version handshake
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path.as_ref(), true)
    }

    /// Connect using the socket path and handshake setting of `config`
    pub fn connect_with_config(config: &ClientConfig) -> Result<Self> {
        Self::open(&config.socket_path, config.handshake)
    }

    fn open(path: &Path, handshake: bool) -> Result<Self> {
        debug!(path = %path.display(), "Connecting to resource manager");
        let stream = UnixStream::connect(path).map_err(|source| Error::Connect {
            path: path.to_path_buf(),
            source,
        })?;

        let mut client = Self::from_stream(stream);
        if handshake {
            client.handshake()?;
        }
        Ok(client)
    }
}

impl<S: Read + Write> PcscLiteClient<S> {
    /// Wrap an already connected stream without any handshake
    pub const fn from_stream(stream: S) -> Self {
        Self {
            framer: Framer::new(stream),
        }
    }

    /// Whether an earlier I/O failure left the connection unusable
    pub const fn is_broken(&self) -> bool {
        self.framer.is_broken()
    }

    /// Announce the protocol version this client speaks
    pub fn handshake(&mut self) -> Result<()> {
        let mut msg = VersionStruct {
            major: PROTOCOL_VERSION_MAJOR,
            minor: PROTOCOL_VERSION_MINOR,
            rv: 0,
        };
        self.framer.exchange(CommandCode::Version, &mut msg)?;
        check(CommandCode::Version, msg.rv)?;
        debug!(
            major = PROTOCOL_VERSION_MAJOR,
            minor = PROTOCOL_VERSION_MINOR,
            "Protocol version accepted"
        );
        Ok(())
    }

    /// Read the daemon's reader-state table into `table`
    ///
    /// On any failure `table` keeps its previous contents.
    pub fn sync_reader_states(&mut self, table: &mut ReaderStateTable) -> Result<usize> {
        let command = CommandCode::GetReadersState;
        self.framer.send_header(command, 0)?;

        let mut raw = Box::new(ReaderStateArray::new_zeroed());
        self.framer.read_exact(command, raw.as_mut_bytes())?;

        let count = table.replace(raw)?;
        trace!(count, "Synchronized reader states");
        Ok(count)
    }

    /// Synchronize and return the populated entries
    pub fn list_readers(&mut self) -> Result<Vec<ReaderStateEntry>> {
        let mut table = ReaderStateTable::new();
        self.sync_reader_states(&mut table)?;
        Ok(table.entries().to_vec())
    }
}

/// Map a non-success `rv` to [`Error::Protocol`], logging it
fn check(command: CommandCode, rv: u32) -> Result<()> {
    Error::check(command, rv).inspect_err(|e| debug!(%command, error = %e, "Daemon refused"))
}

fn length(len: usize, what: &str) -> Result<u32> {
    if len > MAX_BUFFER_SIZE {
        return Err(Error::InvalidParameter(format!(
            "{what} of {len} bytes exceeds {MAX_BUFFER_SIZE}"
        )));
    }
    Ok(len as u32)
}

impl<S: Read + Write + std::fmt::Debug + Send> ResourceManager for PcscLiteClient<S> {
    fn establish_context(&mut self, scope: Scope) -> Result<ContextId> {
        let mut msg = EstablishStruct {
            scope: scope as u32,
            context: 0,
            rv: 0,
        };
        self.framer.exchange(CommandCode::EstablishContext, &mut msg)?;
        check(CommandCode::EstablishContext, msg.rv)?;

        let context = ContextId(msg.context);
        debug!(%context, %scope, "Context established");
        Ok(context)
    }

    fn release_context(&mut self, context: ContextId) -> Result<()> {
        let mut msg = ReleaseStruct {
            context: context.0,
            rv: 0,
        };
        self.framer.exchange(CommandCode::ReleaseContext, &mut msg)?;
        check(CommandCode::ReleaseContext, msg.rv)?;
        debug!(%context, "Context released");
        Ok(())
    }

    fn sync_reader_states(&mut self, table: &mut ReaderStateTable) -> Result<usize> {
        Self::sync_reader_states(self, table)
    }

    fn wait_reader_state_change(&mut self, timeout: Duration) -> Result<()> {
        let command = CommandCode::WaitReaderStateChange;
        let mut msg = WaitReaderStateChangeStruct {
            timeout: u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX),
            rv: 0,
        };
        trace!(timeout_ms = msg.timeout, "Waiting for reader state change");
        self.framer.exchange(command, &mut msg)?;

        if ResultCode(msg.rv) == ResultCode::E_TIMEOUT {
            let stop = CommandCode::StopWaitingReaderStateChange;
            let mut msg = WaitReaderStateChangeStruct { timeout: 0, rv: 0 };
            self.framer.exchange(stop, &mut msg)?;
            if let Err(e) = check(stop, msg.rv) {
                debug!(error = %e, "Ignoring stop-waiting failure after timeout");
            }
            return Err(Error::Timeout { command });
        }
        check(command, msg.rv)
    }

    fn connect(
        &mut self,
        context: ContextId,
        reader: &[u8],
        share_mode: ShareMode,
        preferred: Protocols,
    ) -> Result<(CardHandle, Protocol)> {
        if reader.len() >= MAX_READERNAME || reader.contains(&0) {
            return Err(Error::InvalidParameter(format!(
                "reader name must be shorter than {MAX_READERNAME} bytes without NUL"
            )));
        }

        let mut msg = ConnectStruct::new_zeroed();
        msg.context = context.0;
        msg.reader[..reader.len()].copy_from_slice(reader);
        msg.share_mode = share_mode as u32;
        msg.preferred_protocols = preferred.bits();
        self.framer.exchange(CommandCode::Connect, &mut msg)?;
        check(CommandCode::Connect, msg.rv)?;

        let card = CardHandle(msg.card);
        let protocol = match active_protocol(msg.active_protocol) {
            Ok(protocol) => protocol,
            Err(e) => {
                // The daemon holds a handle we cannot use; hand it back
                if let Err(release) = self.disconnect(card, Disposition::LeaveCard) {
                    debug!(%card, error = %release, "Failed to release unusable card");
                }
                return Err(e);
            }
        };
        debug!(reader = %String::from_utf8_lossy(reader), %card, %protocol, "Card connected");
        Ok((card, protocol))
    }

    fn disconnect(&mut self, card: CardHandle, disposition: Disposition) -> Result<()> {
        let mut msg = DisconnectStruct {
            card: card.0,
            disposition: disposition as u32,
            rv: 0,
        };
        self.framer.exchange(CommandCode::Disconnect, &mut msg)?;
        check(CommandCode::Disconnect, msg.rv)?;
        debug!(%card, %disposition, "Card disconnected");
        Ok(())
    }

    fn transmit(
        &mut self,
        card: CardHandle,
        protocol: Protocol,
        send: &[u8],
        recv: &mut [u8],
    ) -> Result<usize> {
        let command = CommandCode::Transmit;
        let mut msg = TransmitStruct {
            card: card.0,
            send_pci_protocol: protocol.bits(),
            send_pci_length: PCI_LENGTH,
            send_length: length(send.len(), "command APDU")?,
            recv_pci_protocol: Protocols::ANY.bits(),
            recv_pci_length: PCI_LENGTH,
            recv_length: u32::try_from(recv.len()).unwrap_or(u32::MAX),
            rv: 0,
        };
        trace!(%card, send_len = send.len(), capacity = recv.len(), "Transmit");

        self.framer.send(command, &msg)?;
        self.framer.write_all(command, send)?;
        self.framer.receive(command, &mut msg)?;
        check(command, msg.rv)?;

        let len = msg.recv_length as usize;
        if len > recv.len() {
            self.framer.mark_broken();
            return Err(Error::MalformedResponse(format!(
                "transmit returned {len} bytes for a {} byte buffer",
                recv.len()
            )));
        }
        self.framer.read_exact(command, &mut recv[..len])?;
        Ok(len)
    }

    fn reconnect(
        &mut self,
        card: CardHandle,
        share_mode: ShareMode,
        preferred: Protocols,
        initialization: Disposition,
    ) -> Result<Protocol> {
        let mut msg = ReconnectStruct {
            card: card.0,
            share_mode: share_mode as u32,
            preferred_protocols: preferred.bits(),
            initialization: initialization as u32,
            active_protocol: 0,
            rv: 0,
        };
        self.framer.exchange(CommandCode::Reconnect, &mut msg)?;
        check(CommandCode::Reconnect, msg.rv)?;
        active_protocol(msg.active_protocol)
    }

    fn begin_transaction(&mut self, card: CardHandle) -> Result<()> {
        let mut msg = BeginTransactionStruct { card: card.0, rv: 0 };
        self.framer.exchange(CommandCode::BeginTransaction, &mut msg)?;
        check(CommandCode::BeginTransaction, msg.rv)
    }

    fn end_transaction(&mut self, card: CardHandle, disposition: Disposition) -> Result<()> {
        let mut msg = EndTransactionStruct {
            card: card.0,
            disposition: disposition as u32,
            rv: 0,
        };
        self.framer.exchange(CommandCode::EndTransaction, &mut msg)?;
        check(CommandCode::EndTransaction, msg.rv)
    }

    fn control(&mut self, card: CardHandle, code: u32, send: &[u8], recv: &mut [u8]) -> Result<usize> {
        let command = CommandCode::Control;
        let mut msg = ControlStruct {
            card: card.0,
            control_code: code,
            send_length: length(send.len(), "control input")?,
            recv_length: u32::try_from(recv.len()).unwrap_or(u32::MAX),
            bytes_returned: 0,
            rv: 0,
        };
        trace!(%card, code = format_args!("{code:#x}"), send_len = send.len(), "Control");

        self.framer.send(command, &msg)?;
        self.framer.write_all(command, send)?;
        self.framer.receive(command, &mut msg)?;
        check(command, msg.rv)?;

        let len = msg.bytes_returned as usize;
        if len > recv.len() {
            self.framer.mark_broken();
            return Err(Error::MalformedResponse(format!(
                "control returned {len} bytes for a {} byte buffer",
                recv.len()
            )));
        }
        self.framer.read_exact(command, &mut recv[..len])?;
        Ok(len)
    }

    fn status(&mut self, card: CardHandle) -> Result<()> {
        let mut msg = StatusStruct { card: card.0, rv: 0 };
        self.framer.exchange(CommandCode::Status, &mut msg)?;
        check(CommandCode::Status, msg.rv)
    }

    fn get_attribute(&mut self, card: CardHandle, attr: u32, buf: &mut [u8]) -> Result<usize> {
        let command = CommandCode::GetAttrib;
        let mut msg = AttributeStruct::new_zeroed();
        msg.card = card.0;
        msg.attr_id = attr;
        msg.attr_len = buf.len().min(MAX_BUFFER_SIZE) as u32;
        self.framer.exchange(command, &mut msg)?;
        check(command, msg.rv)?;

        let len = msg.attr_len as usize;
        if len > MAX_BUFFER_SIZE || len > buf.len() {
            return Err(Error::MalformedResponse(format!(
                "attribute {attr:#x} returned {len} bytes for a {} byte buffer",
                buf.len()
            )));
        }
        buf[..len].copy_from_slice(&msg.attr[..len]);
        Ok(len)
    }

    fn set_attribute(&mut self, card: CardHandle, attr: u32, value: &[u8]) -> Result<()> {
        let mut msg = AttributeStruct::new_zeroed();
        msg.card = card.0;
        msg.attr_id = attr;
        msg.attr_len = length(value.len(), "attribute value")?;
        msg.attr[..value.len()].copy_from_slice(value);
        self.framer.exchange(CommandCode::SetAttrib, &mut msg)?;
        check(CommandCode::SetAttrib, msg.rv)
    }

    fn cancel(&mut self, context: ContextId) -> Result<()> {
        let mut msg = CancelStruct {
            context: context.0,
            rv: 0,
        };
        self.framer.exchange(CommandCode::Cancel, &mut msg)?;
        check(CommandCode::Cancel, msg.rv)
    }
}

fn active_protocol(raw: u32) -> Result<Protocol> {
    Protocol::from_raw(raw)
        .ok_or_else(|| Error::MalformedResponse(format!("unknown active protocol {raw:#x}")))
}
