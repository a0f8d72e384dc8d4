//! Fixed binary layouts exchanged with the daemon
//!
//! Each struct mirrors the daemon's C definition field for field. Padding is
//! spelled out as explicit fields so that every layout can derive
//! [`IntoBytes`]; the size assertions below pin the byte lengths.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::{MAX_ATR_SIZE, MAX_BUFFER_SIZE, MAX_READERNAME, MAX_READERS};

/// Message header preceding every request
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct Header {
    /// Length of the payload that follows
    pub size: u32,
    /// [`CommandCode`](super::CommandCode) value
    pub command: u32,
}

/// Version handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct VersionStruct {
    /// Protocol major version
    pub major: i32,
    /// Protocol minor version
    pub minor: i32,
    /// Result code filled in by the daemon
    pub rv: u32,
}

/// SCardEstablishContext
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct EstablishStruct {
    /// Requested scope
    pub scope: u32,
    /// Context identifier
    pub context: u32,
    /// Result code filled in by the daemon
    pub rv: u32,
}

/// SCardReleaseContext and SCardCancel
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct ReleaseStruct {
    /// Context identifier
    pub context: u32,
    /// Result code filled in by the daemon
    pub rv: u32,
}

/// SCardCancel shares the release layout
pub type CancelStruct = ReleaseStruct;

/// SCardConnect
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct ConnectStruct {
    /// Context identifier
    pub context: u32,
    /// NUL-terminated reader name
    pub reader: [u8; MAX_READERNAME],
    /// Requested sharing mode
    pub share_mode: u32,
    /// Acceptable protocols bitmask
    pub preferred_protocols: u32,
    /// Card handle
    pub card: i32,
    /// Protocol negotiated by the daemon
    pub active_protocol: u32,
    /// Result code filled in by the daemon
    pub rv: u32,
}

/// SCardReconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct ReconnectStruct {
    /// Card handle
    pub card: i32,
    /// Requested sharing mode
    pub share_mode: u32,
    /// Acceptable protocols bitmask
    pub preferred_protocols: u32,
    /// Action applied to the card on reconnect
    pub initialization: u32,
    /// Protocol negotiated by the daemon
    pub active_protocol: u32,
    /// Result code filled in by the daemon
    pub rv: u32,
}

/// SCardDisconnect and SCardEndTransaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct DisconnectStruct {
    /// Card handle
    pub card: i32,
    /// Action applied to the card
    pub disposition: u32,
    /// Result code filled in by the daemon
    pub rv: u32,
}

/// SCardEndTransaction shares the disconnect layout
pub type EndTransactionStruct = DisconnectStruct;

/// SCardBeginTransaction and SCardStatus
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct BeginTransactionStruct {
    /// Card handle
    pub card: i32,
    /// Result code filled in by the daemon
    pub rv: u32,
}

/// SCardStatus shares the begin-transaction layout
pub type StatusStruct = BeginTransactionStruct;

/// SCardTransmit, followed on the wire by `send_length` raw bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct TransmitStruct {
    /// Card handle
    pub card: i32,
    /// Protocol of the send PCI
    pub send_pci_protocol: u32,
    /// Length of the send PCI
    pub send_pci_length: u32,
    /// Number of command bytes following the struct
    pub send_length: u32,
    /// Protocol of the receive PCI
    pub recv_pci_protocol: u32,
    /// Length of the receive PCI
    pub recv_pci_length: u32,
    /// Receive capacity on request, response length on reply
    pub recv_length: u32,
    /// Result code filled in by the daemon
    pub rv: u32,
}

/// SCardControl, followed on the wire by `send_length` raw bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct ControlStruct {
    /// Card handle
    pub card: i32,
    /// Reader-specific control code
    pub control_code: u32,
    /// Number of command bytes following the struct
    pub send_length: u32,
    /// Receive capacity on request, response length on reply
    pub recv_length: u32,
    /// Number of response bytes following the reply
    pub bytes_returned: u32,
    /// Result code filled in by the daemon
    pub rv: u32,
}

/// SCardGetAttrib and SCardSetAttrib
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct AttributeStruct {
    /// Card handle
    pub card: i32,
    /// Attribute identifier
    pub attr_id: u32,
    /// Attribute value, valid up to `attr_len`
    pub attr: [u8; MAX_BUFFER_SIZE],
    /// Buffer size on request, value length on reply
    pub attr_len: u32,
    /// Result code filled in by the daemon
    pub rv: u32,
}

/// Wait for (or stop waiting for) a reader state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct WaitReaderStateChangeStruct {
    /// Wait timeout in milliseconds
    pub timeout: u32,
    /// Result code filled in by the daemon
    pub rv: u32,
}

/// One slot of the daemon's reader-state table
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct ReaderStateEntry {
    /// NUL-terminated reader name; empty marks the end of the table
    pub name: [u8; MAX_READERNAME],
    /// Bumped by the daemon on every state change
    pub event_counter: u32,
    /// [`ReaderFlags`](crate::ReaderFlags) bits
    pub state: u32,
    /// Sharing status
    pub sharing: i32,
    /// Answer To Reset, valid up to `atr_len`
    pub atr: [u8; MAX_ATR_SIZE],
    /// Aligns `atr_len`
    pub _padding: [u8; 3],
    /// Number of valid ATR bytes
    pub atr_len: u32,
    /// Active protocol of the card
    pub protocol: u32,
}

/// The full table returned by [`CommandCode::GetReadersState`](super::CommandCode)
pub type ReaderStateArray = [ReaderStateEntry; MAX_READERS];

const _: () = {
    assert!(size_of::<Header>() == 8);
    assert!(size_of::<VersionStruct>() == 12);
    assert!(size_of::<EstablishStruct>() == 12);
    assert!(size_of::<ReleaseStruct>() == 8);
    assert!(size_of::<ConnectStruct>() == 152);
    assert!(size_of::<ReconnectStruct>() == 24);
    assert!(size_of::<DisconnectStruct>() == 12);
    assert!(size_of::<BeginTransactionStruct>() == 8);
    assert!(size_of::<TransmitStruct>() == 32);
    assert!(size_of::<ControlStruct>() == 24);
    assert!(size_of::<AttributeStruct>() == 280);
    assert!(size_of::<WaitReaderStateChangeStruct>() == 8);
    assert!(size_of::<ReaderStateEntry>() == 184);
    assert!(size_of::<ReaderStateArray>() == 2944);
};
