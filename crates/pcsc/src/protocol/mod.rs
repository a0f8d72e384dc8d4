//! pcsc-lite client/daemon wire protocol
//!
//! Every request is an 8-byte [`Header`](layout::Header) followed by a
//! fixed-size payload struct. The daemon writes the same struct back with
//! its output fields and `rv` filled in. All integers use native byte order.

pub(crate) mod framer;
pub mod layout;
pub mod result;

use derive_more::Display;

pub use result::ResultCode;

/// Protocol major version announced in the handshake
pub const PROTOCOL_VERSION_MAJOR: i32 = 4;
/// Protocol minor version announced in the handshake
pub const PROTOCOL_VERSION_MINOR: i32 = 3;

/// Number of slots in the daemon's reader-state table
pub const MAX_READERS: usize = 16;
/// Size of the NUL-terminated reader name field
pub const MAX_READERNAME: usize = 128;
/// Size of the ATR field
pub const MAX_ATR_SIZE: usize = 33;
/// Largest APDU or attribute buffer the daemon accepts
pub const MAX_BUFFER_SIZE: usize = 264;
/// Default receive buffer for transmit: 256 data bytes plus SW1 SW2
pub const DEFAULT_RECEIVE_CAPACITY: usize = 258;

/// Socket the daemon listens on
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/pcscd/pcscd.comm";
/// Environment variable overriding [`DEFAULT_SOCKET_PATH`]
pub const SOCKET_PATH_ENV: &str = "PCSCLITE_CSOCK_NAME";

/// Reader attribute identifiers used with get/set attribute
pub mod attr {
    /// Reader vendor name
    pub const VENDOR_NAME: u32 = 0x0001_0100;
    /// Vendor-defined reader type
    pub const VENDOR_IFD_TYPE: u32 = 0x0001_0101;
    /// Vendor-defined reader version
    pub const VENDOR_IFD_VERSION: u32 = 0x0001_0102;
    /// Reader serial number
    pub const VENDOR_IFD_SERIAL_NO: u32 = 0x0001_0103;
    /// Reader channel identifier
    pub const CHANNEL_ID: u32 = 0x0002_0110;
    /// Protocol currently in use
    pub const CURRENT_PROTOCOL_TYPE: u32 = 0x0008_0201;
    /// Answer To Reset of the inserted card
    pub const ATR_STRING: u32 = 0x0009_0303;
    /// Display name of the reader
    pub const DEVICE_FRIENDLY_NAME: u32 = 0x7FFF_0003;
}

/// Command codes carried in the message header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[repr(u32)]
pub enum CommandCode {
    /// SCardEstablishContext
    EstablishContext = 0x01,
    /// SCardReleaseContext
    ReleaseContext = 0x02,
    /// Legacy reader listing, superseded by [`Self::GetReadersState`]
    ListReaders = 0x03,
    /// SCardConnect
    Connect = 0x04,
    /// SCardReconnect
    Reconnect = 0x05,
    /// SCardDisconnect
    Disconnect = 0x06,
    /// SCardBeginTransaction
    BeginTransaction = 0x07,
    /// SCardEndTransaction
    EndTransaction = 0x08,
    /// SCardTransmit
    Transmit = 0x09,
    /// SCardControl
    Control = 0x0A,
    /// SCardStatus
    Status = 0x0B,
    /// Legacy status change, superseded by [`Self::WaitReaderStateChange`]
    GetStatusChange = 0x0C,
    /// SCardCancel
    Cancel = 0x0D,
    /// Cancel a pending transaction
    CancelTransaction = 0x0E,
    /// SCardGetAttrib
    GetAttrib = 0x0F,
    /// SCardSetAttrib
    SetAttrib = 0x10,
    /// Protocol version handshake
    Version = 0x11,
    /// Dump the whole reader-state table
    GetReadersState = 0x12,
    /// Block until a reader state changes or the timeout expires
    WaitReaderStateChange = 0x13,
    /// Abort a pending [`Self::WaitReaderStateChange`]
    StopWaitingReaderStateChange = 0x14,
}

impl CommandCode {
    /// Numeric code as written on the wire
    pub const fn code(self) -> u32 {
        self as u32
    }
}
