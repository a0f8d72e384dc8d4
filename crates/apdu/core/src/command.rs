//! APDU command definitions
//!
//! Short-length command APDUs according to ISO/IEC 7816-4. Extended length
//! encoding is not supported: the data field is capped at
//! [`MAX_SHORT_DATA_LEN`] bytes and Le is a single byte.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result};

/// Largest data field a short APDU can carry
pub const MAX_SHORT_DATA_LEN: usize = 255;

/// Generic APDU command structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data (optional)
    pub data: Option<Bytes>,
    /// Expected length (optional)
    pub le: Option<u8>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Create a new command with expected response length (Le)
    pub const fn new_with_le(cla: u8, ins: u8, p1: u8, p2: u8, le: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: Some(le),
        }
    }

    /// Create a new command with data payload
    pub fn new_with_data<T: Into<Bytes>>(cla: u8, ins: u8, p1: u8, p2: u8, data: T) -> Self {
        Self::new(cla, ins, p1, p2).with_data(data)
    }

    /// Create a new command with both data and expected length
    pub fn new_with_data_and_le<T: Into<Bytes>>(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        data: T,
        le: u8,
    ) -> Self {
        Self::new_with_data(cla, ins, p1, p2, data).with_le(le)
    }

    /// SELECT by application identifier (00 A4 04 00)
    pub fn select<T: Into<Bytes>>(aid: T) -> Self {
        Self::new_with_data(0x00, 0xA4, 0x04, 0x00, aid)
    }

    /// Set the data field
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set the expected length field
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// The four header bytes (CLA, INS, P1, P2)
    pub const fn header(&self) -> [u8; 4] {
        [self.cla, self.ins, self.p1, self.p2]
    }

    /// Data field, `None` when absent or empty
    pub fn payload(&self) -> Option<&[u8]> {
        self.data.as_deref().filter(|data| !data.is_empty())
    }

    /// Calculate length of serialized command
    pub fn command_length(&self) -> usize {
        let data = self.payload().map_or(0, |data| 1 + data.len());
        4 + data + usize::from(self.le.is_some())
    }

    /// Convert to raw APDU bytes
    ///
    /// Layout is header, then Lc and data when the data field is non-empty,
    /// then Le when present.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buffer = BytesMut::with_capacity(self.command_length());
        buffer.put_slice(&self.header());

        if let Some(data) = self.payload() {
            if data.len() > MAX_SHORT_DATA_LEN {
                return Err(Error::DataTooLong(data.len()));
            }
            buffer.put_u8(data.len() as u8);
            buffer.put_slice(data);
        }

        if let Some(le) = self.le {
            buffer.put_u8(le);
        }

        Ok(buffer.freeze())
    }

    /// Parse a command from raw bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let [cla, ins, p1, p2, body @ ..] = data else {
            return Err(Error::InvalidCommandLength(data.len()));
        };

        let mut command = Self::new(*cla, *ins, *p1, *p2);

        match body {
            [] => {}
            // A single trailing byte is Le
            [le] => command.le = Some(*le),
            // Lc of zero would announce extended length
            [0, ..] => return Err(Error::InvalidCommandLength(data.len())),
            [lc, rest @ ..] => {
                let lc = usize::from(*lc);
                match rest.len().checked_sub(lc) {
                    Some(0) => command.data = Some(Bytes::copy_from_slice(rest)),
                    Some(1) => {
                        command.data = Some(Bytes::copy_from_slice(&rest[..lc]));
                        command.le = Some(rest[lc]);
                    }
                    _ => return Err(Error::InvalidCommandLength(data.len())),
                }
            }
        }

        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CLA: {:02x}, INS: {:02x}, P1: {:02x}, P2: {:02x}",
            self.cla, self.ins, self.p1, self.p2
        )?;
        if let Some(data) = self.payload() {
            write!(f, ", Lc: {:02x}, Data: {}", data.len(), hex::encode(data))?;
        }
        if let Some(le) = self.le {
            write!(f, ", Le: {le:02x}")?;
        }
        Ok(())
    }
}
