//! APDU response definitions
//!
//! A response APDU is the data field followed by the two status bytes.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::status::{self, StatusWord};
use crate::{Error, Result};

/// Basic APDU response structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response data, empty when the card only returned a status word
    data: Bytes,
    /// Status word
    status: StatusWord,
}

impl Response {
    /// Create a new response with data and status
    pub fn new(data: impl Into<Bytes>, status: impl Into<StatusWord>) -> Self {
        Self {
            data: data.into(),
            status: status.into(),
        }
    }

    /// Create a success response
    pub fn success(data: impl Into<Bytes>) -> Self {
        Self::new(data, status::SUCCESS)
    }

    /// Parse response from raw bytes (including status word)
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        let [data @ .., sw1, sw2] = raw else {
            return Err(Error::MalformedResponse(raw.len()));
        };
        let status = StatusWord::new(*sw1, *sw2);

        trace!(
            sw = %status,
            data_len = data.len(),
            "Parsed APDU response"
        );

        Ok(Self {
            data: Bytes::copy_from_slice(data),
            status,
        })
    }

    /// Response data without the status word
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the response, returning its data
    pub fn into_data(self) -> Bytes {
        self.data
    }

    /// Get the status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Status word as `(SW1 << 8) | SW2`
    pub const fn sw(&self) -> u16 {
        self.status.to_u16()
    }

    /// Check if the status word equals [`status::SUCCESS`]
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Convert to raw bytes, data followed by SW1 SW2
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.data.len() + 2);
        buf.put_slice(&self.data);
        buf.put_u8(self.status.sw1);
        buf.put_u8(self.status.sw2);
        buf.freeze()
    }
}

impl TryFrom<&[u8]> for Response {
    type Error = Error;

    fn try_from(raw: &[u8]) -> Result<Self> {
        Self::from_bytes(raw)
    }
}

impl From<Response> for Bytes {
    fn from(response: Response) -> Self {
        response.to_bytes()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.data.is_empty() {
            write!(f, "Data: {}, ", hex::encode(&self.data))?;
        }
        write!(f, "SW: {:04x}", self.sw())
    }
}
