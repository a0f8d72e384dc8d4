//! Answer To Reset

use bytes::Bytes;
use derive_more::{Deref, Display};

/// Answer To Reset returned by a card on power-up
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deref, Display)]
#[display("{}", hex::encode(_0))]
pub struct Atr(Bytes);

impl Atr {
    /// Wrap raw ATR bytes
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Raw ATR bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Atr {
    fn from(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }
}

impl AsRef<[u8]> for Atr {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_lowercase_hex() {
        let atr = Atr::from(&[0x3B, 0x8F, 0x80, 0x01][..]);
        assert_eq!(atr.to_string(), "3b8f8001");
        assert_eq!(atr.len(), 4);
        assert_eq!(atr.as_bytes()[0], 0x3B);
    }
}
