//! Daemon result codes (`rv`)

use std::fmt;

/// Raw result code returned by the resource manager
///
/// Unknown values are preserved as-is; only the description falls back to a
/// generic text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultCode(pub u32);

impl ResultCode {
    /// No error was encountered
    pub const SUCCESS: Self = Self(0x0000_0000);
    /// An internal consistency check failed
    pub const F_INTERNAL_ERROR: Self = Self(0x8010_0001);
    /// The action was cancelled by an SCardCancel request
    pub const E_CANCELLED: Self = Self(0x8010_0002);
    /// The supplied handle was invalid
    pub const E_INVALID_HANDLE: Self = Self(0x8010_0003);
    /// One or more of the supplied parameters could not be properly interpreted
    pub const E_INVALID_PARAMETER: Self = Self(0x8010_0004);
    /// Registry startup information is missing or invalid
    pub const E_INVALID_TARGET: Self = Self(0x8010_0005);
    /// Not enough memory available to complete this command
    pub const E_NO_MEMORY: Self = Self(0x8010_0006);
    /// An internal consistency timer has expired
    pub const F_WAITED_TOO_LONG: Self = Self(0x8010_0007);
    /// The data buffer to receive returned data is too small
    pub const E_INSUFFICIENT_BUFFER: Self = Self(0x8010_0008);
    /// The specified reader name is not recognized
    pub const E_UNKNOWN_READER: Self = Self(0x8010_0009);
    /// The user-specified timeout value has expired
    pub const E_TIMEOUT: Self = Self(0x8010_000A);
    /// The smart card cannot be accessed because of other connections outstanding
    pub const E_SHARING_VIOLATION: Self = Self(0x8010_000B);
    /// The operation requires a smart card, but no smart card is currently in the device
    pub const E_NO_SMARTCARD: Self = Self(0x8010_000C);
    /// The specified smart card name is not recognized
    pub const E_UNKNOWN_CARD: Self = Self(0x8010_000D);
    /// The system could not dispose of the media in the requested manner
    pub const E_CANT_DISPOSE: Self = Self(0x8010_000E);
    /// The requested protocols are incompatible with the protocol currently in use
    pub const E_PROTO_MISMATCH: Self = Self(0x8010_000F);
    /// The reader or smart card is not ready to accept commands
    pub const E_NOT_READY: Self = Self(0x8010_0010);
    /// One or more of the supplied parameters values could not be properly interpreted
    pub const E_INVALID_VALUE: Self = Self(0x8010_0011);
    /// The action was cancelled by the system
    pub const E_SYSTEM_CANCELLED: Self = Self(0x8010_0012);
    /// An internal communications error has been detected
    pub const F_COMM_ERROR: Self = Self(0x8010_0013);
    /// An internal error has been detected, but the source is unknown
    pub const F_UNKNOWN_ERROR: Self = Self(0x8010_0014);
    /// An ATR obtained from the registry is not a valid ATR string
    pub const E_INVALID_ATR: Self = Self(0x8010_0015);
    /// An attempt was made to end a non-existent transaction
    pub const E_NOT_TRANSACTED: Self = Self(0x8010_0016);
    /// The specified reader is not currently available for use
    pub const E_READER_UNAVAILABLE: Self = Self(0x8010_0017);
    /// The PCI receive buffer was too small
    pub const E_PCI_TOO_SMALL: Self = Self(0x8010_0019);
    /// The reader driver does not meet minimal requirements for support
    pub const E_READER_UNSUPPORTED: Self = Self(0x8010_001A);
    /// The reader driver did not produce a unique reader name
    pub const E_DUPLICATE_READER: Self = Self(0x8010_001B);
    /// The smart card does not meet minimal requirements for support
    pub const E_CARD_UNSUPPORTED: Self = Self(0x8010_001C);
    /// The smart card resource manager is not running
    pub const E_NO_SERVICE: Self = Self(0x8010_001D);
    /// The smart card resource manager has shut down
    pub const E_SERVICE_STOPPED: Self = Self(0x8010_001E);
    /// An unexpected card error has occurred
    pub const E_UNEXPECTED: Self = Self(0x8010_001F);
    /// This smart card does not support the requested feature
    pub const E_UNSUPPORTED_FEATURE: Self = Self(0x8010_0022);
    /// Cannot find a smart card reader
    pub const E_NO_READERS_AVAILABLE: Self = Self(0x8010_002E);
    /// The reader cannot communicate with the card due to ATR configuration conflicts
    pub const W_UNSUPPORTED_CARD: Self = Self(0x8010_0065);
    /// The smart card is not responding to a reset
    pub const W_UNRESPONSIVE_CARD: Self = Self(0x8010_0066);
    /// Power has been removed from the smart card
    pub const W_UNPOWERED_CARD: Self = Self(0x8010_0067);
    /// The smart card has been reset, so any shared state information is invalid
    pub const W_RESET_CARD: Self = Self(0x8010_0068);
    /// The smart card has been removed, so further communication is not possible
    pub const W_REMOVED_CARD: Self = Self(0x8010_0069);
    /// Access was denied because of a security violation
    pub const W_SECURITY_VIOLATION: Self = Self(0x8010_006A);
    /// The card cannot be accessed because the wrong PIN was presented
    pub const W_WRONG_CHV: Self = Self(0x8010_006B);
    /// The card cannot be accessed because the maximum number of PIN entry attempts has been reached
    pub const W_CHV_BLOCKED: Self = Self(0x8010_006C);
    /// The end of the smart card file has been reached
    pub const W_EOF: Self = Self(0x8010_006D);
    /// The user pressed "Cancel" on a Smart Card Selection Dialog
    pub const W_CANCELLED_BY_USER: Self = Self(0x8010_006E);
    /// No PIN was presented to the smart card
    pub const W_CARD_NOT_AUTHENTICATED: Self = Self(0x8010_006F);

    /// Raw numeric value
    pub const fn code(self) -> u32 {
        self.0
    }

    /// Check whether this is [`Self::SUCCESS`]
    pub const fn is_success(self) -> bool {
        self.0 == Self::SUCCESS.0
    }

    /// Human readable description
    pub const fn description(self) -> &'static str {
        match self {
            Self::SUCCESS => "Success",
            Self::F_INTERNAL_ERROR => "Internal error",
            Self::E_CANCELLED => "Command cancelled",
            Self::E_INVALID_HANDLE => "Invalid handle",
            Self::E_INVALID_PARAMETER => "Invalid parameter given",
            Self::E_INVALID_TARGET => "Invalid target given",
            Self::E_NO_MEMORY => "Not enough memory",
            Self::F_WAITED_TOO_LONG => "Waited too long",
            Self::E_INSUFFICIENT_BUFFER => "Insufficient buffer",
            Self::E_UNKNOWN_READER => "Unknown reader specified",
            Self::E_TIMEOUT => "Command timeout",
            Self::E_SHARING_VIOLATION => "Sharing violation",
            Self::E_NO_SMARTCARD => "No smart card inserted",
            Self::E_UNKNOWN_CARD => "Unknown card",
            Self::E_CANT_DISPOSE => "Cannot dispose handle",
            Self::E_PROTO_MISMATCH => "Card protocol mismatch",
            Self::E_NOT_READY => "Subsystem not ready",
            Self::E_INVALID_VALUE => "Invalid value given",
            Self::E_SYSTEM_CANCELLED => "System cancelled",
            Self::F_COMM_ERROR => "RPC transport error",
            Self::F_UNKNOWN_ERROR => "Unknown error",
            Self::E_INVALID_ATR => "Invalid ATR",
            Self::E_NOT_TRANSACTED => "Transaction failed",
            Self::E_READER_UNAVAILABLE => "Reader is unavailable",
            Self::E_PCI_TOO_SMALL => "PCI struct too small",
            Self::E_READER_UNSUPPORTED => "Reader is unsupported",
            Self::E_DUPLICATE_READER => "Reader already exists",
            Self::E_CARD_UNSUPPORTED => "Card is unsupported",
            Self::E_NO_SERVICE => "Service not available",
            Self::E_SERVICE_STOPPED => "Service was stopped",
            Self::E_UNEXPECTED => "Unexpected card error",
            Self::E_UNSUPPORTED_FEATURE => "Feature not supported",
            Self::E_NO_READERS_AVAILABLE => "Cannot find a smart card reader",
            Self::W_UNSUPPORTED_CARD => "Card is not supported",
            Self::W_UNRESPONSIVE_CARD => "Card is unresponsive",
            Self::W_UNPOWERED_CARD => "Card is unpowered",
            Self::W_RESET_CARD => "Card was reset",
            Self::W_REMOVED_CARD => "Card was removed",
            Self::W_SECURITY_VIOLATION => "Access denied",
            Self::W_WRONG_CHV => "Wrong PIN",
            Self::W_CHV_BLOCKED => "PIN blocked",
            Self::W_EOF => "End of file",
            Self::W_CANCELLED_BY_USER => "Cancelled by user",
            Self::W_CARD_NOT_AUTHENTICATED => "Card not authenticated",
            _ => "Unknown result code",
        }
    }
}

impl From<u32> for ResultCode {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

impl From<ResultCode> for u32 {
    fn from(code: ResultCode) -> Self {
        code.0
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.description(), self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_keeps_raw_code() {
        assert_eq!(ResultCode::E_TIMEOUT.to_string(), "Command timeout (0x8010000A)");
        assert_eq!(
            ResultCode(0xDEAD_BEEF).to_string(),
            "Unknown result code (0xDEADBEEF)"
        );
    }

    #[test]
    fn test_success() {
        assert!(ResultCode::from(0).is_success());
        assert!(!ResultCode::E_NO_SMARTCARD.is_success());
        assert_eq!(u32::from(ResultCode::W_REMOVED_CARD), 0x8010_0069);
    }
}
