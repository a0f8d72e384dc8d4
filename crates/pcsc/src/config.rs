//! Configuration options for the PC/SC client

use std::ops::BitOr;
use std::path::PathBuf;
use std::time::Duration;

use derive_more::Display;

use crate::protocol::{DEFAULT_RECEIVE_CAPACITY, DEFAULT_SOCKET_PATH, SOCKET_PATH_ENV};

/// Scope of a resource manager context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[repr(u32)]
pub enum Scope {
    /// Operations performed within the domain of the user (default)
    #[default]
    User = 0,
    /// Operations performed within the terminal's domain
    Terminal = 1,
    /// Operations performed within the domain of the system
    System = 2,
}

/// Sharing mode for card connections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[repr(u32)]
pub enum ShareMode {
    /// Exclusive access to the card
    Exclusive = 1,
    /// Shared access to the card (default)
    #[default]
    Shared = 2,
    /// Direct connection to the reader
    Direct = 3,
}

/// Protocol negotiated for an open card connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
#[repr(u32)]
pub enum Protocol {
    /// No protocol, as in a direct connection
    #[default]
    Undefined = 0,
    /// T=0
    T0 = 1,
    /// T=1
    T1 = 2,
    /// Raw transfer
    Raw = 4,
    /// T=15
    T15 = 8,
}

impl Protocol {
    /// Interpret an active-protocol value reported by the daemon
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Undefined),
            1 => Some(Self::T0),
            2 => Some(Self::T1),
            4 => Some(Self::Raw),
            8 => Some(Self::T15),
            _ => None,
        }
    }

    /// Value written into the protocol control information
    pub const fn bits(self) -> u32 {
        self as u32
    }
}

/// Set of acceptable protocols for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("{_0:#x}")]
pub struct Protocols(u32);

impl Protocols {
    /// No protocol
    pub const UNDEFINED: Self = Self(0);
    /// T=0
    pub const T0: Self = Self(Protocol::T0.bits());
    /// T=1
    pub const T1: Self = Self(Protocol::T1.bits());
    /// Raw transfer
    pub const RAW: Self = Self(Protocol::Raw.bits());
    /// T=15
    pub const T15: Self = Self(Protocol::T15.bits());
    /// T=0 or T=1
    pub const ANY: Self = Self(Self::T0.0 | Self::T1.0);

    /// Build from raw bits
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check whether `protocol` is acceptable
    pub const fn contains(self, protocol: Protocol) -> bool {
        self.0 & protocol.bits() != 0
    }
}

impl Default for Protocols {
    fn default() -> Self {
        Self::ANY
    }
}

impl BitOr for Protocols {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl From<Protocol> for Protocols {
    fn from(protocol: Protocol) -> Self {
        Self(protocol.bits())
    }
}

/// Action applied to the card when a connection or transaction ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[repr(u32)]
pub enum Disposition {
    /// Do nothing
    LeaveCard = 0,
    /// Reset the card (default)
    #[default]
    ResetCard = 1,
    /// Power the card down
    UnpowerCard = 2,
    /// Eject the card
    EjectCard = 3,
}

/// How the card wait loops block between table refreshes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Block on the daemon's reader-state-change notification
    Event {
        /// Upper bound for a single wait; expiry just restarts the loop
        timeout: Duration,
    },
    /// Sleep and resynchronize
    Poll {
        /// Delay between refreshes
        interval: Duration,
    },
}

impl WaitStrategy {
    /// Default timeout of a single event wait
    pub const DEFAULT_EVENT_TIMEOUT: Duration = Duration::from_secs(2);
    /// Default interval between polls
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

    /// Poll at [`Self::DEFAULT_POLL_INTERVAL`]
    pub const fn poll() -> Self {
        Self::Poll {
            interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Default for WaitStrategy {
    fn default() -> Self {
        Self::Event {
            timeout: Self::DEFAULT_EVENT_TIMEOUT,
        }
    }
}

/// Configuration options for the PC/SC client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Path of the daemon socket
    pub socket_path: PathBuf,

    /// Context scope
    pub scope: Scope,

    /// Sharing mode for card connections
    pub share_mode: ShareMode,

    /// Preferred protocols for card communication
    pub preferred_protocols: Protocols,

    /// Disposition applied by [`Card::disconnect`](crate::Card::disconnect)
    pub disposition: Disposition,

    /// Wait behaviour of the card wait loops
    pub wait_strategy: WaitStrategy,

    /// Run the version handshake after connecting
    pub handshake: bool,

    /// Receive buffer size for transmit
    pub receive_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            scope: Scope::default(),
            share_mode: ShareMode::default(),
            preferred_protocols: Protocols::ANY,
            disposition: Disposition::default(),
            wait_strategy: WaitStrategy::default(),
            handshake: true,
            receive_capacity: DEFAULT_RECEIVE_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the daemon socket path
    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    /// Set the context scope
    pub const fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the sharing mode
    pub const fn with_share_mode(mut self, mode: ShareMode) -> Self {
        self.share_mode = mode;
        self
    }

    /// Set the preferred protocols
    pub const fn with_protocols(mut self, protocols: Protocols) -> Self {
        self.preferred_protocols = protocols;
        self
    }

    /// Set the disconnect disposition
    pub const fn with_disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = disposition;
        self
    }

    /// Set the wait strategy
    pub const fn with_wait_strategy(mut self, strategy: WaitStrategy) -> Self {
        self.wait_strategy = strategy;
        self
    }

    /// Enable or disable the version handshake
    pub const fn with_handshake(mut self, handshake: bool) -> Self {
        self.handshake = handshake;
        self
    }

    /// Set the transmit receive capacity
    pub const fn with_receive_capacity(mut self, capacity: usize) -> Self {
        self.receive_capacity = capacity;
        self
    }
}

/// `PCSCLITE_CSOCK_NAME` if set, otherwise the well-known daemon socket
pub fn default_socket_path() -> PathBuf {
    std::env::var_os(SOCKET_PATH_ENV)
        .filter(|path| !path.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH), PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new();
        assert_eq!(config.scope, Scope::User);
        assert_eq!(config.share_mode, ShareMode::Shared);
        assert_eq!(config.preferred_protocols, Protocols::ANY);
        assert_eq!(config.disposition, Disposition::ResetCard);
        assert_eq!(config.receive_capacity, 258);
        assert!(config.handshake);
        assert!(matches!(config.wait_strategy, WaitStrategy::Event { .. }));
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new()
            .with_socket_path("/tmp/pcscd.sock")
            .with_scope(Scope::System)
            .with_share_mode(ShareMode::Exclusive)
            .with_protocols(Protocols::T1)
            .with_wait_strategy(WaitStrategy::poll())
            .with_handshake(false);
        assert_eq!(config.socket_path, PathBuf::from("/tmp/pcscd.sock"));
        assert_eq!(config.scope as u32, 2);
        assert_eq!(config.share_mode as u32, 1);
        assert_eq!(
            config.wait_strategy,
            WaitStrategy::Poll {
                interval: Duration::from_millis(250)
            }
        );
        assert!(!config.handshake);
    }

    #[test]
    fn test_protocols() {
        assert_eq!(Protocols::ANY.bits(), 3);
        assert_eq!((Protocols::T0 | Protocols::RAW).bits(), 5);
        assert!(Protocols::ANY.contains(Protocol::T1));
        assert!(!Protocols::T0.contains(Protocol::T1));
        assert_eq!(Protocol::from_raw(2), Some(Protocol::T1));
        assert_eq!(Protocol::from_raw(3), None);
    }

    #[test]
    fn test_wire_values() {
        assert_eq!(Scope::Terminal as u32, 1);
        assert_eq!(ShareMode::Direct as u32, 3);
        assert_eq!(Disposition::LeaveCard as u32, 0);
        assert_eq!(Disposition::EjectCard as u32, 3);
        assert_eq!(Protocol::T15.bits(), 8);
    }
}
