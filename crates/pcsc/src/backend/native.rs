//! Backend on the platform PC/SC library

use std::collections::HashMap;
use std::ffi::CString;
use std::fmt;
use std::time::Duration;

use pcsc::{Attribute, ReaderState, State};
use tracing::{debug, trace};

use super::{CardHandle, ContextId, ResourceManager};
use crate::config::{Disposition, Protocol, Protocols, Scope, ShareMode};
use crate::protocol::{CommandCode, MAX_READERS, attr};
use crate::protocol::layout::ReaderStateEntry;
use crate::table::{ReaderFlags, ReaderStateTable};
use crate::{Error, Result};

impl From<Scope> for pcsc::Scope {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::User => Self::User,
            Scope::Terminal => Self::Terminal,
            Scope::System => Self::System,
        }
    }
}

impl From<ShareMode> for pcsc::ShareMode {
    fn from(mode: ShareMode) -> Self {
        match mode {
            ShareMode::Exclusive => Self::Exclusive,
            ShareMode::Shared => Self::Shared,
            ShareMode::Direct => Self::Direct,
        }
    }
}

impl From<Disposition> for pcsc::Disposition {
    fn from(disposition: Disposition) -> Self {
        match disposition {
            Disposition::LeaveCard => Self::LeaveCard,
            Disposition::ResetCard => Self::ResetCard,
            Disposition::UnpowerCard => Self::UnpowerCard,
            Disposition::EjectCard => Self::EjectCard,
        }
    }
}

impl From<Protocols> for pcsc::Protocols {
    fn from(protocols: Protocols) -> Self {
        Self::from_bits_truncate(protocols.bits().into())
    }
}

fn attribute(id: u32) -> Result<Attribute> {
    Ok(match id {
        attr::VENDOR_NAME => Attribute::VendorName,
        attr::VENDOR_IFD_TYPE => Attribute::VendorIfdType,
        attr::VENDOR_IFD_VERSION => Attribute::VendorIfdVersion,
        attr::VENDOR_IFD_SERIAL_NO => Attribute::VendorIfdSerialNo,
        attr::CHANNEL_ID => Attribute::ChannelId,
        attr::CURRENT_PROTOCOL_TYPE => Attribute::CurrentProtocolType,
        attr::ATR_STRING => Attribute::AtrString,
        attr::DEVICE_FRIENDLY_NAME => Attribute::DeviceFriendlyName,
        _ => return Err(Error::Unsupported("attribute")),
    })
}

/// Translate a PC/SC event state into table flags
fn reader_flags(state: State) -> ReaderFlags {
    let mut flags = ReaderFlags::default();
    if state.contains(State::UNKNOWN) || state.contains(State::UNAVAILABLE) {
        flags = flags | ReaderFlags::UNKNOWN;
    }
    if state.contains(State::EMPTY) {
        flags = flags | ReaderFlags::ABSENT;
    }
    if state.contains(State::PRESENT) {
        flags = flags | ReaderFlags::PRESENT;
        if !state.contains(State::MUTE) && !state.contains(State::UNPOWERED) {
            flags = flags | ReaderFlags::POWERED | ReaderFlags::SPECIFIC;
        }
    }
    flags
}

/// Backend calling the OS smart card service through the `pcsc` crate
///
/// Card handles and context ids are assigned locally; the library does not
/// expose the service's own values.
pub struct NativeBackend {
    context: Option<pcsc::Context>,
    context_id: u32,
    cards: HashMap<i32, pcsc::Card>,
    next_card: i32,
    /// Readers and their last seen state, for change notification
    watched: Vec<(CString, State)>,
}

impl fmt::Debug for NativeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBackend")
            .field("established", &self.context.is_some())
            .field("cards", &self.cards.len())
            .field("watched", &self.watched.len())
            .finish()
    }
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeBackend {
    /// Create a backend with no context established yet
    pub fn new() -> Self {
        Self {
            context: None,
            context_id: 0,
            cards: HashMap::new(),
            next_card: 1,
            watched: Vec::new(),
        }
    }

    fn context(&self) -> Result<&pcsc::Context> {
        self.context.as_ref().ok_or(Error::ContextReleased)
    }

    fn card(&self, handle: CardHandle) -> Result<&pcsc::Card> {
        self.cards.get(&handle.0).ok_or(Error::CardDisconnected)
    }

    fn protocol(card: &pcsc::Card) -> Result<Protocol> {
        let status = card.status2_owned()?;
        Ok(match status.protocol2() {
            Some(pcsc::Protocol::T0) => Protocol::T0,
            Some(pcsc::Protocol::T1) => Protocol::T1,
            Some(pcsc::Protocol::RAW) => Protocol::Raw,
            _ => Protocol::Undefined,
        })
    }
}

impl ResourceManager for NativeBackend {
    fn establish_context(&mut self, scope: Scope) -> Result<ContextId> {
        let context = pcsc::Context::establish(scope.into())?;
        self.context = Some(context);
        self.context_id = self.context_id.wrapping_add(1);
        debug!(context = self.context_id, %scope, "Native context established");
        Ok(ContextId(self.context_id))
    }

    fn release_context(&mut self, _context: ContextId) -> Result<()> {
        self.cards.clear();
        let context = self.context.take().ok_or(Error::ContextReleased)?;
        context.release().map_err(|(_, e)| Error::from(e))
    }

    fn sync_reader_states(&mut self, table: &mut ReaderStateTable) -> Result<usize> {
        let context = self.context()?;
        let names = match context.list_readers_owned() {
            Ok(names) => names,
            Err(pcsc::Error::NoReadersAvailable) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        if names.len() > MAX_READERS {
            return Err(Error::CapacityExceeded {
                count: names.len(),
                capacity: MAX_READERS,
            });
        }

        let mut states: Vec<ReaderState> = names
            .iter()
            .map(|name| ReaderState::new(name.clone(), State::UNAWARE))
            .collect();
        if !states.is_empty() {
            context.get_status_change(Some(Duration::ZERO), &mut states)?;
        }

        let entries = states
            .iter()
            .map(|state| {
                let event = state.event_state();
                let mut entry = ReaderStateEntry::new(
                    &state.name().to_string_lossy(),
                    reader_flags(event),
                    state.atr(),
                    0,
                )?;
                entry.event_counter = state.event_count();
                Ok(entry)
            })
            .collect::<Result<Vec<_>>>()?;

        self.watched = names
            .into_iter()
            .zip(states.iter().map(ReaderState::event_state))
            .collect();
        let count = table.replace_with(&entries)?;
        trace!(count, "Synchronized native reader states");
        Ok(count)
    }

    fn wait_reader_state_change(&mut self, timeout: Duration) -> Result<()> {
        let context = self.context()?;
        let mut states = vec![ReaderState::new(pcsc::PNP_NOTIFICATION(), State::UNAWARE)];
        states.extend(
            self.watched
                .iter()
                .map(|(name, state)| ReaderState::new(name.clone(), *state)),
        );
        // Learn the current reader count before waiting on it; a timeout
        // here only means nothing is pending
        match context.get_status_change(Some(Duration::ZERO), &mut states[..1]) {
            Ok(()) | Err(pcsc::Error::Timeout) => {}
            Err(e) => return Err(e.into()),
        }
        states[0].sync_current_state();

        context
            .get_status_change(Some(timeout), &mut states)
            .map_err(status_change_error)
    }

    fn connect(
        &mut self,
        _context: ContextId,
        reader: &[u8],
        share_mode: ShareMode,
        preferred: Protocols,
    ) -> Result<(CardHandle, Protocol)> {
        let name = CString::new(reader)
            .map_err(|_| Error::InvalidParameter("reader name contains NUL".to_owned()))?;
        let card = self
            .context()?
            .connect(&name, share_mode.into(), preferred.into())?;
        let protocol = Self::protocol(&card)?;

        let handle = CardHandle(self.next_card);
        self.next_card = self.next_card.wrapping_add(1);
        self.cards.insert(handle.0, card);
        debug!(
            reader = %String::from_utf8_lossy(reader),
            card = %handle,
            %protocol,
            "Native card connected"
        );
        Ok((handle, protocol))
    }

    fn disconnect(&mut self, card: CardHandle, disposition: Disposition) -> Result<()> {
        let handle = self.cards.remove(&card.0).ok_or(Error::CardDisconnected)?;
        handle
            .disconnect(disposition.into())
            .map_err(|(_, e)| Error::from(e))
    }

    fn transmit(
        &mut self,
        card: CardHandle,
        _protocol: Protocol,
        send: &[u8],
        recv: &mut [u8],
    ) -> Result<usize> {
        let response = self.card(card)?.transmit(send, recv)?;
        Ok(response.len())
    }

    fn reconnect(
        &mut self,
        card: CardHandle,
        share_mode: ShareMode,
        preferred: Protocols,
        initialization: Disposition,
    ) -> Result<Protocol> {
        let handle = self.cards.get_mut(&card.0).ok_or(Error::CardDisconnected)?;
        handle.reconnect(share_mode.into(), preferred.into(), initialization.into())?;
        Self::protocol(handle)
    }

    fn control(&mut self, card: CardHandle, code: u32, send: &[u8], recv: &mut [u8]) -> Result<usize> {
        let response = self.card(card)?.control(code.into(), send, recv)?;
        Ok(response.len())
    }

    fn status(&mut self, card: CardHandle) -> Result<()> {
        self.card(card)?.status2_owned()?;
        Ok(())
    }

    fn get_attribute(&mut self, card: CardHandle, attr: u32, buf: &mut [u8]) -> Result<usize> {
        let value = self.card(card)?.get_attribute(attribute(attr)?, buf)?;
        Ok(value.len())
    }

    fn set_attribute(&mut self, card: CardHandle, attr: u32, value: &[u8]) -> Result<()> {
        self.card(card)?.set_attribute(attribute(attr)?, value)?;
        Ok(())
    }

    fn cancel(&mut self, _context: ContextId) -> Result<()> {
        self.context()?.cancel()?;
        Ok(())
    }
}

/// Map a failed wait, keeping expiry distinct from real failures
fn status_change_error(e: pcsc::Error) -> Error {
    match e {
        pcsc::Error::Timeout => Error::Timeout {
            command: CommandCode::WaitReaderStateChange,
        },
        e => e.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_flags_mapping() {
        assert!(reader_flags(State::PRESENT).is_card_present());
        assert!(!reader_flags(State::PRESENT | State::MUTE).is_card_present());
        assert!(!reader_flags(State::PRESENT | State::UNPOWERED).is_card_present());
        assert!(reader_flags(State::EMPTY).contains(ReaderFlags::ABSENT));
    }

    #[test]
    fn test_status_change_timeout_mapping() {
        assert!(matches!(
            status_change_error(pcsc::Error::Timeout),
            Error::Timeout {
                command: CommandCode::WaitReaderStateChange,
            }
        ));
        assert!(matches!(
            status_change_error(pcsc::Error::NoService),
            Error::Native(pcsc::Error::NoService)
        ));
    }

    #[test]
    fn test_unknown_attribute() {
        assert!(matches!(attribute(0x1234), Err(Error::Unsupported(_))));
        assert!(attribute(attr::ATR_STRING).is_ok());
    }
}
