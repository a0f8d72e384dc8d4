//! Reader representation

use std::fmt;

use smartcard_apdu::Atr;
use tracing::debug;

use crate::card::Card;
use crate::config::{Protocols, ShareMode};
use crate::context::Context;
use crate::protocol::layout::ReaderStateEntry;
use crate::table::ReaderFlags;
use crate::Result;

/// Snapshot of one card reader
///
/// The snapshot is taken when the reader table is synchronized; call
/// [`refresh`](Self::refresh) to update it.
#[derive(Debug, Clone)]
pub struct Reader {
    name: String,
    entry: ReaderStateEntry,
    context: Context,
}

impl Reader {
    pub(crate) fn new(entry: ReaderStateEntry, context: Context) -> Self {
        Self {
            name: entry.name().into_owned(),
            entry,
            context,
        }
    }

    /// Get the reader name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if a powered card is in the reader
    pub const fn is_card_present(&self) -> bool {
        self.entry.is_card_present()
    }

    /// State flags
    pub const fn flags(&self) -> ReaderFlags {
        self.entry.flags()
    }

    /// Daemon event counter for this reader
    pub const fn event_counter(&self) -> u32 {
        self.entry.event_counter
    }

    /// Answer To Reset of the card, if one is present
    pub fn atr(&self) -> Option<Atr> {
        self.is_card_present()
            .then(|| Atr::from(self.entry.atr()))
    }

    /// Raw table entry
    pub const fn entry(&self) -> &ReaderStateEntry {
        &self.entry
    }

    /// Owning context
    pub const fn context(&self) -> &Context {
        &self.context
    }

    /// Connect to the card using the context's sharing mode and protocols
    pub fn connect(&self) -> Result<Card> {
        let config = self.context.config();
        self.connect_with(config.share_mode, config.preferred_protocols)
    }

    /// Connect to the card with explicit sharing mode and protocols
    pub fn connect_with(&self, share_mode: ShareMode, preferred: Protocols) -> Result<Card> {
        Card::connect(self, share_mode, preferred)
    }

    /// Resynchronize and update this snapshot
    ///
    /// Returns `false` when the reader has left the table, in which case the
    /// snapshot is left as it was.
    pub fn refresh(&mut self) -> Result<bool> {
        let found = self
            .context
            .list_readers()?
            .into_iter()
            .find(|reader| reader.entry.name_bytes() == self.entry.name_bytes());
        match found {
            Some(reader) => {
                self.entry = reader.entry;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Block until the card leaves this reader or the reader disappears
    pub fn wait_until_card_removed(&mut self) -> Result<()> {
        loop {
            if !self.refresh()? {
                debug!(reader = %self.name, "Reader removed while waiting");
                return Ok(());
            }
            if !self.is_card_present() {
                debug!(reader = %self.name, "Card removed");
                return Ok(());
            }
            self.context.block_until_change()?;
        }
    }
}

impl fmt::Display for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.entry, f)
    }
}
