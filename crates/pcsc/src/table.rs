//! Reader-state table cache

use std::borrow::Cow;
use std::fmt;
use std::ops::BitOr;

use zerocopy::FromZeros;

use crate::protocol::layout::{ReaderStateArray, ReaderStateEntry};
use crate::protocol::{MAX_ATR_SIZE, MAX_READERNAME, MAX_READERS};
use crate::{Error, Result};

/// Reader state bits as reported in [`ReaderStateEntry::state`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ReaderFlags(u32);

impl ReaderFlags {
    /// State unknown
    pub const UNKNOWN: Self = Self(0x0001);
    /// No card in the reader
    pub const ABSENT: Self = Self(0x0002);
    /// Card inserted but not in position
    pub const SWALLOWED: Self = Self(0x0004);
    /// Card is awaiting protocol negotiation
    pub const NEGOTIABLE: Self = Self(0x0008);
    /// Card is present
    pub const PRESENT: Self = Self(0x0010);
    /// Card is powered
    pub const POWERED: Self = Self(0x0020);
    /// Card is ready with a protocol selected
    pub const SPECIFIC: Self = Self(0x0040);

    const NAMES: [(Self, &'static str); 7] = [
        (Self::SPECIFIC, "SPECIFIC"),
        (Self::NEGOTIABLE, "NEGOTIABLE"),
        (Self::POWERED, "POWERED"),
        (Self::SWALLOWED, "SWALLOWED"),
        (Self::PRESENT, "PRESENT"),
        (Self::ABSENT, "ABSENT"),
        (Self::UNKNOWN, "UNKNOWN"),
    ];

    /// Build from raw bits
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check whether all bits of `other` are set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// A card is present and powered
    pub const fn is_card_present(self) -> bool {
        self.contains(Self::PRESENT.union(Self::POWERED))
    }

    /// Union of two flag sets
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for ReaderFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Display for ReaderFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name);
        if let Some(first) = names.next() {
            f.write_str(first)?;
            for name in names {
                write!(f, " {name}")?;
            }
        }
        Ok(())
    }
}

impl ReaderStateEntry {
    /// Build a populated entry
    pub fn new(name: &str, flags: ReaderFlags, atr: &[u8], protocol: u32) -> Result<Self> {
        if name.is_empty() || name.len() >= MAX_READERNAME || name.contains('\0') {
            return Err(Error::InvalidParameter(format!(
                "reader name must be 1 to {} bytes without NUL",
                MAX_READERNAME - 1
            )));
        }
        if atr.len() > MAX_ATR_SIZE {
            return Err(Error::InvalidParameter(format!(
                "ATR of {} bytes exceeds {MAX_ATR_SIZE}",
                atr.len()
            )));
        }

        let mut entry = Self::new_zeroed();
        entry.name[..name.len()].copy_from_slice(name.as_bytes());
        entry.state = flags.bits();
        entry.atr[..atr.len()].copy_from_slice(atr);
        entry.atr_len = atr.len() as u32;
        entry.protocol = protocol;
        Ok(entry)
    }

    /// A zero first name byte marks the end of the table
    pub const fn is_populated(&self) -> bool {
        self.name[0] != 0
    }

    /// Name bytes up to the NUL terminator
    pub fn name_bytes(&self) -> &[u8] {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.name.len());
        &self.name[..end]
    }

    /// Reader name
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes())
    }

    /// State flags
    pub const fn flags(&self) -> ReaderFlags {
        ReaderFlags::from_bits(self.state)
    }

    /// A card is present and powered
    pub const fn is_card_present(&self) -> bool {
        self.flags().is_card_present()
    }

    /// ATR bytes, clamped to the field size
    pub fn atr(&self) -> &[u8] {
        let len = (self.atr_len as usize).min(MAX_ATR_SIZE);
        &self.atr[..len]
    }

    fn validate(&self, index: usize) -> Result<()> {
        if !self.name.contains(&0) {
            return Err(Error::MalformedResponse(format!(
                "reader entry {index} has an unterminated name"
            )));
        }
        if self.atr_len as usize > MAX_ATR_SIZE {
            return Err(Error::MalformedResponse(format!(
                "reader entry {index} has ATR length {}",
                self.atr_len
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ReaderStateEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name())?;
        writeln!(f, "- Event Counter:  {}", self.event_counter)?;
        writeln!(f, "- Reader State:   {:x} ( {} )", self.state, self.flags())?;
        writeln!(f, "- Reader Sharing: {}", self.sharing)?;
        writeln!(f, "- Card ATR Len:   {}", self.atr_len)?;
        writeln!(f, "- Card ATR:       {}", hex::encode(self.atr()))?;
        writeln!(f, "- Card Protocol:  {:08x}", self.protocol)
    }
}

/// Snapshot of the daemon's reader-state table
///
/// The table is only ever replaced as a whole; a failed refresh keeps the
/// previous snapshot.
#[derive(Clone)]
pub struct ReaderStateTable {
    entries: Box<ReaderStateArray>,
    count: usize,
}

impl ReaderStateTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            entries: Box::new(ReaderStateArray::new_zeroed()),
            count: 0,
        }
    }

    /// Number of populated entries
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Check whether no reader is known
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Populated entries
    pub fn entries(&self) -> &[ReaderStateEntry] {
        &self.entries[..self.count]
    }

    /// Look up an entry by reader name
    pub fn find(&self, name: &str) -> Option<&ReaderStateEntry> {
        self.entries()
            .iter()
            .find(|entry| entry.name_bytes() == name.as_bytes())
    }

    /// Validate a raw table read from the daemon and swap it in
    ///
    /// Returns the populated count: the index of the first entry with an
    /// empty name, or [`MAX_READERS`].
    pub fn replace(&mut self, raw: Box<ReaderStateArray>) -> Result<usize> {
        let count = raw
            .iter()
            .position(|entry| !entry.is_populated())
            .unwrap_or(MAX_READERS);
        for (index, entry) in raw[..count].iter().enumerate() {
            entry.validate(index)?;
        }

        self.entries = raw;
        self.count = count;
        Ok(count)
    }

    /// Replace the table with `entries`, used by backends without a raw dump
    pub fn replace_with(&mut self, entries: &[ReaderStateEntry]) -> Result<usize> {
        if entries.len() > MAX_READERS {
            return Err(Error::CapacityExceeded {
                count: entries.len(),
                capacity: MAX_READERS,
            });
        }
        if let Some(index) = entries.iter().position(|entry| !entry.is_populated()) {
            return Err(Error::InvalidParameter(format!(
                "reader entry {index} has an empty name"
            )));
        }

        let mut raw = Box::new(ReaderStateArray::new_zeroed());
        raw[..entries.len()].copy_from_slice(entries);
        self.replace(raw)
    }
}

impl Default for ReaderStateTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReaderStateTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries().iter().map(|entry| entry.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_table(entries: &[ReaderStateEntry]) -> Box<ReaderStateArray> {
        let mut raw = Box::new(ReaderStateArray::new_zeroed());
        raw[..entries.len()].copy_from_slice(entries);
        raw
    }

    fn entry(name: &str, flags: ReaderFlags) -> ReaderStateEntry {
        ReaderStateEntry::new(name, flags, &[0x3B, 0x8F, 0x80, 0x01], 2).unwrap()
    }

    #[test]
    fn test_card_present_flags() {
        assert!(ReaderFlags::from_bits(0x0030).is_card_present());
        assert!(!ReaderFlags::from_bits(0x0020).is_card_present());
        assert!(!ReaderFlags::from_bits(0x0010).is_card_present());
        assert!((ReaderFlags::POWERED | ReaderFlags::PRESENT | ReaderFlags::SPECIFIC).is_card_present());
        assert_eq!(ReaderFlags::from_bits(0x0030).to_string(), "POWERED PRESENT");
    }

    #[test]
    fn test_count_stops_at_first_empty_name() {
        let mut table = ReaderStateTable::new();
        let mut raw = raw_table(&[
            entry("Reader 1", ReaderFlags::ABSENT),
            entry("Reader 2", ReaderFlags::ABSENT),
        ]);
        // Populated slot after the terminator is ignored
        raw[3] = entry("Stale", ReaderFlags::ABSENT);

        assert_eq!(table.replace(raw).unwrap(), 2);
        assert_eq!(table.entries().len(), 2);
        assert!(table.find("Reader 2").is_some());
        assert!(table.find("Stale").is_none());
    }

    #[test]
    fn test_full_table_count_is_capped() {
        let mut table = ReaderStateTable::new();
        let entries: Vec<_> = (0..MAX_READERS)
            .map(|i| entry(&format!("Reader {i}"), ReaderFlags::ABSENT))
            .collect();
        assert_eq!(table.replace(raw_table(&entries)).unwrap(), MAX_READERS);
        assert_eq!(table.count(), 16);
    }

    #[test]
    fn test_malformed_entry_keeps_previous_snapshot() {
        let mut table = ReaderStateTable::new();
        table
            .replace(raw_table(&[entry("Reader 1", ReaderFlags::ABSENT)]))
            .unwrap();

        let mut bad = entry("Reader 2", ReaderFlags::ABSENT);
        bad.atr_len = 34;
        let err = table.replace(raw_table(&[bad])).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
        assert_eq!(table.count(), 1);
        assert!(table.find("Reader 1").is_some());

        let mut unterminated = entry("Reader 3", ReaderFlags::ABSENT);
        unterminated.name = [b'x'; MAX_READERNAME];
        let err = table.replace(raw_table(&[unterminated])).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
        assert!(table.find("Reader 1").is_some());
    }

    #[test]
    fn test_replace_with_rejects_overflow() {
        let mut table = ReaderStateTable::new();
        let entries: Vec<_> = (0..17)
            .map(|i| entry(&format!("Reader {i}"), ReaderFlags::ABSENT))
            .collect();
        let err = table.replace_with(&entries).unwrap_err();
        assert!(matches!(
            err,
            Error::CapacityExceeded {
                count: 17,
                capacity: 16
            }
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_entry_accessors() {
        let entry = entry("Reader 1", ReaderFlags::POWERED | ReaderFlags::PRESENT);
        assert_eq!(entry.name(), "Reader 1");
        assert_eq!(entry.atr(), &[0x3B, 0x8F, 0x80, 0x01]);
        assert!(entry.is_card_present());
        assert!(ReaderStateEntry::new("", ReaderFlags::ABSENT, &[], 0).is_err());
        assert!(ReaderStateEntry::new(&"x".repeat(128), ReaderFlags::ABSENT, &[], 0).is_err());
        assert!(ReaderStateEntry::new("Reader", ReaderFlags::ABSENT, &[0; 34], 0).is_err());
    }

    #[test]
    fn test_entry_display() {
        let entry = entry("Reader 1", ReaderFlags::POWERED | ReaderFlags::PRESENT);
        let dump = entry.to_string();
        assert!(dump.starts_with("Reader 1\n"));
        assert!(dump.contains("- Reader State:   30 ( POWERED PRESENT )"));
        assert!(dump.contains("- Card ATR:       3b8f8001"));
        assert!(dump.contains("- Card Protocol:  00000002"));
    }
}
