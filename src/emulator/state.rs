use std::collections::BTreeMap;

use super::Emulator;
use crate::error::{EmulatorError, Result};

/// Opaque machine snapshot produced by [`Emulator::save_state`].
///
/// The bytes are a bincode encoding of every chip's state plus the
/// fingerprint of the cartridge they belong to. ROM contents are not included.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveState {
    bytes: Vec<u8>,
}

impl SaveState {
    /// Wrap bytes read back from storage. Nothing is validated until the
    /// snapshot is handed to [`Emulator::load_state`].
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// In-memory store of snapshots keyed by name, e.g. quick-save slots.
#[derive(Clone, Debug, Default)]
pub struct StateSlots {
    slots: BTreeMap<String, SaveState>,
}

impl StateSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot `emulator` into `key`, replacing any previous entry.
    pub fn save(&mut self, key: &str, emulator: &Emulator) -> Result<()> {
        let state = emulator.save_state()?;
        log::debug!("state slot \"{key}\" saved ({} bytes)", state.len());
        self.slots.insert(key.to_owned(), state);
        Ok(())
    }

    pub fn restore(&self, key: &str, emulator: &mut Emulator) -> Result<()> {
        let state = self
            .slots
            .get(key)
            .ok_or_else(|| EmulatorError::InvalidState(format!("no snapshot in slot \"{key}\"")))?;
        emulator.load_state(state)
    }

    pub fn get(&self, key: &str) -> Option<&SaveState> {
        self.slots.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<SaveState> {
        self.slots.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
