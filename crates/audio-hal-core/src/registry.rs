//! Active usecase registry
//!
//! Holds one entry per active usecase. Entries are keyed by usecase id for
//! constant-time duplicate detection and iterate in insertion order. The
//! registry does no locking of its own; it lives behind the device lock.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, warn};

use crate::devices::OutputDevices;
use crate::error::{HalError, Result};
use crate::usecase::{UseCase, UsecaseKind};

/// An active usecase and the output devices it requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsecaseEntry {
    pub id: UseCase,
    pub kind: UsecaseKind,
    pub devices: OutputDevices,
}

impl UsecaseEntry {
    pub fn new(id: UseCase, devices: OutputDevices) -> Self {
        Self {
            id,
            kind: id.kind(),
            devices,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    seq: u64,
    entry: UsecaseEntry,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_inserted: u64,
    pub total_removed: u64,
    pub rejected_duplicates: u64,
}

#[derive(Debug, Default)]
pub struct UsecaseRegistry {
    slots: HashMap<UseCase, Slot>,
    order: BTreeMap<u64, UseCase>,
    next_seq: u64,
    stats: RegistryStats,
}

impl UsecaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry; an id that is already present is rejected
    pub fn insert(&mut self, entry: UsecaseEntry) -> Result<()> {
        if self.slots.contains_key(&entry.id) {
            self.stats.rejected_duplicates += 1;
            warn!("Usecase {} is already present", entry.id);
            return Err(HalError::AlreadyExists { usecase: entry.id });
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.insert(entry.id, Slot { seq, entry });
        self.order.insert(seq, entry.id);
        self.stats.total_inserted += 1;

        debug!("Added usecase {} devices {:?}", entry.id, entry.devices);
        Ok(())
    }

    /// Remove an entry; removing an absent id is a logged no-op
    pub fn remove(&mut self, id: UseCase) -> Option<UsecaseEntry> {
        match self.slots.remove(&id) {
            Some(slot) => {
                self.order.remove(&slot.seq);
                self.stats.total_removed += 1;
                debug!("Removed usecase {}", id);
                Some(slot.entry)
            }
            None => {
                debug!("Usecase {} not registered, nothing to remove", id);
                None
            }
        }
    }

    /// Replace the requested devices of a registered entry
    pub fn set_devices(&mut self, id: UseCase, devices: OutputDevices) -> bool {
        match self.slots.get_mut(&id) {
            Some(slot) => {
                slot.entry.devices = devices;
                true
            }
            None => false,
        }
    }

    pub fn find(&self, id: UseCase) -> Option<&UsecaseEntry> {
        self.slots.get(&id).map(|slot| &slot.entry)
    }

    pub fn contains(&self, id: UseCase) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &UsecaseEntry> + '_ {
        self.order
            .values()
            .filter_map(|id| self.slots.get(id).map(|slot| &slot.entry))
    }

    /// Union of the devices of every `kind` entry other than `exclude`
    pub fn union_output_devices(&self, exclude: UseCase, kind: UsecaseKind) -> OutputDevices {
        self.iter()
            .filter(|e| e.kind == kind && e.id != exclude)
            .fold(OutputDevices::empty(), |acc, e| acc | e.devices)
    }

    /// Devices of the voice call entry, or none
    pub fn voice_call_devices(&self) -> OutputDevices {
        self.find(UseCase::VoiceCall)
            .map(|e| e.devices)
            .unwrap_or_default()
    }

    pub fn stats(&self) -> RegistryStats {
        self.stats
    }
}
