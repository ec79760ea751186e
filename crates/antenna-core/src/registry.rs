//! Deduplicated collection of peripherals seen during one scan pass

use std::collections::HashMap;

use crate::types::{Peripheral, PeripheralId};

/// Outcome of recording a sighting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    /// First time this id was seen in the current pass
    New,
    /// Already known; name/signal refreshed from the new sighting
    Repeat,
}

/// Peripherals keyed by id, kept in first-seen order
#[derive(Debug, Default, Clone)]
pub struct PeripheralRegistry {
    peripherals: Vec<Peripheral>,
    index: HashMap<PeripheralId, usize>,
}

impl PeripheralRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a peripheral or refresh the known entry with the same id.
    ///
    /// A sighting without a name or signal keeps the previously observed value.
    pub fn upsert(&mut self, sighting: Peripheral) -> Sighting {
        match self.index.get(&sighting.id) {
            Some(&position) => {
                let known = &mut self.peripherals[position];
                if sighting.display_name.is_some() {
                    known.display_name = sighting.display_name;
                }
                if sighting.signal_strength.is_some() {
                    known.signal_strength = sighting.signal_strength;
                }
                Sighting::Repeat
            }
            None => {
                self.index.insert(sighting.id.clone(), self.peripherals.len());
                self.peripherals.push(sighting);
                Sighting::New
            }
        }
    }

    pub fn get(&self, id: &PeripheralId) -> Option<&Peripheral> {
        self.index.get(id).map(|&position| &self.peripherals[position])
    }

    pub fn clear(&mut self) {
        self.peripherals.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.peripherals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peripherals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peripheral> {
        self.peripherals.iter()
    }

    /// Owned copy for publishing to observers
    pub fn snapshot(&self) -> Vec<Peripheral> {
        self.peripherals.clone()
    }
}
