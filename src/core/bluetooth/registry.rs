//! Registry of peripherals seen during the current scan.
//!
//! Peripherals are keyed by advertised name rather than address: two
//! devices broadcasting the same name collapse into the first one seen.

use std::collections::HashSet;

use crate::core::bluetooth::types::Peripheral;

#[derive(Debug, Default, Clone)]
pub struct PeripheralRegistry {
    devices: Vec<Peripheral>,
    names: HashSet<String>,
}

impl PeripheralRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the peripheral unless it is unnamed or its name is already
    /// present. Returns true if it was added.
    pub fn record(&mut self, peripheral: Peripheral) -> bool {
        let Some(name) = peripheral.local_name() else {
            return false;
        };
        if !self.names.insert(name.to_string()) {
            return false;
        }
        self.devices.push(peripheral);
        true
    }

    /// Devices in first-seen order
    pub fn devices(&self) -> &[Peripheral] {
        &self.devices
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Peripheral> {
        self.devices.iter().find(|p| p.local_name() == Some(name))
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Peripheral> {
        self.devices.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
        self.names.clear();
    }
}
