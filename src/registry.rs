//! Live registry of detected devices.
//!
//! One record per address; a new sighting replaces the previous record in
//! place. Nothing is ever evicted: stale records simply stop showing up in
//! windowed queries. The number of entries is bounded by how many distinct
//! addresses come into radio range during the process lifetime.

use crate::device::DetectedDevice;
use crate::mac_address::MacAddress;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Staleness window applied when a caller does not supply one.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Thread-safe store of the latest [`DetectedDevice`] per address.
///
/// Cloning is cheap and every clone shares the same entries. Writers take the
/// exclusive lock only for the in-memory replacement, so a reader always sees
/// either the old or the new record, never a mix.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<Entries>>,
}

#[derive(Debug, Default)]
struct Entries {
    /// Records in first-seen order.
    devices: Vec<DetectedDevice>,
    index: HashMap<MacAddress, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `device`, replacing any record with the same address.
    pub fn upsert(&self, device: DetectedDevice) {
        let mut entries = self.inner.write();
        let existing = entries.index.get(&device.address).copied();
        match existing {
            Some(slot) => entries.devices[slot] = device,
            None => {
                let slot = entries.devices.len();
                entries.index.insert(device.address, slot);
                entries.devices.push(device);
            }
        }
    }

    /// Records refreshed within `window`, strongest signal first.
    ///
    /// Records with equal RSSI keep their first-seen order.
    pub fn list_live(&self, window: Duration) -> Vec<DetectedDevice> {
        self.list_live_at(window, SystemTime::now())
    }

    /// [`Registry::list_live`] evaluated at an explicit point in time.
    pub fn list_live_at(&self, window: Duration, now: SystemTime) -> Vec<DetectedDevice> {
        let mut live = self.list_since_at(window, now);
        live.sort_by(|a, b| b.rssi.cmp(&a.rssi));
        live
    }

    /// Records refreshed within `window`, in first-seen order.
    pub fn list_since(&self, window: Duration) -> Vec<DetectedDevice> {
        self.list_since_at(window, SystemTime::now())
    }

    /// [`Registry::list_since`] evaluated at an explicit point in time.
    pub fn list_since_at(&self, window: Duration, now: SystemTime) -> Vec<DetectedDevice> {
        self.inner
            .read()
            .devices
            .iter()
            .filter(|device| device.is_live(window, now))
            .cloned()
            .collect()
    }

    pub fn get(&self, address: &MacAddress) -> Option<DetectedDevice> {
        let entries = self.inner.read();
        entries
            .index
            .get(address)
            .map(|&slot| entries.devices[slot].clone())
    }

    /// Number of addresses ever seen.
    pub fn len(&self) -> usize {
        self.inner.read().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
