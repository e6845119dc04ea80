//! `blueblue` library.
//!
//! Scans BLE advertisements, decodes proximity beacons and keeps the latest
//! sighting of every device in an in-memory [`Registry`], queried and
//! controlled over HTTP.
//!
//! The binary (`src/main.rs`) is responsible for CLI parsing and process exit codes.
//! Process wiring lives in [`crate::app`] so it can be run against a fake radio.

pub mod advertisement;
pub mod app;
pub mod controller;
pub mod decoder;
pub mod device;
pub mod duration;
pub mod http;
pub mod mac_address;
pub mod registry;
pub mod scanner;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use advertisement::{Advertisement, ServiceData};
pub use controller::{ControlError, ScanConfig, ScanController, ScanState, dispatch};
pub use decoder::{
    BeaconFields, DecodeError, decode_proximity_beacon, format_raw_bytes,
    is_proximity_beacon_service, sanitize_name,
};
pub use device::{Beacon, DetectedDevice};
pub use duration::parse_duration;
pub use mac_address::{MacAddress, ParseMacError};
pub use registry::Registry;
pub use scanner::{Backend, Radio, ScanError, SystemRadio};
