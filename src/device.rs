//! Registry records.

use crate::advertisement::Advertisement;
use crate::decoder::{
    BeaconFields, DecodeError, decode_proximity_beacon, format_raw_bytes,
    is_proximity_beacon_service, sanitize_name,
};
use crate::mac_address::MacAddress;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::time::SystemTime;

/// Beacon identity decoded from a device announcing the proximity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Beacon {
    #[serde(flatten)]
    pub fields: BeaconFields,
    /// Manufacturer data as plain lowercase hex (no separators).
    pub manufacturer_data: String,
    pub service_uuid: String,
    pub service_data: String,
}

/// The most recent sighting of one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedDevice {
    #[serde(rename = "mac")]
    pub address: MacAddress,
    /// Wall clock time of the last successful decode, never taken from the packet.
    #[serde(rename = "detected", serialize_with = "serialize_rfc3339")]
    pub detected_at: SystemTime,
    pub name: String,
    pub rssi: i16,
    pub advertisement: String,
    pub scan_response: String,
    pub base_station: String,
    #[serde(flatten)]
    pub beacon: Option<Beacon>,
}

impl DetectedDevice {
    /// Decode an advertisement into a record stamped with `detected_at`.
    ///
    /// Fails only when the advertisement announces the proximity beacon
    /// service but carries manufacturer data too short to decode.
    pub fn from_advertisement(
        adv: &Advertisement,
        detected_at: SystemTime,
        base_station: &str,
    ) -> Result<Self, DecodeError> {
        let beacon = adv
            .service_data
            .iter()
            .find(|service| is_proximity_beacon_service(&service.uuid))
            .map(|service| {
                decode_proximity_beacon(&adv.manufacturer_data).map(|fields| Beacon {
                    fields,
                    manufacturer_data: hex::encode(&adv.manufacturer_data),
                    service_uuid: hex::encode(&service.uuid),
                    service_data: hex::encode(&service.data),
                })
            })
            .transpose()?;

        Ok(DetectedDevice {
            address: adv.address,
            detected_at,
            name: sanitize_name(adv.local_name.as_deref().unwrap_or_default()),
            rssi: adv.rssi,
            advertisement: format_raw_bytes(&adv.raw_advertisement),
            scan_response: format_raw_bytes(&adv.raw_scan_response),
            base_station: base_station.to_string(),
            beacon,
        })
    }

    /// Whether the record was refreshed within `window` of `now`.
    ///
    /// Records stamped after `now` (clock adjustments) count as live.
    pub fn is_live(&self, window: std::time::Duration, now: SystemTime) -> bool {
        match now.duration_since(self.detected_at) {
            Ok(age) => age < window,
            Err(_) => true,
        }
    }

    pub fn is_beacon(&self) -> bool {
        self.beacon.is_some()
    }
}

fn serialize_rfc3339<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    let time: DateTime<Utc> = (*time).into();
    serializer.collect_str(&time.to_rfc3339_opts(SecondsFormat::Millis, true))
}
