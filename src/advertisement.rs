//! Advertisement events emitted by the radio layer.
//!
//! Backends either hand over the raw AD structures of an advertising report
//! ([`Advertisement::from_reports`]) or fill the fields from a higher level
//! API and re-encode them ([`Advertisement::encode_ad_structures`]).

use crate::mac_address::MacAddress;

// AD types (Bluetooth Core Supplement, part A)
const AD_TYPE_SHORTENED_LOCAL_NAME: u8 = 0x08;
const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
const AD_TYPE_SERVICE_DATA_16: u8 = 0x16;
const AD_TYPE_SERVICE_DATA_32: u8 = 0x20;
const AD_TYPE_SERVICE_DATA_128: u8 = 0x21;
const AD_TYPE_MANUFACTURER_DATA: u8 = 0xFF;

/// Service data announced under one service UUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceData {
    /// Service UUID in on-air (little-endian) byte order, 2, 4 or 16 bytes.
    pub uuid: Vec<u8>,
    pub data: Vec<u8>,
}

/// One received advertisement, optionally merged with its scan response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Advertisement {
    pub address: MacAddress,
    pub local_name: Option<String>,
    /// RSSI in dBm of the most recent packet.
    pub rssi: i16,
    /// Manufacturer specific data including the 2-byte company identifier.
    pub manufacturer_data: Vec<u8>,
    pub service_data: Vec<ServiceData>,
    pub raw_advertisement: Vec<u8>,
    pub raw_scan_response: Vec<u8>,
}

impl Advertisement {
    /// Build an advertisement from raw advertising and scan response payloads.
    ///
    /// Fields found in the scan response override those of the advertisement.
    /// Truncated AD structures end parsing of that payload; whatever was
    /// decoded before them is kept.
    pub fn from_reports(
        address: MacAddress,
        rssi: i16,
        advertisement: &[u8],
        scan_response: &[u8],
    ) -> Self {
        let mut adv = Advertisement {
            address,
            rssi,
            raw_advertisement: advertisement.to_vec(),
            raw_scan_response: scan_response.to_vec(),
            ..Default::default()
        };
        adv.apply_ad_structures(advertisement);
        adv.apply_ad_structures(scan_response);
        adv
    }

    fn apply_ad_structures(&mut self, payload: &[u8]) {
        for (ad_type, value) in AdStructures::new(payload) {
            match ad_type {
                AD_TYPE_COMPLETE_LOCAL_NAME => {
                    self.local_name = Some(String::from_utf8_lossy(value).into_owned());
                }
                AD_TYPE_SHORTENED_LOCAL_NAME if self.local_name.is_none() => {
                    self.local_name = Some(String::from_utf8_lossy(value).into_owned());
                }
                AD_TYPE_MANUFACTURER_DATA => self.manufacturer_data = value.to_vec(),
                AD_TYPE_SERVICE_DATA_16 => self.push_service_data(value, 2),
                AD_TYPE_SERVICE_DATA_32 => self.push_service_data(value, 4),
                AD_TYPE_SERVICE_DATA_128 => self.push_service_data(value, 16),
                _ => {}
            }
        }
    }

    fn push_service_data(&mut self, value: &[u8], uuid_len: usize) {
        if value.len() < uuid_len {
            return;
        }
        let (uuid, data) = value.split_at(uuid_len);
        self.service_data.push(ServiceData {
            uuid: uuid.to_vec(),
            data: data.to_vec(),
        });
    }

    /// Encode name, manufacturer data and service data as AD structures.
    ///
    /// Used by backends that never see the original PDU. Structures whose
    /// value would not fit a length byte are left out.
    pub fn encode_ad_structures(&self) -> Vec<u8> {
        let mut out = Vec::new();
        if let Some(name) = &self.local_name {
            push_ad_structure(&mut out, AD_TYPE_COMPLETE_LOCAL_NAME, name.as_bytes());
        }
        for service in &self.service_data {
            let ad_type = match service.uuid.len() {
                2 => AD_TYPE_SERVICE_DATA_16,
                4 => AD_TYPE_SERVICE_DATA_32,
                16 => AD_TYPE_SERVICE_DATA_128,
                _ => continue,
            };
            let mut value = service.uuid.clone();
            value.extend_from_slice(&service.data);
            push_ad_structure(&mut out, ad_type, &value);
        }
        if !self.manufacturer_data.is_empty() {
            push_ad_structure(&mut out, AD_TYPE_MANUFACTURER_DATA, &self.manufacturer_data);
        }
        out
    }
}

fn push_ad_structure(out: &mut Vec<u8>, ad_type: u8, value: &[u8]) {
    let Ok(len) = u8::try_from(value.len() + 1) else {
        return;
    };
    out.push(len);
    out.push(ad_type);
    out.extend_from_slice(value);
}

/// Iterator over `(ad_type, value)` pairs of an advertising payload.
struct AdStructures<'a> {
    payload: &'a [u8],
}

impl<'a> AdStructures<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self { payload }
    }
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (&len, rest) = self.payload.split_first()?;
        let len = len as usize;
        // A zero length marks early termination (padding).
        if len == 0 || rest.len() < len {
            self.payload = &[];
            return None;
        }
        let (structure, remaining) = rest.split_at(len);
        self.payload = remaining;
        Some((structure[0], &structure[1..]))
    }
}
