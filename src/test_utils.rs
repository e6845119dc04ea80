use crate::advertisement::{Advertisement, ServiceData};
use crate::device::DetectedDevice;
use crate::mac_address::MacAddress;
use crate::scanner::{Radio, ScanError, SessionFuture};
use std::time::SystemTime;
use tokio::sync::mpsc;

/// A stable address for unit tests.
pub const TEST_MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// 27 bytes of beacon manufacturer data with recognizable fields:
/// identifier `00112233..eeff`, major `0102`, minor `0304`, battery `5a`.
pub fn beacon_manufacturer_data() -> Vec<u8> {
    let mut data = vec![0x4C, 0x00, 0x02, 0x15];
    data.extend((0..16u8).map(|i| i * 0x11));
    data.push(0x00);
    data.extend_from_slice(&[0x01, 0x02]);
    data.push(0x00);
    data.extend_from_slice(&[0x03, 0x04]);
    data.push(0x5A);
    data
}

/// An advertisement announcing the proximity beacon service.
pub fn beacon_advertisement(address: MacAddress, rssi: i16) -> Advertisement {
    let adv = Advertisement {
        address,
        local_name: Some("Beacon\x00".into()),
        rssi,
        manufacturer_data: beacon_manufacturer_data(),
        service_data: vec![ServiceData {
            uuid: vec![0x03, 0x18],
            data: vec![0xAA],
        }],
        ..Default::default()
    };
    Advertisement {
        raw_advertisement: adv.encode_ad_structures(),
        ..adv
    }
}

/// A non-beacon record with empty payloads.
pub fn base_device(address: MacAddress, rssi: i16, detected_at: SystemTime) -> DetectedDevice {
    DetectedDevice {
        address,
        detected_at,
        name: String::new(),
        rssi,
        advertisement: String::new(),
        scan_response: String::new(),
        base_station: String::new(),
        beacon: None,
    }
}

/// A radio whose sessions stay open and silent until the controller drops
/// them, or that fails to open when built with an error.
#[derive(Debug, Default)]
pub struct IdleRadio {
    pub open_error: Option<ScanError>,
}

impl IdleRadio {
    pub fn failing(error: ScanError) -> Self {
        Self {
            open_error: Some(error),
        }
    }
}

impl Radio for IdleRadio {
    fn open_session(&self) -> SessionFuture<'_> {
        Box::pin(async move {
            if let Some(e) = &self.open_error {
                return Err(e.clone());
            }
            let (tx, rx) = mpsc::channel(1);
            tokio::spawn(async move { tx.closed().await });
            Ok(rx)
        })
    }
}
