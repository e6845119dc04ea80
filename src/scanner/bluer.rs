//! BlueZ D-Bus backend.
//!
//! This backend uses the `bluer` crate to run LE discovery through the BlueZ
//! daemon. It requires the `bluetoothd` daemon to be running. BlueZ does not
//! expose the advertising PDU itself, so the raw advertisement is rebuilt
//! from the device properties it reports.

use super::{ADVERTISEMENT_CHANNEL_BUFFER_SIZE, AdvertisementResult, ScanError};
use crate::advertisement::{Advertisement, ServiceData};
use crate::mac_address::MacAddress;
use bluer::{
    Adapter, AdapterEvent, Address, DiscoveryFilter, DiscoveryTransport, Session, Uuid, UuidExt,
};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;

impl From<bluer::Error> for ScanError {
    fn from(err: bluer::Error) -> Self {
        ScanError::Bluetooth(err.to_string())
    }
}

/// Start an LE discovery session on the default adapter.
///
/// Discovery stops when the returned receiver is dropped.
pub async fn open_session() -> Result<mpsc::Receiver<AdvertisementResult>, ScanError> {
    let session = Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;
    adapter
        .set_discovery_filter(DiscoveryFilter {
            transport: DiscoveryTransport::Le,
            duplicate_data: true,
            ..Default::default()
        })
        .await?;

    let events = adapter.discover_devices_with_changes().await?;
    let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_BUFFER_SIZE);

    // The task owns all Bluetooth state; dropping it ends discovery.
    tokio::spawn(async move {
        let _session = session;
        let mut events = Box::pin(events);

        loop {
            let event = tokio::select! {
                _ = tx.closed() => break,
                event = events.next() => event,
            };

            let address = match event {
                Some(AdapterEvent::DeviceAdded(address)) => address,
                Some(_) => continue,
                // Dropping tx without a final message reports a closed stream.
                None => break,
            };

            match read_advertisement(&adapter, address).await {
                Ok(Some(adv)) => {
                    if tx.send(Ok(adv)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => debug!(%address, error = %e, "Skipping device"),
            }
        }
    });

    Ok(rx)
}

/// Read the advertised properties of a discovered device.
///
/// Returns `None` for cached devices that have no current RSSI, i.e. were
/// not actually heard during this discovery.
async fn read_advertisement(
    adapter: &Adapter,
    address: Address,
) -> Result<Option<Advertisement>, ScanError> {
    let device = adapter.device(address)?;

    let Some(rssi) = device.rssi().await? else {
        return Ok(None);
    };

    let manufacturer_data = device
        .manufacturer_data()
        .await?
        .and_then(|data| data.into_iter().min_by_key(|(company, _)| *company))
        .map(|(company, data)| {
            let mut bytes = company.to_le_bytes().to_vec();
            bytes.extend_from_slice(&data);
            bytes
        })
        .unwrap_or_default();

    let mut service_data: Vec<ServiceData> = device
        .service_data()
        .await?
        .unwrap_or_default()
        .into_iter()
        .map(|(uuid, data)| ServiceData {
            uuid: uuid_to_air_bytes(&uuid),
            data,
        })
        .collect();
    service_data.sort_by(|a, b| a.uuid.cmp(&b.uuid));

    let mut adv = Advertisement {
        address: MacAddress::from(address),
        local_name: device.name().await?,
        rssi,
        manufacturer_data,
        service_data,
        ..Default::default()
    };
    adv.raw_advertisement = adv.encode_ad_structures();

    Ok(Some(adv))
}

/// Shortest on-air (little-endian) form of a service UUID.
fn uuid_to_air_bytes(uuid: &Uuid) -> Vec<u8> {
    if let Some(short) = uuid.as_u16() {
        short.to_le_bytes().to_vec()
    } else if let Some(short) = uuid.as_u32() {
        short.to_le_bytes().to_vec()
    } else {
        let mut bytes = uuid.as_bytes().to_vec();
        bytes.reverse();
        bytes
    }
}
