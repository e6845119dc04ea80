//! Raw HCI socket backend.
//!
//! This backend uses raw Linux HCI sockets to run an active LE scan without
//! requiring the BlueZ daemon. It requires CAP_NET_RAW and CAP_NET_ADMIN
//! capabilities or root privileges.

use super::{ADVERTISEMENT_CHANNEL_BUFFER_SIZE, AdvertisementResult, ScanError};
use crate::advertisement::Advertisement;
use crate::mac_address::MacAddress;
use libc::{AF_BLUETOOTH, SOCK_CLOEXEC, SOCK_RAW, c_int, c_void, sockaddr, socklen_t};
use std::collections::HashMap;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::sync::LazyLock;
use tokio::io::unix::AsyncFd;
use tokio::sync::{Semaphore, mpsc};
use tracing::debug;

// HCI protocol constants
const BTPROTO_HCI: c_int = 1;
const SOL_HCI: c_int = 0;
const HCI_FILTER: c_int = 2;
const HCI_DEV_ID: u16 = 0;

// HCI packet types
const HCI_COMMAND_PKT: u8 = 0x01;
const HCI_EVENT_PKT: u8 = 0x04;

// HCI events
const EVT_LE_META_EVENT: u8 = 0x3E;

// LE Meta event sub-events
const EVT_LE_ADVERTISING_REPORT: u8 = 0x02;

// HCI commands
const OGF_LE_CTL: u16 = 0x08;
const OCF_LE_SET_SCAN_PARAMETERS: u16 = 0x000B;
const OCF_LE_SET_SCAN_ENABLE: u16 = 0x000C;

// Scan parameters: active (scan requests solicit scan responses), 10ms
// interval and window (0.625ms units)
const LE_SCAN_ACTIVE: u8 = 0x01;
const LE_SCAN_INTERVAL: u16 = 0x0010;
const LE_SCAN_WINDOW: u16 = 0x0010;
const LE_PUBLIC_ADDRESS: u8 = 0x00;
const FILTER_POLICY_ACCEPT_ALL: u8 = 0x00;

// Advertising report event types
const ADV_SCAN_RSP: u8 = 0x04;

/// Report RSSI value meaning "not available".
const RSSI_UNAVAILABLE: i8 = 127;

/// Max HCI event size
const HCI_MAX_EVENT_SIZE: usize = 260;

/// Only one session may drive the controller at a time. A finished session
/// keeps its permit until scanning has been disabled, so the next session
/// never races the previous one's teardown.
static SESSION_SLOT: LazyLock<Semaphore> = LazyLock::new(|| Semaphore::new(1));

/// HCI socket address structure
#[repr(C)]
struct SockaddrHci {
    hci_family: u16,
    hci_dev: u16,
    hci_channel: u16,
}

/// HCI filter structure for raw sockets
#[repr(C)]
struct HciFilter {
    type_mask: u32,
    event_mask: [u32; 2],
    opcode: u16,
}

impl HciFilter {
    fn new() -> Self {
        Self {
            type_mask: 0,
            event_mask: [0, 0],
            opcode: 0,
        }
    }

    fn set_ptype(&mut self, ptype: u8) {
        self.type_mask |= 1 << (ptype as u32);
    }

    fn set_event(&mut self, event: u8) {
        let bit = event as usize;
        self.event_mask[bit / 32] |= 1 << (bit % 32);
    }
}

/// One entry of an LE Advertising Report event.
#[derive(Debug, Clone, PartialEq)]
struct AdvertisingReport {
    event_type: u8,
    address: MacAddress,
    data: Vec<u8>,
    rssi: i8,
}

/// Create an HCI command packet
fn hci_command_packet(ogf: u16, ocf: u16, params: &[u8]) -> Vec<u8> {
    let opcode = (ogf << 10) | ocf;
    let mut packet = Vec::with_capacity(4 + params.len());
    packet.push(HCI_COMMAND_PKT);
    packet.extend_from_slice(&opcode.to_le_bytes());
    packet.push(params.len() as u8);
    packet.extend_from_slice(params);
    packet
}

fn scan_parameters_packet() -> Vec<u8> {
    let [interval_lo, interval_hi] = LE_SCAN_INTERVAL.to_le_bytes();
    let [window_lo, window_hi] = LE_SCAN_WINDOW.to_le_bytes();
    let params = [
        LE_SCAN_ACTIVE,
        interval_lo,
        interval_hi,
        window_lo,
        window_hi,
        LE_PUBLIC_ADDRESS,
        FILTER_POLICY_ACCEPT_ALL,
    ];
    hci_command_packet(OGF_LE_CTL, OCF_LE_SET_SCAN_PARAMETERS, &params)
}

fn scan_enable_packet(enable: bool) -> Vec<u8> {
    // Duplicate filtering stays off so every packet refreshes the registry.
    hci_command_packet(OGF_LE_CTL, OCF_LE_SET_SCAN_ENABLE, &[u8::from(enable), 0x00])
}

/// Open a raw HCI socket
fn open_hci_socket() -> Result<OwnedFd, ScanError> {
    // SOCK_NONBLOCK is required for AsyncFd to work properly
    let fd = unsafe {
        libc::socket(
            AF_BLUETOOTH,
            SOCK_RAW | SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
            BTPROTO_HCI,
        )
    };

    if fd < 0 {
        return Err(os_error("Failed to create HCI socket"));
    }

    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Bind HCI socket to a device
fn bind_hci_socket(fd: &OwnedFd, dev_id: u16) -> Result<(), ScanError> {
    let addr = SockaddrHci {
        hci_family: AF_BLUETOOTH as u16,
        hci_dev: dev_id,
        hci_channel: 0, // HCI_CHANNEL_RAW
    };

    let ret = unsafe {
        libc::bind(
            fd.as_raw_fd(),
            &addr as *const SockaddrHci as *const sockaddr,
            mem::size_of::<SockaddrHci>() as socklen_t,
        )
    };

    if ret < 0 {
        return Err(os_error("Failed to bind HCI socket"));
    }

    Ok(())
}

/// Only deliver LE meta events to the socket
fn set_hci_filter(fd: &OwnedFd) -> Result<(), ScanError> {
    let mut filter = HciFilter::new();
    filter.set_ptype(HCI_EVENT_PKT);
    filter.set_event(EVT_LE_META_EVENT);

    let ret = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            SOL_HCI,
            HCI_FILTER,
            &filter as *const HciFilter as *const c_void,
            mem::size_of::<HciFilter>() as socklen_t,
        )
    };

    if ret < 0 {
        return Err(os_error("Failed to set HCI filter"));
    }

    Ok(())
}

/// Send an HCI command
fn send_hci_command(fd: &OwnedFd, packet: &[u8]) -> Result<(), ScanError> {
    let ret = unsafe {
        libc::write(
            fd.as_raw_fd(),
            packet.as_ptr() as *const c_void,
            packet.len(),
        )
    };

    if ret < 0 {
        return Err(os_error("Failed to send HCI command"));
    }

    Ok(())
}

fn os_error(context: &str) -> ScanError {
    ScanError::Bluetooth(format!("{context}: {}", io::Error::last_os_error()))
}

/// Parse the parameters of an LE Advertising Report (after the sub-event byte).
///
/// Reports are laid out back to back; a truncated report ends parsing.
fn parse_advertising_reports(params: &[u8]) -> Vec<AdvertisingReport> {
    let Some((&count, mut rest)) = params.split_first() else {
        return Vec::new();
    };

    let mut reports = Vec::with_capacity(count as usize);
    for _ in 0..count {
        // event_type(1) + addr_type(1) + addr(6) + data_len(1)
        if rest.len() < 9 {
            break;
        }
        let data_len = rest[8] as usize;
        // data + rssi(1)
        if rest.len() < 9 + data_len + 1 {
            break;
        }

        let mut addr = [0u8; 6];
        addr.copy_from_slice(&rest[2..8]);

        reports.push(AdvertisingReport {
            event_type: rest[0],
            address: MacAddress::from_le_bytes(addr),
            data: rest[9..9 + data_len].to_vec(),
            rssi: rest[9 + data_len] as i8,
        });
        rest = &rest[10 + data_len..];
    }

    reports
}

/// Pairs scan responses with the advertisement last heard from the same address.
#[derive(Debug, Default)]
struct ReportAssembler {
    last_advertisement: HashMap<MacAddress, Vec<u8>>,
}

impl ReportAssembler {
    /// Returns `None` for reports without a signal strength reading. Their
    /// payload is still remembered for a later scan response.
    fn assemble(&mut self, report: AdvertisingReport) -> Option<Advertisement> {
        let available = report.rssi != RSSI_UNAVAILABLE;
        let rssi = i16::from(report.rssi);
        if report.event_type == ADV_SCAN_RSP {
            if !available {
                return None;
            }
            let advertisement = self
                .last_advertisement
                .get(&report.address)
                .map(Vec::as_slice)
                .unwrap_or_default();
            Some(Advertisement::from_reports(
                report.address,
                rssi,
                advertisement,
                &report.data,
            ))
        } else {
            let adv = available
                .then(|| Advertisement::from_reports(report.address, rssi, &report.data, &[]));
            self.last_advertisement.insert(report.address, report.data);
            adv
        }
    }
}

/// Start an active LE scan on hci0 using raw HCI sockets.
///
/// Scanning is disabled again once the returned receiver is dropped.
///
/// # Requirements
/// - CAP_NET_RAW and CAP_NET_ADMIN capabilities or root privileges
/// - An available HCI device (typically hci0)
pub async fn open_session() -> Result<mpsc::Receiver<AdvertisementResult>, ScanError> {
    let permit = SESSION_SLOT
        .acquire()
        .await
        .map_err(|e| ScanError::Bluetooth(format!("HCI session lock closed: {e}")))?;

    // Event socket for advertising reports
    let fd = open_hci_socket()?;
    bind_hci_socket(&fd, HCI_DEV_ID)?;
    set_hci_filter(&fd)?;

    // Separate socket for commands
    let cmd_fd = open_hci_socket()?;
    bind_hci_socket(&cmd_fd, HCI_DEV_ID)?;
    send_hci_command(&cmd_fd, &scan_parameters_packet())?;
    send_hci_command(&cmd_fd, &scan_enable_packet(true))?;

    let async_fd = AsyncFd::new(fd)
        .map_err(|e| ScanError::Bluetooth(format!("Failed to create async fd: {}", e)))?;

    let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_BUFFER_SIZE);

    tokio::spawn(async move {
        let _permit = permit;
        let mut assembler = ReportAssembler::default();
        let mut buf = [0u8; HCI_MAX_EVENT_SIZE];

        'session: loop {
            let mut guard = tokio::select! {
                _ = tx.closed() => break,
                ready = async_fd.readable() => match ready {
                    Ok(guard) => guard,
                    Err(e) => {
                        let _ = tx.send(Err(ScanError::Bluetooth(format!("HCI socket error: {e}")))).await;
                        break;
                    }
                },
            };

            // Drain all available packets before waiting again
            loop {
                let n = match guard.try_io(|inner| {
                    let ret = unsafe {
                        libc::read(
                            inner.as_raw_fd(),
                            buf.as_mut_ptr() as *mut c_void,
                            buf.len(),
                        )
                    };
                    if ret < 0 {
                        Err(io::Error::last_os_error())
                    } else {
                        Ok(ret as usize)
                    }
                }) {
                    Ok(Ok(n)) if n > 0 => n,
                    Ok(Ok(_)) => break,
                    Ok(Err(e)) => {
                        let _ = tx.send(Err(ScanError::Bluetooth(format!("HCI read failed: {e}")))).await;
                        break 'session;
                    }
                    Err(_would_block) => break,
                };

                // packet type, event code, parameter length, sub-event
                if n < 4
                    || buf[0] != HCI_EVENT_PKT
                    || buf[1] != EVT_LE_META_EVENT
                    || buf[3] != EVT_LE_ADVERTISING_REPORT
                {
                    continue;
                }

                for report in parse_advertising_reports(&buf[4..n]) {
                    let Some(adv) = assembler.assemble(report) else {
                        continue;
                    };
                    if tx.send(Ok(adv)).await.is_err() {
                        break 'session;
                    }
                }
            }
        }

        if let Err(e) = send_hci_command(&cmd_fd, &scan_enable_packet(false)) {
            debug!(error = %e, "Failed to disable LE scan");
        }
    });

    Ok(rx)
}
