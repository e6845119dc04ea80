//! Scan controller: the Stopped/Scanning state machine and the scan loop.
//!
//! `start()` spawns one background task that repeatedly opens bounded scan
//! sessions on the [`Radio`] and dispatches every advertisement into the
//! [`Registry`]. `stop()` cancels the running session immediately through
//! its [`CancellationToken`] instead of waiting for the session to time out.
//!
//! A radio failure other than timeout/cancellation ends the loop and is
//! reported once on the failure channel returned by [`ScanController::new`];
//! the binary treats it as fatal.

use crate::advertisement::Advertisement;
use crate::decoder::DecodeError;
use crate::device::DetectedDevice;
use crate::registry::Registry;
use crate::scanner::{Radio, ScanError};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Default length of one scan session.
pub const DEFAULT_SESSION_DURATION: Duration = Duration::from_secs(5);

/// Default label attached to records.
pub const DEFAULT_BASE_STATION: &str = "Pi4";

const FAILURE_CHANNEL_BUFFER_SIZE: usize = 4;

/// Observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Stopped,
    Scanning,
}

/// Misuse of the state machine. Reported to the caller, never fatal.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    #[error("Already scanning.")]
    AlreadyScanning,
    #[error("Already stopped.")]
    AlreadyStopped,
}

/// How a scan session ended without a radio failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The session ran for its full duration. Scanning resumes immediately.
    Timeout,
    /// `stop()` was requested.
    Canceled,
}

/// Settings for the scan loop.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub session_duration: Duration,
    /// Label attached to every record produced by this scanner.
    pub base_station: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            session_duration: DEFAULT_SESSION_DURATION,
            base_station: DEFAULT_BASE_STATION.to_string(),
        }
    }
}

enum ControllerState {
    Stopped,
    /// `run` identifies the loop that owns this state; each start mints a
    /// new run id and a new token.
    Scanning { run: u64, cancel: CancellationToken },
}

struct StateCell {
    state: ControllerState,
    runs: u64,
}

struct Shared {
    radio: Arc<dyn Radio>,
    registry: Registry,
    config: ScanConfig,
    state: Mutex<StateCell>,
    failures: mpsc::Sender<ScanError>,
}

/// Handle to the scan state machine. Clones share the same state.
#[derive(Clone)]
pub struct ScanController {
    shared: Arc<Shared>,
}

impl ScanController {
    /// Create a stopped controller.
    ///
    /// The returned receiver yields the radio failure that terminated a scan
    /// loop, if any.
    pub fn new(
        radio: Arc<dyn Radio>,
        registry: Registry,
        config: ScanConfig,
    ) -> (Self, mpsc::Receiver<ScanError>) {
        let (failures, failures_rx) = mpsc::channel(FAILURE_CHANNEL_BUFFER_SIZE);
        let controller = Self {
            shared: Arc::new(Shared {
                radio,
                registry,
                config,
                state: Mutex::new(StateCell {
                    state: ControllerState::Stopped,
                    runs: 0,
                }),
                failures,
            }),
        };
        (controller, failures_rx)
    }

    pub fn state(&self) -> ScanState {
        match self.shared.state.lock().state {
            ControllerState::Stopped => ScanState::Stopped,
            ControllerState::Scanning { .. } => ScanState::Scanning,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    /// Transition Stopped -> Scanning and spawn the scan loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), ControlError> {
        let (run, cancel) = {
            let mut cell = self.shared.state.lock();
            if let ControllerState::Scanning { .. } = cell.state {
                return Err(ControlError::AlreadyScanning);
            }
            cell.runs += 1;
            let run = cell.runs;
            let cancel = CancellationToken::new();
            cell.state = ControllerState::Scanning {
                run,
                cancel: cancel.clone(),
            };
            (run, cancel)
        };

        tokio::spawn(scan_loop(self.shared.clone(), run, cancel));
        Ok(())
    }

    /// Transition Scanning -> Stopped and cancel the running session.
    pub fn stop(&self) -> Result<(), ControlError> {
        let mut cell = self.shared.state.lock();
        match std::mem::replace(&mut cell.state, ControllerState::Stopped) {
            ControllerState::Scanning { cancel, .. } => {
                cancel.cancel();
                Ok(())
            }
            ControllerState::Stopped => Err(ControlError::AlreadyStopped),
        }
    }
}

impl Shared {
    /// Return to Stopped, unless a newer loop already owns the state.
    fn mark_stopped(&self, run: u64) {
        let mut cell = self.state.lock();
        let owned = matches!(cell.state, ControllerState::Scanning { run: current, .. } if current == run);
        if owned {
            cell.state = ControllerState::Stopped;
        }
    }

    /// Run one bounded session, dispatching advertisements as they arrive.
    async fn run_session(&self, cancel: &CancellationToken) -> Result<SessionEnd, ScanError> {
        let mut events = tokio::select! {
            _ = cancel.cancelled() => return Ok(SessionEnd::Canceled),
            events = self.radio.open_session() => events?,
        };

        let deadline = tokio::time::sleep(self.config.session_duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(SessionEnd::Canceled),
                _ = &mut deadline => return Ok(SessionEnd::Timeout),
                event = events.recv() => match event {
                    Some(Ok(adv)) => {
                        if let Err(e) = dispatch(&self.registry, &adv, &self.config.base_station) {
                            debug!(address = %adv.address, error = %e, "Skipping advertisement");
                        }
                    }
                    Some(Err(e)) => return Err(e),
                    None => return Err(ScanError::StreamClosed),
                },
            }
        }
    }
}

async fn scan_loop(shared: Arc<Shared>, run: u64, cancel: CancellationToken) {
    info!(duration = ?shared.config.session_duration, "Started scanning");

    loop {
        match shared.run_session(&cancel).await {
            Ok(SessionEnd::Timeout) => {
                info!("Scan session complete");
            }
            Ok(SessionEnd::Canceled) => {
                info!("Scan canceled");
                break;
            }
            Err(e) => {
                error!(error = %e, "Radio failure, scanning aborted");
                shared.mark_stopped(run);
                if shared.failures.try_send(e).is_err() {
                    debug!("Radio failure not delivered, receiver gone or full");
                }
                return;
            }
        }
    }

    shared.mark_stopped(run);
    info!("Stopped scanning");
}

/// Decode one advertisement and upsert the resulting record.
///
/// The record is stamped with the current wall clock time. Advertisements
/// that fail to decode leave the registry untouched.
pub fn dispatch(
    registry: &Registry,
    adv: &Advertisement,
    base_station: &str,
) -> Result<(), DecodeError> {
    let device = DetectedDevice::from_advertisement(adv, SystemTime::now(), base_station)?;
    registry.upsert(device);
    Ok(())
}
