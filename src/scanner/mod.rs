//! Radio layer: bounded scan sessions over different Bluetooth backends.
//!
//! A backend only turns received packets into [`Advertisement`]s. Session
//! length, cancellation and decoding all belong to the scan controller.

#[cfg(feature = "bluer")]
pub mod bluer;

#[cfg(feature = "hci")]
pub mod hci;

use crate::advertisement::Advertisement;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::mpsc;

/// Error type for radio operations. Every variant is fatal to the scan loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    /// Bluetooth/adapter related error
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
    /// The backend stopped delivering events before the session ended
    #[error("Advertisement stream closed unexpectedly")]
    StreamClosed,
}

/// One advertisement, or the radio failure that ended the session.
pub type AdvertisementResult = Result<Advertisement, ScanError>;

/// Channel buffer size for advertisement events.
pub const ADVERTISEMENT_CHANNEL_BUFFER_SIZE: usize = 256;

/// Future returned by [`Radio::open_session`].
pub type SessionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<mpsc::Receiver<AdvertisementResult>, ScanError>> + Send + 'a>>;

/// Source of scan sessions. Abstracted so the controller can be driven
/// without Bluetooth hardware.
pub trait Radio: Send + Sync {
    /// Begin scanning and return the stream of received advertisements.
    ///
    /// The session runs until the receiver is dropped. A backend reports an
    /// unrecoverable failure by sending an `Err` or by closing the channel.
    fn open_session(&self) -> SessionFuture<'_>;
}

/// Available scanner backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// BlueZ D-Bus backend (requires bluetoothd daemon)
    #[cfg(feature = "bluer")]
    Bluer,
    /// Raw HCI socket backend (direct kernel access, no daemon required)
    #[cfg(feature = "hci")]
    Hci,
}

impl Default for Backend {
    fn default() -> Self {
        #[cfg(feature = "bluer")]
        return Backend::Bluer;
        #[cfg(all(feature = "hci", not(feature = "bluer")))]
        return Backend::Hci;
        #[cfg(not(any(feature = "bluer", feature = "hci")))]
        compile_error!("At least one backend feature must be enabled");
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "bluer")]
            Backend::Bluer => write!(f, "bluer"),
            #[cfg(feature = "hci")]
            Backend::Hci => write!(f, "hci"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            #[cfg(feature = "bluer")]
            "bluer" | "bluez" => Ok(Backend::Bluer),
            #[cfg(feature = "hci")]
            "hci" | "raw" => Ok(Backend::Hci),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}

/// The radio compiled into this binary, selected by [`Backend`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRadio {
    backend: Backend,
}

impl SystemRadio {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

impl Radio for SystemRadio {
    fn open_session(&self) -> SessionFuture<'_> {
        let backend = self.backend;
        Box::pin(async move {
            match backend {
                #[cfg(feature = "bluer")]
                Backend::Bluer => bluer::open_session().await,
                #[cfg(feature = "hci")]
                Backend::Hci => hci::open_session().await,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_scan_error_display() {
        assert_eq!(
            ScanError::Bluetooth("adapter gone".into()).to_string(),
            "Bluetooth error: adapter gone"
        );
        assert_eq!(
            ScanError::StreamClosed.to_string(),
            "Advertisement stream closed unexpectedly"
        );
    }

    #[test]
    fn test_backend_from_str() {
        #[cfg(feature = "bluer")]
        {
            assert_eq!(Backend::from_str("bluer").unwrap(), Backend::Bluer);
            assert_eq!(Backend::from_str("BlueZ").unwrap(), Backend::Bluer);
        }
        #[cfg(feature = "hci")]
        {
            assert_eq!(Backend::from_str("hci").unwrap(), Backend::Hci);
            assert_eq!(Backend::from_str("raw").unwrap(), Backend::Hci);
        }
        assert!(Backend::from_str("invalid").is_err());
    }

    #[test]
    #[cfg(feature = "bluer")]
    fn test_backend_display_bluer() {
        assert_eq!(Backend::Bluer.to_string(), "bluer");
    }

    #[test]
    #[cfg(feature = "hci")]
    fn test_backend_display_hci() {
        assert_eq!(Backend::Hci.to_string(), "hci");
    }

    #[test]
    #[cfg(feature = "bluer")]
    fn test_system_radio_defaults_to_bluer() {
        assert_eq!(SystemRadio::default().backend, Backend::Bluer);
    }

    #[test]
    #[cfg(all(feature = "hci", not(feature = "bluer")))]
    fn test_system_radio_defaults_to_hci_without_bluer() {
        assert_eq!(SystemRadio::default().backend, Backend::Hci);
    }
}
