//! Process wiring for `blueblue`.
//!
//! Kept apart from `main.rs` so the whole service can be run against a fake
//! [`Radio`] in tests. `main` only parses options, installs logging and maps
//! the outcome of [`run`] to an exit code.

use crate::controller::{DEFAULT_BASE_STATION, ScanConfig, ScanController};
use crate::http::{self, AppState};
use crate::registry::Registry;
use crate::scanner::{Backend, Radio, ScanError};
use clap::Parser;
use std::fs::OpenOptions;
use std::future::IntoFuture;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 23232;

/// Command line options.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Length of one scan session. Scanning restarts when a session ends.
    /// Accepts duration with suffix: 5s, 500ms, 1m. Without suffix, value is
    /// interpreted as seconds.
    #[arg(short, long, default_value = "5s", value_parser = crate::duration::parse_duration)]
    pub duration: Duration,

    /// HTTP port, bound on all interfaces
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Directory containing the `public` dashboard directory
    /// [default: directory of the executable]
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Bluetooth scanner backend to use
    #[arg(long, default_value_t, value_enum)]
    pub backend: Backend,

    /// Label attached to every record produced by this scanner
    #[arg(long, default_value = DEFAULT_BASE_STATION)]
    pub base_station: String,

    /// Append log output to this file
    #[arg(long, default_value = "blueblue.log")]
    pub log_file: PathBuf,

    /// Start scanning at launch instead of waiting for `/start`
    #[arg(long)]
    pub autostart: bool,

    /// Verbose output, log skipped advertisements
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Errors that end the process.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` overrides the level. Output is appended to `options.log_file`;
/// if it cannot be opened, logs go to stderr instead.
pub fn init_logging(options: &Options) {
    let default_level = if options.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&options.log_file)
    {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
            warn!(
                path = %options.log_file.display(),
                error = %e,
                "Cannot open log file, logging to stderr"
            );
        }
    }
}

/// Directory served at `/public`, also holding `index.html`.
pub fn public_dir(options: &Options) -> io::Result<PathBuf> {
    let base = match &options.dir {
        Some(dir) => dir.clone(),
        None => executable_dir()?,
    };
    Ok(base.join("public"))
}

fn executable_dir() -> io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "executable path has no parent directory",
        )
    })
}

/// Run the scanner and HTTP server until Ctrl-C or a radio failure.
///
/// A radio failure is returned as [`RunError::Scan`]; the server is dropped
/// without draining connections.
pub async fn run(options: Options, radio: Arc<dyn Radio>) -> Result<(), RunError> {
    let public_dir = public_dir(&options)?;

    let config = ScanConfig {
        session_duration: options.duration,
        base_station: options.base_station.clone(),
    };
    let (controller, mut failures) = ScanController::new(radio, Registry::new(), config);

    if options.autostart
        && let Err(e) = controller.start()
    {
        warn!(error = %e, "Autostart ignored");
    }

    let app = http::create_router(AppState::new(controller), &public_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], options.port));
    let listener = TcpListener::bind(addr).await?;
    info!(
        addr = %listener.local_addr()?,
        backend = %options.backend,
        public = %public_dir.display(),
        "HTTP server listening"
    );

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

    tokio::select! {
        result = server => {
            result?;
            info!("HTTP server stopped");
            Ok(())
        }
        Some(e) = failures.recv() => Err(RunError::Scan(e)),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
