use blueblue::app::{self, Options};
use blueblue::scanner::SystemRadio;
use clap::Parser;
use std::panic::{self, PanicHookInfo};
use std::sync::Arc;

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

#[tokio::main]
async fn main() {
    // Process managers (e.g. systemd) restart on a non-zero exit status
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    let options = Options::parse();
    app::init_logging(&options);

    let radio = Arc::new(SystemRadio::new(options.backend));

    match app::run(options, radio).await {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(why) => {
            tracing::error!(error = %why, "Exiting");
            eprintln!("error: {}", why);
            std::process::exit(EXIT_ERROR);
        }
    }
}
