//! Logging setup.
//!
//! stdout is reserved for the protocol channel; all diagnostics go to
//! stderr. `RUST_LOG` overrides the verbosity-derived default filter.

use std::io::IsTerminal;

use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the tracing subscriber. Call once at startup.
pub fn init_logging(verbosity: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mcx_core={default_level}")));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}
