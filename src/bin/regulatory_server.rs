//! labelcheck-regulatory: reference regulatory tool server over stdio
//!
//! Reads JSON-RPC requests from stdin, one per line, and writes one response
//! line per request to stdout. Logs go to stderr.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let handled = labelcheck::reference::serve(stdin.lock(), stdout.lock())?;
    info!(handled, "Input closed");
    Ok(())
}
