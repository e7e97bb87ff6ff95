// src/lib.rs

pub mod cli;
pub mod errors;
pub mod fetch;
pub mod loader;
pub mod logging;
pub mod watch;

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use crate::errors::Error;
pub use crate::fetch::ConditionalFetcher;
pub use crate::loader::{Loader, LoaderBuilder};
pub use crate::watch::{Update, UpdateStream};

use crate::cli::CliArgs;

/// High-level entry point used by `main.rs`.
///
/// One-shot mode fetches the URI and writes the payload to stdout. Watch
/// mode streams every change (and every failed poll) until Ctrl-C.
pub async fn run(args: CliArgs) -> Result<()> {
    let loader = Loader::new();

    if !args.watch {
        let payload = loader.load(&args.uri).await?;
        std::io::stdout().write_all(&payload)?;
        return Ok(());
    }

    let token = CancellationToken::new();

    // Ctrl-C → cancel the watch; the stream closes once the watcher has
    // disposed.
    {
        let token = token.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            token.cancel();
        });
    }

    let interval = Duration::from_secs(args.interval.max(1));
    let stream = loader.watch(&args.uri, interval, token).await;
    info!(uri = %args.uri, ?interval, "watching");

    while let Some(update) = stream.recv().await {
        match update {
            Update::Data(data) => {
                info!(uri = %args.uri, bytes = data.len(), "resource changed");
                let mut stdout = std::io::stdout();
                stdout.write_all(&data)?;
                stdout.flush()?;
            }
            Update::Failed(err) => {
                warn!(uri = %args.uri, error = %err, "poll failed");
            }
        }
    }

    info!(uri = %args.uri, "watch ended");
    Ok(())
}
