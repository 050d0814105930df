//! Example downloading every identifier given on the command line.
//!
//! ```text
//! RUST_LOG=tributary=debug cargo run --example fetch -- \
//!     https://httpbin.org/bytes/256000 \
//!     QmQPeNsJPyVWPFDVHb9pDWa2qXDvZdFzxcF8eLUc9rQ1bJ
//! ```
//!
//! Press Ctrl-C to cancel every download.

use color_eyre::{eyre::eyre, Result};
use console::style;
use futures::future::join_all;
use indicatif::MultiProgress;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tributary::download::{DownloadEvent, DownloadOptions};
use tributary::progress::{ProgressBarOpts, ProgressDisplay};
use tributary::DownloaderBuilder;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let identifiers: Vec<String> = std::env::args().skip(1).collect();
    if identifiers.is_empty() {
        return Err(eyre!("usage: fetch <identifier>..."));
    }

    let downloader = DownloaderBuilder::new()
        .directory(PathBuf::from("downloads"))
        .build();

    let multi = MultiProgress::new();
    let mut streams = Vec::new();
    for identifier in &identifiers {
        let events = downloader.download(identifier.as_str(), DownloadOptions::new());
        let display = ProgressDisplay::with_multi(multi.clone(), ProgressBarOpts::default());
        streams.push((identifier.clone(), events, display));
    }

    let handles: Vec<_> = streams.iter().map(|(_, events, _)| events.cancel_handle()).collect();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handles.iter().for_each(|handle| handle.cancel());
        }
    });

    let results = join_all(streams.into_iter().map(|(identifier, mut events, display)| async move {
        let mut line = format!("{} {}", style("?").yellow(), identifier);
        while let Some(event) = events.next_event().await {
            display.observe(&event);
            match &event {
                DownloadEvent::Finished(path) => {
                    line = format!("{} {}", style("✔").green(), path.display())
                }
                DownloadEvent::Cancelled => {
                    line = format!("{} {} (cancelled)", style("✘").yellow(), identifier)
                }
                DownloadEvent::Error(e) => {
                    line = format!("{} {}: {}", style("✘").red(), identifier, e)
                }
                _ => {}
            }
        }
        line
    }))
    .await;

    for line in results {
        println!("{line}");
    }

    Ok(())
}
