//! Tributary downloads a resource to a local file from whichever network it
//! lives on: plain HTTP(S), the IPFS content network or a BitTorrent swarm.
//! The protocol is picked from the identifier, and every download reports
//! through the same stream of events.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use tributary::{download::DownloadOptions, downloader::DownloaderBuilder, Error};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Error> {
//! let downloader = DownloaderBuilder::new()
//!     .directory(PathBuf::from("output"))
//!     .build();
//!
//! let path = downloader
//!     .download_async(
//!         "https://github.com/seanmonstar/reqwest/archive/refs/tags/v0.11.9.zip",
//!         DownloadOptions::new(),
//!     )
//!     .await?;
//! println!("{}", path.display());
//! # Ok(())
//! # }
//! ```
//!
//! # Identifiers
//!
//! | Identifier                        | Protocol   |
//! |-----------------------------------|------------|
//! | starts with `Qm`                  | IPFS       |
//! | `magnet:` link or `.torrent` file | BitTorrent |
//! | starts with `http`                | HTTP(S)    |
//!
//! Anything else fails with [`Error::InvalidAddress`].
//!
//! # Module Organization
//!
//! - [`download`] - Requests, options, progress snapshots, events and the download state machine
//! - [`downloader`] - The `Downloader`, its builder and the per-download orchestration
//! - [`transport`] - Protocol resolution and the HTTP, IPFS and BitTorrent transports
//! - [`error`] - Centralized error handling with the `Error` enum
//! - [`http`] - HTTP client functionality and utilities
//! - [`progress`] - Terminal progress bars fed by download events

pub mod download;
pub mod downloader;
pub mod error;
pub mod http;
pub mod progress;
pub mod transport;

pub use download::{
    DownloadEvent, DownloadOptions, DownloadOutcome, DownloadRequest, DownloadState, PeerCount,
    ProgressSnapshot,
};
pub use downloader::{CancelHandle, Downloader, DownloaderBuilder, EventStream};
pub use error::{Error, Result};
pub use http::{create_http_client, HttpClientConfig};
pub use progress::{ProgressBarOpts, ProgressDisplay};
pub use transport::Protocol;

use std::path::PathBuf;

/// Starts a download with a default [`Downloader`].
///
/// Must be called from within a tokio runtime.
pub fn download(request: impl Into<DownloadRequest>, options: DownloadOptions) -> EventStream {
    Downloader::default().download(request, options)
}

/// Downloads a resource with a default [`Downloader`] and returns the written path.
pub async fn download_async(
    request: impl Into<DownloadRequest>,
    options: DownloadOptions,
) -> Result<PathBuf> {
    Downloader::default().download_async(request, options).await
}
