//! Downloader module containing the download orchestrator, builder pattern, and configuration.
//!
//! This module provides the main [`Downloader`] struct and its associated builder pattern
//! for configuring and running downloads. Each download runs as its own task that drives
//! a transport, writes the destination file and reports through an [`EventStream`].
//!
//! # Overview
//!
//! The downloader module is organized into these components:
//!
//! - `downloader` - Core Downloader struct with the per-download task
//! - `builder` - DownloaderBuilder for flexible configuration using the builder pattern
//! - `config` - Configuration structures and the save prompt type
//! - `events` - EventStream and CancelHandle handed to callers
//! - `cleanup` - Teardown of the resources a download allocated
//!
//! # Examples
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use tributary::downloader::DownloaderBuilder;
//! use tributary::download::DownloadOptions;
//!
//! # async fn example() -> tributary::Result<()> {
//! // Create a downloader with default settings
//! let downloader = DownloaderBuilder::new().build();
//!
//! // Download a torrent and wait for it
//! let path = downloader
//!     .download_async("magnet:?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d53056", DownloadOptions::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Cancelling
//!
//! ```rust,no_run
//! use tributary::downloader::DownloaderBuilder;
//! use tributary::download::{DownloadOptions, DownloadOutcome};
//!
//! # async fn example() {
//! let downloader = DownloaderBuilder::new().build();
//! let events = downloader.download("https://example.com/big.iso", DownloadOptions::new());
//!
//! let handle = events.cancel_handle();
//! handle.cancel();
//!
//! assert!(matches!(events.outcome().await, DownloadOutcome::Cancelled));
//! # }
//! ```

pub mod builder;
pub mod cleanup;
pub mod config;
pub mod downloader;
pub mod events;

pub use builder::DownloaderBuilder;
pub use cleanup::Cleanup;
pub use config::{DownloaderConfig, SavePrompt};
pub use downloader::Downloader;
pub use events::{CancelHandle, EventStream};
