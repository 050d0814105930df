//! Download module containing the request, event and lifecycle types.
//!
//! This module provides everything that describes a single download
//! independently of how its bytes are produced: what to fetch and where to
//! store it, the progress measurements reported while it runs, the events a
//! caller observes, and the state machine that orders those events.
//!
//! # Overview
//!
//! - [`request`] - [`DownloadRequest`], [`DownloadOptions`] and destination resolution
//! - [`progress`] - [`ProgressSnapshot`] and [`PeerCount`] measurements
//! - [`event`] - [`DownloadEvent`] and the terminal [`DownloadOutcome`]
//! - [`state`] - the per-download [`DownloadState`] machine
//!
//! # Examples
//!
//! ## Describing a Download
//!
//! ```rust
//! use tributary::download::{DownloadOptions, DownloadRequest};
//! use std::path::PathBuf;
//!
//! let request = DownloadRequest::from("https://example.com/files/model.zip");
//! assert_eq!(request.filename(), "model.zip");
//!
//! let options = DownloadOptions::new()
//!     .directory(PathBuf::from("downloads"))
//!     .filename("renamed.zip");
//! # let _ = options;
//! ```
//!
//! ## Measuring Progress
//!
//! ```rust
//! use tributary::download::ProgressSnapshot;
//!
//! let snapshot = ProgressSnapshot::from_bytes(250, Some(1000));
//! assert_eq!(snapshot.percent, Some(25.0));
//!
//! let unknown = ProgressSnapshot::from_bytes(250, None);
//! assert_eq!(unknown.percent, None);
//! ```

pub mod event;
pub mod progress;
pub mod request;
pub mod state;

pub use event::{DownloadEvent, DownloadOutcome};
pub use progress::{PeerCount, ProgressSnapshot};
pub use request::{derive_filename, DownloadOptions, DownloadRequest, ResolvedDestination};
pub use state::DownloadState;
