//! Events emitted by a running download and its terminal outcome.

use super::progress::{PeerCount, ProgressSnapshot};
use crate::error::{Error, Result};

use std::path::PathBuf;

/// Something that happened to a download.
///
/// Events of one download are delivered in the order they were produced.
/// Exactly one of [`DownloadEvent::Finished`], [`DownloadEvent::Cancelled`] or
/// [`DownloadEvent::Error`] is emitted, and [`DownloadEvent::Closed`] is always
/// the last event.
#[derive(Debug)]
pub enum DownloadEvent {
    /// Transfer progress.
    Progress(ProgressSnapshot),
    /// Number of peers serving the resource.
    Peers(PeerCount),
    /// The download failed.
    Error(Error),
    /// The resource was fully written to this path.
    Finished(PathBuf),
    /// The download was cancelled by the user.
    Cancelled,
    /// Every resource of the download has been released.
    Closed,
}

impl DownloadEvent {
    /// Short lowercase name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            DownloadEvent::Progress(_) => "progress",
            DownloadEvent::Peers(_) => "peers",
            DownloadEvent::Error(_) => "error",
            DownloadEvent::Finished(_) => "finish",
            DownloadEvent::Cancelled => "cancelled",
            DownloadEvent::Closed => "close",
        }
    }

    /// Returns `true` for the event that decides the outcome.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadEvent::Error(_) | DownloadEvent::Finished(_) | DownloadEvent::Cancelled
        )
    }
}

/// How a download ended.
#[derive(Debug)]
pub enum DownloadOutcome {
    Finished(PathBuf),
    Cancelled,
    Failed(Error),
}

impl DownloadOutcome {
    /// Converts the outcome into a result, reporting a cancellation as
    /// [`Error::UserCancelled`].
    pub fn into_result(self) -> Result<PathBuf> {
        match self {
            DownloadOutcome::Finished(path) => Ok(path),
            DownloadOutcome::Cancelled => Err(Error::UserCancelled),
            DownloadOutcome::Failed(e) => Err(e),
        }
    }
}
