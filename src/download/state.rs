//! Per-download state machine.
//!
//! A download moves through `Idle → Downloading → {Finished, Cancelled,
//! Errored} → Closed`. [`Lifecycle::apply`] is the only place where the state
//! changes, and every event a caller sees is emitted from there. Signals that
//! do not fit the current state, such as progress arriving after a
//! cancellation, are dropped.

use super::event::DownloadEvent;
use super::progress::{PeerCount, ProgressSnapshot};
use crate::error::Error;

use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;
use tracing::{debug, trace};

/// State of a single download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Idle,
    Downloading,
    Finished,
    Cancelled,
    Errored,
    Closed,
}

impl DownloadState {
    /// Returns `true` once the outcome is decided.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DownloadState::Finished
                | DownloadState::Cancelled
                | DownloadState::Errored
                | DownloadState::Closed
        )
    }
}

/// Inputs of the state machine.
#[derive(Debug)]
pub(crate) enum Signal {
    Begin,
    Progress(ProgressSnapshot),
    Peers(PeerCount),
    WriteComplete(PathBuf),
    CancelRequested,
    Failed(Error),
    Close,
}

/// Owns the state of one download and the sending half of its event channel.
///
/// The state is published on a watch channel so callers can read it without
/// consuming events.
pub(crate) struct Lifecycle {
    state: watch::Sender<DownloadState>,
    events: UnboundedSender<DownloadEvent>,
}

impl Lifecycle {
    pub(crate) fn new(events: UnboundedSender<DownloadEvent>) -> Self {
        Self {
            state: watch::Sender::new(DownloadState::Idle),
            events,
        }
    }

    pub(crate) fn state(&self) -> DownloadState {
        *self.state.borrow()
    }

    /// A receiver following every state change.
    pub(crate) fn subscribe(&self) -> watch::Receiver<DownloadState> {
        self.state.subscribe()
    }

    /// Applies a signal, emitting the matching event.
    ///
    /// Returns `false` when the signal was ignored.
    pub(crate) fn apply(&mut self, signal: Signal) -> bool {
        use DownloadState::*;

        let current = self.state();
        let (next, event) = match (current, signal) {
            (Idle, Signal::Begin) => (Downloading, None),
            (Downloading, Signal::Progress(snapshot)) => {
                (Downloading, Some(DownloadEvent::Progress(snapshot)))
            }
            (Downloading, Signal::Peers(peers)) => (Downloading, Some(DownloadEvent::Peers(peers))),
            (Downloading, Signal::WriteComplete(path)) => {
                (Finished, Some(DownloadEvent::Finished(path)))
            }
            (Idle | Downloading, Signal::CancelRequested) => {
                (Cancelled, Some(DownloadEvent::Cancelled))
            }
            (Idle | Downloading, Signal::Failed(e)) => (Errored, Some(DownloadEvent::Error(e))),
            (Finished | Cancelled | Errored, Signal::Close) => (Closed, Some(DownloadEvent::Closed)),
            (state, signal) => {
                trace!(?state, ?signal, "Ignoring signal");
                return false;
            }
        };

        if next != current {
            debug!(from = ?current, to = ?next, "Download state changed");
            self.state.send_replace(next);
        }

        if let Some(event) = event {
            // The caller may have dropped the stream; the download still runs
            // to completion so that cleanup happens.
            let _ = self.events.send(event);
        }

        true
    }
}
