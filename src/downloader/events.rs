//! Caller side of a running download.

use crate::download::{DownloadEvent, DownloadOutcome, DownloadState};
use crate::error::{Error, Result};

use futures::Stream;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// The events of one download, in the order they happened.
///
/// The stream ends after [`DownloadEvent::Closed`]. Dropping it does not stop
/// the download; call [`EventStream::cancel`] for that.
#[derive(Debug)]
pub struct EventStream {
    events: UnboundedReceiver<DownloadEvent>,
    cancel: CancellationToken,
    state: watch::Receiver<DownloadState>,
}

impl EventStream {
    pub(crate) fn new(
        events: UnboundedReceiver<DownloadEvent>,
        cancel: CancellationToken,
        state: watch::Receiver<DownloadState>,
    ) -> Self {
        Self {
            events,
            cancel,
            state,
        }
    }

    /// Current state of the download.
    ///
    /// This runs ahead of the events: it can already be terminal while the
    /// matching event is still queued.
    pub fn state(&self) -> DownloadState {
        *self.state.borrow()
    }

    /// Waits for the next event.
    pub async fn next_event(&mut self) -> Option<DownloadEvent> {
        self.events.recv().await
    }

    /// Asks the download to stop. Has no effect once its outcome is decided.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A handle that can cancel the download from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            token: self.cancel.clone(),
            state: self.state.clone(),
        }
    }

    /// Consumes the remaining events and returns how the download ended.
    pub async fn outcome(mut self) -> DownloadOutcome {
        let mut outcome = None;

        while let Some(event) = self.events.recv().await {
            match event {
                DownloadEvent::Finished(path) => outcome = Some(DownloadOutcome::Finished(path)),
                DownloadEvent::Cancelled => outcome = Some(DownloadOutcome::Cancelled),
                DownloadEvent::Error(e) => outcome = Some(DownloadOutcome::Failed(e)),
                DownloadEvent::Closed => break,
                DownloadEvent::Progress(_) | DownloadEvent::Peers(_) => {}
            }
        }

        outcome.unwrap_or_else(|| {
            DownloadOutcome::Failed(Error::Internal("The download stopped without an outcome".into()))
        })
    }

    /// Waits for the download to end and returns the written file.
    pub async fn wait(self) -> Result<PathBuf> {
        self.outcome().await.into_result()
    }
}

impl Stream for EventStream {
    type Item = DownloadEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_recv(cx)
    }
}

/// Cancels a download. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
    state: watch::Receiver<DownloadState>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once a cancellation was requested, even if the download
    /// had already finished.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Current state of the download.
    pub fn state(&self) -> DownloadState {
        *self.state.borrow()
    }
}
