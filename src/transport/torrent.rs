//! BitTorrent transport.
//!
//! Joins a swarm, waits a bounded time for the metadata, refuses anything but
//! single-file torrents and streams that file. Progress and peer counts come
//! from the swarm's own accounting and are forwarded through the
//! [`TransportContext`].
//!
//! The transport moves through `Joining → MetadataReceived → Streaming →
//! {Done, Errored}`; see [`TorrentTransport::phase`].

use super::swarm::{SwarmBackend, SwarmClient, SwarmEvent, SwarmTorrent};
use super::{Protocol, ProgressSource, Transport, TransportContext, TransportStream};
use crate::download::ProgressSnapshot;
use crate::error::{Error, Result};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::task::Poll;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::debug;

/// Default budget for receiving a torrent's metadata.
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(3);

/// Settings of the torrent transport.
#[derive(Clone)]
pub struct TorrentConfig {
    /// How long to wait for the torrent's metadata.
    pub metadata_timeout: Duration,
    /// Swarm engine. Torrent downloads fail when it is missing.
    pub backend: Option<Arc<dyn SwarmBackend>>,
}

impl fmt::Debug for TorrentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TorrentConfig")
            .field("metadata_timeout", &self.metadata_timeout)
            .field("backend", &self.backend.is_some())
            .finish()
    }
}

impl Default for TorrentConfig {
    fn default() -> Self {
        Self {
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
            backend: default_backend(),
        }
    }
}

#[cfg(feature = "rqbit")]
fn default_backend() -> Option<Arc<dyn SwarmBackend>> {
    Some(Arc::new(super::rqbit::RqbitBackend::default()))
}

#[cfg(not(feature = "rqbit"))]
fn default_backend() -> Option<Arc<dyn SwarmBackend>> {
    None
}

/// Where a torrent download stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorrentPhase {
    Joining,
    MetadataReceived,
    Streaming,
    Done,
    Errored,
}

/// Fetches the single file of a torrent.
pub struct TorrentTransport {
    config: TorrentConfig,
    phase: Arc<Mutex<TorrentPhase>>,
    client: Option<Box<dyn SwarmClient>>,
    torrent: Option<Box<dyn SwarmTorrent>>,
    events_task: Option<JoinHandle<()>>,
}

impl TorrentTransport {
    pub fn new(config: TorrentConfig) -> Self {
        Self {
            config,
            phase: Arc::new(Mutex::new(TorrentPhase::Joining)),
            client: None,
            torrent: None,
            events_task: None,
        }
    }

    /// Current phase of the transport.
    pub fn phase(&self) -> TorrentPhase {
        read_phase(&self.phase)
    }

    async fn join(&mut self, magnet: &str, ctx: &TransportContext) -> Result<TransportStream> {
        let backend = self.config.backend.clone().ok_or_else(|| {
            Error::TransportConnectFailed("No swarm backend is configured".into())
        })?;
        let metadata_timeout = self.config.metadata_timeout;

        set_phase(&self.phase, TorrentPhase::Joining);
        let client = self.client.insert(backend.connect().await?);
        let torrent_slot = &mut self.torrent;

        let metadata = timeout(metadata_timeout, async {
            let torrent = torrent_slot.insert(client.add(magnet).await?);
            torrent.metadata().await
        })
        .await
        .map_err(|_| Error::MetadataTimeout(metadata_timeout))??;

        set_phase(&self.phase, TorrentPhase::MetadataReceived);
        debug!(name = ?metadata.name, files = metadata.file_count, length = metadata.length, "Torrent metadata received");

        if metadata.file_count > 1 {
            return Err(Error::MultiFileNotSupported(metadata.file_count));
        }
        if metadata.file_count == 0 {
            return Err(Error::Transport("The torrent contains no file".into()));
        }

        let torrent = self
            .torrent
            .as_mut()
            .ok_or_else(|| Error::Internal("The torrent was released".into()))?;

        ctx.peers(torrent.num_peers());

        if let Some(events) = torrent.events() {
            self.events_task = Some(tokio::spawn(forward_events(events, ctx.clone())));
        }

        let body = torrent.stream(0)?;
        set_phase(&self.phase, TorrentPhase::Streaming);

        let failed = Arc::clone(&self.phase);
        let done = Arc::clone(&self.phase);
        let body = body
            .inspect(move |chunk| {
                if chunk.is_err() {
                    set_phase(&failed, TorrentPhase::Errored);
                }
            })
            .chain(stream::poll_fn(move |_| {
                if read_phase(&done) == TorrentPhase::Streaming {
                    set_phase(&done, TorrentPhase::Done);
                }
                Poll::Ready(None)
            }))
            .boxed();

        Ok(TransportStream {
            body,
            total: Some(metadata.length),
            progress: ProgressSource::Transport,
        })
    }
}

#[async_trait]
impl Transport for TorrentTransport {
    fn protocol(&self) -> Protocol {
        Protocol::Torrent
    }

    async fn open(&mut self, magnet: &str, ctx: &TransportContext) -> Result<TransportStream> {
        let result = self.join(magnet, ctx).await;
        if result.is_err() {
            set_phase(&self.phase, TorrentPhase::Errored);
        }
        result
    }

    async fn close(&mut self) {
        if let Some(task) = self.events_task.take() {
            task.abort();
        }

        if let Some(mut torrent) = self.torrent.take() {
            torrent.destroy().await;
        }

        if let Some(mut client) = self.client.take() {
            client.destroy().await;
        }
    }
}

/// Turns swarm activity into transport signals until the download stops.
async fn forward_events(mut events: UnboundedReceiver<SwarmEvent>, ctx: TransportContext) {
    loop {
        let event = tokio::select! {
            _ = ctx.cancel_token().cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Some(SwarmEvent::Download {
                downloaded,
                length,
                progress,
            }) => ctx.progress(ProgressSnapshot::from_fraction(progress, downloaded, length)),
            Some(SwarmEvent::Wire { peers }) => ctx.peers(peers),
            Some(SwarmEvent::Error(message)) => {
                ctx.fail(Error::Transport(message));
                break;
            }
            None => break,
        }
    }
}

fn read_phase(phase: &Mutex<TorrentPhase>) -> TorrentPhase {
    *phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn set_phase(phase: &Mutex<TorrentPhase>, next: TorrentPhase) {
    *phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
}
