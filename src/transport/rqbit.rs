//! Swarm backend built on `librqbit`.
//!
//! Each client runs its own `librqbit` session writing into a private
//! temporary directory, which is removed when the client is destroyed.
//! `librqbit` resolves magnet metadata while adding a torrent, so the whole
//! `add` call is covered by the transport's metadata timeout. Activity is
//! sampled from the torrent's statistics.

use super::swarm::{SwarmBackend, SwarmClient, SwarmEvent, SwarmTorrent, TorrentMetadata};
use super::ByteStream;
use crate::error::{Error, Result};

use async_trait::async_trait;
use futures::stream::{StreamExt, TryStreamExt};
use librqbit::{AddTorrent, AddTorrentOptions, ManagedTorrent, Session};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Handle to a torrent managed by a session (not re-exported by `librqbit`).
type ManagedTorrentHandle = Arc<ManagedTorrent>;

/// Interval between two statistics samples.
const STATS_INTERVAL: Duration = Duration::from_millis(500);

/// Creates one `librqbit` session per download.
#[derive(Debug, Clone, Default)]
pub struct RqbitBackend {
    /// Directory holding the per-download session folders. Defaults to the
    /// system temporary directory.
    pub temp_root: Option<PathBuf>,
}

#[async_trait]
impl SwarmBackend for RqbitBackend {
    async fn connect(&self) -> Result<Box<dyn SwarmClient>> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("tributary-torrent-");
        let dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| Error::TransportConnectFailed(format!("Unable to create the session folder: {e}")))?;

        let session = Session::new(dir.path().to_path_buf())
            .await
            .map_err(|e| Error::TransportConnectFailed(format!("{e:#}")))?;

        Ok(Box::new(RqbitClient {
            session: Some(session),
            dir: Some(dir),
        }))
    }
}

struct RqbitClient {
    session: Option<Arc<Session>>,
    dir: Option<TempDir>,
}

#[async_trait]
impl SwarmClient for RqbitClient {
    async fn add(&mut self, magnet: &str) -> Result<Box<dyn SwarmTorrent>> {
        let session = self
            .session
            .clone()
            .ok_or_else(|| Error::Internal("The torrent session was destroyed".into()))?;

        let response = session
            .add_torrent(
                AddTorrent::from_url(magnet),
                Some(AddTorrentOptions {
                    overwrite: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| Error::TransportConnectFailed(format!("{e:#}")))?;

        let handle = response
            .into_handle()
            .ok_or_else(|| Error::Transport("The torrent was not added to the session".into()))?;

        Ok(Box::new(RqbitTorrent {
            session,
            handle,
            sampler: None,
        }))
    }

    async fn destroy(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop().await;
        }
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                warn!("Unable to remove the torrent session folder: {}", e);
            }
        }
    }
}

struct RqbitTorrent {
    session: Arc<Session>,
    handle: ManagedTorrentHandle,
    sampler: Option<JoinHandle<()>>,
}

fn live_peers(handle: &ManagedTorrentHandle) -> u32 {
    handle
        .stats()
        .live
        .map(|live| live.snapshot.peer_stats.live as u32)
        .unwrap_or(0)
}

#[async_trait]
impl SwarmTorrent for RqbitTorrent {
    async fn metadata(&mut self) -> Result<TorrentMetadata> {
        self.handle
            .wait_until_initialized()
            .await
            .map_err(|e| Error::Transport(format!("{e:#}")))?;

        let stats = self.handle.stats();
        Ok(TorrentMetadata {
            name: self.handle.name(),
            file_count: stats.file_progress.len(),
            length: stats.total_bytes,
        })
    }

    fn num_peers(&self) -> u32 {
        live_peers(&self.handle)
    }

    fn events(&mut self) -> Option<UnboundedReceiver<SwarmEvent>> {
        if self.sampler.is_some() {
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.handle.clone();
        self.sampler = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(STATS_INTERVAL);
            let mut last = (u64::MAX, u32::MAX);
            loop {
                interval.tick().await;
                let stats = handle.stats();
                if let Some(error) = stats.error {
                    let _ = tx.send(SwarmEvent::Error(error));
                    break;
                }

                let peers = live_peers(&handle);
                if peers != last.1 && tx.send(SwarmEvent::Wire { peers }).is_err() {
                    break;
                }
                if stats.progress_bytes != last.0 {
                    let progress = if stats.total_bytes > 0 {
                        stats.progress_bytes as f64 / stats.total_bytes as f64
                    } else {
                        0.0
                    };
                    let event = SwarmEvent::Download {
                        downloaded: stats.progress_bytes,
                        length: stats.total_bytes,
                        progress,
                    };
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                last = (stats.progress_bytes, peers);
            }
        }));

        Some(rx)
    }

    fn stream(&mut self, file_index: usize) -> Result<ByteStream> {
        let reader = self
            .handle
            .clone()
            .stream(file_index)
            .map_err(|e| Error::Transport(format!("{e:#}")))?;

        Ok(ReaderStream::new(reader)
            .map_err(|e| Error::Transport(e.to_string()))
            .boxed())
    }

    async fn destroy(&mut self) {
        if let Some(sampler) = self.sampler.take() {
            sampler.abort();
        }

        let id = self.handle.id();
        if let Err(e) = self.session.delete(id.into(), false).await {
            debug!("Unable to remove torrent {}: {:#}", id, e);
        }
    }
}
