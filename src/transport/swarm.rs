//! Swarm engine seam.
//!
//! The torrent transport does not speak the BitTorrent wire protocol itself.
//! It drives an engine through these traits: a [`SwarmBackend`] creates one
//! [`SwarmClient`] per download, the client joins a swarm and returns a
//! [`SwarmTorrent`], and the torrent exposes its metadata, its peers, its
//! progress and a stream of a file's bytes.
//!
//! The `rqbit` feature provides a backend built on `librqbit`.

use super::ByteStream;
use crate::error::Result;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

/// What the swarm told us about a torrent once its metadata arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentMetadata {
    /// Torrent name, if any.
    pub name: Option<String>,
    /// Number of files in the torrent.
    pub file_count: usize,
    /// Total size of the torrent in bytes.
    pub length: u64,
}

/// Activity reported by a torrent.
#[derive(Debug, Clone, PartialEq)]
pub enum SwarmEvent {
    /// Data was received. `progress` is the swarm's own `0..=1` fraction.
    Download {
        downloaded: u64,
        length: u64,
        progress: f64,
    },
    /// A peer connection was made or dropped.
    Wire { peers: u32 },
    /// The engine failed.
    Error(String),
}

/// Creates a swarm client per download.
#[async_trait]
pub trait SwarmBackend: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn SwarmClient>>;
}

/// A swarm client owned by one download.
#[async_trait]
pub trait SwarmClient: Send {
    /// Joins the swarm of a magnet link or torrent address.
    async fn add(&mut self, magnet: &str) -> Result<Box<dyn SwarmTorrent>>;

    /// Shuts the client down. Must not fail.
    async fn destroy(&mut self);
}

/// A torrent being fetched.
#[async_trait]
pub trait SwarmTorrent: Send {
    /// Waits for the torrent's metadata.
    async fn metadata(&mut self) -> Result<TorrentMetadata>;

    /// Number of connected peers.
    fn num_peers(&self) -> u32;

    /// Activity feed. Returns `None` once taken.
    fn events(&mut self) -> Option<UnboundedReceiver<SwarmEvent>>;

    /// Streams the bytes of one file, in order.
    fn stream(&mut self, file_index: usize) -> Result<ByteStream>;

    /// Stops the torrent. Must not fail.
    async fn destroy(&mut self);
}
