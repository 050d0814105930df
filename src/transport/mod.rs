//! Transport module containing the protocol-specific byte producers.
//!
//! Every protocol implements the [`Transport`] capability: `open` turns an
//! identifier into a [`TransportStream`], and `close` releases whatever the
//! transport allocated. The orchestrator in [`crate::downloader`] is written
//! once against this trait and never against a particular protocol.
//!
//! # Overview
//!
//! - [`resolver`] - [`Protocol`] classification of identifiers
//! - [`http`] - HTTP(S) streaming
//! - [`node`] / [`content`] - ephemeral IPFS node and the content transport
//! - [`swarm`] / [`torrent`] - swarm engine seam and the torrent transport
//!
//! Side information that is not part of the byte stream (peer counts,
//! transport-computed progress, late failures) is sent through the
//! [`TransportContext`] handed to `open`.

pub mod content;
pub mod http;
pub mod node;
pub mod resolver;
#[cfg(feature = "rqbit")]
pub mod rqbit;
pub mod swarm;
pub mod torrent;

pub use content::ContentTransport;
pub use http::HttpTransport;
pub use node::{ContentNode, NodeApi, NodeConfig};
pub use resolver::Protocol;
pub use swarm::{SwarmBackend, SwarmClient, SwarmEvent, SwarmTorrent, TorrentMetadata};
pub use torrent::{TorrentConfig, TorrentPhase, TorrentTransport};

use crate::download::{PeerCount, ProgressSnapshot};
use crate::error::{Error, Result};
use crate::http::{create_http_client, HttpClientConfig};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

/// Stream of chunks produced by a transport.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Who measures the progress of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSource {
    /// Progress is derived from the bytes written to the destination.
    Written,
    /// The transport reports progress through its [`TransportContext`].
    Transport,
}

/// An opened transport.
pub struct TransportStream {
    /// The resource's bytes.
    pub body: ByteStream,
    /// Declared total size, if known.
    pub total: Option<u64>,
    /// How progress is measured.
    pub progress: ProgressSource,
}

/// Side signals sent by a transport while it runs.
#[derive(Debug)]
pub enum TransportSignal {
    Progress(ProgressSnapshot),
    Peers(PeerCount),
    Failed(Error),
}

/// Per-download channel between a transport and the orchestrator.
///
/// Background work started by a transport must stop once
/// [`TransportContext::cancel_token`] is cancelled.
#[derive(Debug, Clone)]
pub struct TransportContext {
    signals: UnboundedSender<TransportSignal>,
    cancel: CancellationToken,
}

impl TransportContext {
    /// Creates a context and the receiving end of its signals.
    pub fn new(cancel: CancellationToken) -> (Self, UnboundedReceiver<TransportSignal>) {
        let (signals, rx) = mpsc::unbounded_channel();
        (Self { signals, cancel }, rx)
    }

    /// Reports transport-measured progress.
    pub fn progress(&self, snapshot: ProgressSnapshot) {
        self.send(TransportSignal::Progress(snapshot));
    }

    /// Reports the number of peers.
    pub fn peers(&self, count: u32) {
        self.send(TransportSignal::Peers(PeerCount::new(count)));
    }

    /// Reports a failure noticed outside of the byte stream.
    pub fn fail(&self, error: Error) {
        self.send(TransportSignal::Failed(error));
    }

    /// Token cancelled when the download is torn down.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn send(&self, signal: TransportSignal) {
        // Nobody listens once the download is closed.
        let _ = self.signals.send(signal);
    }
}

/// A protocol-specific way of producing a resource's bytes.
///
/// A transport instance serves exactly one download. Every resource it
/// allocates must be stored on `self` as soon as it exists, so that
/// [`Transport::close`] can release it even when `open` failed or was
/// cancelled half-way.
#[async_trait]
pub trait Transport: Send {
    /// The protocol served by this transport.
    fn protocol(&self) -> Protocol;

    /// Starts producing the bytes of `identifier`.
    async fn open(&mut self, identifier: &str, ctx: &TransportContext) -> Result<TransportStream>;

    /// Releases every resource of the transport.
    ///
    /// Must be idempotent and must not fail: teardown errors are logged.
    async fn close(&mut self);
}

/// Creates a fresh transport for each download.
pub trait TransportFactory: Send + Sync {
    fn create(&self, protocol: Protocol) -> Result<Box<dyn Transport>>;
}

/// The factory used unless another one is configured.
#[derive(Debug, Clone, Default)]
pub struct DefaultTransports {
    http: HttpClientConfig,
    node: NodeConfig,
    torrent: TorrentConfig,
}

impl DefaultTransports {
    pub fn new(http: HttpClientConfig, node: NodeConfig, torrent: TorrentConfig) -> Self {
        Self { http, node, torrent }
    }
}

impl TransportFactory for DefaultTransports {
    fn create(&self, protocol: Protocol) -> Result<Box<dyn Transport>> {
        let transport: Box<dyn Transport> = match protocol {
            Protocol::Http => {
                let client = create_http_client(self.http.clone())
                    .map_err(|e| Error::Internal(format!("Unable to build the HTTP client: {e}")))?;
                Box::new(HttpTransport::new(client))
            }
            Protocol::Content => Box::new(ContentTransport::new(self.node.clone())),
            Protocol::Torrent => Box::new(TorrentTransport::new(self.torrent.clone())),
        };
        Ok(transport)
    }
}
