//! Content-addressed (IPFS) transport.
//!
//! Provisions a private node per download, resolves the content's size, then
//! streams it while a background task counts the providers.

use super::node::{ContentNode, NodeConfig};
use super::{Protocol, ProgressSource, Transport, TransportContext, TransportStream};
use crate::error::Result;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Fetches a content id through an ephemeral IPFS node.
pub struct ContentTransport {
    config: NodeConfig,
    node: Option<ContentNode>,
    peers_task: Option<JoinHandle<()>>,
}

impl ContentTransport {
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            node: None,
            peers_task: None,
        }
    }

    /// Starts the provider lookup in the background.
    ///
    /// Its result is reported as a peer count; failures are ignored.
    fn spawn_peer_lookup(&mut self, cid: &str, ctx: &TransportContext) -> Result<()> {
        let Some(node) = self.node.as_ref() else {
            return Ok(());
        };
        let api = node.api()?.clone();
        let cid = cid.to_string();
        let ctx = ctx.clone();
        let budget = self.config.peers_timeout;

        self.peers_task = Some(tokio::spawn(async move {
            tokio::select! {
                _ = ctx.cancel_token().cancelled() => {}
                result = api.providers(&cid, budget) => match result {
                    Ok(count) => ctx.peers(count),
                    Err(e) => debug!("Provider lookup failed: {}", e),
                },
            }
        }));

        Ok(())
    }
}

#[async_trait]
impl Transport for ContentTransport {
    fn protocol(&self) -> Protocol {
        Protocol::Content
    }

    async fn open(&mut self, cid: &str, ctx: &TransportContext) -> Result<TransportStream> {
        let node = self.node.insert(ContentNode::provision(&self.config).await?);
        node.start(&self.config).await?;
        let api = node.api()?.clone();

        if let Some(peer) = &self.config.bootstrap_peer {
            debug!("Connecting to providers...");
            match api.connect(peer).await {
                Ok(()) => debug!("Connected!"),
                Err(e) => warn!("Unable to connect to {}: {}", peer, e),
            }
        }

        debug!("Obtaining file {} information...", cid);
        let total = api.cumulative_size(cid, self.config.stat_timeout).await?;

        debug!(total, "Downloading...");
        let body = api.cat(cid).await?;

        self.spawn_peer_lookup(cid, ctx)?;

        Ok(TransportStream {
            body,
            total: Some(total),
            progress: ProgressSource::Written,
        })
    }

    async fn close(&mut self) {
        if let Some(task) = self.peers_task.take() {
            task.abort();
        }

        if let Some(mut node) = self.node.take() {
            node.stop().await;
        }
    }
}
