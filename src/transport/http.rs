//! HTTP(S) transport.
//!
//! Issues one streaming GET and hands the response body to the orchestrator.
//! The declared size comes from the `Content-Length` header; progress is
//! computed by the orchestrator from the bytes it writes.

use super::{Protocol, ProgressSource, Transport, TransportContext, TransportStream};
use crate::error::{Error, Result};
use crate::http::content_length;

use async_trait::async_trait;
use futures::stream::{StreamExt, TryStreamExt};
use reqwest_middleware::ClientWithMiddleware;
use tracing::{debug, trace};

/// Streams a resource from an HTTP(S) server.
pub struct HttpTransport {
    client: ClientWithMiddleware,
}

impl HttpTransport {
    pub fn new(client: ClientWithMiddleware) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn protocol(&self) -> Protocol {
        Protocol::Http
    }

    async fn open(&mut self, identifier: &str, _ctx: &TransportContext) -> Result<TransportStream> {
        debug!("Fetching {}", identifier);
        let res = self.client.get(identifier).send().await?;

        let res = res
            .error_for_status()
            .map_err(|e| Error::TransportConnectFailed(e.to_string()))?;

        let total = content_length(res.headers());
        debug!(status = %res.status(), ?total, "Response received");

        let body = res
            .bytes_stream()
            .map_err(|e| Error::Transport(e.to_string()))
            .boxed();

        Ok(TransportStream {
            body,
            total,
            progress: ProgressSource::Written,
        })
    }

    async fn close(&mut self) {
        // The response body is owned by the orchestrator and dropped there.
        trace!("Closing HTTP transport");
    }
}
