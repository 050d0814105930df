//! Teardown of everything a download allocated.
//!
//! A [`Cleanup`] owns the resources of one download: the transport's byte
//! stream, the destination file handle, the path of the partial file and the
//! transport itself. Resources are registered the moment they exist, so a
//! download interrupted at any point is torn down by the same code.

use crate::error::{Error, Result};
use crate::transport::{ByteStream, Transport};

use bytes::Bytes;
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Resources of one download, released in a fixed order.
pub struct Cleanup {
    input: Option<ByteStream>,
    output: Option<File>,
    partial: Option<PathBuf>,
    transport: Option<Box<dyn Transport>>,
    token: CancellationToken,
    closed: bool,
}

impl Cleanup {
    /// Creates an empty controller.
    ///
    /// `token` is handed to the transport and cancelled on close, which stops
    /// its background work.
    pub fn new(token: CancellationToken) -> Self {
        Self {
            input: None,
            output: None,
            partial: None,
            transport: None,
            token,
            closed: false,
        }
    }

    /// Token cancelled when the controller closes.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns `true` once [`Cleanup::close`] ran.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Path of the file being written, until it is settled.
    pub fn partial(&self) -> Option<&Path> {
        self.partial.as_deref()
    }

    /// Creates the destination file and its parent directories.
    pub async fn create_output(&mut self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file = File::create(path).await?;
        self.partial = Some(path.to_path_buf());
        self.output = Some(file);
        Ok(())
    }

    /// Takes ownership of a transport so that it is closed with the download.
    pub fn register_transport(&mut self, transport: Box<dyn Transport>) -> &mut Box<dyn Transport> {
        self.transport.insert(transport)
    }

    /// Sets the stream the download reads from.
    pub fn set_input(&mut self, input: ByteStream) {
        self.input = Some(input);
    }

    /// Next chunk of the input, or `None` once it is exhausted or released.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes>> {
        match self.input.as_mut() {
            Some(input) => input.next().await,
            None => None,
        }
    }

    /// Appends a chunk to the destination.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        let output = self
            .output
            .as_mut()
            .ok_or_else(|| Error::Internal("The destination is not open".into()))?;
        output.write_all(chunk).await?;
        Ok(())
    }

    /// Flushes the destination to disk.
    pub async fn finish_output(&mut self) -> Result<()> {
        if let Some(output) = self.output.as_mut() {
            output.flush().await?;
            output.sync_all().await?;
        }
        Ok(())
    }

    /// Releases the input and the destination handle. The destination file is
    /// deleted unless `keep` is set.
    pub async fn settle(&mut self, keep: bool) {
        drop(self.input.take());
        drop(self.output.take());

        if let Some(path) = self.partial.take() {
            if !keep {
                remove_partial(&path).await;
            }
        }
    }

    /// Releases every resource. Only the first call has an effect.
    pub async fn close(&mut self, keep: bool) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.settle(keep).await;
        self.token.cancel();

        if let Some(mut transport) = self.transport.take() {
            debug!(protocol = %transport.protocol(), "Closing transport");
            transport.close().await;
        }
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        if !self.closed {
            self.token.cancel();
        }
    }
}

/// Best-effort removal of a partial download.
async fn remove_partial(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial file {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Unable to remove partial file {}: {}", path.display(), e),
    }
}
