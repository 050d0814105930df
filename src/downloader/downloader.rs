//! Core downloader implementation.
//!
//! This module contains the main [`Downloader`] struct. Every download runs in
//! its own tokio task that resolves the protocol, picks the destination, opens
//! a transport and copies its bytes to disk, reporting through an
//! [`EventStream`].
//!
//! # Examples
//!
//! ## Basic Download
//!
//! ```rust,no_run
//! use tributary::downloader::DownloaderBuilder;
//! use tributary::download::{DownloadEvent, DownloadOptions};
//!
//! # async fn example() -> tributary::Result<()> {
//! let downloader = DownloaderBuilder::new().build();
//! let mut events = downloader.download(
//!     "https://example.com/file.zip",
//!     DownloadOptions::new(),
//! );
//!
//! while let Some(event) = events.next_event().await {
//!     if let DownloadEvent::Progress(p) = event {
//!         println!("{:?}%", p.percent);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Waiting for the Result
//!
//! ```rust,no_run
//! use tributary::downloader::DownloaderBuilder;
//! use tributary::download::DownloadOptions;
//!
//! # async fn example() -> tributary::Result<()> {
//! let downloader = DownloaderBuilder::new().build();
//! let path = downloader
//!     .download_async(
//!         "QmQPeNsJPyVWPFDVHb9pDWa2qXDvZdFzxcF8eLUc9rQ1bJ",
//!         DownloadOptions::new().filename("readme.txt"),
//!     )
//!     .await?;
//! println!("Saved to {}", path.display());
//! # Ok(())
//! # }
//! ```

use super::cleanup::Cleanup;
use super::config::DownloaderConfig;
use super::events::EventStream;
use crate::download::state::{Lifecycle, Signal};
use crate::download::{DownloadOptions, DownloadRequest, ProgressSnapshot, ResolvedDestination};
use crate::error::{Error, Result};
use crate::transport::{
    DefaultTransports, ProgressSource, TransportContext, TransportFactory, TransportSignal,
};

use reqwest::header::HeaderMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Represents the download controller.
///
/// A downloader can be created via its builder:
///
/// ```rust
/// # fn main()  {
/// use tributary::downloader::DownloaderBuilder;
///
/// let d = DownloaderBuilder::new().build();
/// # }
/// ```
#[derive(Clone)]
pub struct Downloader {
    config: Arc<DownloaderConfig>,
    transports: Arc<dyn TransportFactory>,
}

impl fmt::Debug for Downloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Downloader")
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new(DownloaderConfig::default())
    }
}

impl Downloader {
    /// Creates a new Downloader with the given configuration.
    pub(crate) fn new(config: DownloaderConfig) -> Self {
        let transports = config.transports.clone().unwrap_or_else(|| {
            Arc::new(DefaultTransports::new(
                config.http.clone(),
                config.node.clone(),
                config.torrent.clone(),
            ))
        });

        Self {
            config: Arc::new(config),
            transports,
        }
    }

    /// Gets the directory where files are downloaded by default.
    pub fn directory(&self) -> &Path {
        &self.config.directory
    }

    /// Gets the number of retries of the HTTP requests.
    pub fn retries(&self) -> u32 {
        self.config.http.retries
    }

    /// Gets the custom headers.
    pub fn headers(&self) -> Option<&HeaderMap> {
        self.config.http.headers.as_ref()
    }

    /// Gets the configuration.
    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    /// Starts a download in the background and returns its events.
    ///
    /// Must be called from within a tokio runtime.
    pub fn download(
        &self,
        request: impl Into<DownloadRequest>,
        options: DownloadOptions,
    ) -> EventStream {
        let request = request.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let span = info_span!("download", identifier = %request.identifier());
        let lifecycle = Lifecycle::new(tx);
        let state = lifecycle.subscribe();
        let this = self.clone();
        let token = cancel.clone();
        tokio::spawn(
            async move { this.run(request, options, lifecycle, token).await }.instrument(span),
        );

        EventStream::new(rx, cancel, state)
    }

    /// Downloads a resource and returns the path it was written to.
    ///
    /// A cancellation is reported as [`Error::UserCancelled`].
    pub async fn download_async(
        &self,
        request: impl Into<DownloadRequest>,
        options: DownloadOptions,
    ) -> Result<PathBuf> {
        self.download(request, options).wait().await
    }

    /// Runs one download to its end, then tears it down.
    async fn run(
        &self,
        request: DownloadRequest,
        options: DownloadOptions,
        mut lifecycle: Lifecycle,
        cancel: CancellationToken,
    ) {
        let mut cleanup = Cleanup::new(cancel.child_token());

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::UserCancelled),
            result = self.drive(&request, &options, &mut cleanup, &mut lifecycle) => result,
        };

        let terminal = match result {
            // Cancellation wins over a write that completed concurrently.
            Ok(_) if cancel.is_cancelled() => Signal::CancelRequested,
            Ok(path) => Signal::WriteComplete(path),
            Err(e) if e.is_cancelled() => Signal::CancelRequested,
            Err(e) => Signal::Failed(e),
        };

        let keep = matches!(terminal, Signal::WriteComplete(_));
        cleanup.settle(keep).await;

        match &terminal {
            Signal::WriteComplete(path) => debug!("Download finished: {}", path.display()),
            Signal::CancelRequested => info!("Download cancelled"),
            Signal::Failed(e) => warn!("Download failed: {}", e),
            _ => {}
        }
        lifecycle.apply(terminal);

        cleanup.close(keep).await;
        lifecycle.apply(Signal::Close);
    }

    /// Resolves, opens and copies the resource. Returns the written path.
    async fn drive(
        &self,
        request: &DownloadRequest,
        options: &DownloadOptions,
        cleanup: &mut Cleanup,
        lifecycle: &mut Lifecycle,
    ) -> Result<PathBuf> {
        let protocol = request.protocol()?;
        let destination = self.destination(request, options).await?;

        lifecycle.apply(Signal::Begin);
        debug!(%protocol, destination = %destination.display(), "Starting download");

        cleanup.create_output(&destination).await?;

        let (ctx, mut signals) = TransportContext::new(cleanup.token().clone());
        let transport = cleanup.register_transport(self.transports.create(protocol)?);
        let stream = transport.open(request.identifier(), &ctx).await?;
        debug!(total = ?stream.total, "Transport opened");

        let total = stream.total;
        let source = stream.progress;
        cleanup.set_input(stream.body);

        let mut written: u64 = 0;
        let mut signals_open = true;
        loop {
            tokio::select! {
                signal = signals.recv(), if signals_open => match signal {
                    Some(signal) => forward(lifecycle, signal)?,
                    None => signals_open = false,
                },
                chunk = cleanup.next_chunk() => match chunk {
                    Some(chunk) => {
                        let chunk = chunk?;
                        cleanup.write(&chunk).await?;
                        written += chunk.len() as u64;
                        if source == ProgressSource::Written {
                            lifecycle.apply(Signal::Progress(ProgressSnapshot::from_bytes(written, total)));
                        }
                    }
                    None => break,
                },
            }
        }

        drain(lifecycle, &mut signals)?;
        cleanup.finish_output().await?;
        debug!(written, "Destination written");

        Ok(destination)
    }

    /// Picks where the resource is written, asking the save prompt when the
    /// options request it.
    async fn destination(
        &self,
        request: &DownloadRequest,
        options: &DownloadOptions,
    ) -> Result<PathBuf> {
        let suggested = options
            .destination(request, &self.config.directory)
            .into_path();

        if !options.prompt_save_location {
            return Ok(suggested);
        }

        let Some(prompt) = self.config.save_prompt.clone() else {
            warn!("No save prompt is configured, using {}", suggested.display());
            return Ok(suggested);
        };

        let chosen = tokio::task::spawn_blocking(move || prompt(&suggested))
            .await
            .map_err(|e| Error::Internal(format!("The save prompt failed: {e}")))?;

        chosen
            .map(|path| ResolvedDestination::new(path).into_path())
            .ok_or(Error::UserCancelled)
    }
}

/// Turns a transport signal into a state machine signal.
fn forward(lifecycle: &mut Lifecycle, signal: TransportSignal) -> Result<()> {
    match signal {
        TransportSignal::Progress(snapshot) => {
            lifecycle.apply(Signal::Progress(snapshot));
        }
        TransportSignal::Peers(peers) => {
            lifecycle.apply(Signal::Peers(peers));
        }
        TransportSignal::Failed(e) => return Err(e),
    }
    Ok(())
}

/// Forwards the signals still queued once the body ended.
fn drain(lifecycle: &mut Lifecycle, signals: &mut UnboundedReceiver<TransportSignal>) -> Result<()> {
    loop {
        match signals.try_recv() {
            Ok(signal) => forward(lifecycle, signal)?,
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => return Ok(()),
        }
    }
}
