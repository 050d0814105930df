//! Builder pattern implementation for creating Downloader instances.
//!
//! This module provides the [`DownloaderBuilder`] struct that implements the builder
//! pattern for configuring and creating [`Downloader`] instances.
//!
//! # Examples
//!
//! ## Basic Builder Usage
//!
//! ```rust
//! use tributary::downloader::DownloaderBuilder;
//! use std::path::{Path, PathBuf};
//! use std::time::Duration;
//!
//! let downloader = DownloaderBuilder::new()
//!     .directory(PathBuf::from("./downloads"))
//!     .retries(3)
//!     .metadata_timeout(Duration::from_secs(10))
//!     .build();
//! ```
//!
//! ## Custom Headers
//!
//! ```rust
//! use tributary::downloader::DownloaderBuilder;
//! use reqwest::header::{self, HeaderValue};
//!
//! let downloader = DownloaderBuilder::new()
//!     .header(header::USER_AGENT, HeaderValue::from_static("curl/7.87"))
//!     .build();
//! ```

use super::config::{DownloaderConfig, SavePrompt};
use super::downloader::Downloader;
use crate::transport::{SwarmBackend, TransportFactory};

use reqwest::header::{HeaderMap, HeaderValue, IntoHeaderName};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A builder used to create a [`Downloader`].
///
/// ```rust
/// # fn main()  {
/// use tributary::downloader::DownloaderBuilder;
///
/// let d = DownloaderBuilder::new().retries(5).directory("downloads".into()).build();
/// # }
/// ```
#[derive(Default)]
pub struct DownloaderBuilder {
    config: DownloaderConfig,
}

impl DownloaderBuilder {
    /// Creates a builder with the default options.
    pub fn new() -> Self {
        DownloaderBuilder::default()
    }

    /// Sets the directory where to store the downloads.
    pub fn directory(mut self, directory: PathBuf) -> Self {
        self.config.directory = directory;
        self
    }

    /// Set the number of retries of the HTTP requests.
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.http.retries = retries;
        self
    }

    /// Route HTTP requests through a proxy.
    pub fn proxy(mut self, proxy: reqwest::Proxy) -> Self {
        self.config.http.proxy = Some(proxy);
        self
    }

    /// Set whether invalid TLS certificates are accepted. Defaults to `true`.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.config.http.accept_invalid_certs = accept;
        self
    }

    /// Helper method to get or create a new HeaderMap.
    fn new_header(&self) -> HeaderMap {
        match self.config.http.headers {
            Some(ref h) => h.to_owned(),
            _ => HeaderMap::new(),
        }
    }

    /// Add the http headers.
    ///
    /// You can call `.headers()` multiple times and all `HeaderMap` will be merged into a single one.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        let mut new = self.new_header();
        new.extend(headers);

        self.config.http.headers = Some(new);
        self
    }

    /// Add the http header
    pub fn header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        let mut new = self.new_header();

        new.insert(name, value);

        self.config.http.headers = Some(new);
        self
    }

    /// Path of the `ipfs` binary used for content downloads.
    pub fn ipfs_binary(mut self, binary: PathBuf) -> Self {
        self.config.node.binary = binary;
        self
    }

    /// Peer the content node connects to on start, or `None` for no peer.
    pub fn bootstrap_peer(mut self, peer: Option<String>) -> Self {
        self.config.node.bootstrap_peer = peer;
        self
    }

    /// Directory holding the temporary node repositories.
    pub fn node_temp_root(mut self, root: PathBuf) -> Self {
        self.config.node.temp_root = Some(root);
        self
    }

    /// How long the content node may take to start.
    pub fn node_ready_timeout(mut self, timeout: Duration) -> Self {
        self.config.node.ready_timeout = timeout;
        self
    }

    /// How long the content node may take to exit once asked to.
    pub fn node_shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.node.shutdown_grace = grace;
        self
    }

    /// How long to wait for torrent metadata.
    pub fn metadata_timeout(mut self, timeout: Duration) -> Self {
        self.config.torrent.metadata_timeout = timeout;
        self
    }

    /// Swarm engine used for torrents.
    pub fn swarm_backend(mut self, backend: Arc<dyn SwarmBackend>) -> Self {
        self.config.torrent.backend = Some(backend);
        self
    }

    /// Set the interactive save location prompt.
    ///
    /// It receives the suggested path and returns the chosen one, or `None`
    /// to cancel the download.
    pub fn save_prompt<F>(mut self, prompt: F) -> Self
    where
        F: Fn(&Path) -> Option<PathBuf> + Send + Sync + 'static,
    {
        let prompt: SavePrompt = Arc::new(prompt);
        self.config.save_prompt = Some(prompt);
        self
    }

    /// Replace the default transports.
    pub fn transports(mut self, transports: Arc<dyn TransportFactory>) -> Self {
        self.config.transports = Some(transports);
        self
    }

    /// Create the [`Downloader`] with the specified options.
    pub fn build(self) -> Downloader {
        Downloader::new(self.config)
    }
}
