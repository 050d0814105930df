//! Configuration structures and defaults for the downloader.
//!
//! [`DownloaderConfig`] gathers every setting a [`Downloader`] needs. It is
//! built through [`DownloaderBuilder`] and never changes once the downloader
//! exists, so concurrent downloads only share read-only state.
//!
//! # Examples
//!
//! ## Choosing the Save Location Interactively
//!
//! ```rust
//! use tributary::downloader::DownloaderBuilder;
//! use std::path::PathBuf;
//!
//! // Accept the suggested name, but store everything under /tmp.
//! let downloader = DownloaderBuilder::new()
//!     .save_prompt(|suggested| {
//!         suggested.file_name().map(|name| PathBuf::from("/tmp").join(name))
//!     })
//!     .build();
//! ```
//!
//! [`Downloader`]: super::Downloader
//! [`DownloaderBuilder`]: super::DownloaderBuilder

use crate::http::HttpClientConfig;
use crate::transport::{NodeConfig, TorrentConfig, TransportFactory};

use std::env::current_dir;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Callback asked for the final destination when a download sets
/// `prompt_save_location`.
///
/// It receives the suggested path and returns the chosen one, or `None` when
/// the user dismissed the prompt, which cancels the download.
pub type SavePrompt = Arc<dyn Fn(&Path) -> Option<PathBuf> + Send + Sync>;

/// Configuration structure for the downloader
#[derive(Clone)]
pub struct DownloaderConfig {
    /// Directory where downloads are stored unless the options say otherwise.
    pub directory: PathBuf,
    /// HTTP client settings.
    pub http: HttpClientConfig,
    /// Content node settings.
    pub node: NodeConfig,
    /// Torrent settings.
    pub torrent: TorrentConfig,
    /// Interactive save location prompt.
    pub save_prompt: Option<SavePrompt>,
    /// Replaces the default transports.
    pub transports: Option<Arc<dyn TransportFactory>>,
}

impl std::fmt::Debug for DownloaderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloaderConfig")
            .field("directory", &self.directory)
            .field("http", &self.http)
            .field("node", &self.node)
            .field("torrent", &self.torrent)
            .field("save_prompt", &self.save_prompt.is_some())
            .field("transports", &self.transports.is_some())
            .finish()
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            http: HttpClientConfig::default(),
            node: NodeConfig::default(),
            torrent: TorrentConfig::default(),
            save_prompt: None,
            transports: None,
        }
    }
}

/// The platform downloads folder, or the current directory.
pub fn default_directory() -> PathBuf {
    dirs::download_dir()
        .or_else(|| current_dir().ok())
        .unwrap_or_default()
}
