//! Download requests and destination resolution.
//!
//! A [`DownloadRequest`] names the resource to fetch, [`DownloadOptions`]
//! describe where it should be stored, and the two are combined exactly once
//! into a [`ResolvedDestination`] when the download starts.

use crate::error::Result;
use crate::transport::Protocol;

use std::path::{Component, Path, PathBuf};
use url::Url;

/// File name used when nothing usable can be derived from the identifier.
pub const DEFAULT_FILENAME: &str = "download";

/// Represents a resource to be downloaded.
///
/// The identifier is either an HTTP(S) URL, a magnet link (or a `.torrent`
/// address) or a content id. It is immutable once the request is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    identifier: String,
}

impl DownloadRequest {
    /// Creates a new [`DownloadRequest`].
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }

    /// The identifier exactly as it was given.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Classifies the identifier. See [`Protocol::resolve`].
    pub fn protocol(&self) -> Result<Protocol> {
        Protocol::resolve(&self.identifier)
    }

    /// The file name derived from the identifier.
    pub fn filename(&self) -> String {
        derive_filename(&self.identifier)
    }
}

impl From<&str> for DownloadRequest {
    fn from(value: &str) -> Self {
        DownloadRequest::new(value)
    }
}

impl From<String> for DownloadRequest {
    fn from(value: String) -> Self {
        DownloadRequest::new(value)
    }
}

/// Derives a file name from a download identifier.
///
/// The `filename` query parameter wins, then the last path segment
/// (percent-decoded), then the `dn` display name of magnet links. Bare content
/// ids are used as-is. Whatever is picked is reduced to its last path
/// component, so the name always stays inside the download directory.
///
/// ```rust
/// use tributary::download::derive_filename;
///
/// assert_eq!(derive_filename("https://host/a/b/file.bin"), "file.bin");
/// assert_eq!(derive_filename("https://host/get?id=4&filename=model.zip"), "model.zip");
/// assert_eq!(derive_filename("magnet:?xt=urn:btih:abc&dn=movie.mkv"), "movie.mkv");
/// assert_eq!(derive_filename("https://host/get?filename=/etc/passwd"), "passwd");
/// ```
pub fn derive_filename(identifier: &str) -> String {
    filename_candidates(identifier)
        .iter()
        .find_map(|name| file_component(name))
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

/// Names proposed by an identifier, best first.
fn filename_candidates(identifier: &str) -> Vec<String> {
    let Ok(url) = Url::parse(identifier) else {
        return vec![identifier.to_string()];
    };

    let query = |name: &str| {
        url.query_pairs()
            .find(|(key, value)| key == name && !value.is_empty())
            .map(|(_, value)| value.into_owned())
    };

    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            form_urlencoded::parse(segment.as_bytes())
                .map(|(key, val)| [key, val].concat())
                .collect::<String>()
        });

    [query("filename"), segment, query("dn")]
        .into_iter()
        .flatten()
        .collect()
}

/// The last component of `name` when it is a plain file name.
///
/// Roots, `.` and `..` are rejected.
fn file_component(name: &str) -> Option<String> {
    match Path::new(name).components().next_back()? {
        Component::Normal(component) => component.to_str().map(str::to_string),
        _ => None,
    }
}

/// Where and how a download is stored.
///
/// ```rust
/// use tributary::download::DownloadOptions;
///
/// let options = DownloadOptions::new()
///     .explicit_path("/tmp/out.bin")
///     .prompt_save_location(false);
/// # let _ = options;
/// ```
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Ask the configured save prompt for the final path before writing.
    pub prompt_save_location: bool,
    /// Directory to store the file in. Defaults to the downloader's directory.
    pub directory: Option<PathBuf>,
    /// File name to use. Defaults to the one derived from the identifier.
    pub filename: Option<String>,
    /// Full path overriding both `directory` and `filename`.
    pub explicit_path: Option<PathBuf>,
}

impl DownloadOptions {
    /// Creates options with every default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the save location should be chosen interactively.
    pub fn prompt_save_location(mut self, prompt: bool) -> Self {
        self.prompt_save_location = prompt;
        self
    }

    /// Sets the directory where to store the download.
    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Sets the file name.
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Sets the full destination path.
    pub fn explicit_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_path = Some(path.into());
        self
    }

    /// Computes the destination, before any interactive prompt.
    pub fn destination(&self, request: &DownloadRequest, default_directory: &Path) -> ResolvedDestination {
        let path = match &self.explicit_path {
            Some(path) => path.clone(),
            None => {
                let directory = self.directory.as_deref().unwrap_or(default_directory);
                let filename = self.filename.clone().unwrap_or_else(|| request.filename());
                directory.join(filename)
            }
        };

        ResolvedDestination::new(path)
    }
}

/// The absolute path a download is written to.
///
/// It is computed once when the download starts and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDestination(PathBuf);

impl ResolvedDestination {
    /// Resolves `path` against the current directory.
    pub fn new(path: PathBuf) -> Self {
        let absolute = std::path::absolute(&path).unwrap_or(path);
        Self(absolute)
    }

    /// The destination path.
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Consumes the destination, returning its path.
    pub fn into_path(self) -> PathBuf {
        self.0
    }
}
