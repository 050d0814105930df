//! Protocol resolution.
//!
//! Maps a download identifier onto the transport able to serve it.

use crate::error::{Error, Result};

use std::fmt;

/// The transports a download can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Plain HTTP(S).
    Http,
    /// Content-addressed peer-to-peer network (IPFS).
    Content,
    /// BitTorrent.
    Torrent,
}

impl Protocol {
    /// Classifies an identifier.
    ///
    /// Rules are checked in order: a `Qm` prefix is a content id, a `magnet:`
    /// prefix or a `.torrent` suffix is a torrent, an `http` prefix is HTTP.
    /// Anything else is an [`Error::InvalidAddress`].
    ///
    /// ```rust
    /// use tributary::transport::Protocol;
    ///
    /// assert_eq!(Protocol::resolve("https://example.com/a.zip").unwrap(), Protocol::Http);
    /// assert_eq!(Protocol::resolve("magnet:?xt=urn:btih:abc").unwrap(), Protocol::Torrent);
    /// assert!(Protocol::resolve("ftp://host/file").is_err());
    /// ```
    pub fn resolve(identifier: &str) -> Result<Self> {
        if identifier.starts_with("Qm") {
            Ok(Protocol::Content)
        } else if identifier.starts_with("magnet:") || identifier.ends_with(".torrent") {
            Ok(Protocol::Torrent)
        } else if identifier.starts_with("http") {
            Ok(Protocol::Http)
        } else {
            Err(Error::InvalidAddress(identifier.to_string()))
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Protocol::Http => "http",
            Protocol::Content => "ipfs",
            Protocol::Torrent => "torrent",
        };
        f.write_str(name)
    }
}
