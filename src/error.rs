//! Error handling for the Tributary library.
//!
//! Every failure a download can run into is represented by [`Error`]. Transports
//! never let raw stream or process errors escape: they are mapped onto one of
//! these variants at the transport boundary and delivered to the caller through
//! the download's event stream.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors that can happen when using Tributary.
#[derive(Error, Debug)]
pub enum Error {
    /// The identifier matches none of the supported protocols.
    ///
    /// Identifiers must start with `Qm` (content id), `magnet:` or `http`, or
    /// end with `.torrent`.
    #[error("Invalid download address: {0}")]
    InvalidAddress(String),

    /// The remote end could not be reached.
    ///
    /// Covers refused connections, DNS and TLS failures, unsuccessful HTTP
    /// statuses and a missing swarm backend.
    #[error("Transport connection failed: {0}")]
    TransportConnectFailed(String),

    /// The transport failed after the connection was established.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The content node never became ready.
    #[error("Content node failed to start: {0}")]
    NodeInitFailed(String),

    /// The torrent metadata did not arrive in time.
    #[error("Torrent metadata not received within {0:?}")]
    MetadataTimeout(Duration),

    /// The torrent holds more than one file.
    #[error("The torrent contains {0} files, only single-file torrents are supported")]
    MultiFileNotSupported(usize),

    /// The destination file could not be created or written.
    #[error("Unable to write the destination file")]
    DestinationWriteFailed {
        #[from]
        source: io::Error,
    },

    /// The download was cancelled by the user.
    ///
    /// This is not a failure: it only surfaces as an error through
    /// [`crate::EventStream::wait`], which has no other way to report it.
    #[error("Download cancelled by user")]
    UserCancelled,

    /// Error from an underlying system.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns `true` for the user cancellation outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::UserCancelled)
    }
}

impl From<reqwest_middleware::Error> for Error {
    fn from(e: reqwest_middleware::Error) -> Self {
        Error::TransportConnectFailed(e.to_string())
    }
}

/// Result type alias for operations that can fail with a Tributary error.
pub type Result<T> = std::result::Result<T, Error>;
