//! Error types for the download client.

use std::io;

use lehrpool_core::{ByteRange, ErrorKind, WireError};

/// Everything that can end a download.
///
/// Nothing here is retried. Each variant carries enough context (address,
/// range, raw payload) to tell what the server was doing at the time.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("handshake with {addr} failed: {source}")]
    Handshake {
        addr: String,
        #[source]
        source: WireError,
    },

    #[error("negotiating range {range} failed: {source}")]
    Negotiation {
        range: ByteRange,
        #[source]
        source: WireError,
    },

    #[error("server confirmed {received:?} for requested range {requested}")]
    RangeMismatch {
        requested: ByteRange,
        received: String,
    },

    #[error("reading range {range} failed: {source}")]
    Transport {
        range: ByteRange,
        #[source]
        source: io::Error,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("download connection is closed after an earlier failure")]
    Closed,

    #[error("stream ended after {received} of {expected} bytes")]
    Incomplete { received: u64, expected: u64 },

    #[error("failed to write {target}: {source}")]
    Storage {
        target: String,
        #[source]
        source: io::Error,
    },
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connect { .. } | Self::Handshake { .. } => ErrorKind::Connection,
            Self::Negotiation { source, .. } => source.kind(),
            Self::RangeMismatch { .. } => ErrorKind::ProtocolMismatch,
            Self::Transport { .. } => ErrorKind::TransportIo,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Closed => ErrorKind::InvalidState,
            Self::Incomplete { .. } => ErrorKind::Incomplete,
            Self::Storage { .. } => ErrorKind::Storage,
        }
    }
}

/// Transport errors come back out exactly as the socket reported them.
/// Everything else is wrapped and can be recovered with `downcast`.
impl From<DownloadError> for io::Error {
    fn from(err: DownloadError) -> io::Error {
        let kind = match err {
            DownloadError::Transport { source, .. } => return source,
            ref other => io_kind(other),
        };
        io::Error::new(kind, err)
    }
}

fn io_kind(err: &DownloadError) -> io::ErrorKind {
    match err {
        DownloadError::Connect { source, .. } | DownloadError::Storage { source, .. } => {
            source.kind()
        }
        DownloadError::Handshake {
            source: WireError::Io(e),
            ..
        } => e.kind(),
        DownloadError::Handshake { .. } => io::ErrorKind::ConnectionAborted,
        DownloadError::Negotiation {
            source: WireError::Io(e),
            ..
        } => e.kind(),
        DownloadError::Negotiation { .. } | DownloadError::RangeMismatch { .. } => {
            io::ErrorKind::InvalidData
        }
        DownloadError::Transport { source, .. } => source.kind(),
        DownloadError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
        DownloadError::Closed => io::ErrorKind::NotConnected,
        DownloadError::Incomplete { .. } => io::ErrorKind::UnexpectedEof,
    }
}
