//! Image download over the chunked range protocol.
//!
//! A download opens one TCP connection, sends the `D` marker and the transfer
//! token, then pulls the image in fixed-size windows. Each window is
//! requested with a RANGE message that the server must echo before sending
//! the window's raw bytes. DONE closes the exchange once the whole image has
//! been read.

mod connection;
mod negotiate;
mod reader;
mod save;
mod state;

pub use reader::{ImageDownload, TcpDownload};
pub use save::SaveReport;
pub use state::{ChunkWindow, StreamState};

use std::time::Duration;

use lehrpool_core::config::TransferConfig;

use crate::error::DownloadError;

/// Tunables for a single download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Bytes requested per RANGE message.
    pub chunk_size: u64,
    /// Capacity of the read and write buffers around the socket.
    pub buffer_bytes: usize,
    /// None = let the OS decide.
    pub connect_timeout: Option<Duration>,
    /// Socket read/write deadline. None = block indefinitely.
    pub io_timeout: Option<Duration>,
}

/// Same values a freshly written config file carries.
impl Default for DownloadOptions {
    fn default() -> Self {
        Self::from(&TransferConfig::default())
    }
}

impl DownloadOptions {
    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.chunk_size == 0 {
            return Err(DownloadError::InvalidArgument(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.buffer_bytes == 0 {
            return Err(DownloadError::InvalidArgument(
                "buffer size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&TransferConfig> for DownloadOptions {
    fn from(config: &TransferConfig) -> Self {
        let secs = |s: u64| (s > 0).then(|| Duration::from_secs(s));
        Self {
            chunk_size: config.chunk_size,
            buffer_bytes: config.buffer_bytes,
            connect_timeout: secs(config.connect_timeout_secs),
            io_timeout: secs(config.io_timeout_secs),
        }
    }
}
