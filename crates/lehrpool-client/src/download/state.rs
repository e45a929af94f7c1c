//! Chunk window bookkeeping and the reader's lifecycle states.

use lehrpool_core::ByteRange;

use crate::error::DownloadError;

/// Where a reader is in its lifecycle.
///
/// Connecting and handshaking happen inside the constructor, so a reader
/// that exists has always completed its handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// The current window has not been requested yet.
    AwaitingRange,
    /// The current window is confirmed and its raw bytes are flowing.
    Streaming,
    /// Every byte was delivered and DONE was sent. Connection released.
    Done,
    /// The server closed the stream before the file was complete.
    /// Connection released; further reads report end-of-stream.
    EndedEarly,
    /// A terminal error was returned. Connection released; further reads fail.
    Failed,
}

impl StreamState {
    /// True once the connection has been released.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Done | Self::EndedEarly | Self::Failed)
    }
}

/// The half-open window `[start, end)` currently being streamed, plus how far
/// into the file the caller has read.
///
/// Holds `start <= end <= file_size` and `end - start <= chunk_size` at all times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkWindow {
    chunk_size: u64,
    file_size: u64,
    start: u64,
    end: u64,
    total_read: u64,
}

impl ChunkWindow {
    pub fn new(file_size: u64, chunk_size: u64) -> Result<Self, DownloadError> {
        if chunk_size == 0 {
            return Err(DownloadError::InvalidArgument(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            chunk_size,
            file_size,
            start: 0,
            end: chunk_size.min(file_size),
            total_read: 0,
        })
    }

    pub fn current(&self) -> ByteRange {
        ByteRange {
            start: self.start,
            end: self.end,
        }
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn total_read(&self) -> u64 {
        self.total_read
    }

    pub fn is_complete(&self) -> bool {
        self.total_read == self.file_size
    }

    /// Bytes of the current window the caller has not consumed yet.
    pub fn remaining_in_window(&self) -> u64 {
        self.end - self.total_read
    }

    /// Record `n` consumed bytes. Returns true when this finished the window
    /// and the next one was computed.
    ///
    /// `n` must not exceed [`remaining_in_window`](Self::remaining_in_window).
    pub fn advance(&mut self, n: u64) -> bool {
        debug_assert!(n <= self.remaining_in_window());
        self.total_read += n;
        if self.total_read != self.end || self.end == self.file_size {
            return false;
        }
        self.start = self.end;
        self.end = (self.start + self.chunk_size).min(self.file_size);
        true
    }
}
