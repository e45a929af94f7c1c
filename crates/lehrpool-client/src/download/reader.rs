//! Chunked stream reader: the image as a plain `Read`.

use std::io::{self, Read, Write};
use std::net::TcpStream;

use lehrpool_core::TransferTicket;

use super::connection::{dial, Connection};
use super::state::{ChunkWindow, StreamState};
use super::DownloadOptions;
use crate::error::DownloadError;

/// A download over a real TCP connection.
pub type TcpDownload = ImageDownload<TcpStream, TcpStream>;

/// Streams one image from an image server.
///
/// Reads behave like any other `Read`: short reads are normal, `Ok(0)` means
/// end of stream. Chunk windows are requested from the server behind the
/// scenes whenever the previous one has been consumed. A single read never
/// crosses a window boundary.
///
/// Not meant to be shared between threads; one reader per download.
pub struct ImageDownload<R: Read, W: Write> {
    conn: Option<Connection<R, W>>,
    window: ChunkWindow,
    state: StreamState,
    peer: String,
}

impl ImageDownload<TcpStream, TcpStream> {
    /// Connect to the ticket's image server and complete the handshake.
    pub fn connect(ticket: &TransferTicket, options: &DownloadOptions) -> Result<Self, DownloadError> {
        options.validate()?;
        let addr = ticket.address();
        tracing::debug!(%addr, file_size = ticket.file_size, "connecting to image server");

        let stream = dial(&ticket.host, ticket.port, options).map_err(|source| {
            DownloadError::Connect {
                addr: addr.clone(),
                source,
            }
        })?;
        let writer = stream
            .try_clone()
            .map_err(|source| DownloadError::Connect {
                addr: addr.clone(),
                source,
            })?;

        Self::handshake(stream, writer, ticket, options)
    }
}

impl<R: Read, W: Write> ImageDownload<R, W> {
    /// Run the handshake over an already-open stream.
    ///
    /// If this fails the halves are dropped before returning.
    pub fn handshake(
        reader: R,
        writer: W,
        ticket: &TransferTicket,
        options: &DownloadOptions,
    ) -> Result<Self, DownloadError> {
        options.validate()?;
        let addr = ticket.address();
        let window = ChunkWindow::new(ticket.file_size, options.chunk_size)?;

        let mut conn = Connection::new(reader, writer, options.buffer_bytes);
        conn.handshake(&ticket.token)
            .map_err(|source| DownloadError::Handshake {
                addr: addr.clone(),
                source,
            })?;

        tracing::info!(
            peer = %addr,
            file_size = ticket.file_size,
            chunk_size = window.chunk_size(),
            "download session opened"
        );

        Ok(Self {
            conn: Some(conn),
            window,
            state: StreamState::AwaitingRange,
            peer: addr,
        })
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn window(&self) -> &ChunkWindow {
        &self.window
    }

    pub fn file_size(&self) -> u64 {
        self.window.file_size()
    }

    pub fn total_read(&self) -> u64 {
        self.window.total_read()
    }

    /// Pull the next bytes of the image into `buf`.
    ///
    /// Errors are terminal: the connection is released and every later call
    /// returns [`DownloadError::Closed`]. The one exception is an interrupted
    /// read, which leaves the reader usable.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, DownloadError> {
        if self.state.is_closed() {
            if self.state == StreamState::Failed {
                return Err(DownloadError::Closed);
            }
            return Ok(0);
        }

        if self.window.is_complete() {
            self.finish();
            return Ok(0);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let Some(conn) = self.conn.as_mut() else {
            return Err(DownloadError::Closed);
        };
        let range = self.window.current();

        if self.state == StreamState::AwaitingRange {
            if let Err(err) = conn.request_range(range) {
                self.fail(&err);
                return Err(err);
            }
            self.state = StreamState::Streaming;
        }

        let remaining = usize::try_from(self.window.remaining_in_window()).unwrap_or(usize::MAX);
        let limit = buf.len().min(remaining);
        let n = match conn.read_data(&mut buf[..limit]) {
            Ok(n) => n,
            Err(source) if source.kind() == io::ErrorKind::Interrupted => {
                return Err(DownloadError::Transport { range, source });
            }
            Err(source) => {
                let err = DownloadError::Transport { range, source };
                self.fail(&err);
                return Err(err);
            }
        };

        if n == 0 {
            tracing::warn!(
                peer = %self.peer,
                %range,
                total_read = self.window.total_read(),
                file_size = self.window.file_size(),
                "server closed the stream before the image was complete"
            );
            self.release(StreamState::EndedEarly);
            return Ok(0);
        }

        if self.window.advance(n as u64) {
            tracing::trace!(next = %self.window.current(), "chunk window consumed");
            self.state = StreamState::AwaitingRange;
        }
        Ok(n)
    }

    /// Send DONE once and release the connection. Failures are only logged:
    /// by now every byte has been delivered.
    fn finish(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            if let Err(e) = conn.send_done() {
                tracing::warn!(peer = %self.peer, error = %e, "failed to send DONE");
            }
        }
        self.state = StreamState::Done;
        tracing::info!(
            peer = %self.peer,
            bytes = self.window.total_read(),
            "download complete"
        );
    }

    fn fail(&mut self, err: &DownloadError) {
        tracing::warn!(
            peer = %self.peer,
            error = %err,
            total_read = self.window.total_read(),
            "download failed"
        );
        self.release(StreamState::Failed);
    }

    fn release(&mut self, state: StreamState) {
        self.conn = None;
        self.state = state;
    }
}

impl<R: Read, W: Write> Read for ImageDownload<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_chunk(buf).map_err(io::Error::from)
    }
}
