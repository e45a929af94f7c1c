//! The download connection: buffered halves of a single stream.

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use lehrpool_core::wire::{self, WireError, KEY_TOKEN};

use super::DownloadOptions;

/// Owns both directions of one download session.
///
/// Dropping it releases the underlying stream(s).
pub(crate) struct Connection<R: Read, W: Write> {
    pub(super) reader: BufReader<R>,
    pub(super) writer: BufWriter<W>,
}

impl<R: Read, W: Write> Connection<R, W> {
    pub(crate) fn new(reader: R, writer: W, capacity: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity, reader),
            writer: BufWriter::with_capacity(capacity, writer),
        }
    }

    /// Announce a download and present the transfer token.
    ///
    /// The server sends nothing back here. A rejected token only shows up
    /// when the first range request goes unanswered or is answered wrongly.
    pub(crate) fn handshake(&mut self, token: &str) -> Result<(), WireError> {
        wire::write_marker(&mut self.writer)?;
        // write_frame flushes, which also pushes out the marker.
        wire::write_frame(&mut self.writer, KEY_TOKEN, token)?;
        Ok(())
    }

    /// One buffered read of raw image bytes.
    pub(crate) fn read_data(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Dial the image server and apply the configured socket deadlines.
pub(crate) fn dial(host: &str, port: u16, options: &DownloadOptions) -> io::Result<TcpStream> {
    let stream = match options.connect_timeout {
        None => TcpStream::connect((host, port))?,
        Some(timeout) => {
            let mut last_err = None;
            let mut connected = None;
            for addr in (host, port).to_socket_addrs()? {
                match TcpStream::connect_timeout(&addr, timeout) {
                    Ok(s) => {
                        connected = Some(s);
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%addr, error = %e, "connect attempt failed");
                        last_err = Some(e);
                    }
                }
            }
            match connected {
                Some(s) => s,
                None => {
                    return Err(last_err.unwrap_or_else(|| {
                        io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
                    }))
                }
            }
        }
    };
    stream.set_read_timeout(options.io_timeout)?;
    stream.set_write_timeout(options.io_timeout)?;
    stream.set_nodelay(true)?;
    Ok(stream)
}
