//! Range negotiation, the request/confirm exchange in front of every chunk.

use std::io::{Read, Write};

use lehrpool_core::wire::{self, WireError, KEY_DONE, KEY_RANGE};
use lehrpool_core::ByteRange;

use super::connection::Connection;
use crate::error::DownloadError;

impl<R: Read, W: Write> Connection<R, W> {
    /// Ask for `range` and wait for the server to echo it back verbatim.
    ///
    /// On success exactly `range.len()` raw bytes follow on the stream.
    pub(crate) fn request_range(&mut self, range: ByteRange) -> Result<(), DownloadError> {
        let value = range.to_string();
        wire::write_frame(&mut self.writer, KEY_RANGE, &value)
            .map_err(|source| DownloadError::Negotiation { range, source })?;

        let reply = wire::read_payload(&mut self.reader)
            .map_err(|source| DownloadError::Negotiation { range, source })?;

        let expected = format!("{KEY_RANGE}={value}");
        if reply != expected {
            return Err(DownloadError::RangeMismatch {
                requested: range,
                received: reply,
            });
        }
        tracing::debug!(%range, "range confirmed");
        Ok(())
    }

    /// Tell the server the whole file has been consumed. No reply follows.
    pub(crate) fn send_done(&mut self) -> Result<(), WireError> {
        wire::write_frame(&mut self.writer, KEY_DONE, "")
    }
}
