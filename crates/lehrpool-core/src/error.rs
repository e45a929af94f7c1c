//! Failure classification shared by every layer of a download.

use std::fmt;

/// Coarse category of a download failure.
///
/// None of these are recovered from internally. The category tells a caller
/// where in the exchange things went wrong, not whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Dialing the image server or sending the handshake failed.
    Connection,
    /// Malformed length prefix, terminator, or payload.
    ProtocolFraming,
    /// The server's range confirmation did not echo the request.
    ProtocolMismatch,
    /// Read or write failure on an established connection.
    TransportIo,
    /// Rejected before anything touched the wire.
    InvalidArgument,
    /// Operation not legal in the reader's current state.
    InvalidState,
    /// The stream ended before the advertised file size was reached.
    Incomplete,
    /// Writing downloaded bytes to local storage failed.
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connection => "connection",
            Self::ProtocolFraming => "protocol framing",
            Self::ProtocolMismatch => "protocol mismatch",
            Self::TransportIo => "transport i/o",
            Self::InvalidArgument => "invalid argument",
            Self::InvalidState => "invalid state",
            Self::Incomplete => "incomplete",
            Self::Storage => "storage",
        };
        f.write_str(name)
    }
}
