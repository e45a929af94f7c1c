//! Lehrpool wire format: framing for the image download connection.
//!
//! A download connection carries two kinds of traffic: small key/value
//! control messages and raw image bytes. Control messages use the layout
//! below in both directions; raw bytes follow a confirmed RANGE message
//! with no framing at all.
//!
//! ```text
//! +------------+---------------------------+-----------+
//! | len (u16)  | "key=value" (len bytes)   | 0x00 0x00 |
//! | big-endian | UTF-8                     | terminator|
//! +------------+---------------------------+-----------+
//! ```
//!
//! The protocol is half-duplex: a message is written and flushed before the
//! next one is considered, and nothing is pipelined.

use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ErrorKind;

// ── Constants ─────────────────────────────────────────────────────────────────

/// First byte a client sends on a fresh connection to request a download.
pub const DOWNLOAD_MARKER: u8 = b'D';

/// Two zero bytes close every key/value message.
pub const TERMINATOR: [u8; 2] = [0x00, 0x00];

/// Largest `key=value` payload the u16 length prefix can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Default size of a negotiated chunk window: 16 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 16 * 1024 * 1024;

pub const KEY_TOKEN: &str = "TOKEN";
pub const KEY_RANGE: &str = "RANGE";
pub const KEY_DONE: &str = "DONE";

// ── Key/Value message ─────────────────────────────────────────────────────────

/// A decoded control message.
///
/// Only exists while a message is being decoded or inspected; nothing in the
/// protocol keeps these around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    /// Split a raw `key=value` payload at the first `=`.
    pub fn parse(payload: &str) -> Result<Self, WireError> {
        match payload.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok(Self {
                key: key.to_string(),
                value: value.to_string(),
            }),
            _ => Err(WireError::MissingSeparator(payload.to_string())),
        }
    }
}

/// The `key=value` string exactly as it travels on the wire.
impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Build the complete frame for `key=value`: length prefix, payload, terminator.
pub fn encode_frame(key: &str, value: &str) -> Result<Bytes, WireError> {
    if key.is_empty() {
        return Err(WireError::EmptyKey);
    }
    let len = key.len() + 1 + value.len();
    if len > MAX_PAYLOAD {
        return Err(WireError::FrameTooLong(len));
    }

    let mut buf = BytesMut::with_capacity(2 + len + TERMINATOR.len());
    buf.put_u16(len as u16);
    buf.put_slice(key.as_bytes());
    buf.put_u8(b'=');
    buf.put_slice(value.as_bytes());
    buf.put_slice(&TERMINATOR);
    Ok(buf.freeze())
}

/// Encode and send one message, flushing so it is fully on the wire on return.
pub fn write_frame<W: Write>(writer: &mut W, key: &str, value: &str) -> Result<(), WireError> {
    let frame = encode_frame(key, value)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    tracing::trace!(key, frame_len = frame.len(), "frame sent");
    Ok(())
}

/// Send the single-byte download marker that opens a session.
pub fn write_marker<W: Write>(writer: &mut W) -> Result<(), WireError> {
    writer.write_all(&[DOWNLOAD_MARKER])?;
    Ok(())
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Read one frame and return its raw `key=value` payload.
///
/// Callers comparing a reply against an expected message should use this
/// rather than [`read_frame`], so the offending payload is available verbatim.
pub fn read_payload<R: Read>(reader: &mut R) -> Result<String, WireError> {
    let mut len_bytes = [0u8; 2];
    read_field(reader, &mut len_bytes, "length prefix")?;
    let len = u16::from_be_bytes(len_bytes) as usize;

    let mut payload = vec![0u8; len];
    read_field(reader, &mut payload, "payload")?;

    let mut terminator = [0u8; 2];
    read_field(reader, &mut terminator, "terminator")?;
    if terminator != TERMINATOR {
        return Err(WireError::BadTerminator(terminator));
    }

    let payload = String::from_utf8(payload)
        .map_err(|e| WireError::InvalidUtf8(hex::encode(e.as_bytes())))?;
    tracing::trace!(payload_len = len, "frame received");
    Ok(payload)
}

/// Read one frame and split it into key and value.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<KeyValue, WireError> {
    let payload = read_payload(reader)?;
    KeyValue::parse(&payload)
}

fn read_field<R: Read>(reader: &mut R, buf: &mut [u8], field: &'static str) -> Result<(), WireError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => WireError::Truncated {
            field,
            expected: buf.len(),
        },
        _ => WireError::Io(e),
    })
}

// ── Byte ranges ───────────────────────────────────────────────────────────────

/// Half-open byte range `[start, end)` of the image being transferred.
///
/// Renders as `start:end` in decimal, which is the RANGE message value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Result<Self, WireError> {
        if start > end {
            return Err(WireError::InvalidRange(format!("{start}:{end}")));
        }
        Ok(Self { start, end })
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl FromStr for ByteRange {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WireError::InvalidRange(s.to_string());
        let (start, end) = s.split_once(':').ok_or_else(invalid)?;
        let parse = |part: &str| -> Result<u64, WireError> {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };
        Self::new(parse(start)?, parse(end)?)
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise while encoding or decoding control messages.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("message key must not be empty")]
    EmptyKey,

    #[error("message payload of {0} bytes exceeds maximum {}", MAX_PAYLOAD)]
    FrameTooLong(usize),

    #[error("message has no key=value separator: {0:?}")]
    MissingSeparator(String),

    #[error("message payload is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("expected terminator 0000, got {}", hex::encode(.0))]
    BadTerminator([u8; 2]),

    #[error("connection closed while reading {field} ({expected} bytes expected)")]
    Truncated { field: &'static str, expected: usize },

    #[error("invalid byte range: {0:?}")]
    InvalidRange(String),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl WireError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyKey | Self::FrameTooLong(_) | Self::InvalidRange(_) => {
                ErrorKind::InvalidArgument
            }
            Self::MissingSeparator(_)
            | Self::InvalidUtf8(_)
            | Self::BadTerminator(_)
            | Self::Truncated { .. } => ErrorKind::ProtocolFraming,
            Self::Io(_) => ErrorKind::TransportIo,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
