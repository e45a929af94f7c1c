//! Lehrpool integration test harness.
//!
//! Every test runs a fake image server on 127.0.0.1 in a background thread
//! and drives a real TCP download against it:
//!
//!   cargo test --test integration
//!
//! The fake server serves one connection, records every control message it
//! receives and can be told to misbehave in specific ways.

mod downloads;
mod failures;

use std::io::{BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

use anyhow::{bail, Context, Result};
use lehrpool_core::wire::{self, encode_frame, DOWNLOAD_MARKER};
use lehrpool_core::{ByteRange, KeyValue, TransferTicket};

pub const MIB: u64 = 1024 * 1024;

// ── Harness ───────────────────────────────────────────────────────────────────

/// How the fake server answers.
#[derive(Debug, Clone)]
pub enum Behaviour {
    /// Echo every RANGE and send its bytes.
    Honest,
    /// Read the first RANGE for a token other than this one, then hang up
    /// without answering.
    RequireToken(String),
    /// Echo a range one byte shorter than requested.
    WrongEcho,
    /// Echo with a corrupted terminator.
    GarbledEcho,
    /// Echo the first RANGE, send this many of its bytes, then close.
    CloseAfter(u64),
    /// Read control messages but never answer.
    Silent,
}

/// What the fake server saw on its one connection.
#[derive(Debug, Default)]
pub struct Recorded {
    pub marker: Option<u8>,
    pub frames: Vec<String>,
    pub bytes_sent: u64,
}

pub struct FakeImageServer {
    pub port: u16,
    handle: JoinHandle<Result<Recorded>>,
}

impl FakeImageServer {
    pub fn start(behaviour: Behaviour) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake image server");
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().context("accept")?;
            serve(stream, &behaviour)
        });
        Self { port, handle }
    }

    pub fn ticket(&self, token: &str, file_size: u64) -> TransferTicket {
        TransferTicket::new("127.0.0.1", self.port, token, file_size)
    }

    /// Wait for the connection to end and return what the server saw.
    pub fn finish(self) -> Recorded {
        self.handle
            .join()
            .expect("fake image server panicked")
            .expect("fake image server failed")
    }
}

/// Byte at absolute offset `i` of every fake image.
pub fn image_byte(i: u64) -> u8 {
    (i % 251) as u8
}

pub fn image_bytes(start: u64, end: u64) -> Vec<u8> {
    (start..end).map(image_byte).collect()
}

/// A port nothing is listening on.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn serve(stream: TcpStream, behaviour: &Behaviour) -> Result<Recorded> {
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    let mut rec = Recorded::default();

    let mut marker = [0u8; 1];
    if reader.read(&mut marker)? == 0 {
        return Ok(rec);
    }
    rec.marker = Some(marker[0]);
    if marker[0] != DOWNLOAD_MARKER {
        return Ok(rec);
    }

    loop {
        let payload = match wire::read_payload(&mut reader) {
            Ok(p) => p,
            // client hung up
            Err(_) => return Ok(rec),
        };
        rec.frames.push(payload.clone());
        let msg = KeyValue::parse(&payload)?;

        match (msg.key.as_str(), behaviour) {
            ("TOKEN", _) | (_, Behaviour::Silent) => continue,
            ("DONE", _) => return Ok(rec),
            ("RANGE", Behaviour::RequireToken(expected)) => {
                let presented = format!("TOKEN={expected}");
                if rec.frames.first() != Some(&presented) {
                    return Ok(rec);
                }
                send_range(&mut writer, &msg.value, &mut rec, None)?;
            }
            ("RANGE", Behaviour::Honest) => send_range(&mut writer, &msg.value, &mut rec, None)?,
            ("RANGE", Behaviour::CloseAfter(n)) => {
                send_range(&mut writer, &msg.value, &mut rec, Some(*n))?;
                return Ok(rec);
            }
            ("RANGE", Behaviour::WrongEcho) => {
                let range: ByteRange = msg.value.parse()?;
                let short = format!("{}:{}", range.start, range.end.saturating_sub(1));
                writer.write_all(&encode_frame("RANGE", &short)?)?;
            }
            ("RANGE", Behaviour::GarbledEcho) => {
                let mut frame = encode_frame("RANGE", &msg.value)?.to_vec();
                let last = frame.len() - 1;
                frame[last] = 0x01;
                writer.write_all(&frame)?;
            }
            (other, _) => bail!("unexpected message key {other:?}"),
        }
    }
}

/// Confirm `value` and send the requested bytes, or only the first `limit`.
fn send_range(writer: &mut TcpStream, value: &str, rec: &mut Recorded, limit: Option<u64>) -> Result<()> {
    let range: ByteRange = value.parse()?;
    writer.write_all(&encode_frame("RANGE", value)?)?;

    let end = match limit {
        Some(n) => range.end.min(range.start + n),
        None => range.end,
    };
    let mut pos = range.start;
    while pos < end {
        let next = end.min(pos + MIB);
        writer.write_all(&image_bytes(pos, next))?;
        pos = next;
    }
    writer.flush()?;
    rec.bytes_sent += end - range.start;
    Ok(())
}
