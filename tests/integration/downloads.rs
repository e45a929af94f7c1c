use std::io::{self, Read};

use lehrpool_client::{DownloadOptions, StreamState, TcpDownload};
use lehrpool_core::TransferTicket;

use crate::*;

fn options(chunk_size: u64) -> DownloadOptions {
    DownloadOptions {
        chunk_size,
        ..DownloadOptions::default()
    }
}

/// 32 MiB with the default chunk size: two windows, then DONE.
#[test]
fn test_two_window_image_over_tcp() {
    let server = FakeImageServer::start(Behaviour::Honest);
    let ticket = server.ticket("abc", 33_554_432);

    let mut dl = TcpDownload::connect(&ticket, &DownloadOptions::default()).unwrap();
    let copied = io::copy(&mut dl, &mut io::sink()).unwrap();
    assert_eq!(copied, 33_554_432);
    assert_eq!(dl.state(), StreamState::Done);
    drop(dl);

    let rec = server.finish();
    assert_eq!(rec.marker, Some(b'D'));
    assert_eq!(
        rec.frames,
        vec!["TOKEN=abc", "RANGE=0:16777216", "RANGE=16777216:33554432", "DONE="]
    );
    assert_eq!(rec.bytes_sent, 33_554_432);
}

/// Final window is clamped to the file size.
#[test]
fn test_last_window_is_short() {
    let server = FakeImageServer::start(Behaviour::Honest);
    let ticket = server.ticket("t", 10 * MIB + 5);

    let mut dl = TcpDownload::connect(&ticket, &options(4 * MIB)).unwrap();
    let mut out = Vec::new();
    dl.read_to_end(&mut out).unwrap();
    assert_eq!(out.len() as u64, 10 * MIB + 5);
    assert!(out == image_bytes(0, 10 * MIB + 5), "image content differs");
    drop(dl);

    let rec = server.finish();
    assert_eq!(
        rec.frames,
        vec![
            "TOKEN=t".to_string(),
            format!("RANGE=0:{}", 4 * MIB),
            format!("RANGE={}:{}", 4 * MIB, 8 * MIB),
            format!("RANGE={}:{}", 8 * MIB, 10 * MIB + 5),
            "DONE=".to_string(),
        ]
    );
}

#[test]
fn test_empty_image_sends_only_token_and_done() {
    let server = FakeImageServer::start(Behaviour::Honest);
    let ticket = server.ticket("empty", 0);

    let mut dl = TcpDownload::connect(&ticket, &DownloadOptions::default()).unwrap();
    let mut buf = [0u8; 64];
    assert_eq!(dl.read(&mut buf).unwrap(), 0);
    assert_eq!(dl.read(&mut buf).unwrap(), 0);
    drop(dl);

    assert_eq!(server.finish().frames, vec!["TOKEN=empty", "DONE="]);
}

#[test]
fn test_small_reads_reassemble_image() {
    let server = FakeImageServer::start(Behaviour::Honest);
    let size = 3 * 1024 + 17;
    let ticket = server.ticket("t", size);

    let mut dl = TcpDownload::connect(&ticket, &options(1024)).unwrap();
    let mut out = Vec::new();
    let mut buf = [0u8; 100];
    loop {
        let n = dl.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out, image_bytes(0, size));
    drop(dl);

    assert_eq!(server.finish().frames.len(), 1 + 4 + 1);
}

/// Ticket written by another tool, loaded from disk, saved to disk.
#[test]
fn test_save_ticket_download_to_file() {
    let server = FakeImageServer::start(Behaviour::Honest);
    let size = 2 * MIB + 3;

    let dir = std::env::temp_dir().join(format!("lehrpool-it-save-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let ticket_path = dir.join("ticket.json");
    let ticket_json = serde_json::json!({
        "host": "127.0.0.1",
        "port": server.port,
        "token": "from-file",
        "fileSize": size,
    });
    std::fs::write(&ticket_path, ticket_json.to_string()).unwrap();

    let ticket = TransferTicket::load(&ticket_path).unwrap();
    assert_eq!(ticket.file_size, size);

    let image_path = dir.join("image.img");
    let mut dl = TcpDownload::connect(&ticket, &options(MIB)).unwrap();
    let report = dl.save_to(&image_path).unwrap();
    drop(dl);

    let on_disk = std::fs::read(&image_path).unwrap();
    assert_eq!(report.bytes, size);
    assert_eq!(on_disk.len() as u64, size);
    assert_eq!(report.digest, *blake3::hash(&on_disk).as_bytes());
    assert_eq!(server.finish().frames.first().map(String::as_str), Some("TOKEN=from-file"));

    std::fs::remove_dir_all(&dir).ok();
}
