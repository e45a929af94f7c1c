use std::io::{self, Read};
use std::time::{Duration, Instant};

use lehrpool_client::{DownloadError, DownloadOptions, StreamState, TcpDownload};
use lehrpool_core::{ErrorKind, TransferTicket};

use crate::*;

fn options(chunk_size: u64) -> DownloadOptions {
    DownloadOptions {
        chunk_size,
        ..DownloadOptions::default()
    }
}

#[test]
fn test_connection_refused() {
    let ticket = TransferTicket::new("127.0.0.1", closed_port(), "t", 100);
    let err = TcpDownload::connect(&ticket, &DownloadOptions::default())
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.to_string().contains("127.0.0.1"), "{err}");
}

#[test]
fn test_wrong_echo_is_mismatch_and_terminal() {
    let server = FakeImageServer::start(Behaviour::WrongEcho);
    let ticket = server.ticket("t", 4096);

    let mut dl = TcpDownload::connect(&ticket, &options(1024)).unwrap();
    let mut buf = [0u8; 512];
    let err = dl.read_chunk(&mut buf).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolMismatch);
    match &err {
        DownloadError::RangeMismatch { requested, received } => {
            assert_eq!(requested.to_string(), "0:1024");
            assert_eq!(received, "RANGE=0:1023");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(dl.state(), StreamState::Failed);
    assert_eq!(dl.total_read(), 0);

    let again = dl.read_chunk(&mut buf).unwrap_err();
    assert_eq!(again.kind(), ErrorKind::InvalidState);
    drop(dl);

    // no retry and no DONE after a failure
    assert_eq!(server.finish().frames, vec!["TOKEN=t", "RANGE=0:1024"]);
}

#[test]
fn test_garbled_echo_is_framing_error() {
    let server = FakeImageServer::start(Behaviour::GarbledEcho);
    let ticket = server.ticket("t", 64);

    let mut dl = TcpDownload::connect(&ticket, &DownloadOptions::default()).unwrap();
    let err = dl.read(&mut [0u8; 64]).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    let inner = err
        .get_ref()
        .and_then(|e| e.downcast_ref::<DownloadError>())
        .expect("wrapped download error");
    assert_eq!(inner.kind(), ErrorKind::ProtocolFraming);
    drop(dl);
    server.finish();
}

#[test]
fn test_rejected_token_fails_first_range() {
    let server = FakeImageServer::start(Behaviour::RequireToken("right".into()));
    let ticket = server.ticket("wrong", 1024);

    // The handshake itself gets no answer, so it succeeds.
    let mut dl = TcpDownload::connect(&ticket, &DownloadOptions::default()).unwrap();
    let err = dl.read_chunk(&mut [0u8; 1024]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolFraming);
    assert_eq!(dl.state(), StreamState::Failed);
    drop(dl);

    assert_eq!(server.finish().frames, vec!["TOKEN=wrong", "RANGE=0:1024"]);
}

#[test]
fn test_accepted_token_downloads() {
    let server = FakeImageServer::start(Behaviour::RequireToken("right".into()));
    let ticket = server.ticket("right", 1024);

    let mut dl = TcpDownload::connect(&ticket, &DownloadOptions::default()).unwrap();
    let mut out = Vec::new();
    dl.read_to_end(&mut out).unwrap();
    assert_eq!(out, image_bytes(0, 1024));
    drop(dl);
    server.finish();
}

#[test]
fn test_server_closes_mid_chunk() {
    let server = FakeImageServer::start(Behaviour::CloseAfter(1000));
    let ticket = server.ticket("t", 4096);

    let mut dl = TcpDownload::connect(&ticket, &options(2048)).unwrap();
    let mut out = Vec::new();
    // Early close is plain EOF to a Read consumer.
    dl.read_to_end(&mut out).unwrap();
    assert_eq!(out, image_bytes(0, 1000));
    assert_eq!(dl.state(), StreamState::EndedEarly);
    assert_eq!(dl.total_read(), 1000);
    drop(dl);

    assert_eq!(server.finish().bytes_sent, 1000);
}

#[test]
fn test_save_reports_incomplete_image() {
    let server = FakeImageServer::start(Behaviour::CloseAfter(500));
    let ticket = server.ticket("t", 4096);

    let path = std::env::temp_dir().join(format!("lehrpool-it-incomplete-{}.img", std::process::id()));
    let mut dl = TcpDownload::connect(&ticket, &DownloadOptions::default()).unwrap();
    let err = dl.save_to(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Incomplete);
    assert!(
        matches!(err, DownloadError::Incomplete { received: 500, expected: 4096 }),
        "{err}"
    );
    // partial file stays behind
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 500);
    drop(dl);
    server.finish();

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_silent_server_hits_io_timeout() {
    let server = FakeImageServer::start(Behaviour::Silent);
    let ticket = server.ticket("t", 1024);
    let opts = DownloadOptions {
        io_timeout: Some(Duration::from_millis(200)),
        ..DownloadOptions::default()
    };

    let mut dl = TcpDownload::connect(&ticket, &opts).unwrap();
    let started = Instant::now();
    let err = dl.read_chunk(&mut [0u8; 1024]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportIo);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(dl.state(), StreamState::Failed);
    drop(dl);

    assert_eq!(server.finish().frames, vec!["TOKEN=t", "RANGE=0:1024"]);
}
