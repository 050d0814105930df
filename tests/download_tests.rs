//! Tests for the download module functionality.
//!
//! This file contains tests for requests, destination resolution, progress
//! snapshots and protocol resolution.

use tributary::download::{
    derive_filename, DownloadOptions, DownloadOutcome, DownloadRequest, ProgressSnapshot,
};
use tributary::transport::Protocol;
use tributary::Error;

use std::path::{Path, PathBuf};

mod common;
use common::helpers::*;

#[test]
fn test_protocol_resolution_order() {
    let cases = [
        (TEST_CID, Protocol::Content),
        ("Qmhttp.torrent", Protocol::Content),
        (TEST_MAGNET, Protocol::Torrent),
        ("https://example.com/linux.iso.torrent", Protocol::Torrent),
        ("http://example.com/file.zip", Protocol::Http),
        ("https://example.com/file.zip", Protocol::Http),
    ];

    for (identifier, expected) in cases {
        assert_eq!(
            Protocol::resolve(identifier).unwrap(),
            expected,
            "identifier: {identifier}"
        );
    }
}

#[test]
fn test_invalid_addresses() {
    for identifier in ["ftp://host/file", "", "file:///etc/hosts", "qmlowercase"] {
        assert!(matches!(
            Protocol::resolve(identifier),
            Err(Error::InvalidAddress(_))
        ));
    }
}

#[test]
fn test_percent_formula() {
    let totals = [1u64, 3, 7, 250, 1000, 1 << 20, 4_294_967_311];
    for total in totals {
        for written in [0, 1, total / 3, total / 2, total - 1, total] {
            let snapshot = ProgressSnapshot::from_bytes(written, Some(total));
            let expected = (written as f64 / total as f64 * 100.0 * 100.0).round() / 100.0;
            assert_eq!(snapshot.percent, Some(expected), "{written}/{total}");
            assert_eq!(snapshot.total_bytes, Some(total));
        }
    }
}

#[test]
fn test_zero_total_is_unknown() {
    let snapshot = ProgressSnapshot::from_bytes(10, Some(0));
    assert_eq!(snapshot.percent, None);
    assert_eq!(snapshot.total_bytes, None);
    assert!(!snapshot.is_complete());
}

#[test]
fn test_fraction_is_scaled() {
    assert_eq!(ProgressSnapshot::from_fraction(0.123456, 1, 10).percent, Some(12.35));
    assert_eq!(ProgressSnapshot::from_fraction(1.5, 10, 10).percent, Some(100.0));
    assert_eq!(ProgressSnapshot::from_fraction(f64::NAN, 0, 10).percent, Some(0.0));
}

#[test]
fn test_filename_derivation() {
    let cases = [
        ("https://example.com/a/b/file.bin", "file.bin"),
        ("https://example.com/my%20file.txt", "my file.txt"),
        ("https://example.com/get?filename=report.pdf", "report.pdf"),
        ("https://example.com/", "download"),
        ("magnet:?xt=urn:btih:abc&dn=movie.mkv", "movie.mkv"),
        ("magnet:?xt=urn:btih:abc", "download"),
        (TEST_CID, TEST_CID),
    ];

    for (identifier, expected) in cases {
        assert_eq!(derive_filename(identifier), expected, "identifier: {identifier}");
    }
}

#[test]
fn test_request_conversions() {
    let request = DownloadRequest::from("https://example.com/file.zip");
    assert_eq!(request.identifier(), "https://example.com/file.zip");
    assert_eq!(request.filename(), "file.zip");
    assert_eq!(request.protocol().unwrap(), Protocol::Http);
    assert_eq!(request, DownloadRequest::from(String::from("https://example.com/file.zip")));
}

#[test]
fn test_destination_resolution() {
    let request = DownloadRequest::new("https://example.com/file.zip");
    let default_dir = Path::new("/srv/downloads");

    let destination = DownloadOptions::new().destination(&request, default_dir);
    assert_eq!(destination.path(), Path::new("/srv/downloads/file.zip"));

    let destination = DownloadOptions::new()
        .directory("/tmp/elsewhere")
        .filename("renamed.zip")
        .destination(&request, default_dir);
    assert_eq!(destination.path(), Path::new("/tmp/elsewhere/renamed.zip"));

    let destination = DownloadOptions::new()
        .directory("/tmp/ignored")
        .explicit_path("/opt/exact.bin")
        .destination(&request, default_dir);
    assert_eq!(destination.into_path(), PathBuf::from("/opt/exact.bin"));
}

#[test]
fn test_relative_destination_is_absolute() {
    let request = DownloadRequest::new("https://example.com/file.zip");
    let destination = DownloadOptions::new().destination(&request, Path::new("relative"));
    assert!(destination.path().is_absolute());
    assert!(destination.path().ends_with("relative/file.zip"));
}

#[test]
fn test_outcome_into_result() {
    assert_eq!(
        DownloadOutcome::Finished(PathBuf::from("/tmp/a")).into_result().unwrap(),
        PathBuf::from("/tmp/a")
    );
    assert!(matches!(
        DownloadOutcome::Cancelled.into_result(),
        Err(Error::UserCancelled)
    ));
    assert!(matches!(
        DownloadOutcome::Failed(Error::Transport("x".into())).into_result(),
        Err(Error::Transport(_))
    ));
}
