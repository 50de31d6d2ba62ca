//! Offline audits of stores written by a session.

use std::path::PathBuf;

use chainlog::core::SerializedRecord;
use chainlog::store::{AccessMode, SqliteRecordStore};
use chainlog::{ChainAuditor, ViolationKind};
use chainlog_testkit::fixtures::{humidity, temperature, TestFixture};

/// Write a small two-stream recording and return the backing file.
fn recording(fixture: &TestFixture) -> PathBuf {
    let uri = fixture.uri("run");
    let mut session = fixture.session();
    session.open(&uri, AccessMode::ReadWrite).unwrap();
    session.create_stream(&temperature()).unwrap();
    session.create_stream(&humidity()).unwrap();
    for (stream, ts, payload) in [
        ("temperature", 100, &b"22.5"[..]),
        ("humidity", 110, &b"0.41"[..]),
        ("temperature", 200, &b"23.1"[..]),
        ("temperature", 300, &b"23.4"[..]),
    ] {
        session
            .write(SerializedRecord::new(stream, ts, payload))
            .unwrap();
    }
    session.close().unwrap();
    uri.join("run.db3")
}

#[test]
fn untampered_recording_is_clean() {
    let fixture = TestFixture::new();
    let path = recording(&fixture);

    let store = SqliteRecordStore::open(&path, AccessMode::ReadOnly).unwrap();
    let report = ChainAuditor::audit(&store).unwrap();

    assert!(report.is_clean(), "{:?}", report.violations);
    assert_eq!(report.streams_checked, 2);
    assert_eq!(report.records_checked, 4);

    // The audited tips are the last checkpoints the ledger saw.
    let checkpoints = fixture.publisher.checkpoints();
    for name in ["temperature", "humidity"] {
        let last = checkpoints
            .iter()
            .rev()
            .find(|c| c.record.stream_name == name)
            .unwrap();
        assert_eq!(report.tip(name), Some(last.digest));
    }
}

#[test]
fn tampered_payload_is_reported() {
    let fixture = TestFixture::new();
    let path = recording(&fixture);

    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute("UPDATE records SET data = X'3939' WHERE id = 3", [])
        .unwrap();
    drop(conn);

    let store = SqliteRecordStore::open(&path, AccessMode::ReadOnly).unwrap();
    let report = ChainAuditor::audit(&store).unwrap();

    let violations: Vec<_> = report
        .violations_of(ViolationKind::RecordDigestMismatch)
        .collect();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].stream, "temperature");
    assert_eq!(violations[0].record_index, Some(1));
}

#[test]
fn tampered_anchor_is_reported() {
    let fixture = TestFixture::new();
    let path = recording(&fixture);

    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute("UPDATE streams SET chain_nonce = zeroblob(32) WHERE id = 2", [])
        .unwrap();
    drop(conn);

    let store = SqliteRecordStore::open(&path, AccessMode::ReadOnly).unwrap();
    let report = ChainAuditor::audit(&store).unwrap();

    assert!(!report.is_clean());
    assert_eq!(report.violations_of(ViolationKind::AnchorBreak).count(), 1);
    assert_eq!(
        report
            .violations_of(ViolationKind::StreamDigestMismatch)
            .count(),
        1
    );
    assert_eq!(
        report
            .violations_of(ViolationKind::RecordDigestMismatch)
            .count(),
        0
    );
}
