//! End-to-end tests for storage sessions over SQLite.

use std::fs;

use chainlog::core::{
    compute_next_anchor_nonce, compute_stream_digest, digest::replay_chain, Digest, Nonce,
    Record, SerializedRecord, StreamDescriptor, StreamId,
};
use chainlog::store::{
    self, AccessMode, MemoryRecordStore, ReadPosition, RecordStore, StoredMessage, StoreError,
    StreamAnchor, StreamStatistics,
};
use chainlog::{
    Manifest, SessionConfig, SessionError, StorageSession, MANIFEST_FILE_NAME,
};
use chainlog_testkit::fixtures::{
    humidity, init_tracing, temperature, RecordingPublisher, TestFixture,
};
use chainlog_testkit::generators::{distinct_descriptors, record_params};
use chainlog_testkit::vectors::all_vectors;
use proptest::prelude::*;

fn record(stream: &str, timestamp: i64, payload: &'static [u8]) -> SerializedRecord {
    SerializedRecord::new(stream, timestamp, payload)
}

fn read_all(session: &mut StorageSession) -> Vec<SerializedRecord> {
    let mut records = Vec::new();
    while session.has_next().unwrap() {
        records.push(session.read_next().unwrap());
    }
    records
}

#[test]
fn temperature_scenario() {
    init_tracing();
    let fixture = TestFixture::new();
    let vector = &all_vectors()[0];

    let mut session = fixture.session_with_nonce(Nonce::from_bytes(vector.nonce));
    session.open(fixture.uri("run"), AccessMode::ReadWrite).unwrap();

    let id = session.create_stream(&temperature()).unwrap();
    assert_eq!(id, StreamId::new(1));

    let d2 = session.write(record("temperature", 100, b"22.5")).unwrap();
    let d3 = session.write(record("temperature", 200, b"23.1")).unwrap();

    assert_eq!(
        fixture.publisher.announcements()[0].digest.to_hex(),
        vector.expected_stream_digest
    );
    assert_eq!(d2.to_hex(), vector.records[0].expected_digest);
    assert_eq!(d3.to_hex(), vector.records[1].expected_digest);

    let first = session.read_next().unwrap();
    assert_eq!((first.timestamp, &first.payload[..]), (100, &b"22.5"[..]));
    let second = session.read_next().unwrap();
    assert_eq!((second.timestamp, &second.payload[..]), (200, &b"23.1"[..]));
    assert!(matches!(session.read_next(), Err(SessionError::EndOfStream)));

    session.close().unwrap();
}

#[test]
fn checkpoints_replay_from_stream_digest() {
    let fixture = TestFixture::new();
    let mut session = fixture.session();
    session.open(fixture.uri("run"), AccessMode::ReadWrite).unwrap();
    session.create_stream(&temperature()).unwrap();
    session.create_stream(&humidity()).unwrap();

    let writes = [
        record("temperature", 10, b"21.0"),
        record("humidity", 11, b"0.40"),
        record("temperature", 12, b"21.5"),
        record("temperature", 13, b"22.0"),
        record("humidity", 14, b"0.42"),
    ];
    for w in &writes {
        session.write(w.clone()).unwrap();
    }

    let announcements = fixture.publisher.announcements();
    let checkpoints = fixture.publisher.checkpoints();
    assert_eq!(checkpoints.len(), writes.len());

    for (index, announcement) in announcements.iter().enumerate() {
        let name = &announcement.descriptor.name;
        let stream_id = StreamId::new(index as i64 + 1);

        let records: Vec<&SerializedRecord> =
            writes.iter().filter(|r| &r.stream_name == name).collect();
        let replayed =
            replay_chain(announcement.digest, records.iter().map(|r| r.link(stream_id))).unwrap();

        let published: Vec<Digest> = checkpoints
            .iter()
            .filter(|c| &c.record.stream_name == name)
            .map(|c| c.digest)
            .collect();
        assert_eq!(replayed, published, "chain of '{}'", name);

        // Every checkpoint carries the stream's anchor.
        assert!(checkpoints
            .iter()
            .filter(|c| &c.record.stream_name == name)
            .all(|c| c.nonce == Nonce::from(announcement.digest)));
    }
}

#[test]
fn creation_advances_session_nonce() {
    let fixture = TestFixture::new();
    let nonce = Nonce::from_bytes([7; 32]);
    let mut session = fixture.session_with_nonce(nonce);
    session.open(fixture.uri("run"), AccessMode::ReadWrite).unwrap();

    session.create_stream(&temperature()).unwrap();
    session.create_stream(&humidity()).unwrap();

    let announcements = fixture.publisher.announcements();
    let d1 = compute_stream_digest(&nonce, &temperature()).unwrap();
    let n1 = compute_next_anchor_nonce(&d1, &temperature()).unwrap();
    let d2 = compute_stream_digest(&n1, &humidity()).unwrap();

    assert_eq!(announcements[0].digest, d1);
    assert_eq!(announcements[1].digest, d2);
    assert_eq!(
        session.registry().session_nonce(),
        compute_next_anchor_nonce(&d2, &humidity()).unwrap()
    );
}

#[test]
fn creation_is_idempotent() {
    let fixture = TestFixture::new();
    let mut session = fixture.session();
    session.open(fixture.uri("run"), AccessMode::ReadWrite).unwrap();

    let first = session.create_stream(&temperature()).unwrap();
    let nonce = session.registry().session_nonce();
    let second = session
        .create_stream(&StreamDescriptor::new("temperature", "Float64", "cdr"))
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(session.registry().session_nonce(), nonce);
    assert_eq!(fixture.publisher.announcements().len(), 1);
    assert_eq!(session.get_all_streams().unwrap(), vec![temperature()]);
}

#[test]
fn write_to_unknown_stream_has_no_effect() {
    let fixture = TestFixture::new();
    let mut session = fixture.session();
    session.open(fixture.uri("run"), AccessMode::ReadWrite).unwrap();
    session.create_stream(&temperature()).unwrap();

    let before = session.registry().lookup("temperature").cloned();

    let result = session.write(record("pressure", 1, b"1013"));
    assert!(matches!(result, Err(SessionError::UnknownStream(name)) if name == "pressure"));

    assert_eq!(session.registry().lookup("temperature").cloned(), before);
    assert!(session.registry().lookup("pressure").is_none());
    assert!(fixture.publisher.checkpoints().is_empty());
    assert_eq!(session.get_metadata().unwrap().record_count, 0);
    assert!(!session.has_next().unwrap());
}

#[test]
fn invalid_descriptor_rejected() {
    let fixture = TestFixture::new();
    let mut session = fixture.session();
    session.open(fixture.uri("run"), AccessMode::ReadWrite).unwrap();

    let result = session.create_stream(&StreamDescriptor::new("bad\0name", "Float32", "raw"));
    assert!(matches!(result, Err(SessionError::InvalidInput(_))));
    assert!(session.get_all_streams().unwrap().is_empty());
}

#[test]
fn reads_interleave_streams_by_timestamp() {
    let fixture = TestFixture::with_config(SessionConfig {
        read_batch_size: 2,
        ..Default::default()
    });
    let mut session = fixture.session();
    session.open(fixture.uri("run"), AccessMode::ReadWrite).unwrap();
    session.create_stream(&temperature()).unwrap();
    session.create_stream(&humidity()).unwrap();

    session.write(record("temperature", 5, b"a")).unwrap();
    session.write(record("humidity", 3, b"b")).unwrap();
    session.write(record("temperature", 1, b"c")).unwrap();
    session.write(record("humidity", 5, b"d")).unwrap();
    session.write(record("temperature", 3, b"e")).unwrap();

    let order: Vec<(i64, Vec<u8>)> = read_all(&mut session)
        .into_iter()
        .map(|r| (r.timestamp, r.payload.to_vec()))
        .collect();
    assert_eq!(
        order,
        vec![
            (1, b"c".to_vec()),
            (3, b"b".to_vec()),
            (3, b"e".to_vec()),
            (5, b"a".to_vec()),
            (5, b"d".to_vec()),
        ]
    );
}

#[test]
fn empty_store_metadata() {
    let fixture = TestFixture::new();
    let mut session = fixture.session();
    session.open(fixture.uri("run"), AccessMode::ReadWrite).unwrap();
    session.create_stream(&temperature()).unwrap();

    let metadata = session.get_metadata().unwrap();
    assert_eq!(metadata.record_count, 0);
    assert_eq!(metadata.starting_time, 0);
    assert_eq!(metadata.duration, 0);
    assert!(metadata.streams.is_empty());
    assert_eq!(metadata.storage_identifier, "chainlog");
    assert_eq!(metadata.relative_file_paths, vec!["run.db3".to_string()]);
    assert!(metadata.size_bytes > 0);
}

#[test]
fn metadata_aggregates_per_stream() {
    let fixture = TestFixture::new();
    let mut session = fixture.session();
    session.open(fixture.uri("run"), AccessMode::ReadWrite).unwrap();
    session.create_stream(&temperature()).unwrap();
    session.create_stream(&humidity()).unwrap();
    session.create_stream(&StreamDescriptor::new("idle", "Empty", "cdr")).unwrap();

    session.write(record("temperature", 100, b"22.5")).unwrap();
    session.write(record("temperature", 300, b"23.1")).unwrap();
    session.write(record("humidity", 50, b"0.4")).unwrap();

    let metadata = session.get_metadata().unwrap();
    assert_eq!(metadata.record_count, 3);
    assert_eq!(metadata.starting_time, 50);
    assert_eq!(metadata.duration, 250);
    assert_eq!(metadata.streams.len(), 2);

    let temp = metadata
        .streams
        .iter()
        .find(|s| s.descriptor.name == "temperature")
        .unwrap();
    assert_eq!((temp.count, temp.min_timestamp, temp.max_timestamp), (2, 100, 300));
}

#[test]
fn removal_changes_nothing() {
    let fixture = TestFixture::new();
    let mut session = fixture.session();
    session.open(fixture.uri("run"), AccessMode::ReadWrite).unwrap();
    session.create_stream(&temperature()).unwrap();
    session.write(record("temperature", 1, b"x")).unwrap();
    let tip = session.registry().lookup("temperature").unwrap().clone();

    let decision = session.remove_stream(&temperature()).unwrap();
    assert!(decision.is_retained());

    assert_eq!(session.registry().lookup("temperature"), Some(&tip));
    assert_eq!(session.get_all_streams().unwrap(), vec![temperature()]);
    assert_eq!(read_all(&mut session).len(), 1);
    session.write(record("temperature", 2, b"y")).unwrap();
}

#[test]
fn read_only_reopen_reads_back() {
    let fixture = TestFixture::new();
    let uri = fixture.uri("run");

    let mut writer = fixture.session();
    writer.open(&uri, AccessMode::ReadWrite).unwrap();
    writer.create_stream(&temperature()).unwrap();
    writer.create_stream(&humidity()).unwrap();
    writer.write(record("humidity", 20, b"0.41")).unwrap();
    writer.write(record("temperature", 10, b"22.5")).unwrap();
    writer.close().unwrap();

    let manifest = Manifest::load(&uri.join(MANIFEST_FILE_NAME)).unwrap();
    assert_eq!(manifest.record_count, 2);
    assert_eq!(manifest.starting_time_ns, 10);
    assert_eq!(manifest.duration_ns, 10);

    let mut reader = fixture.session();
    reader.open(&uri, AccessMode::ReadOnly).unwrap();

    assert_eq!(reader.get_all_streams().unwrap(), vec![temperature(), humidity()]);
    let records = read_all(&mut reader);
    assert_eq!(
        records,
        vec![record("temperature", 10, b"22.5"), record("humidity", 20, b"0.41")]
    );

    assert!(matches!(
        reader.write(record("temperature", 30, b"1")),
        Err(SessionError::ReadOnly)
    ));
    assert!(matches!(
        reader.create_stream(&temperature()),
        Err(SessionError::ReadOnly)
    ));
    assert_eq!(reader.get_metadata().unwrap().record_count, 2);

    reader.close().unwrap();
    // A read-only close leaves the manifest alone.
    assert_eq!(Manifest::load(&uri.join(MANIFEST_FILE_NAME)).unwrap(), manifest);
}

#[test]
fn read_only_open_failures() {
    let fixture = TestFixture::new();
    let mut session = fixture.session();

    let missing = fixture.uri("missing");
    assert!(matches!(
        session.open(&missing, AccessMode::ReadOnly),
        Err(SessionError::NotFound { .. })
    ));

    let no_files = fixture.uri("no_files");
    fs::create_dir_all(&no_files).unwrap();
    let mut manifest = Manifest::from_metadata(&chainlog::StorageMetadata::from_statistics(
        vec![],
        vec![],
        0,
    ));
    manifest.save(&no_files.join(MANIFEST_FILE_NAME)).unwrap();
    assert!(matches!(
        session.open(&no_files, AccessMode::ReadOnly),
        Err(SessionError::NotFound { .. })
    ));

    let dangling = fixture.uri("dangling");
    fs::create_dir_all(&dangling).unwrap();
    manifest.relative_file_paths = vec!["dangling.db3".into()];
    manifest.save(&dangling.join(MANIFEST_FILE_NAME)).unwrap();
    assert!(matches!(
        session.open(&dangling, AccessMode::ReadOnly),
        Err(SessionError::NotFound { .. })
    ));

    assert!(!session.is_open());
}

#[test]
fn read_write_open_failures() {
    let fixture = TestFixture::new();
    let uri = fixture.uri("run");

    let mut first = fixture.session();
    first.open(&uri, AccessMode::ReadWrite).unwrap();
    assert!(matches!(
        first.open(&uri, AccessMode::ReadWrite),
        Err(SessionError::AlreadyOpen)
    ));
    first.close().unwrap();

    let mut second = fixture.session();
    assert!(matches!(
        second.open(&uri, AccessMode::ReadWrite),
        Err(SessionError::StorageBackend { .. })
    ));
}

#[test]
fn manifest_can_be_disabled() {
    let fixture = TestFixture::with_config(SessionConfig {
        write_manifest: false,
        ..Default::default()
    });
    let uri = fixture.uri("run");

    let mut session = fixture.session();
    session.open(&uri, AccessMode::ReadWrite).unwrap();
    session.close().unwrap();

    assert!(uri.join("run.db3").is_file());
    assert!(!uri.join(MANIFEST_FILE_NAME).exists());
}

#[test]
fn dropped_session_releases_store() {
    let fixture = TestFixture::new();
    let uri = fixture.uri("run");
    {
        let mut session = fixture.session();
        session.open(&uri, AccessMode::ReadWrite).unwrap();
        session.create_stream(&temperature()).unwrap();
        session.write(record("temperature", 1, b"x")).unwrap();
    }

    let mut reader = fixture.session();
    reader.open(&uri, AccessMode::ReadOnly).unwrap();
    assert_eq!(read_all(&mut reader).len(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn read_order_is_stable_sort_by_timestamp(
        streams in distinct_descriptors(3),
        params in prop::collection::vec(record_params(3), 0..40),
    ) {
        let fixture = TestFixture::with_config(SessionConfig {
            read_batch_size: 7,
            ..Default::default()
        });
        let mut session = fixture.session();
        session.open(fixture.uri("run"), AccessMode::ReadWrite).unwrap();
        for descriptor in &streams {
            session.create_stream(descriptor).unwrap();
        }

        let written: Vec<SerializedRecord> = params.iter().map(|p| p.to_record(&streams)).collect();
        for r in &written {
            session.write(r.clone()).unwrap();
        }

        let mut expected = written.clone();
        expected.sort_by_key(|r| r.timestamp);

        prop_assert_eq!(read_all(&mut session), expected);
    }
}

#[test]
fn failed_read_write_open_can_be_retried() {
    let fixture = TestFixture::new();
    let uri = fixture.uri("run");
    let blocker = uri.join(MANIFEST_FILE_NAME);
    fs::create_dir_all(&blocker).unwrap();

    let mut session = fixture.session();
    let result = session.open(&uri, AccessMode::ReadWrite);
    assert!(matches!(result, Err(SessionError::Manifest { .. })));
    assert!(!session.is_open());
    assert!(!uri.join("run.db3").exists());

    fs::remove_dir(&blocker).unwrap();
    session.open(&uri, AccessMode::ReadWrite).unwrap();
    session.create_stream(&temperature()).unwrap();
    session.write(record("temperature", 100, b"22.5")).unwrap();
    session.close().unwrap();

    let mut reader = fixture.session();
    reader.open(&uri, AccessMode::ReadOnly).unwrap();
    assert_eq!(read_all(&mut reader).len(), 1);
}

/// Memory store whose record inserts fail once `failing` is set.
struct FailingStore {
    inner: MemoryRecordStore,
    failing: bool,
}

impl RecordStore for FailingStore {
    fn create_schema(&mut self) -> store::Result<()> {
        self.inner.create_schema()
    }

    fn insert_stream(
        &mut self,
        descriptor: &StreamDescriptor,
        nonce: &Nonce,
        digest: &Digest,
    ) -> store::Result<StreamId> {
        self.inner.insert_stream(descriptor, nonce, digest)
    }

    fn insert_record(
        &mut self,
        stream_id: StreamId,
        timestamp: i64,
        payload: &[u8],
        digest: &Digest,
    ) -> store::Result<()> {
        if self.failing {
            return Err(StoreError::InvalidData("disk full".into()));
        }
        self.inner.insert_record(stream_id, timestamp, payload, digest)
    }

    fn last_insert_id(&self) -> i64 {
        self.inner.last_insert_id()
    }

    fn query_records_ordered_by_timestamp(
        &self,
        after: ReadPosition,
        limit: usize,
    ) -> store::Result<Vec<StoredMessage>> {
        self.inner.query_records_ordered_by_timestamp(after, limit)
    }

    fn query_streams_ordered_by_id(&self) -> store::Result<Vec<StreamDescriptor>> {
        self.inner.query_streams_ordered_by_id()
    }

    fn aggregate_per_stream_stats(&self) -> store::Result<Vec<StreamStatistics>> {
        self.inner.aggregate_per_stream_stats()
    }

    fn storage_size_bytes(&self) -> store::Result<u64> {
        self.inner.storage_size_bytes()
    }

    fn query_stream_anchors(&self) -> store::Result<Vec<StreamAnchor>> {
        self.inner.query_stream_anchors()
    }

    fn query_stream_chain(&self, stream_id: StreamId) -> store::Result<Vec<Record>> {
        self.inner.query_stream_chain(stream_id)
    }
}

#[test]
fn failed_persist_leaves_chain_untouched() {
    let publisher = RecordingPublisher::new();
    let mut session: StorageSession<FailingStore> =
        StorageSession::new(publisher.clone(), SessionConfig::default());
    session
        .attach(
            FailingStore {
                inner: MemoryRecordStore::new(),
                failing: true,
            },
            AccessMode::ReadWrite,
        )
        .unwrap();
    session.create_stream(&temperature()).unwrap();
    let before = session.registry().lookup("temperature").cloned().unwrap();

    let result = session.write(record("temperature", 100, b"22.5"));
    match result {
        Err(SessionError::StorageBackend { context, .. }) => {
            assert!(context.contains("temperature"), "context: {context}")
        }
        other => panic!("expected a storage backend error, got {other:?}"),
    }

    assert_eq!(session.registry().lookup("temperature"), Some(&before));
    assert!(publisher.checkpoints().is_empty());
    assert_eq!(session.get_metadata().unwrap().record_count, 0);
}
