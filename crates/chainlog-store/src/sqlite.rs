//! SQLite implementation of the RecordStore trait.
//!
//! This is the primary storage backend for chainlog. It uses rusqlite with
//! bundled SQLite. Hot statements go through the connection's prepared
//! statement cache, so "preparing" a path means warming that cache.

use std::path::Path;

use bytes::Bytes;
use rusqlite::{params, Connection, ErrorCode, OpenFlags};

use chainlog_core::{Digest, Nonce, Record, StreamDescriptor, StreamId};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{
    AccessMode, OpenStore, ReadPosition, RecordStore, StoredMessage, StreamAnchor, StreamStatistics,
};

const INSERT_RECORD: &str =
    "INSERT INTO records (stream_id, timestamp, data, chain_digest) VALUES (?1, ?2, ?3, ?4)";

const SELECT_RECORDS_PAGE: &str =
    "SELECT records.id, records.timestamp, streams.name, records.data
     FROM records JOIN streams ON records.stream_id = streams.id
     WHERE (records.timestamp, records.id) > (?1, ?2)
     ORDER BY records.timestamp, records.id
     LIMIT ?3";

/// SQLite-based record store.
///
/// Owns its connection; a single store is driven by a single session.
pub struct SqliteRecordStore {
    conn: Connection,
    mode: AccessMode,
}

impl SqliteRecordStore {
    /// Open a SQLite database at the given path.
    ///
    /// ReadWrite creates the file if needed; ReadOnly requires an existing
    /// file with a migrated schema.
    pub fn open(path: impl AsRef<Path>, mode: AccessMode) -> Result<Self> {
        let path = path.as_ref();
        let conn = match mode {
            AccessMode::ReadWrite => Connection::open(path)?,
            AccessMode::ReadOnly => Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?,
        };
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        if mode.is_read_only() {
            let version = migration::current_version(&conn).map_err(|e| {
                StoreError::InvalidData(format!("{} is not a chainlog store: {}", path.display(), e))
            })?;
            if version != migration::CURRENT_VERSION {
                return Err(StoreError::Migration(format!(
                    "unsupported schema version {} in {}",
                    version,
                    path.display()
                )));
            }
        }

        tracing::debug!(path = %path.display(), ?mode, "opened sqlite store");
        Ok(Self { conn, mode })
    }

    /// Open an in-memory SQLite database with the schema already created.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let mut store = Self {
            conn,
            mode: AccessMode::ReadWrite,
        };
        store.create_schema()?;
        Ok(store)
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.mode.is_read_only() {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

// Helper to read a 32-byte column into a chain value
fn blob_32<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: for<'a> TryFrom<&'a [u8], Error = std::array::TryFromSliceError>,
{
    let bytes: Vec<u8> = row.get(idx)?;
    T::try_from(bytes.as_slice()).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Blob, Box::new(e))
    })
}

fn row_to_descriptor(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<StreamDescriptor> {
    Ok(StreamDescriptor {
        name: row.get(offset)?,
        type_name: row.get(offset + 1)?,
        serialization_format: row.get(offset + 2)?,
    })
}

impl RecordStore for SqliteRecordStore {
    fn create_schema(&mut self) -> Result<()> {
        self.ensure_writable()?;
        migration::migrate(&mut self.conn)
    }

    fn prepare_for_writing(&mut self) -> Result<()> {
        self.ensure_writable()?;
        self.conn.prepare_cached(INSERT_RECORD)?;
        Ok(())
    }

    fn insert_stream(
        &mut self,
        descriptor: &StreamDescriptor,
        nonce: &Nonce,
        digest: &Digest,
    ) -> Result<StreamId> {
        self.ensure_writable()?;

        self.conn
            .execute(
                "INSERT INTO streams (name, type, serialization_format, chain_nonce, chain_digest)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    descriptor.name,
                    descriptor.type_name,
                    descriptor.serialization_format,
                    nonce.as_bytes().as_slice(),
                    digest.as_bytes().as_slice(),
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StoreError::DuplicateStream(descriptor.name.clone())
                } else {
                    StoreError::from(e)
                }
            })?;

        Ok(StreamId::new(self.last_insert_id()))
    }

    fn insert_record(
        &mut self,
        stream_id: StreamId,
        timestamp: i64,
        payload: &[u8],
        digest: &Digest,
    ) -> Result<()> {
        self.ensure_writable()?;

        let mut stmt = self.conn.prepare_cached(INSERT_RECORD)?;
        stmt.execute(params![
            stream_id.get(),
            timestamp,
            payload,
            digest.as_bytes().as_slice(),
        ])
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StoreError::MissingStream(stream_id.get())
            } else {
                StoreError::from(e)
            }
        })?;

        Ok(())
    }

    fn last_insert_id(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    fn query_records_ordered_by_timestamp(
        &self,
        after: ReadPosition,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let mut stmt = self.conn.prepare_cached(SELECT_RECORDS_PAGE)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let messages = stmt
            .query_map(params![after.timestamp, after.id, limit], |row| {
                let payload: Vec<u8> = row.get(3)?;
                Ok(StoredMessage {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    stream_name: row.get(2)?,
                    payload: Bytes::from(payload),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(messages)
    }

    fn query_streams_ordered_by_id(&self) -> Result<Vec<StreamDescriptor>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type, serialization_format FROM streams ORDER BY id")?;

        let descriptors = stmt
            .query_map([], |row| row_to_descriptor(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(descriptors)
    }

    fn aggregate_per_stream_stats(&self) -> Result<Vec<StreamStatistics>> {
        let mut stmt = self.conn.prepare(
            "SELECT streams.name, streams.type, streams.serialization_format,
                    COUNT(records.id), MIN(records.timestamp), MAX(records.timestamp)
             FROM records JOIN streams ON streams.id = records.stream_id
             GROUP BY streams.id
             ORDER BY streams.id",
        )?;

        let stats = stmt
            .query_map([], |row| {
                let count: i64 = row.get(3)?;
                Ok(StreamStatistics {
                    descriptor: row_to_descriptor(row, 0)?,
                    count: count as u64,
                    min_timestamp: row.get(4)?,
                    max_timestamp: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(stats)
    }

    fn storage_size_bytes(&self) -> Result<u64> {
        let page_count: i64 = self.conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = self.conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok((page_count.max(0) as u64) * (page_size.max(0) as u64))
    }

    fn query_stream_anchors(&self) -> Result<Vec<StreamAnchor>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, type, serialization_format, chain_nonce, chain_digest
             FROM streams ORDER BY id",
        )?;

        let anchors = stmt
            .query_map([], |row| {
                Ok(StreamAnchor {
                    id: StreamId::new(row.get(0)?),
                    descriptor: row_to_descriptor(row, 1)?,
                    nonce: blob_32::<Nonce>(row, 4)?,
                    digest: blob_32::<Digest>(row, 5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(anchors)
    }

    fn query_stream_chain(&self, stream_id: StreamId) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, data, chain_digest FROM records
             WHERE stream_id = ?1 ORDER BY id",
        )?;

        let records = stmt
            .query_map(params![stream_id.get()], |row| {
                let payload: Vec<u8> = row.get(1)?;
                Ok(Record {
                    timestamp: row.get(0)?,
                    stream_id,
                    payload: Bytes::from(payload),
                    digest: blob_32::<Digest>(row, 2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }
}

impl OpenStore for SqliteRecordStore {
    fn open_file(path: &Path, mode: AccessMode) -> Result<Self> {
        Self::open(path, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRecordStore;
    use chainlog_core::compute_stream_digest;
    use proptest::prelude::*;

    fn temperature() -> StreamDescriptor {
        StreamDescriptor::new("temperature", "Float32", "raw")
    }

    fn insert_temperature(store: &mut SqliteRecordStore) -> StreamId {
        let nonce = Nonce::from_bytes([1; 32]);
        let digest = compute_stream_digest(&nonce, &temperature()).unwrap();
        store.insert_stream(&temperature(), &nonce, &digest).unwrap()
    }

    #[test]
    fn test_insert_stream_assigns_ids_in_order() {
        let mut store = SqliteRecordStore::open_memory().unwrap();
        let id1 = insert_temperature(&mut store);
        let id2 = store
            .insert_stream(
                &StreamDescriptor::new("humidity", "Float32", "raw"),
                &Nonce::from_bytes([2; 32]),
                &Digest::hash(b"h"),
            )
            .unwrap();

        assert_eq!(id1, StreamId::new(1));
        assert_eq!(id2, StreamId::new(2));
        assert_eq!(store.last_insert_id(), 2);

        let names: Vec<_> = store
            .query_streams_ordered_by_id()
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["temperature", "humidity"]);
    }

    #[test]
    fn test_duplicate_stream_name_rejected() {
        let mut store = SqliteRecordStore::open_memory().unwrap();
        insert_temperature(&mut store);

        let result = store.insert_stream(&temperature(), &Nonce::from_bytes([9; 32]), &Digest::ZERO);
        assert!(matches!(result, Err(StoreError::DuplicateStream(name)) if name == "temperature"));
    }

    #[test]
    fn test_record_for_missing_stream_rejected() {
        let mut store = SqliteRecordStore::open_memory().unwrap();
        let result = store.insert_record(StreamId::new(42), 1, b"x", &Digest::ZERO);
        assert!(matches!(result, Err(StoreError::MissingStream(42))));
    }

    #[test]
    fn test_records_paged_in_timestamp_order() {
        let mut store = SqliteRecordStore::open_memory().unwrap();
        let id = insert_temperature(&mut store);
        store.prepare_for_writing().unwrap();

        for ts in [300, 100, 200, 100] {
            store
                .insert_record(id, ts, format!("t{ts}").as_bytes(), &Digest::ZERO)
                .unwrap();
        }

        let first = store
            .query_records_ordered_by_timestamp(ReadPosition::START, 3)
            .unwrap();
        assert_eq!(
            first.iter().map(|m| (m.timestamp, m.id)).collect::<Vec<_>>(),
            vec![(100, 2), (100, 4), (200, 3)]
        );
        assert!(first.iter().all(|m| m.stream_name == "temperature"));

        let rest = store
            .query_records_ordered_by_timestamp(first[2].position(), 3)
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].timestamp, 300);
        assert_eq!(rest[0].payload, Bytes::from_static(b"t300"));
    }

    #[test]
    fn test_stats_and_chain() {
        let mut store = SqliteRecordStore::open_memory().unwrap();
        let id = insert_temperature(&mut store);
        store
            .insert_stream(
                &StreamDescriptor::new("idle", "Empty", "raw"),
                &Nonce::from_bytes([3; 32]),
                &Digest::hash(b"idle"),
            )
            .unwrap();

        store.insert_record(id, 100, b"22.5", &Digest::hash(b"a")).unwrap();
        store.insert_record(id, 200, b"23.1", &Digest::hash(b"b")).unwrap();

        let stats = store.aggregate_per_stream_stats().unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].descriptor, temperature());
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats[0].min_timestamp, 100);
        assert_eq!(stats[0].max_timestamp, 200);

        let chain = store.query_stream_chain(id).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].digest, Digest::hash(b"b"));

        let anchors = store.query_stream_anchors().unwrap();
        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors[0].nonce, Nonce::from_bytes([1; 32]));

        assert!(store.storage_size_bytes().unwrap() > 0);
    }

    #[test]
    fn test_read_only_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db3");

        {
            let mut store = SqliteRecordStore::open(&path, AccessMode::ReadWrite).unwrap();
            store.create_schema().unwrap();
            let id = insert_temperature(&mut store);
            store.insert_record(id, 100, b"22.5", &Digest::ZERO).unwrap();
        }

        let mut store = SqliteRecordStore::open(&path, AccessMode::ReadOnly).unwrap();
        assert_eq!(store.query_streams_ordered_by_id().unwrap().len(), 1);
        assert!(matches!(
            store.insert_record(StreamId::new(1), 1, b"x", &Digest::ZERO),
            Err(StoreError::ReadOnly)
        ));
    }

    #[test]
    fn test_read_only_requires_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.db3");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE unrelated (x INTEGER);")
            .unwrap();

        assert!(SqliteRecordStore::open(&path, AccessMode::ReadOnly).is_err());
    }

    fn drain(store: &impl RecordStore, page: usize) -> Vec<(i64, i64, String)> {
        let mut after = ReadPosition::START;
        let mut out = Vec::new();
        loop {
            let batch = store.query_records_ordered_by_timestamp(after, page).unwrap();
            let Some(last) = batch.last() else {
                return out;
            };
            after = last.position();
            out.extend(batch.into_iter().map(|m| (m.timestamp, m.id, m.stream_name)));
        }
    }

    proptest! {
        #[test]
        fn test_paging_matches_memory_store(
            writes in prop::collection::vec((any::<bool>(), -50i64..50), 0..64),
            page in 1usize..8,
        ) {
            let mut sqlite = SqliteRecordStore::open_memory().unwrap();
            let mut memory = MemoryRecordStore::new();
            memory.create_schema().unwrap();

            let humidity = StreamDescriptor::new("humidity", "Float32", "raw");
            let nonce = Nonce::from_bytes([1; 32]);
            let mut ids = Vec::new();
            for store in [&mut sqlite as &mut dyn RecordStore, &mut memory] {
                let t = store.insert_stream(&temperature(), &nonce, &Digest::hash(b"t")).unwrap();
                let h = store.insert_stream(&humidity, &nonce, &Digest::hash(b"h")).unwrap();
                ids.push((t, h));
            }
            prop_assert_eq!(ids[0], ids[1]);

            let (t, h) = ids[0];
            for (on_temperature, ts) in &writes {
                let id = if *on_temperature { t } else { h };
                sqlite.insert_record(id, *ts, b"x", &Digest::ZERO).unwrap();
                memory.insert_record(id, *ts, b"x", &Digest::ZERO).unwrap();
            }

            let from_sqlite = drain(&sqlite, page);
            prop_assert_eq!(from_sqlite.len(), writes.len());
            prop_assert!(from_sqlite.windows(2).all(|w| (w[0].0, w[0].1) < (w[1].0, w[1].1)));
            prop_assert_eq!(from_sqlite, drain(&memory, page));
        }
    }
}
