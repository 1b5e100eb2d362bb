// Durable photo store on LMDB, keyed by a blake3 digest of the photo id.
use crate::chunking::{StoredPreview, decode_from_storage, encode_for_storage};
use crate::error::StoreError;
use crate::photo::{GeoTag, Photo};
use lmdb::{Cursor, Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const DB_NAME_PHOTOS: &str = "photos";

pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

/// Fixed-width key for a photo id. Ids grow with the file name and LMDB
/// caps keys at 511 bytes; the full id lives inside the record.
fn record_key(id: &str) -> [u8; 32] {
    *blake3::hash(id.as_bytes()).as_bytes()
}

fn key_hex(key: &[u8]) -> String {
    key.iter().map(|b| format!("{:02x}", b)).collect()
}

/// On-disk form of a photo. The preview is the `data:` url of the bytes,
/// chunked when it exceeds the chunk threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub name: String,
    pub preview: StoredPreview,
    pub is_chunked: bool,
    pub location: Option<GeoTag>,
    /// Capture time as naive seconds since the epoch
    pub captured_at: Option<i64>,
    pub formatted_date: String,
    pub file_extension: String,
    pub mime: String,
    pub imported_at: i64,
}

impl StoredRecord {
    pub fn from_photo(photo: &Photo) -> Self {
        let preview = encode_for_storage(&photo.preview.data_url());
        Self {
            id: photo.id.clone(),
            name: photo.name.clone(),
            is_chunked: preview.is_chunked(),
            preview,
            location: photo.location,
            captured_at: photo.captured_at.map(|dt| dt.and_utc().timestamp()),
            formatted_date: photo.formatted_date.clone(),
            file_extension: photo.file_extension.clone(),
            mime: photo.mime.clone(),
            imported_at: photo.imported_at,
        }
    }

    /// Original preview payload, chunks concatenated in stored order.
    pub fn preview_payload(&self) -> String {
        decode_from_storage(&self.preview)
    }

    /// Serialize to bytes using postcard
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_stdvec(self)
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }

    fn validate(&self) -> Result<(), StoreError> {
        let invalid = |reason| StoreError::InvalidRecord { id: self.id.clone(), reason };
        if self.id.is_empty() {
            return Err(invalid("empty id"));
        }
        if self.name.is_empty() {
            return Err(invalid("empty name"));
        }
        if self.is_chunked != self.preview.is_chunked() {
            return Err(invalid("chunk flag disagrees with preview"));
        }
        Ok(())
    }
}

pub struct PhotoStore {
    env: Arc<Environment>,
    db: Database,
    path: PathBuf,
}

impl std::fmt::Debug for PhotoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoStore").field("path", &self.path).finish()
    }
}

impl PhotoStore {
    /// Open the store at `path`, creating the directory and table on first use.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, StoreError> {
        fs::create_dir_all(path)
            .map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;

        let env = Environment::new().set_map_size(map_size).set_max_dbs(4).open(path)?;
        let db = env.create_db(Some(DB_NAME_PHOTOS), DatabaseFlags::empty())?;

        info!(path = %path.display(), "photo store opened");
        Ok(Self { env: Arc::new(env), db, path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record at rest, in key order (callers sort by import time). Records that fail to decode are
    /// logged and skipped.
    pub fn load_all(&self) -> Result<Vec<StoredRecord>, StoreError> {
        let txn = self.env.begin_ro_txn()?;
        let mut records = Vec::new();
        {
            let mut cursor = txn.open_ro_cursor(self.db)?;
            for item in cursor.iter_start() {
                let (key, value) = item?;
                match StoredRecord::from_bytes(value) {
                    Ok(record) if record.is_chunked == record.preview.is_chunked() => {
                        records.push(record)
                    }
                    Ok(record) => warn!(id = %record.id, "chunk flag mismatch, skipping record"),
                    Err(e) => warn!(key = %key_hex(key), error = %e, "undecodable record, skipping"),
                }
            }
        }
        txn.commit()?;
        debug!(count = records.len(), "loaded stored photos");
        Ok(records)
    }

    /// Insert or fully replace each record, all in one transaction.
    /// Any invalid record aborts the whole batch.
    pub fn upsert_batch(&self, records: &[StoredRecord]) -> Result<(), StoreError> {
        let mut txn = self.env.begin_rw_txn()?;
        for record in records {
            record.validate()?;
            let bytes = record.to_bytes()?;
            txn.put(self.db, &record_key(&record.id), &bytes, WriteFlags::empty())?;
        }
        txn.commit()?;
        debug!(count = records.len(), "upserted photo batch");
        Ok(())
    }

    /// Remove one record. Returns false if it was not stored.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut txn = self.env.begin_rw_txn()?;
        match txn.del(self.db, &record_key(id), None) {
            Ok(()) => {
                txn.commit()?;
                Ok(true)
            }
            Err(lmdb::Error::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        let mut txn = self.env.begin_rw_txn()?;
        txn.clear_db(self.db)?;
        txn.commit()?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let txn = self.env.begin_ro_txn()?;
        let count = {
            let mut cursor = txn.open_ro_cursor(self.db)?;
            let mut n = 0;
            for item in cursor.iter_start() {
                item?;
                n += 1;
            }
            n
        };
        txn.commit()?;
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::CHUNK_SIZE;

    fn record(id: &str, preview: &str) -> StoredRecord {
        let preview = encode_for_storage(preview);
        StoredRecord {
            id: id.to_string(),
            name: format!("{}.jpg", id),
            is_chunked: preview.is_chunked(),
            preview,
            location: None,
            captured_at: None,
            formatted_date: "Unknown Date".to_string(),
            file_extension: "jpg".to_string(),
            mime: "image/jpeg".to_string(),
            imported_at: 1,
        }
    }

    fn open_temp() -> (tempfile::TempDir, PhotoStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::open(dir.path(), 64 << 20).unwrap();
        (dir, store)
    }

    #[test]
    fn test_open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = PhotoStore::open(dir.path(), 64 << 20).unwrap();
            store.upsert_batch(&[record("a", "x")]).unwrap();
        }
        let store = PhotoStore::open(dir.path(), 64 << 20).unwrap();
        assert_eq!(store.load_all().unwrap(), vec![record("a", "x")]);
    }

    #[test]
    fn test_upsert_replaces_existing_id() {
        let (_dir, store) = open_temp();
        store.upsert_batch(&[record("a", "first")]).unwrap();
        store.upsert_batch(&[record("a", "second")]).unwrap();

        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].preview_payload(), "second");
    }

    #[test]
    fn test_chunked_record_round_trip() {
        let (_dir, store) = open_temp();
        let payload: String =
            (0..(2 * CHUNK_SIZE + 17)).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        store.upsert_batch(&[record("big", &payload)]).unwrap();

        let all = store.load_all().unwrap();
        assert!(all[0].is_chunked);
        assert_eq!(all[0].preview_payload(), payload);
    }

    #[test]
    fn test_failed_batch_leaves_previous_state() {
        let (_dir, store) = open_temp();
        store.upsert_batch(&[record("a", "1"), record("b", "2")]).unwrap();

        // Valid record first, so the failure happens mid-transaction
        let batch = [record("c", "3"), record("a", "changed"), record("", "bad")];
        let err = store.upsert_batch(&batch).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));

        let all = store.load_all().unwrap();
        assert_eq!(all, vec![record("a", "1"), record("b", "2")]);
    }

    #[test]
    fn test_delete_and_clear() {
        let (_dir, store) = open_temp();
        store.upsert_batch(&[record("a", "1"), record("b", "2")]).unwrap();

        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert_eq!(store.len().unwrap(), 1);

        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_id_longer_than_lmdb_key_limit() {
        let (_dir, store) = open_temp();
        let long_id = format!("{}.jpg-1700000000000", "日".repeat(180));
        assert!(long_id.len() > 511);

        store.upsert_batch(&[record("short", "1"), record(&long_id, "2")]).unwrap();
        let mut ids: Vec<String> = store.load_all().unwrap().into_iter().map(|r| r.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["short".to_string(), long_id.clone()]);

        assert!(store.delete(&long_id).unwrap());
        assert_eq!(store.load_all().unwrap(), vec![record("short", "1")]);
    }
}
