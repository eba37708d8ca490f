//! Archived snapshot records.
//!
//! Frame layout (CBOR):
//! ```text
//! ArchiveFrame {
//!     schema_version: u32,     - must equal ARCHIVE_SCHEMA_VERSION
//!     sha256: String,          - digest of `body`
//!     body: bytes,             - zstd(CBOR(Vec<SnapshotRecord>))
//! }
//! ```
//! Records keep their original index and timestamp so a history rebuilt from
//! an archive addresses snapshots exactly as the original did.

use crate::history::{SnapshotEntry, SnapshotHistory};
use crate::snapshot::{Payload, SnapshotError, sha256_hex};
use rollback_common::{SnapshotIndex, Timestamp};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Current archive schema version.
pub const ARCHIVE_SCHEMA_VERSION: u32 = 1;

/// One archived snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub index: u64,
    pub timestamp: i64,
    pub schema_version: u32,
    pub payload: Vec<u8>,
}

impl SnapshotRecord {
    pub fn from_entry(entry: &SnapshotEntry) -> Self {
        Self {
            index: entry.index.0,
            timestamp: entry.timestamp.as_millis(),
            schema_version: ARCHIVE_SCHEMA_VERSION,
            payload: entry.payload.as_bytes().to_vec(),
        }
    }

    pub fn into_entry(self) -> Result<SnapshotEntry, SnapshotError> {
        if self.schema_version != ARCHIVE_SCHEMA_VERSION {
            return Err(SnapshotError::SchemaMismatch {
                found: self.schema_version,
                expected: ARCHIVE_SCHEMA_VERSION,
            });
        }
        Ok(SnapshotEntry::new(
            SnapshotIndex(self.index),
            Timestamp(self.timestamp),
            Payload::from_bytes(self.payload),
        ))
    }
}

#[derive(Serialize, Deserialize)]
struct ArchiveFrame {
    schema_version: u32,
    sha256: String,
    body: Vec<u8>,
}

/// Ordered sequence of snapshot records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotArchive {
    records: Vec<SnapshotRecord>,
}

impl SnapshotArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Archive every retained snapshot of a history.
    pub fn from_history(history: &SnapshotHistory) -> Self {
        Self {
            records: history.iter().map(SnapshotRecord::from_entry).collect(),
        }
    }

    /// Rebuild a history from the archived records.
    ///
    /// Records must be ordered by index. The retention limit applies while
    /// importing, so only the newest records survive a smaller limit.
    pub fn into_history(
        self,
        retention: Option<std::num::NonZeroUsize>,
    ) -> Result<SnapshotHistory, SnapshotError> {
        let mut history = SnapshotHistory::with_retention(retention);
        for record in self.records {
            let entry = record.into_entry()?;
            history.insert(entry).map_err(|stale| {
                SnapshotError::Decode(format!("record {} is out of order", stale.index))
            })?;
        }
        Ok(history)
    }

    pub fn push(&mut self, record: SnapshotRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[SnapshotRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Encode to compressed, digest-guarded bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        let body = zstd_compress(&cbor_serialize(&self.records)?)?;
        let frame = ArchiveFrame {
            schema_version: ARCHIVE_SCHEMA_VERSION,
            sha256: sha256_hex(&body),
            body,
        };
        cbor_serialize(&frame)
    }

    /// Decode bytes produced by [`SnapshotArchive::to_bytes`].
    ///
    /// Fails closed on unknown schema versions and digest mismatches.
    pub fn from_bytes(data: &[u8]) -> Result<Self, SnapshotError> {
        let frame: ArchiveFrame = cbor_deserialize(data)?;
        if frame.schema_version != ARCHIVE_SCHEMA_VERSION {
            return Err(SnapshotError::SchemaMismatch {
                found: frame.schema_version,
                expected: ARCHIVE_SCHEMA_VERSION,
            });
        }
        let actual = sha256_hex(&frame.body);
        if actual != frame.sha256 {
            return Err(SnapshotError::IntegrityMismatch {
                expected: frame.sha256,
                actual,
            });
        }
        let records = cbor_deserialize(&zstd_decompress(&frame.body)?)?;
        Ok(Self { records })
    }
}

fn cbor_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, SnapshotError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| SnapshotError::Encode(e.to_string()))?;
    Ok(buf)
}

fn cbor_deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, SnapshotError> {
    ciborium::from_reader(data).map_err(|e| SnapshotError::Decode(e.to_string()))
}

fn zstd_compress(data: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), 3)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn zstd_decompress(data: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_history() -> SnapshotHistory {
        let mut history = SnapshotHistory::new();
        for hp in [30u32, 22, 15] {
            history.push(Payload::encode(&hp).unwrap());
        }
        history
    }

    #[test]
    fn archive_bytes_roundtrip() {
        let archive = SnapshotArchive::from_history(&sample_history());
        assert_eq!(archive.len(), 3);

        let bytes = archive.to_bytes().unwrap();
        let decoded = SnapshotArchive::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, archive);
        assert!(
            decoded
                .records()
                .iter()
                .all(|r| r.schema_version == ARCHIVE_SCHEMA_VERSION)
        );
    }

    #[test]
    fn history_rebuilt_from_archive_keeps_indices() {
        let mut original = sample_history();
        // Shift indices so the rebuilt history must not start at zero.
        original.push(Payload::encode(&9u32).unwrap());
        let mut trimmed = SnapshotHistory::with_retention(std::num::NonZeroUsize::new(2));
        for entry in original.iter() {
            trimmed.insert(entry.clone()).unwrap();
        }

        let archive = SnapshotArchive::from_history(&trimmed);
        let rebuilt = archive.into_history(None).unwrap();
        assert_eq!(rebuilt.oldest_index(), Some(SnapshotIndex(2)));
        assert_eq!(rebuilt.latest_index(), Some(SnapshotIndex(3)));
        let entry = rebuilt.get(SnapshotIndex(3)).unwrap();
        entry.verify().unwrap();
        assert_eq!(entry.payload.decode::<u32>().unwrap(), 9);
        assert_eq!(rebuilt.next_index(), SnapshotIndex(4));
    }

    #[test]
    fn corrupted_body_fails_closed() {
        let archive = SnapshotArchive::from_history(&sample_history());
        let bytes = archive.to_bytes().unwrap();

        let mut frame: ArchiveFrame = cbor_deserialize(&bytes).unwrap();
        if let Some(byte) = frame.body.last_mut() {
            *byte ^= 0xff;
        }
        let tampered = cbor_serialize(&frame).unwrap();

        assert!(matches!(
            SnapshotArchive::from_bytes(&tampered),
            Err(SnapshotError::IntegrityMismatch { .. })
        ));
    }

    #[test]
    fn schema_mismatch_fails_closed() {
        let archive = SnapshotArchive::from_history(&sample_history());
        let mut frame: ArchiveFrame = cbor_deserialize(&archive.to_bytes().unwrap()).unwrap();
        frame.schema_version = 999;
        let bytes = cbor_serialize(&frame).unwrap();

        match SnapshotArchive::from_bytes(&bytes) {
            Err(SnapshotError::SchemaMismatch { found, expected }) => {
                assert_eq!(found, 999);
                assert_eq!(expected, ARCHIVE_SCHEMA_VERSION);
            }
            Err(e) => panic!("expected SchemaMismatch, got: {e}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn record_with_unknown_schema_is_rejected() {
        let mut archive = SnapshotArchive::new();
        archive.push(SnapshotRecord {
            index: 0,
            timestamp: 0,
            schema_version: 2,
            payload: Payload::encode(&1u32).unwrap().into_bytes(),
        });
        assert!(matches!(
            archive.into_history(None),
            Err(SnapshotError::SchemaMismatch { found: 2, .. })
        ));
    }

    #[test]
    fn garbage_bytes_are_decode_error() {
        assert!(matches!(
            SnapshotArchive::from_bytes(b"not an archive"),
            Err(SnapshotError::Decode(_))
        ));
    }
}
