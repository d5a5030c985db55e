//! Storage backends for the ledger. `AuditLedger` owns exactly one
//! writer at a time (enforced by its own mutex); stores only need to be
//! safe to read concurrently with that single writer.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::entry::AuditEntry;
use crate::error::LedgerError;

pub trait LedgerStore: Send + Sync {
    fn append(&self, entry: &AuditEntry) -> Result<(), LedgerError>;
    fn read_all(&self) -> Result<Vec<AuditEntry>, LedgerError>;
    fn len(&self) -> Result<u64, LedgerError> {
        Ok(self.read_all()?.len() as u64)
    }
    fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.len()? == 0)
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for InMemoryStore {
    fn append(&self, entry: &AuditEntry) -> Result<(), LedgerError> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<AuditEntry>, LedgerError> {
        Ok(self.entries.lock().clone())
    }
}

/// Append-only file store. Each record is framed as a little-endian
/// `u32` byte length followed by that many bytes of canonical JSON, so a
/// reader can detect a torn trailing write (process killed mid-`write`)
/// instead of mis-parsing it as the next record.
pub struct FileStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scan the file for a torn trailing record (declared length that
    /// runs past EOF) and truncate it off, returning the number of bytes
    /// removed. Call this once at startup before trusting `read_all`.
    pub fn recover(&self) -> Result<u64, LedgerError> {
        let mut file = self.file.lock();
        let mut buf = Vec::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut buf)?;

        let mut offset = 0usize;
        let mut last_good = 0usize;
        while offset + 4 <= buf.len() {
            let len = u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap()) as usize;
            let record_end = offset + 4 + len;
            if record_end > buf.len() {
                break;
            }
            offset = record_end;
            last_good = offset;
        }

        let removed = (buf.len() - last_good) as u64;
        if removed > 0 {
            file.set_len(last_good as u64)?;
            file.seek(SeekFrom::End(0))?;
        }
        Ok(removed)
    }
}

impl LedgerStore for FileStore {
    fn append(&self, entry: &AuditEntry) -> Result<(), LedgerError> {
        let bytes = serde_json::to_vec(entry)?;
        let len = (bytes.len() as u32).to_le_bytes();
        let mut file = self.file.lock();
        file.write_all(&len)?;
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<AuditEntry>, LedgerError> {
        let mut file = self.file.lock();
        let mut buf = Vec::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut buf)?;

        let mut out = Vec::new();
        let mut offset = 0usize;
        while offset + 4 <= buf.len() {
            let len = u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap()) as usize;
            let record_end = offset + 4 + len;
            if record_end > buf.len() {
                break;
            }
            let entry: AuditEntry = serde_json::from_slice(&buf[offset + 4..record_end])?;
            out.push(entry);
            offset = record_end;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::AuditEntry;
    use chrono::Utc;

    fn sample_entry(sequence: u64) -> AuditEntry {
        AuditEntry {
            sequence,
            recorded_at: Utc::now(),
            payload: serde_json::json!({"n": sequence}),
            previous_hash: "prev".into(),
            hash: format!("hash-{sequence}"),
            signature: "sig".into(),
            signer: "signer-1".into(),
            demo_signed: true,
        }
    }

    #[test]
    fn in_memory_round_trip() {
        let store = InMemoryStore::new();
        store.append(&sample_entry(0)).unwrap();
        store.append(&sample_entry(1)).unwrap();
        let all = store.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].sequence, 1);
    }

    #[test]
    fn file_store_round_trip_and_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let store = FileStore::open(&path).unwrap();
        store.append(&sample_entry(0)).unwrap();
        store.append(&sample_entry(1)).unwrap();

        let reopened = FileStore::open(&path).unwrap();
        let all = reopened.read_all().unwrap();
        assert_eq!(all.len(), 2);

        // simulate a torn trailing write: append a truncated record
        {
            use std::io::Write as _;
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&50u32.to_le_bytes()).unwrap();
            f.write_all(b"not enough bytes").unwrap();
        }

        let recovering = FileStore::open(&path).unwrap();
        let removed = recovering.recover().unwrap();
        assert!(removed > 0);
        let all = recovering.read_all().unwrap();
        assert_eq!(all.len(), 2);
    }
}
