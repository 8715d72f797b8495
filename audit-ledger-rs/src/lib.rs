// audit-ledger-rs/src/lib.rs
// Append-only JSONL audit ledger.
//
// Minimal in-process ledger API used for the ethical-violation stream and
// the self-correction stream:
//
// - Append-only on disk, one JSON record per line
// - Records are serialized with serde_json; malformed lines are skipped
//   on read with a warning rather than failing the whole scan
// - Safe under concurrent turns: appends serialize through a mutex and
//   each line is flushed before the lock is released

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Errors produced by the ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Append-only line-delimited JSON ledger.
pub struct JsonlLedger {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlLedger {
    /// Open (or create) the ledger at `path`, creating parent directories
    /// as needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single JSON line.
    pub fn append<T: Serialize>(&self, record: &T) -> Result<(), LedgerError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        file.write_all(line.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    /// Read every parseable record back. Malformed lines are logged and
    /// skipped so one bad write cannot poison the whole audit trail.
    pub fn read_all<T: DeserializeOwned>(&self) -> Result<Vec<T>, LedgerError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    log::warn!("skipping malformed ledger line in {:?}: {}", self.path, e);
                }
            }
        }

        Ok(records)
    }

    /// Number of parseable records currently in the ledger.
    pub fn len<T: DeserializeOwned>(&self) -> Result<usize, LedgerError> {
        Ok(self.read_all::<T>()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestRecord {
        id: u32,
        note: String,
    }

    fn temp_ledger_path() -> PathBuf {
        std::env::temp_dir().join(format!("ledger-test-{}.jsonl", uuid::Uuid::new_v4()))
    }

    #[test]
    fn append_then_read_back() {
        let path = temp_ledger_path();
        let ledger = JsonlLedger::open(&path).unwrap();

        ledger
            .append(&TestRecord {
                id: 1,
                note: "first".to_string(),
            })
            .unwrap();
        ledger
            .append(&TestRecord {
                id: 2,
                note: "second".to_string(),
            })
            .unwrap();

        let records: Vec<TestRecord> = ledger.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 1);
        assert_eq!(records[1].note, "second");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let path = temp_ledger_path();
        let ledger = JsonlLedger::open(&path).unwrap();
        ledger
            .append(&TestRecord {
                id: 1,
                note: "ok".to_string(),
            })
            .unwrap();

        // Corrupt the file with a non-JSON line.
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(b"not json at all\n").unwrap();
        }

        let records: Vec<TestRecord> = ledger.read_all().unwrap();
        assert_eq!(records.len(), 1);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_reads_empty() {
        let path = temp_ledger_path();
        let ledger = JsonlLedger::open(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let records: Vec<TestRecord> = ledger.read_all().unwrap();
        assert!(records.is_empty());
    }
}
