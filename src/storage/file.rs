//! File-backed gate result store.
//!
//! Records are appended to a JSONL log (`<data_dir>/gate_results.jsonl`), one
//! [`GateResultRecord`] per line. Retention trims rewrite the log via
//! temp file + rename so a crash never leaves a half-written file behind.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::default_data_dir;
use crate::error::{Result, SieveError};
use crate::pipeline::GateResultRecord;
use crate::storage::FailureRecorderRepository;

/// File name of the gate result log inside the data directory.
pub const GATE_RESULTS_FILE: &str = "gate_results.jsonl";

/// Append-only JSONL store of gate results.
#[derive(Debug)]
pub struct FileGateResultStore {
    /// Path to the log file.
    path: PathBuf,
    /// Serializes appends and rewrites within this process.
    write_lock: Mutex<()>,
}

impl FileGateResultStore {
    /// Open the store in the default data directory.
    ///
    /// Uses `~/.sieve/` or `$SIEVE_HOME/`.
    pub fn new() -> Result<Self> {
        let dir = default_data_dir()
            .ok_or_else(|| SieveError::config("Could not determine data directory (no home directory)"))?;
        Self::with_dir(dir)
    }

    /// Open the store in a custom directory, creating it if needed.
    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| SieveError::storage(dir, e))?;
        }
        Ok(Self {
            path: dir.join(GATE_RESULTS_FILE),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_file_name(format!(".{}.tmp", GATE_RESULTS_FILE))
    }

    /// Read every record. Malformed lines are skipped with a warning.
    pub fn read_all(&self) -> Result<Vec<GateResultRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| SieveError::storage(&self.path, e))?;

        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<GateResultRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = line_no + 1,
                        error = %e,
                        "skipping malformed gate result"
                    );
                }
            }
        }
        Ok(records)
    }

    fn append(&self, record: &GateResultRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        let _guard = self.write_lock.lock().unwrap();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SieveError::storage(&self.path, e))?;
        writeln!(file, "{}", json).map_err(|e| SieveError::storage(&self.path, e))?;
        Ok(())
    }

    /// Rewrite the log keeping only records that satisfy `keep`.
    fn rewrite(&self, keep: impl Fn(&GateResultRecord) -> bool) -> Result<usize> {
        let _guard = self.write_lock.lock().unwrap();
        let records = self.read_all()?;
        let before = records.len();
        let kept: Vec<&GateResultRecord> = records.iter().filter(|r| keep(r)).collect();
        let removed = before - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        let temp_path = self.temp_path();
        {
            let mut file =
                fs::File::create(&temp_path).map_err(|e| SieveError::storage(&temp_path, e))?;
            for record in &kept {
                let json = serde_json::to_string(record)?;
                writeln!(file, "{}", json).map_err(|e| SieveError::storage(&temp_path, e))?;
            }
            file.sync_all()
                .map_err(|e| SieveError::storage(&temp_path, e))?;
        }
        fs::rename(&temp_path, &self.path).map_err(|e| SieveError::storage(&self.path, e))?;

        Ok(removed)
    }

    fn entity_records(&self, entity_type: &str, entity_id: &str) -> Result<Vec<GateResultRecord>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| r.entity_type == entity_type && r.entity_id == entity_id)
            .collect())
    }
}

#[async_trait]
impl FailureRecorderRepository for FileGateResultStore {
    async fn insert(&self, record: &GateResultRecord) -> Result<()> {
        self.append(record)
    }

    async fn latest_attempt_number(&self, entity_type: &str, entity_id: &str) -> Result<u32> {
        Ok(self
            .entity_records(entity_type, entity_id)?
            .iter()
            .map(|r| r.attempt_number)
            .max()
            .unwrap_or(0))
    }

    async fn attempt_results(
        &self,
        entity_type: &str,
        entity_id: &str,
        attempt_number: u32,
    ) -> Result<Vec<GateResultRecord>> {
        Ok(self
            .entity_records(entity_type, entity_id)?
            .into_iter()
            .filter(|r| r.attempt_number == attempt_number)
            .collect())
    }

    async fn failures(&self, entity_type: &str, entity_id: &str) -> Result<Vec<GateResultRecord>> {
        Ok(self
            .entity_records(entity_type, entity_id)?
            .into_iter()
            .filter(|r| !r.passed)
            .collect())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.rewrite(|r| r.created_at >= cutoff)
    }
}
