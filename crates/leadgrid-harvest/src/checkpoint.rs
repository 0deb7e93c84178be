//! Durable run-progress checkpoints.
//!
//! One JSON file per run key under the checkpoint directory. The file is
//! rewritten after every unit of work (one grid-point search, one candidate
//! enrichment), so a crash repeats at most one unit on resume. Presence of a
//! file at run start means "resume"; absence means "fresh run". The file is
//! deleted only after a successful export.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use leadgrid_places::PlaceSummary;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::grid::GridPoint;
use crate::records::EnrichedRecord;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint IO error for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Snapshot of everything a resumed run needs.
///
/// Besides the progress indexes the snapshot carries the already-enriched
/// records: after an export failure the run must be resumable as
/// "re-export only", which is impossible if enrichment output lives only in
/// memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCheckpoint {
    pub center: GridPoint,
    /// The full ordered grid; `next_grid_index` indexes into it.
    pub grid_points: Vec<GridPoint>,
    pub next_grid_index: usize,
    /// Raw hits accumulated across completed grid points, in search order.
    pub raw_results: Vec<PlaceSummary>,
    /// Candidates whose enrichment already completed (successfully or not).
    pub processed_place_ids: BTreeSet<String>,
    pub enriched_records: Vec<EnrichedRecord>,
    pub api_call_count: u64,
    /// Pacer state: unix millis of the most recent provider call.
    pub last_call_unix_ms: Option<u64>,
}

impl RunCheckpoint {
    #[must_use]
    pub fn fresh(center: GridPoint, grid_points: Vec<GridPoint>) -> Self {
        Self {
            center,
            grid_points,
            next_grid_index: 0,
            raw_results: Vec::new(),
            processed_place_ids: BTreeSet::new(),
            enriched_records: Vec::new(),
            api_call_count: 0,
            last_call_unix_ms: None,
        }
    }
}

/// Derives the durable checkpoint key for a run from its search term and
/// submission time. Callers that want to resume a specific run across
/// restarts must hold on to this key.
#[must_use]
pub fn checkpoint_key(search_term: &str, submitted_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(search_term.as_bytes());
    hasher.update(b"|");
    hasher.update(submitted_at.to_rfc3339().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// File-backed checkpoint persistence, one file per run key.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Writes the checkpoint durably: serialize to a temp file, then rename
    /// over the final path so a crash mid-write never leaves a truncated
    /// checkpoint behind.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Io`] if the directory or file cannot be
    /// written, or [`CheckpointError::Serialize`] if encoding fails.
    pub fn save(&self, key: &str, checkpoint: &RunCheckpoint) -> Result<(), CheckpointError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;

        let body = serde_json::to_vec_pretty(checkpoint)?;
        let path = self.file_path(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        std::fs::write(&tmp, body).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
        Ok(())
    }

    /// Loads the checkpoint for `key`, or `None` when no checkpoint exists
    /// (a fresh run).
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Io`] on read failure other than
    /// file-not-found, or [`CheckpointError::Serialize`] if the file does not
    /// parse.
    pub fn load(&self, key: &str) -> Result<Option<RunCheckpoint>, CheckpointError> {
        let path = self.file_path(key);
        let body = match std::fs::read_to_string(&path) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&path, e)),
        };
        let checkpoint = serde_json::from_str(&body)?;
        Ok(Some(checkpoint))
    }

    /// Removes the checkpoint for `key`. Missing files are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Io`] if the file exists but cannot be
    /// removed.
    pub fn clear(&self, key: &str) -> Result<(), CheckpointError> {
        let path = self.file_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&path, e)),
        }
    }
}

fn io_err(path: &Path, source: std::io::Error) -> CheckpointError {
    CheckpointError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_checkpoint() -> RunCheckpoint {
        let center = GridPoint {
            lat: 40.0,
            lng: -74.0,
        };
        let mut cp = RunCheckpoint::fresh(center, vec![center, center]);
        cp.next_grid_index = 1;
        cp.api_call_count = 3;
        cp.last_call_unix_ms = Some(1_700_000_000_000);
        cp.processed_place_ids.insert("p1".to_owned());
        cp.enriched_records.push(EnrichedRecord::empty("p1"));
        cp
    }

    #[test]
    fn load_returns_none_for_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert!(store.load("no-such-key").unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips_progress_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let cp = sample_checkpoint();

        store.save("key-1", &cp).unwrap();
        let loaded = store.load("key-1").unwrap().expect("checkpoint present");

        assert_eq!(loaded.next_grid_index, 1);
        assert_eq!(loaded.api_call_count, 3);
        assert_eq!(loaded.last_call_unix_ms, Some(1_700_000_000_000));
        assert!(loaded.processed_place_ids.contains("p1"));
        assert_eq!(loaded.enriched_records.len(), 1);
        assert_eq!(loaded.grid_points.len(), 2);
    }

    #[test]
    fn save_overwrites_previous_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let mut cp = sample_checkpoint();

        store.save("key-1", &cp).unwrap();
        cp.next_grid_index = 2;
        store.save("key-1", &cp).unwrap();

        let loaded = store.load("key-1").unwrap().expect("checkpoint present");
        assert_eq!(loaded.next_grid_index, 2);
    }

    #[test]
    fn clear_removes_the_checkpoint_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());

        store.save("key-1", &sample_checkpoint()).unwrap();
        store.clear("key-1").unwrap();
        assert!(store.load("key-1").unwrap().is_none());

        // Clearing again must not error.
        store.clear("key-1").unwrap();
    }

    #[test]
    fn checkpoint_key_is_deterministic_and_filename_safe() {
        let at = DateTime::parse_from_rfc3339("2026-08-25T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let a = checkpoint_key("coffee shop", at);
        let b = checkpoint_key("coffee shop", at);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64, "SHA-256 hex is 64 chars");
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn checkpoint_key_differs_by_term_and_time() {
        let at = DateTime::parse_from_rfc3339("2026-08-25T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = DateTime::parse_from_rfc3339("2026-08-25T12:00:01Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_ne!(checkpoint_key("coffee", at), checkpoint_key("tea", at));
        assert_ne!(checkpoint_key("coffee", at), checkpoint_key("coffee", later));
    }
}
