//! Structured interaction lookup against the side-effect table.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{PipelineError, RetryPolicy};
use crate::db::{find_side_effects, open_read_only, DatabaseError};
use crate::models::{MatchMode, SideEffectRecord};

pub trait InteractionLookup: Send + Sync {
    /// Recorded side effects for the two drugs, in either stored order.
    /// No matching rows is an empty vec, never an error.
    fn lookup(&self, drug_a: &str, drug_b: &str) -> Result<Vec<SideEffectRecord>, PipelineError>;
}

/// Read-only SQLite store. Each lookup opens its own connection so pair
/// workers never share one.
pub struct SqliteInteractionStore {
    path: PathBuf,
    match_mode: MatchMode,
    busy_timeout: Duration,
    retry: RetryPolicy,
}

impl SqliteInteractionStore {
    pub fn new(path: &Path, match_mode: MatchMode, busy_timeout: Duration) -> Self {
        Self {
            path: path.to_path_buf(),
            match_mode,
            busy_timeout,
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn query(&self, drug_a: &str, drug_b: &str) -> Result<Vec<SideEffectRecord>, DatabaseError> {
        let conn = open_read_only(&self.path, self.busy_timeout)?;
        find_side_effects(&conn, drug_a, drug_b, self.match_mode)
    }
}

impl InteractionLookup for SqliteInteractionStore {
    fn lookup(&self, drug_a: &str, drug_b: &str) -> Result<Vec<SideEffectRecord>, PipelineError> {
        let records = self
            .retry
            .run(
                "storage_lookup",
                || self.query(drug_a, drug_b),
                DatabaseError::is_transient,
            )
            .map_err(|e| {
                tracing::warn!(
                    drug_a,
                    drug_b,
                    path = %self.path.display(),
                    error = %e,
                    "Structured lookup failed"
                );
                PipelineError::StorageUnavailable(e.to_string())
            })?;

        tracing::debug!(drug_a, drug_b, rows = records.len(), "Structured lookup complete");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{insert_side_effect, open_database, SideEffectRow};

    fn row(a: &str, b: &str, effect: &str) -> SideEffectRow {
        SideEffectRow {
            num_row: None,
            stitch_id_1: "CID000000001".into(),
            stitch_id_2: "CID000000002".into(),
            side_effect_id: "C0000001".into(),
            side_effect_name: effect.into(),
            drug_name_1: a.into(),
            drug_name_2: b.into(),
        }
    }

    fn seeded_store(dir: &tempfile::TempDir) -> SqliteInteractionStore {
        let path = dir.path().join("interactions.sqlite3");
        let conn = open_database(&path).unwrap();
        insert_side_effect(&conn, &row("Sevoflurane", "Aminophylline", "hypotension")).unwrap();
        insert_side_effect(&conn, &row("Warfarin", "Aspirin", "bleeding")).unwrap();
        insert_side_effect(&conn, &row("Aspirin", "Warfarin", "bruising")).unwrap();
        drop(conn);
        SqliteInteractionStore::new(&path, MatchMode::Exact, Duration::from_millis(200))
    }

    #[test]
    fn single_matching_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir);
        let records = store.lookup("Sevoflurane", "Aminophylline").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].side_effect_name, "hypotension");
    }

    #[test]
    fn case_and_order_do_not_matter() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir);
        let upper = store.lookup("WARFARIN", "aspirin").unwrap();
        let swapped = store.lookup("aspirin", "warfarin").unwrap();
        assert_eq!(upper, swapped);
        let effects: Vec<_> = upper.iter().map(|r| r.side_effect_name.as_str()).collect();
        assert_eq!(effects, vec!["bleeding", "bruising"]);
    }

    #[test]
    fn unknown_pair_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir);
        assert!(store.lookup("Metformin", "Lisinopril").unwrap().is_empty());
    }

    #[test]
    fn missing_database_is_storage_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteInteractionStore::new(
            &dir.path().join("absent.sqlite3"),
            MatchMode::Exact,
            Duration::from_millis(50),
        )
        .with_retry(RetryPolicy {
            max_retries: 1,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
        });
        let err = store.lookup("Warfarin", "Aspirin").unwrap_err();
        assert!(matches!(err, PipelineError::StorageUnavailable(_)));
    }
}
