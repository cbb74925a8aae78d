//! Append-only prediction history.
//!
//! The store is the single writer of the `alzcare_predictions` collection.
//! Reads are most-recent-first. Durability is best effort: when the backend
//! rejects a write the in-memory history still holds the record for the rest
//! of the session and the caller gets [`Durability::SessionOnly`].

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::{StorageError, ValidationError};
use crate::record::PredictionRecord;
use crate::storage::{load_collection, save_collection, KeyValueStore, PREDICTIONS_KEY};

/// Whether a mutation reached the durable backend.
#[derive(Debug)]
#[must_use]
pub enum Durability {
    Persisted,
    SessionOnly(StorageError),
}

impl Durability {
    pub fn is_persisted(&self) -> bool {
        matches!(self, Durability::Persisted)
    }

    pub(crate) fn from_write(result: Result<(), StorageError>, what: &str) -> Self {
        match result {
            Ok(()) => Durability::Persisted,
            Err(e) => {
                warn!("{what} kept for this session only: {e}");
                Durability::SessionOnly(e)
            }
        }
    }
}

pub struct RecordStore<S> {
    backend: S,
    key: String,
    // Newest first, same order as the persisted array.
    records: Vec<PredictionRecord>,
}

/// Reads the stored history and checks it still satisfies the append rules:
/// unique ids and timestamps that never increase from front to back.
fn load_history<S: KeyValueStore>(
    backend: &S,
    key: &str,
) -> Result<Vec<PredictionRecord>, StorageError> {
    let records: Vec<PredictionRecord> = load_collection(backend, key)?;
    let corrupt = |reason: String| StorageError::Corrupt {
        key: key.to_string(),
        reason,
    };

    let mut seen = HashSet::with_capacity(records.len());
    for r in &records {
        if !seen.insert(r.id()) {
            return Err(corrupt(format!("duplicate record id {:?}", r.id())));
        }
    }
    if let Some(pair) = records
        .windows(2)
        .find(|w| w[0].timestamp() < w[1].timestamp())
    {
        return Err(corrupt(format!(
            "record {:?} is older than the record {:?} stored after it",
            pair[0].id(),
            pair[1].id()
        )));
    }
    Ok(records)
}

impl<S: KeyValueStore> RecordStore<S> {
    /// Loads the existing history. Unreadable stored data is an error.
    pub fn open(backend: S) -> Result<Self, StorageError> {
        Self::open_with_key(backend, PREDICTIONS_KEY)
    }

    pub fn open_with_key(backend: S, key: &str) -> Result<Self, StorageError> {
        let records = load_history(&backend, key)?;
        debug!("loaded {} prediction records from {key:?}", records.len());
        Ok(Self {
            backend,
            key: key.to_string(),
            records,
        })
    }

    /// Like [`RecordStore::open`], but starts from an empty history when the
    /// stored value cannot be read. The next successful write replaces it.
    pub fn open_lenient(backend: S) -> Self {
        let records = match load_history(&backend, PREDICTIONS_KEY) {
            Ok(records) => records,
            Err(e) => {
                warn!("starting with an empty history: {e}");
                Vec::new()
            }
        };
        Self {
            backend,
            key: PREDICTIONS_KEY.to_string(),
            records,
        }
    }

    /// Adds `record` as the most recent entry.
    ///
    /// Validation failures leave the store untouched. Persistence failures do
    /// not: the record stays in memory and the outcome says so.
    pub fn append(&mut self, record: PredictionRecord) -> Result<Durability, ValidationError> {
        if self.records.iter().any(|r| r.id() == record.id()) {
            return Err(ValidationError::DuplicateId(record.id().to_string()));
        }
        if let Some(latest) = self.records.first() {
            if record.timestamp() < latest.timestamp() {
                return Err(ValidationError::TimestampRegression {
                    latest: latest.timestamp(),
                    attempted: record.timestamp(),
                });
            }
        }

        debug!(
            "append {} {} ({:.2})",
            record.id(),
            record.stage(),
            record.confidence()
        );
        self.records.insert(0, record);
        Ok(self.persist("prediction"))
    }

    /// Most-recent-first view of the history. Empty when nothing was recorded.
    pub fn all(&self) -> &[PredictionRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&PredictionRecord> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn latest(&self) -> Option<&PredictionRecord> {
        self.records.first()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Deletes a whole record. Fields are never edited in place.
    pub fn remove(&mut self, id: &str) -> Option<(PredictionRecord, Durability)> {
        let idx = self.records.iter().position(|r| r.id() == id)?;
        let removed = self.records.remove(idx);
        Some((removed, self.persist("deletion")))
    }

    /// Retries the durable write of the current in-memory history.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        save_collection(&mut self.backend, &self.key, &self.records)
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    pub fn into_backend(self) -> S {
        self.backend
    }

    fn persist(&mut self, what: &str) -> Durability {
        let result = save_collection(&mut self.backend, &self.key, &self.records);
        Durability::from_write(result, what)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;
    use crate::storage::MemoryStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap() + Duration::minutes(min)
    }

    fn rec(id: &str, min: i64, stage: Stage) -> PredictionRecord {
        PredictionRecord::new(id, t(min), stage, 0.9).unwrap()
    }

    #[test]
    fn empty_store_reads_as_empty() {
        let store = RecordStore::open(MemoryStore::new()).unwrap();
        assert!(store.all().is_empty());
        assert!(store.latest().is_none());
    }

    #[test]
    fn all_is_most_recent_first() {
        let mut store = RecordStore::open(MemoryStore::new()).unwrap();
        for (id, m) in [("a", 0), ("b", 1), ("c", 2)] {
            assert!(store.append(rec(id, m, Stage::Mild)).unwrap().is_persisted());
        }
        let ids: Vec<&str> = store.all().iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn history_survives_reopen() {
        let mut store = RecordStore::open(MemoryStore::new()).unwrap();
        let _ = store.append(rec("a", 0, Stage::NonDemented)).unwrap();
        let _ = store.append(rec("b", 5, Stage::VeryMild)).unwrap();

        let reopened = RecordStore::open(store.into_backend()).unwrap();
        let ids: Vec<&str> = reopened.all().iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(reopened.get("a").unwrap().stage(), Stage::NonDemented);
    }

    #[test]
    fn rejects_duplicates_and_time_travel_without_mutating() {
        let mut store = RecordStore::open(MemoryStore::new()).unwrap();
        let _ = store.append(rec("a", 10, Stage::Mild)).unwrap();

        let dup = store.append(rec("a", 11, Stage::Mild)).unwrap_err();
        assert_eq!(dup, ValidationError::DuplicateId("a".to_string()));

        let early = store.append(rec("b", 9, Stage::Mild)).unwrap_err();
        assert!(matches!(early, ValidationError::TimestampRegression { .. }));

        // Equal timestamps are fine: ordering is non-decreasing.
        let _ = store.append(rec("c", 10, Stage::Mild)).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn quota_failure_keeps_session_view_and_flush_recovers() {
        let mut store = RecordStore::open(MemoryStore::with_quota(64)).unwrap();
        let outcome = store.append(rec("aaaaaaaaa", 0, Stage::Mild)).unwrap();
        assert!(matches!(
            outcome,
            Durability::SessionOnly(StorageError::QuotaExceeded { .. })
        ));
        assert_eq!(store.len(), 1);
        assert!(store.flush().is_err());

        store.backend_mut().set_quota(None);
        store.flush().unwrap();
        let reopened = RecordStore::open(store.into_backend()).unwrap();
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn remove_deletes_whole_record() {
        let mut store = RecordStore::open(MemoryStore::new()).unwrap();
        let _ = store.append(rec("a", 0, Stage::Mild)).unwrap();
        let _ = store.append(rec("b", 1, Stage::Moderate)).unwrap();

        let (gone, durability) = store.remove("a").unwrap();
        assert_eq!(gone.id(), "a");
        assert!(durability.is_persisted());
        assert!(store.remove("a").is_none());

        let reopened = RecordStore::open(store.into_backend()).unwrap();
        assert_eq!(reopened.all().len(), 1);
        assert_eq!(reopened.all()[0].id(), "b");
    }

    #[test]
    fn stored_history_breaking_order_or_uniqueness_is_corrupt() {
        let cases = [
            // Oldest first instead of newest first.
            vec![rec("a", 0, Stage::Mild), rec("b", 5, Stage::Mild)],
            vec![rec("a", 5, Stage::Mild), rec("a", 0, Stage::Moderate)],
        ];
        for records in cases {
            let mut backend = MemoryStore::new();
            backend
                .set(PREDICTIONS_KEY, &serde_json::to_string(&records).unwrap())
                .unwrap();
            assert!(matches!(
                RecordStore::open(backend.clone()),
                Err(StorageError::Corrupt { .. })
            ));
            assert!(RecordStore::open_lenient(backend).is_empty());
        }

        // Equal timestamps still load.
        let mut backend = MemoryStore::new();
        let ok = vec![rec("b", 5, Stage::Mild), rec("a", 5, Stage::Mild)];
        backend
            .set(PREDICTIONS_KEY, &serde_json::to_string(&ok).unwrap())
            .unwrap();
        assert_eq!(RecordStore::open(backend).unwrap().len(), 2);
    }

    #[test]
    fn corrupt_data_is_strict_error_or_lenient_empty() {
        let mut backend = MemoryStore::new();
        backend.set(PREDICTIONS_KEY, "[{\"id\":1}]").unwrap();
        assert!(matches!(
            RecordStore::open(backend.clone()),
            Err(StorageError::Corrupt { .. })
        ));

        let mut store = RecordStore::open_lenient(backend);
        assert!(store.is_empty());
        let _ = store.append(rec("a", 0, Stage::Mild)).unwrap();
        assert_eq!(RecordStore::open(store.into_backend()).unwrap().len(), 1);
    }
}
