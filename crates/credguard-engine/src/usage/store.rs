use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use credguard_core::error::Result;
use credguard_core::{ConsumerDimension, UsageRecord, UsageSnapshot};

use super::persist::{InMemoryUsagePersistence, UsagePersistence};

/// Process-wide usage counters: credential id -> record.
///
/// `record` and `clear` are load-modify-store sequences under one mutex that
/// also covers the write to persistence, so saves land in the same order as
/// the mutations they carry.
pub struct UsageStore {
    records: Mutex<UsageSnapshot>,
    persistence: Arc<dyn UsagePersistence>,
}

impl UsageStore {
    /// Load the persisted store.
    pub fn open(persistence: Arc<dyn UsagePersistence>) -> Result<Self> {
        let records = persistence.load()?;
        tracing::info!(credentials = records.len(), "credential usage loaded");
        Ok(Self { records: Mutex::new(records), persistence })
    }

    pub fn in_memory() -> Self {
        Self {
            records: Mutex::new(UsageSnapshot::new()),
            persistence: Arc::new(InMemoryUsagePersistence::new()),
        }
    }

    // Mutations are complete before anything that could panic runs, so a
    // poisoned lock still guards consistent counters.
    fn lock(&self) -> MutexGuard<'_, UsageSnapshot> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count one use of `credential_id`. Returns the credential's new total.
    ///
    /// The in-memory increment stands even if persisting fails; the error is
    /// returned so the caller can log it.
    pub fn record(&self, credential_id: &str, dimension: &ConsumerDimension) -> Result<u64> {
        let mut records = self.lock();
        let rec = records
            .entry(credential_id.to_string())
            .or_insert_with(|| UsageRecord::new(credential_id));
        rec.increment(dimension);
        let total = rec.total_count();

        tracing::debug!(
            credential = %credential_id,
            dimension = dimension.kind(),
            key = %dimension.key(),
            total,
            "credential usage incremented"
        );

        self.persistence.save(&records)?;
        Ok(total)
    }

    /// Drop every record at once.
    pub fn clear(&self) -> Result<()> {
        let mut records = self.lock();
        tracing::info!(credentials = records.len(), "clearing credential usage data");
        records.clear();
        self.persistence.save(&records)
    }

    /// Record for `credential_id`, or a zero record if it was never used.
    pub fn get(&self, credential_id: &str) -> UsageRecord {
        self.lock()
            .get(credential_id)
            .cloned()
            .unwrap_or_else(|| UsageRecord::new(credential_id))
    }

    pub fn list_credential_ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
