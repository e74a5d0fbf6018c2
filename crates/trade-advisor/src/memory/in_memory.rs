//! In-process decision store for tests and offline runs

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use parking_lot::Mutex;

use super::DecisionStore;
use crate::error::{AdvisorError, Result};
use crate::model::{Decision, DecisionRecord};

#[derive(Default)]
pub struct MemoryDecisionStore {
    records: Mutex<Vec<DecisionRecord>>,
    fail_writes: AtomicBool,
}

impl MemoryDecisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose writes always fail
    pub fn failing_writes() -> Self {
        let store = Self::new();
        store.fail_writes.store(true, Ordering::SeqCst);
        store
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Every record in insertion order
    pub fn snapshot(&self) -> Vec<DecisionRecord> {
        self.records.lock().clone()
    }
}

impl DecisionStore for MemoryDecisionStore {
    fn init(&self) -> Result<()> {
        Ok(())
    }

    fn save_decision(&self, ticker: &str, decision: &Decision) -> Result<DecisionRecord> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AdvisorError::Persistence("store is read-only".into()));
        }

        let mut records = self.records.lock();
        let id = records.last().map_or(1, |r| r.id + 1);
        let record = DecisionRecord {
            id,
            ts_utc: Utc::now(),
            ticker: ticker.to_string(),
            decision: decision.clone(),
        };
        records.push(record.clone());
        Ok(record)
    }

    fn recent_decisions(&self, ticker: &str, limit: usize) -> Result<Vec<DecisionRecord>> {
        Ok(self
            .records
            .lock()
            .iter()
            .rev()
            .filter(|r| r.ticker == ticker)
            .take(limit)
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        "Memory"
    }
}
