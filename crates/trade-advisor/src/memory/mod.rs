//! Decision Memory
//!
//! Append-only log of past decisions, queried by ticker for recency context.

mod in_memory;
mod sqlite;

pub use in_memory::MemoryDecisionStore;
pub use sqlite::SqliteDecisionStore;

use crate::error::Result;
use crate::model::{Decision, DecisionRecord};

/// Durable decision store (Strategy pattern)
///
/// Records are immutable once written; there is no update or delete path.
pub trait DecisionStore: Send + Sync {
    /// Create the backing schema if missing. Repeated calls are a no-op.
    fn init(&self) -> Result<()>;

    /// Append a record with a fresh UTC timestamp and the next sequence id
    fn save_decision(&self, ticker: &str, decision: &Decision) -> Result<DecisionRecord>;

    /// Up to `limit` records for `ticker`, newest first
    fn recent_decisions(&self, ticker: &str, limit: usize) -> Result<Vec<DecisionRecord>>;

    /// Store name for logs
    fn name(&self) -> &str;
}
