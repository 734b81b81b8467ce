use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics for the transaction log
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogStats {
    /// Transactions currently held by the store
    pub total_entries: usize,

    /// Transactions passing the committed filter
    pub visible_entries: usize,

    /// Estimated size of exporting the visible transactions
    pub export_size_bytes: usize,

    /// Human-readable form of `export_size_bytes`
    pub export_size: String,

    /// "Showing All" or the list of active filters
    pub filter_summary: String,

    /// Transactions recorded since startup
    pub total_recorded: u64,

    /// Transactions evicted to respect the capacity bound
    pub evicted: u64,

    /// Transactions removed by deletion or deduplication
    pub removed: u64,

    /// When these statistics were computed
    pub generated_at: Option<DateTime<Utc>>,
}
