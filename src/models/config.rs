use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default capacity of the transaction log
pub const DEFAULT_MAX_ENTRIES: usize = 5000;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Port for the REST API server
    pub port: u16,

    /// Maximum number of transactions kept before the oldest is evicted
    pub max_entries: usize,

    /// Directory that receives export files when no explicit path is given
    pub export_dir: PathBuf,

    /// Host patterns considered in scope
    pub scope: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            max_entries: DEFAULT_MAX_ENTRIES,
            export_dir: PathBuf::from("."),
            scope: Vec::new(),
        }
    }
}
