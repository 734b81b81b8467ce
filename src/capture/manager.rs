use chrono::Utc;
use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::capture::export;
use crate::capture::filter::{CompiledFilter, HostScope, ScopeOracle};
use crate::capture::parser::TransactionParser;
use crate::capture::store::TransactionStore;
use crate::models::config::AppConfig;
use crate::models::filter::FilterConfig;
use crate::models::stats::LogStats;
use crate::models::transaction::{RawExchange, Transaction, TransactionSummary};
use crate::utils::error::{AppError, AppResult};

/// Capacity of the change notification channel
const EVENT_CHANNEL_SIZE: usize = 256;

/// Changes to the log that observers may want to react to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEvent {
    Recorded { index: usize },
    Removed { count: usize },
    Cleared,
    FilterChanged,
}

/// Outcome of a successful export
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub path: PathBuf,
    pub entries: usize,
    pub bytes: usize,
}

/// Owns the transaction log, the committed filter and the scope oracle
pub struct CaptureManager {
    /// Application configuration
    config: AppConfig,

    /// Captured transactions
    store: Arc<TransactionStore>,

    /// Builds transactions from raw exchanges
    parser: TransactionParser,

    /// Committed filter snapshot and its compiled form, replaced together
    filter: RwLock<(Arc<FilterConfig>, Arc<CompiledFilter>)>,

    /// Host-defined scope
    scope: Arc<dyn ScopeOracle>,

    /// Change notifications
    events: broadcast::Sender<LogEvent>,
}

impl CaptureManager {
    /// Create a manager whose scope is the configured host list
    pub fn new(config: AppConfig) -> Self {
        let scope = Arc::new(HostScope::new(&config.scope));
        Self::with_scope(config, scope)
    }

    /// Create a manager with a host-supplied scope oracle
    pub fn with_scope(config: AppConfig, scope: Arc<dyn ScopeOracle>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            store: Arc::new(TransactionStore::new(config.max_entries)),
            config,
            parser: TransactionParser::new(),
            filter: RwLock::new(Self::prepare(FilterConfig::default())),
            scope,
            events,
        }
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: LogEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<TransactionStore> {
        &self.store
    }

    /// Build a transaction from a raw exchange and append it.
    /// Returns its store position.
    pub fn record(&self, exchange: RawExchange) -> usize {
        let transaction = self.parser.parse_exchange(exchange);
        self.append(transaction)
    }

    /// Append an already built transaction. Returns its store position.
    pub fn append(&self, transaction: Transaction) -> usize {
        debug!(
            "Recording {} {} -> {}",
            transaction.method, transaction.url, transaction.status_code
        );
        let index = self.store.append(transaction);
        self.notify(LogEvent::Recorded { index });
        index
    }

    fn prepare(config: FilterConfig) -> (Arc<FilterConfig>, Arc<CompiledFilter>) {
        let compiled = CompiledFilter::new(&config);
        (Arc::new(config), Arc::new(compiled))
    }

    /// The committed filter snapshot
    pub fn filter(&self) -> Arc<FilterConfig> {
        self.filter.read().0.clone()
    }

    /// Replace the committed filter
    pub fn commit_filter(&self, config: FilterConfig) {
        info!("Applying filter ({})", config.summary());
        let prepared = Self::prepare(config);
        *self.filter.write() = prepared;
        self.notify(LogEvent::FilterChanged);
    }

    /// Commit the default filter
    pub fn reset_filter(&self) {
        self.commit_filter(FilterConfig::default());
    }

    fn compiled_filter(&self) -> Arc<CompiledFilter> {
        self.filter.read().1.clone()
    }

    /// Store positions of the visible transactions, in store order
    pub fn visible_indices(&self) -> Vec<usize> {
        let filter = self.compiled_filter();
        self.store.with_entries(|entries| {
            entries
                .iter()
                .enumerate()
                .filter(|(_, t)| filter.matches(t, self.scope.as_ref()))
                .map(|(index, _)| index)
                .collect()
        })
    }

    /// A page of visible transaction summaries and the total visible count
    pub fn visible_summaries(&self, offset: usize, limit: usize) -> (Vec<TransactionSummary>, usize) {
        let filter = self.compiled_filter();
        self.store.with_entries(|entries| {
            let visible: Vec<(usize, &Transaction)> = entries
                .iter()
                .enumerate()
                .filter(|(_, t)| filter.matches(t, self.scope.as_ref()))
                .collect();
            let total = visible.len();
            let page = visible
                .into_iter()
                .skip(offset)
                .take(limit)
                .map(|(index, t)| TransactionSummary::new(index, t))
                .collect();
            (page, total)
        })
    }

    /// Full transaction at a store position with its rendered text
    pub fn detail(&self, index: usize) -> Option<(Transaction, String)> {
        self.store.get(index).map(|t| {
            let text = export::format(&t);
            (t, text)
        })
    }

    /// Remove the transactions at the given store positions
    pub fn delete(&self, indices: &[usize]) -> usize {
        let count = self.store.delete_at(indices);
        if count > 0 {
            self.notify(LogEvent::Removed { count });
        }
        count
    }

    /// Collapse duplicates, keeping the most recent of each
    pub fn deduplicate(&self) -> usize {
        let count = self.store.deduplicate();
        if count > 0 {
            self.notify(LogEvent::Removed { count });
        }
        count
    }

    /// Remove every transaction
    pub fn clear(&self) -> usize {
        let count = self.store.clear();
        self.notify(LogEvent::Cleared);
        count
    }

    /// Export the transactions at the given store positions, in that order
    pub fn export_selected(&self, indices: &[usize], path: Option<PathBuf>) -> AppResult<ExportReport> {
        let transactions = self.store.select(indices);
        if transactions.is_empty() {
            return Err(AppError::InvalidRequest("No entries selected".to_string()));
        }
        if transactions.len() < indices.len() {
            warn!(
                "{} selected index(es) no longer exist and were skipped",
                indices.len() - transactions.len()
            );
        }
        let path = path.unwrap_or_else(|| export::default_export_path(&self.config.export_dir, false));
        self.write(path, &transactions)
    }

    /// Export every visible transaction in store order
    pub fn export_visible(&self, path: Option<PathBuf>) -> AppResult<ExportReport> {
        let filter = self.compiled_filter();
        let transactions: Vec<Transaction> = self.store.with_entries(|entries| {
            entries
                .iter()
                .filter(|t| filter.matches(t, self.scope.as_ref()))
                .cloned()
                .collect()
        });
        if transactions.is_empty() {
            return Err(AppError::InvalidRequest(
                "No filtered entries visible to export".to_string(),
            ));
        }
        let path = path.unwrap_or_else(|| export::default_export_path(&self.config.export_dir, true));
        self.write(path, &transactions)
    }

    /// Writes happen on copies, never while the store is locked
    fn write(&self, path: PathBuf, transactions: &[Transaction]) -> AppResult<ExportReport> {
        let bytes = export::write_export(&path, transactions)?;
        Ok(ExportReport {
            path,
            entries: transactions.len(),
            bytes,
        })
    }

    /// Current statistics, including the export size of the visible set
    pub fn stats(&self) -> LogStats {
        let filter = self.compiled_filter();
        let (total_entries, visible_entries, export_size_bytes) = self.store.with_entries(|entries| {
            let mut visible = 0;
            let mut bytes = 0;
            for t in entries.iter().filter(|t| filter.matches(t, self.scope.as_ref())) {
                visible += 1;
                bytes += export::estimate_size(t);
            }
            (entries.len(), visible, bytes)
        });

        LogStats {
            total_entries,
            visible_entries,
            export_size_bytes,
            export_size: export::format_size(export_size_bytes),
            filter_summary: filter.config().summary(),
            total_recorded: self.store.total_recorded(),
            evicted: self.store.total_evicted(),
            removed: self.store.total_removed(),
            generated_at: Some(Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::store::tests::transaction;
    use crate::models::transaction::RawResponse;

    fn manager() -> CaptureManager {
        let config = AppConfig {
            max_entries: 100,
            ..Default::default()
        };
        CaptureManager::with_scope(config, Arc::new(|url: &str| url.contains("a.com")))
    }

    /// The three-transaction walkthrough: two image requests sharing a body
    /// and a JSON 404 between them.
    fn seeded() -> CaptureManager {
        let manager = manager();
        manager.append(transaction("GET", "http://a.com/x.png", 200, "image", "pixels"));
        manager.append(transaction("GET", "http://a.com/y.json", 404, "JSON", "{}"));
        manager.append(transaction("POST", "http://a.com/x.png", 200, "image", "pixels"));
        manager.commit_filter(FilterConfig {
            hide_extensions: String::new(),
            ..Default::default()
        });
        manager
    }

    #[test]
    fn test_walkthrough() {
        let manager = seeded();
        assert_eq!(manager.visible_indices(), vec![0, 1, 2]);

        manager.commit_filter(FilterConfig {
            hide_extensions: "png".to_string(),
            ..Default::default()
        });
        assert_eq!(manager.visible_indices(), vec![1]);

        manager.commit_filter(FilterConfig {
            hide_extensions: String::new(),
            show_4xx: false,
            ..Default::default()
        });
        assert_eq!(manager.visible_indices(), vec![0, 2]);

        // Deduplication ignores the filter; GET and POST differ by method
        assert_eq!(manager.deduplicate(), 0);

        manager.append(transaction("GET", "http://a.com/x.png", 200, "image", "pixels"));
        assert_eq!(manager.deduplicate(), 1);
        let remaining = manager.store().snapshot();
        let rows: Vec<(u64, &str, &str)> = remaining
            .iter()
            .map(|t| (t.sequence_number, t.method.as_str(), t.url.as_str()))
            .collect();
        assert_eq!(
            rows,
            vec![
                (1, "GET", "http://a.com/y.json"),
                (2, "POST", "http://a.com/x.png"),
                (3, "GET", "http://a.com/x.png"),
            ]
        );
    }

    #[test]
    fn test_record_raw_exchange() {
        let manager = manager();
        let index = manager.record(RawExchange {
            method: "GET".to_string(),
            url: Some("http://a.com/page".to_string()),
            request: b"GET /page HTTP/1.1\r\nHost: a.com\r\n\r\n".to_vec(),
            request_body_offset: None,
            response: Some(RawResponse {
                bytes: b"HTTP/1.1 200 OK\r\n\r\n<html></html>".to_vec(),
                body_offset: None,
                status_code: 200,
                stated_mime_type: Some("HTML".to_string()),
            }),
        });
        assert_eq!(index, 0);
        let (transaction, text) = manager.detail(0).unwrap();
        assert_eq!(transaction.sequence_number, 1);
        assert!(text.starts_with("ENTRY #1 | GET | http://a.com/page"));
        assert!(manager.detail(5).is_none());
    }

    #[test]
    fn test_filter_snapshot_is_replaced_whole() {
        let manager = manager();
        let before = manager.filter();
        let mut staged = (*before).clone();
        staged.search_term = "admin".to_string();
        staged.negative_filter = "logout".to_string();
        assert_eq!(manager.filter().search_term, "");
        manager.commit_filter(staged);
        assert_eq!(before.search_term, "");
        assert_eq!(manager.filter().negative_filter, "logout");
        manager.reset_filter();
        assert_eq!(*manager.filter(), FilterConfig::default());
    }

    #[test]
    fn test_scope_oracle_is_consulted() {
        let manager = manager();
        manager.append(transaction("GET", "http://a.com/in", 200, "HTML", ""));
        manager.append(transaction("GET", "http://b.org/out", 200, "HTML", ""));
        manager.commit_filter(FilterConfig {
            in_scope_only: true,
            ..Default::default()
        });
        assert_eq!(manager.visible_indices(), vec![0]);
    }

    #[test]
    fn test_summaries_are_paged() {
        let manager = seeded();
        let (page, total) = manager.visible_summaries(1, 1);
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].index, 1);
        assert_eq!(page[0].status, 404);
    }

    #[test]
    fn test_stats() {
        let manager = seeded();
        manager.commit_filter(FilterConfig {
            hide_extensions: String::new(),
            body_search: "pixels".to_string(),
            ..Default::default()
        });
        let stats = manager.stats();
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.visible_entries, 2);
        let snapshot = manager.store().snapshot();
        assert_eq!(
            stats.export_size_bytes,
            export::estimate_total([&snapshot[0], &snapshot[2]])
        );
        assert_eq!(stats.filter_summary, "Filtered: Body");
        assert_eq!(stats.total_recorded, 3);
    }

    #[test]
    fn test_export_visible_and_selected() {
        let dir = tempfile::tempdir().unwrap();
        let manager = seeded();

        let report = manager.export_visible(Some(dir.path().join("all.txt"))).unwrap();
        assert_eq!(report.entries, 3);
        let contents = std::fs::read_to_string(&report.path).unwrap();
        assert_eq!(contents.split(&export::batch_separator()).count(), 3);

        let report = manager
            .export_selected(&[2, 0, 99], Some(dir.path().join("some.txt")))
            .unwrap();
        assert_eq!(report.entries, 2);
        let contents = std::fs::read_to_string(&report.path).unwrap();
        assert!(contents.starts_with("ENTRY #3 | POST"));
    }

    #[test]
    fn test_export_errors_leave_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let manager = seeded();

        let missing = dir.path().join("nope").join("out.txt");
        assert!(matches!(manager.export_visible(Some(missing)), Err(AppError::ExportError(_))));
        assert!(matches!(manager.export_selected(&[], None), Err(AppError::InvalidRequest(_))));

        manager.commit_filter(FilterConfig {
            search_term: "nothing-matches".to_string(),
            ..Default::default()
        });
        assert!(matches!(manager.export_visible(None), Err(AppError::InvalidRequest(_))));
        assert_eq!(manager.store().len(), 3);
    }

    #[test]
    fn test_default_export_path_uses_export_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            export_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let manager = CaptureManager::new(config);
        manager.append(transaction("GET", "http://a.com/", 200, "HTML", ""));
        let report = manager.export_selected(&[0], None).unwrap();
        assert!(report.path.starts_with(dir.path()));
        let name = report.path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("export_") && name.ends_with(".txt"));
    }

    #[test]
    fn test_events_are_published() {
        let manager = manager();
        let mut events = manager.subscribe();
        manager.append(transaction("GET", "http://a.com/", 200, "HTML", ""));
        manager.delete(&[7]);
        manager.delete(&[0]);
        manager.reset_filter();
        manager.clear();
        assert_eq!(events.try_recv().unwrap(), LogEvent::Recorded { index: 0 });
        assert_eq!(events.try_recv().unwrap(), LogEvent::Removed { count: 1 });
        assert_eq!(events.try_recv().unwrap(), LogEvent::FilterChanged);
        assert_eq!(events.try_recv().unwrap(), LogEvent::Cleared);
        assert!(events.try_recv().is_err());
    }
}
