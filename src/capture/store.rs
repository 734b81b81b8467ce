use log::{debug, info};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::transaction::Transaction;

/// Ordered, capacity-bounded log of captured transactions
///
/// Every operation takes the single store lock, so appends from the capture
/// side never interleave with a filtering or export pass.
pub struct TransactionStore {
    /// Transactions, oldest first
    entries: Mutex<VecDeque<Transaction>>,

    /// Maximum number of transactions held at once
    capacity: usize,

    /// Transactions appended since creation
    recorded: AtomicU64,

    /// Transactions dropped to respect the capacity
    evicted: AtomicU64,

    /// Transactions removed by deletion or deduplication
    removed: AtomicU64,
}

impl TransactionStore {
    /// Create an empty store holding at most `capacity` transactions
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            recorded: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            removed: AtomicU64::new(0),
        }
    }

    /// Append a transaction, evicting the oldest one when full.
    /// Returns the position of the new transaction.
    pub fn append(&self, mut transaction: Transaction) -> usize {
        let mut entries = self.entries.lock();

        let mut evicted = 0;
        while entries.len() >= self.capacity {
            entries.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            Self::renumber(&mut entries);
            self.evicted.fetch_add(evicted, Ordering::SeqCst);
            debug!("Evicted {} oldest transaction(s) to stay within {}", evicted, self.capacity);
        }

        transaction.sequence_number = entries.len() as u64 + 1;
        entries.push_back(transaction);
        self.recorded.fetch_add(1, Ordering::SeqCst);

        entries.len() - 1
    }

    /// Remove every transaction. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        info!("Cleared {} transaction(s)", count);
        count
    }

    /// Remove the transactions at the given store positions.
    ///
    /// Positions that are out of range (a selection made before the log
    /// changed, for instance) are skipped. Returns how many were removed.
    pub fn delete_at(&self, indices: &[usize]) -> usize {
        let mut entries = self.entries.lock();

        let mut targets: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&index| index < entries.len())
            .collect();
        targets.sort_unstable_by(|a, b| b.cmp(a));
        targets.dedup();

        if targets.len() < indices.len() {
            debug!("Ignoring {} stale or duplicate index(es)", indices.len() - targets.len());
        }

        for &index in &targets {
            entries.remove(index);
        }

        if !targets.is_empty() {
            Self::renumber(&mut entries);
            self.removed.fetch_add(targets.len() as u64, Ordering::SeqCst);
            info!("Deleted {} transaction(s)", targets.len());
        }

        targets.len()
    }

    /// Collapse transactions sharing method, URL, request body, status and
    /// response body, keeping the most recent of each group.
    /// Returns how many were removed.
    pub fn deduplicate(&self) -> usize {
        let mut entries = self.entries.lock();

        let keep: Vec<bool> = {
            let mut seen = HashSet::new();
            let mut keep = vec![false; entries.len()];
            for (index, transaction) in entries.iter().enumerate().rev() {
                keep[index] = seen.insert(transaction.signature());
            }
            keep
        };

        let before = entries.len();
        let mut position = 0;
        entries.retain(|_| {
            let kept = keep[position];
            position += 1;
            kept
        });
        let removed = before - entries.len();

        if removed > 0 {
            Self::renumber(&mut entries);
            self.removed.fetch_add(removed as u64, Ordering::SeqCst);
        }
        info!("Removed {} duplicate(s)", removed);

        removed
    }

    /// Number of transactions currently held
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Copy of the transaction at a store position
    pub fn get(&self, index: usize) -> Option<Transaction> {
        self.entries.lock().get(index).cloned()
    }

    /// Copies of the transactions at the given positions, in the order given.
    /// Out-of-range positions are skipped.
    pub fn select(&self, indices: &[usize]) -> Vec<Transaction> {
        let entries = self.entries.lock();
        indices
            .iter()
            .filter_map(|&index| entries.get(index).cloned())
            .collect()
    }

    /// Copy of every transaction in store order
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Run a read pass over the transactions while holding the store lock
    pub fn with_entries<R>(&self, f: impl FnOnce(&VecDeque<Transaction>) -> R) -> R {
        let entries = self.entries.lock();
        f(&entries)
    }

    /// Transactions appended since creation
    pub fn total_recorded(&self) -> u64 {
        self.recorded.load(Ordering::SeqCst)
    }

    /// Transactions evicted since creation
    pub fn total_evicted(&self) -> u64 {
        self.evicted.load(Ordering::SeqCst)
    }

    /// Transactions deleted or deduplicated since creation
    pub fn total_removed(&self) -> u64 {
        self.removed.load(Ordering::SeqCst)
    }

    fn renumber(entries: &mut VecDeque<Transaction>) {
        for (index, transaction) in entries.iter_mut().enumerate() {
            transaction.sequence_number = index as u64 + 1;
        }
    }
}
