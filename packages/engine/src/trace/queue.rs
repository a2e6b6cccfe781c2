// packages/engine/src/trace/queue.rs
//! Multi-producer / single-consumer event queue
//!
//! Producers append under a short-held mutex and wake the consumer. The
//! consumer swaps the whole backlog out in one step, so producers keep
//! appending to a fresh buffer while the previous one is being persisted.
//!
//! The consumer's wait on `backlog non-empty OR shutdown` is the only place
//! the pipeline blocks.

use crate::trace::entry::Entry;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct Backlog {
    entries: Vec<Entry>,
    shutdown: bool,
}

/// Result of one blocking drain
#[derive(Debug)]
pub struct Drained {
    /// Entries in insertion order
    pub entries: Vec<Entry>,

    /// Shutdown had been requested when the backlog was taken
    pub shutdown: bool,
}

/// Event queue shared by producers and the consumer
#[derive(Debug, Default)]
pub struct EventQueue {
    backlog: Mutex<Backlog>,
    wakeup: Condvar,

    /// Entries inserted
    insert_count: AtomicU64,

    /// Entries handed to the consumer
    drain_count: AtomicU64,

    /// Non-empty swaps performed
    drain_cycles: AtomicU64,
}

impl EventQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and wake the consumer.
    ///
    /// Entries inserted after [`shutdown`](Self::shutdown) are accepted but
    /// only persisted if the consumer has not finished its final drain.
    pub fn insert(&self, entry: Entry) {
        self.backlog.lock().entries.push(entry);
        self.insert_count.fetch_add(1, Ordering::Relaxed);
        self.wakeup.notify_one();
    }

    /// Block until there is work or shutdown was requested, then take the
    /// whole backlog.
    pub fn wait_drain(&self) -> Drained {
        let mut backlog = self.backlog.lock();
        while backlog.entries.is_empty() && !backlog.shutdown {
            self.wakeup.wait(&mut backlog);
        }

        let entries = std::mem::take(&mut backlog.entries);
        let shutdown = backlog.shutdown;
        drop(backlog);

        self.account(entries.len());
        Drained { entries, shutdown }
    }

    /// Take the whole backlog without blocking
    pub fn drain_all(&self) -> Vec<Entry> {
        let entries = std::mem::take(&mut self.backlog.lock().entries);
        self.account(entries.len());
        entries
    }

    /// Request termination and wake the consumer
    pub fn shutdown(&self) {
        self.backlog.lock().shutdown = true;
        self.wakeup.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.backlog.lock().shutdown
    }

    /// Entries waiting for the consumer
    pub fn len(&self) -> usize {
        self.backlog.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            insert_count: self.insert_count.load(Ordering::Relaxed),
            drain_count: self.drain_count.load(Ordering::Relaxed),
            drain_cycles: self.drain_cycles.load(Ordering::Relaxed),
            pending: self.len(),
        }
    }

    fn account(&self, drained: usize) {
        if drained > 0 {
            self.drain_count.fetch_add(drained as u64, Ordering::Relaxed);
            self.drain_cycles.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    /// Total entries inserted
    pub insert_count: u64,

    /// Total entries handed to the consumer
    pub drain_count: u64,

    /// Drains that returned at least one entry
    pub drain_cycles: u64,

    /// Entries currently waiting
    pub pending: usize,
}

impl QueueStats {
    /// Average entries per drain cycle
    pub fn avg_batch_size(&self) -> f64 {
        if self.drain_cycles == 0 {
            0.0
        } else {
            self.drain_count as f64 / self.drain_cycles as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn port(id: u64) -> Entry {
        Entry::PortCreated {
            id,
            name: format!("port_{}", id),
        }
    }

    #[test]
    fn test_queue_creation() {
        let queue = EventQueue::new();
        assert!(queue.is_empty());
        assert!(!queue.is_shutdown());
        assert!(queue.drain_all().is_empty());
        assert_eq!(queue.stats().drain_cycles, 0);
    }

    #[test]
    fn test_insert_drain_order() {
        let queue = EventQueue::new();
        for id in 0..5 {
            queue.insert(port(id));
        }
        assert_eq!(queue.len(), 5);

        let drained = queue.drain_all();
        let ids: Vec<u64> = drained.iter().map(Entry::subject_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_stats() {
        let queue = EventQueue::new();
        queue.insert(port(1));
        queue.insert(port(2));
        queue.drain_all();
        queue.insert(port(3));

        let stats = queue.stats();
        assert_eq!(stats.insert_count, 3);
        assert_eq!(stats.drain_count, 2);
        assert_eq!(stats.drain_cycles, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.avg_batch_size(), 2.0);
    }

    #[test]
    fn test_wait_drain_wakes_on_insert() {
        let queue = Arc::new(EventQueue::new());

        let consumer = {
            let q = Arc::clone(&queue);
            thread::spawn(move || q.wait_drain())
        };

        thread::sleep(Duration::from_millis(20));
        queue.insert(port(9));

        let drained = consumer.join().unwrap();
        assert_eq!(drained.entries.len(), 1);
        assert!(!drained.shutdown);
    }

    #[test]
    fn test_wait_drain_wakes_on_shutdown() {
        let queue = Arc::new(EventQueue::new());

        let consumer = {
            let q = Arc::clone(&queue);
            thread::spawn(move || q.wait_drain())
        };

        thread::sleep(Duration::from_millis(20));
        queue.shutdown();

        let drained = consumer.join().unwrap();
        assert!(drained.entries.is_empty());
        assert!(drained.shutdown);
    }

    #[test]
    fn test_shutdown_returns_pending_entries() {
        let queue = EventQueue::new();
        queue.insert(port(1));
        queue.shutdown();

        let drained = queue.wait_drain();
        assert_eq!(drained.entries.len(), 1);
        assert!(drained.shutdown);
    }

    #[test]
    fn test_concurrent_producers() {
        let queue = Arc::new(EventQueue::new());
        let mut handles = vec![];

        // Spawn 8 producer threads
        for t in 0..8u64 {
            let q = Arc::clone(&queue);
            handles.push(thread::spawn(move || {
                for seq in 0..500u64 {
                    q.insert(port(t * 1_000_000 + seq));
                }
            }));
        }

        let mut seen = Vec::new();
        while seen.len() < 4000 {
            seen.extend(queue.wait_drain().entries);
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(seen.len(), 4000);

        // per-thread FIFO
        let mut last = [None::<u64>; 8];
        for entry in &seen {
            let id = entry.subject_id();
            let (t, seq) = ((id / 1_000_000) as usize, id % 1_000_000);
            if let Some(prev) = last[t] {
                assert!(seq > prev, "thread {} reordered", t);
            }
            last[t] = Some(seq);
        }
    }
}
