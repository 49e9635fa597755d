//! Background lazy-free worker
//!
//! Removals too large to do inline are handed to a dedicated thread over a
//! channel. The pressure controller polls `pending_jobs` under the
//! no-eviction policy: as long as frees are in flight, memory may still
//! come back without evicting anything.

use crate::store::{NamespaceId, PrimaryStore};
use crossbeam::channel::{self, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::debug;

enum Job {
    Remove { ns: NamespaceId, key: String },
    Shutdown,
}

/// Handle to the background free thread.
pub struct LazyFreeWorker {
    tx: Sender<Job>,
    pending: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

impl LazyFreeWorker {
    /// Spawn the worker against a primary store.
    pub fn spawn(primary: Arc<dyn PrimaryStore>) -> Self {
        let (tx, rx) = channel::unbounded::<Job>();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker_pending = Arc::clone(&pending);

        let handle = std::thread::Builder::new()
            .name("tierdb-lazyfree".to_string())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    match job {
                        Job::Remove { ns, key } => {
                            primary.remove(ns, &key);
                            worker_pending.fetch_sub(1, Ordering::AcqRel);
                            debug!(ns, key = %key, "lazy-freed record");
                        }
                        Job::Shutdown => break,
                    }
                }
            })
            .ok();

        Self {
            tx,
            pending,
            handle,
        }
    }

    /// Queue a record for background removal.
    pub fn submit_remove(&self, ns: NamespaceId, key: String) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(Job::Remove { ns, key }).is_err() {
            // Worker gone; the record stays until a foreground removal.
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Removals submitted but not yet applied.
    pub fn pending_jobs(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

impl Drop for LazyFreeWorker {
    fn drop(&mut self) {
        let _ = self.tx.send(Job::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::LruClock;
    use crate::store::MemoryStore;
    use std::time::{Duration, Instant};

    fn wait_until(deadline_ms: u64, mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_millis(deadline_ms);
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        check()
    }

    #[test]
    fn test_background_removal() {
        let store = Arc::new(MemoryStore::with_seed(1));
        let clock = LruClock::new(100);
        store.insert(0, "key", vec![0u8; 32], &clock);

        let worker = LazyFreeWorker::spawn(Arc::clone(&store) as Arc<dyn PrimaryStore>);
        worker.submit_remove(0, "key".to_string());

        assert!(wait_until(2_000, || !store.contains(0, "key")));
        assert!(wait_until(2_000, || worker.pending_jobs() == 0));
    }

    #[test]
    fn test_drop_joins_worker() {
        let store = Arc::new(MemoryStore::with_seed(1));
        let clock = LruClock::new(100);
        for i in 0..10 {
            store.insert(0, &format!("k{}", i), vec![0u8; 8], &clock);
        }

        let worker = LazyFreeWorker::spawn(Arc::clone(&store) as Arc<dyn PrimaryStore>);
        for i in 0..10 {
            worker.submit_remove(0, format!("k{}", i));
        }
        drop(worker);
        // Jobs queued before the shutdown marker are processed before the
        // worker exits.
        assert_eq!(store.len(0), 0);
    }
}
