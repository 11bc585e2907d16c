//! Tenant-isolated task queue.
//!
//! At most one batch runs per tenant at a time. Batches submitted while
//! their tenant is busy wait in a per-tenant FIFO; when a batch finishes,
//! the worker drains waiting tenants round-robin, preferring a tenant other
//! than the one that just ran so a busy tenant cannot starve the rest.

use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;
use tracing::error;

use docforge_core::error::Result;

/// One unit of queue work: a dataset's document batch for a tenant.
#[derive(Debug, Clone)]
pub struct Batch {
    pub tenant_id: String,
    pub dataset_id: String,
    pub document_ids: Vec<String>,
}

/// What happened to a submitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    /// The calling thread ran this batch, plus any it drained afterwards.
    Ran { batches: usize },
    /// The tenant already had a running batch; this one waits its turn.
    Enqueued,
}

#[derive(Default)]
struct State {
    running: HashSet<String>,
    waiting: HashMap<String, VecDeque<Batch>>,
    rotation: VecDeque<String>,
}

impl State {
    fn enqueue(&mut self, batch: Batch) {
        if !self.rotation.contains(&batch.tenant_id) {
            self.rotation.push_back(batch.tenant_id.clone());
        }
        self.waiting
            .entry(batch.tenant_id.clone())
            .or_default()
            .push_back(batch);
    }

    /// Pick the next waiting batch round-robin across tenants, preferring a
    /// tenant other than `just_finished`. FIFO within each tenant.
    fn take_next(&mut self, just_finished: &str) -> Option<Batch> {
        for allow_same in [false, true] {
            for _ in 0..self.rotation.len() {
                let tenant = self.rotation.pop_front()?;
                if self.running.contains(&tenant) || (!allow_same && tenant == just_finished) {
                    self.rotation.push_back(tenant);
                    continue;
                }
                match self.waiting.get_mut(&tenant).and_then(VecDeque::pop_front) {
                    Some(batch) => {
                        let drained =
                            self.waiting.get(&tenant).map_or(true, VecDeque::is_empty);
                        if drained {
                            self.waiting.remove(&tenant);
                        } else {
                            self.rotation.push_back(tenant);
                        }
                        return Some(batch);
                    }
                    None => {
                        self.waiting.remove(&tenant);
                    }
                }
            }
        }
        None
    }
}

#[derive(Default)]
pub struct TenantTaskQueue {
    state: Mutex<State>,
}

impl TenantTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a batch. If the tenant is idle, the calling thread runs it
    /// immediately and then keeps draining waiting batches until none
    /// remain; otherwise the batch is parked behind the running one.
    ///
    /// A worker error fails its own batch only; draining continues.
    pub fn run_with_tenant_queue(
        &self,
        batch: Batch,
        worker: impl Fn(&Batch) -> Result<()>,
    ) -> QueueOutcome {
        let mut current = {
            let mut state = self.state.lock();
            if state.running.contains(&batch.tenant_id) {
                state.enqueue(batch);
                return QueueOutcome::Enqueued;
            }
            state.running.insert(batch.tenant_id.clone());
            batch
        };

        let mut batches = 0usize;
        loop {
            if let Err(err) = worker(&current) {
                error!(tenant_id = %current.tenant_id, %err, "indexing batch failed");
            }
            batches += 1;

            let mut state = self.state.lock();
            state.running.remove(&current.tenant_id);
            match state.take_next(&current.tenant_id) {
                Some(next) => {
                    state.running.insert(next.tenant_id.clone());
                    drop(state);
                    current = next;
                }
                None => break,
            }
        }
        QueueOutcome::Ran { batches }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    fn batch(tenant: &str, dataset: &str) -> Batch {
        Batch {
            tenant_id: tenant.to_string(),
            dataset_id: dataset.to_string(),
            document_ids: vec!["doc-1".to_string()],
        }
    }

    #[test]
    fn test_idle_tenant_runs_inline() {
        let queue = TenantTaskQueue::new();
        let ran = Mutex::new(Vec::new());
        let outcome = queue.run_with_tenant_queue(batch("a", "ds-1"), |b| {
            ran.lock().push(b.dataset_id.clone());
            Ok(())
        });
        assert_eq!(outcome, QueueOutcome::Ran { batches: 1 });
        assert_eq!(*ran.lock(), vec!["ds-1"]);
    }

    #[test]
    fn test_busy_tenant_batches_wait_and_drain_in_order() {
        let queue = Arc::new(TenantTaskQueue::new());
        let ran = Arc::new(Mutex::new(Vec::new()));

        let inner = Arc::clone(&queue);
        let outcome = queue.run_with_tenant_queue(batch("a", "ds-1"), {
            let ran = Arc::clone(&ran);
            move |b| {
                if b.dataset_id == "ds-1" {
                    // Submitted while this batch is running, so they queue.
                    assert_eq!(
                        inner.run_with_tenant_queue(batch("a", "ds-2"), |_| Ok(())),
                        QueueOutcome::Enqueued
                    );
                    assert_eq!(
                        inner.run_with_tenant_queue(batch("a", "ds-3"), |_| Ok(())),
                        QueueOutcome::Enqueued
                    );
                }
                ran.lock().push(b.dataset_id.clone());
                Ok(())
            }
        });
        assert_eq!(outcome, QueueOutcome::Ran { batches: 3 });
        assert_eq!(*ran.lock(), vec!["ds-1", "ds-2", "ds-3"]);
    }

    #[test]
    fn test_worker_error_does_not_stop_draining() {
        let queue = Arc::new(TenantTaskQueue::new());
        let ran = Arc::new(Mutex::new(Vec::new()));

        let inner = Arc::clone(&queue);
        let outcome = queue.run_with_tenant_queue(batch("a", "ds-1"), {
            let ran = Arc::clone(&ran);
            move |b| {
                if b.dataset_id == "ds-1" {
                    inner.run_with_tenant_queue(batch("a", "ds-2"), |_| Ok(()));
                }
                ran.lock().push(b.dataset_id.clone());
                Err(docforge_core::error::Error::Store("down".into()))
            }
        });
        assert_eq!(outcome, QueueOutcome::Ran { batches: 2 });
        assert_eq!(*ran.lock(), vec!["ds-1", "ds-2"]);
    }

    #[test]
    fn test_round_robin_prefers_other_tenants() {
        let mut state = State::default();
        state.enqueue(batch("a", "a-1"));
        state.enqueue(batch("a", "a-2"));
        state.enqueue(batch("b", "b-1"));
        state.enqueue(batch("c", "c-1"));

        // A tenant just finished "a", so the other tenants go first.
        let order: Vec<String> = std::iter::from_fn(|| {
            state.take_next("a").map(|b| b.dataset_id)
        })
        .collect();
        assert_eq!(order, vec!["b-1", "c-1", "a-1", "a-2"]);
    }

    #[test]
    fn test_running_tenant_is_skipped() {
        let mut state = State::default();
        state.running.insert("a".to_string());
        state.enqueue(batch("a", "a-1"));
        state.enqueue(batch("b", "b-1"));

        assert_eq!(state.take_next("x").unwrap().dataset_id, "b-1");
        // Only "a" remains and it is running elsewhere.
        assert!(state.take_next("x").is_none());
        // Its batch stays parked for the running worker to drain.
        state.running.remove("a");
        assert_eq!(state.take_next("x").unwrap().dataset_id, "a-1");
    }

    #[test]
    fn test_single_flight_per_tenant_under_contention() {
        let queue = Arc::new(TenantTaskQueue::new());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let executed = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let queue = Arc::clone(&queue);
                let in_flight = Arc::clone(&in_flight);
                let max_in_flight = Arc::clone(&max_in_flight);
                let executed = Arc::clone(&executed);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    queue.run_with_tenant_queue(batch("a", &format!("ds-{i}")), |_| {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_in_flight.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(2));
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        executed.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    });
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(executed.load(Ordering::SeqCst), 8);
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }
}
