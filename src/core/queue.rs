//! The central work queue controller.
//!
//! A fixed pool of worker threads pulls eligible units of work under a
//! single coordinating lock that protects the pending set and the index of
//! currently claimed resources. The `run()` call itself happens outside the
//! lock, so long-running tasks never block admission or eligibility
//! evaluation of other units.
//!
//! # Design
//!
//! - **No polling**: Workers block on a Condvar and are notified on
//!   admission and on every completion
//! - **Ascending dispatch**: The pending set is scanned in admission order,
//!   so units sharing a mutually-blocking resource execute strictly in order
//! - **No global FIFO barrier**: A later unit with no blocking relation to
//!   an in-flight chain is dispatched immediately

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::core::identity::{IdentityBinder, Principal};
use crate::core::registry::TaskRegistry;
use crate::core::resource::Resource;
use crate::core::unit::{TaskRef, UnitOfWork};
use crate::core::StoreError;
use crate::infra::persistence::DurableStore;

/// Name prefix of the worker threads, observable via `std::thread::name`.
pub const WORKER_THREAD_PREFIX: &str = "central-work-queue";

/// Snapshot of queue utilization and cumulative execution outcomes.
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    /// Number of worker threads.
    pub worker_count: usize,

    /// Units admitted but not yet started.
    pub pending_units: usize,

    /// Units currently executing.
    pub running_units: usize,

    /// Total units admitted.
    pub admitted_units: u64,

    /// Total units that completed successfully.
    pub completed_units: u64,

    /// Total units that failed or panicked.
    pub failed_units: u64,

    /// Units that were not immediately eligible at admission and had to
    /// wait for a contended resource.
    pub blocked_units: u64,
}

/// Internal counters for queue statistics (thread-safe).
#[derive(Debug, Default)]
struct QueueCounters {
    admitted_units: AtomicU64,
    completed_units: AtomicU64,
    failed_units: AtomicU64,
    blocked_units: AtomicU64,
}

impl QueueCounters {
    /// Get a snapshot of current statistics.
    fn snapshot(&self, worker_count: usize, pending: usize, running: usize) -> QueueStats {
        QueueStats {
            worker_count,
            pending_units: pending,
            running_units: running,
            admitted_units: self.admitted_units.load(Ordering::Relaxed),
            completed_units: self.completed_units.load(Ordering::Relaxed),
            failed_units: self.failed_units.load(Ordering::Relaxed),
            blocked_units: self.blocked_units.load(Ordering::Relaxed),
        }
    }
}

/// Resources held by one currently executing unit.
struct RunningClaims {
    order: u64,
    blocks: Vec<Resource>,
}

/// Shared mutable state: the pending set and the running-resource index.
/// Mutated only under the coordinating lock.
struct QueueState {
    /// Pending units, ascending by order. Orders are assigned under this
    /// lock, so appending keeps the set sorted.
    pending: Vec<UnitOfWork>,
    /// Claims of all currently executing units.
    running: Vec<RunningClaims>,
    /// Monotonic order source; the first admitted unit gets order 1.
    next_order: u64,
    /// Set once by `close()`; workers exit when they observe it.
    closed: bool,
}

impl QueueState {
    /// Index of the first pending unit that may start now.
    ///
    /// A unit is eligible iff none of the resources it waits on (claimed or
    /// wait-only) is blocked by a resource held by a running unit. Scanning
    /// ascending under the lock is what guarantees resource-ordered
    /// execution: the earliest blocked unit is always dispatched first and
    /// its claims make later contenders ineligible.
    fn next_eligible(&self) -> Option<usize> {
        self.pending.iter().position(|unit| {
            unit.waits_on().all(|needed| {
                !self
                    .running
                    .iter()
                    .any(|claims| claims.blocks.iter().any(|held| needed.is_blocked_by(held)))
            })
        })
    }

    /// Whether `unit` would have to wait if admitted now: some resource it
    /// waits on is already claimed by a running unit or by an earlier
    /// pending unit. Evaluated once, at admission.
    fn contends(&self, unit: &UnitOfWork) -> bool {
        unit.waits_on().any(|needed| {
            self.running
                .iter()
                .flat_map(|claims| claims.blocks.iter())
                .chain(self.pending.iter().flat_map(|earlier| earlier.blocks().iter()))
                .any(|held| needed.is_blocked_by(held))
        })
    }
}

struct QueueInner {
    state: Mutex<QueueState>,
    /// Signaled on admission and on every completion.
    work_available: Condvar,
    registry: Arc<dyn TaskRegistry>,
    binder: Arc<dyn IdentityBinder>,
    persistence: DurableStore,
    counters: QueueCounters,
    worker_count: usize,
}

/// The controller: admits units of work, evaluates eligibility against
/// currently claimed resources, dispatches to the worker pool, and persists
/// the pending set across the component lifecycle.
///
/// Construct through
/// [`CentralWorkQueueBuilder`](crate::builders::CentralWorkQueueBuilder).
pub struct CentralWorkQueue {
    inner: Arc<QueueInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl CentralWorkQueue {
    /// Create a queue with a fixed number of workers.
    ///
    /// Before any worker starts, all previously unfinished units are drained
    /// from the durable store and re-admitted in their original relative
    /// order, each with a fresh order number starting at 1.
    ///
    /// # Errors
    ///
    /// Propagates store-wide I/O failures from the durable store; per-entry
    /// problems are absorbed and logged inside the store.
    pub fn new(
        workers: usize,
        registry: Arc<dyn TaskRegistry>,
        binder: Arc<dyn IdentityBinder>,
        persistence: DurableStore,
    ) -> Result<Self, StoreError> {
        let restored = persistence.load_all()?;

        let mut state = QueueState {
            pending: Vec::new(),
            running: Vec::new(),
            next_order: 0,
            closed: false,
        };
        for mut unit in restored {
            state.next_order += 1;
            unit.renumber(state.next_order);
            state.pending.push(unit);
        }
        if !state.pending.is_empty() {
            info!(count = state.pending.len(), "re-admitted persisted units of work");
        }

        let inner = Arc::new(QueueInner {
            state: Mutex::new(state),
            work_available: Condvar::new(),
            registry,
            binder,
            persistence,
            counters: QueueCounters::default(),
            worker_count: workers,
        });

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let inner = Arc::clone(&inner);
            let handle = thread::Builder::new()
                .name(format!("{WORKER_THREAD_PREFIX}-{worker_id}"))
                .spawn(move || worker_loop(worker_id, &inner))
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }
        info!(workers, "central work queue started");

        Ok(Self {
            inner,
            workers: Mutex::new(handles),
        })
    }

    /// Start building a new unit of work.
    #[must_use]
    pub fn append(&self) -> Enqueue<'_> {
        Enqueue {
            queue: self,
            blocks: Vec::new(),
            blocked_by: Vec::new(),
            principal: None,
        }
    }

    /// Number of units currently pending or running.
    #[must_use]
    pub fn len(&self) -> usize {
        let state = self.inner.state.lock();
        state.pending.len() + state.running.len()
    }

    /// Whether no unit is pending or running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of current utilization and cumulative execution outcomes.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let state = self.inner.state.lock();
        self.inner.counters.snapshot(
            self.inner.worker_count,
            state.pending.len(),
            state.running.len(),
        )
    }

    /// Stop dispatching, persist every not-yet-started unit, and release the
    /// worker pool. Units already running are allowed to finish; they are
    /// not persisted. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the first store-wide I/O failure encountered while persisting
    /// the pending set; persistence of the remaining units is still
    /// attempted.
    pub fn close(&self) -> Result<(), StoreError> {
        let pending = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            std::mem::take(&mut state.pending)
        };
        self.inner.work_available.notify_all();

        let mut first_failure = None;
        for unit in &pending {
            if let Err(err) = self.inner.persistence.store(unit) {
                error!(order = unit.order(), %err, "failed to persist pending unit");
                first_failure.get_or_insert(err);
            }
        }
        if !pending.is_empty() {
            info!(count = pending.len(), "persisted pending units of work");
        }

        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            if handle.join().is_err() {
                warn!("worker thread panicked during shutdown");
            }
        }
        info!("central work queue closed");

        first_failure.map_or(Ok(()), Err)
    }

    fn admit(
        &self,
        principal: Option<Principal>,
        blocks: Vec<Resource>,
        blocked_by: Vec<Resource>,
        task: TaskRef,
    ) {
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                warn!("unit of work rejected, queue is closed");
                return;
            }
            state.next_order += 1;
            let unit = UnitOfWork::new(state.next_order, principal, blocks, blocked_by, task);
            self.inner
                .counters
                .admitted_units
                .fetch_add(1, Ordering::Relaxed);
            if state.contends(&unit) {
                self.inner
                    .counters
                    .blocked_units
                    .fetch_add(1, Ordering::Relaxed);
            }
            debug!(order = unit.order(), task = ?unit.task(), "unit of work admitted");
            state.pending.push(unit);
        }
        self.inner.work_available.notify_all();
    }
}

impl Drop for CentralWorkQueue {
    fn drop(&mut self) {
        // Best effort: pending units are still persisted, store failures can
        // only be logged at this point.
        if let Err(err) = self.close() {
            error!(%err, "failed to persist pending units while dropping queue");
        }
    }
}

fn worker_loop(worker_id: usize, inner: &QueueInner) {
    debug!(worker_id, "worker started");
    loop {
        let unit = {
            let mut state = inner.state.lock();
            loop {
                if state.closed {
                    debug!(worker_id, "worker exiting");
                    return;
                }
                if let Some(index) = state.next_eligible() {
                    let unit = state.pending.remove(index);
                    state.running.push(RunningClaims {
                        order: unit.order(),
                        blocks: unit.blocks().to_vec(),
                    });
                    break unit;
                }
                inner.work_available.wait(&mut state);
            }
        };

        debug!(worker_id, order = unit.order(), "executing unit of work");
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            unit.run(inner.registry.as_ref(), inner.binder.as_ref())
        }));
        match outcome {
            Ok(Ok(())) => {
                inner.counters.completed_units.fetch_add(1, Ordering::Relaxed);
                debug!(worker_id, order = unit.order(), "unit of work completed");
            }
            Ok(Err(err)) => {
                inner.counters.failed_units.fetch_add(1, Ordering::Relaxed);
                warn!(worker_id, order = unit.order(), %err, "unit of work failed");
            }
            Err(_) => {
                inner.counters.failed_units.fetch_add(1, Ordering::Relaxed);
                error!(worker_id, order = unit.order(), "unit of work panicked");
            }
        }

        {
            let mut state = inner.state.lock();
            state.running.retain(|claims| claims.order != unit.order());
        }
        // Released claims may have made pending units eligible.
        inner.work_available.notify_all();
    }
}

/// Builder for admitting one unit of work.
///
/// Obtained from [`CentralWorkQueue::append`]; terminal operation is
/// [`enqueue`](Enqueue::enqueue).
#[must_use = "a unit of work is only admitted by calling enqueue()"]
pub struct Enqueue<'a> {
    queue: &'a CentralWorkQueue,
    blocks: Vec<Resource>,
    blocked_by: Vec<Resource>,
    principal: Option<Principal>,
}

impl Enqueue<'_> {
    /// Claim `resource` exclusively while this unit runs. Other units whose
    /// resource sets are blocked by it must wait.
    pub fn blocks(mut self, resource: impl Into<Resource>) -> Self {
        self.blocks.push(resource.into());
        self
    }

    /// Wait until no running unit claims a resource blocked by `resource`,
    /// without claiming it: later units that also only read it are not held
    /// back by this one.
    pub fn blocked_by(mut self, resource: impl Into<Resource>) -> Self {
        self.blocked_by.push(resource.into());
        self
    }

    /// Execute this unit under the given identity.
    pub fn run_as(mut self, principal: impl Into<Principal>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// Execute this unit under the well-known internal system identity.
    /// Shorthand for `run_as(Principal::system())`.
    pub fn run_as_system(self) -> Self {
        self.run_as(Principal::system())
    }

    /// Admit the unit of work. Accepts a task instance or a
    /// [`TaskSnapshot`](crate::core::TaskSnapshot) referencing a registered
    /// kind.
    pub fn enqueue(self, task: impl Into<TaskRef>) {
        self.queue
            .admit(self.principal, self.blocks, self.blocked_by, task.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::NoopIdentityBinder;
    use crate::core::registry::FactoryRegistry;
    use crate::core::unit::StoredUnit;
    use crate::infra::store::MemoryBlobStore;
    use crate::infra::BlobStore;

    fn empty_persistence() -> DurableStore {
        DurableStore::new(Arc::new(MemoryBlobStore::new()))
    }

    fn stored_unit(order: u64, kind: &str) -> StoredUnit {
        StoredUnit {
            order,
            principal: None,
            blocks: vec![Resource::new("a")],
            blocked_by: Vec::new(),
            task: crate::core::unit::TaskSnapshot::new(kind, serde_json::Value::Null),
        }
    }

    /// A queue with zero workers never dispatches, which makes the pending
    /// set observable.
    fn parked_queue(persistence: DurableStore) -> CentralWorkQueue {
        CentralWorkQueue::new(
            0,
            Arc::new(FactoryRegistry::new()),
            Arc::new(NoopIdentityBinder),
            persistence,
        )
        .unwrap()
    }

    #[test]
    fn test_orders_are_assigned_from_one() {
        let queue = parked_queue(empty_persistence());
        queue.append().enqueue(|| anyhow::Ok(()));
        queue.append().enqueue(|| anyhow::Ok(()));

        let state = queue.inner.state.lock();
        let orders: Vec<u64> = state.pending.iter().map(UnitOfWork::order).collect();
        assert_eq!(orders, vec![1, 2]);
    }

    #[test]
    fn test_restored_units_are_renumbered_preserving_relative_order() {
        let store = Arc::new(MemoryBlobStore::new());
        let persistence = DurableStore::new(Arc::clone(&store) as Arc<dyn BlobStore>);
        persistence
            .store(&UnitOfWork::from_stored(stored_unit(42, "second")))
            .unwrap();
        persistence
            .store(&UnitOfWork::from_stored(stored_unit(21, "first")))
            .unwrap();

        let queue = parked_queue(DurableStore::new(store));

        let state = queue.inner.state.lock();
        let restored: Vec<(u64, String)> = state
            .pending
            .iter()
            .map(|unit| {
                let snapshot = unit.task().snapshot().unwrap();
                (unit.order(), snapshot.kind)
            })
            .collect();
        assert_eq!(
            restored,
            vec![(1, "first".to_string()), (2, "second".to_string())]
        );
        drop(state);

        // New admissions continue after the restored units.
        queue.append().enqueue(|| anyhow::Ok(()));
        let state = queue.inner.state.lock();
        assert_eq!(state.pending.last().unwrap().order(), 3);
    }

    #[test]
    fn test_eligibility_skips_blocked_units() {
        let queue = parked_queue(empty_persistence());
        queue.append().blocks("x").enqueue(|| anyhow::Ok(()));
        queue.append().blocks("x").enqueue(|| anyhow::Ok(()));
        queue.append().blocks("y").enqueue(|| anyhow::Ok(()));

        let mut state = queue.inner.state.lock();

        // First eligible is the earliest unit.
        let first = state.next_eligible().unwrap();
        assert_eq!(state.pending[first].order(), 1);

        // Simulate dispatching it: the second "x" unit is now blocked, the
        // "y" unit is the next eligible one.
        let unit = state.pending.remove(first);
        state.running.push(RunningClaims {
            order: unit.order(),
            blocks: unit.blocks().to_vec(),
        });
        let next = state.next_eligible().unwrap();
        assert_eq!(state.pending[next].order(), 3);
    }

    #[test]
    fn test_wait_only_units_do_not_block_each_other() {
        let queue = parked_queue(empty_persistence());
        queue.append().blocked_by("x").enqueue(|| anyhow::Ok(()));
        queue.append().blocked_by("x").enqueue(|| anyhow::Ok(()));

        let mut state = queue.inner.state.lock();

        // Dispatch the first wait-only unit; the second must stay eligible
        // because blocked_by claims nothing.
        let first = state.next_eligible().unwrap();
        let unit = state.pending.remove(first);
        state.running.push(RunningClaims {
            order: unit.order(),
            blocks: unit.blocks().to_vec(),
        });
        assert!(state.next_eligible().is_some());
    }

    #[test]
    fn test_blocked_units_are_counted_at_admission() {
        let queue = parked_queue(empty_persistence());
        queue.append().blocks("x").enqueue(|| anyhow::Ok(()));
        queue.append().blocks("x").enqueue(|| anyhow::Ok(()));
        queue.append().blocks("y").enqueue(|| anyhow::Ok(()));

        // Only the second "x" unit contends with an earlier claim.
        let stats = queue.stats();
        assert_eq!(stats.worker_count, 0);
        assert_eq!(stats.admitted_units, 3);
        assert_eq!(stats.blocked_units, 1);
        assert_eq!(stats.pending_units, 3);
        assert_eq!(stats.running_units, 0);
    }

    #[test]
    fn test_enqueue_after_close_is_rejected() {
        let queue = parked_queue(empty_persistence());
        queue.close().unwrap();
        queue.append().enqueue(|| anyhow::Ok(()));
        assert!(queue.is_empty());
    }
}
