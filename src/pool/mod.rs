//! Lock-free work-stealing thread pool
//!
//! Parse jobs are scheduled onto a fixed upper bound of lazily spawned OS
//! threads. Every piece of shared mutable state is a single atomic word:
//!
//! - the packed `Sync` coordination word (idle count, spawned count,
//!   notified flag, pool state), updated only by CAS;
//! - the futex-backed idle and join events;
//! - the global injector queue and the registration LIFO head.
//!
//! Each worker owns a 256-slot ring buffer plus an overflow injector; peers
//! only touch those through atomic steal/consume protocols.
//!
//! # Architecture
//!
//! ```text
//!  schedule() ──────► Global Injector ─────┐
//!  (non-worker)                            │ consume
//!                                          ▼
//!     ┌───────────────┬───────────────┬───────────────┐
//!     │   Worker 0    │   Worker 1    │   Worker N    │
//!     │ ring (256)    │ ring (256)    │ ring (256)    │
//!     │ overflow queue│ overflow queue│ overflow queue│◄── steal/consume
//!     └───────┬───────┴───────┬───────┴───────┬───────┘     from peers
//!             └───────── Sync word + idle event ────────┘
//! ```
//!
//! Shutdown is pool-wide and best effort: tasks already popped run to
//! completion, queued tasks may never run. Teardown is an ordered cascade
//! through each worker's join event so no exiting thread reads another's
//! freed record.

mod idle;
mod queue;
mod task;

pub use task::{Batch, RunFn, Task};

use idle::IdleEvent;
use queue::{Buffer, Injector, Stole};
use std::cell::Cell;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::warn;

/// Pool construction parameters
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Upper bound on worker threads; clamped to the 14-bit spawned counter
    pub max_threads: usize,

    /// Worker stack size in bytes (OS default if `None`)
    pub stack_size: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_threads: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            stack_size: None,
        }
    }
}

// --- packed coordination word ----------------------------------------------

const COUNT_BITS: u32 = 14;
const COUNT_MASK: u32 = (1 << COUNT_BITS) - 1;
const SPAWNED_SHIFT: u32 = COUNT_BITS;
const NOTIFIED_BIT: u32 = 1 << (2 * COUNT_BITS);
const STATE_SHIFT: u32 = 2 * COUNT_BITS + 1;

/// One `spawned` unit, for single-field fetch_sub on the packed word
const ONE_SPAWNED: u32 = 1 << SPAWNED_SHIFT;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum State {
    Pending = 0,
    Signaled = 1,
    Waking = 2,
    Shutdown = 3,
}

impl From<u32> for State {
    fn from(value: u32) -> Self {
        match value & 0b11 {
            0 => Self::Pending,
            1 => Self::Signaled,
            2 => Self::Waking,
            _ => Self::Shutdown,
        }
    }
}

/// Decoded view of the 32-bit coordination word.
///
/// `idle <= spawned <= max_threads` holds at every CAS; `state == Waking`
/// means exactly one worker holds the waking token. Splitting these fields
/// into separate atomics would break the CAS-consistency the wake and
/// shutdown paths rely on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Sync {
    idle: u32,
    spawned: u32,
    notified: bool,
    state: State,
}

impl From<u32> for Sync {
    fn from(value: u32) -> Self {
        Self {
            idle: value & COUNT_MASK,
            spawned: (value >> SPAWNED_SHIFT) & COUNT_MASK,
            notified: value & NOTIFIED_BIT != 0,
            state: State::from(value >> STATE_SHIFT),
        }
    }
}

impl From<Sync> for u32 {
    fn from(sync: Sync) -> u32 {
        debug_assert!(sync.idle <= COUNT_MASK);
        debug_assert!(sync.spawned <= COUNT_MASK);
        sync.idle
            | (sync.spawned << SPAWNED_SHIFT)
            | (if sync.notified { NOTIFIED_BIT } else { 0 })
            | ((sync.state as u32) << STATE_SHIFT)
    }
}

// --- worker record ----------------------------------------------------------

/// Per-worker record, owned by the worker's stack for its whole life.
///
/// Registered into the pool's lock-free LIFO; peers reach the ring buffer and
/// overflow queue through that list.
struct Worker {
    run_buffer: Buffer,
    run_queue: Injector,
    join_event: IdleEvent,
    next: AtomicPtr<Worker>,
    /// Rotating steal victim; only the owning worker touches it.
    target: AtomicPtr<Worker>,
}

impl Worker {
    fn new() -> Self {
        Self {
            run_buffer: Buffer::new(),
            run_queue: Injector::new(),
            join_event: IdleEvent::new(),
            next: AtomicPtr::new(ptr::null_mut()),
            target: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Find the next task: local ring, local overflow, global queue, then a
    /// bounded round of steal attempts over the registered peers.
    fn pop(&self, inner: &Inner) -> Option<Stole> {
        if let Some(task) = self.run_buffer.pop() {
            return Some(Stole {
                task,
                pushed: false,
            });
        }

        unsafe {
            if let Some(stole) = self.run_buffer.consume(&self.run_queue) {
                return Some(stole);
            }
            if let Some(stole) = self.run_buffer.consume(&inner.run_queue) {
                return Some(stole);
            }

            let mut attempts = Sync::from(inner.sync.load(Ordering::Relaxed)).spawned;
            while attempts > 0 {
                let target = match self.target.load(Ordering::Relaxed) {
                    t if !t.is_null() => t,
                    _ => inner.workers.load(Ordering::Acquire),
                };
                let target = match target.as_ref() {
                    Some(t) => t,
                    None => break,
                };
                self.target
                    .store(target.next.load(Ordering::Acquire), Ordering::Relaxed);

                if let Some(stole) = self.run_buffer.consume(&target.run_queue) {
                    return Some(stole);
                }
                if !ptr::eq(target, self) {
                    if let Some(stole) = self.run_buffer.steal_from(&target.run_buffer) {
                        return Some(stole);
                    }
                }
                attempts -= 1;
            }
        }

        None
    }
}

thread_local! {
    /// (pool, worker) identity of the current thread, for submission routing.
    static CURRENT_WORKER: Cell<(*const Inner, *const Worker)> =
        const { Cell::new((ptr::null(), ptr::null())) };
}

// --- the pool ---------------------------------------------------------------

/// Work-stealing thread pool executing intrusive [`Task`]s.
///
/// A cheap cloneable handle; clones schedule into the same pool. Usage
/// contract: build, [`schedule`](Self::schedule) freely from any thread,
/// then [`shutdown`](Self::shutdown) followed by exactly one
/// [`join`](Self::join).
#[derive(Clone)]
pub struct ThreadPool {
    inner: Arc<Inner>,
}

struct Inner {
    sync: AtomicU32,
    idle_event: IdleEvent,
    join_event: IdleEvent,
    run_queue: Injector,
    workers: AtomicPtr<Worker>,
    max_threads: u32,
    stack_size: Option<usize>,
}

impl ThreadPool {
    /// Construct without spawning any workers; threads come up lazily as
    /// work arrives.
    pub fn new(config: PoolConfig) -> Self {
        let max_threads = config.max_threads.clamp(1, COUNT_MASK as usize) as u32;
        Self {
            inner: Arc::new(Inner {
                sync: AtomicU32::new(0),
                idle_event: IdleEvent::new(),
                join_event: IdleEvent::new(),
                run_queue: Injector::new(),
                workers: AtomicPtr::new(ptr::null_mut()),
                max_threads,
                stack_size: config.stack_size,
            }),
        }
    }

    /// Enqueue a batch of tasks. Safe from any thread, including from inside
    /// a running task.
    ///
    /// Worker callers push onto their own ring buffer (overflow migrates to
    /// their overflow queue); everyone else goes through the global queue.
    pub fn schedule(&self, batch: Batch) {
        if batch.is_empty() {
            return;
        }

        let (pool, worker) = CURRENT_WORKER.with(|c| c.get());
        if ptr::eq(pool, Arc::as_ptr(&self.inner)) {
            let worker = unsafe { &*worker };
            if let Some(overflow) = unsafe { worker.run_buffer.push(batch) } {
                worker.run_queue.push(overflow);
            }
        } else {
            self.inner.run_queue.push(batch);
        }

        Inner::notify(&self.inner, false)
    }

    /// Announce termination. Idempotent; queued work may never run.
    pub fn shutdown(&self) {
        self.inner.shutdown()
    }

    /// Block until every worker has exited. Call exactly once, after
    /// [`shutdown`](Self::shutdown).
    pub fn join(&self) {
        self.inner.join()
    }
}

impl Inner {
    /// Post a wake signal: prefer an idle worker, else spawn a new one, else
    /// leave the notification pending for the next waiter.
    fn notify(this: &Arc<Inner>, is_waking: bool) {
        let sync = Sync::from(this.sync.load(Ordering::Relaxed));
        if !is_waking && sync.notified {
            return;
        }
        Self::notify_slow(this, is_waking)
    }

    #[cold]
    fn notify_slow(this: &Arc<Inner>, is_waking: bool) {
        let mut sync = Sync::from(this.sync.load(Ordering::Relaxed));
        while sync.state != State::Shutdown {
            let can_wake = is_waking || sync.state == State::Pending;
            if is_waking {
                debug_assert_eq!(sync.state, State::Waking);
            }

            let mut new_sync = sync;
            new_sync.notified = true;
            if can_wake && sync.idle > 0 {
                new_sync.state = State::Signaled;
            } else if can_wake && sync.spawned < this.max_threads {
                new_sync.state = State::Signaled;
                new_sync.spawned += 1;
            } else if is_waking {
                new_sync.state = State::Pending;
            } else if sync.notified {
                return;
            }

            // Release pairs with the Acquire in wait(): queue pushes
            // happen-before the woken worker's pop.
            match this.sync.compare_exchange_weak(
                sync.into(),
                new_sync.into(),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Err(e) => sync = Sync::from(e),
                Ok(_) => {
                    if can_wake && sync.idle > 0 {
                        return this.idle_event.notify();
                    }
                    if can_wake && sync.spawned < this.max_threads {
                        return Self::spawn_worker(this);
                    }
                    return;
                }
            }
        }
    }

    fn spawn_worker(this: &Arc<Inner>) {
        let inner = Arc::clone(this);
        let mut builder = thread::Builder::new().name("pyscout-worker".into());
        if let Some(stack_size) = this.stack_size {
            builder = builder.stack_size(stack_size);
        }

        // Teardown goes through the join-event cascade, not JoinHandle.
        if let Err(err) = builder.spawn(move || worker_main(inner)) {
            warn!("worker spawn failed, continuing with fewer threads: {}", err);
            this.unregister(None);
        }
    }

    fn shutdown(&self) {
        let mut sync = Sync::from(self.sync.load(Ordering::Relaxed));
        while sync.state != State::Shutdown {
            let mut new_sync = sync;
            new_sync.notified = true;
            new_sync.state = State::Shutdown;
            new_sync.idle = 0;

            match self.sync.compare_exchange_weak(
                sync.into(),
                new_sync.into(),
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Err(e) => sync = Sync::from(e),
                Ok(_) => {
                    if sync.idle > 0 {
                        self.idle_event.shutdown();
                    }
                    return;
                }
            }
        }
    }

    fn join(&self) {
        let sync = Sync::from(self.sync.load(Ordering::Relaxed));
        if sync.spawned > 0 {
            self.join_event.wait();
        }

        // Kick the teardown cascade: each worker forwards the signal to the
        // next registered record before exiting.
        let head = self.workers.load(Ordering::Acquire);
        if let Some(head) = unsafe { head.as_ref() } {
            head.join_event.notify();
        }
    }

    /// Park until there is a reason to run. Returns the new waking flag, or
    /// `None` on shutdown.
    fn wait(&self, mut is_waking: bool) -> Option<bool> {
        let mut is_idle = false;
        let mut sync = Sync::from(self.sync.load(Ordering::Relaxed));

        loop {
            if sync.state == State::Shutdown {
                return None;
            }
            if is_waking {
                debug_assert_eq!(sync.state, State::Waking);
            }

            if sync.notified {
                let mut new_sync = sync;
                new_sync.notified = false;
                if is_idle {
                    new_sync.idle -= 1;
                }
                if sync.state == State::Signaled {
                    new_sync.state = State::Waking;
                }

                match self.sync.compare_exchange_weak(
                    sync.into(),
                    new_sync.into(),
                    Ordering::Acquire,
                    Ordering::Relaxed,
                ) {
                    Err(e) => sync = Sync::from(e),
                    Ok(_) => return Some(is_waking || sync.state == State::Signaled),
                }
            } else if !is_idle {
                let mut new_sync = sync;
                new_sync.idle += 1;
                if is_waking {
                    new_sync.state = State::Pending;
                }

                match self.sync.compare_exchange_weak(
                    sync.into(),
                    new_sync.into(),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Err(e) => sync = Sync::from(e),
                    Ok(_) => {
                        is_waking = false;
                        is_idle = true;
                    }
                }
            } else {
                self.idle_event.wait();
                sync = Sync::from(self.sync.load(Ordering::Relaxed));
            }
        }
    }

    fn register(&self, worker: &Worker) {
        let mut head = self.workers.load(Ordering::Relaxed);
        loop {
            worker.next.store(head, Ordering::Relaxed);
            match self.workers.compare_exchange_weak(
                head,
                worker as *const Worker as *mut Worker,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(e) => head = e,
            }
        }
    }

    /// Drop one `spawned` unit; the last worker out under shutdown releases
    /// the join event. A registered worker then parks on its own join event
    /// and forwards the signal down the LIFO, so records tear down one at a
    /// time.
    fn unregister(&self, worker: Option<&Worker>) {
        let sync = Sync::from(self.sync.fetch_sub(ONE_SPAWNED, Ordering::Release));
        debug_assert!(sync.spawned > 0);
        if sync.state == State::Shutdown && sync.spawned == 1 {
            self.join_event.notify();
        }

        let worker = match worker {
            Some(worker) => worker,
            None => return,
        };
        worker.join_event.wait();

        let next = worker.next.load(Ordering::Acquire);
        if let Some(next) = unsafe { next.as_ref() } {
            next.join_event.notify();
        }
    }
}

/// Worker thread body: register, then alternate between waiting and draining.
fn worker_main(inner: Arc<Inner>) {
    let worker = Worker::new();
    inner.register(&worker);
    CURRENT_WORKER.with(|c| c.set((Arc::as_ptr(&inner), &worker as *const Worker)));

    let mut is_waking = false;
    while let Some(waking) = inner.wait(is_waking) {
        is_waking = waking;

        while let Some(stole) = worker.pop(&inner) {
            // Hand the waking token (or fresh local work) to a sibling
            // exactly once before getting busy.
            if stole.pushed || is_waking {
                Inner::notify(&inner, is_waking);
                is_waking = false;
            }
            unsafe { Task::execute(stole.task) };
        }
    }

    CURRENT_WORKER.with(|c| c.set((ptr::null(), ptr::null())));
    inner.unregister(Some(&worker));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr::NonNull;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    #[test]
    fn test_sync_word_round_trip() {
        let sync = Sync {
            idle: 3,
            spawned: 9,
            notified: true,
            state: State::Waking,
        };
        let word: u32 = sync.into();
        assert_eq!(Sync::from(word), sync);

        let max = Sync {
            idle: COUNT_MASK,
            spawned: COUNT_MASK,
            notified: false,
            state: State::Shutdown,
        };
        let word: u32 = max.into();
        assert_eq!(Sync::from(word), max);
    }

    #[test]
    fn test_sync_word_field_isolation() {
        let word: u32 = Sync {
            idle: 0,
            spawned: 5,
            notified: false,
            state: State::Pending,
        }
        .into();
        let after = Sync::from(word - ONE_SPAWNED);
        assert_eq!(after.spawned, 4);
        assert_eq!(after.idle, 0);
        assert!(!after.notified);
        assert_eq!(after.state, State::Pending);
    }

    // --- end-to-end counting -------------------------------------------

    struct CounterJob {
        task: Task,
        counter: Arc<AtomicUsize>,
    }

    impl CounterJob {
        unsafe fn run(context: *mut ()) {
            let job = Box::from_raw(context as *mut CounterJob);
            job.counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn counter_batch(counter: &Arc<AtomicUsize>, n: usize) -> Batch {
        let mut batch = Batch::new();
        for _ in 0..n {
            let mut job = Box::new(CounterJob {
                task: Task::new(CounterJob::run, ptr::null_mut()),
                counter: Arc::clone(counter),
            });
            let context = &mut *job as *mut CounterJob as *mut ();
            job.task = Task::new(CounterJob::run, context);
            let task = NonNull::from(&Box::leak(job).task);
            unsafe { batch.push(task) };
        }
        batch
    }

    fn wait_for(counter: &AtomicUsize, expected: usize) {
        let deadline = Instant::now() + Duration::from_secs(60);
        while counter.load(Ordering::Relaxed) != expected {
            assert!(
                Instant::now() < deadline,
                "timed out at {} of {}",
                counter.load(Ordering::Relaxed),
                expected
            );
            thread::yield_now();
        }
    }

    #[test]
    fn test_every_task_runs_exactly_once() {
        let pool = ThreadPool::new(PoolConfig {
            max_threads: 32,
            stack_size: None,
        });
        let counter = Arc::new(AtomicUsize::new(0));

        pool.schedule(counter_batch(&counter, 1000));
        wait_for(&counter, 1000);

        pool.shutdown();
        pool.join();
        assert_eq!(counter.load(Ordering::Relaxed), 1000);
        assert_eq!(
            Sync::from(pool.inner.sync.load(Ordering::Relaxed)).spawned,
            0
        );
    }

    #[test]
    fn test_single_worker_still_drains() {
        let pool = ThreadPool::new(PoolConfig {
            max_threads: 1,
            stack_size: None,
        });
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            pool.schedule(counter_batch(&counter, 50));
        }
        wait_for(&counter, 500);

        pool.shutdown();
        pool.join();
    }

    // Root job that floods the pool from inside a worker, forcing ring
    // overflow migration on the worker-local submission path.
    struct FloodJob {
        task: Task,
        pool: ThreadPool,
        counter: Arc<AtomicUsize>,
        total: usize,
    }

    impl FloodJob {
        unsafe fn run(context: *mut ()) {
            let job = Box::from_raw(context as *mut FloodJob);
            let mut remaining = job.total;
            while remaining > 0 {
                let chunk = remaining.min(1000);
                job.pool.schedule(counter_batch(&job.counter, chunk));
                remaining -= chunk;
            }
            job.counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_worker_side_overflow_loses_nothing() {
        const TOTAL: usize = 100_000;

        let pool = ThreadPool::new(PoolConfig {
            max_threads: 8,
            stack_size: None,
        });
        let counter = Arc::new(AtomicUsize::new(0));

        let mut root = Box::new(FloodJob {
            task: Task::new(FloodJob::run, ptr::null_mut()),
            pool: pool.clone(),
            counter: Arc::clone(&counter),
            total: TOTAL,
        });
        let context = &mut *root as *mut FloodJob as *mut ();
        root.task = Task::new(FloodJob::run, context);
        let task = NonNull::from(&Box::leak(root).task);

        pool.schedule(Batch::from(task));
        wait_for(&counter, TOTAL + 1);

        pool.shutdown();
        pool.join();
        assert_eq!(counter.load(Ordering::Relaxed), TOTAL + 1);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let pool = ThreadPool::new(PoolConfig {
            max_threads: 4,
            stack_size: None,
        });
        let counter = Arc::new(AtomicUsize::new(0));
        pool.schedule(counter_batch(&counter, 10));
        wait_for(&counter, 10);

        pool.shutdown();
        pool.shutdown();
        pool.join();
    }

    #[test]
    fn test_join_without_work() {
        let pool = ThreadPool::new(PoolConfig::default());
        pool.shutdown();
        pool.join();
    }
}
