use crate::{
    Error, Result,
    tracker::{ActiveWorkers, ExitGuard},
};
use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

/// A unit of work accepted by the pool: run once, returns nothing.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of worker threads consuming jobs from a bounded FIFO
/// queue.
///
/// Workers pull jobs from a shared multi-producer/multi-consumer channel and
/// run each to completion. The queue is bounded: once it is full,
/// [`submit`](Self::submit) blocks the caller until a worker frees a slot.
/// [`stop`](Self::stop) closes the queue irreversibly; workers drain whatever
/// is already enqueued and then exit, which [`wait`](Self::wait) observes.
///
/// ## Features
///
/// - ✅ Thread-safe submission from any number of producers
/// - ✅ FIFO handoff; every job is delivered to exactly one worker
/// - ✅ Graceful drain-on-stop shutdown
/// - ❌ No job results, per-job cancellation, or resizing
///
/// ## Recommended When
///
/// - You want a fixed concurrency ceiling for fire-and-forget work
/// - You want backpressure on producers instead of an unbounded queue
///
/// # Example
///
/// ```
/// use parking_lot::Mutex;
/// use std::sync::Arc;
/// use workpool::WorkerPool;
///
/// const TOTAL_JOBS: usize = 1000;
///
/// let pool = Arc::new(WorkerPool::new(8, 64));
/// let counter = Arc::new(Mutex::new(0));
///
/// pool.start();
/// let submitter = {
///     let pool = Arc::clone(&pool);
///     let counter = Arc::clone(&counter);
///     std::thread::spawn(move || {
///         for _ in 0..TOTAL_JOBS {
///             let counter = Arc::clone(&counter);
///             // Each job mutates shared state, so the job body takes a lock;
///             // the pool itself only guarantees delivery-once semantics.
///             pool.submit(move || *counter.lock() += 1).unwrap();
///         }
///         pool.stop();
///     })
/// };
///
/// pool.wait();
/// submitter.join().unwrap();
/// assert_eq!(*counter.lock(), TOTAL_JOBS);
/// ```
pub struct WorkerPool {
    worker_count: usize,
    queue_capacity: usize,
    /// Producer side of the queue. Taken (and thereby dropped) by `stop`,
    /// which is what closes the channel; the lock is submitter-side only and
    /// is never held across a blocking send.
    sender: Mutex<Option<Sender<Job>>>,
    receiver: Receiver<Job>,
    queue_open: AtomicBool,
    running: AtomicBool,
    active: Arc<ActiveWorkers>,
}

impl WorkerPool {
    /// Creates a pool that will run `worker_count` concurrent workers over a
    /// job queue holding at most `queue_capacity` pending jobs.
    ///
    /// The pool is not running yet; call [`start`](Self::start) to spawn the
    /// workers. A `queue_capacity` of `0` creates a rendezvous queue: every
    /// [`submit`](Self::submit) blocks until a worker is ready to take the
    /// job directly. A `worker_count` of `0` is legal but degenerate: no job
    /// will ever be processed.
    ///
    /// # Example
    ///
    /// ```
    /// use workpool::WorkerPool;
    ///
    /// let pool = WorkerPool::new(5, 50);
    /// assert_eq!(pool.worker_count(), 5);
    /// assert_eq!(pool.queue_capacity(), 50);
    /// assert!(!pool.is_running());
    /// ```
    pub fn new(worker_count: usize, queue_capacity: usize) -> Self {
        let (sender, receiver) = bounded(queue_capacity);
        Self {
            worker_count,
            queue_capacity,
            sender: Mutex::new(Some(sender)),
            receiver,
            queue_open: AtomicBool::new(true),
            running: AtomicBool::new(false),
            active: Arc::new(ActiveWorkers::new()),
        }
    }

    /// Marks the pool running and spawns its workers.
    ///
    /// All workers are registered with the active-worker tracker before any
    /// thread is spawned, so a fast drain can never be observed as "all
    /// done" while spawning is still in progress.
    ///
    /// Not idempotent: a second call spawns a second full set of workers on
    /// the same queue and registers them all with the tracker. Call at most
    /// once per pool.
    pub fn start(&self) {
        self.running.store(true, Ordering::Relaxed);
        self.active.add(self.worker_count);
        for worker_id in 0..self.worker_count {
            let jobs = self.receiver.clone();
            let active = Arc::clone(&self.active);
            thread::spawn(move || worker_loop(worker_id, jobs, active));
        }
    }

    /// Enqueues a job for execution by one of the workers.
    ///
    /// Returns immediately once the job is buffered. If the queue is full,
    /// the call blocks until a worker frees a slot; there is no timeout. The
    /// job runs at most once, on exactly one worker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolClosed`] if [`stop`](Self::stop) has already been
    /// called. The closed-check and the enqueue are not one atomic step: a
    /// `submit` racing a concurrent `stop` may observe either outcome, and a
    /// caller that saw `Ok` for its last pre-stop job is the only ordering
    /// the pool promises.
    ///
    /// # Example
    ///
    /// ```
    /// use workpool::{Error, WorkerPool};
    ///
    /// let pool = WorkerPool::new(1, 4);
    /// pool.start();
    ///
    /// assert!(pool.submit(|| println!("hello from a worker")).is_ok());
    ///
    /// pool.stop();
    /// assert_eq!(pool.submit(|| ()), Err(Error::PoolClosed));
    /// pool.wait();
    /// ```
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.queue_open.load(Ordering::Relaxed) {
            return Err(Error::PoolClosed);
        }
        // Clone the producer handle out of the cell instead of sending under
        // the lock: a send blocked on a full queue must not serialize other
        // submitters, and must not block `stop`.
        let sender = match &*self.sender.lock() {
            Some(sender) => sender.clone(),
            None => return Err(Error::PoolClosed),
        };
        sender.send(Box::new(job)).map_err(|_| Error::PoolClosed)
    }

    /// Closes the job queue, stopping intake of new work.
    ///
    /// Jobs already enqueued are still delivered; each worker finishes its
    /// in-flight job, drains what remains, and exits. Nothing in flight is
    /// interrupted. After this call every [`submit`](Self::submit) fails with
    /// [`Error::PoolClosed`].
    ///
    /// # Panics
    ///
    /// Panics if called a second time on the same pool.
    pub fn stop(&self) {
        let sender = self.sender.lock().take();
        self.queue_open.store(false, Ordering::Relaxed);
        // Dropping the last producer handle is what closes the queue; the
        // blocked workers wake once it is also empty.
        assert!(sender.is_some(), "worker pool stopped twice");
    }

    /// Blocks until every worker has exited, then clears the running flag.
    ///
    /// Unblocks only after the queue has been closed and fully drained. The
    /// pool does not enforce that [`stop`](Self::stop) is eventually called;
    /// waiting on a pool whose queue never closes blocks forever.
    pub fn wait(&self) {
        self.active.wait();
        self.running.store(false, Ordering::Relaxed);
    }

    /// Returns whether the pool is currently running.
    ///
    /// Purely advisory: the flag is set by [`start`](Self::start) and cleared
    /// when [`wait`](Self::wait) returns, with relaxed ordering. A `true`
    /// result may be stale by the time the caller acts on it; use it for
    /// status reporting, not for synchronization.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// The number of workers spawned by each [`start`](Self::start) call.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// The job queue's capacity; `0` means rendezvous handoff.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// The number of workers currently alive.
    ///
    /// Equals [`worker_count`](Self::worker_count) right after
    /// [`start`](Self::start), drops as workers exit during drain, and also
    /// drops when a worker is lost to a panicking job.
    pub fn active_workers(&self) -> usize {
        self.active.count()
    }
}

/// Pulls jobs off the queue until it is closed and drained.
///
/// A panicking job is not caught: it unwinds this thread and the worker is
/// permanently lost, reducing the pool's parallelism for the rest of its
/// life. The [`ExitGuard`] still signals the tracker on unwind so `wait`
/// does not hang.
#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn worker_loop(worker_id: usize, jobs: Receiver<Job>, active: Arc<ActiveWorkers>) {
    let _exit = ExitGuard::new(active);

    #[cfg(feature = "tracing")]
    tracing::trace!("worker {worker_id} started");

    while let Ok(job) = jobs.recv() {
        job();
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("worker {worker_id} stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    #[test]
    fn new_reports_configuration() {
        let pool = WorkerPool::new(5, 50);
        assert_eq!(pool.worker_count(), 5);
        assert_eq!(pool.queue_capacity(), 50);
        assert_eq!(pool.active_workers(), 0);
        assert!(!pool.is_running());
    }

    #[test]
    fn start_registers_every_worker_before_returning() {
        let pool = WorkerPool::new(8, 0);
        pool.start();
        // No jobs were submitted, so nothing can have completed yet.
        assert_eq!(pool.active_workers(), 8);
        assert!(pool.is_running());

        pool.stop();
        pool.wait();
        assert_eq!(pool.active_workers(), 0);
    }

    #[test]
    fn start_executes_a_submitted_job() {
        let pool = WorkerPool::new(1, 1);
        let value = Arc::new(AtomicUsize::new(0));

        pool.start();
        let job_value = Arc::clone(&value);
        pool.submit(move || job_value.store(777, Ordering::SeqCst))
            .unwrap();
        pool.stop();
        pool.wait();

        assert_eq!(value.load(Ordering::SeqCst), 777);
    }

    #[test]
    fn workers_drain_the_queue_before_exiting() {
        let pool = WorkerPool::new(2, 32);
        let counter = Arc::new(AtomicUsize::new(0));

        pool.start();
        for _ in 0..32 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.stop();
        pool.wait();

        assert_eq!(counter.load(Ordering::SeqCst), 32);
    }

    #[test]
    fn submit_after_stop_fails_and_runs_nothing() {
        let pool = WorkerPool::new(1, 4);
        let counter = Arc::new(AtomicUsize::new(0));

        pool.start();
        pool.stop();

        let job_counter = Arc::clone(&counter);
        let result = pool.submit(move || {
            job_counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(result, Err(Error::PoolClosed));

        pool.wait();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[should_panic(expected = "worker pool stopped twice")]
    fn stop_twice_panics() {
        let pool = WorkerPool::new(0, 1);
        pool.stop();
        pool.stop();
    }

    #[test]
    fn rendezvous_submit_blocks_until_a_worker_receives() {
        let pool = WorkerPool::new(1, 0);
        let submitted = AtomicBool::new(false);

        thread::scope(|s| {
            s.spawn(|| {
                pool.submit(|| ()).unwrap();
                submitted.store(true, Ordering::SeqCst);
            });

            // No worker exists yet, so the handoff cannot have happened.
            thread::sleep(Duration::from_millis(100));
            assert!(!submitted.load(Ordering::SeqCst));

            pool.start();
            pool.stop();
            pool.wait();
        });

        assert!(submitted.load(Ordering::SeqCst));
    }

    #[test]
    fn wait_blocks_while_a_job_is_in_flight() {
        let pool = WorkerPool::new(1, 1);
        let (release_tx, release_rx) = bounded::<()>(0);

        pool.start();
        pool.submit(move || {
            release_rx.recv().ok();
        })
        .unwrap();
        pool.stop();

        let returned = AtomicBool::new(false);
        thread::scope(|s| {
            s.spawn(|| {
                pool.wait();
                returned.store(true, Ordering::SeqCst);
            });

            // The job is parked on the rendezvous; the queue is closed but
            // not drained, so wait must not have returned.
            thread::sleep(Duration::from_millis(100));
            assert!(!returned.load(Ordering::SeqCst));

            release_tx.send(()).unwrap();
        });

        assert!(returned.load(Ordering::SeqCst));
        assert!(!pool.is_running());
    }

    #[test]
    fn panicking_job_costs_exactly_one_worker() {
        let pool = WorkerPool::new(2, 64);
        let counter = Arc::new(AtomicUsize::new(0));

        pool.start();
        assert_eq!(pool.active_workers(), 2);

        pool.submit(|| panic!("job failure")).unwrap();

        // The survivor keeps consuming: the pool never respawns a
        // replacement, but it still delivers every remaining job.
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.stop();
        pool.wait();

        assert_eq!(counter.load(Ordering::SeqCst), 100);
        assert_eq!(pool.active_workers(), 0);
    }
}
