use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// Counts live workers so a blocking wait can observe full drain.
///
/// Workers are registered in bulk before they are spawned and deregistered
/// one by one as each exits, so the count can never be observed at zero while
/// a spawned worker has yet to run.
pub(crate) struct ActiveWorkers {
    count: Mutex<usize>,
    drained: Condvar,
}

impl ActiveWorkers {
    pub(crate) fn new() -> Self {
        Self {
            count: Mutex::new(0),
            drained: Condvar::new(),
        }
    }

    /// Registers `n` workers that are about to be spawned.
    pub(crate) fn add(&self, n: usize) {
        *self.count.lock() += n;
    }

    /// Deregisters one worker.
    ///
    /// # Panics
    /// Panics on underflow if called more times than workers were registered.
    pub(crate) fn done(&self) {
        let mut count = self.count.lock();
        *count -= 1;
        if *count == 0 {
            self.drained.notify_all();
        }
    }

    /// Blocks until every registered worker has deregistered.
    pub(crate) fn wait(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.drained.wait(&mut count);
        }
    }

    /// Current number of registered workers.
    pub(crate) fn count(&self) -> usize {
        *self.count.lock()
    }
}

/// Deregisters a worker when dropped.
///
/// Held on the worker's stack for the lifetime of its loop so the tracker is
/// signalled on every exit path, including a job panic unwinding the thread.
pub(crate) struct ExitGuard {
    tracker: Arc<ActiveWorkers>,
}

impl ExitGuard {
    pub(crate) fn new(tracker: Arc<ActiveWorkers>) -> Self {
        Self { tracker }
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.tracker.done();
    }
}
