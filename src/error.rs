/// A result type defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All possible errors that `workpool` can produce.
///
/// The pool has exactly one recoverable failure mode: submitting work after
/// the queue has been closed. Everything else (stopping a pool twice, waiting
/// on a pool whose queue never closes) is a caller-contract violation and
/// surfaces as a panic or a block, not as an `Error`.
#[derive(Clone, Copy, thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The job queue is no longer open.
    ///
    /// Returned by [`WorkerPool::submit`] once [`WorkerPool::stop`] has been
    /// called on this pool. The job was not enqueued and will never run; the
    /// caller is expected to stop submitting.
    ///
    /// [`WorkerPool::submit`]: crate::WorkerPool::submit
    /// [`WorkerPool::stop`]: crate::WorkerPool::stop
    #[error("job queue is not open: stop() has been called on this pool already")]
    PoolClosed,
}
