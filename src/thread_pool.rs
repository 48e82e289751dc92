// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A fixed pool of worker threads, started and cancelled in lockstep.

use crate::macros::{log_debug, log_error};
use crate::sync::Status;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A worker that a [`ThreadPool`] can start, cancel and join.
///
/// The pool doesn't own its workers: it only dispatches requests to them, in
/// registration order. Each worker is responsible for its own thread and for
/// reporting its own failures.
pub trait Worker {
    /// Arguments passed to [`start()`](Self::start).
    type Args: ?Sized;
    /// Error reported by this worker.
    type Error;

    /// Starts running this worker with the given arguments. This must not wait
    /// for the worker to finish.
    fn start(&self, args: &Self::Args) -> Result<(), Self::Error>;

    /// Requests this worker to exit at its next safe point. This must not wait
    /// for the worker to exit.
    fn cancel(&self) -> Result<(), Self::Error>;

    /// Waits for this worker to exit.
    fn join(&self) -> Result<(), Self::Error>;
}

/// Lifecycle of a [`ThreadPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolState {
    /// Workers can be registered, none was started yet.
    Idle,
    /// The workers were started.
    Running,
    /// The workers were requested to exit.
    Cancelling,
    /// All the workers have exited.
    Stopped,
}

/// Failure of one of the workers of a [`ThreadPool`].
#[derive(Debug, Error)]
#[error("worker #{index} failed: {source}")]
pub struct WorkerError<E: std::error::Error + 'static> {
    /// Registration index of the worker that failed.
    pub index: usize,
    /// Error reported by the worker.
    #[source]
    pub source: E,
}

/// A handle to signal the completion of the work of a [`ThreadPool`], or to
/// wait for it.
///
/// This wraps the [`Mutex`](crate::sync::Mutex)-[`Condition`](crate::sync::Condition)
/// pair of the pool, guarding a completion flag. Clones share the same pair, so
/// a clone can be handed to the workers (e.g. as their start arguments) or to
/// an external controller.
#[derive(Clone)]
pub struct Completion {
    status: Arc<Status<bool>>,
}

impl Completion {
    /// Creates a handle whose completion flag isn't set.
    pub fn new() -> Self {
        Self {
            status: Arc::new(Status::new(false)),
        }
    }

    /// Wakes up one thread waiting on this handle, without setting the
    /// completion flag.
    pub fn signal(&self) {
        self.status.signal();
    }

    /// Wakes up all the threads waiting on this handle, without setting the
    /// completion flag.
    pub fn broadcast(&self) {
        self.status.broadcast();
    }

    /// Sets the completion flag and wakes up all the waiting threads.
    pub fn complete(&self) {
        log_debug!("[completion] Work completed, waking up waiters");
        self.status.notify_all(true);
    }

    /// Returns whether the completion flag is set.
    pub fn is_complete(&self) -> bool {
        self.status.get()
    }

    /// Blocks the current thread until the next [`signal()`](Self::signal),
    /// [`broadcast()`](Self::broadcast) or [`complete()`](Self::complete).
    ///
    /// Signals are not remembered: a signal issued before this call doesn't
    /// wake it up. The caller must re-check its own completion condition when
    /// this returns, or use [`wait_until_complete()`](Self::wait_until_complete).
    pub fn wait(&self) {
        self.status.wait();
    }

    /// Blocks the current thread until the completion flag is set. Returns
    /// immediately if it is already set.
    pub fn wait_until_complete(&self) {
        drop(self.status.wait_while(|complete| !*complete));
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// A fixed set of workers that are started, cancelled and joined together,
/// plus a [`Completion`] rendezvous on which the caller can wait.
///
/// The pool holds non-owning references to its workers, and goes through the
/// states of [`PoolState`] in order, without ever going back to
/// [`PoolState::Idle`].
///
/// ```
/// # use lockstep::{Completion, CpuPinningPolicy, ThreadPool, Worker, WorkerThreadBuilder};
/// let workers: Vec<_> = (0..4)
///     .map(|id| {
///         WorkerThreadBuilder {
///             id,
///             cpu_pinning: CpuPinningPolicy::No,
///         }
///         .build(|completion: Completion, _token| completion.complete())
///     })
///     .collect();
///
/// let mut pool = ThreadPool::new();
/// for worker in &workers {
///     pool.add_worker(worker);
/// }
///
/// pool.start(&pool.completion()).unwrap();
/// pool.wait_for_completion();
/// pool.cancel().unwrap();
/// pool.join().unwrap();
/// ```
pub struct ThreadPool<'w, W: Worker> {
    /// Registered workers, in registration order.
    workers: Vec<&'w W>,
    /// Current state of the pool.
    state: PoolState,
    /// Rendezvous between the workers and the waiting threads.
    completion: Completion,
}

impl<'w, W: Worker> ThreadPool<'w, W>
where
    W::Error: std::error::Error + 'static,
{
    /// Creates an idle pool without any worker.
    pub fn new() -> Self {
        Self::with_completion(Completion::new())
    }

    /// Creates an idle pool without any worker, using the given completion
    /// handle as its rendezvous.
    pub fn with_completion(completion: Completion) -> Self {
        Self {
            workers: Vec::new(),
            state: PoolState::Idle,
            completion,
        }
    }

    /// Returns the current state of this pool.
    pub fn state(&self) -> PoolState {
        self.state
    }

    /// Returns the number of registered workers.
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Returns a handle to the completion rendezvous of this pool.
    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }

    /// Registers a worker at the end of this pool.
    ///
    /// # Panics
    ///
    /// This function panics if the pool was already started.
    pub fn add_worker(&mut self, worker: &'w W) {
        if self.state != PoolState::Idle {
            log_error!(
                "[main thread] Cannot add a worker to a pool in the {:?} state",
                self.state
            );
            panic!("Cannot add a worker to a thread pool that was already started");
        }
        self.workers.push(worker);
        log_debug!("[main thread] Registered worker #{}", self.workers.len() - 1);
    }

    /// Starts all the registered workers with the given arguments, in
    /// registration order. This doesn't wait for the workers to finish.
    ///
    /// If a worker fails to start, the remaining workers are not started and
    /// the error is returned. The pool is nevertheless
    /// [`Running`](PoolState::Running), so that [`cancel()`](Self::cancel) and
    /// [`join()`](Self::join) reach the workers that were started.
    ///
    /// # Panics
    ///
    /// This function panics if the pool was already started.
    pub fn start(&mut self, args: &W::Args) -> Result<(), WorkerError<W::Error>> {
        if self.state != PoolState::Idle {
            log_error!(
                "[main thread] Cannot start a pool in the {:?} state",
                self.state
            );
            panic!("Cannot start a thread pool that was already started");
        }
        self.state = PoolState::Running;

        log_debug!("[main thread] Starting {} workers...", self.workers.len());
        for (index, worker) in self.workers.iter().enumerate() {
            worker.start(args).map_err(|source| {
                log_error!("[main thread] Worker #{index} failed to start: {source}");
                WorkerError { index, source }
            })?;
        }
        log_debug!("[main thread] Started all workers");
        Ok(())
    }

    /// Waits once on the completion rendezvous of this pool.
    ///
    /// This returns after a worker or another thread calls
    /// [`Completion::signal()`], [`Completion::broadcast()`] or
    /// [`Completion::complete()`] on the pool's [`completion()`](Self::completion)
    /// handle. The pool itself doesn't decide when the work is done, so callers
    /// must re-check their own completion condition after this returns, or use
    /// [`wait_for_completion()`](Self::wait_for_completion).
    pub fn wait(&self) {
        log_debug!("[main thread] Waiting on the completion rendezvous...");
        self.completion.wait();
        log_debug!("[main thread] Woken up");
    }

    /// Waits until the completion flag of this pool is set by
    /// [`Completion::complete()`].
    pub fn wait_for_completion(&self) {
        log_debug!("[main thread] Waiting for completion...");
        self.completion.wait_until_complete();
        log_debug!("[main thread] Work completed");
    }

    /// Requests all the registered workers to exit, in registration order.
    /// This doesn't wait for the workers to exit.
    ///
    /// Each worker receives at most one cancellation request per pool: this is
    /// a no-op unless the pool is [`Running`](PoolState::Running). In
    /// particular, cancelling a pool that wasn't started does nothing.
    ///
    /// All the workers are requested to exit even if some of them fail, and
    /// the first failure is returned.
    pub fn cancel(&mut self) -> Result<(), WorkerError<W::Error>> {
        if self.state != PoolState::Running {
            log_debug!(
                "[main thread] Ignoring cancellation of a pool in the {:?} state",
                self.state
            );
            return Ok(());
        }
        self.state = PoolState::Cancelling;

        log_debug!("[main thread] Cancelling workers...");
        let result = dispatch(&self.workers, "cancel", |worker| worker.cancel());
        log_debug!("[main thread] Cancelled workers");
        result
    }

    /// Waits for all the registered workers to exit, in registration order.
    ///
    /// All the workers are joined even if some of them fail, and the first
    /// failure is returned. This is a no-op if the pool was never started or
    /// was already joined.
    pub fn join(&mut self) -> Result<(), WorkerError<W::Error>> {
        match self.state {
            PoolState::Idle | PoolState::Stopped => return Ok(()),
            PoolState::Running | PoolState::Cancelling => (),
        }

        log_debug!("[main thread] Joining workers in the pool...");
        let result = dispatch(&self.workers, "join", |worker| worker.join());
        self.state = PoolState::Stopped;
        log_debug!("[main thread] Joined workers.");
        result
    }
}

impl<W: Worker> Default for ThreadPool<'_, W>
where
    W::Error: std::error::Error + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Worker> fmt::Debug for ThreadPool<'_, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("num_workers", &self.workers.len())
            .field("state", &self.state)
            .field("completion", &self.completion)
            .finish()
    }
}

/// Applies the given operation to all the workers in order, returning the
/// first failure.
fn dispatch<W: Worker>(
    workers: &[&W],
    _operation: &str,
    f: impl Fn(&W) -> Result<(), W::Error>,
) -> Result<(), WorkerError<W::Error>>
where
    W::Error: std::error::Error + 'static,
{
    let mut first_error = None;
    for (index, worker) in workers.iter().enumerate() {
        if let Err(source) = f(worker) {
            log_error!("[main thread] Worker #{index} failed to {_operation}: {source}");
            if first_error.is_none() {
                first_error = Some(WorkerError { index, source });
            }
        }
    }
    match first_error {
        None => Ok(()),
        Some(e) => Err(e),
    }
}
