// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A worker thread that runs a routine until it is cooperatively cancelled.

use crate::macros::{log_debug, log_error, log_warn};
use crate::thread_pool::Worker;
use crossbeam_utils::CachePadded;
// Platforms that support `libc::sched_setaffinity()`.
#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
use nix::{
    sched::{sched_setaffinity, CpuSet},
    unistd::Pid,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use thiserror::Error;

/// A flag requesting a worker thread to exit at its next safe point.
///
/// Clones share the same flag. Cancelling is a request: the routine of the
/// worker thread is responsible for checking
/// [`is_cancelled()`](Self::is_cancelled) and returning.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<CachePadded<AtomicBool>>,
}

impl CancellationToken {
    /// Creates a token that isn't cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Policy to pin worker threads to CPUs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CpuPinningPolicy {
    /// Don't pin worker threads to CPUs.
    No,
    /// Pin each worker thread to a CPU, if CPU pinning is supported and
    /// implemented on this platform.
    IfSupported,
    /// Pin each worker thread to a CPU. If CPU pinning isn't supported on this
    /// platform (or not implemented), building a worker thread will panic.
    Always,
}

/// A builder for [`WorkerThread`].
pub struct WorkerThreadBuilder {
    /// Index of the worker, used to name its thread and as the CPU to pin it
    /// to.
    pub id: usize,
    /// Policy to pin the worker thread to a CPU.
    pub cpu_pinning: CpuPinningPolicy,
}

impl WorkerThreadBuilder {
    /// Creates a worker thread that will run the given routine once started.
    ///
    /// The routine receives a clone of the arguments passed to
    /// [`Worker::start()`] and the [`CancellationToken`] of the worker.
    ///
    /// ```
    /// # use lockstep::{CpuPinningPolicy, Worker, WorkerThreadBuilder};
    /// # use std::time::Duration;
    /// let worker = WorkerThreadBuilder {
    ///     id: 0,
    ///     cpu_pinning: CpuPinningPolicy::No,
    /// }
    /// .build(|period: Duration, token| {
    ///     while !token.is_cancelled() {
    ///         std::thread::sleep(period);
    ///     }
    /// });
    ///
    /// worker.start(&Duration::from_millis(1)).unwrap();
    /// worker.cancel().unwrap();
    /// worker.join().unwrap();
    /// ```
    pub fn build<A, F>(&self, routine: F) -> WorkerThread<A>
    where
        F: Fn(A, CancellationToken) + Send + Sync + 'static,
    {
        #[cfg(any(
            miri,
            not(any(
                target_os = "android",
                target_os = "dragonfly",
                target_os = "freebsd",
                target_os = "linux"
            ))
        ))]
        match self.cpu_pinning {
            CpuPinningPolicy::No => (),
            CpuPinningPolicy::IfSupported => {
                log_warn!("Pinning threads to CPUs is not implemented on this platform.")
            }
            CpuPinningPolicy::Always => {
                panic!("Pinning threads to CPUs is not implemented on this platform.")
            }
        }

        WorkerThread {
            id: self.id,
            cpu_pinning: self.cpu_pinning,
            routine: Arc::new(routine),
            token: CancellationToken::new(),
            state: Mutex::new(ThreadState::NotStarted),
        }
    }
}

/// Lifecycle of the OS thread backing a [`WorkerThread`].
enum ThreadState {
    NotStarted,
    Running(JoinHandle<()>),
    Joined,
}

/// Error reported by a [`WorkerThread`].
#[derive(Debug, Error)]
pub enum WorkerThreadError {
    /// The worker thread was started more than once.
    #[error("worker thread #{0} was already started")]
    AlreadyStarted(usize),
    /// The worker thread was joined without being started.
    #[error("worker thread #{0} was never started")]
    NotStarted(usize),
    /// The operating system failed to spawn the thread.
    #[error("failed to spawn worker thread #{id}")]
    Spawn {
        /// Index of the worker.
        id: usize,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The routine of the worker thread panicked.
    #[error("worker thread #{0} panicked")]
    Panicked(usize),
}

/// A [`Worker`] running a routine on its own OS thread.
///
/// Dropping a running worker thread cancels it and joins it, so its routine
/// must eventually observe the cancellation.
pub struct WorkerThread<A> {
    /// Index of the worker.
    id: usize,
    /// Policy to pin the thread to a CPU.
    cpu_pinning: CpuPinningPolicy,
    /// Routine run by the thread.
    routine: Arc<dyn Fn(A, CancellationToken) + Send + Sync>,
    /// Cancellation flag shared with the routine.
    token: CancellationToken,
    /// Handle to the thread, once started.
    state: Mutex<ThreadState>,
}

impl<A> WorkerThread<A> {
    /// Returns the index of this worker.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the token that [`cancel()`](Worker::cancel) trips.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }
}

impl<A: Clone + Send + 'static> Worker for WorkerThread<A> {
    type Args = A;
    type Error = WorkerThreadError;

    fn start(&self, args: &A) -> Result<(), WorkerThreadError> {
        let id = self.id;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !matches!(*state, ThreadState::NotStarted) {
            log_error!("[worker #{id}] Cannot start a worker thread twice");
            return Err(WorkerThreadError::AlreadyStarted(id));
        }

        let cpu_pinning = self.cpu_pinning;
        let routine = self.routine.clone();
        let token = self.token.clone();
        let args = args.clone();
        let handle = std::thread::Builder::new()
            .name(format!("worker-{id}"))
            .spawn(move || {
                pin_to_cpu(id, cpu_pinning);
                log_debug!("[worker #{id}] Running");
                routine(args, token);
                log_debug!("[worker #{id}] Exiting");
            })
            .map_err(|source| {
                log_error!("[worker #{id}] Failed to spawn thread: {source}");
                WorkerThreadError::Spawn { id, source }
            })?;

        *state = ThreadState::Running(handle);
        Ok(())
    }

    fn cancel(&self) -> Result<(), WorkerThreadError> {
        log_debug!("[worker #{}] Requesting cancellation", self.id);
        self.token.cancel();
        Ok(())
    }

    fn join(&self) -> Result<(), WorkerThreadError> {
        let id = self.id;
        let handle = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *state, ThreadState::Joined) {
                ThreadState::Running(handle) => handle,
                ThreadState::NotStarted => {
                    *state = ThreadState::NotStarted;
                    return Err(WorkerThreadError::NotStarted(id));
                }
                ThreadState::Joined => return Ok(()),
            }
        };

        match handle.join() {
            Ok(()) => {
                log_debug!("[worker #{id}] Joined");
                Ok(())
            }
            Err(_) => {
                log_error!("[worker #{id}] Joined a panicked thread");
                Err(WorkerThreadError::Panicked(id))
            }
        }
    }
}

impl<A> Drop for WorkerThread<A> {
    /// Cancels and joins the thread, if it is running.
    fn drop(&mut self) {
        let state = std::mem::replace(
            self.state.get_mut().unwrap_or_else(PoisonError::into_inner),
            ThreadState::Joined,
        );
        if let ThreadState::Running(handle) = state {
            log_debug!("[worker #{}] Cancelling and joining on drop...", self.id);
            self.token.cancel();
            let result = handle.join();
            match result {
                Ok(_) => log_debug!("[worker #{}] Joined with result: {result:?}", self.id),
                Err(_) => log_error!("[worker #{}] Joined with result: {result:?}", self.id),
            }
        }
    }
}

impl<A> fmt::Debug for WorkerThread<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerThread")
            .field("id", &self.id)
            .field("cpu_pinning", &self.cpu_pinning)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// Pins the current thread to the CPU of the given index, according to the
/// given policy.
#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
fn pin_to_cpu(id: usize, cpu_pinning: CpuPinningPolicy) {
    match cpu_pinning {
        CpuPinningPolicy::No => (),
        CpuPinningPolicy::IfSupported => {
            let mut cpu_set = CpuSet::new();
            if let Err(_e) = cpu_set.set(id) {
                log_warn!("Failed to set CPU affinity for worker #{id}: {_e}");
            } else if let Err(_e) = sched_setaffinity(Pid::from_raw(0), &cpu_set) {
                log_warn!("Failed to set CPU affinity for worker #{id}: {_e}");
            } else {
                log_debug!("Pinned worker #{id} to CPU #{id}");
            }
        }
        CpuPinningPolicy::Always => {
            let mut cpu_set = CpuSet::new();
            if let Err(e) = cpu_set.set(id) {
                panic!("Failed to set CPU affinity for worker #{id}: {e}");
            } else if let Err(e) = sched_setaffinity(Pid::from_raw(0), &cpu_set) {
                panic!("Failed to set CPU affinity for worker #{id}: {e}");
            } else {
                log_debug!("Pinned worker #{id} to CPU #{id}");
            }
        }
    }
}

/// Pinning isn't implemented on this platform, which was already reported when
/// building the worker thread.
#[cfg(any(
    miri,
    not(any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    ))
))]
fn pin_to_cpu(_id: usize, _cpu_pinning: CpuPinningPolicy) {}
