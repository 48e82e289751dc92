// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use super::mutex::{Mutex, MutexGuard};
use crate::macros::log_error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LockResult;

mod sealed {
    pub trait Sealed {}
}

/// Strategy implementing the blocking protocol of a [`Condition`].
///
/// This trait is sealed: it is implemented by
/// [`NativeBackend`](super::NativeBackend) and
/// [`EmulatedBackend`](super::EmulatedBackend) only.
pub trait Backend: sealed::Sealed + Default + Send + Sync {
    /// Atomically releases the lock held by the given guard and parks the
    /// calling thread until woken up by [`signal()`](Self::signal) or
    /// [`broadcast()`](Self::broadcast), then reacquires the lock.
    fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> LockResult<MutexGuard<'a, T>>;

    /// Wakes up at most one waiting thread.
    fn signal(&self);

    /// Wakes up all the threads waiting at the time of the call.
    fn broadcast(&self);
}

impl sealed::Sealed for super::NativeBackend {}
impl sealed::Sealed for super::EmulatedBackend {}

/// A condition variable, blocking threads until another thread signals them.
///
/// A condition is conceptually associated with a predicate on the data
/// protected by a [`Mutex`]. Waiting requires the lock, which is proved by
/// passing its [`MutexGuard`] to [`wait()`](Self::wait): the lock is released
/// while the thread is parked, and reacquired before the guard is handed back.
///
/// The blocking protocol is delegated to the backend `B`, which defaults to
/// the native condition variable of the platform (see
/// [`DefaultBackend`](super::DefaultBackend)).
///
/// ```
/// # use lockstep::sync::{Condition, Mutex};
/// # use std::sync::Arc;
/// let pair: Arc<(Mutex<bool>, Condition)> = Arc::new((Mutex::new(false), Condition::new()));
///
/// let thread = std::thread::spawn({
///     let pair = pair.clone();
///     move || {
///         let (mutex, condition) = &*pair;
///         *mutex.lock().unwrap() = true;
///         condition.signal();
///     }
/// });
///
/// let (mutex, condition) = &*pair;
/// let guard = condition
///     .wait_while(mutex.lock().unwrap(), |ready| !*ready)
///     .unwrap();
/// assert!(*guard);
/// # drop(guard);
/// # thread.join().unwrap();
/// ```
pub struct Condition<B: Backend = super::DefaultBackend> {
    /// Backend implementing the blocking protocol.
    backend: B,
    /// Identifier of the mutex used by waiting threads, or zero if no thread
    /// has waited yet.
    mutex: AtomicU64,
}

impl<B: Backend> Condition<B> {
    /// Creates a new condition, without any waiting thread.
    pub fn new() -> Self {
        Self {
            backend: B::default(),
            mutex: AtomicU64::new(0),
        }
    }

    /// Releases the lock held by the given guard and blocks the current thread
    /// until this condition is signaled, then reacquires the lock.
    ///
    /// A [`signal()`](Self::signal) or [`broadcast()`](Self::broadcast) issued
    /// once the lock is released is never lost, even if this thread isn't
    /// parked yet. However, the caller must re-check its predicate when this
    /// function returns: another thread may have changed the protected data in
    /// the meantime, and the native backend may wake up spuriously. See
    /// [`wait_while()`](Self::wait_while).
    ///
    /// Fails if the mutex was poisoned, in which case the [`PoisonError`]
    /// contains the reacquired guard.
    ///
    /// # Panics
    ///
    /// This function panics if this condition was previously used with another
    /// [`Mutex`].
    ///
    /// [`PoisonError`]: std::sync::PoisonError
    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> LockResult<MutexGuard<'a, T>> {
        self.bind(guard.mutex);
        self.backend.wait(guard)
    }

    /// Blocks the current thread as long as the given predicate returns true on
    /// the protected data.
    ///
    /// The predicate is checked before waiting and after every wakeup, with the
    /// lock held.
    ///
    /// # Panics
    ///
    /// This function panics if this condition was previously used with another
    /// [`Mutex`].
    pub fn wait_while<'a, T>(
        &self,
        mut guard: MutexGuard<'a, T>,
        mut predicate: impl FnMut(&mut T) -> bool,
    ) -> LockResult<MutexGuard<'a, T>> {
        while predicate(&mut *guard) {
            guard = self.wait(guard)?;
        }
        Ok(guard)
    }

    /// Wakes up one thread currently blocked on this condition, if any.
    ///
    /// This is a no-op if no thread is waiting: the signal isn't remembered
    /// for threads that start waiting later.
    pub fn signal(&self) {
        self.backend.signal()
    }

    /// Wakes up all the threads currently blocked on this condition.
    ///
    /// Threads that start waiting after this call are not affected by it.
    pub fn broadcast(&self) {
        self.backend.broadcast()
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    /// Associates this condition with the given mutex, or checks that the
    /// association is consistent.
    fn bind<T>(&self, mutex: &Mutex<T>) {
        let id = mutex.id();
        match self
            .mutex
            .compare_exchange(0, id, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => (),
            Err(bound) if bound == id => (),
            Err(_bound) => {
                log_error!(
                    "[condition] Waiting with mutex #{id}, but this condition is bound to mutex #{_bound}"
                );
                panic!("A Condition must always be used with the same Mutex");
            }
        }
    }
}

impl<B: Backend> Default for Condition<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> fmt::Debug for Condition<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition").finish_non_exhaustive()
    }
}
