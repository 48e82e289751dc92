// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{LockResult, PoisonError};

/// Source of mutex identifiers. Zero is reserved for "no mutex".
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A mutual exclusion primitive that can be paired with a
/// [`Condition`](super::Condition).
///
/// This is a thin wrapper around [`std::sync::Mutex`], whose guard remembers
/// which mutex it locked. That allows a [`Condition`](super::Condition) backend
/// to release the lock while parking the calling thread and to reacquire it
/// afterwards.
///
/// The lock isn't reentrant: locking it twice from the same thread deadlocks
/// or panics, as with [`std::sync::Mutex`].
pub struct Mutex<T> {
    /// Process-unique identifier, which follows the mutex when it moves.
    id: u64,
    inner: std::sync::Mutex<T>,
}

impl<T> Mutex<T> {
    /// Creates a new unlocked mutex holding the given value.
    pub fn new(t: T) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            inner: std::sync::Mutex::new(t),
        }
    }

    /// Acquires the mutex, blocking the current thread until it is able to do
    /// so.
    ///
    /// Fails if another thread panicked while holding the lock, in which case
    /// the [`PoisonError`] still contains the acquired guard.
    pub fn lock(&self) -> LockResult<MutexGuard<'_, T>> {
        wrap_guard(self, self.inner.lock())
    }

    /// Consumes this mutex, returning the underlying data.
    pub fn into_inner(self) -> LockResult<T> {
        self.inner.into_inner()
    }

    /// Returns the identifier of this mutex, which is never zero.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex").field("inner", &self.inner).finish()
    }
}

/// An RAII guard for a locked [`Mutex`]. The lock is released when this guard
/// is dropped.
pub struct MutexGuard<'a, T> {
    /// The mutex that this guard locks.
    pub(crate) mutex: &'a Mutex<T>,
    /// The underlying guard.
    pub(crate) inner: std::sync::MutexGuard<'a, T>,
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: fmt::Debug> fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

/// Wraps the result of locking the underlying [`std::sync::Mutex`] into a
/// [`MutexGuard`] that remembers the given mutex, preserving poisoning.
pub(crate) fn wrap_guard<'a, T>(
    mutex: &'a Mutex<T>,
    result: LockResult<std::sync::MutexGuard<'a, T>>,
) -> LockResult<MutexGuard<'a, T>> {
    match result {
        Ok(inner) => Ok(MutexGuard { mutex, inner }),
        Err(e) => Err(PoisonError::new(MutexGuard {
            mutex,
            inner: e.into_inner(),
        })),
    }
}
