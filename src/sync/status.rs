// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use super::{Condition, Mutex, MutexGuard};
use std::sync::PoisonError;

/// An ergonomic wrapper around a [`Mutex`]-[`Condition`] pair.
///
/// The protected status is a plain value that is always left consistent, so a
/// poisoned lock is recovered rather than reported.
pub struct Status<T> {
    mutex: Mutex<T>,
    condition: Condition,
}

impl<T> Status<T> {
    /// Creates a new status initialized with the given value.
    pub fn new(t: T) -> Self {
        Self {
            mutex: Mutex::new(t),
            condition: Condition::new(),
        }
    }

    /// Sets the status to the given value and notifies all waiting threads.
    pub fn notify_all(&self, t: T) {
        let mut guard = self.lock();
        *guard = t;
        self.condition.broadcast();
    }

    /// Wakes up one waiting thread, without changing the status.
    pub fn signal(&self) {
        self.condition.signal();
    }

    /// Wakes up all waiting threads, without changing the status.
    pub fn broadcast(&self) {
        self.condition.broadcast();
    }

    /// Waits once on the condition, regardless of the status.
    pub fn wait(&self) {
        let guard = self.lock();
        drop(
            self.condition
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner),
        );
    }

    /// Waits until the predicate is false on this status.
    ///
    /// This returns a [`MutexGuard`], allowing to further inspect or modify the
    /// status.
    pub fn wait_while(&self, mut predicate: impl FnMut(&mut T) -> bool) -> MutexGuard<'_, T> {
        let mut guard = self.lock();
        while predicate(&mut *guard) {
            guard = self
                .condition
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
        guard
    }

    /// Returns the current status.
    pub fn get(&self) -> T
    where
        T: Copy,
    {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
