// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Condition variables emulated with a semaphore, an event and a waiter count,
//! for platforms without native condition variables.
//!
//! This follows Schmidt's algorithm:
//! - a waiter registers itself in the waiter count, releases the external
//!   mutex, and parks on the semaphore,
//! - a signal releases one unit of the semaphore if the waiter count is
//!   nonzero,
//! - a broadcast releases as many units as there are waiters, and then blocks
//!   until the last of them has resumed, which that last waiter notifies via an
//!   auto-reset event.
//!
//! The waiter count is guarded by an internal lock, distinct from the external
//! mutex. Waiters reserve their semaphore ticket under that internal lock, and
//! the semaphore hands units directly to reserved tickets. Therefore a unit is
//! never consumed by a thread that started waiting after the release, and a
//! signal without waiters leaves nothing behind.

use super::condition::Backend;
use super::lock_unpoisoned;
use super::mutex::MutexGuard;
use super::primitives::{Event, Semaphore};
use crate::macros::log_trace;
use std::sync::{LockResult, Mutex};

/// What released a waiting thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Release {
    Signal,
    Broadcast,
}

/// Waiter bookkeeping of an [`EmulatedBackend`].
#[derive(Debug, Default)]
struct Waiters {
    /// Number of threads blocked in `wait()` and not released yet.
    blocked: usize,
    /// Number of threads released by the ongoing broadcast that haven't resumed
    /// yet.
    draining: usize,
    /// Whether a broadcast is in progress.
    was_broadcast: bool,
}

/// [`Condition`](super::Condition) backend emulating a condition variable with
/// a waiter count, a semaphore and an auto-reset event.
pub struct EmulatedBackend {
    /// Waiter bookkeeping, guarded by its own lock.
    waiters: Mutex<Waiters>,
    /// Semaphore on which waiting threads park.
    semaphore: Semaphore<Release>,
    /// Set by the last thread released by a broadcast once it has resumed.
    waiters_done: Event,
    /// Serializes broadcasts, so that a broadcast doesn't start before the
    /// threads released by the previous one are drained.
    broadcasting: Mutex<()>,
}

impl Default for EmulatedBackend {
    fn default() -> Self {
        Self {
            waiters: Mutex::new(Waiters::default()),
            semaphore: Semaphore::default(),
            waiters_done: Event::default(),
            broadcasting: Mutex::new(()),
        }
    }
}

impl Backend for EmulatedBackend {
    fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> LockResult<MutexGuard<'a, T>> {
        let MutexGuard { mutex, inner } = guard;

        let ticket = {
            let mut waiters = lock_unpoisoned(&self.waiters);
            waiters.blocked += 1;
            log_trace!(
                "[condition] Registered a waiter, {} blocked now",
                waiters.blocked
            );
            self.semaphore.reserve()
        };
        // Releases from this point on target the reserved ticket, even if this
        // thread isn't parked yet.
        drop(inner);

        let release = ticket.wait();
        let last_waiter = match release {
            Release::Signal => false,
            Release::Broadcast => {
                let mut waiters = lock_unpoisoned(&self.waiters);
                debug_assert!(waiters.was_broadcast);
                waiters.draining -= 1;
                waiters.draining == 0
            }
        };
        log_trace!("[condition] Waiter released by {release:?}");

        if last_waiter {
            log_trace!("[condition] Last waiter released by the broadcast, notifying the broadcaster");
            self.waiters_done.set();
        }

        mutex.lock()
    }

    fn signal(&self) {
        let mut waiters = lock_unpoisoned(&self.waiters);
        if waiters.blocked > 0 {
            waiters.blocked -= 1;
            let _released = self.semaphore.release(1, Release::Signal);
            debug_assert_eq!(_released, 1);
            log_trace!(
                "[condition] Signaled a waiter, {} still blocked",
                waiters.blocked
            );
        }
    }

    fn broadcast(&self) {
        let _broadcasting = lock_unpoisoned(&self.broadcasting);
        {
            let mut waiters = lock_unpoisoned(&self.waiters);
            if waiters.blocked == 0 {
                return;
            }
            debug_assert_eq!(waiters.draining, 0);
            let count = std::mem::take(&mut waiters.blocked);
            waiters.draining = count;
            waiters.was_broadcast = true;
            let _released = self.semaphore.release(count, Release::Broadcast);
            debug_assert_eq!(_released, count);
            log_trace!("[condition] Broadcast to {count} waiter(s)");
        }

        self.waiters_done.wait();
        lock_unpoisoned(&self.waiters).was_broadcast = false;
        log_trace!("[condition] Broadcast drained");
    }
}
