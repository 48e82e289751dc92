// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Parking primitives used by the emulated condition backend: a ticketed
//! semaphore and an auto-reset event.
//!
//! Neither primitive relies on a platform condition variable. Threads park on
//! a [`Parker`] and are released by a direct hand-off: the releasing thread
//! writes a grant into the parked thread's [`Slot`] and unparks it.

use super::lock_unpoisoned;
use crossbeam_utils::atomic::AtomicCell;
use crossbeam_utils::sync::{Parker, Unparker};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Shared half of a parked thread: where the grant is written, and how to wake
/// the thread up.
struct Slot<G> {
    grant: AtomicCell<Option<G>>,
    unparker: Unparker,
}

impl<G: Copy> Slot<G> {
    /// Hands the given grant to the thread owning this slot and wakes it up.
    fn grant(&self, grant: G) {
        self.grant.store(Some(grant));
        self.unparker.unpark();
    }
}

/// A reservation to be released by a [`Semaphore`] or an [`Event`].
pub struct Ticket<G> {
    parker: Parker,
    slot: Arc<Slot<G>>,
}

impl<G: Copy> Ticket<G> {
    fn new() -> (Self, Arc<Slot<G>>) {
        let parker = Parker::new();
        let slot = Arc::new(Slot {
            grant: AtomicCell::new(None),
            unparker: parker.unparker().clone(),
        });
        (
            Self {
                parker,
                slot: slot.clone(),
            },
            slot,
        )
    }

    /// Parks the current thread until this ticket is released, and returns
    /// the grant it was released with.
    pub fn wait(self) -> G {
        loop {
            if let Some(grant) = self.slot.grant.load() {
                return grant;
            }
            self.parker.park();
        }
    }

    #[cfg(test)]
    fn is_granted(&self) -> bool {
        self.slot.grant.load().is_some()
    }
}

/// A FIFO semaphore whose units are handed directly to reserved tickets.
///
/// A thread first [`reserve()`](Self::reserve)s a ticket and later
/// [`wait()`](Ticket::wait)s on it, possibly after releasing other locks in
/// between. A [`release()`](Self::release) only ever grants tickets that were
/// reserved before it: units are never stored for tickets reserved later.
pub struct Semaphore<G> {
    queue: Mutex<VecDeque<Arc<Slot<G>>>>,
}

impl<G: Copy> Semaphore<G> {
    /// Creates a semaphore without any reservation.
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Reserves a ticket at the back of the queue.
    pub fn reserve(&self) -> Ticket<G> {
        let (ticket, slot) = Ticket::new();
        lock_unpoisoned(&self.queue).push_back(slot);
        ticket
    }

    /// Releases up to `count` of the oldest reserved tickets with the given
    /// grant, returning how many were released.
    pub fn release(&self, count: usize, grant: G) -> usize {
        let mut queue = lock_unpoisoned(&self.queue);
        let count = count.min(queue.len());
        for slot in queue.drain(..count) {
            slot.grant(grant);
        }
        count
    }

    /// Returns the number of reserved tickets that haven't been released yet.
    pub fn num_reserved(&self) -> usize {
        lock_unpoisoned(&self.queue).len()
    }
}

impl<G: Copy> Default for Semaphore<G> {
    fn default() -> Self {
        Self::new()
    }
}

/// State of an [`Event`].
struct EventState {
    /// Whether the event was set while no thread was waiting on it.
    set: bool,
    /// Threads waiting for the event to be set.
    waiters: VecDeque<Arc<Slot<()>>>,
}

/// An auto-reset event: setting it releases exactly one waiting thread, or the
/// next thread to wait if none is waiting.
pub struct Event {
    state: Mutex<EventState>,
}

impl Event {
    /// Creates an event in the reset state.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EventState {
                set: false,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Sets the event, releasing one waiting thread if any.
    pub fn set(&self) {
        let mut state = lock_unpoisoned(&self.state);
        match state.waiters.pop_front() {
            Some(slot) => slot.grant(()),
            None => state.set = true,
        }
    }

    /// Waits until the event is set, and resets it.
    pub fn wait(&self) {
        let ticket = {
            let mut state = lock_unpoisoned(&self.state);
            if state.set {
                state.set = false;
                return;
            }
            let (ticket, slot) = Ticket::new();
            state.waiters.push_back(slot);
            ticket
        };
        ticket.wait()
    }

    #[cfg(test)]
    pub(crate) fn is_set(&self) -> bool {
        lock_unpoisoned(&self.state).set
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}
