// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use super::condition::Backend;
use super::mutex::{wrap_guard, MutexGuard};
use std::sync::{Condvar, LockResult};

/// [`Condition`](super::Condition) backend delegating to the native condition
/// variable of the platform, bound to the native lock of the
/// [`Mutex`](super::Mutex).
#[derive(Default)]
pub struct NativeBackend {
    condvar: Condvar,
}

impl Backend for NativeBackend {
    fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> LockResult<MutexGuard<'a, T>> {
        let MutexGuard { mutex, inner } = guard;
        wrap_guard(mutex, self.condvar.wait(inner))
    }

    fn signal(&self) {
        self.condvar.notify_one();
    }

    fn broadcast(&self) {
        self.condvar.notify_all();
    }
}
