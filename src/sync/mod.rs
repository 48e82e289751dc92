// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Synchronization primitives: a mutex and a condition variable with two
//! interchangeable backends.
//!
//! - [`NativeBackend`] delegates to the condition variable of the platform.
//! - [`EmulatedBackend`] builds a condition variable out of a waiter count, a
//!   semaphore and an event, for platforms that lack a native one.
//!
//! [`DefaultBackend`] selects one of them at compile time.

mod condition;
mod emulated;
mod mutex;
mod native;
mod primitives;
mod status;

pub use condition::{Backend, Condition};
pub use emulated::EmulatedBackend;
pub use mutex::{Mutex, MutexGuard};
pub use native::NativeBackend;
pub(crate) use status::Status;
use std::sync::PoisonError;

/// Backend used by a [`Condition`] unless specified otherwise.
///
/// This is the [`NativeBackend`], unless the `emulated-condition` feature is
/// enabled.
#[cfg(all(not(feature = "emulated-condition"), any(unix, windows)))]
pub type DefaultBackend = NativeBackend;

/// Backend used by a [`Condition`] unless specified otherwise.
///
/// This is the [`EmulatedBackend`], either because the `emulated-condition`
/// feature is enabled or because this platform has no native condition
/// variables.
#[cfg(any(feature = "emulated-condition", not(any(unix, windows))))]
pub type DefaultBackend = EmulatedBackend;

/// Locks an internal mutex, whose state is never left inconsistent by a panic.
fn lock_unpoisoned<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
