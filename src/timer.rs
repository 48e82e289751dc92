// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A timer measuring both wall-clock time and CPU time.

use crate::macros::log_warn;
// Platforms that support `libc::clock_gettime(CLOCK_PROCESS_CPUTIME_ID)`.
#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "ios",
        target_os = "linux",
        target_os = "macos",
        target_os = "tvos",
        target_os = "visionos",
        target_os = "watchos"
    )
))]
use nix::time::{clock_gettime, ClockId};
// Other platforms that support `libc::getrusage(RUSAGE_SELF)`.
#[cfg(all(
    not(miri),
    unix,
    not(any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "ios",
        target_os = "linux",
        target_os = "macos",
        target_os = "tvos",
        target_os = "visionos",
        target_os = "watchos",
        target_os = "fuchsia",
        target_os = "haiku",
        target_os = "illumos",
        target_os = "redox",
        target_os = "solaris"
    ))
))]
use nix::sys::resource::{getrusage, UsageWho};
use std::sync::Once;
use std::time::{Duration, Instant};

/// Reports the fallback to the wall clock, once per process.
static WALL_CLOCK_FALLBACK: Once = Once::new();

/// Source of the CPU time measured by a [`Timer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CpuClock {
    /// CPU time consumed by all the threads of the current process, read with
    /// `clock_gettime(CLOCK_PROCESS_CPUTIME_ID)` or else with `getrusage()`.
    Process,
    /// No process CPU clock exists on this platform, so the wall clock is
    /// measured instead.
    WallClock,
}

/// A timer measuring the wall-clock time and the CPU time elapsed since its
/// creation or its last [`reset()`](Self::reset).
///
/// The wall-clock time is measured with [`Instant`], i.e. the most precise
/// monotonic clock of the platform. It is therefore immune to adjustments of
/// the system time.
///
/// ```
/// # use lockstep::Timer;
/// # use std::time::Duration;
/// let mut timer = Timer::new();
/// std::thread::sleep(Duration::from_millis(10));
/// assert!(timer.milliseconds() >= 10);
///
/// timer.reset();
/// assert!(timer.microseconds() < 10_000);
/// ```
#[derive(Debug)]
pub struct Timer {
    /// Wall-clock baseline.
    wall_start: Instant,
    /// Source of CPU time.
    cpu_clock: CpuClock,
    /// CPU-clock baseline, only meaningful with [`CpuClock::Process`].
    cpu_start: Duration,
}

impl Timer {
    /// Creates a timer whose baselines are the current time.
    ///
    /// If the CPU time of the process can't be read on this platform, CPU
    /// measurements fall back to the wall clock.
    pub fn new() -> Self {
        let (cpu_clock, cpu_start) = match process_cpu_time() {
            Some(cpu_start) => (CpuClock::Process, cpu_start),
            None => {
                WALL_CLOCK_FALLBACK.call_once(|| {
                    log_warn!(
                        "Measuring CPU time is not supported on this platform, falling back to the wall clock."
                    )
                });
                (CpuClock::WallClock, Duration::ZERO)
            }
        };
        Self {
            wall_start: Instant::now(),
            cpu_clock,
            cpu_start,
        }
    }

    /// Rebinds both baselines to the current time.
    pub fn reset(&mut self) {
        self.wall_start = Instant::now();
        self.cpu_start = self.cpu_now();
    }

    /// Returns the source of CPU time used by this timer.
    pub fn cpu_clock(&self) -> CpuClock {
        self.cpu_clock
    }

    /// Returns the wall-clock time elapsed since the baseline.
    pub fn elapsed(&self) -> Duration {
        Instant::now().saturating_duration_since(self.wall_start)
    }

    /// Returns the CPU time consumed by the process since the baseline.
    pub fn elapsed_cpu(&self) -> Duration {
        match self.cpu_clock {
            CpuClock::Process => self.cpu_now().saturating_sub(self.cpu_start),
            CpuClock::WallClock => self.elapsed(),
        }
    }

    /// Returns the wall-clock time elapsed since the baseline, in milliseconds.
    pub fn milliseconds(&self) -> u64 {
        saturating_u64(self.elapsed().as_millis())
    }

    /// Returns the wall-clock time elapsed since the baseline, in microseconds.
    pub fn microseconds(&self) -> u64 {
        saturating_u64(self.elapsed().as_micros())
    }

    /// Returns the CPU time consumed by the process since the baseline, in
    /// milliseconds.
    pub fn milliseconds_cpu(&self) -> u64 {
        saturating_u64(self.elapsed_cpu().as_millis())
    }

    /// Returns the CPU time consumed by the process since the baseline, in
    /// microseconds.
    pub fn microseconds_cpu(&self) -> u64 {
        saturating_u64(self.elapsed_cpu().as_micros())
    }

    /// Reads the CPU clock. If a reading fails, the baseline is returned so
    /// that elapsed values never decrease below zero.
    fn cpu_now(&self) -> Duration {
        match self.cpu_clock {
            CpuClock::Process => process_cpu_time().unwrap_or(self.cpu_start),
            CpuClock::WallClock => Duration::ZERO,
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

fn saturating_u64(x: u128) -> u64 {
    u64::try_from(x).unwrap_or(u64::MAX)
}

/// Reads the CPU time consumed by the current process.
#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "ios",
        target_os = "linux",
        target_os = "macos",
        target_os = "tvos",
        target_os = "visionos",
        target_os = "watchos"
    )
))]
fn process_cpu_time() -> Option<Duration> {
    match clock_gettime(ClockId::CLOCK_PROCESS_CPUTIME_ID) {
        Ok(timespec) => {
            let secs = u64::try_from(timespec.tv_sec()).ok()?;
            let nanos = u32::try_from(timespec.tv_nsec()).ok()?;
            Some(Duration::new(secs, nanos))
        }
        Err(_e) => {
            warn_read_failure(|| {
                log_warn!("Failed to read the CPU time of the process: {_e}")
            });
            None
        }
    }
}

/// Reads the CPU time consumed by the current process, as the sum of its user
/// and system times.
#[cfg(all(
    not(miri),
    unix,
    not(any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "ios",
        target_os = "linux",
        target_os = "macos",
        target_os = "tvos",
        target_os = "visionos",
        target_os = "watchos",
        target_os = "fuchsia",
        target_os = "haiku",
        target_os = "illumos",
        target_os = "redox",
        target_os = "solaris"
    ))
))]
fn process_cpu_time() -> Option<Duration> {
    match getrusage(UsageWho::RUSAGE_SELF) {
        Ok(usage) => {
            let user = usage.user_time();
            let system = usage.system_time();
            let to_duration = |secs: i64, micros: i64| -> Option<Duration> {
                let secs = u64::try_from(secs).ok()?;
                let micros = u64::try_from(micros).ok()?;
                Some(Duration::from_secs(secs) + Duration::from_micros(micros))
            };
            let user = to_duration(user.tv_sec().into(), user.tv_usec().into())?;
            let system = to_duration(system.tv_sec().into(), system.tv_usec().into())?;
            Some(user + system)
        }
        Err(_e) => {
            warn_read_failure(|| {
                log_warn!("Failed to read the resource usage of the process: {_e}")
            });
            None
        }
    }
}

/// Reports a failure to read the CPU clock, once per process.
#[cfg(all(
    not(miri),
    unix,
    not(any(
        target_os = "fuchsia",
        target_os = "haiku",
        target_os = "illumos",
        target_os = "redox",
        target_os = "solaris"
    ))
))]
fn warn_read_failure(warn: impl FnOnce()) {
    static READ_FAILURE: Once = Once::new();
    READ_FAILURE.call_once(warn);
}

/// Reads the CPU time consumed by the current process.
#[cfg(any(
    miri,
    not(unix),
    target_os = "fuchsia",
    target_os = "haiku",
    target_os = "illumos",
    target_os = "redox",
    target_os = "solaris"
))]
fn process_cpu_time() -> Option<Duration> {
    None
}
