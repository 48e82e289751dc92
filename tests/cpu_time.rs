// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The process CPU clock counts every thread of the process, so this test runs
//! in its own binary, away from the busy unit tests of the crate.

use lockstep::{CpuClock, Timer};
use std::time::Duration;

#[test]
fn sleeping_consumes_little_cpu_time() {
    let timer = Timer::new();
    if timer.cpu_clock() != CpuClock::Process {
        return;
    }

    std::thread::sleep(Duration::from_millis(100));
    let wall_ms = timer.milliseconds();
    let cpu_ms = timer.milliseconds_cpu();
    assert!(wall_ms >= 100, "wall = {wall_ms} ms");
    assert!(
        cpu_ms < wall_ms / 2,
        "cpu = {cpu_ms} ms, wall = {wall_ms} ms"
    );
}
