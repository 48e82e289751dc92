// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! CLI tool to run a pool of worker threads that report to the main thread.

use clap::{Parser, ValueEnum};
use lockstep::sync::{Backend, EmulatedBackend, NativeBackend};
use lockstep::{
    CancellationToken, Condition, CpuPinningPolicy, Mutex, ThreadPool, Timer, WorkerThreadBuilder,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use std::hint::black_box;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.backend {
        BackendCli::Native => run::<NativeBackend>(&cli),
        BackendCli::Emulated => run::<EmulatedBackend>(&cli),
    }
}

/// Progress shared between the workers and the main thread.
struct Progress<B: Backend> {
    /// Number of completed tasks.
    completed: Mutex<usize>,
    /// Notified whenever a task completes.
    condition: Condition<B>,
}

fn run<B: Backend + 'static>(cli: &Cli) {
    let num_threads = match cli.num_threads {
        Some(num_threads) => num_threads.get(),
        None => std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1),
    };
    let cpu_pinning = match cli.cpu_pinning {
        CpuPinningCli::No => CpuPinningPolicy::No,
        CpuPinningCli::IfSupported => CpuPinningPolicy::IfSupported,
        CpuPinningCli::Always => CpuPinningPolicy::Always,
    };
    let max_sleep_ms = cli.max_sleep_ms;
    let busy_iterations = cli.busy_iterations;

    let workers: Vec<_> = (0..num_threads)
        .map(|id| {
            WorkerThreadBuilder { id, cpu_pinning }.build(
                move |progress: Arc<Progress<B>>, token: CancellationToken| {
                    // Each worker has its own reproducible sequence of delays.
                    let mut rng = ChaCha12Rng::seed_from_u64(id as u64);
                    while !token.is_cancelled() {
                        if max_sleep_ms != 0 {
                            let sleep_ms = rng.random_range(0..=max_sleep_ms);
                            std::thread::sleep(Duration::from_millis(sleep_ms));
                        }
                        let mut x = id as u64;
                        for i in 0..busy_iterations {
                            x = black_box(x.wrapping_mul(31).wrapping_add(i));
                        }
                        black_box(x);

                        *progress.completed.lock().unwrap() += 1;
                        progress.condition.broadcast();
                    }
                },
            )
        })
        .collect();

    let progress = Arc::new(Progress {
        completed: Mutex::new(0),
        condition: Condition::<B>::new(),
    });

    let mut pool = ThreadPool::new();
    for worker in &workers {
        pool.add_worker(worker);
    }

    let timer = Timer::new();
    pool.start(&progress).unwrap();
    let completed = *progress
        .condition
        .wait_while(progress.completed.lock().unwrap(), |completed| {
            *completed < cli.num_tasks
        })
        .unwrap();
    let wall_us = timer.microseconds();
    let cpu_us = timer.microseconds_cpu();

    pool.cancel().unwrap();
    pool.join().unwrap();

    println!("workers = {num_threads}");
    println!("completed = {completed} tasks");
    println!("wall time = {wall_us} us");
    println!("cpu time = {cpu_us} us ({:?})", timer.cpu_clock());
}

/// CLI tool to run a pool of worker threads that report to the main thread.
#[derive(Parser, Debug, PartialEq, Eq)]
#[command(version)]
struct Cli {
    /// Number of worker threads. Default to the available parallelism.
    #[arg(long)]
    num_threads: Option<NonZeroUsize>,

    /// Backend of the condition variable.
    #[arg(long, value_enum, default_value_t = BackendCli::Native)]
    backend: BackendCli,

    /// Policy to pin worker threads to CPUs.
    #[arg(long, value_enum, default_value_t = CpuPinningCli::IfSupported)]
    cpu_pinning: CpuPinningCli,

    /// Number of tasks to wait for before cancelling the workers.
    #[arg(long, default_value_t = 1_000)]
    num_tasks: usize,

    /// Maximal sleep of a worker before each task, in milliseconds.
    #[arg(long, default_value_t = 1)]
    max_sleep_ms: u64,

    /// Number of busy-loop iterations of each task.
    #[arg(long, default_value_t = 100_000)]
    busy_iterations: u64,
}

/// Backend of the condition variable.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum BackendCli {
    /// Condition variable of the platform.
    Native,
    /// Condition variable emulated with a semaphore and an event.
    Emulated,
}

/// Policy to pin worker threads to CPUs.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum CpuPinningCli {
    /// Don't pin worker threads.
    No,
    /// Pin worker threads if the platform supports it.
    IfSupported,
    /// Pin worker threads, and fail if the platform doesn't support it.
    Always,
}
