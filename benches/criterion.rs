// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lockstep::sync::{EmulatedBackend, NativeBackend};

const NUM_THREADS: &[usize] = &[1, 2, 4, 8];
const ROUNDS: &[u32] = &[100, 1_000, 10_000];

fn ping_pong(c: &mut Criterion) {
    let mut group = c.benchmark_group("ping_pong");
    for rounds in ROUNDS {
        group.throughput(Throughput::Elements(2 * *rounds as u64));
        group.bench_with_input(
            BenchmarkId::new("native", rounds),
            rounds,
            condition::ping_pong::<NativeBackend>,
        );
        group.bench_with_input(
            BenchmarkId::new("emulated", rounds),
            rounds,
            condition::ping_pong::<EmulatedBackend>,
        );
    }
    group.finish();
}

fn broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast");
    for &num_threads in NUM_THREADS {
        group.bench_with_input(
            BenchmarkId::new("native", num_threads),
            &num_threads,
            condition::release_waiters::<NativeBackend>,
        );
        group.bench_with_input(
            BenchmarkId::new("emulated", num_threads),
            &num_threads,
            condition::release_waiters::<EmulatedBackend>,
        );
    }
    group.finish();
}

fn pool_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_lifecycle");
    for num_threads in NUM_THREADS {
        group.bench_with_input(
            BenchmarkId::new("start_cancel_join", num_threads),
            num_threads,
            thread_pool::start_cancel_join,
        );
    }
    group.finish();
}

fn timer(c: &mut Criterion) {
    let mut group = c.benchmark_group("timer");
    group.bench_function("wall_clock", timer::wall_clock);
    group.bench_function("cpu_clock", timer::cpu_clock);
    group.finish();
}

/// Benchmarks of the condition variable backends.
mod condition {
    use criterion::Bencher;
    use lockstep::sync::Backend;
    use lockstep::{Condition, Mutex};
    use std::sync::Arc;

    pub fn ping_pong<B: Backend + 'static>(bencher: &mut Bencher, rounds: &u32) {
        let rounds = *rounds;
        bencher.iter(|| {
            let state = Arc::new((Mutex::new(0u32), Condition::<B>::new()));
            let pong = std::thread::spawn({
                let state = state.clone();
                move || turns(&state, rounds, 1)
            });
            turns(&state, rounds, 0);
            pong.join().unwrap();
        });
    }

    fn turns<B: Backend>(state: &(Mutex<u32>, Condition<B>), rounds: u32, parity: u32) {
        let (mutex, condition) = state;
        for round in 0..rounds {
            let mut guard = condition
                .wait_while(mutex.lock().unwrap(), |turn| *turn != 2 * round + parity)
                .unwrap();
            *guard += 1;
            condition.broadcast();
        }
    }

    /// Blocks the given number of threads on a condition, then releases all of
    /// them at once.
    pub fn release_waiters<B: Backend + 'static>(bencher: &mut Bencher, num_threads: &usize) {
        let num_threads = *num_threads;
        bencher.iter(|| {
            let state = Arc::new((Mutex::new((false, 0usize)), Condition::<B>::new()));
            let waiters: Vec<_> = (0..num_threads)
                .map(|_| {
                    let state = state.clone();
                    std::thread::spawn(move || {
                        let (mutex, condition) = &*state;
                        let mut guard = mutex.lock().unwrap();
                        guard.1 += 1;
                        condition.broadcast();
                        drop(condition.wait_while(guard, |(go, _)| !*go).unwrap());
                    })
                })
                .collect();

            let (mutex, condition) = &*state;
            let mut guard = condition
                .wait_while(mutex.lock().unwrap(), |(_, ready)| *ready < num_threads)
                .unwrap();
            guard.0 = true;
            condition.broadcast();
            drop(guard);
            for waiter in waiters {
                waiter.join().unwrap();
            }
        });
    }
}

/// Benchmarks of the thread pool lifecycle.
mod thread_pool {
    use criterion::Bencher;
    use lockstep::{
        CancellationToken, Completion, CpuPinningPolicy, ThreadPool, WorkerThreadBuilder,
    };

    pub fn start_cancel_join(bencher: &mut Bencher, num_threads: &usize) {
        bencher.iter(|| {
            let workers: Vec<_> = (0..*num_threads)
                .map(|id| {
                    WorkerThreadBuilder {
                        id,
                        cpu_pinning: CpuPinningPolicy::No,
                    }
                    .build(|completion: Completion, token: CancellationToken| {
                        completion.broadcast();
                        while !token.is_cancelled() {
                            std::thread::yield_now();
                        }
                    })
                })
                .collect();

            let mut pool = ThreadPool::new();
            for worker in &workers {
                pool.add_worker(worker);
            }
            pool.start(&pool.completion()).unwrap();
            pool.cancel().unwrap();
            pool.join().unwrap();
        });
    }
}

/// Benchmarks of the timer readings.
mod timer {
    use criterion::{black_box, Bencher};
    use lockstep::Timer;

    pub fn wall_clock(bencher: &mut Bencher) {
        let timer = Timer::new();
        bencher.iter(|| black_box(&timer).microseconds());
    }

    pub fn cpu_clock(bencher: &mut Bencher) {
        let timer = Timer::new();
        bencher.iter(|| black_box(&timer).microseconds_cpu());
    }
}

criterion_group!(benches, ping_pong, broadcast, pool_lifecycle, timer);
criterion_main!(benches);
