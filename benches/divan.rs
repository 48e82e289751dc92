// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

fn main() {
    divan::main();
}

const NUM_THREADS: &[usize] = &[1, 2, 4, 8];
const ROUNDS: &[u32] = &[100, 1_000];

/// Benchmarks of the condition variable backends.
mod condition {
    use super::{NUM_THREADS, ROUNDS};
    use divan::counter::ItemsCount;
    use divan::Bencher;
    use lockstep::sync::{Backend, EmulatedBackend, NativeBackend};
    use lockstep::{Condition, Mutex};
    use std::sync::Arc;

    /// Two threads taking turns, each one broadcasting to hand over to the
    /// other.
    fn ping_pong<B: Backend + 'static>(bencher: Bencher, rounds: u32) {
        bencher
            .counter(ItemsCount::new(2 * rounds))
            .bench_local(|| {
                let state = Arc::new((Mutex::new(0u32), Condition::<B>::new()));
                let pong = std::thread::spawn({
                    let state = state.clone();
                    move || turns(&state, rounds, 1)
                });
                turns(&state, rounds, 0);
                pong.join().unwrap();
            })
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

    /// One thread broadcasting a counter to many waiters, each of which
    /// acknowledges every value.
    fn fan_out<B: Backend + 'static>(bencher: Bencher, num_threads: usize, rounds: u32) {
        bencher
            .counter(ItemsCount::new(rounds as usize * num_threads))
            .bench_local(|| {
                let state = Arc::new((Mutex::new((0u32, 0usize)), Condition::<B>::new()));
                let waiters: Vec<_> = (0..num_threads)
                    .map(|_| {
                        let state = state.clone();
                        std::thread::spawn(move || {
                            let (mutex, condition) = &*state;
                            for round in 1..=rounds {
                                let mut guard = condition
                                    .wait_while(mutex.lock().unwrap(), |(value, _)| {
                                        *value < round
                                    })
                                    .unwrap();
                                guard.1 += 1;
                                condition.broadcast();
                            }
                        })
                    })
                    .collect();

                let (mutex, condition) = &*state;
                for round in 1..=rounds {
                    let mut guard = condition
                        .wait_while(mutex.lock().unwrap(), |(_, acks)| {
                            *acks < (round as usize - 1) * num_threads
                        })
                        .unwrap();
                    guard.0 = round;
                    condition.broadcast();
                }
                drop(
                    condition
                        .wait_while(mutex.lock().unwrap(), |(_, acks)| {
                            *acks < rounds as usize * num_threads
                        })
                        .unwrap(),
                );
                for waiter in waiters {
                    waiter.join().unwrap();
                }
            })
    }

    #[divan::bench(args = ROUNDS)]
    fn ping_pong_native(bencher: Bencher, rounds: u32) {
        ping_pong::<NativeBackend>(bencher, rounds)
    }

    #[divan::bench(args = ROUNDS)]
    fn ping_pong_emulated(bencher: Bencher, rounds: u32) {
        ping_pong::<EmulatedBackend>(bencher, rounds)
    }

    #[divan::bench(consts = NUM_THREADS, args = ROUNDS)]
    fn fan_out_native<const NUM_THREADS: usize>(bencher: Bencher, rounds: u32) {
        fan_out::<NativeBackend>(bencher, NUM_THREADS, rounds)
    }

    #[divan::bench(consts = NUM_THREADS, args = ROUNDS)]
    fn fan_out_emulated<const NUM_THREADS: usize>(bencher: Bencher, rounds: u32) {
        fan_out::<EmulatedBackend>(bencher, NUM_THREADS, rounds)
    }
}

/// Benchmarks of the thread pool lifecycle.
mod thread_pool {
    use super::NUM_THREADS;
    use divan::Bencher;
    use lockstep::{Completion, CpuPinningPolicy, ThreadPool, WorkerThreadBuilder};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Spawns the workers, waits until all of them have reported, and joins
    /// them.
    #[divan::bench(consts = NUM_THREADS)]
    fn start_complete_join<const NUM_THREADS: usize>(bencher: Bencher) {
        bencher.bench_local(|| {
            let remaining = Arc::new(AtomicUsize::new(NUM_THREADS));
            let workers: Vec<_> = (0..NUM_THREADS)
                .map(|id| {
                    let remaining = remaining.clone();
                    WorkerThreadBuilder {
                        id,
                        cpu_pinning: CpuPinningPolicy::No,
                    }
                    .build(move |completion: Completion, _token| {
                        if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                            completion.complete();
                        }
                    })
                })
                .collect();

            let mut pool = ThreadPool::new();
            for worker in &workers {
                pool.add_worker(worker);
            }
            pool.start(&pool.completion()).unwrap();
            pool.wait_for_completion();
            pool.join().unwrap();
        })
    }
}

/// Benchmarks of the timer readings.
mod timer {
    use divan::{black_box, Bencher};
    use lockstep::Timer;

    #[divan::bench]
    fn wall_clock(bencher: Bencher) {
        let timer = Timer::new();
        bencher.bench_local(|| black_box(&timer).microseconds())
    }

    #[divan::bench]
    fn cpu_clock(bencher: Bencher) {
        let timer = Timer::new();
        bencher.bench_local(|| black_box(&timer).microseconds_cpu())
    }

    #[divan::bench]
    fn reset(bencher: Bencher) {
        let mut timer = Timer::new();
        bencher.bench_local(|| black_box(&mut timer).reset())
    }
}
