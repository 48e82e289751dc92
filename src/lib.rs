// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![doc = include_str!("../README.md")]
#![forbid(missing_docs, unsafe_code)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod macros;
pub mod sync;
mod thread_pool;
mod timer;
mod worker;

pub use sync::{Condition, Mutex, MutexGuard};
pub use thread_pool::{Completion, PoolState, ThreadPool, Worker, WorkerError};
pub use timer::{CpuClock, Timer};
pub use worker::{
    CancellationToken, CpuPinningPolicy, WorkerThread, WorkerThreadBuilder, WorkerThreadError,
};

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    macro_rules! expand_tests {
        ( $backend:ty, ) => {};
        ( $backend:ty, $case:ident, $( $others:tt )* ) => {
            #[test]
            fn $case() {
                $crate::test::$case::<$backend>();
            }

            expand_tests!($backend, $($others)*);
        };
    }

    macro_rules! backend_tests {
        ( $mod:ident, $backend:ty, $( $tests:tt )* ) => {
            mod $mod {
                expand_tests!($backend, $($tests)*);
            }
        };
    }

    macro_rules! all_backend_tests {
        ( $mod:ident, $backend:ty ) => {
            backend_tests!(
                $mod,
                $backend,
                test_ping_pong,
                test_pool_with_shared_condition,
            );
        };
    }

    all_backend_tests!(native, crate::sync::NativeBackend);
    all_backend_tests!(emulated, crate::sync::EmulatedBackend);

    /// Two threads taking turns on a shared counter, each waiting for the other
    /// to hand over.
    fn test_ping_pong<B: sync::Backend + 'static>() {
        const ROUNDS: u32 = 1000;

        let state = Arc::new((Mutex::new(0u32), Condition::<B>::new()));
        let pong = std::thread::spawn({
            let state = state.clone();
            move || {
                let (mutex, condition) = &*state;
                for round in 0..ROUNDS {
                    let mut guard = condition
                        .wait_while(mutex.lock().unwrap(), |turn| *turn != 2 * round + 1)
                        .unwrap();
                    *guard += 1;
                    condition.broadcast();
                }
            }
        });

        let (mutex, condition) = &*state;
        for round in 0..ROUNDS {
            let mut guard = condition
                .wait_while(mutex.lock().unwrap(), |turn| *turn != 2 * round)
                .unwrap();
            *guard += 1;
            condition.broadcast();
        }
        pong.join().unwrap();
        assert_eq!(*mutex.lock().unwrap(), 2 * ROUNDS);
    }

    /// Worker threads report progress through a condition of the given backend,
    /// while the main thread waits for all of them and measures the elapsed
    /// time.
    fn test_pool_with_shared_condition<B: sync::Backend + 'static>() {
        const NUM_WORKERS: usize = 4;

        let progress = Arc::new((Mutex::new(0usize), Condition::<B>::new()));
        let workers: Vec<_> = (0..NUM_WORKERS)
            .map(|id| {
                WorkerThreadBuilder {
                    id,
                    cpu_pinning: CpuPinningPolicy::No,
                }
                .build(
                    |progress: Arc<(Mutex<usize>, Condition<B>)>, token: CancellationToken| {
                        std::thread::sleep(Duration::from_millis(10));
                        let (mutex, condition) = &*progress;
                        *mutex.lock().unwrap() += 1;
                        condition.broadcast();

                        while !token.is_cancelled() {
                            std::thread::sleep(Duration::from_millis(1));
                        }
                    },
                )
            })
            .collect();

        let mut pool = ThreadPool::new();
        for worker in &workers {
            pool.add_worker(worker);
        }

        let timer = Timer::new();
        pool.start(&progress).unwrap();
        {
            let (mutex, condition) = &*progress;
            let guard = condition
                .wait_while(mutex.lock().unwrap(), |done| *done < NUM_WORKERS)
                .unwrap();
            assert_eq!(*guard, NUM_WORKERS);
        }
        assert!(timer.milliseconds() >= 10);

        pool.cancel().unwrap();
        pool.join().unwrap();
        assert_eq!(pool.state(), PoolState::Stopped);
    }
}
