// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod support;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use keydispatch::{Distributor, Error, ThreadPoolExecutor};
use support::execute_or_abandon;

fn distributor(max_tasks_per_cycle: usize) -> Distributor<&'static str> {
    Distributor::new(Arc::new(ThreadPoolExecutor::new(8)), 16, max_tasks_per_cycle)
        .expect("valid configuration")
}

#[test]
fn s1_per_key_serialization() {
    execute_or_abandon(move || {
        let dist = distributor(64);
        let active = Arc::new(AtomicUsize::new(0));
        let max_observed = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let start = Instant::now();
        let mut futures = Vec::new();
        for i in 0..100 {
            let active = Arc::clone(&active);
            let max_observed = Arc::clone(&max_observed);
            let order = Arc::clone(&order);
            let future = dist
                .submit("A", move || {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_observed.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                    order.lock().unwrap().push(i);
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, keydispatch::BoxError>(i)
                })
                .expect("scheduled");
            futures.push(future);
        }
        for future in &futures {
            future.get().expect("task succeeded");
        }
        let elapsed = start.elapsed();

        assert_eq!(max_observed.load(Ordering::SeqCst), 1, "only one task for key A ever ran at a time");
        assert!(elapsed >= Duration::from_millis(1000), "100 serialized 10ms tasks take at least 1s, took {elapsed:?}");
        assert_eq!(*order.lock().unwrap(), (0..100).collect::<Vec<_>>(), "tasks ran in submission order");
    })
    .expect("scenario completed within the bounded wait");
}

#[test]
fn s2_cross_key_parallelism() {
    execute_or_abandon(move || {
        let dist = distributor(64);
        let start = Instant::now();
        let mut futures = Vec::new();
        let keys: Vec<&'static str> = vec!["k0", "k1", "k2", "k3", "k4", "k5", "k6", "k7"];
        for key in keys {
            for _ in 0..10 {
                let future = dist
                    .submit(key, || {
                        thread::sleep(Duration::from_millis(10));
                        Ok::<_, keydispatch::BoxError>(())
                    })
                    .expect("scheduled");
                futures.push(future);
            }
        }
        for future in &futures {
            future.get().expect("task succeeded");
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100), "elapsed {elapsed:?} too fast to be real work");
        assert!(elapsed <= Duration::from_millis(500), "elapsed {elapsed:?} suggests keys serialized against each other");
    })
    .expect("scenario completed within the bounded wait");
}

#[test]
fn s3_fairness_yield() {
    execute_or_abandon(move || {
        // A single backend thread so "hot" and "cold" are forced to share it; without yielding at
        // a cycle boundary, "cold" would sit behind every "hot" task in the thread pool's queue.
        let dist: Distributor<&str> =
            Distributor::new(Arc::new(ThreadPoolExecutor::new(1)), 16, 2).expect("valid configuration");
        let cold_done_before_last_hot = Arc::new(AtomicBool::new(false));
        let hot_completed = Arc::new(AtomicUsize::new(0));

        let mut hot_futures = Vec::new();
        for _ in 0..10 {
            let hot_completed = Arc::clone(&hot_completed);
            let future = dist
                .submit("hot", move || {
                    thread::sleep(Duration::from_millis(5));
                    hot_completed.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, keydispatch::BoxError>(())
                })
                .expect("scheduled");
            hot_futures.push(future);
        }

        let cold_done_before_last_hot_flag = Arc::clone(&cold_done_before_last_hot);
        let hot_completed_for_cold = Arc::clone(&hot_completed);
        let cold_future = dist
            .submit("cold", move || {
                if hot_completed_for_cold.load(Ordering::SeqCst) < 10 {
                    cold_done_before_last_hot_flag.store(true, Ordering::SeqCst);
                }
                Ok::<_, keydispatch::BoxError>(())
            })
            .expect("scheduled");

        cold_future.get().expect("cold task succeeded");
        for future in &hot_futures {
            future.get().expect("hot task succeeded");
        }

        assert!(
            cold_done_before_last_hot.load(Ordering::SeqCst),
            "cold task should interleave at a yield boundary before all 10 hot tasks finish"
        );
    })
    .expect("scenario completed within the bounded wait");
}

#[test]
fn s4_future_success_round_trip() {
    execute_or_abandon(move || {
        let dist = distributor(16);
        let future = dist.submit("key", || Ok::<_, keydispatch::BoxError>(42)).expect("scheduled");
        assert_eq!(future.get().expect("task succeeded"), 42);
        assert!(future.is_done());
        assert!(!future.is_cancelled());
    })
    .expect("scenario completed within the bounded wait");
}

#[test]
fn s5_future_failure() {
    execute_or_abandon(move || {
        let dist = distributor(16);
        let future = dist
            .submit("key", || Err(Box::<dyn std::error::Error + Send + Sync>::from("bad input")))
            .expect("scheduled");
        let error = future.get().expect_err("task failed");
        assert!(matches!(error, Error::ExecutionFailed(_)));
        assert!(error.to_string().contains("bad input"));
        assert!(future.is_done());
    })
    .expect("scenario completed within the bounded wait");
}

#[test]
fn s6_cancel_before_start() {
    execute_or_abandon(move || {
        let dist = distributor(16);
        let ran = Arc::new(AtomicBool::new(false));

        let busy_future = dist
            .submit("key", || {
                thread::sleep(Duration::from_millis(500));
                Ok::<_, keydispatch::BoxError>(())
            })
            .expect("scheduled");

        let ran_clone = Arc::clone(&ran);
        let future = dist
            .submit("key", move || {
                ran_clone.store(true, Ordering::SeqCst);
                Ok::<_, keydispatch::BoxError>(())
            })
            .expect("scheduled");

        assert!(future.cancel(false), "task had not started yet");
        assert!(matches!(future.get(), Err(Error::Canceled)));
        assert!(!ran.load(Ordering::SeqCst), "canceled task body must never execute");

        busy_future.get().expect("busy task eventually completes");
    })
    .expect("scenario completed within the bounded wait");
}

#[test]
fn s7_cancel_after_start() {
    execute_or_abandon(move || {
        let dist = distributor(16);
        let future = dist
            .submit("key", || {
                thread::sleep(Duration::from_millis(500));
                Ok::<_, keydispatch::BoxError>(7)
            })
            .expect("scheduled");

        thread::sleep(Duration::from_millis(100));
        assert!(!future.cancel(false), "task had already started");
        assert!(matches!(future.get(), Err(Error::Canceled)));

        // `get()` returns as soon as `canceled` is observed, without waiting for the task to
        // actually finish; poll until the 500ms task really settles before checking `is_done()`.
        let deadline = Instant::now() + Duration::from_secs(2);
        while !future.is_done() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(future.is_done(), "future settles once the task actually finishes");
    })
    .expect("scenario completed within the bounded wait");
}

#[test]
fn s8_listener_after_settle() {
    execute_or_abandon(move || {
        let dist = distributor(16);
        let future = dist.submit("key", || Ok::<_, keydispatch::BoxError>(1)).expect("scheduled");
        future.get().expect("settled");

        let fire_count = Arc::new(AtomicUsize::new(0));
        let fire_count_clone = Arc::clone(&fire_count);
        future.add_listener(move || {
            fire_count_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fire_count.load(Ordering::SeqCst), 1, "listener runs exactly once, synchronously");
    })
    .expect("scenario completed within the bounded wait");
}

#[test]
fn s9_get_with_timeout() {
    execute_or_abandon(move || {
        let dist = distributor(16);
        let future = dist
            .submit("key", || {
                thread::sleep(Duration::from_millis(1000));
                Ok::<_, keydispatch::BoxError>(99)
            })
            .expect("scheduled");

        let start = Instant::now();
        let result = future.get_timeout(Duration::from_millis(50));
        assert!(matches!(result, Err(Error::Timeout)));
        assert!(start.elapsed() >= Duration::from_millis(50));

        assert_eq!(future.get().expect("task eventually completes"), 99);
    })
    .expect("scenario completed within the bounded wait");
}
