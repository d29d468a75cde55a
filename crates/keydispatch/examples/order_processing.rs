// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Demonstrates per-key ordering: events for the same order must apply in submission order, while
//! unrelated orders process concurrently.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use keydispatch::{Distributor, ThreadPoolExecutor};

fn main() {
    let distributor: Distributor<u64> =
        Distributor::new(Arc::new(ThreadPoolExecutor::new(4)), 32, 32).expect("valid configuration");

    let ledger: Arc<Mutex<Vec<(u64, &'static str)>>> = Arc::new(Mutex::new(Vec::new()));
    let applied = Arc::new(AtomicUsize::new(0));

    let events: [(u64, &'static str); 6] = [
        (1, "created"),
        (2, "created"),
        (1, "paid"),
        (2, "paid"),
        (1, "shipped"),
        (2, "shipped"),
    ];

    let mut futures = Vec::new();
    for (order_id, event) in events {
        let ledger = Arc::clone(&ledger);
        let applied = Arc::clone(&applied);
        let future = distributor
            .submit(order_id, move || {
                std::thread::sleep(Duration::from_millis(5));
                ledger.lock().expect("ledger mutex not poisoned").push((order_id, event));
                applied.fetch_add(1, Ordering::SeqCst);
                Ok::<_, keydispatch::BoxError>(())
            })
            .expect("scheduled");
        futures.push(future);
    }

    for future in futures {
        future.get().expect("event applied");
    }

    let history = ledger.lock().expect("ledger mutex not poisoned");
    println!("applied {} events", applied.load(Ordering::SeqCst));
    for order_id in [1u64, 2] {
        let sequence: Vec<_> = history.iter().filter(|(id, _)| *id == order_id).map(|(_, event)| *event).collect();
        println!("order {order_id}: {sequence:?}");
        assert_eq!(sequence, vec!["created", "paid", "shipped"]);
    }
}
