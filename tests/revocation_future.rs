#![cfg(feature = "future")]

use relazy::{future::LazyCache, Tracked};

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

/// The async twin of the synchronous expensive-operation scenario: the
/// initializer awaits instead of blocking, and revocation still comes from a
/// tracked input.
struct ExpensiveOperation {
    sleep_ms: Tracked<u64>,
    result: LazyCache<u64>,
}

impl ExpensiveOperation {
    fn new(sleep_ms: u64) -> Self {
        let sleep_ms = Tracked::new(sleep_ms);
        let result = LazyCache::new(
            {
                let sleep_ms = sleep_ms.clone();
                move || {
                    let sleep_ms = sleep_ms.clone();
                    async move {
                        let ms = sleep_ms.get();
                        tokio::time::sleep(Duration::from_millis(ms)).await;
                        sleep_ms.flag().clear();
                        ms
                    }
                }
            },
            sleep_ms.flag().predicate(),
        );
        Self { sleep_ms, result }
    }

    fn set_sleep_ms(&self, ms: u64) {
        self.sleep_ms.set(ms);
    }

    async fn result(&self) -> u64 {
        self.result.value().await
    }
}

#[tokio::test]
async fn expensive_operation_is_cached_until_input_changes() {
    let first_sleep_ms = 1500;
    let second_sleep_ms = 1000;

    let operation = ExpensiveOperation::new(first_sleep_ms);

    let start = Instant::now();
    assert_eq!(operation.result().await, first_sleep_ms);
    assert!(start.elapsed() >= Duration::from_millis(first_sleep_ms));

    // Cache hit: far cheaper than the computation.
    let start = Instant::now();
    assert_eq!(operation.result().await, first_sleep_ms);
    assert!(start.elapsed() < Duration::from_millis(first_sleep_ms));

    operation.set_sleep_ms(second_sleep_ms);

    let start = Instant::now();
    assert_eq!(operation.result().await, second_sleep_ms);
    assert!(start.elapsed() >= Duration::from_millis(second_sleep_ms));

    let start = Instant::now();
    assert_eq!(operation.result().await, second_sleep_ms);
    assert!(start.elapsed() < Duration::from_millis(second_sleep_ms));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_readers_pay_for_one_computation() {
    let num_tasks: u32 = 8;
    let sleep_ms = 500;

    let operation = Arc::new(ExpensiveOperation::new(sleep_ms));

    let start = Instant::now();
    let tasks = (0..num_tasks)
        .map(|_| {
            let operation = Arc::clone(&operation);
            tokio::spawn(async move { operation.result().await })
        })
        .collect::<Vec<_>>();

    for task in tasks {
        assert_eq!(task.await.expect("Failed"), sleep_ms);
    }

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(sleep_ms));
    assert!(elapsed < Duration::from_millis(sleep_ms * u64::from(num_tasks)));
}

#[tokio::test]
async fn presence_check_forgets_stale_result() {
    let operation = ExpensiveOperation::new(100);

    assert!(!operation.result.is_present().await);
    operation.result().await;
    assert!(operation.result.is_present().await);

    operation.set_sleep_ms(200);
    assert!(!operation.result.is_present().await);

    assert_eq!(operation.result().await, 200);
}
