use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gust_runner::prelude::{EnvironmentName, TargetGuard, TargetKey};
use url::Url;

fn key(target: &str, environment: EnvironmentName) -> TargetKey {
    TargetKey::new(&Url::parse(target).expect("valid URL"), environment)
}

#[tokio::test]
async fn second_run_waits_for_the_first_to_finish() {
    let guard = Arc::new(TargetGuard::new());
    let first_finished = Arc::new(AtomicBool::new(false));

    let first = {
        let guard = guard.clone();
        let first_finished = first_finished.clone();
        tokio::spawn(async move {
            let permit = guard
                .acquire(key("http://test-app:3000", EnvironmentName::NonProd))
                .await;
            tokio::time::sleep(Duration::from_millis(100)).await;
            first_finished.store(true, Ordering::SeqCst);
            drop(permit);
        })
    };

    // Give the first task time to take the slot.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let second = {
        let guard = guard.clone();
        let first_finished = first_finished.clone();
        tokio::spawn(async move {
            let _permit = guard
                .acquire(key("http://test-app:3000", EnvironmentName::NonProd))
                .await;
            // By the time the slot is ours, the first run must be terminal.
            assert!(first_finished.load(Ordering::SeqCst));
        })
    };

    first.await.expect("first task panicked");
    second.await.expect("second task panicked");
}

#[tokio::test]
async fn distinct_targets_run_concurrently() {
    let guard = TargetGuard::new();

    let a = guard
        .acquire(key("http://test-app:3000", EnvironmentName::NonProd))
        .await;
    // A different target must not queue behind the first one; a timeout here
    // means the guard serialised unrelated runs.
    let b = tokio::time::timeout(
        Duration::from_millis(100),
        guard.acquire(key("http://other-app:3000", EnvironmentName::NonProd)),
    )
    .await
    .expect("unrelated target was blocked");

    drop(a);
    drop(b);
}

#[tokio::test]
async fn same_target_in_another_environment_is_a_different_slot() {
    let guard = TargetGuard::new();

    let non_prod = guard
        .acquire(key("http://test-app:3000", EnvironmentName::NonProd))
        .await;
    let prod = tokio::time::timeout(
        Duration::from_millis(100),
        guard.acquire(key("http://test-app:3000", EnvironmentName::Prod)),
    )
    .await
    .expect("other environment was blocked");

    drop(non_prod);
    drop(prod);
}

#[test]
fn trailing_slash_does_not_split_the_slot() {
    assert_eq!(
        key("http://test-app:3000/api/", EnvironmentName::NonProd),
        key("http://test-app:3000/api", EnvironmentName::NonProd)
    );
}
