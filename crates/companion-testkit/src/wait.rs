//! Polling helpers for asynchronous assertions.

use std::future::Future;
use std::time::Duration;

use crate::fixtures::WAIT_TIMEOUT;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Poll `condition` until it holds, panicking after [`WAIT_TIMEOUT`].
pub async fn wait_until<F>(condition: F)
where
    F: FnMut() -> bool,
{
    wait_until_within(WAIT_TIMEOUT, condition).await;
}

/// Poll `condition` until it holds, panicking after `timeout`.
pub async fn wait_until_within<F>(timeout: Duration, mut condition: F)
where
    F: FnMut() -> bool,
{
    let polled = tokio::time::timeout(timeout, async {
        while !condition() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "condition not met within {timeout:?}");
}

/// Let spawned tasks make progress without advancing the clock.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Drive `future` to completion, panicking after [`WAIT_TIMEOUT`].
pub async fn within_timeout<Fut: Future>(future: Fut) -> Fut::Output {
    match tokio::time::timeout(WAIT_TIMEOUT, future).await {
        Ok(output) => output,
        Err(_) => panic!("future did not complete within {WAIT_TIMEOUT:?}"),
    }
}
