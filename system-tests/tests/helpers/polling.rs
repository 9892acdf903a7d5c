// system-tests/tests/helpers/polling.rs
// ============================================================================
// Module: Polling Helpers
// Description: Bounded polling for state that settles asynchronously.
// Purpose: Wait for device states without unbounded sleeps.
// Dependencies: tokio
// ============================================================================

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Number of probes before giving up.
pub const WAIT_ATTEMPTS: u32 = 10;
/// Pause between probes.
pub const WAIT_INTERVAL: Duration = Duration::from_secs(1);

/// Probes until the value is one of `accepted`; returns the last value seen.
pub async fn wait_for_values<T, F, Fut>(accepted: &[T], mut probe: F) -> Result<T, String>
where
    T: PartialEq,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut attempt = 1;
    loop {
        let value = probe().await?;
        if accepted.contains(&value) || attempt >= WAIT_ATTEMPTS {
            return Ok(value);
        }
        attempt += 1;
        sleep(WAIT_INTERVAL).await;
    }
}
