// system-tests/src/bounded.rs
// ============================================================================
// Module: Bounded Test Bodies
// Description: Per-test time limit for suite bodies.
// Purpose: Fail a hung conformance test instead of waiting on the runner.
// Dependencies: tokio
// ============================================================================

//! ## Overview
//! The runner exports `NETCONF_TEST_TIMEOUT_SEC` and every suite runs its
//! body through [`within`] with that limit. The body is dropped when the
//! limit passes, so the caller's cleanup and teardown still run.

use std::future::Future;
use std::time::Duration;

/// Runs `body` for at most `limit`.
///
/// # Errors
///
/// Returns the body's error, or a timeout message once `limit` passes.
pub async fn within<T, F>(limit: Duration, body: F) -> Result<T, String>
where
    F: Future<Output = Result<T, String>>,
{
    tokio::time::timeout(limit, body).await.unwrap_or_else(|_| {
        Err(format!("test did not finish within the {} ms suite timeout", limit.as_millis()))
    })
}
