//! Bounded exponential backoff for transient service failures.
//!
//! Only network-level failures (timeouts, throttling, 5xx) are retried;
//! logical errors never are.

use std::time::Duration;

use ctxr_core::error::{Error, Result};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
        }
    }
}

/// A single service call outcome: transient failures are retried up to
/// the policy bound, fatal ones propagate immediately.
pub enum CallError {
    Transient(String),
    Fatal(Error),
}

/// Run `op` under `policy`. `wrap` converts the last transient failure
/// message into the caller's typed error once retries are exhausted.
pub fn with_retries<T>(
    policy: &RetryPolicy,
    wrap: impl Fn(String) -> Error,
    mut op: impl FnMut() -> std::result::Result<T, CallError>,
) -> Result<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(CallError::Fatal(e)) => return Err(e),
            Err(CallError::Transient(reason)) => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(wrap(format!(
                        "{reason} (gave up after {attempt} attempts)"
                    )));
                }
                let delay = policy.base_delay_ms << (attempt - 1);
                warn!(attempt, delay_ms = delay, %reason, "transient failure, backing off");
                std::thread::sleep(Duration::from_millis(delay));
            }
        }
    }
}
