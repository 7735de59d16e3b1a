//! Cost oracle seam
//!
//! Travel costs come from an external path evaluator. A buyer hands it its
//! position, the tasks it already holds and the tasks on offer, and receives
//! candidate bundles with their path costs.

use crate::error::OracleError;
use crate::market::types::{Bundle, Point2D, Task};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRequest {
    pub start: Point2D,
    pub committed: Vec<Task>,
    pub candidates: Vec<Task>,
    /// Maximum number of candidate tasks per bundle.
    pub bundle_size: usize,
    pub max_bundles: usize,
}

pub trait CostOracle: Send + Sync + 'static {
    /// Bundles mixing `committed` with up to `bundle_size` candidates, each
    /// costed as the full path from `start`.
    fn quote(&self, request: &QuoteRequest) -> impl Future<Output = Result<Vec<Bundle>, OracleError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Linear backoff plus up to half a step of random jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let step = self.backoff.as_millis() as u64;
        let jitter = if step > 1 {
            rand::rng().random_range(0..=step / 2)
        } else {
            0
        };
        Duration::from_millis(step * u64::from(attempt) + jitter)
    }
}

/// Queries `oracle`, retrying busy, failed and timed-out calls.
pub async fn quote_with_retry<O: CostOracle>(
    oracle: &O,
    request: &QuoteRequest,
    policy: &RetryPolicy,
) -> Result<Vec<Bundle>, OracleError> {
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(policy.timeout, oracle.quote(request)).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(policy.timeout.as_millis() as u64)),
        };

        match result {
            Ok(bundles) => return Ok(bundles),
            Err(e) if attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay(attempt);
                debug!("oracle attempt {} failed ({}), retrying in {:?}", attempt, e, delay);
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!("oracle gave up after {} attempt(s): {}", attempt + 1, e);
                return Err(e);
            }
        }
    }
}
