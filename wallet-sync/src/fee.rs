//! Fee rate oracle.
//!
//! Fee estimation is delegated to an external [`FeeEstimator`].
//! [`CachedFeeEstimator`] keeps the latest answer for a while so repeated
//! sends do not hit the oracle every time.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use wallet_ledger::FeeRate;

use crate::error::ProviderResult;

/// Fee rates for different confirmation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub fastest: FeeRate,
    pub half_hour: FeeRate,
    pub hour: FeeRate,
    pub economy: FeeRate,
    pub minimum: FeeRate,
}

#[async_trait]
pub trait FeeEstimator: Send + Sync {
    async fn estimate(&self) -> ProviderResult<FeeEstimate>;
}

#[derive(Debug)]
pub struct CachedFeeEstimator<E> {
    inner: E,
    ttl: Duration,
    cached: Mutex<Option<(Instant, FeeEstimate)>>,
}

impl<E: FeeEstimator> CachedFeeEstimator<E> {
    pub fn new(inner: E, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// Drop the cached estimate.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}

#[async_trait]
impl<E: FeeEstimator> FeeEstimator for CachedFeeEstimator<E> {
    async fn estimate(&self) -> ProviderResult<FeeEstimate> {
        let mut cached = self.cached.lock().await;
        if let Some((fetched_at, estimate)) = *cached {
            if fetched_at.elapsed() < self.ttl {
                return Ok(estimate);
            }
        }
        let estimate = self.inner.estimate().await?;
        tracing::debug!("Fetched fee estimate, fastest {}", estimate.fastest);
        *cached = Some((Instant::now(), estimate));
        Ok(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockFeeEstimator;

    #[tokio::test(start_paused = true)]
    async fn test_cache_expires_after_ttl() {
        let inner = MockFeeEstimator::new(FeeRate::new(10));
        let calls = inner.calls();
        let cached = CachedFeeEstimator::new(inner, Duration::from_secs(60));

        cached.estimate().await.unwrap();
        cached.estimate().await.unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        cached.estimate().await.unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);

        cached.invalidate().await;
        cached.estimate().await.unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
