use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use wallet_ledger::FeeRate;

use crate::error::ProviderResult;
use crate::fee::{FeeEstimate, FeeEstimator};

/// Fee oracle answering `rate` for every target, counting requests.
#[derive(Debug)]
pub struct MockFeeEstimator {
    rate: FeeRate,
    calls: Arc<AtomicUsize>,
}

impl MockFeeEstimator {
    pub fn new(rate: FeeRate) -> Self {
        Self {
            rate,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl FeeEstimator for MockFeeEstimator {
    async fn estimate(&self) -> ProviderResult<FeeEstimate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FeeEstimate {
            fastest: self.rate,
            half_hour: self.rate,
            hour: self.rate,
            economy: self.rate,
            minimum: FeeRate::min(),
        })
    }
}
