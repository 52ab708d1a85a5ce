//! Local predictor: random pick with an optimistic confidence.
//!
//! Runs without any network access. The optional delay simulates a
//! remote round-trip so the session spends visible time in `Loading`.

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::debug;

use super::Predictor;
use crate::engine::buffer::HistoryWindow;
use crate::types::{Prediction, PredictionSource};
use crate::wheel;

/// Advertised confidence band, inclusive.
pub const CONFIDENCE_RANGE: std::ops::RangeInclusive<u8> = 65..=95;

#[derive(Debug, Clone, Default)]
pub struct LocalPredictor {
    delay: Duration,
}

impl LocalPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }

    fn pick() -> Prediction {
        let mut rng = rand::thread_rng();
        Prediction {
            outcome: wheel::CATALOG[rng.gen_range(0..wheel::POCKETS)],
            confidence: rng.gen_range(CONFIDENCE_RANGE),
            source: PredictionSource::Local,
        }
    }
}

#[async_trait]
impl Predictor for LocalPredictor {
    async fn predict(&self, history: &HistoryWindow) -> Result<Prediction> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let prediction = Self::pick();
        debug!(history_len = history.len(), %prediction, "Local pick");
        Ok(prediction)
    }
}
