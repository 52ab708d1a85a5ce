//! Deterministic local fallback.
//!
//! Used by the gateway whenever the primary predictor errors or times
//! out. Pure arithmetic on the most recent outcome, so it cannot fail.

use anyhow::Result;
use async_trait::async_trait;

use super::Predictor;
use crate::engine::buffer::HistoryWindow;
use crate::types::{Prediction, PredictionSource};
use crate::wheel;

/// Confidence reported for every fallback prediction.
pub const FALLBACK_CONFIDENCE: u8 = 25;

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackPredictor;

impl FallbackPredictor {
    /// `(3 × latest + 7) mod 37`. An empty window counts as a latest of 0.
    pub fn fallback_for(&self, history: &HistoryWindow) -> Prediction {
        let latest = history.latest().map(|o| o.value as usize).unwrap_or(0);
        let value = (latest * 3 + 7) % wheel::POCKETS;
        Prediction {
            outcome: wheel::CATALOG[value],
            confidence: FALLBACK_CONFIDENCE,
            source: PredictionSource::Fallback,
        }
    }
}

#[async_trait]
impl Predictor for FallbackPredictor {
    async fn predict(&self, history: &HistoryWindow) -> Result<Prediction> {
        Ok(self.fallback_for(history))
    }
}
