//! Prediction of the next outcome from the recent history window.
//!
//! Defines the `Predictor` trait and the `PredictorGateway` that the
//! session talks to. Backends may fail; the gateway never does. Any
//! backend error or timeout is absorbed into the deterministic
//! `FallbackPredictor`.

pub mod fallback;
pub mod local;
pub mod openrouter;

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use crate::engine::buffer::HistoryWindow;
use crate::types::{Prediction, PredictionSource, SessionError};
use crate::wheel;
use fallback::FallbackPredictor;

/// Confidence reported for a guess made with no history at all.
pub const RANDOM_GUESS_CONFIDENCE: u8 = 10;

pub const MAX_CONFIDENCE: u8 = 100;

/// Abstraction over next-outcome predictors.
///
/// Implementors receive the history window (most recent first) and return
/// a prediction whose outcome comes from the wheel catalog.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, history: &HistoryWindow) -> Result<Prediction>;
}

/// Single-flight front door to a primary predictor with automatic fallback.
pub struct PredictorGateway {
    primary: Box<dyn Predictor>,
    fallback: FallbackPredictor,
    timeout: Duration,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the request finishes, however it finishes.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PredictorGateway {
    pub fn new(primary: Box<dyn Predictor>, timeout: Duration) -> Self {
        Self {
            primary,
            fallback: FallbackPredictor,
            timeout,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Whether a request is outstanding right now.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claim the single request slot without running anything yet.
    pub fn reserve(&self) -> Result<Reservation<'_>, SessionError> {
        let guard = InFlight::acquire(&self.in_flight).ok_or(SessionError::Busy)?;
        Ok(Reservation {
            gateway: self,
            _guard: guard,
        })
    }

    /// Predict the next outcome.
    ///
    /// Only `SessionError::Busy` can come back, when another call is still
    /// outstanding. Backend failures turn into a fallback prediction.
    pub async fn predict(&self, history: &HistoryWindow) -> Result<Prediction, SessionError> {
        Ok(self.reserve()?.predict(history).await)
    }

    async fn run(&self, history: &HistoryWindow) -> Prediction {
        if history.is_empty() {
            let guess = random_guess();
            info!(prediction = %guess, "Empty history, random guess");
            return guess;
        }

        let prediction = match tokio::time::timeout(self.timeout, self.primary.predict(history)).await
        {
            Ok(Ok(p)) => onto_wheel(p),
            Ok(Err(e)) => {
                warn!(error = %e, "Predictor failed, using local fallback");
                self.fallback.fallback_for(history)
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Predictor timed out, using local fallback"
                );
                self.fallback.fallback_for(history)
            }
        };

        info!(
            prediction = %prediction,
            history_len = history.len(),
            "Prediction ready"
        );
        prediction
    }
}

/// A held gateway slot. Every other caller sees `Busy` until it is used
/// or dropped.
pub struct Reservation<'a> {
    gateway: &'a PredictorGateway,
    _guard: InFlight<'a>,
}

impl Reservation<'_> {
    /// Run the gateway over `history`, releasing the slot when done.
    pub async fn predict(self, history: &HistoryWindow) -> Prediction {
        self.gateway.run(history).await
    }
}

/// Re-read a backend answer from the catalog, pinning the value to the
/// wheel and the confidence to 0..=100.
fn onto_wheel(prediction: Prediction) -> Prediction {
    let value = prediction.outcome.value.min(wheel::MAX_VALUE);
    Prediction {
        outcome: wheel::CATALOG[usize::from(value)],
        confidence: prediction.confidence.min(MAX_CONFIDENCE),
        source: prediction.source,
    }
}

/// Uniform pick over the whole wheel at the lowest confidence band.
fn random_guess() -> Prediction {
    let value = rand::thread_rng().gen_range(0..wheel::POCKETS);
    Prediction {
        outcome: wheel::CATALOG[value],
        confidence: RANDOM_GUESS_CONFIDENCE,
        source: PredictionSource::RandomGuess,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
