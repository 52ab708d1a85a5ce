//! Scripted predictor for integration testing.
//!
//! Provides a deterministic `Predictor` that replays queued answers,
//! records every window it was shown, and can be forced to fail, all
//! in-memory with no external dependencies.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use roulette_tracker::config::SessionConfig;
use roulette_tracker::engine::buffer::HistoryWindow;
use roulette_tracker::predictor::Predictor;
use roulette_tracker::types::*;
use roulette_tracker::wheel;

#[derive(Clone, Default)]
pub struct ScriptedPredictor {
    answers: Arc<Mutex<VecDeque<u8>>>,
    seen: Arc<Mutex<Vec<Vec<Outcome>>>>,
    /// If set, every call fails with this message.
    force_error: Arc<Mutex<Option<String>>>,
}

impl ScriptedPredictor {
    pub fn new(answers: &[u8]) -> Self {
        Self {
            answers: Arc::new(Mutex::new(answers.iter().copied().collect())),
            ..Self::default()
        }
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    /// Every history window passed to `predict`, oldest call first.
    pub fn seen(&self) -> Vec<Vec<Outcome>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Predictor for ScriptedPredictor {
    async fn predict(&self, history: &HistoryWindow) -> Result<Prediction> {
        self.seen.lock().unwrap().push(history.to_vec());

        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            return Err(anyhow!(msg));
        }

        let value = self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("script exhausted"))?;

        Ok(Prediction {
            outcome: wheel::lookup(value)?,
            confidence: 90,
            source: PredictionSource::Remote,
        })
    }
}

pub const INITIAL_BANKROLL: Decimal = dec!(1000);
pub const BASE_STAKE: Decimal = dec!(10);

pub fn session_config(policy: BufferPolicy) -> SessionConfig {
    SessionConfig {
        initial_bankroll: INITIAL_BANKROLL,
        base_stake: BASE_STAKE,
        progression_enabled: true,
        bet_mode: BetMode::Number,
        buffer_policy: policy,
        ..SessionConfig::default()
    }
}
