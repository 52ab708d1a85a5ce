//! Shared types for the roulette session tracker.
//!
//! These types form the data model used across all modules. The wheel
//! registry, the predictor gateway, and the session engine all depend on
//! them without depending on each other.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Pocket color on a single-zero wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Black,
    Green,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Red => write!(f, "red"),
            Color::Black => write!(f, "black"),
            Color::Green => write!(f, "green"),
        }
    }
}

impl std::str::FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "red" | "r" => Ok(Color::Red),
            "black" | "b" | "n" => Ok(Color::Black),
            "green" | "g" => Ok(Color::Green),
            other => Err(format!("Unknown color: {other}")),
        }
    }
}

/// One spin result. Only ever constructed from the wheel catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outcome {
    pub value: u8,
    pub color: Color,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.value, self.color)
    }
}

/// What the operator typed in: an exact number, or just the color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryInput {
    Value(u8),
    Color(Color),
}

// ---------------------------------------------------------------------------
// Predictions
// ---------------------------------------------------------------------------

/// Which path produced a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    /// External LLM service.
    Remote,
    /// Local random pick with a high advertised confidence.
    Local,
    /// Deterministic arithmetic fallback after a backend failure.
    Fallback,
    /// Uniform guess made because there was no history to work from.
    RandomGuess,
}

impl fmt::Display for PredictionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionSource::Remote => write!(f, "remote"),
            PredictionSource::Local => write!(f, "local"),
            PredictionSource::Fallback => write!(f, "fallback"),
            PredictionSource::RandomGuess => write!(f, "random-guess"),
        }
    }
}

/// A predicted next outcome. Non-authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub outcome: Outcome,
    /// 0..=100
    pub confidence: u8,
    pub source: PredictionSource,
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {}% [{}]",
            self.outcome, self.confidence, self.source
        )
    }
}

// ---------------------------------------------------------------------------
// Betting
// ---------------------------------------------------------------------------

/// Payout mode chosen by the caller when settling a bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetMode {
    /// Straight-up bet on the exact number: pays 35 to 1.
    #[default]
    Number,
    /// Even-money bet on color or parity: pays 1 to 1.
    Color,
}

impl BetMode {
    pub fn payout_multiplier(&self) -> Decimal {
        match self {
            BetMode::Number => Decimal::from(35),
            BetMode::Color => Decimal::ONE,
        }
    }
}

impl fmt::Display for BetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetMode::Number => write!(f, "number"),
            BetMode::Color => write!(f, "color"),
        }
    }
}

impl std::str::FromStr for BetMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "number" | "numbers" => Ok(BetMode::Number),
            "color" | "colors" | "colour" => Ok(BetMode::Color),
            other => Err(format!("Unknown bet mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetOutcome {
    Win,
    Loss,
}

impl fmt::Display for BetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetOutcome::Win => write!(f, "WIN"),
            BetOutcome::Loss => write!(f, "LOSS"),
        }
    }
}

/// Immutable ledger entry for one settled bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetRecord {
    pub timestamp: DateTime<Utc>,
    /// Stake risked, taken before the progression adjusted it.
    pub stake: Decimal,
    pub outcome: BetOutcome,
    pub profit: Decimal,
    /// Running sum of every `profit` up to and including this record.
    pub cumulative_profit: Decimal,
    pub mode: BetMode,
    pub predicted: Outcome,
}

impl fmt::Display for BetRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} stake={} profit={:+} total={:+} ({} on {})",
            self.timestamp.format("%H:%M:%S"),
            self.outcome,
            self.stake,
            self.profit,
            self.cumulative_profit,
            self.mode,
            self.predicted,
        )
    }
}

// ---------------------------------------------------------------------------
// Session policy & lifecycle
// ---------------------------------------------------------------------------

/// How entered outcomes are folded into the history window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferPolicy {
    /// Collect `threshold` entries, merge them, then trigger.
    #[default]
    FixedThreshold,
    /// Merge every entry immediately; trigger once the window holds `threshold`.
    RollingWindow,
}

/// How much state a reset discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetScope {
    /// Drop the buffer and any pending prediction. Money is untouched.
    Cycle,
    /// Back to a fresh, unstarted session.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    NotStarted,
    AwaitingEntries,
    Loading,
    PredictionPending,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::NotStarted => write!(f, "NOT STARTED"),
            SessionPhase::AwaitingEntries => write!(f, "AWAITING ENTRIES"),
            SessionPhase::Loading => write!(f, "LOADING"),
            SessionPhase::PredictionPending => write!(f, "PREDICTION PENDING"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors returned by session commands. None of them mutate state and all
/// are recoverable by the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Busy: a prediction request is already in flight")]
    Busy,

    #[error("No pending prediction to resolve")]
    NoPendingPrediction,

    #[error("Outcome not found: {0} is not on the wheel")]
    NotFound(u8),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    #[error("Overflow: settling this bet exceeds the representable amount range")]
    Overflow,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
