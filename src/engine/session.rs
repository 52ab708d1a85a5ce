//! Session controller: the state machine behind every operator command.
//!
//! ```text
//! NotStarted --start--> AwaitingEntries --trigger--> Loading
//!     ^                      ^    ^                     |
//!     |                      |    '--resolve / reset--. | prediction
//!     '---- full reset ------'                        PredictionPending
//! ```
//!
//! All state is owned by `Session`. Commands either apply completely or
//! return a `SessionError` without touching anything. The only suspension
//! point is the predictor call, which callers run between a trigger and
//! `complete_prediction`.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::buffer::{BufferState, EntryBuffer, HistoryWindow};
use super::ledger::{LedgerUpdate, SessionStats, StakingLedger};
use crate::config::SessionConfig;
use crate::predictor::PredictorGateway;
use crate::types::{
    BetMode, BetOutcome, BetRecord, BufferPolicy, EntryInput, Outcome, Prediction, ResetScope,
    SessionError, SessionPhase,
};
use crate::wheel;

// ---------------------------------------------------------------------------
// Command results
// ---------------------------------------------------------------------------

/// A prediction cycle that has just begun. The caller runs the predictor
/// over `window` and hands the result back with the same `ticket`.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub ticket: u64,
    pub window: HistoryWindow,
}

#[derive(Debug, Clone)]
pub enum EntryOutcome {
    Buffered { count: usize },
    Triggered(Trigger),
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Read-only view of a session for display and the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    pub table: Option<String>,
    pub bankroll: Decimal,
    pub stake: Decimal,
    pub base_stake: Decimal,
    pub progression_enabled: bool,
    pub bet_mode: BetMode,
    pub buffer_policy: BufferPolicy,
    pub trigger_threshold: usize,
    pub last_bet: Option<BetOutcome>,
    pub prediction: Option<Prediction>,
    pub buffer: Vec<Outcome>,
    pub history: Vec<Outcome>,
    pub ledger: Vec<BetRecord>,
    pub stats: SessionStats,
    pub win_rate: Decimal,
}

impl fmt::Display for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prediction = self
            .prediction
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let last = self
            .last_bet
            .map(|o| o.to_string())
            .unwrap_or_else(|| "none".to_string());
        write!(
            f,
            "{} | table={} | bankroll={} | stake={} ({}, {}) | last={} | prediction={} | buffer={}/{} ({}) | history={} | profit={:+} | W{}/L{} ({:.1}%)",
            self.phase,
            self.table.as_deref().unwrap_or("-"),
            self.bankroll,
            self.stake,
            if self.progression_enabled { "martingale" } else { "flat" },
            self.bet_mode,
            last,
            prediction,
            self.buffer.len(),
            self.trigger_threshold,
            match self.buffer_policy {
                BufferPolicy::FixedThreshold => "fixed",
                BufferPolicy::RollingWindow => "rolling",
            },
            self.history.len(),
            self.stats.total_profit,
            self.stats.bets_won,
            self.stats.bets_lost,
            self.win_rate,
        )
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct Session {
    config: SessionConfig,
    id: Uuid,
    phase: SessionPhase,
    table: Option<String>,
    history: HistoryWindow,
    buffer: EntryBuffer,
    prediction: Option<Prediction>,
    ledger: StakingLedger,
    bet_mode: BetMode,
    /// Incremented per trigger and never reset, so late completions from
    /// an abandoned cycle can be told apart.
    ticket: u64,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: SessionPhase::NotStarted,
            table: None,
            history: HistoryWindow::new(config.history_cap),
            buffer: EntryBuffer::new(config.buffer_policy, config.trigger_threshold),
            prediction: None,
            ledger: StakingLedger::new(&config),
            bet_mode: config.bet_mode,
            ticket: 0,
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn prediction(&self) -> Option<&Prediction> {
        self.prediction.as_ref()
    }

    pub fn history(&self) -> &HistoryWindow {
        &self.history
    }

    pub fn buffered(&self) -> &[Outcome] {
        self.buffer.pending()
    }

    pub fn ledger(&self) -> &StakingLedger {
        &self.ledger
    }

    pub fn bet_mode(&self) -> BetMode {
        self.bet_mode
    }

    fn reject(&self, err: SessionError) -> SessionError {
        warn!(phase = %self.phase, error = %err, "Command rejected");
        err
    }

    // -- Lifecycle -----------------------------------------------------------

    /// Select a table and open the session for entries.
    pub fn start(&mut self, table: &str) -> Result<(), SessionError> {
        if self.phase != SessionPhase::NotStarted {
            return Err(self.reject(SessionError::Rejected("session already started".into())));
        }
        if !self.config.tables.iter().any(|t| t == table) {
            return Err(self.reject(SessionError::UnknownTable(table.to_string())));
        }

        self.table = Some(table.to_string());
        self.phase = SessionPhase::AwaitingEntries;
        info!(session = %self.id, table, "Session started");
        Ok(())
    }

    /// Accept one entered outcome. May begin a prediction cycle.
    pub fn enter(&mut self, input: EntryInput) -> Result<EntryOutcome, SessionError> {
        match self.phase {
            SessionPhase::AwaitingEntries => {}
            SessionPhase::NotStarted => {
                return Err(self.reject(SessionError::Rejected("session not started".into())))
            }
            SessionPhase::Loading => return Err(self.reject(SessionError::Busy)),
            SessionPhase::PredictionPending => {
                return Err(self.reject(SessionError::Rejected(
                    "a prediction is pending; resolve or reset it first".into(),
                )))
            }
        }

        let outcome = wheel::resolve_input(input).map_err(|e| self.reject(e))?;

        match self.buffer.push(outcome, &mut self.history) {
            BufferState::Buffered { count } => Ok(EntryOutcome::Buffered { count }),
            BufferState::Triggered => {
                self.ticket += 1;
                self.phase = SessionPhase::Loading;
                info!(
                    ticket = self.ticket,
                    history_len = self.history.len(),
                    latest = %outcome,
                    "Trigger fired, requesting prediction"
                );
                Ok(EntryOutcome::Triggered(Trigger {
                    ticket: self.ticket,
                    window: self.history.clone(),
                }))
            }
        }
    }

    /// Install the prediction for the cycle identified by `ticket`.
    pub fn complete_prediction(
        &mut self,
        ticket: u64,
        prediction: Prediction,
    ) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Loading || ticket != self.ticket {
            return Err(self.reject(SessionError::Rejected(format!(
                "stale prediction for cycle {ticket} discarded"
            ))));
        }

        self.prediction = Some(prediction);
        self.phase = SessionPhase::PredictionPending;
        info!(ticket, prediction = %prediction, stake = %self.ledger.stake(), "Prediction pending");
        Ok(())
    }

    /// Enter an outcome and, if it fires the trigger, run the gateway to
    /// completion. Returns the new prediction when one was produced.
    pub async fn enter_and_predict(
        &mut self,
        input: EntryInput,
        gateway: &PredictorGateway,
    ) -> Result<Option<Prediction>, SessionError> {
        // The slot is held before the entry is applied, so a busy gateway
        // leaves the buffer and history untouched.
        let slot = gateway.reserve().map_err(|e| self.reject(e))?;

        let trigger = match self.enter(input)? {
            EntryOutcome::Buffered { .. } => return Ok(None),
            EntryOutcome::Triggered(trigger) => trigger,
        };

        let prediction = slot.predict(&trigger.window).await;
        self.complete_prediction(trigger.ticket, prediction)?;
        Ok(Some(prediction))
    }

    /// Settle the pending prediction as won or lost.
    pub fn resolve_bet(&mut self, won: bool) -> Result<LedgerUpdate, SessionError> {
        if self.phase == SessionPhase::Loading {
            return Err(self.reject(SessionError::Busy));
        }
        let prediction = match self.prediction {
            Some(p) => p,
            None => return Err(self.reject(SessionError::NoPendingPrediction)),
        };

        let update = self
            .ledger
            .settle(&prediction, won, self.bet_mode)
            .map_err(|e| self.reject(e))?;
        self.prediction = None;
        self.phase = SessionPhase::AwaitingEntries;
        Ok(update)
    }

    /// Discard state according to `scope`.
    pub fn reset(&mut self, scope: ResetScope) -> Result<(), SessionError> {
        match scope {
            ResetScope::Cycle => {
                match self.phase {
                    SessionPhase::NotStarted => {
                        return Err(
                            self.reject(SessionError::Rejected("session not started".into()))
                        )
                    }
                    SessionPhase::Loading => return Err(self.reject(SessionError::Busy)),
                    SessionPhase::AwaitingEntries | SessionPhase::PredictionPending => {}
                }
                let discarded = self.prediction.take();
                self.buffer.clear();
                self.phase = SessionPhase::AwaitingEntries;
                info!(discarded = ?discarded.map(|p| p.outcome.value), "Cycle reset");
            }
            ResetScope::Full => self.clear_all(),
        }
        Ok(())
    }

    fn clear_all(&mut self) {
        self.history.clear();
        self.buffer.clear();
        self.prediction = None;
        self.ledger.reset();
        self.bet_mode = self.config.bet_mode;
        self.table = None;
        self.phase = SessionPhase::NotStarted;
        let previous = std::mem::replace(&mut self.id, Uuid::new_v4());
        info!(previous = %previous, session = %self.id, "Full reset");
    }

    pub fn reset_cycle(&mut self) -> Result<(), SessionError> {
        self.reset(ResetScope::Cycle)
    }

    /// Valid in every phase.
    pub fn full_reset(&mut self) {
        self.clear_all();
    }

    // -- Manual overrides ----------------------------------------------------

    fn ensure_adjustable(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Loading => Err(self.reject(SessionError::Busy)),
            SessionPhase::PredictionPending => Err(self.reject(SessionError::Rejected(
                "bankroll and stake are locked while a prediction is pending".into(),
            ))),
            SessionPhase::NotStarted | SessionPhase::AwaitingEntries => Ok(()),
        }
    }

    pub fn set_bankroll(&mut self, amount: Decimal) -> Result<(), SessionError> {
        self.ensure_adjustable()?;
        self.ledger.set_bankroll(amount);
        info!(bankroll = %amount, "Bankroll set manually");
        Ok(())
    }

    pub fn set_stake(&mut self, amount: Decimal) -> Result<(), SessionError> {
        self.ensure_adjustable()?;
        self.ledger.set_stake(amount).map_err(|e| self.reject(e))?;
        info!(stake = %amount, "Stake set manually");
        Ok(())
    }

    pub fn set_progression(&mut self, enabled: bool) -> Result<(), SessionError> {
        if self.phase == SessionPhase::Loading {
            return Err(self.reject(SessionError::Busy));
        }
        self.ledger.set_progression(enabled);
        info!(enabled, "Progression toggled");
        Ok(())
    }

    pub fn set_bet_mode(&mut self, mode: BetMode) {
        debug!(mode = %mode, "Bet mode changed");
        self.bet_mode = mode;
    }

    // -- Views ---------------------------------------------------------------

    pub fn snapshot(&self) -> SessionSnapshot {
        let stats = self.ledger.stats().clone();
        SessionSnapshot {
            session_id: self.id,
            phase: self.phase,
            table: self.table.clone(),
            bankroll: self.ledger.bankroll(),
            stake: self.ledger.stake(),
            base_stake: self.ledger.base_stake(),
            progression_enabled: self.ledger.progression_enabled(),
            bet_mode: self.bet_mode,
            buffer_policy: self.buffer.policy(),
            trigger_threshold: self.buffer.threshold(),
            last_bet: self.ledger.last_outcome(),
            prediction: self.prediction,
            buffer: self.buffer.pending().to_vec(),
            history: self.history.to_vec(),
            ledger: self.ledger.records().cloned().collect(),
            win_rate: stats.win_rate(),
            stats,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
