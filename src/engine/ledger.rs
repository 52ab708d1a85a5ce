//! Staking ledger: bankroll, stake progression, and settled bet records.
//!
//! Settles a pending prediction as won or lost: applies the payout,
//! advances or resets the stake according to the staking policy, and
//! appends an immutable `BetRecord`.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::info;

use crate::config::SessionConfig;
use crate::types::{BetMode, BetOutcome, BetRecord, Prediction, SessionError};

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Aggregate results since the last full reset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub bets_won: u64,
    pub bets_lost: u64,
    pub total_profit: Decimal,
    /// Highest bankroll reached by settling bets.
    pub peak_bankroll: Decimal,
    /// Largest peak-to-trough fall seen, as a fraction of the peak.
    pub max_drawdown: Decimal,
    /// Reference point for drawdown. Restarts at every manual bankroll
    /// override so overrides never register as a fall.
    #[serde(skip)]
    high_water: Decimal,
}

impl SessionStats {
    fn new(initial_bankroll: Decimal) -> Self {
        Self {
            bets_won: 0,
            bets_lost: 0,
            total_profit: Decimal::ZERO,
            peak_bankroll: initial_bankroll,
            max_drawdown: Decimal::ZERO,
            high_water: initial_bankroll,
        }
    }

    pub fn bets_settled(&self) -> u64 {
        self.bets_won + self.bets_lost
    }

    /// Win rate as a percentage. Returns 0 if nothing has settled.
    pub fn win_rate(&self) -> Decimal {
        let settled = self.bets_settled();
        if settled == 0 {
            Decimal::ZERO
        } else {
            Decimal::from(self.bets_won) * Decimal::from(100) / Decimal::from(settled)
        }
    }

    fn observe_settlement(&mut self, bankroll: Decimal) {
        self.peak_bankroll = self.peak_bankroll.max(bankroll);
        self.high_water = self.high_water.max(bankroll);
        if self.high_water > Decimal::ZERO {
            let drawdown = bankroll
                .checked_div(self.high_water)
                .and_then(|ratio| Decimal::ONE.checked_sub(ratio));
            if let Some(drawdown) = drawdown {
                self.max_drawdown = self.max_drawdown.max(drawdown);
            }
        }
    }

    fn rebase(&mut self, bankroll: Decimal) {
        self.high_water = bankroll;
    }
}

// ---------------------------------------------------------------------------
// Ledger update
// ---------------------------------------------------------------------------

/// What one settlement changed.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerUpdate {
    pub record: BetRecord,
    pub bankroll_before: Decimal,
    pub bankroll_after: Decimal,
    pub next_stake: Decimal,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StakingLedger {
    initial_bankroll: Decimal,
    base_stake: Decimal,
    initial_progression: bool,
    bankroll: Decimal,
    stake: Decimal,
    progression_enabled: bool,
    records: VecDeque<BetRecord>,
    cap: usize,
    stats: SessionStats,
}

impl StakingLedger {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            initial_bankroll: config.initial_bankroll,
            base_stake: config.base_stake,
            initial_progression: config.progression_enabled,
            bankroll: config.initial_bankroll,
            stake: config.base_stake,
            progression_enabled: config.progression_enabled,
            records: VecDeque::with_capacity(config.ledger_cap),
            cap: config.ledger_cap,
            stats: SessionStats::new(config.initial_bankroll),
        }
    }

    pub fn bankroll(&self) -> Decimal {
        self.bankroll
    }

    pub fn stake(&self) -> Decimal {
        self.stake
    }

    pub fn base_stake(&self) -> Decimal {
        self.base_stake
    }

    pub fn progression_enabled(&self) -> bool {
        self.progression_enabled
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Settled bets, most recent first.
    pub fn records(&self) -> impl Iterator<Item = &BetRecord> {
        self.records.iter()
    }

    pub fn last_outcome(&self) -> Option<BetOutcome> {
        self.records.front().map(|r| r.outcome)
    }

    /// Settle `prediction` as won or lost under the given payout mode.
    ///
    /// Win: profit = stake × multiplier, stake returns to base.
    /// Loss: profit = −stake, stake doubles when progression is on.
    /// There is no stake ceiling. A settlement whose amounts leave the
    /// `Decimal` range fails with `Overflow` and changes nothing.
    pub fn settle(
        &mut self,
        prediction: &Prediction,
        won: bool,
        mode: BetMode,
    ) -> Result<LedgerUpdate, SessionError> {
        let bankroll_before = self.bankroll;
        let stake = self.stake;

        let (outcome, profit, next_stake) = if won {
            (
                BetOutcome::Win,
                stake.checked_mul(mode.payout_multiplier()),
                Some(self.base_stake),
            )
        } else if self.progression_enabled {
            (BetOutcome::Loss, Some(-stake), stake.checked_mul(Decimal::TWO))
        } else {
            (BetOutcome::Loss, Some(-stake), Some(stake))
        };
        let (profit, next_stake) = profit.zip(next_stake).ok_or(SessionError::Overflow)?;
        let bankroll_after = bankroll_before
            .checked_add(profit)
            .ok_or(SessionError::Overflow)?;
        let total_profit = self
            .stats
            .total_profit
            .checked_add(profit)
            .ok_or(SessionError::Overflow)?;

        match outcome {
            BetOutcome::Win => self.stats.bets_won += 1,
            BetOutcome::Loss => self.stats.bets_lost += 1,
        }
        self.stake = next_stake;
        self.bankroll = bankroll_after;
        self.stats.total_profit = total_profit;
        self.stats.observe_settlement(bankroll_after);

        let record = BetRecord {
            timestamp: Utc::now(),
            stake,
            outcome,
            profit,
            cumulative_profit: self.stats.total_profit,
            mode,
            predicted: prediction.outcome,
        };

        self.records.push_front(record.clone());
        self.records.truncate(self.cap);

        info!(
            outcome = %outcome,
            stake = %stake,
            profit = %profit,
            bankroll = %self.bankroll,
            next_stake = %self.stake,
            "Bet settled"
        );

        Ok(LedgerUpdate {
            record,
            bankroll_before,
            bankroll_after: self.bankroll,
            next_stake: self.stake,
        })
    }

    /// Manual bankroll override. Any value is accepted, negative included.
    /// Overrides are not counted toward peak or drawdown.
    pub fn set_bankroll(&mut self, amount: Decimal) {
        self.bankroll = amount;
        self.stats.rebase(amount);
    }

    /// Manual stake override. Negative stakes are refused, as are stakes
    /// whose straight-up payout would not fit in a `Decimal`.
    pub fn set_stake(&mut self, amount: Decimal) -> Result<(), SessionError> {
        let max_payout = amount.checked_mul(BetMode::Number.payout_multiplier());
        if amount.is_sign_negative() || max_payout.is_none() {
            return Err(SessionError::InvalidAmount(amount));
        }
        self.stake = amount;
        Ok(())
    }

    pub fn set_progression(&mut self, enabled: bool) {
        self.progression_enabled = enabled;
    }

    /// Restore the configured bankroll, stake, and policy; drop all records.
    pub fn reset(&mut self) {
        self.bankroll = self.initial_bankroll;
        self.stake = self.base_stake;
        self.progression_enabled = self.initial_progression;
        self.records.clear();
        self.stats = SessionStats::new(self.initial_bankroll);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
