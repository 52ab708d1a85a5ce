//! Dashboard API route handlers.
//!
//! All endpoints return JSON built from the last published snapshot.
//! State is shared via `Arc<DashboardState>`.

use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::engine::session::SessionSnapshot;
use crate::types::{BetRecord, SessionPhase};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Holds a copy of the session as of the last command. The session itself
/// stays owned by the command loop.
pub struct DashboardState {
    pub snapshot: RwLock<SessionSnapshot>,
}

impl DashboardState {
    pub fn new(initial: SessionSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(initial),
        }
    }

    /// Replace the published snapshot.
    pub async fn publish(&self, snapshot: SessionSnapshot) {
        *self.snapshot.write().await = snapshot;
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub phase: SessionPhase,
    pub bankroll: Decimal,
    pub stake: Decimal,
    pub total_profit: Decimal,
    pub bets_won: u64,
    pub bets_lost: u64,
    pub win_rate: Decimal,
    pub peak_bankroll: Decimal,
    pub max_drawdown_pct: Decimal,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

pub type AppState = Arc<DashboardState>;

/// GET /api/session
pub async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.snapshot.read().await.clone())
}

/// GET /api/ledger
pub async fn get_ledger(State(state): State<AppState>) -> Json<Vec<BetRecord>> {
    Json(state.snapshot.read().await.ledger.clone())
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let snap = state.snapshot.read().await;
    Json(StatsResponse {
        phase: snap.phase,
        bankroll: snap.bankroll,
        stake: snap.stake,
        total_profit: snap.stats.total_profit,
        bets_won: snap.stats.bets_won,
        bets_lost: snap.stats.bets_lost,
        win_rate: snap.win_rate,
        peak_bankroll: snap.stats.peak_bankroll,
        max_drawdown_pct: snap
            .stats
            .max_drawdown
            .checked_mul(Decimal::ONE_HUNDRED)
            .unwrap_or(Decimal::MAX),
    })
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
