//! End-to-end session flows through the public API.
//!
//! Drives a `Session` with a real `PredictorGateway` wrapped around a
//! scripted backend, so every cycle goes entry → trigger → prediction →
//! settlement exactly as the interactive loop runs it.

mod common;

use common::{session_config, ScriptedPredictor, BASE_STAKE, INITIAL_BANKROLL};
use rust_decimal_macros::dec;
use std::time::Duration;

use roulette_tracker::engine::session::{EntryOutcome, Session};
use roulette_tracker::predictor::fallback::FALLBACK_CONFIDENCE;
use roulette_tracker::predictor::PredictorGateway;
use roulette_tracker::types::*;

fn gateway(script: &ScriptedPredictor) -> PredictorGateway {
    PredictorGateway::new(Box::new(script.clone()), Duration::from_secs(1))
}

fn started(policy: BufferPolicy) -> Session {
    let mut session = Session::new(session_config(policy));
    session.start("iconic21").unwrap();
    session
}

/// Enter `values` and return the prediction produced by the last one.
async fn cycle(session: &mut Session, gateway: &PredictorGateway, values: &[u8]) -> Prediction {
    let mut last = None;
    for v in values {
        last = session
            .enter_and_predict(EntryInput::Value(*v), gateway)
            .await
            .unwrap();
    }
    last.expect("trigger did not fire")
}

#[tokio::test]
async fn test_martingale_sequence_loss_loss_win() {
    let script = ScriptedPredictor::new(&[17, 4, 32]);
    let gw = gateway(&script);
    let mut session = started(BufferPolicy::FixedThreshold);

    // First loss: stake doubles, one record of -10.
    let p = cycle(&mut session, &gw, &[5, 12, 30]).await;
    assert_eq!(p.outcome.value, 17);
    assert_eq!(session.phase(), SessionPhase::PredictionPending);
    let update = session.resolve_bet(false).unwrap();
    assert_eq!(update.record.profit, dec!(-10));
    let snap = session.snapshot();
    assert_eq!(snap.bankroll, dec!(990));
    assert_eq!(snap.stake, dec!(20));
    assert_eq!(snap.ledger.len(), 1);

    // Second loss.
    cycle(&mut session, &gw, &[0, 0, 0]).await;
    session.resolve_bet(false).unwrap();
    let snap = session.snapshot();
    assert_eq!(snap.bankroll, dec!(970));
    assert_eq!(snap.stake, dec!(40));

    // Win at 35:1 on the doubled stake.
    cycle(&mut session, &gw, &[7, 8, 9]).await;
    let update = session.resolve_bet(true).unwrap();
    assert_eq!(update.record.stake, dec!(40));
    assert_eq!(update.record.profit, dec!(1400));
    assert_eq!(update.bankroll_after, dec!(2370));
    assert_eq!(update.next_stake, BASE_STAKE);

    let snap = session.snapshot();
    assert_eq!(snap.ledger.len(), 3);
    assert_eq!(snap.ledger[0].outcome, BetOutcome::Win);
    assert_eq!(snap.ledger[0].cumulative_profit, dec!(1370));
    assert_eq!(snap.stats.bets_won, 1);
    assert_eq!(snap.stats.bets_lost, 2);
    assert_eq!(snap.last_bet, Some(BetOutcome::Win));
}

#[tokio::test]
async fn test_color_mode_pays_even_money() {
    let script = ScriptedPredictor::new(&[1]);
    let gw = gateway(&script);
    let mut session = started(BufferPolicy::FixedThreshold);
    session.set_bet_mode(BetMode::Color);

    cycle(&mut session, &gw, &[2, 3, 4]).await;
    let update = session.resolve_bet(true).unwrap();
    assert_eq!(update.record.profit, BASE_STAKE);
    assert_eq!(update.record.mode, BetMode::Color);
    assert_eq!(session.ledger().bankroll(), INITIAL_BANKROLL + BASE_STAKE);
}

#[tokio::test]
async fn test_flat_staking_keeps_stake_after_loss() {
    let script = ScriptedPredictor::new(&[1]);
    let gw = gateway(&script);
    let mut session = started(BufferPolicy::FixedThreshold);
    session.set_progression(false).unwrap();

    cycle(&mut session, &gw, &[2, 3, 4]).await;
    session.resolve_bet(false).unwrap();
    assert_eq!(session.ledger().stake(), BASE_STAKE);
    assert_eq!(session.ledger().bankroll(), dec!(990));
}

#[tokio::test]
async fn test_full_reset_restores_configured_state() {
    let script = ScriptedPredictor::new(&[17, 4]);
    let gw = gateway(&script);
    let mut session = started(BufferPolicy::FixedThreshold);

    cycle(&mut session, &gw, &[5, 12, 30]).await;
    session.resolve_bet(false).unwrap();
    cycle(&mut session, &gw, &[1, 2, 3]).await;

    session.full_reset();
    let snap = session.snapshot();
    assert_eq!(snap.phase, SessionPhase::NotStarted);
    assert_eq!(snap.bankroll, INITIAL_BANKROLL);
    assert_eq!(snap.stake, BASE_STAKE);
    assert!(snap.progression_enabled);
    assert!(snap.prediction.is_none());
    assert!(snap.history.is_empty());
    assert!(snap.ledger.is_empty());
    assert_eq!(snap.stats.bets_settled(), 0);

    // Entries are refused until a table is selected again.
    assert!(matches!(
        session.enter(EntryInput::Value(1)),
        Err(SessionError::Rejected(_))
    ));
}

#[tokio::test]
async fn test_trigger_fires_once_per_three_entries() {
    let script = ScriptedPredictor::new(&[10, 11]);
    let gw = gateway(&script);
    let mut session = started(BufferPolicy::FixedThreshold);

    let mut fired = 0;
    for v in [1, 2, 3] {
        if session
            .enter_and_predict(EntryInput::Value(v), &gw)
            .await
            .unwrap()
            .is_some()
        {
            fired += 1;
        }
    }
    session.reset_cycle().unwrap();
    for v in [4, 5, 6] {
        if session
            .enter_and_predict(EntryInput::Value(v), &gw)
            .await
            .unwrap()
            .is_some()
        {
            fired += 1;
        }
    }

    assert_eq!(fired, 2);
    let seen = script.seen();
    assert_eq!(seen.len(), 2);
    // Most recent entry sits at the front of the window.
    let first: Vec<u8> = seen[0].iter().map(|o| o.value).collect();
    assert_eq!(first, vec![3, 2, 1]);
    let second: Vec<u8> = seen[1].iter().map(|o| o.value).collect();
    assert_eq!(second, vec![6, 5, 4, 3, 2, 1]);
}

#[tokio::test]
async fn test_only_one_prediction_pending() {
    let script = ScriptedPredictor::new(&[10, 11]);
    let gw = gateway(&script);
    let mut session = started(BufferPolicy::FixedThreshold);

    cycle(&mut session, &gw, &[1, 2, 3]).await;
    let before = session.snapshot();

    // A further entry is refused and nothing changes.
    assert!(matches!(
        session.enter_and_predict(EntryInput::Value(4), &gw).await,
        Err(SessionError::Rejected(_))
    ));
    let after = session.snapshot();
    assert_eq!(after.prediction, before.prediction);
    assert_eq!(after.history, before.history);
    assert!(after.buffer.is_empty());
    assert_eq!(script.seen().len(), 1);
}

#[tokio::test]
async fn test_backend_failure_falls_back_deterministically() {
    let script = ScriptedPredictor::new(&[]);
    script.set_error("upstream 503");
    let gw = gateway(&script);

    let mut first = started(BufferPolicy::FixedThreshold);
    let mut second = started(BufferPolicy::FixedThreshold);
    let a = cycle(&mut first, &gw, &[9, 20, 12]).await;
    let b = cycle(&mut second, &gw, &[33, 1, 12]).await;

    assert_eq!(a.source, PredictionSource::Fallback);
    assert_eq!(a.confidence, FALLBACK_CONFIDENCE);
    assert_eq!(a.outcome.value, (12 * 3 + 7) % 37);
    assert_eq!(a, b);

    // Pending fallback predictions settle like any other.
    let update = first.resolve_bet(false).unwrap();
    assert_eq!(update.record.predicted.value, 6);
}

#[tokio::test]
async fn test_color_entries_map_to_representatives() {
    let script = ScriptedPredictor::new(&[5]);
    let gw = gateway(&script);
    let mut session = started(BufferPolicy::FixedThreshold);

    for color in [Color::Green, Color::Red, Color::Black] {
        session
            .enter_and_predict(EntryInput::Color(color), &gw)
            .await
            .unwrap();
    }

    let window: Vec<(u8, Color)> = script.seen()[0].iter().map(|o| (o.value, o.color)).collect();
    assert_eq!(
        window,
        vec![(2, Color::Black), (1, Color::Red), (0, Color::Green)]
    );
}

#[tokio::test]
async fn test_rolling_window_predicts_every_entry_after_warmup() {
    let script = ScriptedPredictor::new(&[10, 11, 12]);
    let gw = gateway(&script);
    let mut session = started(BufferPolicy::RollingWindow);

    assert_eq!(
        session.enter_and_predict(EntryInput::Value(1), &gw).await,
        Ok(None)
    );
    assert_eq!(
        session.enter_and_predict(EntryInput::Value(2), &gw).await,
        Ok(None)
    );
    assert!(session
        .enter_and_predict(EntryInput::Value(3), &gw)
        .await
        .unwrap()
        .is_some());
    session.resolve_bet(false).unwrap();

    let p = session
        .enter_and_predict(EntryInput::Value(4), &gw)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(p.outcome.value, 11);
    assert_eq!(script.seen()[1].len(), 4);
}

#[tokio::test]
async fn test_stale_ticket_after_reset_is_ignored() {
    let mut session = started(BufferPolicy::FixedThreshold);
    session.enter(EntryInput::Value(1)).unwrap();
    session.enter(EntryInput::Value(2)).unwrap();
    let stale = match session.enter(EntryInput::Value(3)).unwrap() {
        EntryOutcome::Triggered(t) => t,
        other => panic!("expected trigger, got {other:?}"),
    };

    session.full_reset();
    let late = Prediction {
        outcome: roulette_tracker::wheel::lookup(8).unwrap(),
        confidence: 80,
        source: PredictionSource::Remote,
    };
    assert!(session.complete_prediction(stale.ticket, late).is_err());
    assert_eq!(session.phase(), SessionPhase::NotStarted);
    assert!(session.prediction().is_none());
}
