//! Roulette session tracker: interactive entry point.
//!
//! Loads configuration, initialises structured logging, builds the
//! predictor gateway, and runs the operator command loop. Predictions
//! run as background tasks so the session visibly sits in `Loading`
//! until they report back.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use roulette_tracker::cli::{self, Command};
use roulette_tracker::config::{self, AppConfig};
use roulette_tracker::dashboard::{self, routes::DashboardState};
use roulette_tracker::engine::session::{EntryOutcome, Session, Trigger};
use roulette_tracker::predictor::local::LocalPredictor;
use roulette_tracker::predictor::openrouter::OpenRouterPredictor;
use roulette_tracker::predictor::{Predictor, PredictorGateway};
use roulette_tracker::types::{Prediction, SessionError};

const BANNER: &str = r#"
  ____             _      _   _
 |  _ \ ___  _   _| | ___| |_| |_ ___
 | |_) / _ \| | | | |/ _ \ __| __/ _ \
 |  _ < (_) | |_| | |  __/ |_| ||  __/
 |_| \_\___/ \__,_|_|\___|\__|\__\___|

  Session tracker. Type 'help' for commands
"#;

/// Simulated think time for the local predictor.
const LOCAL_THINK_TIME: Duration = Duration::from_millis(1500);

/// Wait between attempts when an earlier cycle still holds the gateway.
const BUSY_RETRY: Duration = Duration::from_millis(100);

#[derive(Debug, Parser)]
#[command(name = "roulette-tracker", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Start immediately on this table.
    #[arg(short, long)]
    table: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let args = Args::parse();
    let cfg = config::AppConfig::load(&args.config)?;

    init_logging();

    println!("{BANNER}");
    info!(
        initial_bankroll = %cfg.session.initial_bankroll,
        base_stake = %cfg.session.base_stake,
        progression = cfg.session.progression_enabled,
        policy = ?cfg.session.buffer_policy,
        provider = %cfg.predictor.provider,
        "Roulette tracker starting up"
    );

    let gateway = Arc::new(build_gateway(&cfg)?);
    let mut session = Session::new(cfg.session.clone());

    if let Some(table) = args.table.as_deref() {
        report(session.start(table).map(|_| format!("started on {table}")));
    }

    let dashboard_state = if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(session.snapshot()));
        dashboard::spawn_dashboard(state.clone(), cfg.dashboard.port);
        Some(state)
    } else {
        None
    };

    let (tx, mut rx) = mpsc::channel::<(u64, Prediction)>(4);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match cli::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => apply(command, &mut session, &gateway, &tx),
                    Err(msg) => println!("! {msg}"),
                }
            }
            Some((ticket, prediction)) = rx.recv() => {
                report(
                    session
                        .complete_prediction(ticket, prediction)
                        .map(|_| format!("prediction: {prediction}, stake {}", session.ledger().stake())),
                );
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }

        if let Some(state) = &dashboard_state {
            state.publish(session.snapshot()).await;
        }
    }

    let snap = session.snapshot();
    info!(
        bankroll = %snap.bankroll,
        profit = %snap.stats.total_profit,
        bets = snap.stats.bets_settled(),
        "Roulette tracker shut down cleanly."
    );

    Ok(())
}

/// Pick the primary predictor from config and wrap it in the gateway.
fn build_gateway(cfg: &AppConfig) -> Result<PredictorGateway> {
    let primary: Box<dyn Predictor> = match cfg.predictor.provider.as_str() {
        "local" => {
            info!("Using local predictor");
            Box::new(LocalPredictor::with_delay(LOCAL_THINK_TIME))
        }
        other => {
            if other != "openrouter" {
                warn!(provider = other, "Unknown predictor provider, defaulting to OpenRouter");
            }
            let api_key = AppConfig::resolve_env(&cfg.predictor.api_key_env).unwrap_or_else(|_| {
                warn!(
                    env = %cfg.predictor.api_key_env,
                    "No predictor API key configured, every prediction will use the local fallback"
                );
                String::new()
            });
            info!(
                model = ?cfg.predictor.model,
                fallback = ?cfg.predictor.fallback_model,
                "Using OpenRouter predictor"
            );
            Box::new(OpenRouterPredictor::new(
                api_key,
                cfg.predictor.model.clone(),
                cfg.predictor.fallback_model.clone(),
                Some(cfg.predictor.max_tokens),
            )?)
        }
    };

    Ok(PredictorGateway::new(
        primary,
        Duration::from_secs(cfg.predictor.timeout_secs),
    ))
}

/// Run one operator command against the session.
fn apply(
    command: Command,
    session: &mut Session,
    gateway: &Arc<PredictorGateway>,
    tx: &mpsc::Sender<(u64, Prediction)>,
) {
    match command {
        Command::Start(table) => report(session.start(&table).map(|_| format!("started on {table}"))),
        Command::Enter(input) => match session.enter(input) {
            Ok(EntryOutcome::Buffered { count }) => println!("  buffered ({count})"),
            Ok(EntryOutcome::Triggered(trigger)) => {
                println!("  analysing {} outcomes...", trigger.window.len());
                spawn_prediction(trigger, gateway.clone(), tx.clone());
            }
            Err(e) => println!("! {e}"),
        },
        Command::Resolve { won } => report(session.resolve_bet(won).map(|u| {
            format!(
                "{} {:+}, bankroll {} → {}, next stake {}",
                u.record.outcome, u.record.profit, u.bankroll_before, u.bankroll_after, u.next_stake
            )
        })),
        Command::ResetCycle => report(session.reset_cycle().map(|_| "cycle reset".to_string())),
        Command::FullReset => {
            session.full_reset();
            println!("  full reset, select a table with 'start <table>'");
        }
        Command::SetBankroll(amount) => {
            report(session.set_bankroll(amount).map(|_| format!("bankroll = {amount}")))
        }
        Command::SetStake(amount) => {
            report(session.set_stake(amount).map(|_| format!("stake = {amount}")))
        }
        Command::SetProgression(enabled) => report(
            session
                .set_progression(enabled)
                .map(|_| format!("progression {}", if enabled { "on" } else { "off" })),
        ),
        Command::SetMode(mode) => {
            session.set_bet_mode(mode);
            println!("  mode = {mode}");
        }
        Command::Show => println!("{}", session.snapshot()),
        Command::Ledger => {
            let snap = session.snapshot();
            if snap.ledger.is_empty() {
                println!("  no bets settled yet");
            }
            for record in &snap.ledger {
                println!("  {record}");
            }
        }
        Command::Help => println!("{}", cli::HELP),
        Command::Quit => {}
    }
}

/// Run the gateway for `trigger` in the background and post the result.
fn spawn_prediction(
    trigger: Trigger,
    gateway: Arc<PredictorGateway>,
    tx: mpsc::Sender<(u64, Prediction)>,
) {
    tokio::spawn(async move {
        let prediction = loop {
            match gateway.predict(&trigger.window).await {
                Ok(p) => break p,
                Err(e) => {
                    debug!(ticket = trigger.ticket, error = %e, "Gateway still busy, waiting");
                    tokio::time::sleep(BUSY_RETRY).await;
                }
            }
        };
        if tx.send((trigger.ticket, prediction)).await.is_err() {
            debug!(ticket = trigger.ticket, "Command loop gone, prediction dropped");
        }
    });
}

fn report(result: Result<String, SessionError>) {
    match result {
        Ok(msg) => println!("  {msg}"),
        Err(e) => println!("! {e}"),
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("roulette_tracker=info"));

    let json_logging = std::env::var("ROULETTE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
