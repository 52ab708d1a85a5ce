//! Operator command parsing for the interactive loop.
//!
//! One command per line, parsed with clap as a subcommand. A bare number
//! is shorthand for entering it.

use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;

use crate::types::{BetMode, Color, EntryInput};

pub const HELP: &str = "\
commands:
  start <table>          select a table and start the session
  n <0-36> | <0-36>      enter a number
  c <red|black|green>    enter a color
  win | loss             settle the pending prediction
  reset                  drop the pending prediction and buffer
  full-reset             restore bankroll/stake and clear everything
  bankroll <amount>      set bankroll manually
  stake <amount>         set stake manually
  progression on|off     toggle Martingale progression
  mode number|color      payout mode used when settling
  show | ledger          print session state / bet history
  help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start(String),
    Enter(EntryInput),
    Resolve { won: bool },
    ResetCycle,
    FullReset,
    SetBankroll(Decimal),
    SetStake(Decimal),
    SetProgression(bool),
    SetMode(BetMode),
    Show,
    Ledger,
    Help,
    Quit,
}

/// One REPL line.
#[derive(Parser, Debug)]
#[command(
    name = "roulette-tracker",
    no_binary_name = true,
    disable_help_flag = true,
    disable_help_subcommand = true,
    disable_version_flag = true
)]
struct Line {
    #[command(subcommand)]
    verb: Verb,
}

#[derive(Subcommand, Debug)]
enum Verb {
    /// Select a table and start the session
    Start { table: String },

    /// Enter a number
    #[command(name = "n", alias = "num")]
    EnterNumber {
        #[arg(value_name = "0-36")]
        value: u8,
    },

    /// Enter a color
    #[command(name = "c", alias = "color")]
    EnterColor { color: Color },

    /// Settle the pending prediction as won
    #[command(alias = "w")]
    Win,

    /// Settle the pending prediction as lost
    #[command(aliases = ["lose", "l"])]
    Loss,

    /// Drop the pending prediction and buffer
    Reset,

    /// Restore bankroll/stake and clear everything
    #[command(alias = "fullreset")]
    FullReset,

    /// Set bankroll manually
    Bankroll {
        #[arg(allow_hyphen_values = true)]
        amount: Decimal,
    },

    /// Set stake manually
    Stake {
        #[arg(allow_hyphen_values = true)]
        amount: Decimal,
    },

    /// Toggle Martingale progression
    #[command(alias = "martingale")]
    Progression {
        #[arg(value_enum, ignore_case = true)]
        state: Toggle,
    },

    /// Payout mode used when settling
    Mode { mode: BetMode },

    /// Print session state
    #[command(alias = "s")]
    Show,

    /// Print bet history
    #[command(alias = "history")]
    Ledger,

    Help,

    #[command(aliases = ["exit", "q"])]
    Quit,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Toggle {
    On,
    Off,
}

impl From<Verb> for Command {
    fn from(verb: Verb) -> Self {
        match verb {
            Verb::Start { table } => Command::Start(table),
            Verb::EnterNumber { value } => Command::Enter(EntryInput::Value(value)),
            Verb::EnterColor { color } => Command::Enter(EntryInput::Color(color)),
            Verb::Win => Command::Resolve { won: true },
            Verb::Loss => Command::Resolve { won: false },
            Verb::Reset => Command::ResetCycle,
            Verb::FullReset => Command::FullReset,
            Verb::Bankroll { amount } => Command::SetBankroll(amount),
            Verb::Stake { amount } => Command::SetStake(amount),
            Verb::Progression { state } => Command::SetProgression(matches!(state, Toggle::On)),
            Verb::Mode { mode } => Command::SetMode(mode),
            Verb::Show => Command::Show,
            Verb::Ledger => Command::Ledger,
            Verb::Help => Command::Help,
            Verb::Quit => Command::Quit,
        }
    }
}

/// First line of a clap error, without its `error: ` prefix.
fn render(err: clap::Error) -> String {
    let text = err.to_string();
    let first = text.lines().next().unwrap_or_default();
    first.strip_prefix("error: ").unwrap_or(first).to_string()
}

/// Parse one input line.
pub fn parse(line: &str) -> Result<Command, String> {
    let mut words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    let verb = words.first_mut().ok_or("empty command")?;
    *verb = match verb.to_lowercase().as_str() {
        "?" => "help".to_string(),
        other => other.to_string(),
    };
    if verb.chars().all(|c| c.is_ascii_digit()) {
        words.insert(0, "n".to_string());
    }

    let parsed = Line::try_parse_from(words).map_err(render)?;
    Ok(parsed.verb.into())
}
