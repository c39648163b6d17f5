// In app/src/main.rs

use anyhow::{Context, Result};
use app_config::{PortfolioSnapshot, Settings};
use clap::{Parser, Subcommand};
use core_types::{Side, TradeProposal};
use risk::{LimitRiskManager, RiskManager};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use tracing_subscriber::prelude::*;

mod session;

use crate::session::PaperBook;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = "Pre-trade risk gate for the trading assistant."
)]
struct Cli {
    /// Directory holding `base.toml` and environment overlays.
    #[arg(long, global = true, default_value = "config")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validates a single proposed trade against a portfolio snapshot.
    Check {
        /// The ticker to trade (e.g., "AAPL").
        #[arg(short, long)]
        symbol: String,

        /// "buy" or "sell".
        #[arg(long)]
        side: Side,

        #[arg(long)]
        shares: u64,

        #[arg(short, long)]
        price: Decimal,

        /// TOML file with the account, today's P&L and current positions.
        #[arg(long, default_value = "config/portfolio.toml")]
        portfolio: PathBuf,
    },

    /// Replays a session of proposed trades through the risk gate on a paper book.
    Replay {
        /// TOML file with a portfolio snapshot and a list of `[[proposals]]`.
        #[arg(long, default_value = "config/session.toml")]
        session: PathBuf,
    },

    /// Prints the effective risk limits and today's counters.
    Stats {
        /// Optional snapshot whose P&L and trade count seed today's counters.
        #[arg(long)]
        portfolio: Option<PathBuf>,
    },
}

// --- Main Application Entry Point ---

fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    // Parse command-line arguments.
    let cli = Cli::parse();

    let settings = app_config::load_settings_from(&cli.config_dir)
        .with_context(|| format!("loading settings from {}", cli.config_dir.display()))?;
    init_tracing(&settings)?;

    tracing::info!(environment = %settings.app.environment, "Starting trade assistant");

    // The single risk manager for this process; everything below borrows it.
    let limits = settings.risk.to_limits()?;
    let risk_manager = LimitRiskManager::new(limits);
    tracing::info!(manager = risk_manager.name(), ?limits, "Risk manager ready.");

    // Match on the parsed command and call the appropriate handler.
    match cli.command {
        Commands::Check {
            symbol,
            side,
            shares,
            price,
            portfolio,
        } => {
            let proposal = TradeProposal::new(symbol.as_str(), side, shares, price);
            handle_check(&risk_manager, proposal, &portfolio)?;
        }
        Commands::Replay { session } => {
            handle_replay(&risk_manager, &session)?;
        }
        Commands::Stats { portfolio } => {
            handle_stats(&risk_manager, portfolio.as_deref())?;
        }
    }

    Ok(())
}

fn parse_log_level(raw: &str) -> Result<tracing::Level> {
    raw.trim()
        .parse::<tracing::Level>()
        .with_context(|| {
            format!("invalid app.log_level '{raw}' (expected trace, debug, info, warn or error)")
        })
}

fn init_tracing(settings: &Settings) -> Result<()> {
    let level = parse_log_level(&settings.app.log_level)?;
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(tracing_subscriber::filter::Targets::new().with_default(level));
    tracing_subscriber::registry().with(fmt_layer).init();
    Ok(())
}

/// Seeds the daily counters with what the snapshot says already happened today.
fn restore_counters(risk_manager: &LimitRiskManager, snapshot: &PortfolioSnapshot) {
    risk_manager.restore_trade_count(snapshot.trades_today);
    risk_manager.restore_pnl(snapshot.current_pnl);
}

// --- "Check" Subcommand Logic ---

fn handle_check(
    risk_manager: &LimitRiskManager,
    proposal: TradeProposal,
    portfolio: &Path,
) -> Result<()> {
    let snapshot = app_config::load_portfolio(portfolio)
        .with_context(|| format!("loading portfolio from {}", portfolio.display()))?;
    risk_manager.restore_trade_count(snapshot.trades_today);

    let result = risk_manager.validate_proposal(
        &proposal,
        &snapshot.account,
        snapshot.current_pnl,
        &snapshot.positions,
    )?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

// --- "Replay" Subcommand Logic ---

fn handle_replay(risk_manager: &LimitRiskManager, path: &Path) -> Result<()> {
    let session = app_config::load_session(path)
        .with_context(|| format!("loading session from {}", path.display()))?;
    risk_manager.restore_trade_count(session.snapshot.trades_today);

    let mut book = PaperBook::from_snapshot(&session.snapshot);
    let summary = session::replay(risk_manager, &mut book, &session.proposals)?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    println!("{}", serde_json::to_string_pretty(&risk_manager.daily_stats())?);
    Ok(())
}

// --- "Stats" Subcommand Logic ---

fn handle_stats(risk_manager: &LimitRiskManager, portfolio: Option<&Path>) -> Result<()> {
    if let Some(path) = portfolio {
        let snapshot = app_config::load_portfolio(path)
            .with_context(|| format!("loading portfolio from {}", path.display()))?;
        restore_counters(risk_manager, &snapshot);
    }

    println!("{}", serde_json::to_string_pretty(&risk_manager.daily_stats())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels_parse_case_insensitively() {
        assert_eq!(parse_log_level("debug").unwrap(), tracing::Level::DEBUG);
        assert_eq!(parse_log_level(" WARN ").unwrap(), tracing::Level::WARN);
    }

    #[test]
    fn unknown_log_level_is_an_error() {
        let err = parse_log_level("verbose").unwrap_err();
        assert!(err.to_string().contains("verbose"));
    }

    #[test]
    fn restored_counters_match_the_snapshot() {
        let snapshot: PortfolioSnapshot = toml::from_str(
            r#"
current_pnl = -5000
trades_today = 4

[account]
total_value = 100000
buying_power = 10000
cash = 10000
"#,
        )
        .unwrap();
        let rm = LimitRiskManager::new(risk::RiskLimits::default());

        restore_counters(&rm, &snapshot);

        let stats = rm.daily_stats();
        assert_eq!(stats.trades_today, 4);
        assert_eq!(stats.daily_pnl, rust_decimal::Decimal::from(-5000));
    }
}
