// In app/src/session.rs

use anyhow::{Context, Result};
use app_config::PortfolioSnapshot;
use core_types::{AccountSnapshot, Position, Side, TradeProposal};
use risk::{RiskCheckResult, RiskManager};
use rust_decimal::Decimal;
use serde::Serialize;

/// What happened to a single proposal during a replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// The order went through, possibly at a reduced size.
    Submitted {
        shares: u64,
        resized: bool,
        warnings: Vec<String>,
    },
    Rejected {
        reason: String,
        max_shares: Option<u64>,
    },
    /// The proposal itself was malformed (zero price, zero shares, ...).
    Invalid { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayStep {
    pub proposal: TradeProposal,
    pub decision: Decision,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ReplaySummary {
    pub steps: Vec<ReplayStep>,
    pub submitted: usize,
    pub resized: usize,
    pub rejected: usize,
    pub invalid: usize,
}

/// A paper account that applies submitted trades at their proposed price.
///
/// Account value is held constant: fills move value between cash and
/// positions, and positions are marked at the last traded price.
#[derive(Debug, Clone)]
pub struct PaperBook {
    pub account: AccountSnapshot,
    pub positions: Vec<Position>,
    pub current_pnl: Decimal,
}

impl PaperBook {
    pub fn from_snapshot(snapshot: &PortfolioSnapshot) -> Self {
        Self {
            account: snapshot.account,
            positions: snapshot.positions.clone(),
            current_pnl: snapshot.current_pnl,
        }
    }

    /// Applies a filled trade to cash, buying power and holdings.
    ///
    /// The book is left untouched if any of the new values overflows.
    pub fn apply(&mut self, fill: &TradeProposal) -> Result<()> {
        let notional = fill.notional().context("fill value overflows")?;
        let shares = i64::try_from(fill.shares).context("fill share count overflows")?;
        let (delta, cash_delta) = match fill.side {
            Side::Buy => (shares, -notional),
            Side::Sell => (-shares, notional),
        };

        let cash = self
            .account
            .cash
            .checked_add(cash_delta)
            .context("cash overflows")?;
        let buying_power = self
            .account
            .buying_power
            .checked_add(cash_delta)
            .context("buying power overflows")?;

        let index = self.positions.iter().position(|p| p.symbol == fill.symbol);
        let held = index.map_or(0, |i| self.positions[i].quantity);
        let quantity = held.checked_add(delta).context("position size overflows")?;
        let market_value = Decimal::from(quantity)
            .checked_mul(fill.price)
            .context("position value overflows")?;

        self.account.cash = cash;
        self.account.buying_power = buying_power;
        let updated = Position {
            symbol: fill.symbol.clone(),
            quantity,
            market_value,
        };
        if updated.is_short() && held >= 0 {
            tracing::info!(symbol = %updated.symbol, quantity, "Position is now short.");
        }
        match index {
            Some(i) if quantity == 0 => {
                self.positions.remove(i);
            }
            Some(i) => self.positions[i] = updated,
            None => self.positions.push(updated),
        }
        Ok(())
    }
}

/// Runs each proposal through the risk manager the way the live trading loop does.
///
/// A rejection that carries a positive `max_shares` below the requested size is
/// retried once at that size. Approved trades are recorded with the risk manager
/// and applied to the paper book.
pub fn replay(
    risk_manager: &dyn RiskManager,
    book: &mut PaperBook,
    proposals: &[TradeProposal],
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for proposal in proposals {
        let decision = match evaluate(risk_manager, book, proposal) {
            Ok(result) if result.approved => submit(risk_manager, book, proposal, result, false)?,
            Ok(result) => match result.max_shares {
                Some(max_shares) if max_shares > 0 && max_shares < proposal.shares => {
                    let resized = proposal.with_shares(max_shares);
                    tracing::info!(
                        symbol = %proposal.symbol,
                        requested = proposal.shares,
                        max_shares,
                        "Retrying rejected trade at the suggested size."
                    );
                    match evaluate(risk_manager, book, &resized)? {
                        retry if retry.approved => {
                            submit(risk_manager, book, &resized, retry, true)?
                        }
                        retry => Decision::Rejected {
                            reason: retry.reason,
                            max_shares: retry.max_shares,
                        },
                    }
                }
                _ => Decision::Rejected {
                    reason: result.reason,
                    max_shares: result.max_shares,
                },
            },
            Err(risk::Error::InvalidInput(error)) => {
                tracing::warn!(symbol = %proposal.symbol, %error, "Skipping invalid proposal.");
                Decision::Invalid { error }
            }
            Err(e) => return Err(e.into()),
        };

        match &decision {
            Decision::Submitted { resized, .. } => {
                summary.submitted += 1;
                if *resized {
                    summary.resized += 1;
                }
            }
            Decision::Rejected { .. } => summary.rejected += 1,
            Decision::Invalid { .. } => summary.invalid += 1,
        }
        summary.steps.push(ReplayStep {
            proposal: proposal.clone(),
            decision,
        });
    }

    tracing::info!(
        submitted = summary.submitted,
        resized = summary.resized,
        rejected = summary.rejected,
        invalid = summary.invalid,
        "Replay finished."
    );
    Ok(summary)
}

fn evaluate(
    risk_manager: &dyn RiskManager,
    book: &PaperBook,
    proposal: &TradeProposal,
) -> risk::Result<RiskCheckResult> {
    risk_manager.validate_trade(
        proposal,
        book.account.total_value,
        book.current_pnl,
        &book.positions,
        Some(book.account.buying_power),
    )
}

fn submit(
    risk_manager: &dyn RiskManager,
    book: &mut PaperBook,
    fill: &TradeProposal,
    result: RiskCheckResult,
    resized: bool,
) -> Result<Decision> {
    book.apply(fill)?;
    risk_manager.record_trade(fill);
    Ok(Decision::Submitted {
        shares: fill.shares,
        resized,
        warnings: result.warnings,
    })
}
