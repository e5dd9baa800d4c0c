use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::backtest::engine::GridBook;
use crate::config::SimulationConfig;
use crate::grid::GridLevels;
use crate::models::{Band, Position, Trade, TradeAction, TradeReason};

/// Final state of the book relative to the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementStatus {
    /// Reference price fell below the lowest level, every short was stopped out
    FullyClosedBelowGrid,
    /// Reference price above the highest level, shorts left open
    AboveGridFloating { in_profit: bool },
    /// Reference price inside the grid, shorts left open
    InGridFloating { in_profit: bool },
}

impl SettlementStatus {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::FullyClosedBelowGrid => "below grid, all shorts stopped out",
            Self::AboveGridFloating { in_profit: true } => "above grid, floating profit",
            Self::AboveGridFloating { in_profit: false } => "above grid, floating loss",
            Self::InGridFloating { in_profit: true } => "inside grid, floating profit",
            Self::InGridFloating { in_profit: false } => "inside grid, floating loss",
        }
    }
}

/// A short whose close trigger sits at or above the reference price but never fired
///
/// The simulated window never saw a low reach the trigger, so the short is
/// still open even though the current price says it should be closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UntriggeredClose {
    pub level: usize,
    pub entry_price: Decimal,
    pub trigger_price: Decimal,
    pub reference_price: Decimal,
}

/// Outcome of one simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub band: Band,
    pub levels: GridLevels,
    pub reference_price: Decimal,
    pub capital: Decimal,

    // Counts
    pub open_count: usize,
    pub close_count: usize,
    pub stop_out_count: usize,

    // P&L
    pub realized_pnl: Decimal,
    pub floating_pnl: Decimal,
    pub final_pnl: Decimal,
    /// `final_pnl / capital`, as a fraction
    pub profit_rate: Decimal,

    // Fees
    /// Open and close fees of completed round trips (grid closes and stop-outs)
    pub realized_fees: Decimal,
    /// Fees already paid opening the shorts that are still open
    pub entry_fees: Decimal,
    pub floating_fee: Decimal,
    pub total_fees: Decimal,

    // Book
    pub avg_entry_price: Decimal,
    pub open_positions: Vec<Position>,
    pub status: SettlementStatus,
    pub warnings: Vec<UntriggeredClose>,
    pub trades: Vec<Trade>,
}

impl SimulationResult {
    pub fn profit_rate_pct(&self) -> Decimal {
        self.profit_rate * Decimal::ONE_HUNDRED
    }
}

/// Resolves the book left by the engine against a terminal reference price
pub struct SettlementCalculator {
    fee_rate: Decimal,
    capital: Decimal,
}

impl SettlementCalculator {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            fee_rate: config.fee_rate,
            capital: config.capital,
        }
    }

    /// Settle the book at `reference_price`
    ///
    /// Below the lowest level every short is force-closed at the reference
    /// price and the stop-outs are appended to the trade log stamped with
    /// `timestamp`. Otherwise shorts stay open and are only marked to market.
    pub fn settle(
        &self,
        book: GridBook,
        reference_price: Decimal,
        timestamp: i64,
    ) -> SimulationResult {
        let GridBook {
            levels,
            mut positions,
            mut trades,
        } = book;

        let below_grid = reference_price < levels.lowest();
        let mut stop_out_count = 0;

        if below_grid {
            for position in positions.drain(..) {
                let realized_pnl = position.pnl_at(reference_price);
                let fee = position.notional_at(reference_price) * self.fee_rate;

                tracing::info!(
                    "Stop-out L{} @ {:.2} (entry {:.2}) pnl: {:.4}",
                    position.level,
                    reference_price,
                    position.entry_price,
                    realized_pnl
                );

                trades.push(Trade {
                    action: TradeAction::Close,
                    reason: TradeReason::StopOut,
                    level: position.level,
                    timestamp,
                    price: reference_price,
                    amount: position.amount,
                    realized_pnl,
                    fee,
                });
                stop_out_count += 1;
            }
        }

        let floating_pnl: Decimal = positions.iter().map(|p| p.pnl_at(reference_price)).sum();
        let floating_fee: Decimal = positions
            .iter()
            .map(|p| p.notional_at(reference_price) * self.fee_rate)
            .sum();
        let avg_entry_price = weighted_entry_price(&positions);

        let open_count = trades
            .iter()
            .filter(|t| t.action == TradeAction::Open)
            .count();
        let close_count = trades
            .iter()
            .filter(|t| t.action == TradeAction::Close && t.reason == TradeReason::Grid)
            .count();
        let realized_pnl: Decimal = trades
            .iter()
            .filter(|t| t.action == TradeAction::Close)
            .map(|t| t.realized_pnl)
            .sum();
        let fees_paid: Decimal = trades.iter().map(|t| t.fee).sum();
        let entry_fees: Decimal = positions.iter().map(|p| p.entry_fee).sum();
        let realized_fees = fees_paid - entry_fees;

        let final_pnl = realized_pnl + floating_pnl - realized_fees - entry_fees - floating_fee;
        let profit_rate = if self.capital.is_zero() {
            Decimal::ZERO
        } else {
            final_pnl / self.capital
        };

        let status = classify(&levels, reference_price, floating_pnl);
        let warnings = untriggered_closes(&levels, &positions, reference_price);
        for warning in &warnings {
            tracing::warn!(
                "Short L{} (entry {:.2}) still open although its close trigger {:.2} is at or above the reference price {:.2}",
                warning.level,
                warning.entry_price,
                warning.trigger_price,
                warning.reference_price
            );
        }

        SimulationResult {
            band: *levels.band(),
            levels,
            reference_price,
            capital: self.capital,
            open_count,
            close_count,
            stop_out_count,
            realized_pnl,
            floating_pnl,
            final_pnl,
            profit_rate,
            realized_fees,
            entry_fees,
            floating_fee,
            total_fees: fees_paid + floating_fee,
            avg_entry_price,
            open_positions: positions,
            status,
            warnings,
            trades,
        }
    }
}

fn weighted_entry_price(positions: &[Position]) -> Decimal {
    let total_amount: Decimal = positions.iter().map(|p| p.amount).sum();
    if total_amount.is_zero() {
        return Decimal::ZERO;
    }

    let weighted: Decimal = positions.iter().map(|p| p.entry_price * p.amount).sum();
    weighted / total_amount
}

fn classify(levels: &GridLevels, reference_price: Decimal, floating_pnl: Decimal) -> SettlementStatus {
    let in_profit = floating_pnl > Decimal::ZERO;

    if reference_price < levels.lowest() {
        SettlementStatus::FullyClosedBelowGrid
    } else if reference_price > levels.highest() {
        SettlementStatus::AboveGridFloating { in_profit }
    } else {
        SettlementStatus::InGridFloating { in_profit }
    }
}

fn untriggered_closes(
    levels: &GridLevels,
    positions: &[Position],
    reference_price: Decimal,
) -> Vec<UntriggeredClose> {
    positions
        .iter()
        .filter_map(|position| {
            let trigger_price = levels.close_trigger(position.level)?;
            (trigger_price >= reference_price).then(|| UntriggeredClose {
                level: position.level,
                entry_price: position.entry_price,
                trigger_price,
                reference_price,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn levels() -> GridLevels {
        GridLevels::from_bounds(dec!(90), dec!(110), dec!(100)).unwrap()
    }

    fn position(level: usize, entry_price: Decimal, amount: Decimal) -> Position {
        Position {
            level,
            entry_price,
            usdt_amount: dec!(250),
            amount,
            entry_fee: Decimal::ZERO,
            opened_at: 1,
        }
    }

    fn open_trade(position: &Position) -> Trade {
        Trade {
            action: TradeAction::Open,
            reason: TradeReason::Grid,
            level: position.level,
            timestamp: position.opened_at,
            price: position.entry_price,
            amount: position.amount,
            realized_pnl: Decimal::ZERO,
            fee: position.entry_fee,
        }
    }

    fn calculator(fee_rate: Decimal) -> SettlementCalculator {
        SettlementCalculator::new(&SimulationConfig {
            capital: dec!(1000),
            fee_rate,
            ..Default::default()
        })
    }

    #[test]
    fn test_stop_out_below_grid() {
        let positions = vec![position(2, dec!(100), dec!(2)), position(3, dec!(105), dec!(2))];
        let trades = positions.iter().map(open_trade).collect();
        let book = GridBook {
            levels: levels(),
            positions,
            trades,
        };

        let result = calculator(Decimal::ZERO).settle(book, dec!(80), 99);

        assert_eq!(result.status, SettlementStatus::FullyClosedBelowGrid);
        assert!(result.open_positions.is_empty());
        assert_eq!(result.entry_fees, Decimal::ZERO);
        assert_eq!(result.stop_out_count, 2);
        assert_eq!(result.close_count, 0);
        // (100-80)*2 + (105-80)*2
        assert_eq!(result.realized_pnl, dec!(90));
        assert_eq!(result.floating_pnl, Decimal::ZERO);
        assert_eq!(result.final_pnl, dec!(90));
        assert_eq!(result.profit_rate, dec!(0.09));

        let stop_outs: Vec<&Trade> = result
            .trades
            .iter()
            .filter(|t| t.reason == TradeReason::StopOut)
            .collect();
        assert_eq!(stop_outs.len(), 2);
        assert!(stop_outs.iter().all(|t| t.price == dec!(80) && t.timestamp == 99));
    }

    #[test]
    fn test_floating_inside_grid() {
        let mut positions = vec![position(2, dec!(100), dec!(1)), position(3, dec!(105), dec!(3))];
        for p in positions.iter_mut() {
            p.entry_fee = dec!(0.5);
        }
        let trades = positions.iter().map(open_trade).collect();
        let book = GridBook {
            levels: levels(),
            positions,
            trades,
        };

        let result = calculator(dec!(0.001)).settle(book, dec!(102), 7);

        assert_eq!(result.open_positions.len(), 2);
        // (100-102)*1 + (105-102)*3
        assert_eq!(result.floating_pnl, dec!(7));
        // 102*4*0.001
        assert_eq!(result.floating_fee, dec!(0.408));
        // (100*1 + 105*3) / 4
        assert_eq!(result.avg_entry_price, dec!(103.75));
        assert_eq!(result.realized_pnl, Decimal::ZERO);
        // Nothing closed yet, the open fees sit with the open shorts
        assert_eq!(result.realized_fees, Decimal::ZERO);
        assert_eq!(result.entry_fees, dec!(1.0));
        assert_eq!(result.total_fees, dec!(1.408));
        assert_eq!(result.final_pnl, dec!(7) - dec!(1.0) - dec!(0.408));
        assert_eq!(result.status, SettlementStatus::InGridFloating { in_profit: true });
        // Floating fee is never written to the log
        assert_eq!(result.trades.len(), 2);
    }

    #[test]
    fn test_above_grid_floating_loss() {
        let positions = vec![position(3, dec!(105), dec!(2))];
        let trades = positions.iter().map(open_trade).collect();
        let book = GridBook {
            levels: levels(),
            positions,
            trades,
        };

        let result = calculator(Decimal::ZERO).settle(book, dec!(120), 7);

        assert_eq!(result.floating_pnl, dec!(-30));
        assert_eq!(
            result.status,
            SettlementStatus::AboveGridFloating { in_profit: false }
        );
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_reference_at_lowest_level_is_not_a_stop_out() {
        let positions = vec![position(0, dec!(90), dec!(1))];
        let trades = positions.iter().map(open_trade).collect();
        let book = GridBook {
            levels: levels(),
            positions,
            trades,
        };

        let result = calculator(Decimal::ZERO).settle(book, dec!(90), 7);

        assert_eq!(result.open_positions.len(), 1);
        assert_eq!(result.status, SettlementStatus::InGridFloating { in_profit: false });
    }

    #[test]
    fn test_untriggered_close_is_reported() {
        // Short on 105 closes at 100; reference 98 is below that trigger
        let positions = vec![position(1, dec!(95), dec!(1)), position(3, dec!(105), dec!(1))];
        let trades = positions.iter().map(open_trade).collect();
        let book = GridBook {
            levels: levels(),
            positions,
            trades,
        };

        let result = calculator(Decimal::ZERO).settle(book, dec!(98), 7);

        assert_eq!(
            result.warnings,
            vec![UntriggeredClose {
                level: 3,
                entry_price: dec!(105),
                trigger_price: dec!(100),
                reference_price: dec!(98),
            }]
        );
        // Reported only, the short stays open
        assert_eq!(result.open_positions.len(), 2);
    }

    #[test]
    fn test_untriggered_close_at_exact_trigger() {
        let positions = vec![position(3, dec!(105), dec!(1))];
        let book = GridBook {
            levels: levels(),
            positions,
            trades: vec![],
        };

        let result = calculator(Decimal::ZERO).settle(book, dec!(100), 7);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_empty_book() {
        let book = GridBook {
            levels: levels(),
            positions: vec![],
            trades: vec![],
        };

        let result = calculator(dec!(0.001)).settle(book, dec!(100), 7);

        assert_eq!(result.floating_pnl, Decimal::ZERO);
        assert_eq!(result.floating_fee, Decimal::ZERO);
        assert_eq!(result.avg_entry_price, Decimal::ZERO);
        assert_eq!(result.final_pnl, Decimal::ZERO);
        assert_eq!(result.status, SettlementStatus::InGridFloating { in_profit: false });
    }

    #[test]
    fn test_status_descriptions() {
        assert_eq!(
            SettlementStatus::FullyClosedBelowGrid.describe(),
            "below grid, all shorts stopped out"
        );
        assert_eq!(
            SettlementStatus::InGridFloating { in_profit: true }.describe(),
            "inside grid, floating profit"
        );
    }
}
