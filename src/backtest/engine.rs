use rust_decimal::Decimal;

use crate::config::SimulationConfig;
use crate::grid::{GridLevels, GRID_LEVELS};
use crate::models::{Candle, Position, Trade, TradeAction, TradeReason};

/// What a single candle did to the book
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    /// Ranks of the levels whose shorts were closed, lowest first
    pub closed: Vec<usize>,
    /// Rank of the level a short was opened on
    pub opened: Option<usize>,
}

/// Book handed to settlement once the fold is over
#[derive(Debug, Clone)]
pub struct GridBook {
    pub levels: GridLevels,
    /// Still-open shorts, lowest level first
    pub positions: Vec<Position>,
    pub trades: Vec<Trade>,
}

/// Short-grid matching engine
///
/// Each of the four levels holds at most one short. Per candle the close pass
/// runs first; the open pass only runs when nothing closed and the low stays
/// strictly above the lowest level, and opens at most one short.
pub struct GridEngine {
    fee_rate: Decimal,
    leverage: Decimal,
    capital: Decimal,
    levels: GridLevels,
    slots: [Option<Position>; GRID_LEVELS],
    trades: Vec<Trade>,
}

impl GridEngine {
    pub fn new(config: &SimulationConfig, levels: GridLevels) -> Self {
        Self {
            fee_rate: config.fee_rate,
            leverage: config.leverage,
            capital: config.capital,
            levels,
            slots: Default::default(),
            trades: Vec::new(),
        }
    }

    /// Replay candles oldest first
    pub fn run(&mut self, candles: &[Candle]) {
        for candle in candles {
            self.step(candle);
        }
    }

    /// Apply one candle: close pass, then (maybe) open pass
    pub fn step(&mut self, candle: &Candle) -> StepOutcome {
        let closed = self.close_pass(candle);

        let opened = if closed.is_empty() && candle.low > self.levels.lowest() {
            self.open_pass(candle)
        } else {
            None
        };

        StepOutcome { closed, opened }
    }

    /// Close the short one level above every level the low reached
    fn close_pass(&mut self, candle: &Candle) -> Vec<usize> {
        let mut closed = Vec::new();

        for rank in 0..GRID_LEVELS - 1 {
            let trigger = self.levels.level(rank);
            if candle.low > trigger {
                continue;
            }

            if let Some(position) = self.slots[rank + 1].take() {
                let realized_pnl = position.pnl_at(trigger);
                let fee = position.notional_at(trigger) * self.fee_rate;

                tracing::debug!(
                    "Closed short L{} @ {:.2} (entry {:.2}) qty: {:.6} pnl: {:.4}",
                    position.level,
                    trigger,
                    position.entry_price,
                    position.amount,
                    realized_pnl
                );

                self.trades.push(Trade {
                    action: TradeAction::Close,
                    reason: TradeReason::Grid,
                    level: position.level,
                    timestamp: candle.timestamp,
                    price: trigger,
                    amount: position.amount,
                    realized_pnl,
                    fee,
                });
                closed.push(position.level);
            }
        }

        closed
    }

    /// Open one short on the highest free level the high reached
    fn open_pass(&mut self, candle: &Candle) -> Option<usize> {
        let (rank, price) = self.levels.descending().find(|&(rank, price)| {
            price > Decimal::ZERO && candle.high >= price && self.slots[rank].is_none()
        })?;

        let usdt_amount = self.capital / Decimal::from(GRID_LEVELS);
        let amount = usdt_amount / price * self.leverage;
        let fee = price * amount * self.fee_rate;

        tracing::debug!(
            "Opened short L{} @ {:.2} qty: {:.6} margin: {:.2} USDT",
            rank,
            price,
            amount,
            usdt_amount
        );

        self.slots[rank] = Some(Position {
            level: rank,
            entry_price: price,
            usdt_amount,
            amount,
            entry_fee: fee,
            opened_at: candle.timestamp,
        });
        self.trades.push(Trade {
            action: TradeAction::Open,
            reason: TradeReason::Grid,
            level: rank,
            timestamp: candle.timestamp,
            price,
            amount,
            realized_pnl: Decimal::ZERO,
            fee,
        });

        Some(rank)
    }

    pub fn levels(&self) -> &GridLevels {
        &self.levels
    }

    pub fn is_occupied(&self, rank: usize) -> bool {
        self.position_at(rank).is_some()
    }

    /// Short held on the level at `rank`, if any
    pub fn position_at(&self, rank: usize) -> Option<&Position> {
        self.slots.get(rank).and_then(Option::as_ref)
    }

    /// Open shorts, lowest level first
    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.slots.iter().flatten()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn into_book(self) -> GridBook {
        GridBook {
            levels: self.levels,
            positions: self.slots.into_iter().flatten().collect(),
            trades: self.trades,
        }
    }
}
