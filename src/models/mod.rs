use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV candlestick, timestamp in epoch milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Bollinger envelope at one candle index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub middle: Decimal,
    pub upper: Decimal,
    pub lower: Decimal,
}

/// Latest ticker snapshot for the instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub inst_id: String,
    pub last: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub high_24h: Decimal,
    pub low_24h: Decimal,
    pub volume_ccy_24h: Decimal,
}

/// Open short held on one grid level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Rank of the level in the ascending grid (0 = lowest)
    pub level: usize,
    pub entry_price: Decimal,
    pub usdt_amount: Decimal,
    /// Contract quantity including leverage
    pub amount: Decimal,
    /// Fee paid when the short was opened
    pub entry_fee: Decimal,
    pub opened_at: i64,
}

impl Position {
    /// Unrealized P&L of the short marked at `price`
    pub fn pnl_at(&self, price: Decimal) -> Decimal {
        (self.entry_price - price) * self.amount
    }

    pub fn notional_at(&self, price: Decimal) -> Decimal {
        price * self.amount
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    /// Sell to open a short
    Open,
    /// Buy to close a short
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeReason {
    /// Triggered by price crossing a grid level
    Grid,
    /// Forced close below the grid at settlement
    StopOut,
}

/// Ledger entry, never mutated after it is appended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub action: TradeAction,
    pub reason: TradeReason,
    pub level: usize,
    pub timestamp: i64,
    pub price: Decimal,
    pub amount: Decimal,
    pub realized_pnl: Decimal,
    pub fee: Decimal,
}
