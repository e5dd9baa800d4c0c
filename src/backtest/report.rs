use chrono::{DateTime, FixedOffset};

use crate::backtest::settlement::SimulationResult;
use crate::config::SimulationConfig;
use crate::models::{Band, Candle, Ticker, TradeAction, TradeReason};

/// UTC+8, the exchange's display timezone
const DISPLAY_OFFSET_SECS: i32 = 8 * 3600;

/// Format epoch milliseconds as `YYYY-MM-DD HH:MM:SS` in UTC+8
pub fn format_timestamp(timestamp_ms: i64) -> String {
    FixedOffset::east_opt(DISPLAY_OFFSET_SECS)
        .zip(DateTime::from_timestamp_millis(timestamp_ms))
        .map(|(offset, utc)| utc.with_timezone(&offset).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

/// Print the most recent `rows` candles with their bands, newest first
pub fn print_band_table(candles: &[Candle], bands: &[Option<Band>], rows: usize) {
    println!(
        "\n{:<20} {:>12} {:>12} {:>12} {:>12} {:>12}",
        "Time", "Close", "BOLL", "UB", "LB", "Volume"
    );
    println!("{}", "─".repeat(85));

    for (candle, band) in candles.iter().zip(bands).rev().take(rows) {
        let (middle, upper, lower) = match band {
            Some(b) => (
                format!("{:.2}", b.middle),
                format!("{:.2}", b.upper),
                format!("{:.2}", b.lower),
            ),
            None => ("N/A".to_string(), "N/A".to_string(), "N/A".to_string()),
        };

        println!(
            "{:<20} {:>12.2} {:>12} {:>12} {:>12} {:>12.2}",
            format_timestamp(candle.timestamp),
            candle.close,
            middle,
            upper,
            lower,
            candle.volume
        );
    }
}

/// Ticker summary lines, one field per line
pub fn ticker_lines(ticker: &Ticker) -> Vec<String> {
    vec![
        format!("  Instrument:            {}", ticker.inst_id),
        format!("  Last:                  {:.2}", ticker.last),
        format!("  Bid / Ask:             {:.2} / {:.2}", ticker.bid, ticker.ask),
        format!("  24h High:              {:.2}", ticker.high_24h),
        format!("  24h Low:               {:.2}", ticker.low_24h),
        format!("  24h Volume:            {:.2}", ticker.volume_ccy_24h),
    ]
}

pub fn print_ticker(ticker: &Ticker) {
    println!("\n📈 TICKER");
    for line in ticker_lines(ticker) {
        println!("{}", line);
    }
}

/// Print grid parameters, the trade log and the settlement summary
pub fn print_report(result: &SimulationResult, config: &SimulationConfig) {
    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║              SHORT GRID SIMULATION REPORT             ║");
    println!("╚═══════════════════════════════════════════════════════╝\n");

    let levels: Vec<String> = result
        .levels
        .as_slice()
        .iter()
        .map(|l| format!("{:.2}", l))
        .collect();

    println!("📐 GRID PARAMETERS");
    println!("  Capital:               {} USDT", config.capital);
    println!("  Leverage:              {}x", config.leverage);
    println!("  Fee Rate:              {}", config.fee_rate);
    println!("  LB (lower band):       {:.2}", result.band.lower);
    println!("  UB (upper band):       {:.2}", result.band.upper);
    println!("  BOLL (middle band):    {:.2}", result.band.middle);
    println!("  Grid Spacing:          {:.2}", result.levels.spacing());
    println!("  Grid Levels:           [{}]", levels.join(", "));
    println!("  First Entry:           {:.2}", result.levels.first_entry());
    println!("  Reference Price:       {:.2}", result.reference_price);
    println!("  Simulated Candles:     last {}", config.window);

    println!("\n📜 TRADE LOG");
    if result.trades.is_empty() {
        println!("  (no trades)");
    }
    for trade in &result.trades {
        let action = match (trade.action, trade.reason) {
            (TradeAction::Open, _) => "SELL open short ",
            (TradeAction::Close, TradeReason::Grid) => "BUY  close short",
            (TradeAction::Close, TradeReason::StopOut) => "BUY  stop-out   ",
        };
        let pnl = if trade.action == TradeAction::Close {
            format!("pnl {:+.2} USDT", trade.realized_pnl)
        } else {
            String::new()
        };
        println!(
            "  {} {} L{} @ {:.2}, qty {:.6}, fee {:.4} {}",
            format_timestamp(trade.timestamp),
            action,
            trade.level,
            trade.price,
            trade.amount,
            trade.fee,
            pnl
        );
    }

    println!("\n📊 RESULT");
    println!("  Opens:                 {}", result.open_count);
    println!("  Grid Closes:           {}", result.close_count);
    println!("  Stop-outs:             {}", result.stop_out_count);
    println!("  Realized P&L:          {:.2} USDT", result.realized_pnl);
    println!("  Realized Fees:         {:.2} USDT", result.realized_fees);
    println!("  Entry Fees (open):     {:.2} USDT", result.entry_fees);
    println!("  Open Positions:        {}", result.open_positions.len());
    println!("  Avg Entry Price:       {:.2}", result.avg_entry_price);
    println!("  Floating P&L:          {:.2} USDT", result.floating_pnl);
    println!("  Floating Fee:          {:.2} USDT", result.floating_fee);
    println!("  Total Fees:            {:.2} USDT", result.total_fees);
    println!("  Final P&L:             {:.2} USDT", result.final_pnl);
    println!("  Profit Rate:           {:.2}%", result.profit_rate_pct());
    println!("  Status:                {}", result.status.describe());

    if !result.warnings.is_empty() {
        println!("\n⚠️  UNTRIGGERED CLOSES");
        for warning in &result.warnings {
            println!(
                "  L{} entry {:.2}: close trigger {:.2} >= reference {:.2}, never reached in window",
                warning.level, warning.entry_price, warning.trigger_price, warning.reference_price
            );
        }
    }

    println!("\n═══════════════════════════════════════════════════════\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ticker_lines_cover_every_field() {
        let ticker = Ticker {
            inst_id: "BTC-USDT-SWAP".to_string(),
            last: dec!(65123.4),
            bid: dec!(65123.3),
            ask: dec!(65123.5),
            high_24h: dec!(65500),
            low_24h: dec!(63900),
            volume_ccy_24h: dec!(120000.5),
        };

        let lines = ticker_lines(&ticker).join("\n");

        assert!(lines.contains("BTC-USDT-SWAP"));
        assert!(lines.contains("65123.40"));
        assert!(lines.contains("65123.30 / 65123.50"));
        assert!(lines.contains("65500.00"));
        assert!(lines.contains("63900.00"));
        assert!(lines.contains("120000.50"));
    }

    #[test]
    fn test_format_timestamp_utc8() {
        // 2024-01-01T00:00:00Z
        assert_eq!(format_timestamp(1_704_067_200_000), "2024-01-01 08:00:00");
    }
}
