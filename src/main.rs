use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use shortgrid::backtest::report::{print_band_table, print_report, print_ticker};
use shortgrid::backtest::{MarketScenario, SyntheticDataGenerator};
use shortgrid::market_data::{load_candles_file, OkxClient};
use shortgrid::{AppConfig, Candle, GridBacktest, Ticker};
use tracing_subscriber::EnvFilter;

const BAND_TABLE_ROWS: usize = 10;
const SYNTHETIC_INTERVAL_MINUTES: i64 = 15;

#[derive(Parser)]
#[command(name = "shortgrid")]
#[command(about = "Bollinger-band short grid simulator for OKX perpetual swaps", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file (SHORTGRID__* env vars are applied on top)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    /// Print the result as JSON instead of the text report
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Overrides {
    /// Bollinger window length
    #[arg(long, global = true)]
    period: Option<usize>,

    /// Band width in standard deviations
    #[arg(long, global = true)]
    k: Option<Decimal>,

    /// Total capital in USDT
    #[arg(long, global = true)]
    capital: Option<Decimal>,

    #[arg(long, global = true)]
    leverage: Option<Decimal>,

    /// Fee rate charged on notional per fill
    #[arg(long, global = true)]
    fee_rate: Option<Decimal>,

    /// Number of most recent candles to replay
    #[arg(long, global = true)]
    window: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch candles and the ticker from OKX and simulate
    Live {
        /// Instrument, e.g. BTC-USDT-SWAP
        #[arg(short, long)]
        inst_id: Option<String>,

        /// Candle interval, e.g. 15m
        #[arg(short, long)]
        bar: Option<String>,

        /// Number of candles to fetch (max 300)
        #[arg(short, long)]
        limit: Option<u32>,

        /// HTTP proxy for OKX requests
        #[arg(long)]
        proxy: Option<String>,
    },

    /// Simulate over a saved OKX candles response
    File {
        path: PathBuf,

        /// Reference price for settlement (defaults to the last close)
        #[arg(short, long)]
        price: Option<Decimal>,
    },

    /// Simulate over a generated price series
    Synthetic {
        /// sideways, uptrend, downtrend, volatile or crash
        #[arg(short, long, default_value = "sideways")]
        scenario: MarketScenario,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// Number of candles to generate
        #[arg(short = 'n', long, default_value = "200")]
        candles: usize,

        /// Reference price for settlement (defaults to the last close)
        #[arg(short, long)]
        price: Option<Decimal>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    cli.overrides.apply(&mut config);

    let (candles, reference_price, ticker) = match cli.command {
        Commands::Live {
            inst_id,
            bar,
            limit,
            proxy,
        } => {
            if let Some(inst_id) = inst_id {
                config.market.inst_id = inst_id;
            }
            if let Some(bar) = bar {
                config.market.bar = bar;
            }
            if let Some(limit) = limit {
                config.market.limit = limit;
            }
            if proxy.is_some() {
                config.market.proxy = proxy;
            }
            let (candles, ticker) = fetch_live(&config).await?;
            (candles, Some(ticker.last), Some(ticker))
        }
        Commands::File { path, price } => {
            tracing::info!("Loading candles from {}", path.display());
            (load_candles_file(&path)?, price, None)
        }
        Commands::Synthetic {
            scenario,
            seed,
            candles,
            price,
        } => {
            tracing::info!("Generating {} {} candles (seed {})", candles, scenario, seed);
            let mut generator = SyntheticDataGenerator::new(seed);
            (
                generator.generate(scenario, candles, SYNTHETIC_INTERVAL_MINUTES),
                price,
                None,
            )
        }
    };

    let backtest = GridBacktest::new(config.simulation.clone());
    let result = backtest
        .run(&candles, reference_price)
        .context("Simulation failed")?;

    if cli.json {
        let output = match &ticker {
            Some(ticker) => serde_json::json!({ "ticker": ticker, "result": result }),
            None => serde_json::to_value(&result)?,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if let Some(ticker) = &ticker {
        print_ticker(ticker);
    }
    let bands = backtest.bands(&candles)?;
    print_band_table(&candles, &bands, BAND_TABLE_ROWS);
    print_report(&result, &config.simulation);

    Ok(())
}

impl Overrides {
    fn apply(&self, config: &mut AppConfig) {
        let sim = &mut config.simulation;
        if let Some(period) = self.period {
            sim.period = period;
        }
        if let Some(k) = self.k {
            sim.k = k;
        }
        if let Some(capital) = self.capital {
            sim.capital = capital;
        }
        if let Some(leverage) = self.leverage {
            sim.leverage = leverage;
        }
        if let Some(fee_rate) = self.fee_rate {
            sim.fee_rate = fee_rate;
        }
        if let Some(window) = self.window {
            sim.window = window;
        }
    }
}

/// Candles and ticker are fetched concurrently; the ticker's last price is the reference
async fn fetch_live(config: &AppConfig) -> Result<(Vec<Candle>, Ticker)> {
    let market = &config.market;
    let client = OkxClient::new(market)?;

    tracing::info!(
        "Fetching {} {} candles for {} from {}",
        market.limit,
        market.bar,
        market.inst_id,
        market.base_url
    );

    let (candles, ticker) = tokio::try_join!(
        client.get_candles(&market.inst_id, &market.bar, market.limit),
        client.get_ticker(&market.inst_id),
    )?;

    Ok((candles, ticker))
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shortgrid=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
