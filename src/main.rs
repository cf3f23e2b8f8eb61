use anyhow::{anyhow, Context};
use bracketbot::api::BinanceClient;
use bracketbot::config::AppConfig;
use bracketbot::execution::{should_reprice, OrderOrchestrator};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

/// Spot trading assistant: RSI, balances and protective OCO brackets
#[derive(Parser)]
#[command(name = "bracketbot", version, about)]
struct Cli {
    /// Directory holding default.toml
    #[arg(long, default_value = "config")]
    config_dir: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Latest RSI for a base asset
    Rsi {
        /// Base asset, e.g. AVNT (defaults to trading.default_symbol)
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long, default_value = "15m")]
        interval: String,
        #[arg(long, default_value_t = 14)]
        period: usize,
    },
    /// Last traded price
    Price {
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Free balance of an asset (defaults to the quote asset)
    Balance {
        #[arg(long)]
        asset: Option<String>,
    },
    /// Tick size, lot step, min quantity and min notional
    Filters {
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Market buy spending a quote amount
    Buy {
        #[arg(long)]
        symbol: Option<String>,
        /// Quote currency to spend, e.g. 25 (USDT)
        #[arg(long)]
        amount: Decimal,
    },
    /// Market sell of the whole free balance
    Sell {
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Place a take-profit / stop-loss OCO around a reference price
    Oco {
        #[arg(long)]
        symbol: Option<String>,
        /// Reference (entry) price
        #[arg(long)]
        price: Decimal,
    },
    /// Cancel an OCO order list
    CancelOco {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        order_list_id: i64,
    },
    /// Status of an OCO order list
    OcoStatus {
        #[arg(long)]
        order_list_id: i64,
    },
    /// Whether the price moved far enough above a reference to re-place the bracket
    CheckReprice {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        reference: Decimal,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config_dir).context("Failed to load configuration")?;
    setup_logging(&config.logging.level);

    if let Err(errors) = config.validate() {
        return Err(anyhow!("Invalid configuration: {}", errors.join("; ")));
    }
    tracing::debug!("Configuration: {:?}", config);

    let client = BinanceClient::new(&config.binance).context("Failed to build Binance client")?;
    let default_symbol = config.trading.default_symbol.clone();
    let price_update_trigger = config.trading.thresholds.price_update_trigger;
    let orchestrator = OrderOrchestrator::new(client, config.trading);
    let pick = |symbol: Option<String>| symbol.unwrap_or_else(|| default_symbol.clone());

    match cli.command {
        Command::Rsi {
            symbol,
            interval,
            period,
        } => {
            let symbol = pick(symbol);
            let rsi = orchestrator.latest_rsi(&symbol, &interval, period).await?;
            println!(
                "RSI for {} ({} interval - period {}): {:.2}",
                orchestrator.config().market_symbol(&symbol),
                interval,
                period,
                rsi
            );
        }
        Command::Price { symbol } => {
            let symbol = pick(symbol);
            let price = orchestrator.ticker_price(&symbol).await?;
            println!("{}: {}", orchestrator.config().market_symbol(&symbol), price);
        }
        Command::Balance { asset } => {
            let asset = asset.unwrap_or_else(|| orchestrator.config().quote_asset.clone());
            let free = orchestrator.asset_balance(&asset).await?;
            println!("{} free: {}", asset, free);
        }
        Command::Filters { symbol } => {
            let filters = orchestrator.exchange_filters(&pick(symbol)).await?;
            println!("{}", filters.symbol);
            println!("  tick size:    {}", filters.tick_size);
            println!("  step size:    {}", filters.step_size);
            println!("  min qty:      {}", filters.min_qty);
            println!("  min notional: {}", filters.min_notional);
        }
        Command::Buy { symbol, amount } => {
            let report = orchestrator.market_buy(&pick(symbol), amount).await?;
            println!(
                "Bought {} {} for {} (avg price {})",
                report.executed_qty,
                report.symbol,
                report.cummulative_quote_qty,
                report.average_fill_price()
            );
        }
        Command::Sell { symbol } => {
            let report = orchestrator.market_sell(&pick(symbol)).await?;
            println!(
                "Sold {} {} for {} (avg price {})",
                report.executed_qty,
                report.symbol,
                report.cummulative_quote_qty,
                report.average_fill_price()
            );
        }
        Command::Oco { symbol, price } => {
            let report = orchestrator.create_oco(&pick(symbol), price).await?;
            println!(
                "OCO {} for {} {}: take profit {}, stop loss {}",
                report.order_list.order_list_id,
                report.plan.quantity,
                report.plan.symbol,
                report.plan.take_profit_price,
                report.plan.stop_loss_price
            );
        }
        Command::CancelOco {
            symbol,
            order_list_id,
        } => {
            let report = orchestrator.cancel_oco(&pick(symbol), order_list_id).await?;
            println!(
                "OCO {} cancelled ({})",
                report.order_list_id,
                report.list_order_status.as_deref().unwrap_or("unknown")
            );
        }
        Command::OcoStatus { order_list_id } => {
            let status = orchestrator.oco_status(order_list_id).await?;
            println!("OCO {}: {}", order_list_id, status);
        }
        Command::CheckReprice { symbol, reference } => {
            let symbol = pick(symbol);
            let current = orchestrator.ticker_price(&symbol).await?;
            let reprice = should_reprice(reference, current, price_update_trigger);
            println!(
                "{}: reference {}, current {} -> {}",
                orchestrator.config().market_symbol(&symbol),
                reference,
                current,
                if reprice { "re-place bracket" } else { "keep bracket" }
            );
        }
    }

    Ok(())
}

fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bracketbot={}", level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
