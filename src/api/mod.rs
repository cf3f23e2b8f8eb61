pub mod binance;

pub use binance::BinanceClient;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::models::{
    Candle, ExchangeFilters, MarketOrderReport, OcoOrderReport, OcoOrderRequest, OrderIntent,
    OrderListReport,
};
use crate::Result;

/// Spot exchange operations the order orchestrator relies on
///
/// Every method is one round-trip; implementations do not cache or retry.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Free balance per asset
    async fn get_account_balances(&self) -> Result<HashMap<String, Decimal>>;

    /// PRICE_FILTER, LOT_SIZE and NOTIONAL constraints for a market symbol
    async fn get_symbol_filters(&self, symbol: &str) -> Result<ExchangeFilters>;

    /// Candles oldest first
    async fn get_klines(&self, symbol: &str, interval: &str, limit: Option<u16>) -> Result<Vec<Candle>>;

    async fn get_ticker_price(&self, symbol: &str) -> Result<Decimal>;

    async fn submit_market_order(&self, order: &OrderIntent) -> Result<MarketOrderReport>;

    async fn submit_oco_order(&self, order: &OcoOrderRequest) -> Result<OcoOrderReport>;

    async fn cancel_order_list(&self, symbol: &str, order_list_id: i64) -> Result<OrderListReport>;

    /// Order-list state; `list_order_status` may be absent
    async fn get_order_list(&self, order_list_id: i64) -> Result<OrderListReport>;
}
