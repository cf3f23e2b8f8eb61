use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BotError;
use crate::Result;

/// OHLCV candlestick from the exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time: DateTime<Utc>,
}

/// Order side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// How much to trade: quote currency to spend, or base asset quantity
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderAmount {
    Quote(Decimal),
    Base(Decimal),
}

/// Market order to be submitted
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: Side,
    pub amount: OrderAmount,
}

/// Trading constraints for one symbol
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeFilters {
    pub symbol: String,
    /// Minimum price increment
    pub tick_size: Decimal,
    /// Minimum quantity increment
    pub step_size: Decimal,
    pub min_qty: Decimal,
    pub min_notional: Decimal,
}

/// One entry of a symbol's `filters` array, as sent by the exchange
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolFilter {
    pub filter_type: String,
    #[serde(default)]
    pub tick_size: Option<Decimal>,
    #[serde(default)]
    pub step_size: Option<Decimal>,
    #[serde(default)]
    pub min_qty: Option<Decimal>,
    #[serde(default)]
    pub min_notional: Option<Decimal>,
}

impl ExchangeFilters {
    /// Build filters from raw symbol metadata.
    ///
    /// PRICE_FILTER, NOTIONAL (or legacy MIN_NOTIONAL) and LOT_SIZE are all
    /// required; a missing filter or a filter without its field is rejected.
    pub fn from_symbol_filters(symbol: &str, filters: &[SymbolFilter]) -> Result<Self> {
        let missing = |filter: &str| BotError::FilterNotFound {
            symbol: symbol.to_string(),
            filter: filter.to_string(),
        };

        let tick_size = find_filter(filters, &["PRICE_FILTER"])
            .and_then(|f| f.tick_size)
            .ok_or_else(|| missing("PRICE_FILTER"))?;

        let min_notional = find_filter(filters, &["NOTIONAL", "MIN_NOTIONAL"])
            .and_then(|f| f.min_notional)
            .ok_or_else(|| missing("NOTIONAL"))?;

        let lot = find_filter(filters, &["LOT_SIZE"]).ok_or_else(|| missing("LOT_SIZE"))?;
        let (step_size, min_qty) = match (lot.step_size, lot.min_qty) {
            (Some(step), Some(min)) => (step, min),
            _ => return Err(missing("LOT_SIZE")),
        };

        Ok(Self {
            symbol: symbol.to_string(),
            tick_size,
            step_size,
            min_qty,
            min_notional,
        })
    }
}

fn find_filter<'a>(filters: &'a [SymbolFilter], types: &[&str]) -> Option<&'a SymbolFilter> {
    filters
        .iter()
        .find(|f| types.contains(&f.filter_type.as_str()))
}

/// Take-profit / stop-loss pair derived from one reference price
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BracketPlan {
    pub symbol: String,
    pub quantity: Decimal,
    /// Tick-aligned, fixed 8-decimal price strings
    pub take_profit_price: String,
    pub stop_loss_price: String,
}

/// OCO sell order to be submitted
#[derive(Debug, Clone, PartialEq)]
pub struct OcoOrderRequest {
    pub side: Side,
    pub plan: BracketPlan,
}

/// A single fill of a market order
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fill {
    pub price: Decimal,
    pub qty: Decimal,
    #[serde(default)]
    pub commission: Decimal,
    #[serde(default)]
    pub commission_asset: String,
}

/// Result of a market order submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketOrderReport {
    pub symbol: String,
    pub order_id: i64,
    pub side: Side,
    pub status: String,
    pub executed_qty: Decimal,
    pub cummulative_quote_qty: Decimal,
    pub fills: Vec<Fill>,
}

impl MarketOrderReport {
    /// Quantity-weighted average fill price, zero when nothing filled
    pub fn average_fill_price(&self) -> Decimal {
        let total_qty: Decimal = self.fills.iter().map(|f| f.qty).sum();
        if total_qty.is_zero() {
            return Decimal::ZERO;
        }

        let total_cost: Decimal = self.fills.iter().map(|f| f.price * f.qty).sum();
        total_cost / total_qty
    }
}

/// Order-list (OCO) state as reported by the exchange
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListReport {
    pub order_list_id: i64,
    #[serde(default)]
    pub list_order_status: Option<String>,
    #[serde(default)]
    pub list_status_type: Option<String>,
    #[serde(default)]
    pub list_client_order_id: Option<String>,
}

/// Result of an OCO submission: the exchange's order list plus the plan that was sent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcoOrderReport {
    pub order_list: OrderListReport,
    pub plan: BracketPlan,
}
