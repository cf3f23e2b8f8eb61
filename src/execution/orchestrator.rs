use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::bracket::BracketPolicy;
use super::normalizer::{adjust_to_lot_size, validate_notional};
use crate::api::ExchangeClient;
use crate::config::TradingConfig;
use crate::error::{BotError, OperationContext};
use crate::indicators::latest_rsi;
use crate::models::{
    ExchangeFilters, MarketOrderReport, OcoOrderReport, OcoOrderRequest, OrderAmount,
    OrderIntent, OrderListReport, Side,
};
use crate::Result;

/// Sequences balance lookup, filter lookup, normalization and submission
///
/// Every call re-fetches balances and filters; nothing is cached between
/// calls and nothing is retried. Assets are given by their base symbol
/// ("BNB"); the market symbol appends the configured quote asset.
pub struct OrderOrchestrator<C> {
    client: C,
    config: TradingConfig,
}

impl<C: ExchangeClient> OrderOrchestrator<C> {
    pub fn new(client: C, config: TradingConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Free balance of the quote asset (e.g. USDT)
    pub async fn quote_balance(&self) -> Result<Decimal> {
        let quote = self.config.quote_asset.clone();
        self.free_balance(&quote)
            .await
            .in_operation("balance lookup", &quote)
    }

    /// Free balance of any asset, zero when the account holds none
    pub async fn asset_balance(&self, asset: &str) -> Result<Decimal> {
        self.free_balance(asset)
            .await
            .in_operation("balance lookup", asset)
    }

    pub async fn ticker_price(&self, base_asset: &str) -> Result<Decimal> {
        let symbol = self.config.market_symbol(base_asset);
        self.client
            .get_ticker_price(&symbol)
            .await
            .in_operation("ticker price", &symbol)
    }

    /// Last RSI value over the symbol's most recent candles
    pub async fn latest_rsi(&self, base_asset: &str, interval: &str, period: usize) -> Result<f64> {
        let symbol = self.config.market_symbol(base_asset);

        let candles = self
            .client
            .get_klines(&symbol, interval, None)
            .await
            .in_operation("RSI", &symbol)?;

        let closes = candles
            .iter()
            .map(|c| c.close.to_f64())
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| BotError::InvalidResponse("close price out of f64 range".to_string()))
            .in_operation("RSI", &symbol)?;

        let rsi = latest_rsi(&closes, period).in_operation("RSI", &symbol)?;
        tracing::info!(%symbol, interval, period, rsi, "Computed RSI");
        Ok(rsi)
    }

    /// Symbol constraints; fails unless price, lot-size and notional filters are all present
    pub async fn exchange_filters(&self, base_asset: &str) -> Result<ExchangeFilters> {
        let symbol = self.config.market_symbol(base_asset);
        self.client
            .get_symbol_filters(&symbol)
            .await
            .in_operation("filter lookup", &symbol)
    }

    /// Market buy spending `quote_amount` of the quote asset
    pub async fn market_buy(&self, base_asset: &str, quote_amount: Decimal) -> Result<MarketOrderReport> {
        let symbol = self.config.market_symbol(base_asset);
        self.market_buy_inner(&symbol, quote_amount)
            .await
            .in_operation("market buy", &symbol)
    }

    async fn market_buy_inner(&self, symbol: &str, quote_amount: Decimal) -> Result<MarketOrderReport> {
        if quote_amount <= Decimal::ZERO {
            return Err(BotError::InvalidParameter(format!(
                "quote amount must be positive, got {}",
                quote_amount
            )));
        }

        let quote = &self.config.quote_asset;
        let available = self.free_balance(quote).await?;
        if available < quote_amount {
            return Err(BotError::InsufficientBalance {
                asset: quote.clone(),
                available,
                required: quote_amount,
            });
        }

        let order = OrderIntent {
            symbol: symbol.to_string(),
            side: Side::Buy,
            amount: OrderAmount::Quote(quote_amount),
        };
        let report = self.client.submit_market_order(&order).await?;

        tracing::info!(
            symbol,
            %quote_amount,
            executed_qty = %report.executed_qty,
            avg_price = %report.average_fill_price(),
            "Market buy filled"
        );

        Ok(report)
    }

    /// Market sell of the whole free balance, floored to the lot step
    pub async fn market_sell(&self, base_asset: &str) -> Result<MarketOrderReport> {
        let symbol = self.config.market_symbol(base_asset);
        self.market_sell_inner(base_asset, &symbol)
            .await
            .in_operation("market sell", &symbol)
    }

    async fn market_sell_inner(&self, base_asset: &str, symbol: &str) -> Result<MarketOrderReport> {
        let balance = self.free_balance(base_asset).await?;
        if balance.is_zero() {
            return Err(BotError::InsufficientBalance {
                asset: base_asset.to_string(),
                available: balance,
                required: Decimal::ZERO,
            });
        }

        let filters = self.client.get_symbol_filters(symbol).await?;
        let quantity = adjust_to_lot_size(balance, filters.min_qty, filters.step_size)?;
        tracing::info!(symbol, %balance, %quantity, "Adjusted sell quantity");

        let order = OrderIntent {
            symbol: symbol.to_string(),
            side: Side::Sell,
            amount: OrderAmount::Base(quantity),
        };
        let report = self.client.submit_market_order(&order).await?;

        tracing::info!(
            symbol,
            executed_qty = %report.executed_qty,
            avg_price = %report.average_fill_price(),
            "Market sell filled"
        );

        Ok(report)
    }

    /// Protect the whole free balance with a take-profit / stop-loss OCO sell
    ///
    /// Both legs derive from `reference_price` (usually the entry price) using
    /// the configured thresholds.
    pub async fn create_oco(&self, base_asset: &str, reference_price: Decimal) -> Result<OcoOrderReport> {
        let symbol = self.config.market_symbol(base_asset);
        self.create_oco_inner(base_asset, &symbol, reference_price)
            .await
            .in_operation("create OCO", &symbol)
    }

    async fn create_oco_inner(
        &self,
        base_asset: &str,
        symbol: &str,
        reference_price: Decimal,
    ) -> Result<OcoOrderReport> {
        let policy = BracketPolicy::from(&self.config.thresholds);
        policy.validate()?;

        let balance = self.free_balance(base_asset).await?;
        let filters = self.client.get_symbol_filters(symbol).await?;

        if balance.is_zero() || balance < filters.min_qty {
            return Err(BotError::InsufficientBalance {
                asset: base_asset.to_string(),
                available: balance,
                required: filters.min_qty,
            });
        }

        let quantity = adjust_to_lot_size(balance, filters.min_qty, filters.step_size)?;
        let plan = policy.plan(symbol, quantity, reference_price, filters.tick_size)?;

        // The stop leg is the smaller order value of the two
        let stop_price: Decimal = plan.stop_loss_price.parse().map_err(|e| {
            BotError::InvalidParameter(format!("stop-loss price {}: {}", plan.stop_loss_price, e))
        })?;
        validate_notional(stop_price, quantity, filters.min_notional)?;

        tracing::info!(
            symbol,
            %quantity,
            take_profit = %plan.take_profit_price,
            stop_loss = %plan.stop_loss_price,
            "Creating OCO order"
        );

        let request = OcoOrderRequest {
            side: Side::Sell,
            plan,
        };
        self.client.submit_oco_order(&request).await
    }

    pub async fn cancel_oco(&self, base_asset: &str, order_list_id: i64) -> Result<OrderListReport> {
        let symbol = self.config.market_symbol(base_asset);
        let report = self
            .client
            .cancel_order_list(&symbol, order_list_id)
            .await
            .in_operation("cancel OCO", &symbol)?;

        tracing::info!(%symbol, order_list_id, status = ?report.list_order_status, "OCO order cancelled");
        Ok(report)
    }

    /// `listOrderStatus` of an order list (EXECUTING, ALL_DONE, REJECT)
    pub async fn oco_status(&self, order_list_id: i64) -> Result<String> {
        let report = self
            .client
            .get_order_list(order_list_id)
            .await
            .in_operation("OCO status", &order_list_id.to_string())?;

        report
            .list_order_status
            .ok_or(BotError::OrderListNotFound { order_list_id })
            .in_operation("OCO status", &order_list_id.to_string())
    }

    async fn free_balance(&self, asset: &str) -> Result<Decimal> {
        let balances = self.client.get_account_balances().await?;
        let free = balances.get(asset).copied().unwrap_or(Decimal::ZERO);
        tracing::debug!(asset, %free, "Fetched balance");
        Ok(free)
    }
}
