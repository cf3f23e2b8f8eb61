use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Url};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use super::ExchangeClient;
use crate::config::BinanceConfig;
use crate::error::BotError;
use crate::models::{
    Candle, ExchangeFilters, Fill, MarketOrderReport, OcoOrderReport, OcoOrderRequest,
    OrderAmount, OrderIntent, OrderListReport, SymbolFilter,
};
use crate::Result;

type HmacSha256 = Hmac<Sha256>;

// Type alias for the rate limiter to simplify signatures
type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Client for the Binance spot REST API
///
/// Cloneable; all clones share the same request pacer.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    recv_window_ms: u64,
    rate_limiter: Arc<BinanceRateLimiter>,
}

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    #[serde(default)]
    balances: Vec<BalanceEntry>,
}

#[derive(Debug, Deserialize)]
struct BalanceEntry {
    asset: String,
    free: Decimal,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfoResponse {
    #[serde(default)]
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    #[serde(default)]
    filters: Vec<SymbolFilter>,
}

#[derive(Debug, Deserialize)]
struct TickerPriceResponse {
    price: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    symbol: String,
    order_id: i64,
    status: String,
    #[serde(default)]
    executed_qty: Decimal,
    #[serde(default)]
    cummulative_quote_qty: Decimal,
    #[serde(default)]
    fills: Vec<Fill>,
}

// ============== Implementation ==============

impl BinanceClient {
    pub fn new(config: &BinanceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        let requests_per_minute = NonZeroU32::new(config.requests_per_minute).ok_or_else(|| {
            BotError::InvalidParameter("requests_per_minute must be greater than 0".to_string())
        })?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(requests_per_minute)));

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            recv_window_ms: config.recv_window_ms,
            rate_limiter,
        })
    }

    /// HMAC-SHA256 of the query string, hex encoded
    fn sign(&self, query: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| BotError::InvalidParameter(format!("Invalid API secret: {}", e)))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| BotError::InvalidParameter(format!("Invalid base URL: {}", e)))?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    async fn public_get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let url = self.endpoint(path, params)?;
        self.send(self.client.get(url)).await
    }

    /// USER_DATA / TRADE endpoint: adds timestamp + recvWindow and signs the query
    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let mut params = params.to_vec();
        params.push(("recvWindow", self.recv_window_ms.to_string()));
        params.push(("timestamp", Utc::now().timestamp_millis().to_string()));

        let mut url = self.endpoint(path, &params)?;
        let signature = self.sign(url.query().unwrap_or_default())?;
        url.query_pairs_mut().append_pair("signature", &signature);

        let request = self
            .client
            .request(method, url)
            .header("X-MBX-APIKEY", &self.api_key);
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = api_error(status.as_u16(), &body);
            tracing::warn!("Binance API error: {}", err);
            return Err(err);
        }

        Ok(serde_json::from_str(&body)?)
    }
}

fn api_error(status: u16, body: &str) -> BotError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => BotError::Api {
            status,
            code: parsed.code,
            msg: parsed.msg,
        },
        Err(_) => BotError::Api {
            status,
            code: 0,
            msg: body.to_string(),
        },
    }
}

/// Decimal string for the wire, without trailing zeros
fn wire_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

fn kline_time(row: &[serde_json::Value], idx: usize) -> Result<DateTime<Utc>> {
    row.get(idx)
        .and_then(|v| v.as_i64())
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .ok_or_else(|| BotError::InvalidResponse(format!("kline field {} is not a timestamp", idx)))
}

fn kline_decimal(row: &[serde_json::Value], idx: usize) -> Result<Decimal> {
    let raw = row
        .get(idx)
        .and_then(|v| v.as_str())
        .ok_or_else(|| BotError::InvalidResponse(format!("kline field {} is not a string", idx)))?;

    raw.parse()
        .map_err(|e| BotError::InvalidResponse(format!("kline field {} ({}): {}", idx, raw, e)))
}

/// `[openTime, open, high, low, close, volume, closeTime, ...]`
fn parse_kline(row: &[serde_json::Value]) -> Result<Candle> {
    Ok(Candle {
        open_time: kline_time(row, 0)?,
        open: kline_decimal(row, 1)?,
        high: kline_decimal(row, 2)?,
        low: kline_decimal(row, 3)?,
        close: kline_decimal(row, 4)?,
        volume: kline_decimal(row, 5)?,
        close_time: kline_time(row, 6)?,
    })
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    /// Endpoint: GET /api/v3/account (signed)
    async fn get_account_balances(&self) -> Result<HashMap<String, Decimal>> {
        let account: AccountResponse = self
            .signed(
                Method::GET,
                "/api/v3/account",
                &[("omitZeroBalances", "true".to_string())],
            )
            .await?;

        Ok(account
            .balances
            .into_iter()
            .map(|b| (b.asset, b.free))
            .collect())
    }

    /// Endpoint: GET /api/v3/exchangeInfo?symbol={symbol}
    async fn get_symbol_filters(&self, symbol: &str) -> Result<ExchangeFilters> {
        let info: ExchangeInfoResponse = self
            .public_get("/api/v3/exchangeInfo", &[("symbol", symbol.to_string())])
            .await?;

        let symbol_info = info
            .symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| BotError::FilterNotFound {
                symbol: symbol.to_string(),
                filter: "PRICE_FILTER".to_string(),
            })?;

        let filters = ExchangeFilters::from_symbol_filters(symbol, &symbol_info.filters)?;
        tracing::debug!(
            symbol,
            tick_size = %filters.tick_size,
            step_size = %filters.step_size,
            min_qty = %filters.min_qty,
            min_notional = %filters.min_notional,
            "Fetched symbol filters"
        );

        Ok(filters)
    }

    /// Endpoint: GET /api/v3/klines?symbol={symbol}&interval={interval}&limit={limit}
    async fn get_klines(&self, symbol: &str, interval: &str, limit: Option<u16>) -> Result<Vec<Candle>> {
        let mut params = vec![
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
        ];
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }

        let rows: Vec<Vec<serde_json::Value>> = self.public_get("/api/v3/klines", &params).await?;
        rows.iter().map(|row| parse_kline(row)).collect()
    }

    /// Endpoint: GET /api/v3/ticker/price?symbol={symbol}
    async fn get_ticker_price(&self, symbol: &str) -> Result<Decimal> {
        let ticker: TickerPriceResponse = self
            .public_get("/api/v3/ticker/price", &[("symbol", symbol.to_string())])
            .await?;
        Ok(ticker.price)
    }

    /// Endpoint: POST /api/v3/order (signed)
    async fn submit_market_order(&self, order: &OrderIntent) -> Result<MarketOrderReport> {
        let mut params = vec![
            ("symbol", order.symbol.clone()),
            ("side", order.side.as_str().to_string()),
            ("type", "MARKET".to_string()),
        ];
        match order.amount {
            OrderAmount::Quote(amount) => params.push(("quoteOrderQty", wire_decimal(amount))),
            OrderAmount::Base(quantity) => params.push(("quantity", wire_decimal(quantity))),
        }
        params.push(("newClientOrderId", uuid::Uuid::new_v4().simple().to_string()));
        params.push(("newOrderRespType", "FULL".to_string()));

        let response: OrderResponse = self.signed(Method::POST, "/api/v3/order", &params).await?;

        tracing::info!(
            symbol = %response.symbol,
            order_id = response.order_id,
            status = %response.status,
            executed_qty = %response.executed_qty,
            "Market order placed"
        );

        Ok(MarketOrderReport {
            symbol: response.symbol,
            order_id: response.order_id,
            side: order.side,
            status: response.status,
            executed_qty: response.executed_qty,
            cummulative_quote_qty: response.cummulative_quote_qty,
            fills: response.fills,
        })
    }

    /// Endpoint: POST /api/v3/orderList/oco (signed)
    async fn submit_oco_order(&self, order: &OcoOrderRequest) -> Result<OcoOrderReport> {
        let plan = &order.plan;
        let params = vec![
            ("symbol", plan.symbol.clone()),
            ("side", order.side.as_str().to_string()),
            ("quantity", wire_decimal(plan.quantity)),
            ("aboveType", "TAKE_PROFIT".to_string()),
            ("aboveStopPrice", plan.take_profit_price.clone()),
            ("belowType", "STOP_LOSS".to_string()),
            ("belowStopPrice", plan.stop_loss_price.clone()),
            ("listClientOrderId", uuid::Uuid::new_v4().simple().to_string()),
        ];

        let order_list: OrderListReport = self
            .signed(Method::POST, "/api/v3/orderList/oco", &params)
            .await?;

        tracing::info!(
            symbol = %plan.symbol,
            order_list_id = order_list.order_list_id,
            take_profit = %plan.take_profit_price,
            stop_loss = %plan.stop_loss_price,
            "OCO order placed"
        );

        Ok(OcoOrderReport {
            order_list,
            plan: plan.clone(),
        })
    }

    /// Endpoint: DELETE /api/v3/orderList (signed)
    async fn cancel_order_list(&self, symbol: &str, order_list_id: i64) -> Result<OrderListReport> {
        let params = [
            ("symbol", symbol.to_string()),
            ("orderListId", order_list_id.to_string()),
        ];
        self.signed(Method::DELETE, "/api/v3/orderList", &params).await
    }

    /// Endpoint: GET /api/v3/orderList (signed)
    async fn get_order_list(&self, order_list_id: i64) -> Result<OrderListReport> {
        self.signed(
            Method::GET,
            "/api/v3/orderList",
            &[("orderListId", order_list_id.to_string())],
        )
        .await
    }
}
