use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

pub const BINANCE_SPOT_API: &str = "https://api.binance.com";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub binance: BinanceConfig,
    pub trading: TradingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Deserialize)]
pub struct BinanceConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    /// REST endpoint (e.g. https://testnet.binance.vision for the spot testnet)
    pub base_url: String,
    pub recv_window_ms: u64,
    pub request_timeout_ms: u64,
    /// Client-side pacing of REST calls
    pub requests_per_minute: u32,
}

// Keep credentials out of logs
impl std::fmt::Debug for BinanceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceConfig")
            .field("api_key", &mask(&self.api_key))
            .field("api_secret", &mask(&self.api_secret))
            .field("base_url", &self.base_url)
            .field("recv_window_ms", &self.recv_window_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("requests_per_minute", &self.requests_per_minute)
            .finish()
    }
}

fn mask(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Base asset used when the CLI gets no symbol (e.g. "BNB")
    pub default_symbol: String,
    /// Quote asset appended to every base asset (e.g. "USDT" -> BNBUSDT)
    pub quote_asset: String,
    pub thresholds: Thresholds,
}

impl TradingConfig {
    /// Exchange symbol for a base asset
    pub fn market_symbol(&self, base_asset: &str) -> String {
        format!("{}{}", base_asset, self.quote_asset)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thresholds {
    /// Price rise (%) after which an existing bracket should be re-placed
    pub price_update_trigger: Decimal,
    /// Take-profit distance above the reference price (%)
    pub take_profit_percentage: Decimal,
    /// Stop-loss distance below the reference price (%)
    pub stop_loss_percentage: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("binance.base_url", BINANCE_SPOT_API)?
            .set_default("binance.recv_window_ms", 5000)?
            .set_default("binance.request_timeout_ms", 5000)?
            .set_default("binance.requests_per_minute", 600)?
            .set_default("trading.default_symbol", "BNB")?
            .set_default("trading.quote_asset", "USDT")?
            .set_default("trading.thresholds.price_update_trigger", "0.5")?
            .set_default("trading.thresholds.take_profit_percentage", "50.0")?
            .set_default("trading.thresholds.stop_loss_percentage", "0.5")?
            .set_default("logging.level", "info")?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // BOT__BINANCE__BASE_URL, BOT__TRADING__THRESHOLDS__STOP_LOSS_PERCENTAGE, ...
            .add_source(
                Environment::with_prefix("BOT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            // Plain variables used by existing deployments
            .set_override_option("binance.api_key", std::env::var("BINANCE_API_KEY").ok())?
            .set_override_option(
                "binance.api_secret",
                std::env::var("BINANCE_API_SECRET").ok(),
            )?
            .set_override_option("binance.base_url", std::env::var("BASE_PATH").ok())?;

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let thresholds = &self.trading.thresholds;

        if thresholds.take_profit_percentage <= Decimal::ZERO {
            errors.push("take_profit_percentage must be positive".to_string());
        }

        if thresholds.stop_loss_percentage <= Decimal::ZERO
            || thresholds.stop_loss_percentage >= Decimal::ONE_HUNDRED
        {
            errors.push("stop_loss_percentage must be between 0 and 100".to_string());
        }

        if thresholds.price_update_trigger < Decimal::ZERO {
            errors.push("price_update_trigger cannot be negative".to_string());
        }

        if self.binance.requests_per_minute == 0 {
            errors.push("requests_per_minute must be greater than 0".to_string());
        }

        if self.trading.quote_asset.is_empty() {
            errors.push("quote_asset cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_config() -> AppConfig {
        AppConfig {
            binance: BinanceConfig {
                api_key: "key".to_string(),
                api_secret: "secret".to_string(),
                base_url: BINANCE_SPOT_API.to_string(),
                recv_window_ms: 5000,
                request_timeout_ms: 5000,
                requests_per_minute: 600,
            },
            trading: TradingConfig {
                default_symbol: "BNB".to_string(),
                quote_asset: "USDT".to_string(),
                thresholds: Thresholds {
                    price_update_trigger: dec!(0.5),
                    take_profit_percentage: dec!(50.0),
                    stop_loss_percentage: dec!(0.5),
                },
            },
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_defaults_load_without_files() {
        let config = AppConfig::load_from("does-not-exist").unwrap();

        assert_eq!(config.trading.quote_asset, "USDT");
        assert_eq!(config.trading.thresholds.take_profit_percentage, dec!(50));
        assert_eq!(config.trading.thresholds.stop_loss_percentage, dec!(0.5));
        assert_eq!(config.binance.recv_window_ms, 5000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_market_symbol() {
        let config = sample_config();
        assert_eq!(config.trading.market_symbol("AVNT"), "AVNTUSDT");
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_full_stop_loss() {
        let mut config = sample_config();
        config.trading.thresholds.stop_loss_percentage = dec!(100);
        config.binance.requests_per_minute = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("stop_loss_percentage"));
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let rendered = format!("{:?}", sample_config().binance);
        assert!(!rendered.contains("secret\""));
        assert!(rendered.contains("<redacted>"));
    }
}
