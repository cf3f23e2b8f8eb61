use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the bot
#[derive(Error, Debug)]
pub enum BotError {
    // Indicator errors
    #[error("Not enough data to calculate RSI: need {required} closes, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    // Normalization errors
    #[error("Quantity {quantity} lower than min allowed ({min_qty})")]
    BelowMinimumQuantity { quantity: Decimal, min_qty: Decimal },

    #[error("Notional value {notional} lower than min ({min_notional})")]
    NotionalTooLow {
        notional: Decimal,
        min_notional: Decimal,
    },

    #[error("Invalid percentage {percentage}: {reason}")]
    InvalidPercentage { percentage: Decimal, reason: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // Account / exchange state errors
    #[error("Insufficient {asset} balance: available {available}, required {required}")]
    InsufficientBalance {
        asset: String,
        available: Decimal,
        required: Decimal,
    },

    #[error("No {filter} filter found for symbol {symbol}")]
    FilterNotFound { symbol: String, filter: String },

    #[error("No order list status found for order list {order_list_id}")]
    OrderListNotFound { order_list_id: i64 },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Transport errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Exchange API error (HTTP {status}, code {code}): {msg}")]
    Api { status: u16, code: i64, msg: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid exchange response: {0}")]
    InvalidResponse(String),

    // Context wrapper
    #[error("{operation} failed for {symbol}: {source}")]
    Operation {
        operation: &'static str,
        symbol: String,
        #[source]
        source: Box<BotError>,
    },
}

impl BotError {
    /// Attach the failing operation and symbol to an error
    pub fn in_operation(self, operation: &'static str, symbol: impl Into<String>) -> Self {
        BotError::Operation {
            operation,
            symbol: symbol.into(),
            source: Box::new(self),
        }
    }

    /// The underlying error, with any operation context stripped
    pub fn root(&self) -> &BotError {
        match self {
            BotError::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the failure came from the exchange client rather than local validation
    pub fn is_transport(&self) -> bool {
        matches!(
            self.root(),
            BotError::Http(_)
                | BotError::Api { .. }
                | BotError::Json(_)
                | BotError::InvalidResponse(_)
        )
    }
}

/// Extension for attaching operation context to results
pub trait OperationContext<T> {
    fn in_operation(self, operation: &'static str, symbol: &str) -> Result<T, BotError>;
}

impl<T> OperationContext<T> for Result<T, BotError> {
    fn in_operation(self, operation: &'static str, symbol: &str) -> Result<T, BotError> {
        self.map_err(|e| e.in_operation(operation, symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_root_strips_context() {
        let err = BotError::InsufficientBalance {
            asset: "BNB".to_string(),
            available: Decimal::ZERO,
            required: dec!(0.001),
        }
        .in_operation("market sell", "BNBUSDT");

        assert!(matches!(err.root(), BotError::InsufficientBalance { .. }));
        assert!(err.to_string().starts_with("market sell failed for BNBUSDT"));
        assert!(!err.is_transport());
    }

    #[test]
    fn test_api_error_is_transport() {
        let err = BotError::Api {
            status: 400,
            code: -2010,
            msg: "Account has insufficient balance".to_string(),
        }
        .in_operation("create OCO", "BNBUSDT");

        assert!(err.is_transport());
    }
}
