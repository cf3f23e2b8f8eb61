use crate::error::BotError;
use crate::Result;

/// RS used when the average loss is zero.
///
/// Pins RSI at 100 - 100/101 (~99.01) instead of dividing by zero, so a
/// loss-free window saturates just below 100.
const NO_LOSS_RS: f64 = 100.0;

/// Calculate Relative Strength Index (RSI) with Wilder smoothing
///
/// RSI measures the magnitude of recent price changes to evaluate
/// overbought or oversold conditions.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
/// The first value comes from the seed averages over the first `period`
/// price changes; every following close adds one smoothed value. The
/// result therefore holds `prices.len() - period` values, oldest first.
///
/// Series that only start emitting after the first smoothing step are one
/// value shorter; index `i` here lines up with index `i - 1` there, and the
/// latest value is the same.
pub fn calculate_rsi(prices: &[f64], period: usize) -> Result<Vec<f64>> {
    if period == 0 {
        return Err(BotError::InvalidParameter(
            "RSI period must be greater than 0".to_string(),
        ));
    }

    if prices.len() < period + 1 {
        return Err(BotError::InsufficientData {
            required: period + 1,
            actual: prices.len(),
        });
    }

    let period_f = period as f64;

    // Seed averages from the first `period` changes
    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in 1..=period {
        let change = prices[i] - prices[i - 1];
        if change >= 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }

    let mut avg_gain = gains / period_f;
    let mut avg_loss = losses / period_f;

    let mut rsis = Vec::with_capacity(prices.len() - period);
    rsis.push(rsi_from_averages(avg_gain, avg_loss));

    for i in (period + 1)..prices.len() {
        let change = prices[i] - prices[i - 1];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        rsis.push(rsi_from_averages(avg_gain, avg_loss));
    }

    Ok(rsis)
}

/// Most recent RSI value for a price series
pub fn latest_rsi(prices: &[f64], period: usize) -> Result<f64> {
    let rsis = calculate_rsi(prices, period)?;
    rsis.last().copied().ok_or(BotError::InsufficientData {
        required: period + 1,
        actual: prices.len(),
    })
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    let rs = if avg_loss == 0.0 {
        NO_LOSS_RS
    } else {
        avg_gain / avg_loss
    };
    100.0 - (100.0 / (1.0 + rs))
}
