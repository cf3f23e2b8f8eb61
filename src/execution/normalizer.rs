use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::BotError;
use crate::Result;

/// Base-asset precision accepted by the exchange
pub const QUANTITY_DECIMALS: u32 = 8;
/// Digits after the point in price strings sent to the exchange
pub const PRICE_DECIMALS: usize = 8;

/// Floor a quantity to the symbol's lot step.
///
/// Fails if the quantity is under `min_qty`. The result is a multiple of
/// `step_size`, never above the input, truncated to 8 decimals.
pub fn adjust_to_lot_size(quantity: Decimal, min_qty: Decimal, step_size: Decimal) -> Result<Decimal> {
    if quantity < min_qty {
        return Err(BotError::BelowMinimumQuantity { quantity, min_qty });
    }

    let adjusted = floor_to_increment(quantity, step_size, "step_size")?;
    Ok(adjusted.round_dp_with_strategy(QUANTITY_DECIMALS, RoundingStrategy::ToZero))
}

/// Floor a price to the symbol's tick and format it with exactly 8 decimals
pub fn adjust_to_tick_size(price: Decimal, tick_size: Decimal) -> Result<String> {
    let adjusted = floor_to_increment(price, tick_size, "tick_size")?;
    let truncated = adjusted.round_dp_with_strategy(PRICE_DECIMALS as u32, RoundingStrategy::ToZero);
    Ok(format!("{:.prec$}", truncated, prec = PRICE_DECIMALS))
}

/// Check an order's value against the symbol's minimum notional
pub fn validate_notional(price: Decimal, quantity: Decimal, min_notional: Decimal) -> Result<Decimal> {
    let notional = price.checked_mul(quantity).ok_or_else(|| {
        BotError::InvalidParameter(format!("notional of {} x {} overflows", price, quantity))
    })?;

    if notional < min_notional {
        return Err(BotError::NotionalTooLow {
            notional,
            min_notional,
        });
    }

    Ok(notional)
}

fn floor_to_increment(value: Decimal, increment: Decimal, name: &str) -> Result<Decimal> {
    if increment <= Decimal::ZERO {
        return Err(BotError::InvalidParameter(format!(
            "{} must be positive, got {}",
            name, increment
        )));
    }

    let steps = value
        .checked_div(increment)
        .ok_or_else(|| {
            BotError::InvalidParameter(format!("{} / {} {} overflows", value, name, increment))
        })?
        .floor();
    steps.checked_mul(increment).ok_or_else(|| {
        BotError::InvalidParameter(format!("{} steps of {} {} overflow", steps, name, increment))
    })
}
