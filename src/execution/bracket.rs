use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::normalizer::adjust_to_tick_size;
use crate::config::Thresholds;
use crate::error::BotError;
use crate::models::BracketPlan;
use crate::Result;

/// Price multiplier for a percentage move up (gain) or down (loss)
pub fn percentage_to_multiplier(percentage: Decimal, is_loss: bool) -> Decimal {
    let fraction = percentage / Decimal::ONE_HUNDRED;
    if is_loss {
        Decimal::ONE - fraction
    } else {
        Decimal::ONE + fraction
    }
}

/// Apply a percentage move to a base price
///
/// Moves compound: +p% followed by -p% lands below the start
/// (`base * (1 - (p/100)^2)`), so the two directions are not inverses.
pub fn calculate_price_with_percentage(base_price: Decimal, percentage: Decimal, is_loss: bool) -> Decimal {
    base_price * percentage_to_multiplier(percentage, is_loss)
}

/// Percentage change from `original_price` to `current_price`
pub fn calculate_percentage_change(original_price: Decimal, current_price: Decimal) -> Result<Decimal> {
    if original_price.is_zero() {
        return Err(BotError::InvalidParameter(
            "original price cannot be zero".to_string(),
        ));
    }

    Ok((current_price - original_price) / original_price * Decimal::ONE_HUNDRED)
}

/// Take-profit and stop-loss distances around a reference price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BracketPolicy {
    /// Distance above the reference price (%)
    pub take_profit_percentage: Decimal,
    /// Distance below the reference price (%), must stay under 100
    pub stop_loss_percentage: Decimal,
}

impl From<&Thresholds> for BracketPolicy {
    fn from(thresholds: &Thresholds) -> Self {
        Self {
            take_profit_percentage: thresholds.take_profit_percentage,
            stop_loss_percentage: thresholds.stop_loss_percentage,
        }
    }
}

impl BracketPolicy {
    pub fn new(take_profit_percentage: Decimal, stop_loss_percentage: Decimal) -> Self {
        Self {
            take_profit_percentage,
            stop_loss_percentage,
        }
    }

    /// Reject percentages that would produce a non-positive or inverted bracket
    pub fn validate(&self) -> Result<()> {
        if self.take_profit_percentage <= Decimal::ZERO {
            return Err(BotError::InvalidPercentage {
                percentage: self.take_profit_percentage,
                reason: "take-profit percentage must be positive".to_string(),
            });
        }

        if self.stop_loss_percentage <= Decimal::ZERO {
            return Err(BotError::InvalidPercentage {
                percentage: self.stop_loss_percentage,
                reason: "stop-loss percentage must be positive".to_string(),
            });
        }

        if self.stop_loss_percentage >= Decimal::ONE_HUNDRED {
            return Err(BotError::InvalidPercentage {
                percentage: self.stop_loss_percentage,
                reason: "stop-loss at or beyond 100% gives a non-positive price".to_string(),
            });
        }

        Ok(())
    }

    /// Compute both legs from one reference price and align them to the tick size
    pub fn plan(
        &self,
        symbol: &str,
        quantity: Decimal,
        reference_price: Decimal,
        tick_size: Decimal,
    ) -> Result<BracketPlan> {
        self.validate()?;

        if reference_price <= Decimal::ZERO {
            return Err(BotError::InvalidParameter(format!(
                "reference price must be positive, got {}",
                reference_price
            )));
        }

        let take_profit_raw =
            calculate_price_with_percentage(reference_price, self.take_profit_percentage, false);
        let stop_loss_raw =
            calculate_price_with_percentage(reference_price, self.stop_loss_percentage, true);

        // A stop below one tick floors to zero
        if stop_loss_raw < tick_size {
            return Err(BotError::InvalidParameter(format!(
                "stop-loss price {} rounds to zero with tick size {}",
                stop_loss_raw, tick_size
            )));
        }

        let take_profit_price = adjust_to_tick_size(take_profit_raw, tick_size)?;
        let stop_loss_price = adjust_to_tick_size(stop_loss_raw, tick_size)?;

        tracing::debug!(
            symbol,
            %reference_price,
            take_profit = %take_profit_price,
            stop_loss = %stop_loss_price,
            "Planned bracket"
        );

        Ok(BracketPlan {
            symbol: symbol.to_string(),
            quantity,
            take_profit_price,
            stop_loss_price,
        })
    }
}

/// Whether the price has risen enough above the bracket's reference to re-place it
pub fn should_reprice(reference_price: Decimal, current_price: Decimal, trigger_percentage: Decimal) -> bool {
    match calculate_percentage_change(reference_price, current_price) {
        Ok(change) => change >= trigger_percentage,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_multipliers() {
        assert_eq!(percentage_to_multiplier(dec!(50), false), dec!(1.5));
        assert_eq!(percentage_to_multiplier(dec!(0.5), true), dec!(0.995));
    }

    #[test]
    fn test_price_with_percentage() {
        assert_eq!(calculate_price_with_percentage(dec!(200), dec!(10), false), dec!(220));
        assert_eq!(calculate_price_with_percentage(dec!(200), dec!(10), true), dec!(180));
    }

    #[test]
    fn test_percentage_round_trip_is_not_exact() {
        let base = dec!(100);

        for pct in [dec!(0.1), dec!(0.5), dec!(1), dec!(5)] {
            let up = calculate_price_with_percentage(base, pct, false);
            let back = calculate_price_with_percentage(up, pct, true);

            // base * (1 - (pct/100)^2)
            let drift = base - back;
            let expected = base * (pct / dec!(100)) * (pct / dec!(100));
            assert_eq!(drift, expected);
            assert!(back < base);
        }

        let small = calculate_price_with_percentage(
            calculate_price_with_percentage(base, dec!(0.5), false),
            dec!(0.5),
            true,
        );
        assert!((base - small).abs() < dec!(0.01));
    }

    #[test]
    fn test_percentage_change() {
        assert_eq!(calculate_percentage_change(dec!(100), dec!(110)).unwrap(), dec!(10));
        assert_eq!(calculate_percentage_change(dec!(100), dec!(95)).unwrap(), dec!(-5));
        assert!(calculate_percentage_change(Decimal::ZERO, dec!(1)).is_err());
    }

    #[test]
    fn test_plan_uses_same_reference_for_both_legs() {
        let policy = BracketPolicy::new(dec!(50), dec!(0.5));
        let plan = policy.plan("BNBUSDT", dec!(1.234), dec!(612.34), dec!(0.01)).unwrap();

        // 612.34 * 1.5 = 918.51, 612.34 * 0.995 = 609.2783
        assert_eq!(plan.take_profit_price, "918.51000000");
        assert_eq!(plan.stop_loss_price, "609.27000000");
        assert_eq!(plan.quantity, dec!(1.234));
        assert_eq!(plan.symbol, "BNBUSDT");
    }

    #[test]
    fn test_plan_rejects_full_stop_loss() {
        let policy = BracketPolicy::new(dec!(10), dec!(100));
        let err = policy.plan("BNBUSDT", dec!(1), dec!(600), dec!(0.01)).unwrap_err();
        assert!(matches!(err, BotError::InvalidPercentage { .. }));

        let policy = BracketPolicy::new(dec!(10), dec!(150));
        assert!(policy.plan("BNBUSDT", dec!(1), dec!(600), dec!(0.01)).is_err());
    }

    #[test]
    fn test_plan_rejects_stop_below_one_tick() {
        let policy = BracketPolicy::new(dec!(10), dec!(99.9));
        let err = policy.plan("XUSDT", dec!(1), dec!(5), dec!(0.01)).unwrap_err();
        assert!(matches!(err, BotError::InvalidParameter(_)));
    }

    #[test]
    fn test_plan_rejects_non_positive_reference() {
        let policy = BracketPolicy::new(dec!(10), dec!(1));
        assert!(policy.plan("BNBUSDT", dec!(1), Decimal::ZERO, dec!(0.01)).is_err());
    }

    #[test]
    fn test_should_reprice() {
        assert!(should_reprice(dec!(100), dec!(100.5), dec!(0.5)));
        assert!(should_reprice(dec!(100), dec!(101), dec!(0.5)));
        assert!(!should_reprice(dec!(100), dec!(100.4), dec!(0.5)));
        assert!(!should_reprice(dec!(100), dec!(90), dec!(0.5)));
    }
}
