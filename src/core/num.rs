//! Numeric helpers for price and size arithmetic.
//!
//! All prices and sizes are `Decimal`; directional rounding is expressed
//! through [`rust_decimal::RoundingStrategy`] so quantization never drifts
//! the way repeated float rounding does.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round down (toward negative infinity) to `decimals` places.
#[must_use]
pub fn round_down(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::ToNegativeInfinity)
}

/// Round up (toward positive infinity) to `decimals` places.
#[must_use]
pub fn round_up(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::ToPositiveInfinity)
}

/// Divide, returning `default` when the denominator is zero.
#[must_use]
pub fn safe_divide(numerator: Decimal, denominator: Decimal, default: Decimal) -> Decimal {
    if denominator.is_zero() {
        default
    } else {
        numerator / denominator
    }
}

/// Clamp `value` into `[min, max]`.
#[must_use]
pub fn clamp(value: Decimal, min: Decimal, max: Decimal) -> Decimal {
    value.max(min).min(max)
}

/// Mid price of a bid/ask pair.
#[must_use]
pub fn mid_price(bid: Decimal, ask: Decimal) -> Decimal {
    (bid + ask) / Decimal::TWO
}

/// Absolute spread between bid and ask.
#[must_use]
pub fn spread(bid: Decimal, ask: Decimal) -> Decimal {
    (ask - bid).abs()
}

/// Spread as a percentage of the mid price. Zero mid yields zero.
#[must_use]
pub fn spread_pct(bid: Decimal, ask: Decimal) -> Decimal {
    let mid = mid_price(bid, ask);
    safe_divide(spread(bid, ask), mid, Decimal::ZERO) * Decimal::ONE_HUNDRED
}

/// Profit/loss percentage of `current` against `entry`. Zero entry yields zero.
#[must_use]
pub fn pnl_pct(entry: Decimal, current: Decimal) -> Decimal {
    safe_divide(current - entry, entry, Decimal::ZERO) * Decimal::ONE_HUNDRED
}

/// Number of decimal places implied by a tick size (0.01 -> 2).
#[must_use]
pub fn tick_decimals(tick_size: Decimal) -> u32 {
    tick_size.normalize().scale()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn round_down_truncates() {
        assert_eq!(round_down(dec!(0.4567), 2), dec!(0.45));
        assert_eq!(round_down(dec!(0.45), 2), dec!(0.45));
        assert_eq!(round_down(dec!(0.999999), 4), dec!(0.9999));
    }

    #[test]
    fn round_up_ceils() {
        assert_eq!(round_up(dec!(0.4501), 2), dec!(0.46));
        assert_eq!(round_up(dec!(0.45), 2), dec!(0.45));
        assert_eq!(round_up(dec!(0.440001), 2), dec!(0.45));
    }

    #[test]
    fn rounding_brackets_the_value() {
        let values = [dec!(0.12345), dec!(0.5), dec!(0.987654), dec!(73.0001)];
        for v in values {
            for d in 0..5u32 {
                let down = round_down(v, d);
                let up = round_up(v, d);
                assert!(down <= v && v <= up, "{v} not bracketed at {d} dp");

                let quantum = Decimal::new(1, d);
                assert!(v - down < quantum);
                assert!(up - v < quantum);
            }
        }
    }

    #[test]
    fn safe_divide_handles_zero_denominator() {
        assert_eq!(safe_divide(dec!(10), dec!(2), Decimal::ZERO), dec!(5));
        assert_eq!(safe_divide(dec!(10), Decimal::ZERO, dec!(-1)), dec!(-1));
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp(dec!(5), dec!(0), dec!(10)), dec!(5));
        assert_eq!(clamp(dec!(-5), dec!(0), dec!(10)), dec!(0));
        assert_eq!(clamp(dec!(15), dec!(0), dec!(10)), dec!(10));
    }

    #[test]
    fn mid_and_spread() {
        assert_eq!(mid_price(dec!(0.48), dec!(0.49)), dec!(0.485));
        assert_eq!(spread(dec!(0.48), dec!(0.49)), dec!(0.01));
        assert_eq!(spread(dec!(0.49), dec!(0.48)), dec!(0.01));
    }

    #[test]
    fn spread_pct_of_mid() {
        // (0.01 / 0.485) * 100 ~= 2.06%
        let pct = spread_pct(dec!(0.48), dec!(0.49));
        assert!(pct > dec!(2.06) && pct < dec!(2.07));
        assert_eq!(spread_pct(Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn pnl_pct_directional() {
        assert_eq!(pnl_pct(dec!(0.50), dec!(0.485)), dec!(-3));
        assert_eq!(pnl_pct(dec!(0.40), dec!(0.44)), dec!(10));
        assert_eq!(pnl_pct(Decimal::ZERO, dec!(0.5)), Decimal::ZERO);
    }

    #[test]
    fn tick_decimals_from_tick_size() {
        assert_eq!(tick_decimals(dec!(0.01)), 2);
        assert_eq!(tick_decimals(dec!(0.001)), 3);
        assert_eq!(tick_decimals(dec!(0.010)), 2);
        assert_eq!(tick_decimals(dec!(1)), 0);
    }
}
