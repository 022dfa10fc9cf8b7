//! Position tracking for one outcome token.

use rust_decimal::Decimal;

use super::money::{Price, Volume};
use crate::core::num::round_down;

/// Decimal places kept on stored sizes.
const SIZE_DECIMALS: u32 = 2;
/// Decimal places kept on stored average prices.
const PRICE_DECIMALS: u32 = 4;

/// Long position in one token: size plus size-weighted average entry.
///
/// Positions are long-only; a short on one outcome is expressed as a long
/// on the opposing token. Invariant: `avg_price == 0` exactly when
/// `size == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    size: Volume,
    avg_price: Price,
}

impl Position {
    /// A flat (empty) position.
    #[must_use]
    pub fn flat() -> Self {
        Self::default()
    }

    /// Construct from already-quantized components. Used when adopting an
    /// exchange snapshot wholesale.
    #[must_use]
    pub fn new(size: Volume, avg_price: Price) -> Self {
        if size <= Decimal::ZERO {
            return Self::flat();
        }
        Self {
            size: round_down(size, SIZE_DECIMALS),
            avg_price: avg_price.round_dp(PRICE_DECIMALS),
        }
    }

    /// Current size in token units.
    #[must_use]
    pub fn size(&self) -> Volume {
        self.size
    }

    /// Size-weighted average entry price.
    #[must_use]
    pub fn avg_price(&self) -> Price {
        self.avg_price
    }

    /// True when no tokens are held.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.size.is_zero()
    }

    /// Cost basis of the position (`size * avg_price`).
    #[must_use]
    pub fn notional(&self) -> Price {
        self.size * self.avg_price
    }

    /// Apply a buy fill: size grows, average entry becomes the
    /// size-weighted mean of the old position and the fill.
    pub fn apply_buy(&mut self, size: Volume, price: Price) {
        let total = self.size + size;
        if total <= Decimal::ZERO {
            *self = Self::flat();
            return;
        }
        let new_avg = (self.size * self.avg_price + size * price) / total;
        self.size = round_down(total, SIZE_DECIMALS);
        self.avg_price = new_avg.round_dp(PRICE_DECIMALS);
    }

    /// Apply a sell fill: size shrinks (floored at zero); the average
    /// entry is preserved until the position fully closes, then reset.
    pub fn apply_sell(&mut self, size: Volume) {
        let remaining = (self.size - size).max(Decimal::ZERO);
        if remaining.is_zero() {
            *self = Self::flat();
        } else {
            self.size = round_down(remaining, SIZE_DECIMALS);
        }
    }

    /// Overwrite only the average entry, keeping size. Used by the
    /// avg-only reconcile path.
    pub fn set_avg_price(&mut self, avg_price: Price) {
        if !self.is_flat() {
            self.avg_price = avg_price.round_dp(PRICE_DECIMALS);
        }
    }
}
