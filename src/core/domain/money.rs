//! Money units: exact-decimal prices and sizes, plus conversion between
//! human token units and the exchange's base-unit integers.

use rust_decimal::Decimal;

/// A quote or fill price in dollars. Exact decimal arithmetic, never
/// binary floats.
pub type Price = Decimal;

/// A quantity of outcome tokens, held or quoted.
pub type Volume = Decimal;

/// One token unit expressed in the exchange's base units (x 1e6).
pub const BASE_UNITS_PER_TOKEN: u64 = 1_000_000;

/// Convert a base-unit amount into human token units.
#[must_use]
pub fn from_base_units(amount: u64) -> Volume {
    Decimal::from(amount) / Decimal::from(BASE_UNITS_PER_TOKEN)
}

/// Convert human token units into base units, truncating sub-unit dust.
#[must_use]
pub fn to_base_units(amount: Volume) -> u64 {
    let scaled = amount * Decimal::from(BASE_UNITS_PER_TOKEN);
    scaled.trunc().try_into().unwrap_or(0)
}
