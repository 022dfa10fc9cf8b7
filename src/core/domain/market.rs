//! Market records and parameter profiles.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::id::{MarketId, TokenId};
use super::money::Volume;

/// Named bundle of trading thresholds, referenced by markets via
/// `param_type`. Percentage fields are expressed in percent
/// (`stop_loss_threshold = -2` means minus two percent).
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterProfile {
    pub trade_size: Volume,
    pub max_size: Volume,
    pub min_size: Volume,
    /// Maximum tolerated spread, in percent.
    pub max_spread: Decimal,
    /// Negative percent; positions below this PnL are stopped out.
    pub stop_loss_threshold: Decimal,
    /// Positive percent applied over the average entry for exits.
    pub take_profit_threshold: Decimal,
    /// Rolling volatility above this percent blocks entries.
    pub volatility_threshold: Decimal,
    /// Stop-loss only fires when the spread is at most this percent.
    pub spread_threshold: Decimal,
    /// Hours a market stays risk-off after a stop-loss.
    pub sleep_period_hours: Decimal,
}

impl Default for ParameterProfile {
    fn default() -> Self {
        Self {
            trade_size: dec!(100),
            max_size: dec!(250),
            min_size: dec!(10),
            max_spread: dec!(5),
            stop_loss_threshold: dec!(-2),
            take_profit_threshold: dec!(1),
            volatility_threshold: dec!(10),
            spread_threshold: dec!(3),
            sleep_period_hours: dec!(1),
        }
    }
}

/// Sizing knobs for one market after per-market overrides are applied
/// over its parameter profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketKnobs {
    pub trade_size: Volume,
    pub max_size: Volume,
    pub min_size: Volume,
    /// Percent, as in [`ParameterProfile::max_spread`].
    pub max_spread: Decimal,
}

/// One binary market from the selected-markets catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Market {
    pub condition_id: MarketId,
    pub token1: TokenId,
    pub token2: TokenId,
    pub question: String,
    pub answer1: String,
    pub answer2: String,
    pub enabled: bool,
    /// Name of the parameter profile this market trades under.
    pub param_type: String,
    pub neg_risk: bool,
    pub tick_size: Decimal,
    // Per-market overrides; `None` falls through to the profile.
    pub trade_size: Option<Volume>,
    pub max_size: Option<Volume>,
    pub min_size: Option<Volume>,
    pub max_spread: Option<Decimal>,
}

impl Market {
    /// The market's two outcome tokens, token1 first.
    #[must_use]
    pub fn tokens(&self) -> [&TokenId; 2] {
        [&self.token1, &self.token2]
    }

    /// Outcome label for a token of this market.
    #[must_use]
    pub fn outcome(&self, token: &TokenId) -> &str {
        if *token == self.token1 {
            &self.answer1
        } else {
            &self.answer2
        }
    }

    /// The opposing token, or `None` if `token` is not part of this market.
    #[must_use]
    pub fn opposite_token(&self, token: &TokenId) -> Option<&TokenId> {
        if *token == self.token1 {
            Some(&self.token2)
        } else if *token == self.token2 {
            Some(&self.token1)
        } else {
            None
        }
    }

    /// Resolve sizing knobs against a profile, preferring per-market values.
    #[must_use]
    pub fn knobs(&self, profile: &ParameterProfile) -> MarketKnobs {
        MarketKnobs {
            trade_size: self.trade_size.unwrap_or(profile.trade_size),
            max_size: self.max_size.unwrap_or(profile.max_size),
            min_size: self.min_size.unwrap_or(profile.min_size),
            max_spread: self.max_spread.unwrap_or(profile.max_spread),
        }
    }
}
