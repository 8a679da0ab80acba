use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// A percentage, always within `[0, 100]`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize)]
#[serde(transparent)]
pub struct Percent(Decimal);

impl Percent {
    pub const ZERO: Percent = Percent(Decimal::ZERO);
    pub const HUNDRED: Percent = Percent(Decimal::ONE_HUNDRED);

    pub fn new(value: Decimal) -> Self {
        Percent(value.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED))
    }

    /// Maps `value` on the scale `[0, max]` to a whole percentage, rounding half away from zero.
    /// Values outside the scale are clamped onto it first.
    pub fn from_scale(value: Decimal, max: Decimal) -> Self {
        if max <= Decimal::ZERO {
            return Percent::ZERO;
        }
        let level = value.clamp(Decimal::ZERO, max);
        let percent = match level.checked_mul(Decimal::ONE_HUNDRED) {
            Some(scaled) => scaled / max,
            None => level / max * Decimal::ONE_HUNDRED,
        };
        Percent::new(percent.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Maps the percentage back onto `[0, max]`, rounding half away from zero.
    pub fn to_scale(&self, max: Decimal) -> Decimal {
        (self.0 * max / Decimal::ONE_HUNDRED).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<u8> for Percent {
    fn from(value: u8) -> Self {
        Percent::new(Decimal::from(value))
    }
}

impl Display for Percent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
