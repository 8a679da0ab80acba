use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;

/// A number as it appears on the wire, before it is converted into a typed state.
#[derive(Clone, Debug)]
pub enum Number {
    PositiveInt(u64),
    NegativeInt(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::PositiveInt(n) => *n as f64,
            Number::NegativeInt(n) => *n as f64,
            Number::Float(n) => *n,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Number::PositiveInt(n) => Some(*n),
            Number::NegativeInt(n) => u64::try_from(*n).ok(),
            Number::Float(_) => None,
        }
    }

    /// Integers convert exactly, floats are rejected when they are not finite.
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Number::PositiveInt(n) => Some(Decimal::from(*n)),
            Number::NegativeInt(n) => Some(Decimal::from(*n)),
            Number::Float(n) => Decimal::from_f64(*n),
        }
    }

    pub fn from_decimal(value: Decimal) -> Number {
        if value.fract().is_zero() {
            if let Some(n) = value.to_u64() {
                return Number::PositiveInt(n);
            }
            if let Some(n) = value.to_i64() {
                return Number::NegativeInt(n);
            }
        }
        Number::Float(value.to_f64().unwrap_or(f64::NAN))
    }
}

impl FromStr for Number {
    type Err = std::num::ParseFloatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(n) = s.parse::<u64>() {
            return Ok(Number::PositiveInt(n));
        }
        if let Ok(n) = s.parse::<i64>() {
            return Ok(Number::NegativeInt(n));
        }
        s.parse::<f64>().map(Number::Float)
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Number::PositiveInt(a), Number::PositiveInt(b)) => a.partial_cmp(b),
            (Number::NegativeInt(a), Number::NegativeInt(b)) => a.partial_cmp(b),
            (Number::PositiveInt(a), Number::NegativeInt(b)) => (*a as i128).partial_cmp(&(*b as i128)),
            (Number::NegativeInt(a), Number::PositiveInt(b)) => (*a as i128).partial_cmp(&(*b as i128)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::PositiveInt(n) => write!(f, "{}", n),
            Number::NegativeInt(n) => write!(f, "{}", n),
            Number::Float(n) => write!(f, "{}", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(Number::PositiveInt(255), Number::PositiveInt(255))]
    #[case(Number::PositiveInt(128), Number::NegativeInt(128))]
    #[case(Number::PositiveInt(20), Number::Float(20.0))]
    #[case(Number::NegativeInt(-5), Number::Float(-5.0))]
    #[case(Number::Float(21.5), Number::Float(21.5))]
    fn equal_readings_compare_equal(#[case] a: Number, #[case] b: Number) {
        assert_eq!(a.partial_cmp(&b), Some(Ordering::Equal));
    }

    #[rstest]
    #[case(Number::PositiveInt(128), Number::PositiveInt(0))]
    #[case(Number::PositiveInt(0), Number::NegativeInt(-7))]
    #[case(Number::PositiveInt(22), Number::Float(21.999))]
    #[case(Number::NegativeInt(-2), Number::NegativeInt(-3))]
    #[case(Number::Float(0.5), Number::NegativeInt(0))]
    fn higher_readings_compare_greater(#[case] a: Number, #[case] b: Number) {
        assert_eq!(a.partial_cmp(&b), Some(Ordering::Greater));
    }

    #[rstest]
    #[case("128", Number::PositiveInt(128))]
    #[case("-3", Number::NegativeInt(-3))]
    #[case("21.5", Number::Float(21.5))]
    fn parses_the_narrowest_representation(#[case] input: &str, #[case] expected: Number) {
        assert_eq!(input.parse::<Number>().unwrap(), expected);
    }

    #[test]
    fn parse_fails_for_text() {
        assert!("warm".parse::<Number>().is_err());
    }

    #[rstest]
    #[case(Decimal::new(255, 0), Number::PositiveInt(255))]
    #[case(Decimal::new(-12, 0), Number::NegativeInt(-12))]
    #[case(Decimal::new(215, 1), Number::Float(21.5))]
    fn converts_from_a_decimal(#[case] input: Decimal, #[case] expected: Number) {
        assert_eq!(Number::from_decimal(input), expected);
    }

    #[test]
    fn integers_convert_to_decimals_exactly() {
        assert_eq!(Number::PositiveInt(u64::MAX).to_decimal(), Some(Decimal::from(u64::MAX)));
        assert_eq!(Number::Float(f64::NAN).to_decimal(), None);
    }
}
