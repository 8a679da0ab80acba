use crate::domain::Number;
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// A protocol-native value as produced by a binding's decoder, or consumed by its encoder.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub enum RawValue {
    Null,
    Bool(bool),
    #[serde(serialize_with = "serialize_number")]
    Number(Number),
    Text(String),
}

impl RawValue {
    /// Reads a value from its textual wire form: `null`, `true`/`false`, a number, or anything else as text.
    pub fn parse(text: &str) -> RawValue {
        let text = text.trim();
        match text {
            "null" => RawValue::Null,
            "true" => RawValue::Bool(true),
            "false" => RawValue::Bool(false),
            _ => text
                .parse::<Number>()
                .ok()
                .filter(|number| number.as_f64().is_finite())
                .map(RawValue::Number)
                .unwrap_or_else(|| RawValue::Text(text.to_string())),
        }
    }
}

impl Display for RawValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RawValue::Null => write!(f, "null"),
            RawValue::Bool(value) => write!(f, "{}", value),
            RawValue::Number(number) => write!(f, "{}", number),
            RawValue::Text(text) => write!(f, "{}", text),
        }
    }
}

fn serialize_number<S: serde::Serializer>(number: &Number, serializer: S) -> Result<S::Ok, S::Error> {
    match number {
        Number::PositiveInt(n) => serializer.serialize_u64(*n),
        Number::NegativeInt(n) => serializer.serialize_i64(*n),
        Number::Float(n) => serializer.serialize_f64(*n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("null", RawValue::Null)]
    #[case("true", RawValue::Bool(true))]
    #[case(" 128 ", RawValue::Number(Number::PositiveInt(128)))]
    #[case("-0.5", RawValue::Number(Number::Float(-0.5)))]
    #[case("PLAYING", RawValue::Text("PLAYING".to_string()))]
    fn parses_the_wire_form(#[case] input: &str, #[case] expected: RawValue) {
        assert_eq!(RawValue::parse(input), expected);
    }

    #[test]
    fn displays_the_wire_form() {
        assert_eq!(RawValue::Number(Number::PositiveInt(255)).to_string(), "255");
        assert_eq!(RawValue::Bool(false).to_string(), "false");
    }
}
