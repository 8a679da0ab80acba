//! Reusable conversions bindings compose their registrations from.

use crate::domain::commands::{Command, IncreaseDecrease, UpDown};
use crate::domain::state::{ConversionError, OnOff, Percent, State};
use crate::domain::{Number, RawValue};
use rust_decimal::Decimal;

/// Reads a level on `[0, max]` as a percentage. A zero level reads as `OFF`, like a dimmer that is switched off.
pub fn scaled_level_to_state(raw: &RawValue, max: Decimal) -> Result<State, ConversionError> {
    let level = match raw {
        RawValue::Null => return Ok(State::Undefined),
        RawValue::Number(number) => number.to_decimal(),
        RawValue::Text(text) => text.trim().parse::<Decimal>().ok(),
        RawValue::Bool(_) => None,
    }
    .ok_or_else(|| ConversionError::Unsupported {
        from: format!("'{}'", raw),
        to: "level".to_string(),
    })?;

    if level <= Decimal::ZERO {
        return Ok(State::OnOff(OnOff::Off));
    }
    Ok(State::Percent(Percent::from_scale(level, max)))
}

/// Writes a percentage or on/off state as a level on `[0, max]`.
pub fn state_to_scaled_level(state: &State, max: Decimal) -> Result<RawValue, ConversionError> {
    let level = match state {
        State::Percent(percent) => percent.to_scale(max),
        State::OnOff(OnOff::On) => max,
        State::OnOff(OnOff::Off) => Decimal::ZERO,
        other => {
            return Err(ConversionError::Unsupported {
                from: other.kind().to_string(),
                to: "level".to_string(),
            });
        }
    };
    Ok(RawValue::Number(Number::from_decimal(level)))
}

/// Steps the current percentage up or down. An unknown or switched off target starts from zero.
pub fn step_percent(command: &Command, current: Option<&State>, step: Decimal) -> Result<State, ConversionError> {
    let base = match current {
        Some(State::Percent(percent)) => percent.value(),
        Some(State::OnOff(OnOff::On)) => Decimal::ONE_HUNDRED,
        _ => Decimal::ZERO,
    };

    match command {
        Command::IncreaseDecrease(IncreaseDecrease::Increase) => Ok(State::percent(base + step)),
        Command::IncreaseDecrease(IncreaseDecrease::Decrease) => Ok(State::percent(base - step)),
        other => Err(ConversionError::Unsupported {
            from: other.to_string(),
            to: "percent step".to_string(),
        }),
    }
}

/// `UP` opens a roller shutter fully (0 %), `DOWN` closes it (100 %).
pub fn up_down_percent(command: &Command, _current: Option<&State>) -> Result<State, ConversionError> {
    match command {
        Command::UpDown(UpDown::Up) => Ok(State::Percent(Percent::ZERO)),
        Command::UpDown(UpDown::Down) => Ok(State::Percent(Percent::HUNDRED)),
        other => Err(ConversionError::Unsupported {
            from: other.to_string(),
            to: "percent".to_string(),
        }),
    }
}
