use rust_decimal::{Decimal, RoundingStrategy};
use std::iter::Peekable;
use std::str::Chars;

const DEFAULT_FLOAT_PRECISION: u32 = 6;

/// Expands a printf-like pattern for a numeric value. Supports `%s`, `%d`, `%f`, `%.Nf` and `%%`,
/// anything else is copied verbatim.
pub(super) fn format_number(pattern: &str, value: Decimal) -> String {
    expand(pattern, |conversion, precision| match conversion {
        's' => Some(value.to_string()),
        'd' => Some(value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero).to_string()),
        'f' => {
            let precision = precision.unwrap_or(DEFAULT_FLOAT_PRECISION);
            let rounded = value.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero);
            Some(format!("{:.*}", precision as usize, rounded))
        }
        _ => None,
    })
}

/// Expands a pattern for a textual value, only `%s` and `%%` are substituted.
pub(super) fn format_text(pattern: &str, value: &str) -> String {
    expand(pattern, |conversion, _| (conversion == 's').then(|| value.to_string()))
}

fn expand<F>(pattern: &str, substitute: F) -> String
where
    F: Fn(char, Option<u32>) -> Option<String>,
{
    let mut output = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            output.push(c);
            continue;
        }

        if chars.peek() == Some(&'%') {
            chars.next();
            output.push('%');
            continue;
        }

        let (specifier, precision) = read_precision(&mut chars);
        let replacement = chars.peek().copied().and_then(|conversion| substitute(conversion, precision));
        match replacement {
            Some(replacement) => {
                chars.next();
                output.push_str(&replacement);
            }
            None => {
                output.push('%');
                output.push_str(&specifier);
            }
        }
    }

    output
}

fn read_precision(chars: &mut Peekable<Chars<'_>>) -> (String, Option<u32>) {
    let mut specifier = String::new();
    if chars.peek() != Some(&'.') {
        return (specifier, None);
    }

    specifier.push('.');
    chars.next();
    while let Some(digit) = chars.peek().copied().filter(char::is_ascii_digit) {
        specifier.push(digit);
        chars.next();
    }

    let precision = specifier[1..].parse::<u32>().ok();
    (specifier, precision)
}
