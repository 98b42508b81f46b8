use chrono::{DateTime, SecondsFormat, Utc};

use crate::value::Number;

/// Formats a number the way it travels in a querystring.
///
/// Integral floats print without a fraction (`2.0` is `2`), exponents carry
/// an explicit sign (`1e+21`), and non-finite values are spelled `NaN`,
/// `Infinity` and `-Infinity`.
pub(crate) fn format_number(number: Number) -> String {
    match number {
        Number::Integer(i) => itoa::Buffer::new().format(i).to_owned(),
        Number::Float(f) if f.is_nan() => "NaN".to_owned(),
        Number::Float(f) if f.is_infinite() => {
            if f.is_sign_positive() { "Infinity" } else { "-Infinity" }.to_owned()
        }
        // -0.0 prints as 0
        Number::Float(f) if f == 0.0 => "0".to_owned(),
        Number::Float(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{f}"),
        Number::Float(f) => {
            let mut buffer = ryu::Buffer::new();
            let formatted = buffer.format_finite(f);
            let formatted = formatted.strip_suffix(".0").unwrap_or(formatted);
            match formatted.split_once('e') {
                Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                    format!("{mantissa}e+{exponent}")
                }
                _ => formatted.to_owned(),
            }
        }
    }
}

/// `2024-01-02T03:04:05.000Z`
pub(crate) fn iso_timestamp(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}
