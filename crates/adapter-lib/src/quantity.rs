//! Kubernetes resource quantities in canonical DecimalSI form
//!
//! Values are rendered the way apimachinery canonicalizes them: the
//! mantissa is reduced by powers of 1000 while it stays integral, so
//! `50000m` becomes `50` and `5000` becomes `5k`.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// DecimalSI suffixes indexed by base-1000 exponent, starting at milli
const SUFFIXES: &[(&str, i32)] = &[
    ("m", -3),
    ("", 0),
    ("k", 3),
    ("M", 6),
    ("G", 9),
    ("T", 12),
    ("P", 15),
    ("E", 18),
];

/// Quantity for a whole number, e.g. `NewQuantity(value, DecimalSI)`
pub fn decimal_si(value: i64) -> Quantity {
    Quantity(canonical(value as i128, 0))
}

/// Quantity for a value given in thousandths, e.g. `NewMilliQuantity(milli, DecimalSI)`
pub fn milli_decimal_si(milli: i64) -> Quantity {
    Quantity(canonical(milli as i128, -3))
}

fn canonical(mut mantissa: i128, mut exponent: i32) -> String {
    if mantissa == 0 {
        return "0".to_string();
    }

    while mantissa % 1000 == 0 && exponent < 18 {
        mantissa /= 1000;
        exponent += 3;
    }

    let suffix = SUFFIXES
        .iter()
        .find(|(_, exp)| *exp == exponent)
        .map(|(s, _)| *s)
        .unwrap_or("");

    format!("{}{}", mantissa, suffix)
}

/// Parse an integral DecimalSI quantity back into thousandths.
///
/// Returns `None` for fractional, binary-SI or out-of-range quantities.
pub fn milli_value(quantity: &Quantity) -> Option<i64> {
    let raw = quantity.0.trim();
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '-' || c == '+'))
        .unwrap_or(raw.len());
    let (number, suffix) = raw.split_at(split);

    let exponent = SUFFIXES
        .iter()
        .find(|(s, _)| *s == suffix)
        .map(|(_, exp)| *exp)?;

    let mantissa: i64 = number.parse().ok()?;
    let factor = 10i64.checked_pow((exponent + 3) as u32)?;
    mantissa.checked_mul(factor)
}
