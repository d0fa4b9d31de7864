//! Percentage helpers.
//!
//! RULE: every rate in the crate goes through `safe_percentage`.
//! SQL returns raw sums only; no rate is computed in a query.

use serde::{Deserialize, Serialize};

/// `numerator / denominator × 100`, rounded to two decimals.
///
/// Returns exactly `0.0` when `denominator` is zero, so callers never see
/// NaN or infinity. Rounding happens on the exact quotient in hundredths
/// of a percent, halves away from zero, so 23/160 gives 14.38.
pub fn safe_percentage(numerator: i64, denominator: i64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let num = i128::from(numerator) * 10_000;
    let den = i128::from(denominator);
    let magnitude = (num.abs() * 2 + den.abs()) / (den.abs() * 2);
    let hundredths = if (num < 0) != (den < 0) { -magnitude } else { magnitude };
    hundredths as f64 / 100.0
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The three rates reported at every level of the hierarchy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    pub tasa_respuesta:  f64,
    pub tasa_conversion: f64,
    pub tasa_entrega:    f64,
}

impl Rates {
    pub fn from_counts(enviados: i64, fallidos: i64, respuestas: i64, agendados: i64) -> Self {
        Self {
            tasa_respuesta:  safe_percentage(respuestas, enviados),
            tasa_conversion: safe_percentage(agendados, enviados),
            tasa_entrega:    safe_percentage(enviados - fallidos, enviados),
        }
    }
}
