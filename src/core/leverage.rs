//! Leverage multipliers encoded in destination column names, e.g. `UPRO (3x L)`.

use regex::Regex;
use std::sync::OnceLock;

fn multiplier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\((\d+(?:\.\d+)?)\s*x\s*([ls])\)").expect("multiplier pattern is valid")
    })
}

/// `(3x L)` → 3.0, `(3x S)` → -3.0, anything else → 1.0. Case-insensitive.
pub fn parse_multiplier(column_name: &str) -> f64 {
    let lower = column_name.to_lowercase();
    let Some(caps) = multiplier_pattern().captures(&lower) else {
        return 1.0;
    };

    let magnitude: f64 = match caps[1].parse() {
        Ok(value) => value,
        Err(_) => return 1.0,
    };

    if &caps[2] == "s" {
        -magnitude
    } else {
        magnitude
    }
}

/// Σ value × multiplier over `(column name, value)` pairs.
pub fn adjusted_total<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    values
        .into_iter()
        .map(|(column, value)| value * parse_multiplier(column))
        .sum()
}
