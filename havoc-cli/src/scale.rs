//! Numeric arguments with unit suffixes.
//!
//! Sizes take `b`, `k`, `m`, `g` (powers of 1024); durations take `s`, `m`,
//! `h`, `d`, `y` (a year is 365 days). Suffixes are case-insensitive and a
//! bare number is taken as-is.

use std::time::Duration;

const BYTE_SCALES: &[(char, u64)] = &[('b', 1), ('k', 1 << 10), ('m', 1 << 20), ('g', 1 << 30)];

const TIME_SCALES: &[(char, u64)] = &[
    ('s', 1),
    ('m', 60),
    ('h', 3600),
    ('d', 24 * 3600),
    ('y', 365 * 24 * 3600),
];

fn parse_scaled(s: &str, scales: &[(char, u64)], what: &str) -> Result<u64, String> {
    let s = s.trim();
    let Some(last) = s.chars().last() else {
        return Err(format!("Value {s:?} is an invalid {what}"));
    };
    let (digits, scale) = if last.is_ascii_digit() {
        (s, 1)
    } else {
        let lower = last.to_ascii_lowercase();
        let scale = scales
            .iter()
            .find(|(ch, _)| *ch == lower)
            .map(|(_, scale)| *scale)
            .ok_or_else(|| format!("Illegal {what} specifier {last}"))?;
        (&s[..s.len() - last.len_utf8()], scale)
    };
    let value: u64 = digits.parse().map_err(|_| format!("Invalid number {s}"))?;
    value.checked_mul(scale).ok_or_else(|| format!("Value {s} is too large"))
}

/// `--vm-bytes 128M` style sizes.
pub fn parse_bytes(s: &str) -> Result<u64, String> {
    parse_scaled(s, BYTE_SCALES, "length")
}

/// `--timeout 10m` style durations.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    parse_scaled(s, TIME_SCALES, "time").map(Duration::from_secs)
}
