//! Normalization of raw operator input before anything is sent to the device.

use shared::domain::PanelConfig;

use crate::error::InputError;

/// Parses an rpm entry the way a number field does: leading integer prefix,
/// falling back to `min_rpm` when nothing parses, then clamped into range.
pub fn normalize_rpm(raw: &str, config: &PanelConfig) -> u32 {
    let parsed = leading_integer(raw).unwrap_or(i64::from(config.min_rpm));
    clamp_rpm(parsed, config)
}

pub fn clamp_rpm(value: i64, config: &PanelConfig) -> u32 {
    // max/min instead of clamp: a misordered config must not panic here
    let clamped = value
        .max(i64::from(config.min_rpm))
        .min(i64::from(config.max_rpm));
    u32::try_from(clamped).unwrap_or(config.min_rpm)
}

pub fn parse_divisions(raw: &str) -> Result<u32, InputError> {
    let divisions = leading_integer(raw).ok_or(InputError::TooFewDivisions)?;
    if divisions < 2 {
        return Err(InputError::TooFewDivisions);
    }
    u32::try_from(divisions).map_err(|_| InputError::TooManyDivisions)
}

pub fn parse_angle(raw: &str) -> Result<f64, InputError> {
    leading_float(raw)
        .filter(|angle| angle.is_finite())
        .ok_or(InputError::InvalidAngle)
}

fn leading_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

fn leading_float(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Longest prefix that reads as a number: "12.5deg" -> 12.5
    trimmed
        .char_indices()
        .map(|(idx, ch)| idx + ch.len_utf8())
        .rev()
        .find_map(|end| trimmed[..end].parse::<f64>().ok())
}
