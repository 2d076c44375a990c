//! Human-readable byte sizes (`512MB`, `2GB`).

use super::ConfigError;

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;
const TB: u64 = GB * 1024;

/// Parse a size string such as `512MB`, `2 GB`, `64k` or `1048576`.
///
/// Units are binary multiples and case-insensitive; a trailing `B` is
/// optional.
pub fn parse_size(raw: &str) -> Result<u64, ConfigError> {
    let s = raw.trim().to_ascii_uppercase();
    let s = s.strip_suffix('B').unwrap_or(&s).trim_end();

    let (digits, multiplier) = match s.chars().last() {
        Some('K') => (&s[..s.len() - 1], KB),
        Some('M') => (&s[..s.len() - 1], MB),
        Some('G') => (&s[..s.len() - 1], GB),
        Some('T') => (&s[..s.len() - 1], TB),
        _ => (s, 1),
    };

    let value: f64 = digits
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidSize(raw.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidSize(raw.to_string()));
    }
    Ok((value * multiplier as f64).round() as u64)
}

/// Format a byte count with the largest fitting unit.
///
/// One decimal is used only when it is exact (`1.5GB`); otherwise a smaller
/// unit is tried, so the result always parses back to the same count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [(&str, u64); 4] = [("TB", TB), ("GB", GB), ("MB", MB), ("KB", KB)];

    for (unit, divisor) in UNITS {
        if bytes < divisor {
            continue;
        }
        if bytes % divisor == 0 {
            return format!("{}{}", bytes / divisor, unit);
        }
        if (u128::from(bytes) * 10) % u128::from(divisor) == 0 {
            return format!("{:.1}{}", bytes as f64 / divisor as f64, unit);
        }
    }
    format!("{}B", bytes)
}
