//! Human-friendly quantities on the command line.
//!
//! - sizes: `512`, `64k`, `1M` (powers of 1024)
//! - rates: `800`, `100k`, `2M` in bits per second, returned as bytes per second
//! - intervals: `30`, `30s`, `5m`, `1h`, returned in seconds

fn split_suffix(s: &str) -> Result<(u64, Option<char>), String> {
    let s = s.trim();
    let digits = s.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let suffix = &s[digits.len()..];

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid number: {s:?}"))?;

    let mut chars = suffix.chars();
    match (chars.next(), chars.next()) {
        (None, _) => Ok((value, None)),
        (Some(c), None) => Ok((value, Some(c.to_ascii_lowercase()))),
        _ => Err(format!("invalid suffix in {s:?}")),
    }
}

fn scale(value: u64, factor: u64, s: &str) -> Result<u64, String> {
    value
        .checked_mul(factor)
        .ok_or_else(|| format!("value out of range: {s:?}"))
}

/// Parse a byte size with an optional `k`/`m` suffix.
pub fn parse_size(s: &str) -> Result<usize, String> {
    let bytes = match split_suffix(s)? {
        (v, None) => v,
        (v, Some('k')) => scale(v, 1024, s)?,
        (v, Some('m')) => scale(v, 1024 * 1024, s)?,
        _ => return Err(format!("invalid size {s:?}, expected [0-9]+[kKmM]")),
    };
    usize::try_from(bytes).map_err(|_| format!("value out of range: {s:?}"))
}

/// Parse a bit rate with an optional `k`/`m` suffix into bytes per second.
pub fn parse_rate(s: &str) -> Result<u64, String> {
    let bits = match split_suffix(s)? {
        (v, None) => v,
        (v, Some('k')) => scale(v, 1000, s)?,
        (v, Some('m')) => scale(v, 1_000_000, s)?,
        _ => return Err(format!("invalid rate {s:?}, expected [0-9]+[kKmM]")),
    };
    Ok(bits / 8)
}

/// Parse an interval with an optional `s`/`m`/`h` suffix into seconds.
pub fn parse_interval(s: &str) -> Result<u64, String> {
    match split_suffix(s)? {
        (v, None) | (v, Some('s')) => Ok(v),
        (v, Some('m')) => scale(v, 60, s),
        (v, Some('h')) => scale(v, 3600, s),
        _ => Err(format!("invalid interval {s:?}, expected [0-9]+[sSmMhH]")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(parse_size("512"), Ok(512));
        assert_eq!(parse_size("64k"), Ok(65_536));
        assert_eq!(parse_size("1M"), Ok(1_048_576));
        assert!(parse_size("1g").is_err());
        assert!(parse_size("k").is_err());
        assert!(parse_size("1kb").is_err());
    }

    #[test]
    fn rates_are_bits_per_second() {
        assert_eq!(parse_rate("800"), Ok(100));
        assert_eq!(parse_rate("100k"), Ok(12_500));
        assert_eq!(parse_rate("2M"), Ok(250_000));
        assert!(parse_rate("10x").is_err());
    }

    #[test]
    fn intervals() {
        assert_eq!(parse_interval("30"), Ok(30));
        assert_eq!(parse_interval("30s"), Ok(30));
        assert_eq!(parse_interval("5m"), Ok(300));
        assert_eq!(parse_interval("2H"), Ok(7200));
        assert!(parse_interval("1d").is_err());
    }
}
