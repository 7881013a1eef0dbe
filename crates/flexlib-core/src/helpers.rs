//! Value conversions shared by the status parsers and command builders.

/// Convert frequency in Hz to MHz for SmartSDR commands.
pub fn hz_to_mhz(hz: u64) -> f64 {
    hz as f64 / 1_000_000.0
}

/// Convert frequency in MHz (as sent by the radio) to Hz.
pub fn mhz_to_hz(mhz: f64) -> u64 {
    (mhz * 1_000_000.0).round() as u64
}

/// Parse a protocol boolean.
///
/// The radio sends `1`/`0` for most flags, but a few tokens use
/// `true`/`false` or `on`/`off`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" => Some(true),
        "0" => Some(false),
        v if v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("on") => Some(true),
        v if v.eq_ignore_ascii_case("false") || v.eq_ignore_ascii_case("off") => Some(false),
        _ => None,
    }
}

/// Parse a handle or stream id, with or without a `0x` prefix.
///
/// Handles and stream ids are always hexadecimal on the wire.
pub fn parse_hex_u32(value: &str) -> Option<u32> {
    let v = value.trim();
    let digits = v
        .strip_prefix("0x")
        .or_else(|| v.strip_prefix("0X"))
        .unwrap_or(v);
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Format a protocol boolean.
pub fn bool_flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_round_trip() {
        for &hz in &[1_800_000u64, 1_850_001, 7_074_000, 14_250_000, 54_000_000] {
            assert_eq!(mhz_to_hz(hz_to_mhz(hz)), hz, "round-trip failed for {hz}");
        }
    }

    #[test]
    fn mhz_to_hz_rounds() {
        assert_eq!(mhz_to_hz(14.250000), 14_250_000);
        assert_eq!(mhz_to_hz(7.0739999999), 7_074_000);
    }

    #[test]
    fn bools() {
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(bool_flag(true), "1");
    }

    #[test]
    fn hex_ids() {
        assert_eq!(parse_hex_u32("0x40000000"), Some(0x4000_0000));
        assert_eq!(parse_hex_u32("28000001"), Some(0x2800_0001));
        assert_eq!(parse_hex_u32("0x"), None);
        assert_eq!(parse_hex_u32("zz"), None);
    }
}
