//! Decoders for adapter response text.
//!
//! All decoders are permissive: anything that does not have the expected
//! shape decodes to `None`, since the caller's only recourse is to keep the
//! last known value.

use crate::commands::{HV_VOLTAGE_DID, POSITIVE_READ_RESPONSE};

/// Round to two decimal places, ties to even
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Decode a read-data-by-identifier reply into a scaled 16-bit value
///
/// Reply format (headers on): "18 DA F1 DB 05 62 90 01 1F 40"
/// The two bytes at +3 and +4 from the first "62" token are read as
/// value = ((A * 256) + B) / divisor
pub fn decode_scaled_value(response: &str, divisor: f64) -> Option<f64> {
    let tokens = positive_response(response)?;
    if tokens.len() <= 4 {
        return None;
    }

    let raw = raw_word(tokens[3], tokens[4])?;
    Some(f64::from(raw) / divisor)
}

/// Decode the HV pack voltage reply
///
/// Reply format: "62 20 FE A B", voltage = ((A * 256) + B) / 10
pub fn decode_hv_voltage(response: &str) -> Option<f64> {
    let tokens = positive_response(response)?;
    let did = tokens.get(1..3)?;
    let matches_did = did
        .iter()
        .zip(HV_VOLTAGE_DID)
        .all(|(token, expected)| token.eq_ignore_ascii_case(expected));
    if !matches_did {
        return None;
    }

    let raw = raw_word(tokens.get(3)?, tokens.get(4)?)?;
    Some(round2(f64::from(raw) / 10.0))
}

/// Parse the reply to ATRV, e.g. "12.6V" or "12,6 V"
///
/// Finds the first number directly followed (optionally after whitespace) by
/// a `V` or `v`, accepting either `.` or `,` as the decimal separator.
pub fn parse_battery_voltage(response: &str) -> Option<f64> {
    let bytes = response.as_bytes();

    for (unit_pos, _) in response.match_indices(|c: char| c == 'V' || c == 'v') {
        let mut end = unit_pos;
        while end > 0 && bytes[end - 1].is_ascii_whitespace() {
            end -= 1;
        }

        let Some(start) = number_start(bytes, end) else {
            continue;
        };
        let number = response[start..end].replace(',', ".");
        if let Ok(volts) = number.parse::<f64>() {
            return Some(round2(volts));
        }
    }

    None
}

/// Tokens of `response` starting at the first positive response code
fn positive_response(response: &str) -> Option<Vec<&str>> {
    let tokens: Vec<&str> = response.split_whitespace().collect();
    let pos = tokens.iter().position(|t| *t == POSITIVE_READ_RESPONSE)?;
    Some(tokens[pos..].to_vec())
}

/// Big-endian 16-bit value from two hex byte tokens
fn raw_word(high: &str, low: &str) -> Option<u16> {
    Some(u16::from_be_bytes([hex_byte(high)?, hex_byte(low)?]))
}

fn hex_byte(token: &str) -> Option<u8> {
    match hex::decode(token).ok()?.as_slice() {
        [byte] => Some(*byte),
        _ => None,
    }
}

/// Walk back from `end` over `-?digits([.,]digits)?` and return where it starts
fn number_start(bytes: &[u8], end: usize) -> Option<usize> {
    let digits_from = |pos: usize| {
        let mut p = pos;
        while p > 0 && bytes[p - 1].is_ascii_digit() {
            p -= 1;
        }
        p
    };

    let mut start = digits_from(end);
    if start == end {
        return None;
    }
    if start >= 2 && matches!(bytes[start - 1], b'.' | b',') && bytes[start - 2].is_ascii_digit() {
        start = digits_from(start - 1);
    }
    if start > 0 && bytes[start - 1] == b'-' {
        start -= 1;
    }
    Some(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_scaled_value() {
        // "62" at index 2, so the value bytes are at indices 5 and 6: 0x40AA
        let value = decode_scaled_value("41 0C 62 00 1F 40 AA", 100.0).unwrap();
        assert!((value - 165.54).abs() < 1e-9);
    }

    #[test]
    fn test_decode_scaled_value_with_headers() {
        let value = decode_scaled_value("18 DA F1 DB 05 62 90 01 1F 40", 100.0).unwrap();
        assert!((value - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_decode_scaled_value_no_data() {
        assert_eq!(decode_scaled_value("NO DATA", 100.0), None);
        assert_eq!(decode_scaled_value("", 100.0), None);
        // Negative response: 7F 22 31 (request out of range)
        assert_eq!(decode_scaled_value("18 DA F1 DB 03 7F 22 31", 100.0), None);
    }

    #[test]
    fn test_decode_scaled_value_too_short() {
        // "62" followed by only three tokens
        assert_eq!(decode_scaled_value("62 90 01 1F", 100.0), None);
    }

    #[test]
    fn test_decode_scaled_value_bad_hex() {
        assert_eq!(decode_scaled_value("62 90 01 ZZ 40", 100.0), None);
        assert_eq!(decode_scaled_value("62 90 01 1F4 40", 100.0), None);
    }

    #[test]
    fn test_decode_scaled_value_first_anchor_wins() {
        // A second "62" later in the reply is ignored
        let value = decode_scaled_value("62 90 01 00 64 62 90 01 FF FF", 1.0).unwrap();
        assert!((value - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_decode_hv_voltage() {
        assert_eq!(decode_hv_voltage("18 DA F1 DA 05 62 20 FE 0E 10"), Some(360.0));
        assert_eq!(decode_hv_voltage("62 20 fe 0e 11"), Some(360.1));
    }

    #[test]
    fn test_decode_hv_voltage_wrong_identifier() {
        assert_eq!(decode_hv_voltage("62 90 01 0E 10 AA"), None);
        assert_eq!(decode_hv_voltage("62 20 FF 0E 10"), None);
    }

    #[test]
    fn test_decode_hv_voltage_truncated() {
        assert_eq!(decode_hv_voltage("62 20 FE 0E"), None);
        assert_eq!(decode_hv_voltage("62 20"), None);
        assert_eq!(decode_hv_voltage("NO DATA"), None);
    }

    #[test]
    fn test_parse_battery_voltage() {
        assert_eq!(parse_battery_voltage("12.6V"), Some(12.6));
        assert_eq!(parse_battery_voltage("12,85 V\r\r>"), Some(12.85));
        assert_eq!(parse_battery_voltage("14v"), Some(14.0));
        assert_eq!(parse_battery_voltage("12.456V"), Some(12.46));
        assert_eq!(parse_battery_voltage("12.125V"), Some(12.12));
    }

    #[test]
    fn test_parse_battery_voltage_skips_echo() {
        // Echoed command before the value has a V with no number in front
        assert_eq!(parse_battery_voltage("ATRV\r12.4V\r\r>"), Some(12.4));
    }

    #[test]
    fn test_parse_battery_voltage_no_number() {
        assert_eq!(parse_battery_voltage("?"), None);
        assert_eq!(parse_battery_voltage("NO DATA"), None);
        assert_eq!(parse_battery_voltage("ATRV"), None);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(79.675_1), 79.68);
        assert_eq!(round2(12.0), 12.0);
        assert_eq!(round2(12.125), 12.12);
        assert_eq!(round2(12.375), 12.38);
    }
}
