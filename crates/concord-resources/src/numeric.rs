//! Shared numeric-literal parsing for `set()` (spec §4.1: "decimal, octal
//! (leading 0), and hex (leading 0x) where sensible").

use crate::error::ResourceError;

pub fn parse_u32(attr: &str, s: &str) -> Result<u32, ResourceError> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        u32::from_str_radix(&s[1..], 8)
    } else {
        s.parse::<u32>()
    };
    parsed.map_err(|_| ResourceError::invalid_value(attr, s))
}

pub fn parse_mode(s: &str) -> Result<u32, ResourceError> {
    // Modes are conventionally given in octal even without a leading zero
    // (e.g. "640"); try octal first, fall back to the general parser.
    let trimmed = s.trim();
    if let Ok(v) = u32::from_str_radix(trimmed, 8) {
        return Ok(v);
    }
    parse_u32("mode", trimmed)
}

pub fn parse_bool(attr: &str, s: &str) -> Result<bool, ResourceError> {
    match s.trim() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        other => Err(ResourceError::invalid_value(attr, other)),
    }
}
