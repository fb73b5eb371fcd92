//! The fixed-width pack codec (spec §4.6).
//!
//! Every resource, job report, and certificate that crosses the wire is
//! encoded with this codec: signed/unsigned integers as fixed-width hex with
//! no separators, strings as backslash-escaped, double-quoted runs, and
//! whole records tagged with a `prefix::` that the decoder checks before
//! consuming anything else. There is no length-prefixing of the record as a
//! whole; field widths are fixed by type, and quoted strings carry their own
//! terminator, so the decoder always knows exactly how many bytes a field
//! consumes.

use std::fmt;

//----------- PackError -----------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackError {
    /// The buffer ended before a fixed-width field or a closing quote was found.
    Truncated,
    /// A fixed-width field contained a non-hex-digit character.
    BadHex,
    /// The buffer's prefix did not match the expected record tag.
    BadPrefix { expected: &'static str },
    /// A quoted string was missing its closing quote.
    UnterminatedString,
    /// A backslash in a quoted string was followed by a character other
    /// than `"` or `\`.
    InvalidEscape(char),
}

impl fmt::Display for PackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackError::Truncated => write!(f, "packed buffer ended unexpectedly"),
            PackError::BadHex => write!(f, "expected a hex digit"),
            PackError::BadPrefix { expected } => {
                write!(f, "packed buffer does not start with prefix '{expected}::'")
            }
            PackError::UnterminatedString => write!(f, "quoted string is missing its closing quote"),
            PackError::InvalidEscape(c) => write!(f, "invalid escape sequence '\\{c}'"),
        }
    }
}

impl std::error::Error for PackError {}

//----------- Packer ----------------------------------------------------------

/// Assembles a packed wire record field by field, in declaration order.
#[derive(Debug, Default, Clone)]
pub struct Packer {
    out: String,
}

impl Packer {
    pub fn new() -> Self {
        Self { out: String::new() }
    }

    /// Write the `prefix::` tag that opens every packed record.
    pub fn prefix(mut self, tag: &str) -> Self {
        self.out.push_str(tag);
        self.out.push_str("::");
        self
    }

    pub fn u8(mut self, v: u8) -> Self {
        push_hex(&mut self.out, v as u32, 2);
        self
    }

    pub fn i8(mut self, v: i8) -> Self {
        push_hex(&mut self.out, v as u8 as u32, 2);
        self
    }

    pub fn u16(mut self, v: u16) -> Self {
        push_hex(&mut self.out, v as u32, 4);
        self
    }

    pub fn i16(mut self, v: i16) -> Self {
        push_hex(&mut self.out, v as u16 as u32, 4);
        self
    }

    pub fn u32(mut self, v: u32) -> Self {
        push_hex(&mut self.out, v, 8);
        self
    }

    pub fn i32(mut self, v: i32) -> Self {
        push_hex(&mut self.out, v as u32, 8);
        self
    }

    pub fn u64(mut self, v: u64) -> Self {
        push_hex64(&mut self.out, v, 16);
        self
    }

    pub fn str(mut self, s: &str) -> Self {
        self.out.push('"');
        for c in s.chars() {
            if c == '"' || c == '\\' {
                self.out.push('\\');
            }
            self.out.push(c);
        }
        self.out.push('"');
        self
    }

    /// Write a field verbatim, with no quoting or width enforcement. Used
    /// for already-hex-encoded digests (e.g. a 40-hex-char SHA-1) that are
    /// embedded inside a quoted string per the §6 grammar.
    pub fn raw(mut self, s: &str) -> Self {
        self.out.push_str(s);
        self
    }

    pub fn finish(self) -> String {
        self.out
    }
}

fn push_hex(out: &mut String, v: u32, width: usize) {
    use std::fmt::Write;
    write!(out, "{v:0width$x}", width = width).unwrap();
}

fn push_hex64(out: &mut String, v: u64, width: usize) {
    use std::fmt::Write;
    write!(out, "{v:0width$x}", width = width).unwrap();
}

//----------- Unpacker ---------------------------------------------------------

/// Consumes a packed wire record field by field.
#[derive(Debug, Clone)]
pub struct Unpacker<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Unpacker<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Check and consume the `prefix::` tag. Decoding refuses a buffer
    /// whose prefix does not match (spec §4.6).
    pub fn expect_prefix(&mut self, tag: &'static str) -> Result<(), PackError> {
        let needle = format!("{tag}::");
        if self.remaining().starts_with(&needle) {
            self.pos += needle.len();
            Ok(())
        } else {
            Err(PackError::BadPrefix { expected: tag })
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn take_hex(&mut self, width: usize) -> Result<u64, PackError> {
        let rem = self.remaining();
        if rem.len() < width {
            return Err(PackError::Truncated);
        }
        let digits = &rem[..width];
        let v = u64::from_str_radix(digits, 16).map_err(|_| PackError::BadHex)?;
        self.pos += width;
        Ok(v)
    }

    pub fn u8(&mut self) -> Result<u8, PackError> {
        Ok(self.take_hex(2)? as u8)
    }

    pub fn i8(&mut self) -> Result<i8, PackError> {
        Ok(self.take_hex(2)? as u8 as i8)
    }

    pub fn u16(&mut self) -> Result<u16, PackError> {
        Ok(self.take_hex(4)? as u16)
    }

    pub fn i16(&mut self) -> Result<i16, PackError> {
        Ok(self.take_hex(4)? as u16 as i16)
    }

    pub fn u32(&mut self) -> Result<u32, PackError> {
        Ok(self.take_hex(8)? as u32)
    }

    pub fn i32(&mut self) -> Result<i32, PackError> {
        Ok(self.take_hex(8)? as u32 as i32)
    }

    pub fn u64(&mut self) -> Result<u64, PackError> {
        self.take_hex(16)
    }

    /// Consume a `"…"` run, unescaping `\"` and `\\`.
    pub fn str(&mut self) -> Result<String, PackError> {
        let rem = self.remaining();
        let mut chars = rem.char_indices();
        match chars.next() {
            Some((_, '"')) => {}
            _ => return Err(PackError::Truncated),
        }

        let mut out = String::new();
        let mut escaped = false;
        let mut closed = false;
        let mut consumed = 1; // opening quote

        for (_, c) in chars {
            consumed += c.len_utf8();
            if escaped {
                if c != '"' && c != '\\' {
                    return Err(PackError::InvalidEscape(c));
                }
                out.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                closed = true;
                break;
            } else {
                out.push(c);
            }
        }

        if !closed {
            return Err(PackError::UnterminatedString);
        }

        self.pos += consumed;
        Ok(out)
    }

    /// Consume exactly `n` bytes verbatim (e.g. a hex digest embedded inside
    /// a quoted string, after the opening quote has already been consumed by
    /// the caller via [`Self::raw_until`]).
    pub fn take_n(&mut self, n: usize) -> Result<&'a str, PackError> {
        let rem = self.remaining();
        if rem.len() < n {
            return Err(PackError::Truncated);
        }
        let out = &rem[..n];
        self.pos += n;
        Ok(out)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining().is_empty()
    }

    pub fn remaining_str(&self) -> &'a str {
        self.remaining()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_ints() {
        let packed = Packer::new().prefix("res_x").i32(-1).u32(0).u8(255).finish();
        assert_eq!(packed, "res_x::ffffffff0000000000ff");
        let mut up = Unpacker::new(&packed);
        up.expect_prefix("res_x").unwrap();
        assert_eq!(up.i32().unwrap(), -1);
        assert_eq!(up.u32().unwrap(), 0);
        assert_eq!(up.u8().unwrap(), 255);
        assert!(up.is_empty());
    }

    #[test]
    fn roundtrip_string_with_escapes() {
        let packed = Packer::new().prefix("res_x").str(r#"a "quoted" \ value"#).finish();
        let mut up = Unpacker::new(&packed);
        up.expect_prefix("res_x").unwrap();
        assert_eq!(up.str().unwrap(), r#"a "quoted" \ value"#);
    }

    #[test]
    fn bad_prefix_is_rejected() {
        let packed = Packer::new().prefix("res_user").u8(0).finish();
        let mut up = Unpacker::new(&packed);
        assert_eq!(
            up.expect_prefix("res_group"),
            Err(PackError::BadPrefix { expected: "res_group" })
        );
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let mut up = Unpacker::new("00");
        assert_eq!(up.u32(), Err(PackError::Truncated));
    }

    #[test]
    fn negative_i32_encodes_as_twos_complement() {
        assert_eq!(Packer::new().i32(-1).finish(), "ffffffff");
        assert_eq!(Packer::new().i32(0).finish(), "00000000");
    }
}
