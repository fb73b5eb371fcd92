//! BDFA archive boundary format (spec §6, SPEC_FULL §15): the fixed-header
//! packed-file layout the master uses to bundle multiple file bodies (for
//! directory-sourced `File` resources) into a single DATA frame payload.
//!
//! Only the header + name + body framing is implemented; there is no
//! compression and no permission restoration beyond mode/uid/gid/mtime.

use crate::error::{Error, Result};

const MAGIC: &[u8; 4] = b"BDFA";
const TRAILER_FLAGS: u32 = 0x0001;

/// One entry's fixed-width ASCII header: magic, flags, then five 8-hex-digit
/// big-endian zero-padded fields (mode, uid, gid, mtime, filesize) plus the
/// name's length as a sixth such field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub mtime: u32,
    pub body: Vec<u8>,
}

impl Entry {
    pub fn is_dir(&self) -> bool {
        self.body.is_empty()
    }

    fn encode(&self) -> Vec<u8> {
        let name_bytes = self.name.as_bytes();
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(format!("{:04x}", 0u32).as_bytes());
        out.extend_from_slice(format!("{:08x}", self.mode).as_bytes());
        out.extend_from_slice(format!("{:08x}", self.uid).as_bytes());
        out.extend_from_slice(format!("{:08x}", self.gid).as_bytes());
        out.extend_from_slice(format!("{:08x}", self.mtime).as_bytes());
        out.extend_from_slice(format!("{:08x}", self.body.len()).as_bytes());
        out.extend_from_slice(format!("{:08x}", name_bytes.len()).as_bytes());
        out.extend_from_slice(name_bytes);
        pad_to_4(&mut out);
        out.extend_from_slice(&self.body);
        pad_to_4(&mut out);
        out
    }
}

fn pad_to_4(buf: &mut Vec<u8>) {
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}

const HEADER_LEN: usize = 4 + 4 + 8 * 6;

fn parse_hex_field(buf: &[u8], what: &str) -> Result<u32> {
    let text = std::str::from_utf8(buf).map_err(|_| Error::config(format!("BDFA {what} field is not ASCII")))?;
    u32::from_str_radix(text, 16).map_err(|_| Error::config(format!("BDFA {what} field is not hex")))
}

/// Serialize `entries` into a single BDFA archive, including the trailer.
pub fn encode(entries: &[Entry]) -> Vec<u8> {
    let mut out = Vec::new();
    for entry in entries {
        out.extend_from_slice(&entry.encode());
    }
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(format!("{:04x}", TRAILER_FLAGS).as_bytes());
    out.extend_from_slice(&[0u8; 8 * 6]);
    out
}

/// Parse a BDFA archive into its entries, stopping at the trailer record.
pub fn decode(buf: &[u8]) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    let mut pos = 0usize;

    loop {
        if pos + HEADER_LEN > buf.len() {
            return Err(Error::config("truncated BDFA header"));
        }
        let header = &buf[pos..pos + HEADER_LEN];
        if &header[0..4] != MAGIC {
            return Err(Error::config("bad BDFA magic"));
        }
        let flags = parse_hex_field(&header[4..8], "flags")?;
        if flags == TRAILER_FLAGS {
            break;
        }

        let mode = parse_hex_field(&header[8..16], "mode")?;
        let uid = parse_hex_field(&header[16..24], "uid")?;
        let gid = parse_hex_field(&header[24..32], "gid")?;
        let mtime = parse_hex_field(&header[32..40], "mtime")?;
        let filesize = parse_hex_field(&header[40..48], "filesize")? as usize;
        let namesize = parse_hex_field(&header[48..56], "namesize")? as usize;

        pos += HEADER_LEN;
        if pos + namesize > buf.len() {
            return Err(Error::config("truncated BDFA name"));
        }
        let name = String::from_utf8(buf[pos..pos + namesize].to_vec())
            .map_err(|_| Error::config("BDFA entry name is not UTF-8"))?;
        pos += namesize;
        pos += padding_len(namesize);

        if pos + filesize > buf.len() {
            return Err(Error::config("truncated BDFA body"));
        }
        let body = buf[pos..pos + filesize].to_vec();
        pos += filesize;
        pos += padding_len(filesize);

        entries.push(Entry { name, mode, uid, gid, mtime, body });
    }

    Ok(entries)
}

fn padding_len(len: usize) -> usize {
    (4 - len % 4) % 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_a_mix_of_files_and_dirs() {
        let entries = vec![
            Entry { name: "etc".to_string(), mode: 0o755, uid: 0, gid: 0, mtime: 1_700_000_000, body: vec![] },
            Entry {
                name: "etc/motd".to_string(),
                mode: 0o644,
                uid: 0,
                gid: 0,
                mtime: 1_700_000_001,
                body: b"welcome".to_vec(),
            },
        ];
        let archive = encode(&entries);
        let decoded = decode(&archive).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn empty_archive_decodes_to_no_entries() {
        let archive = encode(&[]);
        assert!(decode(&archive).unwrap().is_empty());
    }

    #[test]
    fn truncated_header_is_rejected() {
        let err = decode(b"BDFA").unwrap_err();
        assert_eq!(err.kind, concord_api::Kind::ParseError);
    }
}
