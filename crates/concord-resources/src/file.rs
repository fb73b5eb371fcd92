use foldhash::HashMap as FoldHashMap;

use concord_pack::{Packer, Unpacker};

use crate::error::{Result, ResourceError};
use crate::live::{LiveFile, LiveView};
use crate::numeric::parse_mode;
use crate::resource::Resource;

pub mod bit {
    pub const PATH: u32 = 1 << 0;
    pub const SOURCE: u32 = 1 << 1;
    pub const OWNER: u32 = 1 << 2;
    pub const GROUP: u32 = 1 << 3;
    pub const MODE: u32 = 1 << 4;
    pub const CONTENT: u32 = 1 << 5;
    pub const PRESENT: u32 = 1 << 6;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    key: String,
    enforcement: u32,
    difference: u32,
    priority: i32,

    local_path: String,
    source_reference: String,
    owner: String,
    group: String,
    mode: u32,
    /// 40 lowercase hex chars.
    sha1: String,
    present: bool,
}

impl Resource for File {
    const TYPE_TAG: &'static str = "res_file";

    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            enforcement: bit::PATH,
            difference: 0,
            priority: 0,
            local_path: key.to_string(),
            source_reference: String::new(),
            owner: String::new(),
            group: String::new(),
            mode: 0o644,
            sha1: String::new(),
            present: true,
        }
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn enforcement(&self) -> u32 {
        self.enforcement
    }

    fn difference(&self) -> u32 {
        self.difference
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    fn set(&mut self, attr: &str, value: &str) -> Result<()> {
        match attr {
            "local-path" => {
                self.local_path = value.to_string();
                self.enforcement |= bit::PATH;
            }
            "source-reference" => {
                self.source_reference = value.to_string();
                self.enforcement |= bit::SOURCE | bit::CONTENT;
            }
            "owner" => {
                self.owner = value.to_string();
                self.enforcement |= bit::OWNER;
            }
            "group" => {
                self.group = value.to_string();
                self.enforcement |= bit::GROUP;
            }
            "mode" => {
                self.mode = parse_mode(value)?;
                self.enforcement |= bit::MODE;
            }
            "content-digest" => {
                if value.len() != 40 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(ResourceError::invalid_value(attr, value));
                }
                self.sha1 = value.to_ascii_lowercase();
                self.enforcement |= bit::CONTENT;
            }
            "present" => {
                self.present = crate::numeric::parse_bool(attr, value)?;
                self.enforcement |= bit::PRESENT;
            }
            other => return Err(ResourceError::unknown_attribute(other)),
        }
        Ok(())
    }

    fn unset(&mut self, attr: &str) -> Result<()> {
        let bit = match attr {
            "local-path" => bit::PATH,
            "source-reference" => bit::SOURCE,
            "owner" => bit::OWNER,
            "group" => bit::GROUP,
            "mode" => bit::MODE,
            "content-digest" => bit::CONTENT,
            "present" => bit::PRESENT,
            other => return Err(ResourceError::unknown_attribute(other)),
        };
        self.enforcement &= !bit;
        Ok(())
    }

    fn merge(&self, other: &Self) -> Self {
        let winner = |bit: u32| -> bool {
            let a_has = self.enforcement & bit != 0;
            let b_has = other.enforcement & bit != 0;
            match (a_has, b_has) {
                (true, false) => true,
                (false, true) => false,
                _ => self.priority <= other.priority,
            }
        };

        let mut out = other.clone();
        out.key = self.key.clone();
        out.enforcement = self.enforcement | other.enforcement;
        out.priority = other.priority;

        if self.enforcement & bit::SOURCE != 0 || other.enforcement & bit::SOURCE != 0 {
            out.source_reference = if winner(bit::SOURCE) {
                self.source_reference.clone()
            } else {
                other.source_reference.clone()
            };
        }
        if self.enforcement & bit::OWNER != 0 || other.enforcement & bit::OWNER != 0 {
            out.owner = if winner(bit::OWNER) { self.owner.clone() } else { other.owner.clone() };
        }
        if self.enforcement & bit::GROUP != 0 || other.enforcement & bit::GROUP != 0 {
            out.group = if winner(bit::GROUP) { self.group.clone() } else { other.group.clone() };
        }
        if self.enforcement & bit::MODE != 0 || other.enforcement & bit::MODE != 0 {
            out.mode = if winner(bit::MODE) { self.mode } else { other.mode };
        }
        if self.enforcement & bit::CONTENT != 0 || other.enforcement & bit::CONTENT != 0 {
            out.sha1 = if winner(bit::CONTENT) { self.sha1.clone() } else { other.sha1.clone() };
        }
        if self.enforcement & bit::PRESENT != 0 || other.enforcement & bit::PRESENT != 0 {
            out.present = if winner(bit::PRESENT) { self.present } else { other.present };
        }
        out
    }

    fn stat(&mut self, live: &dyn LiveView) -> Result<()> {
        let live_file = live.file(&self.local_path);
        let live_file = match live_file {
            Some(f) => f,
            None => {
                if self.enforcement & bit::PRESENT == 0 {
                    return Err(ResourceError::not_found(&format!(
                        "file '{}' (presence is not enforced)",
                        self.local_path
                    )));
                }
                self.difference = if self.present { self.enforcement } else { 0 };
                return Ok(());
            }
        };

        let mut diff = 0;
        if self.enforcement & bit::PRESENT != 0 && self.present != live_file.present {
            diff |= bit::PRESENT;
        }
        if self.enforcement & bit::OWNER != 0 && self.owner != live_file.owner {
            diff |= bit::OWNER;
        }
        if self.enforcement & bit::GROUP != 0 && self.group != live_file.group {
            diff |= bit::GROUP;
        }
        if self.enforcement & bit::MODE != 0 && self.mode != live_file.mode {
            diff |= bit::MODE;
        }
        if self.enforcement & bit::CONTENT != 0 && self.sha1 != live_file.sha1 {
            diff |= bit::CONTENT;
        }
        self.difference = diff;
        Ok(())
    }

    fn remediate(&mut self, live: &mut dyn LiveView) -> Result<()> {
        if self.difference & bit::PRESENT != 0 && !self.present {
            live.remove_file(&self.local_path)?;
            self.stat(live)?;
            return Ok(());
        }

        if self.difference & bit::CONTENT != 0 {
            self.sha1 = live.write_file_content(&self.local_path, &self.source_reference)?;
        }

        let mut meta = live.file(&self.local_path).unwrap_or_default();
        if self.difference & bit::OWNER != 0 {
            meta.owner = self.owner.clone();
        }
        if self.difference & bit::GROUP != 0 {
            meta.group = self.group.clone();
        }
        if self.difference & bit::MODE != 0 {
            meta.mode = self.mode;
        }
        meta.present = true;
        live.set_file_meta(&self.local_path, meta)?;

        self.stat(live)?;
        if self.difference != 0 {
            return Err(ResourceError::new(
                crate::error::Kind::RemediationFailed,
                format!("file '{}' still differs after remediation", self.local_path),
            ));
        }
        Ok(())
    }

    fn pack(&self) -> String {
        Packer::new()
            .prefix(Self::TYPE_TAG)
            .str(&self.key)
            .u32(self.enforcement)
            .str(&self.local_path)
            .str(&self.source_reference)
            .str(if self.sha1.is_empty() {
                "0000000000000000000000000000000000000000"
            } else {
                &self.sha1
            })
            .str(&self.owner)
            .str(&self.group)
            .u32(self.mode)
            .u8(self.present as u8)
            .finish()
    }

    fn unpack(packed: &str) -> Result<Self> {
        let mut up = Unpacker::new(packed);
        up.expect_prefix(Self::TYPE_TAG).map_err(pe)?;
        let mut f = File::new("");
        f.key = up.str().map_err(pe)?;
        f.enforcement = up.u32().map_err(pe)?;
        f.local_path = up.str().map_err(pe)?;
        f.source_reference = up.str().map_err(pe)?;
        let sha1 = up.str().map_err(pe)?;
        f.sha1 = if sha1.chars().all(|c| c == '0') { String::new() } else { sha1 };
        f.owner = up.str().map_err(pe)?;
        f.group = up.str().map_err(pe)?;
        f.mode = up.u32().map_err(pe)?;
        f.present = up.u8().map_err(pe)? != 0;
        Ok(f)
    }

    fn attrs(&self) -> FoldHashMap<String, String> {
        let mut m = FoldHashMap::default();
        m.insert("local-path".to_string(), self.local_path.clone());
        m.insert("mode".to_string(), format!("{:o}", self.mode));
        m.insert("owner".to_string(), self.owner.clone());
        m.insert("group".to_string(), self.group.clone());
        m
    }
}

fn pe(e: concord_pack::PackError) -> ResourceError {
    ResourceError::new(crate::error::Kind::ParseError, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::MemoryView;

    #[test]
    fn content_remediation_fetches_and_digests() {
        let mut f = File::new("/etc/motd");
        f.set("source-reference", "template:motd").unwrap();
        f.set("owner", "root").unwrap();
        f.set("mode", "0644").unwrap();
        f.set("present", "true").unwrap();

        let mut live = MemoryView::new();
        f.stat(&live).unwrap();
        assert_ne!(f.difference, 0);

        f.remediate(&mut live).unwrap();
        assert_eq!(f.difference, 0);
        assert_eq!(live.fetched["/etc/motd"], "template:motd");
    }

    #[test]
    fn pack_roundtrip() {
        let mut f = File::new("/etc/motd");
        f.set("owner", "root").unwrap();
        f.set("mode", "644").unwrap();
        f.set("content-digest", &"a".repeat(40)).unwrap();
        let packed = f.pack();
        let back = File::unpack(&packed).unwrap();
        assert_eq!(back, f);
    }

    #[test]
    fn rejects_bad_digest_length() {
        let mut f = File::new("/etc/motd");
        assert!(f.set("content-digest", "deadbeef").is_err());
    }

    #[test]
    fn absent_file_without_present_enforced_is_not_found() {
        let mut f = File::new("/etc/motd");
        f.set("owner", "root").unwrap();
        let live = MemoryView::new();
        let err = f.stat(&live).unwrap_err();
        assert_eq!(err.kind, crate::error::Kind::NotFound);
    }
}
