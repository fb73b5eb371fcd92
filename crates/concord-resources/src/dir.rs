use foldhash::HashMap as FoldHashMap;

use concord_pack::{Packer, Unpacker};

use crate::error::{Result, ResourceError};
use crate::live::LiveView;
use crate::numeric::parse_mode;
use crate::resource::Resource;

pub mod bit {
    pub const PATH: u32 = 1 << 0;
    pub const OWNER: u32 = 1 << 1;
    pub const GROUP: u32 = 1 << 2;
    pub const MODE: u32 = 1 << 3;
    pub const PRESENT: u32 = 1 << 4;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dir {
    key: String,
    enforcement: u32,
    difference: u32,
    priority: i32,

    path: String,
    owner: String,
    group: String,
    mode: u32,
    present: bool,
}

impl Resource for Dir {
    const TYPE_TAG: &'static str = "res_dir";

    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            enforcement: bit::PATH,
            difference: 0,
            priority: 0,
            path: key.to_string(),
            owner: String::new(),
            group: String::new(),
            mode: 0o755,
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
            "path" => {
                self.path = value.to_string();
                self.enforcement |= bit::PATH;
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
            "path" => bit::PATH,
            "owner" => bit::OWNER,
            "group" => bit::GROUP,
            "mode" => bit::MODE,
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
        if self.enforcement & bit::OWNER != 0 || other.enforcement & bit::OWNER != 0 {
            out.owner = if winner(bit::OWNER) { self.owner.clone() } else { other.owner.clone() };
        }
        if self.enforcement & bit::GROUP != 0 || other.enforcement & bit::GROUP != 0 {
            out.group = if winner(bit::GROUP) { self.group.clone() } else { other.group.clone() };
        }
        if self.enforcement & bit::MODE != 0 || other.enforcement & bit::MODE != 0 {
            out.mode = if winner(bit::MODE) { self.mode } else { other.mode };
        }
        if self.enforcement & bit::PRESENT != 0 || other.enforcement & bit::PRESENT != 0 {
            out.present = if winner(bit::PRESENT) { self.present } else { other.present };
        }
        out
    }

    fn stat(&mut self, live: &dyn LiveView) -> Result<()> {
        let live_dir = live.dir(&self.path);
        let live_dir = match live_dir {
            Some(d) => d,
            None => {
                if self.enforcement & bit::PRESENT == 0 {
                    return Err(ResourceError::not_found(&format!("directory '{}' (presence is not enforced)", self.path)));
                }
                self.difference = if self.present { self.enforcement } else { 0 };
                return Ok(());
            }
        };
        let mut diff = 0;
        if self.enforcement & bit::PRESENT != 0 && self.present != live_dir.present {
            diff |= bit::PRESENT;
        }
        if self.enforcement & bit::OWNER != 0 && self.owner != live_dir.owner {
            diff |= bit::OWNER;
        }
        if self.enforcement & bit::GROUP != 0 && self.group != live_dir.group {
            diff |= bit::GROUP;
        }
        if self.enforcement & bit::MODE != 0 && self.mode != live_dir.mode {
            diff |= bit::MODE;
        }
        self.difference = diff;
        Ok(())
    }

    fn remediate(&mut self, live: &mut dyn LiveView) -> Result<()> {
        if self.difference & bit::PRESENT != 0 && !self.present {
            live.remove_dir(&self.path)?;
            self.stat(live)?;
            return Ok(());
        }
        if self.difference != 0 {
            live.ensure_dir(&self.path)?;
            live.set_dir_meta(&self.path, &self.owner, &self.group, self.mode)?;
        }
        self.stat(live)?;
        if self.difference != 0 {
            return Err(ResourceError::new(
                crate::error::Kind::RemediationFailed,
                format!("directory '{}' still differs after remediation", self.path),
            ));
        }
        Ok(())
    }

    fn pack(&self) -> String {
        Packer::new()
            .prefix(Self::TYPE_TAG)
            .str(&self.key)
            .u32(self.enforcement)
            .str(&self.path)
            .str(&self.owner)
            .str(&self.group)
            .u32(self.mode)
            .u8(self.present as u8)
            .finish()
    }

    fn unpack(packed: &str) -> Result<Self> {
        let mut up = Unpacker::new(packed);
        up.expect_prefix(Self::TYPE_TAG).map_err(pe)?;
        let mut d = Dir::new("");
        d.key = up.str().map_err(pe)?;
        d.enforcement = up.u32().map_err(pe)?;
        d.path = up.str().map_err(pe)?;
        d.owner = up.str().map_err(pe)?;
        d.group = up.str().map_err(pe)?;
        d.mode = up.u32().map_err(pe)?;
        d.present = up.u8().map_err(pe)? != 0;
        Ok(d)
    }

    fn attrs(&self) -> FoldHashMap<String, String> {
        let mut m = FoldHashMap::default();
        m.insert("path".to_string(), self.path.clone());
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
    fn creates_missing_directory() {
        let mut d = Dir::new("/srv/app");
        d.set("mode", "750").unwrap();
        d.set("present", "true").unwrap();
        let mut live = MemoryView::new();
        d.stat(&live).unwrap();
        d.remediate(&mut live).unwrap();
        assert_eq!(d.difference, 0);
        assert!(live.dirs["/srv/app"].present);
    }

    #[test]
    fn pack_roundtrip() {
        let mut d = Dir::new("/srv/app");
        d.set("mode", "750").unwrap();
        let packed = d.pack();
        assert_eq!(Dir::unpack(&packed).unwrap(), d);
    }

    #[test]
    fn absent_dir_without_present_enforced_is_not_found() {
        let mut d = Dir::new("/srv/app");
        let live = MemoryView::new();
        let err = d.stat(&live).unwrap_err();
        assert_eq!(err.kind, crate::error::Kind::NotFound);
    }
}
