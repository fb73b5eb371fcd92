use foldhash::HashMap as FoldHashMap;

use concord_pack::{Packer, Unpacker};

use crate::error::{Result, ResourceError};
use crate::live::LiveView;
use crate::resource::Resource;

pub mod bit {
    pub const NAME: u32 = 1 << 0;
    pub const VERSION: u32 = 1 << 1;
    pub const INSTALLED: u32 = 1 << 2;
}

const LATEST: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    key: String,
    enforcement: u32,
    difference: u32,
    priority: i32,

    name: String,
    version: String,
    installed: bool,
}

impl Resource for Package {
    const TYPE_TAG: &'static str = "res_package";

    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            enforcement: bit::NAME,
            difference: 0,
            priority: 0,
            name: key.to_string(),
            version: LATEST.to_string(),
            installed: true,
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
            "name" => {
                self.name = value.to_string();
                self.enforcement |= bit::NAME;
            }
            "version" => {
                self.version = value.to_string();
                self.enforcement |= bit::VERSION;
            }
            "installed" => {
                self.installed = crate::numeric::parse_bool(attr, value)?;
                self.enforcement |= bit::INSTALLED;
            }
            other => return Err(ResourceError::unknown_attribute(other)),
        }
        Ok(())
    }

    fn unset(&mut self, attr: &str) -> Result<()> {
        let bit = match attr {
            "name" => bit::NAME,
            "version" => bit::VERSION,
            "installed" => bit::INSTALLED,
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
        if self.enforcement & bit::VERSION != 0 || other.enforcement & bit::VERSION != 0 {
            out.version = if winner(bit::VERSION) { self.version.clone() } else { other.version.clone() };
        }
        if self.enforcement & bit::INSTALLED != 0 || other.enforcement & bit::INSTALLED != 0 {
            out.installed = if winner(bit::INSTALLED) { self.installed } else { other.installed };
        }
        out
    }

    fn stat(&mut self, live: &dyn LiveView) -> Result<()> {
        let live_pkg = live.package(&self.name);
        let p = match live_pkg {
            Some(p) => p,
            None => {
                if self.enforcement & bit::INSTALLED == 0 {
                    return Err(ResourceError::not_found(&format!("package '{}' (installed is not enforced)", self.name)));
                }
                self.difference = if self.installed { self.enforcement } else { 0 };
                return Ok(());
            }
        };

        let mut diff = 0;
        if self.enforcement & bit::INSTALLED != 0 && self.installed != p.installed {
            diff |= bit::INSTALLED;
        }
        if self.enforcement & bit::VERSION != 0 && self.version != LATEST && self.version != p.version {
            diff |= bit::VERSION;
        }
        self.difference = diff;
        Ok(())
    }

    fn remediate(&mut self, live: &mut dyn LiveView) -> Result<()> {
        if self.difference & bit::INSTALLED != 0 && !self.installed {
            live.remove_package(&self.name)?;
        } else if self.difference != 0 {
            live.install_package(&self.name, &self.version)?;
        }
        self.stat(live)?;
        if self.difference != 0 {
            return Err(ResourceError::new(
                crate::error::Kind::RemediationFailed,
                format!("package '{}' still differs after remediation", self.name),
            ));
        }
        Ok(())
    }

    fn pack(&self) -> String {
        Packer::new()
            .prefix(Self::TYPE_TAG)
            .str(&self.key)
            .u32(self.enforcement)
            .str(&self.name)
            .str(&self.version)
            .u8(self.installed as u8)
            .finish()
    }

    fn unpack(packed: &str) -> Result<Self> {
        let mut up = Unpacker::new(packed);
        up.expect_prefix(Self::TYPE_TAG).map_err(pe)?;
        let mut p = Package::new("");
        p.key = up.str().map_err(pe)?;
        p.enforcement = up.u32().map_err(pe)?;
        p.name = up.str().map_err(pe)?;
        p.version = up.str().map_err(pe)?;
        p.installed = up.u8().map_err(pe)? != 0;
        Ok(p)
    }

    fn attrs(&self) -> FoldHashMap<String, String> {
        let mut m = FoldHashMap::default();
        m.insert("name".to_string(), self.name.clone());
        m.insert("version".to_string(), self.version.clone());
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
    fn installs_when_absent() {
        let mut p = Package::new("nginx");
        p.set("installed", "true").unwrap();
        let mut live = MemoryView::new();
        p.stat(&live).unwrap();
        assert_ne!(p.difference, 0);
        p.remediate(&mut live).unwrap();
        assert!(live.packages["nginx"].installed);
    }

    #[test]
    fn pack_roundtrip() {
        let mut p = Package::new("nginx");
        p.set("version", "1.2.3").unwrap();
        let packed = p.pack();
        assert_eq!(Package::unpack(&packed).unwrap(), p);
    }

    #[test]
    fn absent_package_without_installed_enforced_is_not_found() {
        let mut p = Package::new("nginx");
        let live = MemoryView::new();
        let err = p.stat(&live).unwrap_err();
        assert_eq!(err.kind, crate::error::Kind::NotFound);
    }
}
