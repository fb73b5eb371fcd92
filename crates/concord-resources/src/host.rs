use foldhash::HashMap as FoldHashMap;

use concord_pack::{Packer, Unpacker};

use crate::error::{Result, ResourceError};
use crate::live::{LiveHost, LiveView};
use crate::resource::Resource;

pub mod bit {
    pub const HOSTNAME: u32 = 1 << 0;
    pub const ALIASES: u32 = 1 << 1;
    pub const IPV4: u32 = 1 << 2;
    pub const IPV6: u32 = 1 << 3;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    key: String,
    enforcement: u32,
    difference: u32,
    priority: i32,

    hostname: String,
    aliases: Vec<String>,
    ipv4: String,
    ipv6: String,
}

impl Resource for Host {
    const TYPE_TAG: &'static str = "res_host";

    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            enforcement: bit::HOSTNAME,
            difference: 0,
            priority: 0,
            hostname: key.to_string(),
            aliases: Vec::new(),
            ipv4: String::new(),
            ipv6: String::new(),
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
            "hostname" => {
                self.hostname = value.to_string();
                self.enforcement |= bit::HOSTNAME;
            }
            "aliases" => {
                self.aliases = value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
                self.enforcement |= bit::ALIASES;
            }
            "ipv4" => {
                self.ipv4 = value.to_string();
                self.enforcement |= bit::IPV4;
            }
            "ipv6" => {
                self.ipv6 = value.to_string();
                self.enforcement |= bit::IPV6;
            }
            other => return Err(ResourceError::unknown_attribute(other)),
        }
        Ok(())
    }

    fn unset(&mut self, attr: &str) -> Result<()> {
        let bit = match attr {
            "hostname" => bit::HOSTNAME,
            "aliases" => bit::ALIASES,
            "ipv4" => bit::IPV4,
            "ipv6" => bit::IPV6,
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
        if self.enforcement & bit::ALIASES != 0 || other.enforcement & bit::ALIASES != 0 {
            out.aliases = if winner(bit::ALIASES) { self.aliases.clone() } else { other.aliases.clone() };
        }
        if self.enforcement & bit::IPV4 != 0 || other.enforcement & bit::IPV4 != 0 {
            out.ipv4 = if winner(bit::IPV4) { self.ipv4.clone() } else { other.ipv4.clone() };
        }
        if self.enforcement & bit::IPV6 != 0 || other.enforcement & bit::IPV6 != 0 {
            out.ipv6 = if winner(bit::IPV6) { self.ipv6.clone() } else { other.ipv6.clone() };
        }
        out
    }

    fn stat(&mut self, live: &dyn LiveView) -> Result<()> {
        let live_host = live.host(&self.hostname).unwrap_or_default();
        let mut diff = 0;
        if self.enforcement & bit::IPV4 != 0 && self.ipv4 != live_host.ipv4 {
            diff |= bit::IPV4;
        }
        if self.enforcement & bit::IPV6 != 0 && self.ipv6 != live_host.ipv6 {
            diff |= bit::IPV6;
        }
        if self.enforcement & bit::ALIASES != 0 && self.aliases != live_host.aliases {
            diff |= bit::ALIASES;
        }
        self.difference = diff;
        Ok(())
    }

    fn remediate(&mut self, live: &mut dyn LiveView) -> Result<()> {
        if self.difference != 0 {
            live.set_host(
                &self.hostname,
                LiveHost {
                    ipv4: self.ipv4.clone(),
                    ipv6: self.ipv6.clone(),
                    aliases: self.aliases.clone(),
                },
            )?;
        }
        self.stat(live)?;
        if self.difference != 0 {
            return Err(ResourceError::new(
                crate::error::Kind::RemediationFailed,
                format!("host '{}' still differs after remediation", self.hostname),
            ));
        }
        Ok(())
    }

    fn pack(&self) -> String {
        Packer::new()
            .prefix(Self::TYPE_TAG)
            .str(&self.key)
            .u32(self.enforcement)
            .str(&self.hostname)
            .str(&self.aliases.join(","))
            .str(&self.ipv4)
            .str(&self.ipv6)
            .finish()
    }

    fn unpack(packed: &str) -> Result<Self> {
        let mut up = Unpacker::new(packed);
        up.expect_prefix(Self::TYPE_TAG).map_err(pe)?;
        let mut h = Host::new("");
        h.key = up.str().map_err(pe)?;
        h.enforcement = up.u32().map_err(pe)?;
        h.hostname = up.str().map_err(pe)?;
        let aliases = up.str().map_err(pe)?;
        h.aliases = aliases.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
        h.ipv4 = up.str().map_err(pe)?;
        h.ipv6 = up.str().map_err(pe)?;
        Ok(h)
    }

    fn attrs(&self) -> FoldHashMap<String, String> {
        let mut m = FoldHashMap::default();
        m.insert("hostname".to_string(), self.hostname.clone());
        m.insert("ipv4".to_string(), self.ipv4.clone());
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
    fn pack_roundtrip() {
        let mut h = Host::new("db1.internal");
        h.set("ipv4", "10.0.0.5").unwrap();
        h.set("aliases", "db,primary").unwrap();
        let packed = h.pack();
        assert_eq!(Host::unpack(&packed).unwrap(), h);
    }

    #[test]
    fn stat_detects_missing_entry() {
        let mut h = Host::new("db1.internal");
        h.set("ipv4", "10.0.0.5").unwrap();
        let live = MemoryView::new();
        h.stat(&live).unwrap();
        assert_eq!(h.difference, bit::IPV4);
    }
}
