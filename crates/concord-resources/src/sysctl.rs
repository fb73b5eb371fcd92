use foldhash::HashMap as FoldHashMap;

use concord_pack::{Packer, Unpacker};

use crate::error::{Result, ResourceError};
use crate::live::LiveView;
use crate::resource::Resource;

pub mod bit {
    pub const NAME: u32 = 1 << 0;
    pub const VALUE: u32 = 1 << 1;
    pub const PERSIST: u32 = 1 << 2;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sysctl {
    key: String,
    enforcement: u32,
    difference: u32,
    priority: i32,

    name: String,
    value: String,
    persist: bool,
}

impl Resource for Sysctl {
    const TYPE_TAG: &'static str = "res_sysctl";

    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            enforcement: bit::NAME,
            difference: 0,
            priority: 0,
            name: key.to_string(),
            value: String::new(),
            persist: false,
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
            "value" => {
                self.value = value.to_string();
                self.enforcement |= bit::VALUE;
            }
            "persist" => {
                self.persist = crate::numeric::parse_bool(attr, value)?;
                self.enforcement |= bit::PERSIST;
            }
            other => return Err(ResourceError::unknown_attribute(other)),
        }
        Ok(())
    }

    fn unset(&mut self, attr: &str) -> Result<()> {
        let bit = match attr {
            "name" => bit::NAME,
            "value" => bit::VALUE,
            "persist" => bit::PERSIST,
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
        if self.enforcement & bit::VALUE != 0 || other.enforcement & bit::VALUE != 0 {
            out.value = if winner(bit::VALUE) { self.value.clone() } else { other.value.clone() };
        }
        if self.enforcement & bit::PERSIST != 0 || other.enforcement & bit::PERSIST != 0 {
            out.persist = if winner(bit::PERSIST) { self.persist } else { other.persist };
        }
        out
    }

    fn stat(&mut self, live: &dyn LiveView) -> Result<()> {
        let live_value = live.sysctl(&self.name).unwrap_or_default();
        self.difference = if self.enforcement & bit::VALUE != 0 && self.value != live_value {
            bit::VALUE
        } else {
            0
        };
        Ok(())
    }

    fn remediate(&mut self, live: &mut dyn LiveView) -> Result<()> {
        if self.difference & bit::VALUE != 0 {
            live.set_sysctl(&self.name, &self.value, self.persist)?;
        }
        self.stat(live)?;
        if self.difference != 0 {
            return Err(ResourceError::new(
                crate::error::Kind::RemediationFailed,
                format!("sysctl '{}' still differs after remediation", self.name),
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
            .str(&self.value)
            .u8(self.persist as u8)
            .finish()
    }

    fn unpack(packed: &str) -> Result<Self> {
        let mut up = Unpacker::new(packed);
        up.expect_prefix(Self::TYPE_TAG).map_err(pe)?;
        let mut s = Sysctl::new("");
        s.key = up.str().map_err(pe)?;
        s.enforcement = up.u32().map_err(pe)?;
        s.name = up.str().map_err(pe)?;
        s.value = up.str().map_err(pe)?;
        s.persist = up.u8().map_err(pe)? != 0;
        Ok(s)
    }

    fn attrs(&self) -> FoldHashMap<String, String> {
        let mut m = FoldHashMap::default();
        m.insert("name".to_string(), self.name.clone());
        m.insert("value".to_string(), self.value.clone());
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
        let mut s = Sysctl::new("net.ipv4.ip_forward");
        s.set("value", "1").unwrap();
        let packed = s.pack();
        assert_eq!(Sysctl::unpack(&packed).unwrap(), s);
    }

    #[test]
    fn remediate_writes_value() {
        let mut s = Sysctl::new("net.ipv4.ip_forward");
        s.set("value", "1").unwrap();
        let mut live = MemoryView::new();
        s.stat(&live).unwrap();
        s.remediate(&mut live).unwrap();
        assert_eq!(live.sysctls["net.ipv4.ip_forward"], "1");
    }
}
