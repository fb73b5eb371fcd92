use foldhash::HashMap as FoldHashMap;

use concord_pack::{Packer, Unpacker};

use crate::error::{Result, ResourceError};
use crate::live::LiveView;
use crate::resource::Resource;

pub mod bit {
    pub const NAME: u32 = 1 << 0;
    pub const RUNNING: u32 = 1 << 1;
    pub const ENABLED: u32 = 1 << 2;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    key: String,
    enforcement: u32,
    difference: u32,
    priority: i32,

    name: String,
    running: bool,
    enabled: bool,
}

impl Resource for Service {
    const TYPE_TAG: &'static str = "res_service";

    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            enforcement: bit::NAME,
            difference: 0,
            priority: 0,
            name: key.to_string(),
            running: true,
            enabled: true,
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
            "running" => {
                self.running = crate::numeric::parse_bool(attr, value)?;
                self.enforcement |= bit::RUNNING;
            }
            "enabled" => {
                self.enabled = crate::numeric::parse_bool(attr, value)?;
                self.enforcement |= bit::ENABLED;
            }
            other => return Err(ResourceError::unknown_attribute(other)),
        }
        Ok(())
    }

    fn unset(&mut self, attr: &str) -> Result<()> {
        let bit = match attr {
            "name" => bit::NAME,
            "running" => bit::RUNNING,
            "enabled" => bit::ENABLED,
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
        if self.enforcement & bit::RUNNING != 0 || other.enforcement & bit::RUNNING != 0 {
            out.running = if winner(bit::RUNNING) { self.running } else { other.running };
        }
        if self.enforcement & bit::ENABLED != 0 || other.enforcement & bit::ENABLED != 0 {
            out.enabled = if winner(bit::ENABLED) { self.enabled } else { other.enabled };
        }
        out
    }

    fn stat(&mut self, live: &dyn LiveView) -> Result<()> {
        let live_svc = match live.service(&self.name) {
            Some(s) => s,
            None => {
                if self.enforcement & bit::RUNNING == 0 {
                    return Err(ResourceError::not_found(&format!("service '{}' (running is not enforced)", self.name)));
                }
                self.difference = if self.running { self.enforcement } else { 0 };
                return Ok(());
            }
        };

        let mut diff = 0;
        if self.enforcement & bit::RUNNING != 0 && self.running != live_svc.running {
            diff |= bit::RUNNING;
        }
        if self.enforcement & bit::ENABLED != 0 && self.enabled != live_svc.enabled {
            diff |= bit::ENABLED;
        }
        self.difference = diff;
        Ok(())
    }

    fn remediate(&mut self, live: &mut dyn LiveView) -> Result<()> {
        if self.difference & bit::RUNNING != 0 {
            if self.running {
                live.start_service(&self.name)?;
            } else {
                live.stop_service(&self.name)?;
            }
        }
        if self.difference & bit::ENABLED != 0 {
            if self.enabled {
                live.enable_service(&self.name)?;
            } else {
                live.disable_service(&self.name)?;
            }
        }
        self.stat(live)?;
        if self.difference != 0 {
            return Err(ResourceError::new(
                crate::error::Kind::RemediationFailed,
                format!("service '{}' still differs after remediation", self.name),
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
            .u8(self.running as u8)
            .u8(self.enabled as u8)
            .finish()
    }

    fn unpack(packed: &str) -> Result<Self> {
        let mut up = Unpacker::new(packed);
        up.expect_prefix(Self::TYPE_TAG).map_err(pe)?;
        let mut s = Service::new("");
        s.key = up.str().map_err(pe)?;
        s.enforcement = up.u32().map_err(pe)?;
        s.name = up.str().map_err(pe)?;
        s.running = up.u8().map_err(pe)? != 0;
        s.enabled = up.u8().map_err(pe)? != 0;
        Ok(s)
    }

    fn attrs(&self) -> FoldHashMap<String, String> {
        let mut m = FoldHashMap::default();
        m.insert("name".to_string(), self.name.clone());
        m.insert("running".to_string(), self.running.to_string());
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
    fn starts_stopped_service() {
        let mut s = Service::new("nginx");
        s.set("running", "true").unwrap();
        let mut live = MemoryView::new();
        s.stat(&live).unwrap();
        assert_ne!(s.difference, 0);
        s.remediate(&mut live).unwrap();
        assert!(live.services["nginx"].running);
    }

    #[test]
    fn pack_roundtrip() {
        let mut s = Service::new("nginx");
        s.set("running", "true").unwrap();
        let packed = s.pack();
        assert_eq!(Service::unpack(&packed).unwrap(), s);
    }

    #[test]
    fn absent_service_without_running_enforced_is_not_found() {
        let mut s = Service::new("nginx");
        let live = MemoryView::new();
        let err = s.stat(&live).unwrap_err();
        assert_eq!(err.kind, crate::error::Kind::NotFound);
    }
}
