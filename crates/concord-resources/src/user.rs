use foldhash::HashMap as FoldHashMap;

use concord_pack::{Packer, Unpacker};

use crate::error::{Result, ResourceError};
use crate::live::{LiveUser, LiveView};
use crate::numeric::parse_u32;
use crate::resource::Resource;

pub mod bit {
    pub const NAME: u32 = 1 << 0;
    pub const PASSWORD: u32 = 1 << 1;
    pub const UID: u32 = 1 << 2;
    pub const GID: u32 = 1 << 3;
    pub const GECOS: u32 = 1 << 4;
    pub const HOME: u32 = 1 << 5;
    pub const SHELL: u32 = 1 << 6;
    pub const CREATE_HOME: u32 = 1 << 7;
    pub const SKEL: u32 = 1 << 8;
    pub const LOCK: u32 = 1 << 9;
    pub const PASS_MIN: u32 = 1 << 10;
    pub const PASS_MAX: u32 = 1 << 11;
    pub const PASS_WARN: u32 = 1 << 12;
    pub const INACTIVE: u32 = 1 << 13;
    pub const EXPIRE: u32 = 1 << 14;
    pub const ALL: u32 = (1 << 15) - 1;
}

const LOCK_SENTINEL: char = '!';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    key: String,
    enforcement: u32,
    difference: u32,
    priority: i32,

    name: String,
    password_hash: String,
    uid: u32,
    gid: u32,
    gecos: String,
    home_dir: String,
    shell: String,
    create_home: bool,
    skel_dir: String,
    locked: bool,
    pass_min_days: u32,
    pass_max_days: u32,
    pass_warn_days: u32,
    inactive_days: u32,
    expire_date: String,
}

impl Resource for User {
    const TYPE_TAG: &'static str = "res_user";

    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            enforcement: bit::NAME,
            difference: 0,
            priority: 0,
            name: key.to_string(),
            password_hash: String::new(),
            uid: 0,
            gid: 0,
            gecos: String::new(),
            home_dir: String::new(),
            shell: String::new(),
            create_home: false,
            skel_dir: String::new(),
            locked: false,
            pass_min_days: 0,
            pass_max_days: 0,
            pass_warn_days: 0,
            inactive_days: 0,
            expire_date: String::new(),
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
            "password-hash" => {
                self.password_hash = value.to_string();
                self.enforcement |= bit::PASSWORD;
            }
            "uid" => {
                self.uid = parse_u32("uid", value)?;
                self.enforcement |= bit::UID;
            }
            "gid" => {
                self.gid = parse_u32("gid", value)?;
                self.enforcement |= bit::GID;
            }
            "gecos" => {
                self.gecos = value.to_string();
                self.enforcement |= bit::GECOS;
            }
            "home-dir" => {
                self.home_dir = value.to_string();
                self.enforcement |= bit::HOME;
            }
            "shell" => {
                self.shell = value.to_string();
                self.enforcement |= bit::SHELL;
            }
            "create-home" => {
                self.create_home = crate::numeric::parse_bool(attr, value)?;
                self.enforcement |= bit::CREATE_HOME;
            }
            "skel-dir" => {
                self.skel_dir = value.to_string();
                self.enforcement |= bit::SKEL;
            }
            "lock" => {
                self.locked = crate::numeric::parse_bool(attr, value)?;
                self.enforcement |= bit::LOCK;
            }
            "pass-min-days" => {
                self.pass_min_days = parse_u32(attr, value)?;
                self.enforcement |= bit::PASS_MIN;
            }
            "pass-max-days" => {
                self.pass_max_days = parse_u32(attr, value)?;
                self.enforcement |= bit::PASS_MAX;
            }
            "pass-warn-days" => {
                self.pass_warn_days = parse_u32(attr, value)?;
                self.enforcement |= bit::PASS_WARN;
            }
            "inactive-days" => {
                self.inactive_days = parse_u32(attr, value)?;
                self.enforcement |= bit::INACTIVE;
            }
            "expire-date" => {
                self.expire_date = value.to_string();
                self.enforcement |= bit::EXPIRE;
            }
            other => return Err(ResourceError::unknown_attribute(other)),
        }
        Ok(())
    }

    fn unset(&mut self, attr: &str) -> Result<()> {
        let bit = attr_bit(attr)?;
        self.enforcement ^= self.enforcement & bit;
        Ok(())
    }

    fn merge(&self, other: &Self) -> Self {
        let mut out = other.clone();
        out.key = self.key.clone();
        out.enforcement = self.enforcement | other.enforcement;
        out.priority = other.priority;

        macro_rules! take {
            ($field:ident, $bit:expr) => {
                out.$field = winner_field(self, other, $bit, &self.$field, &other.$field).clone();
            };
        }
        take!(name, bit::NAME);
        take!(password_hash, bit::PASSWORD);
        take!(gecos, bit::GECOS);
        take!(home_dir, bit::HOME);
        take!(shell, bit::SHELL);
        take!(skel_dir, bit::SKEL);
        take!(expire_date, bit::EXPIRE);

        macro_rules! take_copy {
            ($field:ident, $bit:expr) => {
                out.$field = *winner_field(self, other, $bit, &self.$field, &other.$field);
            };
        }
        take_copy!(uid, bit::UID);
        take_copy!(gid, bit::GID);
        take_copy!(create_home, bit::CREATE_HOME);
        take_copy!(locked, bit::LOCK);
        take_copy!(pass_min_days, bit::PASS_MIN);
        take_copy!(pass_max_days, bit::PASS_MAX);
        take_copy!(pass_warn_days, bit::PASS_WARN);
        take_copy!(inactive_days, bit::INACTIVE);

        out
    }

    fn stat(&mut self, live: &dyn LiveView) -> Result<()> {
        let live_user = live.user(&self.name);
        let live_user = match live_user {
            Some(u) => u,
            None => {
                if self.enforcement & bit::NAME != 0 {
                    self.difference = self.enforcement;
                    return Ok(());
                }
                return Err(ResourceError::not_found(&format!("user '{}'", self.name)));
            }
        };

        let mut diff = 0;
        if self.enforcement & bit::PASSWORD != 0 && self.password_hash != live_user.password_hash {
            diff |= bit::PASSWORD;
        }
        if self.enforcement & bit::UID != 0 && self.uid != live_user.uid {
            diff |= bit::UID;
        }
        if self.enforcement & bit::GID != 0 && self.gid != live_user.gid {
            diff |= bit::GID;
        }
        if self.enforcement & bit::GECOS != 0 && self.gecos != live_user.gecos {
            diff |= bit::GECOS;
        }
        if self.enforcement & bit::HOME != 0 && self.home_dir != live_user.home_dir {
            diff |= bit::HOME;
        }
        if self.enforcement & bit::SHELL != 0 && self.shell != live_user.shell {
            diff |= bit::SHELL;
        }
        if self.enforcement & bit::LOCK != 0 && self.locked != live_user.locked {
            diff |= bit::LOCK;
        }
        self.difference = diff;
        Ok(())
    }

    fn remediate(&mut self, live: &mut dyn LiveView) -> Result<()> {
        let mut record = live.user(&self.name).unwrap_or_else(|| LiveUser {
            name: self.name.clone(),
            ..Default::default()
        });

        if self.difference & bit::PASSWORD != 0 {
            record.password_hash = self.password_hash.clone();
        }
        if self.difference & bit::UID != 0 {
            record.uid = self.uid;
        }
        if self.difference & bit::GID != 0 {
            record.gid = self.gid;
        }
        if self.difference & bit::GECOS != 0 {
            record.gecos = self.gecos.clone();
        }
        if self.difference & bit::HOME != 0 {
            record.home_dir = self.home_dir.clone();
        }
        if self.difference & bit::SHELL != 0 {
            record.shell = self.shell.clone();
        }
        if self.difference & bit::LOCK != 0 {
            record.locked = self.locked;
            if self.locked && !record.password_hash.starts_with(LOCK_SENTINEL) {
                record.password_hash.insert(0, LOCK_SENTINEL);
            } else if !self.locked {
                record.password_hash = record
                    .password_hash
                    .strip_prefix(LOCK_SENTINEL)
                    .map(str::to_string)
                    .unwrap_or(record.password_hash);
            }
        }

        live.set_user(record)?;
        self.stat(live)?;
        if self.difference != 0 {
            return Err(ResourceError::new(
                crate::error::Kind::RemediationFailed,
                format!("user '{}' still differs after remediation", self.name),
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
            .str(&self.password_hash)
            .u32(self.uid)
            .u32(self.gid)
            .str(&self.gecos)
            .str(&self.home_dir)
            .str(&self.shell)
            .u8(self.create_home as u8)
            .str(&self.skel_dir)
            .u8(self.locked as u8)
            .u32(self.pass_min_days)
            .u32(self.pass_max_days)
            .u32(self.pass_warn_days)
            .u32(self.inactive_days)
            .str(&self.expire_date)
            .finish()
    }

    fn unpack(packed: &str) -> Result<Self> {
        let mut up = Unpacker::new(packed);
        up.expect_prefix(Self::TYPE_TAG)
            .map_err(|e| ResourceError::new(crate::error::Kind::ParseError, e.to_string()))?;
        let mut u = User::new("");
        u.key = up.str().map_err(pe)?;
        u.enforcement = up.u32().map_err(pe)?;
        u.name = up.str().map_err(pe)?;
        u.password_hash = up.str().map_err(pe)?;
        u.uid = up.u32().map_err(pe)?;
        u.gid = up.u32().map_err(pe)?;
        u.gecos = up.str().map_err(pe)?;
        u.home_dir = up.str().map_err(pe)?;
        u.shell = up.str().map_err(pe)?;
        u.create_home = up.u8().map_err(pe)? != 0;
        u.skel_dir = up.str().map_err(pe)?;
        u.locked = up.u8().map_err(pe)? != 0;
        u.pass_min_days = up.u32().map_err(pe)?;
        u.pass_max_days = up.u32().map_err(pe)?;
        u.pass_warn_days = up.u32().map_err(pe)?;
        u.inactive_days = up.u32().map_err(pe)?;
        u.expire_date = up.str().map_err(pe)?;
        Ok(u)
    }

    fn attrs(&self) -> FoldHashMap<String, String> {
        let mut m = FoldHashMap::default();
        m.insert("name".to_string(), self.name.clone());
        m.insert("uid".to_string(), self.uid.to_string());
        m.insert("gid".to_string(), self.gid.to_string());
        m.insert("home-dir".to_string(), self.home_dir.clone());
        m.insert("shell".to_string(), self.shell.clone());
        m
    }
}

fn pe(e: concord_pack::PackError) -> ResourceError {
    ResourceError::new(crate::error::Kind::ParseError, e.to_string())
}

fn attr_bit(attr: &str) -> Result<u32> {
    Ok(match attr {
        "name" => bit::NAME,
        "password-hash" => bit::PASSWORD,
        "uid" => bit::UID,
        "gid" => bit::GID,
        "gecos" => bit::GECOS,
        "home-dir" => bit::HOME,
        "shell" => bit::SHELL,
        "create-home" => bit::CREATE_HOME,
        "skel-dir" => bit::SKEL,
        "lock" => bit::LOCK,
        "pass-min-days" => bit::PASS_MIN,
        "pass-max-days" => bit::PASS_MAX,
        "pass-warn-days" => bit::PASS_WARN,
        "inactive-days" => bit::INACTIVE,
        "expire-date" => bit::EXPIRE,
        other => return Err(ResourceError::unknown_attribute(other)),
    })
}

/// Per spec §4.1: for an attribute enforced by both inputs, the value comes
/// from whichever resource has the numerically smaller priority.
fn winner_field<'a, T>(a: &'a User, b: &'a User, bit: u32, av: &'a T, bv: &'a T) -> &'a T {
    let a_has = a.enforcement & bit != 0;
    let b_has = b.enforcement & bit != 0;
    match (a_has, b_has) {
        (true, false) => av,
        (false, true) => bv,
        _ => {
            if a.priority <= b.priority {
                av
            } else {
                bv
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::MemoryView;

    #[test]
    fn pack_roundtrip_scenario() {
        let mut u = User::new("bourbon");
        u.set("name", "bourbon").unwrap();
        u.set("uid", "101").unwrap();
        u.set("gid", "2000").unwrap();
        u.set_priority(1);

        let packed = u.pack();
        assert!(packed.starts_with("res_user::\"bourbon\"0000000d\"bourbon\""));
        assert!(packed.contains("00000065"));
        assert!(packed.contains("000007d0"));

        let back = User::unpack(&packed).unwrap();
        assert_eq!(back, u);
    }

    #[test]
    fn merge_precedence() {
        let mut r1 = User::new("a");
        r1.set("uid", "500").unwrap();
        r1.set_priority(0);

        let mut r2 = User::new("a");
        r2.set("uid", "600").unwrap();
        r2.set("gid", "100").unwrap();
        r2.set_priority(1);

        let merged = r1.merge(&r2);
        assert_eq!(merged.uid, 500);
        assert_eq!(merged.gid, 100);
        assert_eq!(merged.enforcement, bit::NAME | bit::UID | bit::GID);
    }

    #[test]
    fn unset_retains_value() {
        let mut r = User::new("a");
        r.set("uid", "500").unwrap();
        r.unset("uid").unwrap();
        assert_eq!(r.enforcement & bit::UID, 0);
        assert_eq!(r.uid, 500);
        r.set("uid", "500").unwrap();
        assert_eq!(r.enforcement & bit::UID, bit::UID);
    }

    #[test]
    fn stat_and_remediate_converge() {
        let mut r = User::new("dev");
        r.set("uid", "1200").unwrap();
        r.set("shell", "/bin/bash").unwrap();

        let mut live = MemoryView::new();
        r.stat(&live).unwrap();
        assert_eq!(r.difference, r.enforcement);

        r.remediate(&mut live).unwrap();
        assert_eq!(r.difference, 0);

        r.remediate(&mut live).unwrap();
        assert_eq!(r.difference, 0);
    }

    #[test]
    fn unknown_attribute_rejected() {
        let mut r = User::new("a");
        assert!(r.set("bogus", "x").is_err());
    }
}
