use std::collections::BTreeSet;

use foldhash::HashMap as FoldHashMap;

use concord_pack::{Packer, Unpacker};

use crate::error::{Result, ResourceError};
use crate::live::{LiveGroup, LiveView};
use crate::numeric::parse_u32;
use crate::resource::Resource;

pub mod bit {
    pub const NAME: u32 = 1 << 0;
    pub const PASSWORD: u32 = 1 << 1;
    pub const GID: u32 = 1 << 2;
    pub const MEMBERS_ADD: u32 = 1 << 3;
    pub const MEMBERS_REMOVE: u32 = 1 << 4;
    pub const ADMINS_ADD: u32 = 1 << 5;
    pub const ADMINS_REMOVE: u32 = 1 << 6;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    key: String,
    enforcement: u32,
    difference: u32,
    priority: i32,

    name: String,
    password: String,
    gid: u32,
    members_add: Vec<String>,
    members_remove: Vec<String>,
    admins_add: Vec<String>,
    admins_remove: Vec<String>,
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn assert_disjoint(attr: &str, new_list: &[String], opposite: &[String]) -> Result<()> {
    for name in new_list {
        if opposite.contains(name) {
            return Err(ResourceError::new(
                crate::error::Kind::InvalidValue,
                format!("'{name}' cannot be both added and removed in the same {attr} set"),
            ));
        }
    }
    Ok(())
}

impl Resource for Group {
    const TYPE_TAG: &'static str = "res_group";

    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            enforcement: bit::NAME,
            difference: 0,
            priority: 0,
            name: key.to_string(),
            password: String::new(),
            gid: 0,
            members_add: Vec::new(),
            members_remove: Vec::new(),
            admins_add: Vec::new(),
            admins_remove: Vec::new(),
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
            "password" => {
                self.password = value.to_string();
                self.enforcement |= bit::PASSWORD;
            }
            "gid" => {
                self.gid = parse_u32("gid", value)?;
                self.enforcement |= bit::GID;
            }
            "add-members" => {
                let list = split_list(value);
                assert_disjoint(attr, &list, &self.members_remove)?;
                self.members_add = list;
                self.enforcement |= bit::MEMBERS_ADD;
            }
            "remove-members" => {
                let list = split_list(value);
                assert_disjoint(attr, &list, &self.members_add)?;
                self.members_remove = list;
                self.enforcement |= bit::MEMBERS_REMOVE;
            }
            "add-admins" => {
                let list = split_list(value);
                assert_disjoint(attr, &list, &self.admins_remove)?;
                self.admins_add = list;
                self.enforcement |= bit::ADMINS_ADD;
            }
            "remove-admins" => {
                let list = split_list(value);
                assert_disjoint(attr, &list, &self.admins_add)?;
                self.admins_remove = list;
                self.enforcement |= bit::ADMINS_REMOVE;
            }
            other => return Err(ResourceError::unknown_attribute(other)),
        }
        Ok(())
    }

    fn unset(&mut self, attr: &str) -> Result<()> {
        let bit = match attr {
            "name" => bit::NAME,
            "password" => bit::PASSWORD,
            "gid" => bit::GID,
            "add-members" => bit::MEMBERS_ADD,
            "remove-members" => bit::MEMBERS_REMOVE,
            "add-admins" => bit::ADMINS_ADD,
            "remove-admins" => bit::ADMINS_REMOVE,
            other => return Err(ResourceError::unknown_attribute(other)),
        };
        self.enforcement &= !bit;
        Ok(())
    }

    fn merge(&self, other: &Self) -> Self {
        let winner = |a_has: bool, b_has: bool| -> Option<bool> {
            match (a_has, b_has) {
                (true, false) => Some(true),
                (false, true) => Some(false),
                (true, true) => Some(self.priority <= other.priority),
                (false, false) => None,
            }
        };

        let mut out = other.clone();
        out.key = self.key.clone();
        out.enforcement = self.enforcement | other.enforcement;
        out.priority = other.priority;

        if let Some(pick_self) = winner(self.enforcement & bit::NAME != 0, other.enforcement & bit::NAME != 0) {
            out.name = if pick_self { self.name.clone() } else { other.name.clone() };
        }
        if let Some(pick_self) = winner(
            self.enforcement & bit::PASSWORD != 0,
            other.enforcement & bit::PASSWORD != 0,
        ) {
            out.password = if pick_self { self.password.clone() } else { other.password.clone() };
        }
        if let Some(pick_self) = winner(self.enforcement & bit::GID != 0, other.enforcement & bit::GID != 0) {
            out.gid = if pick_self { self.gid } else { other.gid };
        }
        if let Some(pick_self) = winner(
            self.enforcement & bit::MEMBERS_ADD != 0,
            other.enforcement & bit::MEMBERS_ADD != 0,
        ) {
            out.members_add = if pick_self { self.members_add.clone() } else { other.members_add.clone() };
        }
        if let Some(pick_self) = winner(
            self.enforcement & bit::MEMBERS_REMOVE != 0,
            other.enforcement & bit::MEMBERS_REMOVE != 0,
        ) {
            out.members_remove = if pick_self {
                self.members_remove.clone()
            } else {
                other.members_remove.clone()
            };
        }
        if let Some(pick_self) = winner(
            self.enforcement & bit::ADMINS_ADD != 0,
            other.enforcement & bit::ADMINS_ADD != 0,
        ) {
            out.admins_add = if pick_self { self.admins_add.clone() } else { other.admins_add.clone() };
        }
        if let Some(pick_self) = winner(
            self.enforcement & bit::ADMINS_REMOVE != 0,
            other.enforcement & bit::ADMINS_REMOVE != 0,
        ) {
            out.admins_remove = if pick_self {
                self.admins_remove.clone()
            } else {
                other.admins_remove.clone()
            };
        }
        out
    }

    fn stat(&mut self, live: &dyn LiveView) -> Result<()> {
        let live_group = match live.group(&self.name) {
            Some(g) => g,
            None => {
                self.difference = self.enforcement;
                return Ok(());
            }
        };

        let mut diff = 0;
        if self.enforcement & bit::PASSWORD != 0 && self.password != live_group.password {
            diff |= bit::PASSWORD;
        }
        if self.enforcement & bit::GID != 0 && self.gid != live_group.gid {
            diff |= bit::GID;
        }
        let members: BTreeSet<_> = live_group.members.iter().cloned().collect();
        if self.enforcement & bit::MEMBERS_ADD != 0 && self.members_add.iter().any(|m| !members.contains(m)) {
            diff |= bit::MEMBERS_ADD;
        }
        if self.enforcement & bit::MEMBERS_REMOVE != 0 && self.members_remove.iter().any(|m| members.contains(m)) {
            diff |= bit::MEMBERS_REMOVE;
        }
        let admins: BTreeSet<_> = live_group.admins.iter().cloned().collect();
        if self.enforcement & bit::ADMINS_ADD != 0 && self.admins_add.iter().any(|m| !admins.contains(m)) {
            diff |= bit::ADMINS_ADD;
        }
        if self.enforcement & bit::ADMINS_REMOVE != 0 && self.admins_remove.iter().any(|m| admins.contains(m)) {
            diff |= bit::ADMINS_REMOVE;
        }
        self.difference = diff;
        Ok(())
    }

    fn remediate(&mut self, live: &mut dyn LiveView) -> Result<()> {
        let mut record = live.group(&self.name).unwrap_or_else(|| LiveGroup {
            name: self.name.clone(),
            gid: self.gid,
            ..Default::default()
        });

        if self.difference & bit::PASSWORD != 0 {
            record.password = self.password.clone();
        }
        if self.difference & bit::GID != 0 {
            record.gid = self.gid;
        }
        if self.difference & (bit::MEMBERS_ADD | bit::MEMBERS_REMOVE) != 0 {
            record.members = reconcile(&record.members, &self.members_add, &self.members_remove);
        }
        if self.difference & (bit::ADMINS_ADD | bit::ADMINS_REMOVE) != 0 {
            record.admins = reconcile(&record.admins, &self.admins_add, &self.admins_remove);
        }

        live.set_group(record)?;
        self.stat(live)?;
        if self.difference != 0 {
            return Err(ResourceError::new(
                crate::error::Kind::RemediationFailed,
                format!("group '{}' still differs after remediation", self.name),
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
            .str(&self.password)
            .u32(self.gid)
            .str(&self.members_add.join(","))
            .str(&self.members_remove.join(","))
            .str(&self.admins_add.join(","))
            .str(&self.admins_remove.join(","))
            .finish()
    }

    fn unpack(packed: &str) -> Result<Self> {
        let mut up = Unpacker::new(packed);
        up.expect_prefix(Self::TYPE_TAG).map_err(pe)?;
        let mut g = Group::new("");
        g.key = up.str().map_err(pe)?;
        g.enforcement = up.u32().map_err(pe)?;
        g.name = up.str().map_err(pe)?;
        g.password = up.str().map_err(pe)?;
        g.gid = up.u32().map_err(pe)?;
        g.members_add = split_list(&up.str().map_err(pe)?);
        g.members_remove = split_list(&up.str().map_err(pe)?);
        g.admins_add = split_list(&up.str().map_err(pe)?);
        g.admins_remove = split_list(&up.str().map_err(pe)?);
        Ok(g)
    }

    fn attrs(&self) -> FoldHashMap<String, String> {
        let mut m = FoldHashMap::default();
        m.insert("name".to_string(), self.name.clone());
        m.insert("gid".to_string(), self.gid.to_string());
        m
    }
}

/// current ∪ add − remove; names mentioned in neither set are left alone.
fn reconcile(current: &[String], add: &[String], remove: &[String]) -> Vec<String> {
    let mut set: BTreeSet<String> = current.iter().cloned().collect();
    for name in add {
        set.insert(name.clone());
    }
    for name in remove {
        set.remove(name);
    }
    set.into_iter().collect()
}

fn pe(e: concord_pack::PackError) -> ResourceError {
    ResourceError::new(crate::error::Kind::ParseError, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::MemoryView;

    #[test]
    fn group_membership_scenario() {
        let mut g = Group::new("staff");
        g.set("add-members", "alice,bob").unwrap();
        g.set("remove-members", "eve").unwrap();

        let mut live = MemoryView::new();
        live.groups.insert(
            "staff".to_string(),
            LiveGroup {
                name: "staff".to_string(),
                members: vec!["bob".to_string(), "eve".to_string(), "carol".to_string()],
                ..Default::default()
            },
        );

        g.stat(&live).unwrap();
        g.remediate(&mut live).unwrap();

        let mut result: Vec<_> = live.groups["staff"].members.clone();
        result.sort();
        assert_eq!(result, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn overlapping_add_remove_rejected() {
        let mut g = Group::new("staff");
        g.set("add-members", "alice").unwrap();
        assert!(g.set("remove-members", "alice").is_err());
    }

    #[test]
    fn pack_roundtrip() {
        let mut g = Group::new("staff");
        g.set("gid", "100").unwrap();
        g.set("add-members", "alice,bob").unwrap();
        let packed = g.pack();
        let back = Group::unpack(&packed).unwrap();
        assert_eq!(back, g);
    }
}
