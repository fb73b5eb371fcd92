//! The heterogeneous container every catalog actually holds.
//!
//! [`crate::resource::Resource`] is generic over `Self` and so cannot be
//! made into a trait object; a `Policy` (in `concord-cfg`) instead stores a
//! `Vec<ResourceRecord>`, a tagged union dispatching each operation to the
//! concrete type underneath.

use foldhash::HashMap as FoldHashMap;

use crate::dir::Dir;
use crate::error::{Result, ResourceError};
use crate::file::File;
use crate::group::Group;
use crate::host::Host;
use crate::live::LiveView;
use crate::package::Package;
use crate::resource::Resource;
use crate::service::Service;
use crate::sysctl::Sysctl;
use crate::user::User;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRecord {
    User(User),
    Group(Group),
    File(File),
    Dir(Dir),
    Package(Package),
    Service(Service),
    Host(Host),
    Sysctl(Sysctl),
}

macro_rules! dispatch {
    ($self:expr, $record:ident => $body:expr) => {
        match $self {
            ResourceRecord::User($record) => $body,
            ResourceRecord::Group($record) => $body,
            ResourceRecord::File($record) => $body,
            ResourceRecord::Dir($record) => $body,
            ResourceRecord::Package($record) => $body,
            ResourceRecord::Service($record) => $body,
            ResourceRecord::Host($record) => $body,
            ResourceRecord::Sysctl($record) => $body,
        }
    };
}

impl ResourceRecord {
    pub fn type_tag(&self) -> &'static str {
        match self {
            ResourceRecord::User(_) => User::TYPE_TAG,
            ResourceRecord::Group(_) => Group::TYPE_TAG,
            ResourceRecord::File(_) => File::TYPE_TAG,
            ResourceRecord::Dir(_) => Dir::TYPE_TAG,
            ResourceRecord::Package(_) => Package::TYPE_TAG,
            ResourceRecord::Service(_) => Service::TYPE_TAG,
            ResourceRecord::Host(_) => Host::TYPE_TAG,
            ResourceRecord::Sysctl(_) => Sysctl::TYPE_TAG,
        }
    }

    pub fn key(&self) -> &str {
        dispatch!(self, r => r.key())
    }

    pub fn enforcement(&self) -> u32 {
        dispatch!(self, r => r.enforcement())
    }

    pub fn difference(&self) -> u32 {
        dispatch!(self, r => r.difference())
    }

    pub fn priority(&self) -> i32 {
        dispatch!(self, r => r.priority())
    }

    pub fn set_priority(&mut self, priority: i32) {
        dispatch!(self, r => r.set_priority(priority))
    }

    pub fn set(&mut self, attr: &str, value: &str) -> Result<()> {
        dispatch!(self, r => r.set(attr, value))
    }

    pub fn unset(&mut self, attr: &str) -> Result<()> {
        dispatch!(self, r => r.unset(attr))
    }

    pub fn stat(&mut self, live: &dyn LiveView) -> Result<()> {
        dispatch!(self, r => r.stat(live))
    }

    pub fn remediate(&mut self, live: &mut dyn LiveView) -> Result<()> {
        dispatch!(self, r => r.remediate(live))
    }

    pub fn pack(&self) -> String {
        dispatch!(self, r => r.pack())
    }

    pub fn attrs(&self) -> FoldHashMap<String, String> {
        dispatch!(self, r => r.attrs())
    }

    /// Merge two records of the same (type, key); fails if the variants
    /// differ, which the compiler must never attempt (spec §3: "no two
    /// resources share the same (type, key)" except across merge inputs of
    /// identical type).
    pub fn merge(&self, other: &Self) -> Result<Self> {
        match (self, other) {
            (ResourceRecord::User(a), ResourceRecord::User(b)) => Ok(ResourceRecord::User(a.merge(b))),
            (ResourceRecord::Group(a), ResourceRecord::Group(b)) => Ok(ResourceRecord::Group(a.merge(b))),
            (ResourceRecord::File(a), ResourceRecord::File(b)) => Ok(ResourceRecord::File(a.merge(b))),
            (ResourceRecord::Dir(a), ResourceRecord::Dir(b)) => Ok(ResourceRecord::Dir(a.merge(b))),
            (ResourceRecord::Package(a), ResourceRecord::Package(b)) => Ok(ResourceRecord::Package(a.merge(b))),
            (ResourceRecord::Service(a), ResourceRecord::Service(b)) => Ok(ResourceRecord::Service(a.merge(b))),
            (ResourceRecord::Host(a), ResourceRecord::Host(b)) => Ok(ResourceRecord::Host(a.merge(b))),
            (ResourceRecord::Sysctl(a), ResourceRecord::Sysctl(b)) => Ok(ResourceRecord::Sysctl(a.merge(b))),
            _ => Err(ResourceError::new(
                crate::error::Kind::InvalidValue,
                format!(
                    "cannot merge a {} with a {}",
                    self.type_tag(),
                    other.type_tag()
                ),
            )),
        }
    }

    pub fn unpack(tag: &str, packed: &str) -> Result<Self> {
        match tag {
            User::TYPE_TAG => Ok(ResourceRecord::User(User::unpack(packed)?)),
            Group::TYPE_TAG => Ok(ResourceRecord::Group(Group::unpack(packed)?)),
            File::TYPE_TAG => Ok(ResourceRecord::File(File::unpack(packed)?)),
            Dir::TYPE_TAG => Ok(ResourceRecord::Dir(Dir::unpack(packed)?)),
            Package::TYPE_TAG => Ok(ResourceRecord::Package(Package::unpack(packed)?)),
            Service::TYPE_TAG => Ok(ResourceRecord::Service(Service::unpack(packed)?)),
            Host::TYPE_TAG => Ok(ResourceRecord::Host(Host::unpack(packed)?)),
            Sysctl::TYPE_TAG => Ok(ResourceRecord::Sysctl(Sysctl::unpack(packed)?)),
            other => Err(ResourceError::new(
                crate::error::Kind::ParseError,
                format!("unknown resource prefix '{other}'"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_across_types_rejected() {
        let u = ResourceRecord::User(User::new("a"));
        let g = ResourceRecord::Group(Group::new("a"));
        assert!(u.merge(&g).is_err());
    }

    #[test]
    fn pack_then_unpack_preserves_variant() {
        let mut u = User::new("bourbon");
        u.set("uid", "101").unwrap();
        let record = ResourceRecord::User(u);
        let packed = record.pack();
        let back = ResourceRecord::unpack(record.type_tag(), &packed).unwrap();
        assert_eq!(back, record);
    }
}
