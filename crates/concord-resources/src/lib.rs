//! The typed resource catalog: per-type attribute records, enforcement and
//! difference bitmasks, merge, stat, and remediate.
//!
//! Every resource type lives in its own module and implements [`Resource`];
//! [`record::ResourceRecord`] is the sum type a [`concord_cfg`]-compiled
//! policy actually stores, since `Resource` itself is not object-safe.

pub mod dir;
pub mod error;
pub mod file;
pub mod group;
pub mod host;
pub mod live;
mod numeric;
pub mod package;
pub mod record;
pub mod resource;
pub mod service;
pub mod sysctl;
pub mod user;

pub use dir::Dir;
pub use error::{Kind, ResourceError, Result};
pub use file::File;
pub use group::Group;
pub use host::Host;
pub use live::{
    LiveFile, LiveGroup, LiveHost, LivePackage, LiveService, LiveUser, LiveView, MemoryView,
};
pub use package::Package;
pub use record::ResourceRecord;
pub use resource::Resource;
pub use service::Service;
pub use sysctl::Sysctl;
pub use user::User;
