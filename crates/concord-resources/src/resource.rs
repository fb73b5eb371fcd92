//! The common contract every resource type implements (spec §9: "a sum type
//! with per-variant methods; an interface abstraction suffices where
//! statically typed collections allow heterogeneous holding via a common
//! trait/interface of {pack, unpack, stat, remediate, merge, key,
//! type-tag}").
//!
//! `Resource` is generic over `Self` in `merge`/`unpack`, so it is not
//! object-safe; heterogeneous catalogs hold [`crate::record::ResourceRecord`]
//! instead, which dispatches to this trait's methods per concrete type.

use foldhash::HashMap as FoldHashMap;

use crate::error::Result;
use crate::live::LiveView;

pub trait Resource: Sized {
    const TYPE_TAG: &'static str;

    /// Allocate with defaults, enforcing only the identity attribute.
    fn new(key: &str) -> Self;

    fn key(&self) -> &str;
    fn enforcement(&self) -> u32;
    fn difference(&self) -> u32;
    fn priority(&self) -> i32;
    fn set_priority(&mut self, priority: i32);

    /// Parse and store `value` under `attr`, OR-ing its bit into the
    /// enforcement mask.
    fn set(&mut self, attr: &str, value: &str) -> Result<()>;

    /// XOR the attribute's bit out of enforcement. The stored value is
    /// retained (spec §8: `set(a, unset(a)(r)) == set(a, r)`).
    fn unset(&mut self, attr: &str) -> Result<()>;

    /// Union enforcement; attributes enforced by both take the value from
    /// whichever resource has the numerically smaller priority.
    fn merge(&self, other: &Self) -> Self;

    /// Read live state into a shadow record and compute `difference`.
    fn stat(&mut self, live: &dyn LiveView) -> Result<()>;

    /// Clear every bit in `difference` by applying the minimal live-system
    /// change; idempotent.
    fn remediate(&mut self, live: &mut dyn LiveView) -> Result<()>;

    fn pack(&self) -> String;
    fn unpack(packed: &str) -> Result<Self>;

    fn attrs(&self) -> FoldHashMap<String, String>;
}
