//! Containers and wire encoding shared by every Concord crate.
//!
//! This crate has no knowledge of resources, policies, or the transport; it
//! only knows how to turn fixed-width integers and strings into the
//! `prefix::` tagged, hex-and-quoted-string records described in the wire
//! format, and back again.

pub mod codec;
pub mod container;

pub use codec::{PackError, Packer, Unpacker};
pub use container::{Buffer, Hash, List};
