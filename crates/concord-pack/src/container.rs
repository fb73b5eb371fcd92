//! The containers every other Concord crate is built from.
//!
//! The original implementation hand-rolled a linked list, a string-keyed
//! hash table, a growable string, and a byte-buffer packer. None of those
//! need hand-rolling in Rust: [`Vec`], [`foldhash::HashMap`], [`String`] and
//! [`Buffer`] cover the same ground, with the ownership and growth-amortized
//! cost guarantees the original had to earn by hand.

use foldhash::HashMap as FoldHashMap;

/// An ordered, owned sequence. Concord never needs random removal from the
/// middle fast enough to justify anything fancier than a [`Vec`].
pub type List<T> = Vec<T>;

/// A mapping keyed by an owned string. Concord's keys come from its own
/// policy and fact data, not from untrusted network input, so `foldhash`'s
/// speed is preferable to `std`'s HashDoS-resistant but slower default.
pub type Hash<V> = FoldHashMap<String, V>;

//----------- Buffer -------------------------------------------------------

/// A growable byte buffer used to assemble packed wire records before they
/// are framed and sent.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Buffer {
    bytes: Vec<u8>,
}

impl Buffer {
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(cap),
        }
    }

    pub fn push_str(&mut self, s: &str) {
        self.bytes.extend_from_slice(s.as_bytes());
    }

    pub fn push_bytes(&mut self, b: &[u8]) {
        self.bytes.extend_from_slice(b);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    /// View the buffer as UTF-8 text, as produced by the [`crate::codec`]
    /// encoders (which only ever emit ASCII).
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes).expect("pack codec only emits ASCII")
    }
}

impl From<String> for Buffer {
    fn from(s: String) -> Self {
        Self {
            bytes: s.into_bytes(),
        }
    }
}
