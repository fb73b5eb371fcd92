//! Trust database (spec §4.4): an ordered mapping from a peer's 64-hex-char
//! elliptic-curve public key to a human identity string, plus ZAP-style
//! verification. This is distinct from the RSA CA certificates §4.5
//! describes — those sign/issue agent certificates, while this table is
//! keyed by the much shorter-lived per-peer [`crate::identity::PeerIdentity`]
//! key the ZAP authenticator actually checks.

use foldhash::HashMap as FoldHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    NotTrusted,
}

#[derive(Debug, Default)]
pub struct TrustDb {
    entries: FoldHashMap<String, String>,
    /// When set, [`TrustDb::verify`] always succeeds; used only for
    /// key-pinning bootstrap (spec §4.4).
    pub verification_disabled: bool,
}

impl TrustDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trust(&mut self, public_key_hex: impl Into<String>, identity: impl Into<String>) {
        self.entries.insert(public_key_hex.into(), identity.into());
    }

    pub fn revoke(&mut self, public_key_hex: &str) -> Option<String> {
        self.entries.remove(public_key_hex)
    }

    pub fn identity_of(&self, public_key_hex: &str) -> Option<&str> {
        self.entries.get(public_key_hex).map(String::as_str)
    }

    pub fn verify(&self, public_key_hex: &str) -> Verdict {
        if self.verification_disabled || self.entries.contains_key(public_key_hex) {
            Verdict::Ok
        } else {
            Verdict::NotTrusted
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Serialize as `<public-key-hex> <identity>` lines, one entry per
    /// line, matching the config file's line-oriented convention (spec §6).
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (key, identity) in &self.entries {
            out.push_str(key);
            out.push(' ');
            out.push_str(identity);
            out.push('\n');
        }
        out
    }

    pub fn decode(text: &str) -> crate::error::Result<Self> {
        let mut db = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key, identity) = line.split_once(' ').ok_or_else(|| {
                crate::error::CertError::new(crate::error::Kind::ParseError, format!("malformed trust db line: '{line}'"))
            })?;
            db.entries.insert(key.to_string(), identity.to_string());
        }
        Ok(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PeerIdentity;

    #[test]
    fn trust_then_verify_then_revoke() {
        let peer = PeerIdentity::generate();
        let key = peer.public_key_hex();

        let mut db = TrustDb::new();
        assert_eq!(db.verify(&key), Verdict::NotTrusted);

        db.trust(key.clone(), "agent1");
        assert_eq!(db.verify(&key), Verdict::Ok);
        assert_eq!(db.identity_of(&key), Some("agent1"));

        db.revoke(&key);
        assert_eq!(db.verify(&key), Verdict::NotTrusted);
    }

    #[test]
    fn disabled_verification_accepts_everything() {
        let peer = PeerIdentity::generate();
        let mut db = TrustDb::new();
        db.verification_disabled = true;
        assert_eq!(db.verify(&peer.public_key_hex()), Verdict::Ok);
    }

    #[test]
    fn encode_decode_roundtrips() {
        let peer = PeerIdentity::generate();
        let key = peer.public_key_hex();

        let mut db = TrustDb::new();
        db.trust(key.clone(), "agent1");

        let back = TrustDb::decode(&db.encode()).unwrap();
        assert_eq!(back.identity_of(&key), Some("agent1"));
    }
}
