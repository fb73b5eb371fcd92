//! Certificate revocation lists (spec §4.5).

use crate::cert::Certificate;
use crate::error::{CertError, Kind, Result};
use crate::key::KeyPair;

const CRL_VALIDITY_SECS: u64 = 10 * 365 * 86_400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crl {
    pub issuer_fingerprint: String,
    pub revoked: Vec<(u64, u64)>,
    pub last_update: u64,
    pub next_update: u64,
}

impl Crl {
    pub fn generate(ca_cert: &Certificate, now: u64) -> Self {
        Self {
            issuer_fingerprint: crate::cert::fingerprint(ca_cert),
            revoked: Vec::new(),
            last_update: now,
            next_update: now + CRL_VALIDITY_SECS,
        }
    }

    /// Reject double-revocation with a distinguishable error; reset
    /// `last_update`/`next_update` (`next_update = now + 10 years`).
    pub fn revoke(&mut self, cert: &Certificate, _ca_key: &KeyPair, now: u64) -> Result<()> {
        if self.is_revoked(cert) {
            return Err(CertError::new(
                Kind::AlreadyExists,
                format!("serial {} is already revoked", cert.serial),
            ));
        }
        self.revoked.push((cert.serial, now));
        self.last_update = now;
        self.next_update = now + CRL_VALIDITY_SECS;
        Ok(())
    }

    pub fn is_revoked(&self, cert: &Certificate) -> bool {
        self.revoked.iter().any(|(serial, _)| *serial == cert.serial)
    }

    /// Serialize as line-oriented text (spec §6's config-line style): a
    /// header line of `<issuer-fingerprint> <last-update> <next-update>`
    /// followed by one `<serial> <revoked-at>` line per entry.
    pub fn encode(&self) -> String {
        let mut out = format!("{} {} {}\n", self.issuer_fingerprint, self.last_update, self.next_update);
        for (serial, at) in &self.revoked {
            out.push_str(&format!("{serial} {at}\n"));
        }
        out
    }

    pub fn decode(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let header = lines
            .next()
            .ok_or_else(|| CertError::new(Kind::ParseError, "empty CRL"))?;
        let mut parts = header.split_whitespace();
        let issuer_fingerprint = parts
            .next()
            .ok_or_else(|| CertError::new(Kind::ParseError, "CRL header is missing its issuer fingerprint"))?
            .to_string();
        let last_update = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| CertError::new(Kind::ParseError, "CRL header has an invalid last-update"))?;
        let next_update = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| CertError::new(Kind::ParseError, "CRL header has an invalid next-update"))?;

        let mut revoked = Vec::new();
        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let serial = parts
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| CertError::new(Kind::ParseError, format!("malformed CRL entry: '{line}'")))?;
            let at = parts
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| CertError::new(Kind::ParseError, format!("malformed CRL entry: '{line}'")))?;
            revoked.push((serial, at));
        }

        Ok(Self { issuer_fingerprint, revoked, last_update, next_update })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::{sign_csr, Csr, Subject};

    fn subject(fqdn: &str) -> Subject {
        Subject {
            fqdn: fqdn.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn revocation_scenario() {
        let ca_key = KeyPair::generate(1024).unwrap();
        let csr = Csr::new(&ca_key, subject("ca"));
        let ca_cert = sign_csr(&csr, None, &ca_key, 3650, 1_700_000_000).unwrap();

        let agent_key = KeyPair::generate(1024).unwrap();
        let agent_csr = Csr::new(&agent_key, subject("agent1"));
        let cert = sign_csr(&agent_csr, Some((&ca_cert, &ca_key)), &ca_key, 365, 1_700_000_000).unwrap();

        let other_key = KeyPair::generate(1024).unwrap();
        let other_csr = Csr::new(&other_key, subject("agent2"));
        let other_cert = sign_csr(&other_csr, Some((&ca_cert, &ca_key)), &ca_key, 365, 1_700_000_000).unwrap();

        let mut crl = Crl::generate(&ca_cert, 1_700_000_000);
        crl.revoke(&cert, &ca_key, 1_700_000_100).unwrap();

        assert!(crl.is_revoked(&cert));
        assert!(!crl.is_revoked(&other_cert));

        let err = crl.revoke(&cert, &ca_key, 1_700_000_200).unwrap_err();
        assert_eq!(err.kind, Kind::AlreadyExists);
        assert_eq!(crl.revoked.len(), 1);
    }

    #[test]
    fn encode_decode_roundtrips() {
        let ca_key = KeyPair::generate(1024).unwrap();
        let csr = Csr::new(&ca_key, subject("ca"));
        let ca_cert = sign_csr(&csr, None, &ca_key, 3650, 1_700_000_000).unwrap();

        let agent_key = KeyPair::generate(1024).unwrap();
        let agent_csr = Csr::new(&agent_key, subject("agent1"));
        let cert = sign_csr(&agent_csr, Some((&ca_cert, &ca_key)), &ca_key, 365, 1_700_000_000).unwrap();

        let mut crl = Crl::generate(&ca_cert, 1_700_000_000);
        crl.revoke(&cert, &ca_key, 1_700_000_100).unwrap();

        let back = Crl::decode(&crl.encode()).unwrap();
        assert_eq!(back, crl);
    }
}
