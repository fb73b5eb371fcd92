//! Certificate subjects, CSRs, signing, and fingerprinting (spec §4.5).
//!
//! Concord certificates are not real X.509 — the pack's own fixed-width
//! codec (`concord_pack`) serves as the canonical "DER" this exercise signs
//! and fingerprints, the same way every other wire record in this codebase
//! is encoded. The field set mirrors X.509 closely enough that a real ASN.1
//! encoder could be dropped in without changing any call site.

use rand::RngCore;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::traits::PublicKeyParts;
use sha1::{Digest, Sha1};

use concord_pack::{PackError, Packer, Unpacker};

use crate::error::{CertError, Kind, Result};
use crate::key::KeyPair;

fn from_pack(e: PackError) -> CertError {
    CertError::new(Kind::ParseError, e.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Subject {
    pub country: String,
    pub state: String,
    pub locality: String,
    pub org: String,
    pub org_unit: String,
    pub cert_type: String,
    pub fqdn: String,
}

impl Subject {
    fn encode(&self, p: Packer) -> Packer {
        p.str(&self.country)
            .str(&self.state)
            .str(&self.locality)
            .str(&self.org)
            .str(&self.org_unit)
            .str(&self.cert_type)
            .str(&self.fqdn)
    }

    fn decode(u: &mut Unpacker) -> Result<Self> {
        Ok(Self {
            country: u.str().map_err(from_pack)?,
            state: u.str().map_err(from_pack)?,
            locality: u.str().map_err(from_pack)?,
            org: u.str().map_err(from_pack)?,
            org_unit: u.str().map_err(from_pack)?,
            cert_type: u.str().map_err(from_pack)?,
            fqdn: u.str().map_err(from_pack)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Csr {
    pub subject: Subject,
    /// The RSA public key's modulus and exponent, big-endian, no padding.
    pub modulus: Vec<u8>,
    pub exponent: Vec<u8>,
}

impl Csr {
    pub fn new(key: &KeyPair, subject: Subject) -> Self {
        Self {
            subject,
            modulus: key.public.n().to_bytes_be(),
            exponent: key.public.e().to_bytes_be(),
        }
    }

    fn tbs(&self) -> Vec<u8> {
        let p = Subject::encode(&self.subject, Packer::new().prefix("csr"));
        p.str(&hex::encode(&self.modulus))
            .str(&hex::encode(&self.exponent))
            .finish()
            .into_bytes()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub subject: Subject,
    pub issuer: Subject,
    pub serial: u64,
    pub not_before: u64,
    pub not_after: u64,
    pub modulus: Vec<u8>,
    pub exponent: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Certificate {
    /// The bytes fingerprinted and signed: every field except the signature
    /// itself.
    fn tbs(&self) -> Vec<u8> {
        Subject::encode(&self.subject, Packer::new().prefix("cert"))
            .raw(&Subject::encode(&self.issuer, Packer::new()).finish())
            .u64(self.serial)
            .u64(self.not_before)
            .u64(self.not_after)
            .str(&hex::encode(&self.modulus))
            .str(&hex::encode(&self.exponent))
            .finish()
            .into_bytes()
    }

    /// The full DER-equivalent encoding, signature included — what
    /// [`fingerprint`] hashes and what [`Certificate::decode`] reads back.
    pub fn encode(&self) -> Vec<u8> {
        let tbs = String::from_utf8(self.tbs()).expect("tbs is ASCII");
        Packer::new().raw(&tbs).str(&hex::encode(&self.signature)).finish().into_bytes()
    }

    /// Parse a certificate written by [`Certificate::encode`].
    pub fn decode(text: &str) -> Result<Self> {
        let mut u = Unpacker::new(text);
        u.expect_prefix("cert").map_err(from_pack)?;
        let subject = Subject::decode(&mut u)?;
        let issuer = Subject::decode(&mut u)?;
        let serial = u.u64().map_err(from_pack)?;
        let not_before = u.u64().map_err(from_pack)?;
        let not_after = u.u64().map_err(from_pack)?;
        let modulus = hex::decode(u.str().map_err(from_pack)?)
            .map_err(|e| CertError::new(Kind::ParseError, format!("modulus is not valid hex: {e}")))?;
        let exponent = hex::decode(u.str().map_err(from_pack)?)
            .map_err(|e| CertError::new(Kind::ParseError, format!("exponent is not valid hex: {e}")))?;
        let signature = hex::decode(u.str().map_err(from_pack)?)
            .map_err(|e| CertError::new(Kind::ParseError, format!("signature is not valid hex: {e}")))?;

        Ok(Certificate {
            subject,
            issuer,
            serial,
            not_before,
            not_after,
            modulus,
            exponent,
            signature,
        })
    }
}

/// `sign_csr(csr, ca_cert or None, ca_key, days)` — if `ca` is `None` the
/// CSR is self-signed (CA bootstrap). Assigns a random 64-bit serial; valid
/// period is `now..now + days`.
pub fn sign_csr(csr: &Csr, ca: Option<(&Certificate, &KeyPair)>, ca_key: &KeyPair, days: u32, now: u64) -> Result<Certificate> {
    let issuer = match ca {
        Some((ca_cert, _)) => ca_cert.subject.clone(),
        None => csr.subject.clone(),
    };

    let mut serial_bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut serial_bytes);
    let serial = u64::from_be_bytes(serial_bytes);

    let mut cert = Certificate {
        subject: csr.subject.clone(),
        issuer,
        serial,
        not_before: now,
        not_after: now + (days as u64) * 86_400,
        modulus: csr.modulus.clone(),
        exponent: csr.exponent.clone(),
        signature: Vec::new(),
    };

    let tbs = cert.tbs();
    let signing_key = SigningKey::<Sha1>::new(ca_key.private.clone());
    let signature: Signature = signing_key.sign_with_rng(&mut rand::thread_rng(), &tbs);
    cert.signature = signature.to_vec();
    Ok(cert)
}

/// Verify `cert`'s signature against `ca`'s public key (or its own, for a
/// self-signed/root certificate).
pub fn verify_signature(cert: &Certificate, ca_public: &KeyPair) -> Result<()> {
    let tbs = cert.tbs();
    let verifying_key = VerifyingKey::<Sha1>::new(ca_public.public.clone());
    let signature = Signature::try_from(cert.signature.as_slice())
        .map_err(|e| CertError::new(Kind::ParseError, format!("malformed signature: {e}")))?;
    verifying_key
        .verify(&tbs, &signature)
        .map_err(|_| CertError::new(Kind::Untrusted, "signature verification failed"))
}

/// SHA-1 of the encoded certificate, displayed as colon-separated hex
/// (spec §4.5).
pub fn fingerprint(cert: &Certificate) -> String {
    let digest = Sha1::digest(cert.encode());
    digest.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_subject(fqdn: &str) -> Subject {
        Subject {
            country: "US".to_string(),
            state: "CA".to_string(),
            locality: "SF".to_string(),
            org: "Concord".to_string(),
            org_unit: "Ops".to_string(),
            cert_type: "agent".to_string(),
            fqdn: fqdn.to_string(),
        }
    }

    #[test]
    fn self_signed_bootstrap_verifies() {
        let ca_key = KeyPair::generate(1024).unwrap();
        let csr = Csr::new(&ca_key, sample_subject("ca.concord.internal"));
        let cert = sign_csr(&csr, None, &ca_key, 3650, 1_700_000_000).unwrap();
        assert!(verify_signature(&cert, &ca_key).is_ok());
    }

    #[test]
    fn encode_decode_roundtrips() {
        let ca_key = KeyPair::generate(1024).unwrap();
        let csr = Csr::new(&ca_key, sample_subject("ca.concord.internal"));
        let cert = sign_csr(&csr, None, &ca_key, 3650, 1_700_000_000).unwrap();

        let text = String::from_utf8(cert.encode()).unwrap();
        let back = Certificate::decode(&text).unwrap();
        assert_eq!(back, cert);
        assert!(verify_signature(&back, &ca_key).is_ok());
    }

    #[test]
    fn fingerprint_is_deterministic_and_distinct() {
        let ca_key = KeyPair::generate(1024).unwrap();
        let csr_a = Csr::new(&ca_key, sample_subject("a.concord.internal"));
        let cert_a = sign_csr(&csr_a, None, &ca_key, 3650, 1_700_000_000).unwrap();

        let agent_key = KeyPair::generate(1024).unwrap();
        let csr_b = Csr::new(&agent_key, sample_subject("b.concord.internal"));
        let cert_b = sign_csr(&csr_b, Some((&cert_a, &ca_key)), &ca_key, 365, 1_700_000_000).unwrap();

        assert_eq!(fingerprint(&cert_a), fingerprint(&cert_a));
        assert_ne!(fingerprint(&cert_a), fingerprint(&cert_b));
    }
}
