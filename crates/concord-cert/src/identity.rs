//! Per-peer elliptic-curve identity keys used by the ZAP-style
//! authenticator (spec §4.4): a 32-byte public key, a 32-byte private key,
//! base16-encoded for transport and trust-database lookups.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::{CertError, Kind, Result};

#[derive(Debug)]
pub struct PeerIdentity {
    signing_key: SigningKey,
    /// A human-readable identity string, set once the key is trusted.
    pub name: Option<String>,
}

impl PeerIdentity {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key, name: None }
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

/// Verify `signature` over `message` against a base16-encoded public key,
/// as read off the wire in a HELLO frame.
pub fn verify_with_hex_key(public_key_hex: &str, message: &[u8], signature: &[u8; 64]) -> Result<()> {
    let bytes = hex::decode(public_key_hex).map_err(|e| CertError::new(Kind::ParseError, e.to_string()))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| CertError::new(Kind::ParseError, "public key must be 32 bytes".to_string()))?;
    let key = VerifyingKey::from_bytes(&bytes).map_err(|e| CertError::new(Kind::ParseError, e.to_string()))?;
    let sig = Signature::from_bytes(signature);
    key.verify(message, &sig)
        .map_err(|_| CertError::new(Kind::Untrusted, "signature verification failed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_signature() {
        let identity = PeerIdentity::generate();
        let sig = identity.sign(b"hello");
        assert!(verify_with_hex_key(&identity.public_key_hex(), b"hello", &sig).is_ok());
        assert!(verify_with_hex_key(&identity.public_key_hex(), b"tampered", &sig).is_err());
    }
}
