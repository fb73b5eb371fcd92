//! RSA key generation and PEM storage (spec §4.5: "generate_key(bits) — RSA
//! keypair, stored PEM-encoded").

use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::error::{CertError, Kind, Result};

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub(crate) private: RsaPrivateKey,
    pub(crate) public: RsaPublicKey,
}

impl KeyPair {
    pub fn generate(bits: usize) -> Result<Self> {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CertError::new(Kind::Io, format!("key generation failed: {e}")))?;
        let public = RsaPublicKey::from(&private);
        Ok(Self { private, public })
    }

    pub fn to_private_pem(&self) -> Result<String> {
        self.private
            .to_pkcs8_pem(LineEnding::LF)
            .map(|s| s.to_string())
            .map_err(|e| CertError::new(Kind::Io, format!("PEM encoding failed: {e}")))
    }

    pub fn from_private_pem(pem: &str) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| CertError::new(Kind::ParseError, format!("PEM decoding failed: {e}")))?;
        let public = RsaPublicKey::from(&private);
        Ok(Self { private, public })
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::traits::PublicKeyParts;

    #[test]
    fn pem_roundtrips() {
        let kp = KeyPair::generate(1024).unwrap();
        let pem = kp.to_private_pem().unwrap();
        let back = KeyPair::from_private_pem(&pem).unwrap();
        assert_eq!(kp.public.n(), back.public.n());
    }
}
