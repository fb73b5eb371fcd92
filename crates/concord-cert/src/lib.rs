//! Key generation, CSR/certificate signing, fingerprinting, CRLs, the trust
//! database, and per-peer ZAP identity keys.

pub mod cert;
pub mod crl;
pub mod error;
pub mod identity;
pub mod key;
pub mod trust;

pub use cert::{fingerprint, sign_csr, verify_signature, Certificate, Csr, Subject};
pub use crl::Crl;
pub use error::{CertError, Kind, Result};
pub use identity::{verify_with_hex_key, PeerIdentity};
pub use key::KeyPair;
pub use trust::{TrustDb, Verdict};
