//! The ZAP-style authenticator (spec §4.4): a background cooperative task
//! servicing a well-known endpoint. A real ZeroMQ ZAP handler listens on an
//! inproc socket; since concord has no ZeroMQ dependency, the same contract
//! is expressed over a channel standing in for that inproc transport.

use std::sync::Arc;

use concord_cert::Verdict;
use tokio::sync::{mpsc, oneshot};

use crate::center::Center;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZapRequest {
    pub domain: String,
    /// The peer's 64-hex-char elliptic-curve public key, as read off the
    /// HELLO frame (spec §4.3, §4.4) — not an RSA CA certificate.
    pub public_key_hex: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZapReply {
    /// `200 OK`, anonymous identity.
    Ok,
    /// `400 Untrusted`.
    Untrusted,
}

pub type ZapHandle = mpsc::Sender<(ZapRequest, oneshot::Sender<ZapReply>)>;

/// Spawn the authenticator task and return a handle to send it requests.
/// The task runs until its sender side is dropped.
pub fn spawn(center: Arc<Center>) -> ZapHandle {
    let (tx, mut rx) = mpsc::channel::<(ZapRequest, oneshot::Sender<ZapReply>)>(32);

    tokio::spawn(async move {
        while let Some((request, reply_tx)) = rx.recv().await {
            let verdict = {
                let state = center.state.lock().unwrap();
                state.trust_db.verify(&request.public_key_hex)
            };
            let reply = match verdict {
                Verdict::Ok => ZapReply::Ok,
                Verdict::NotTrusted => {
                    tracing::warn!("rejected untrusted peer in domain '{}'", request.domain);
                    ZapReply::Untrusted
                }
            };
            let _ = reply_tx.send(reply);
        }
    });

    tx
}

/// Ask the authenticator to verify a peer certificate, awaiting its reply.
pub async fn authenticate(handle: &ZapHandle, request: ZapRequest) -> ZapReply {
    let (reply_tx, reply_rx) = oneshot::channel();
    if handle.send((request, reply_tx)).await.is_err() {
        return ZapReply::Untrusted;
    }
    reply_rx.await.unwrap_or(ZapReply::Untrusted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DaemonConfig;
    use crate::log::Logger;
    use concord_cert::PeerIdentity;

    #[tokio::test]
    async fn untrusted_key_is_rejected_unless_verification_disabled() {
        let logger: &'static Logger = Box::leak(Box::new(Logger::test_instance()));
        let center = Arc::new(Center::new(DaemonConfig::default_for_test(), logger));
        let handle = spawn(center.clone());

        let key = PeerIdentity::generate().public_key_hex();
        let reply = authenticate(&handle, ZapRequest { domain: "concord".into(), public_key_hex: key.clone() }).await;
        assert_eq!(reply, ZapReply::Untrusted);

        center.state.lock().unwrap().trust_db.verification_disabled = true;
        let reply = authenticate(&handle, ZapRequest { domain: "concord".into(), public_key_hex: key }).await;
        assert_eq!(reply, ZapReply::Ok);
    }

    #[tokio::test]
    async fn trusted_key_is_accepted() {
        let logger: &'static Logger = Box::leak(Box::new(Logger::test_instance()));
        let center = Arc::new(Center::new(DaemonConfig::default_for_test(), logger));
        let key = PeerIdentity::generate().public_key_hex();
        center.state.lock().unwrap().trust_db.trust(key.clone(), "agent1");
        let handle = spawn(center.clone());

        let reply = authenticate(&handle, ZapRequest { domain: "concord".into(), public_key_hex: key }).await;
        assert_eq!(reply, ZapReply::Ok);
    }
}
