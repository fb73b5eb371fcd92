//! The reactor: a single-threaded cooperative event loop multiplexing one
//! listening endpoint (spec §5, §8).
//!
//! A handler is `(Pdu, peer) -> HandlerOutcome`. Handlers must not block
//! indefinitely and must not call back into the reactor's own poll;
//! suspension happens only inside the accept/read/write awaits the reactor
//! itself performs. PDUs whose type frame is empty or unrecognized never
//! reach a handler — they're silently ignored, per spec §8's testable
//! property.
//!
//! Authentication (spec §4.4) happens here, ahead of any handler: a
//! connection's first PDU must be HELLO carrying the peer's public key, and
//! `zap::authenticate` must accept it before any later PDU reaches
//! `Handler::handle`. `Handler::handle` stays synchronous, so the ZAP round
//! trip — itself async — is done in `serve_connection`, not inside a
//! handler.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use concord_api::{wire, Kind, Pdu, PduType};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crate::center::Center;
use crate::error::Result;
use crate::zap::{self, ZapHandle, ZapReply};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    Continue,
    Stop,
}

/// A connection handler: given one PDU and the peer it arrived from,
/// produce zero or one reply PDU and say whether the connection should
/// keep going.
pub trait Handler: Send + Sync {
    fn handle(&self, center: &Arc<Center>, peer: SocketAddr, pdu: Pdu) -> (Option<Pdu>, HandlerOutcome);
}

/// Accept connections on `listener` until `center`'s shutdown flag is set,
/// dispatching each connection's PDUs to `handler` in send order. Distinct
/// peers run as independent tasks and may interleave; a single peer's PDUs
/// are always delivered to `handler` in order. `zap` gates every connection
/// on a successful HELLO before `handler` ever sees a PDU.
pub async fn run(center: Arc<Center>, listener: TcpListener, handler: Arc<dyn Handler>, zap: ZapHandle) -> Result<()> {
    loop {
        if center.is_shutting_down() {
            return Ok(());
        }

        let accept = tokio::time::timeout(std::time::Duration::from_millis(200), listener.accept()).await;
        let (stream, peer) = match accept {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                tracing::warn!("accept failed: {e}");
                continue;
            }
            Err(_) => continue, // timed out; loop back around to re-check shutdown
        };

        let center = center.clone();
        let handler = handler.clone();
        let zap = zap.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_connection(&center, peer, stream, handler, zap).await {
                tracing::warn!("connection with {peer} ended: {e}");
            }
        });
    }
}

async fn serve_connection(
    center: &Arc<Center>,
    peer: SocketAddr,
    mut stream: TcpStream,
    handler: Arc<dyn Handler>,
    zap: ZapHandle,
) -> Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut authenticated = false;

    loop {
        if center.shutdown.load(Ordering::SeqCst) {
            return Ok(());
        }

        while let Some((pdu, consumed)) = wire::decode_pdu(&buf, false)? {
            buf.drain(..consumed);

            if pdu.raw_type.is_empty() || pdu.pdu_type().is_none() {
                tracing::debug!("ignoring PDU of unrecognized type '{}' from {peer}", pdu.raw_type);
                continue;
            }

            if !authenticated {
                if pdu.pdu_type() != Some(PduType::Hello) {
                    stream.write_all(&wire::encode_pdu(&Pdu::error(Kind::Untrusted, "HELLO required before any other PDU"))).await?;
                    return Ok(());
                }
                let public_key_hex = pdu.payload.first().map(|b| String::from_utf8_lossy(b).into_owned()).unwrap_or_default();
                let request = zap::ZapRequest { domain: "concord".to_string(), public_key_hex };
                match zap::authenticate(&zap, request).await {
                    ZapReply::Ok => authenticated = true,
                    ZapReply::Untrusted => {
                        tracing::warn!("rejected unauthenticated peer {peer}");
                        stream.write_all(&wire::encode_pdu(&Pdu::error(Kind::Untrusted, "peer key is not trusted"))).await?;
                        return Ok(());
                    }
                }
            }

            let (reply, outcome) = handler.handle(center, peer, pdu);
            if let Some(reply) = reply {
                stream.write_all(&wire::encode_pdu(&reply)).await?;
            }
            if outcome == HandlerOutcome::Stop {
                return Ok(());
            }
        }

        use tokio::io::AsyncReadExt;
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}
