//! Spawning the agent or master role (spec §5). Far smaller than a
//! multi-unit orchestrator: concord has exactly two daemon roles, and each
//! is a single task built directly on the [`crate::reactor`].

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use concord_api::{wire, Kind as ApiKind, Pdu, PduType};
use concord_cfg::{FactHash, Manifest};
use concord_resources::LiveView;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::center::{Center, JobState};
use crate::error::{Error, Result};
use crate::reactor::{self, Handler, HandlerOutcome};

/// Load a manifest stored as JSON at `path` (SPEC_FULL §10: the manifest
/// AST has no textual grammar of its own in this workspace).
pub fn load_manifest(path: &str) -> Result<Manifest> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| Error::config(format!("invalid manifest '{path}': {e}")))
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn collect_local_facts() -> FactHash {
    let mut facts = FactHash::default();
    facts.insert("os".to_string(), std::env::consts::OS.to_string());
    facts.insert("arch".to_string(), std::env::consts::ARCH.to_string());
    if let Ok(hostname) = std::env::var("HOSTNAME") {
        facts.insert("hostname".to_string(), hostname);
    }
    facts
}

fn facts_to_payload(facts: &FactHash) -> Vec<u8> {
    let mut lines: Vec<String> = facts.iter().map(|(k, v)| format!("{k}={v}")).collect();
    lines.sort();
    lines.join("\n").into_bytes()
}

/// If `pdu` is an ERROR PDU, decode its `(Kind, message)` payload.
fn error_kind_and_message(pdu: &Pdu) -> Option<(ApiKind, String)> {
    if pdu.pdu_type() != Some(PduType::Error) {
        return None;
    }
    let kind = pdu.payload.first().and_then(|b| ApiKind::parse(&String::from_utf8_lossy(b))).unwrap_or(ApiKind::ParseError);
    let message = pdu.payload.get(1).map(|b| String::from_utf8_lossy(b).into_owned()).unwrap_or_else(|| "master refused this agent run".to_string());
    Some((kind, message))
}

fn parse_facts(payload: &[u8]) -> FactHash {
    let mut facts = FactHash::default();
    let text = String::from_utf8_lossy(payload);
    for line in text.lines() {
        if let Some((k, v)) = line.split_once('=') {
            facts.insert(k.to_string(), v.to_string());
        }
    }
    facts
}

//--- Agent role ---------------------------------------------------------

/// Connect to the configured master, exchange HELLO/FACTS/POLICY/REPORT
/// once, then sleep for `sleep_ms` and repeat until shutdown.
pub async fn run_agent(center: Arc<Center>, live: &mut dyn LiveView) -> Result<()> {
    while !center.is_shutting_down() {
        if let Err(e) = run_agent_once(&center, live).await {
            tracing::warn!("agent run failed: {e}");
        }

        let sleep_ms = center.config.inner.sleep_ms.max(100);
        tokio::time::sleep(std::time::Duration::from_millis(sleep_ms)).await;
    }
    Ok(())
}

async fn run_agent_once(center: &Arc<Center>, live: &mut dyn LiveView) -> Result<()> {
    let addr = center.config.server_addr()?;
    let mut stream = TcpStream::connect(addr).await?;

    send(&mut stream, &Pdu::new(PduType::Hello, vec![center.identity.public_key_hex().into_bytes()])).await?;
    let hello_reply = recv(&mut stream).await?;
    if let Some(err) = error_kind_and_message(&hello_reply) {
        let (kind, message) = err;
        return Err(Error::new(kind, message));
    }

    let facts = collect_local_facts();
    send(&mut stream, &Pdu::new(PduType::Facts, vec![facts_to_payload(&facts)])).await?;

    let reply = recv(&mut stream).await?;
    let policy = match reply.pdu_type() {
        Some(PduType::Policy) => {
            let packed = reply.payload.first().map(|b| String::from_utf8_lossy(b).into_owned()).unwrap_or_default();
            concord_cfg::Policy::unpack(&packed).map_err(Error::from)?
        }
        Some(PduType::Error) => {
            let (kind, message) = error_kind_and_message(&reply).unwrap();
            return Err(Error::new(kind, message));
        }
        _ => return Err(Error::new(ApiKind::ParseError, "expected POLICY PDU")),
    };

    let report = crate::report::run_policy(policy, live);
    send(&mut stream, &Pdu::new(PduType::Report, vec![report.pack().into_bytes()])).await?;
    let _ = recv(&mut stream).await;
    Ok(())
}

//--- Master role ---------------------------------------------------------

pub struct MasterHandler;

impl Handler for MasterHandler {
    fn handle(&self, center: &Arc<Center>, peer: std::net::SocketAddr, pdu: Pdu) -> (Option<Pdu>, HandlerOutcome) {
        match pdu.pdu_type() {
            Some(PduType::Hello) => (Some(Pdu::new(PduType::Hello, vec![])), HandlerOutcome::Continue),

            Some(PduType::Facts) => {
                let facts = pdu.payload.first().map(|b| parse_facts(b)).unwrap_or_default();
                let reply = match compile_default_policy(center, &facts) {
                    Ok(packed) => Pdu::new(PduType::Policy, vec![packed.into_bytes()]),
                    Err(e) => {
                        tracing::warn!("policy compile failed for {peer}: {e}");
                        Pdu::error(e.kind, &e.message)
                    }
                };
                (Some(reply), HandlerOutcome::Continue)
            }

            Some(PduType::Report) => {
                if let Some(packed) = pdu.payload.first() {
                    match concord_api::JobReport::unpack(&String::from_utf8_lossy(packed)) {
                        Ok(report) => {
                            tracing::info!("received report from {peer}: {} resources", report.resources.len());
                            let job_id = format!("{peer}-{}", report.start_sec);
                            center.state.lock().unwrap().jobs.insert(job_id, JobState::Done(report));
                        }
                        Err(e) => tracing::warn!("malformed REPORT from {peer}: {e}"),
                    }
                }
                (Some(Pdu::new(PduType::Done, vec![])), HandlerOutcome::Continue)
            }

            Some(PduType::Request) => {
                let job_id = format!("job-{}", now_secs());
                center.state.lock().unwrap().jobs.insert(job_id.clone(), JobState::Running);
                (Some(Pdu::new(PduType::Submitted, vec![job_id.into_bytes()])), HandlerOutcome::Continue)
            }

            Some(PduType::Check) => {
                let job_id = pdu.payload.first().map(|b| String::from_utf8_lossy(b).into_owned()).unwrap_or_default();
                let state = center.state.lock().unwrap();
                let reply = match state.jobs.get(&job_id) {
                    Some(JobState::Done(report)) => Pdu::new(PduType::Result, vec![report.pack().into_bytes()]),
                    Some(JobState::Failed(e)) => Pdu::error(e.kind, &e.message),
                    Some(JobState::Running) | None => Pdu::new(PduType::Submitted, vec![job_id.into_bytes()]),
                };
                (Some(reply), HandlerOutcome::Continue)
            }

            Some(PduType::Bye) => (None, HandlerOutcome::Stop),

            _ => (Some(Pdu::error(ApiKind::ParseError, "unexpected PDU type")), HandlerOutcome::Continue),
        }
    }
}

fn compile_default_policy(center: &Arc<Center>, facts: &FactHash) -> Result<String> {
    let state = center.state.lock().unwrap();
    let policy = concord_cfg::compile(&state.manifest, &state.policy_entry, facts).map_err(Error::from)?;
    Ok(policy.pack())
}

pub async fn run_master(center: Arc<Center>) -> Result<()> {
    let addr = center.config.listen_addr()?;
    let listener = crate::daemon::bind(addr).await?;
    let zap = crate::zap::spawn(center.clone());
    reactor::run(center, listener, Arc::new(MasterHandler), zap).await
}

//--- Wire helpers ---------------------------------------------------------

async fn send(stream: &mut TcpStream, pdu: &Pdu) -> Result<()> {
    stream.write_all(&wire::encode_pdu(pdu)).await?;
    Ok(())
}

async fn recv(stream: &mut TcpStream) -> Result<Pdu> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some((pdu, _consumed)) = wire::decode_pdu(&buf, false)? {
            return Ok(pdu);
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(Error::new(ApiKind::Io, "connection closed while waiting for a PDU"));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facts_roundtrip_through_the_wire_payload_format() {
        let mut facts = FactHash::default();
        facts.insert("os".to_string(), "linux".to_string());
        facts.insert("arch".to_string(), "x86_64".to_string());
        let payload = facts_to_payload(&facts);
        let back = parse_facts(&payload);
        assert_eq!(back, facts);
    }
}
