//! The daemon's central command: shared state plus the handful of
//! process-wide mutable singletons (spec §5: the logger, the
//! signal-interrupt flag, the rand seed, the PAM error-string slot).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use concord_cfg::Manifest;
use concord_cert::{PeerIdentity, TrustDb};

use crate::config::DaemonConfig;
use crate::log::Logger;

/// Central command: one instance, shared behind an `Arc` by every task.
#[derive(Debug)]
pub struct Center {
    /// Global mutable state.
    pub state: Mutex<State>,

    /// The loaded configuration.
    pub config: DaemonConfig,

    /// The process-wide logger.
    pub logger: &'static Logger,

    /// This process's own elliptic-curve keypair (spec §4.4), presented in
    /// the HELLO frame it sends and used to sign outgoing PDUs. Generated
    /// fresh on every start; an operator re-trusts a daemon's key in the
    /// peer's trust database after each restart, same as rotating it by
    /// hand.
    pub identity: PeerIdentity,

    /// Set by the SIGINT/SIGTERM handler; checked by the reactor's loop
    /// between PDU exchanges so in-flight work finishes cleanly.
    pub shutdown: AtomicBool,
}

impl Center {
    pub fn new(config: DaemonConfig, logger: &'static Logger) -> Self {
        Self {
            state: Mutex::new(State::default()),
            config,
            logger,
            identity: PeerIdentity::generate(),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Global daemon state: the loaded manifest, the trust database, and
/// pending job reports (kept for `concord-run`'s polling to find by job id).
#[derive(Debug)]
pub struct State {
    /// Named policies and host entries loaded from the manifests given on
    /// the command line. The master compiles a policy from this against
    /// each agent's submitted facts (spec §4.2) rather than caching a
    /// fact-bound result, since different agents bind different facts.
    pub manifest: Manifest,

    /// The policy entry point compiled for every connecting agent. Concord
    /// has no per-host policy routing; every agent gets the same entry
    /// point, selected by fact-driven `If`/`Map` branches inside it.
    pub policy_entry: String,

    /// Peer certificate trust. Populated from `DaemonConfig::inner.trust_db`
    /// at startup and updated by `cw-cert` out of band.
    pub trust_db: TrustDb,

    /// Jobs accepted but not yet completed, keyed by job id.
    pub jobs: foldhash::HashMap<String, JobState>,
}

#[derive(Debug, Clone)]
pub enum JobState {
    Running,
    Done(concord_api::JobReport),
    Failed(concord_api::ApiError),
}

impl Default for State {
    fn default() -> Self {
        Self {
            manifest: Manifest::default(),
            policy_entry: "base".to_string(),
            trust_db: TrustDb::default(),
            jobs: foldhash::HashMap::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_flag_starts_false() {
        let logger_slot: &'static Logger = Box::leak(Box::new(Logger::test_instance()));
        let center = Center::new(DaemonConfig::default_for_test(), logger_slot);
        assert!(!center.is_shutting_down());
        center.request_shutdown();
        assert!(center.is_shutting_down());
    }
}
