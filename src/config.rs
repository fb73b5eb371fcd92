//! Daemon configuration: wraps [`concord_cfg::Config`] with the daemon-only
//! settings (identity to drop privileges to, pid file) that the line-oriented
//! file format doesn't name directly (SPEC_FULL §10).

use std::net::SocketAddr;
use std::path::Path;

use camino::Utf8PathBuf;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub inner: concord_cfg::Config,
    /// `user:group` to drop privileges to after binding, if set.
    pub identity: Option<(String, String)>,
    pub pid_file: Option<Utf8PathBuf>,
    pub daemonize: bool,
}

impl DaemonConfig {
    pub fn init(path: Option<&Path>, overrides: foldhash::HashMap<String, String>) -> Result<Self> {
        let inner = concord_cfg::Config::init(path, overrides).map_err(Error::from)?;
        Ok(Self {
            inner,
            identity: None,
            pid_file: None,
            daemonize: false,
        })
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.inner
            .listen
            .parse()
            .map_err(|e| Error::config(format!("invalid listen address '{}': {e}", self.inner.listen)))
    }

    pub fn server_addr(&self) -> Result<SocketAddr> {
        let addr = if self.inner.server.contains(':') {
            self.inner.server.clone()
        } else {
            format!("{}:7773", self.inner.server)
        };
        addr.parse()
            .map_err(|e| Error::config(format!("invalid server address '{addr}': {e}")))
    }

    #[cfg(test)]
    pub fn default_for_test() -> Self {
        Self {
            inner: concord_cfg::Config::default(),
            identity: None,
            pid_file: None,
            daemonize: false,
        }
    }
}
