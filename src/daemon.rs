//! Daemon-mode process management: becoming a background process, dropping
//! privileges, and binding the listen socket (spec §5, §6).
//!
//! The upstream `daemonbase` crate also offers systemd socket activation via
//! `EnvSockets`; concord has no systemd integration requirement, so this
//! module only ever binds its own listen socket directly.

use std::net::{SocketAddr, TcpListener};

use daemonbase::process::Process;

use crate::config::DaemonConfig;
use crate::error::{Error, Result};

/// Apply daemonization and privilege drop according to `config`.
pub fn daemonize(config: &DaemonConfig) -> Result<()> {
    let mut daemon_config = daemonbase::process::Config::default();

    if let Some((user, group)) = &config.identity {
        daemon_config = daemon_config
            .with_user(user)
            .map_err(|e| Error::config(format!("invalid user name '{user}': {e}")))?
            .with_group(group)
            .map_err(|e| Error::config(format!("invalid group name '{group}': {e}")))?;
    }

    if let Some(pid_file) = &config.pid_file {
        daemon_config = daemon_config.with_pid_file(daemonbase::config::ConfigPath::from(pid_file.clone().into_std_path_buf()));
    }

    let mut process = Process::from_config(daemon_config);

    if config.daemonize {
        tracing::debug!("becoming daemon process");
        process
            .setup_daemon(true)
            .map_err(|_| Error::config("failed to become daemon process"))?;
    }

    if config.identity.is_some() {
        tracing::debug!("dropping privileges");
        process
            .drop_privileges()
            .map_err(|_| Error::config("failed to drop privileges"))?;
    }

    Ok(())
}

/// Bind the listen socket and hand back a non-blocking tokio listener.
pub async fn bind(addr: SocketAddr) -> Result<tokio::net::TcpListener> {
    let std_listener = TcpListener::bind(addr)?;
    std_listener.set_nonblocking(true)?;
    Ok(tokio::net::TcpListener::from_std(std_listener)?)
}
