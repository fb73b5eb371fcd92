//! Package/service manager adapters (SPEC_FULL §13): a configured shell
//! command template, run via `std::process::Command`, with `%n` (name) and
//! `%v` (version) substitution markers.

use std::process::Command;

use crate::error::{Error, Result};

/// The contract `Package`/`Service` remediation calls against. `%n`/`%v`
/// in each adapter's command templates are substituted before the shell
/// sees them; a nonzero exit is reported as `RemediationFailed`.
pub trait ManagerAdapter {
    fn install(&self, name: &str, version: &str) -> Result<()>;
    fn remove(&self, name: &str) -> Result<()>;
    fn is_installed(&self, name: &str) -> Result<bool>;

    fn start(&self, name: &str) -> Result<()>;
    fn stop(&self, name: &str) -> Result<()>;
    fn is_running(&self, name: &str) -> Result<bool>;
    fn enable(&self, name: &str) -> Result<()>;
    fn disable(&self, name: &str) -> Result<()>;
}

/// A `ManagerAdapter` defined purely by command-line templates, so the same
/// type serves apt, yum/dnf, systemctl, or any site-specific wrapper script.
#[derive(Debug, Clone, Default)]
pub struct ShellAdapter {
    pub install: String,
    pub remove: String,
    pub is_installed: String,
    pub start: String,
    pub stop: String,
    pub is_running: String,
    pub enable: String,
    pub disable: String,
}

impl ShellAdapter {
    /// A common `apt`-style package adapter.
    pub fn apt() -> Self {
        Self {
            install: "apt-get install -y %n=%v".to_string(),
            remove: "apt-get remove -y %n".to_string(),
            is_installed: "dpkg -s %n".to_string(),
            ..Default::default()
        }
    }

    /// A common `systemctl`-style service adapter.
    pub fn systemd() -> Self {
        Self {
            start: "systemctl start %n".to_string(),
            stop: "systemctl stop %n".to_string(),
            is_running: "systemctl is-active %n".to_string(),
            enable: "systemctl enable %n".to_string(),
            disable: "systemctl disable %n".to_string(),
            ..Default::default()
        }
    }

    fn expand(template: &str, name: &str, version: &str) -> String {
        template.replace("%n", name).replace("%v", version)
    }

    fn run(&self, template: &str, name: &str, version: &str) -> Result<std::process::ExitStatus> {
        if template.is_empty() {
            return Err(Error::new(
                concord_api::Kind::RemediationFailed,
                "no command template configured for this operation",
            ));
        }
        let cmd = Self::expand(template, name, version);
        let mut parts = cmd.split_whitespace();
        let program = parts.next().ok_or_else(|| Error::config("empty command template"))?;
        Command::new(program)
            .args(parts)
            .status()
            .map_err(|e| Error::new(concord_api::Kind::RemediationFailed, format!("could not run '{cmd}': {e}")))
    }

    fn run_ok(&self, template: &str, name: &str) -> Result<()> {
        let status = self.run(template, name, "")?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::new(
                concord_api::Kind::RemediationFailed,
                format!("command exited with status {status}"),
            ))
        }
    }
}

impl ManagerAdapter for ShellAdapter {
    fn install(&self, name: &str, version: &str) -> Result<()> {
        let status = self.run(&self.install, name, version)?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::new(concord_api::Kind::RemediationFailed, format!("package install failed: {status}")))
        }
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.run_ok(&self.remove, name)
    }

    fn is_installed(&self, name: &str) -> Result<bool> {
        Ok(self.run(&self.is_installed, name, "")?.success())
    }

    fn start(&self, name: &str) -> Result<()> {
        self.run_ok(&self.start, name)
    }

    fn stop(&self, name: &str) -> Result<()> {
        self.run_ok(&self.stop, name)
    }

    fn is_running(&self, name: &str) -> Result<bool> {
        Ok(self.run(&self.is_running, name, "")?.success())
    }

    fn enable(&self, name: &str) -> Result<()> {
        self.run_ok(&self.enable, name)
    }

    fn disable(&self, name: &str) -> Result<()> {
        self.run_ok(&self.disable, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_substitutes_name_and_version() {
        let out = ShellAdapter::expand("apt-get install -y %n=%v", "nginx", "1.2.3");
        assert_eq!(out, "apt-get install -y nginx=1.2.3");
    }

    #[test]
    fn empty_template_is_a_remediation_failure() {
        let adapter = ShellAdapter::default();
        let err = adapter.install("nginx", "1.0").unwrap_err();
        assert_eq!(err.kind, concord_api::Kind::RemediationFailed);
    }

    #[test]
    fn true_command_reports_success() {
        let adapter = ShellAdapter { is_installed: "true".to_string(), ..Default::default() };
        assert!(adapter.is_installed("anything").unwrap());
    }

    #[test]
    fn false_command_reports_not_installed() {
        let adapter = ShellAdapter { is_installed: "false".to_string(), ..Default::default() };
        assert!(!adapter.is_installed("anything").unwrap());
    }
}
