//! The daemon's real `LiveView`: the boundary `concord_resources` leaves
//! abstract (spec §1 Non-goals; SPEC_FULL §16). Package and service
//! operations delegate to a [`ManagerAdapter`]; file and directory
//! operations touch the real filesystem; sysctls read and write
//! `/proc/sys`. Account-database (user/group/host) parsing is out of scope,
//! so those three methods delegate to an in-memory shadow — a real
//! deployment would supply its own `LiveView` backed by a passwd/shadow
//! parser instead of this one.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::time::SystemTime;

use concord_resources::{LiveFile, LiveHost, LiveService, LivePackage, LiveUser, LiveGroup, LiveView, MemoryView};

use crate::error::Error;
use crate::managers::ManagerAdapter;

pub struct SystemView {
    package: Box<dyn ManagerAdapter + Send + Sync>,
    service: Box<dyn ManagerAdapter + Send + Sync>,
    /// Backs user/group/host, which this daemon does not persist to disk.
    accounts: MemoryView,
}

impl SystemView {
    pub fn new(package: Box<dyn ManagerAdapter + Send + Sync>, service: Box<dyn ManagerAdapter + Send + Sync>) -> Self {
        Self { package, service, accounts: MemoryView::new() }
    }

    fn stat_file(path: &str) -> Option<LiveFile> {
        let meta = fs::symlink_metadata(path).ok()?;
        let sha1 = if meta.is_file() {
            fs::read(path).ok().map(|bytes| MemoryView::digest_hex(&bytes)).unwrap_or_default()
        } else {
            String::new()
        };
        Some(LiveFile {
            owner: String::new(),
            group: String::new(),
            mode: meta.permissions().mode() & 0o7777,
            sha1,
            present: true,
        })
    }
}

impl LiveView for SystemView {
    fn user(&self, name: &str) -> Option<LiveUser> {
        self.accounts.user(name)
    }
    fn set_user(&mut self, user: LiveUser) -> concord_resources::Result<()> {
        self.accounts.set_user(user)
    }

    fn group(&self, name: &str) -> Option<LiveGroup> {
        self.accounts.group(name)
    }
    fn set_group(&mut self, group: LiveGroup) -> concord_resources::Result<()> {
        self.accounts.set_group(group)
    }

    fn file(&self, path: &str) -> Option<LiveFile> {
        Self::stat_file(path)
    }

    fn set_file_meta(&mut self, path: &str, meta: LiveFile) -> concord_resources::Result<()> {
        if !meta.present {
            return self.remove_file(path);
        }
        fs::set_permissions(path, fs::Permissions::from_mode(meta.mode))
            .map_err(|e| concord_resources::ResourceError::new(concord_resources::Kind::PermissionDenied, e.to_string()))
    }

    fn write_file_content(&mut self, path: &str, source_reference: &str) -> concord_resources::Result<String> {
        let bytes = fs::read(source_reference)
            .map_err(|e| concord_resources::ResourceError::new(concord_resources::Kind::NotFound, e.to_string()))?;
        if let Some(parent) = std::path::Path::new(path).parent() {
            let _ = fs::create_dir_all(parent);
        }
        fs::write(path, &bytes)
            .map_err(|e| concord_resources::ResourceError::new(concord_resources::Kind::PermissionDenied, e.to_string()))?;
        Ok(MemoryView::digest_hex(&bytes))
    }

    fn remove_file(&mut self, path: &str) -> concord_resources::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(concord_resources::ResourceError::new(concord_resources::Kind::PermissionDenied, e.to_string())),
        }
    }

    fn dir(&self, path: &str) -> Option<LiveFile> {
        Self::stat_file(path).filter(|_| std::path::Path::new(path).is_dir())
    }

    fn ensure_dir(&mut self, path: &str) -> concord_resources::Result<()> {
        fs::create_dir_all(path)
            .map_err(|e| concord_resources::ResourceError::new(concord_resources::Kind::PermissionDenied, e.to_string()))
    }

    fn remove_dir(&mut self, path: &str) -> concord_resources::Result<()> {
        match fs::remove_dir(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(concord_resources::ResourceError::new(concord_resources::Kind::PermissionDenied, e.to_string())),
        }
    }

    fn set_dir_meta(&mut self, path: &str, _owner: &str, _group: &str, mode: u32) -> concord_resources::Result<()> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| concord_resources::ResourceError::new(concord_resources::Kind::PermissionDenied, e.to_string()))
    }

    fn package(&self, name: &str) -> Option<LivePackage> {
        let installed = self.package.is_installed(name).ok()?;
        Some(LivePackage { version: String::new(), installed })
    }

    fn install_package(&mut self, name: &str, version: &str) -> concord_resources::Result<()> {
        self.package.install(name, version).map_err(to_resource_error)
    }

    fn remove_package(&mut self, name: &str) -> concord_resources::Result<()> {
        self.package.remove(name).map_err(to_resource_error)
    }

    fn service(&self, name: &str) -> Option<LiveService> {
        let running = self.service.is_running(name).ok()?;
        Some(LiveService { running, enabled: running })
    }

    fn start_service(&mut self, name: &str) -> concord_resources::Result<()> {
        self.service.start(name).map_err(to_resource_error)
    }
    fn stop_service(&mut self, name: &str) -> concord_resources::Result<()> {
        self.service.stop(name).map_err(to_resource_error)
    }
    fn enable_service(&mut self, name: &str) -> concord_resources::Result<()> {
        self.service.enable(name).map_err(to_resource_error)
    }
    fn disable_service(&mut self, name: &str) -> concord_resources::Result<()> {
        self.service.disable(name).map_err(to_resource_error)
    }

    fn host(&self, hostname: &str) -> Option<LiveHost> {
        self.accounts.host(hostname)
    }
    fn set_host(&mut self, hostname: &str, host: LiveHost) -> concord_resources::Result<()> {
        self.accounts.set_host(hostname, host)
    }

    fn sysctl(&self, name: &str) -> Option<String> {
        fs::read_to_string(sysctl_path(name)).ok().map(|s| s.trim().to_string())
    }

    fn set_sysctl(&mut self, name: &str, value: &str, persist: bool) -> concord_resources::Result<()> {
        fs::write(sysctl_path(name), format!("{value}\n"))
            .map_err(|e| concord_resources::ResourceError::new(concord_resources::Kind::PermissionDenied, e.to_string()))?;
        if persist {
            let line = format!("{name} = {value}\n");
            let mut existing = fs::read_to_string("/etc/sysctl.d/99-concord.conf").unwrap_or_default();
            existing.push_str(&line);
            fs::write("/etc/sysctl.d/99-concord.conf", existing)
                .map_err(|e| concord_resources::ResourceError::new(concord_resources::Kind::PermissionDenied, e.to_string()))?;
        }
        Ok(())
    }
}

fn sysctl_path(name: &str) -> String {
    format!("/proc/sys/{}", name.replace('.', "/"))
}

fn to_resource_error(e: Error) -> concord_resources::ResourceError {
    let kind = match e.kind {
        concord_api::Kind::PermissionDenied => concord_resources::Kind::PermissionDenied,
        _ => concord_resources::Kind::RemediationFailed,
    };
    concord_resources::ResourceError::new(kind, e.message)
}

/// Unix epoch seconds, clamped to `u32` for the BDFA/live-file `mtime`
/// fields which are fixed-width.
pub fn now_u32() -> u32 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}
