//! The advisory account-database lock (spec §5, §6, SPEC_FULL §16).
//!
//! Format: ASCII `LOCK p<pid> u<uid> t<epoch>\n`, written to a file opened
//! with `O_EXCL` so only one holder can create it. The lock is reclaimable
//! once the recorded pid is observed to be dead — with `skip_euid_check`
//! set, reclamation additionally requires the dead pid's effective uid to
//! match the lock's recorded uid.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRecord {
    pub pid: u32,
    pub uid: u32,
    pub acquired_at: u64,
}

impl LockRecord {
    fn encode(&self) -> String {
        format!("LOCK p{} u{} t{}\n", self.pid, self.uid, self.acquired_at)
    }

    fn decode(text: &str) -> Result<Self> {
        let rest = text
            .trim_end()
            .strip_prefix("LOCK p")
            .ok_or_else(|| Error::new(concord_api::Kind::ParseError, "lock file missing 'LOCK p' prefix"))?;
        let (pid_str, rest) = rest
            .split_once(" u")
            .ok_or_else(|| Error::new(concord_api::Kind::ParseError, "lock file missing uid field"))?;
        let (uid_str, rest) = rest
            .split_once(" t")
            .ok_or_else(|| Error::new(concord_api::Kind::ParseError, "lock file missing time field"))?;

        let parse_u = |s: &str, what: &str| {
            s.parse::<u64>()
                .map_err(|_| Error::new(concord_api::Kind::ParseError, format!("lock file has a malformed {what}")))
        };

        Ok(Self {
            pid: parse_u(pid_str, "pid")? as u32,
            uid: parse_u(uid_str, "uid")? as u32,
            acquired_at: parse_u(rest, "timestamp")?,
        })
    }
}

#[derive(Debug)]
pub struct Lock {
    path: PathBuf,
}

impl Lock {
    /// Acquire the lock at `path`, reclaiming a stale one per the rule
    /// above. `now` is the caller's epoch-second clock.
    pub fn acquire(path: impl AsRef<Path>, pid: u32, uid: u32, now: u64, skip_euid_check: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        match Self::try_create(&path, pid, uid, now) {
            Ok(()) => return Ok(Self { path }),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }

        let existing = std::fs::read_to_string(&path)?;
        let record = LockRecord::decode(&existing)?;

        if !pid_is_alive(record.pid) {
            let reclaimable = if skip_euid_check {
                euid_of_dead_pid(record.pid) == Some(record.uid)
            } else {
                true
            };
            if reclaimable {
                std::fs::remove_file(&path)?;
                Self::try_create(&path, pid, uid, now)?;
                return Ok(Self { path });
            }
        }

        Err(Error::new(
            concord_api::Kind::AlreadyExists,
            format!("account database is locked by pid {}", record.pid),
        ))
    }

    fn try_create(path: &Path, pid: u32, uid: u32, now: u64) -> std::io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).mode(0o600).open(path)?;
        file.write_all(LockRecord { pid, uid, acquired_at: now }.encode().as_bytes())
    }

    pub fn release(self) -> Result<()> {
        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}

fn pid_is_alive(pid: u32) -> bool {
    // Sending signal 0 checks for existence/permission without side effects.
    unsafe { libc_kill(pid as i32, 0) == 0 }
}

/// The effective uid of a dead pid can't be queried after the fact on a
/// real system (its `/proc` entry is gone); callers that pass
/// `skip_euid_check` are expected to have recorded it themselves out of
/// band. This stub always returns `None`, which makes that reclamation path
/// conservative (never reclaims) until a platform-specific accounting layer
/// supplies the value.
fn euid_of_dead_pid(_pid: u32) -> Option<u32> {
    None
}

extern "C" {
    #[link_name = "kill"]
    fn libc_kill(pid: i32, sig: i32) -> i32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrips() {
        let record = LockRecord { pid: 4242, uid: 0, acquired_at: 1_700_000_000 };
        let back = LockRecord::decode(&record.encode()).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn acquire_then_second_acquire_by_live_pid_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lock");

        let _lock = Lock::acquire(&path, std::process::id(), 0, 1_700_000_000, false).unwrap();
        let err = Lock::acquire(&path, std::process::id(), 0, 1_700_000_001, false).unwrap_err();
        assert_eq!(err.kind, concord_api::Kind::AlreadyExists);
    }

    #[test]
    fn acquire_reclaims_a_lock_held_by_a_dead_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lock");

        // PID 1 belongs to init in any PID namespace this test could run
        // in; we instead synthesize a pid that cannot possibly be alive.
        let dead_pid = 0x7fff_fffe;
        Lock::try_create(&path, dead_pid, 0, 1_700_000_000).unwrap();

        let lock = Lock::acquire(&path, std::process::id(), 0, 1_700_000_100, false).unwrap();
        lock.release().unwrap();
    }
}
