//! The line-oriented config file format (spec §6) and the agent/master/CLI
//! `Config` built from it (SPEC_FULL §10).

use std::path::Path;

use foldhash::HashMap as FoldHashMap;

use crate::error::{CompileError, Result};

/// Parse `key value` pairs, one per line; `#` starts a trailing comment;
/// blank lines are ignored; on read, the last occurrence of a duplicate key
/// wins.
pub fn parse(text: &str) -> FoldHashMap<String, String> {
    let mut map = FoldHashMap::default();
    for line in text.lines() {
        let line = match line.split_once('#') {
            Some((before, _)) => before,
            None => line,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((key, value)) = line.split_once(char::is_whitespace) {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    map
}

/// Merge `incoming` into `base`, first-write-wins (spec §6: "first write
/// wins on merge"). Used to layer CLI flag overrides underneath values a
/// config file already set... no: overrides must win, so callers merge in
/// override-first order via [`merge_override`] instead when the override
/// should take precedence.
pub fn merge_first_wins(base: &mut FoldHashMap<String, String>, incoming: FoldHashMap<String, String>) {
    for (k, v) in incoming {
        base.entry(k).or_insert(v);
    }
}

/// Merge `incoming` into `base`, letting `incoming` overwrite existing keys.
/// Used for applying explicit CLI flags over file/default values.
pub fn merge_override(base: &mut FoldHashMap<String, String>, incoming: FoldHashMap<String, String>) {
    for (k, v) in incoming {
        base.insert(k, v);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub policy_dir: String,
    pub keys_dir: String,
    pub trust_db: String,
    pub server: String,
    pub listen: String,
    pub log_level: String,
    pub log_target: String,
    pub sleep_ms: u64,
    pub timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy_dir: "/etc/concord/policy".to_string(),
            keys_dir: "/etc/concord/keys".to_string(),
            trust_db: "/etc/concord/trust.db".to_string(),
            server: "127.0.0.1".to_string(),
            listen: "0.0.0.0:7773".to_string(),
            log_level: "info".to_string(),
            log_target: "stderr".to_string(),
            sleep_ms: 1000,
            timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Merge, in order: built-in defaults, the config file at `path` (if
    /// given), then `overrides` (CLI flags). A missing `path` is not an
    /// error; an unreadable explicit path is.
    pub fn init(path: Option<&Path>, overrides: FoldHashMap<String, String>) -> Result<Self> {
        let mut values = default_values();

        if let Some(path) = path {
            let text = std::fs::read_to_string(path)
                .map_err(|e| CompileError::ParseError(format!("reading config '{}': {e}", path.display())))?;
            merge_override(&mut values, parse(&text));
        }

        merge_override(&mut values, overrides);
        Self::from_values(values)
    }

    fn from_values(values: FoldHashMap<String, String>) -> Result<Self> {
        let mut cfg = Config::default();
        for (key, value) in values {
            match key.as_str() {
                "policy_dir" => cfg.policy_dir = value,
                "keys_dir" => cfg.keys_dir = value,
                "trust_db" => cfg.trust_db = value,
                "server" => cfg.server = value,
                "listen" => cfg.listen = value,
                "log_level" => cfg.log_level = value,
                "log_target" => cfg.log_target = value,
                "sleep_ms" => {
                    cfg.sleep_ms = value
                        .parse()
                        .map_err(|_| CompileError::ParseError(format!("sleep_ms: invalid integer '{value}'")))?
                }
                "timeout_ms" => {
                    cfg.timeout_ms = value
                        .parse()
                        .map_err(|_| CompileError::ParseError(format!("timeout_ms: invalid integer '{value}'")))?
                }
                _ => {}
            }
        }
        Ok(cfg)
    }
}

fn default_values() -> FoldHashMap<String, String> {
    FoldHashMap::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_lines_with_comments() {
        let text = "policy_dir /srv/policy\n# a comment\n\nserver  master.example   # trailing\n";
        let map = parse(text);
        assert_eq!(map["policy_dir"], "/srv/policy");
        assert_eq!(map["server"], "master.example");
    }

    #[test]
    fn duplicate_keys_last_write_wins_on_read() {
        let text = "log_level info\nlog_level debug\n";
        let map = parse(text);
        assert_eq!(map["log_level"], "debug");
    }

    #[test]
    fn init_merges_defaults_file_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concord.conf");
        std::fs::write(&path, "server file.example\nsleep_ms 250\n").unwrap();

        let mut overrides = FoldHashMap::default();
        overrides.insert("server".to_string(), "override.example".to_string());

        let cfg = Config::init(Some(&path), overrides).unwrap();
        assert_eq!(cfg.server, "override.example");
        assert_eq!(cfg.sleep_ms, 250);
        assert_eq!(cfg.policy_dir, Config::default().policy_dir);
    }
}
