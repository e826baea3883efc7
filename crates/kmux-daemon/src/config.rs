//! Daemon configuration (spec §4.6, §6): tick intervals, and the handful of
//! knobs the `[daemon]` section of the config file may override.

use serde::{Deserialize, Serialize};

use crate::errors::DaemonError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Reconciliation tick period in seconds. Default: 5.
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    /// Auto-save tick period in seconds. Default: 900 (15 min).
    #[serde(default = "default_auto_save_interval_secs")]
    pub auto_save_interval_secs: u64,

    /// Deadline for a single completion sub-shell / remote probe. Default: 2.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Deadline for the whole state-view fan-out across remote hosts. Default: 5.
    #[serde(default = "default_fanout_timeout_secs")]
    pub fanout_timeout_secs: u64,

    /// Emulator binary to invoke (spec §4.3). Default: `kitten`.
    #[serde(default = "default_emulator_binary")]
    pub emulator_binary: String,

    /// Persistence-agent binary to invoke (spec §4.4). Default: `tmux`.
    #[serde(default = "default_agent_binary")]
    pub agent_binary: String,

    /// Remote hosts queried by the state view's fan-out (spec §4.5), as SSH aliases.
    #[serde(default)]
    pub remote_hosts: Vec<String>,
}

impl DaemonConfig {
    pub fn validate(&self) -> Result<(), DaemonError> {
        if self.reconcile_interval_secs == 0 {
            return Err(DaemonError::ConfigInvalid(
                "reconcile_interval_secs must be > 0".to_string(),
            ));
        }
        if self.auto_save_interval_secs == 0 {
            return Err(DaemonError::ConfigInvalid(
                "auto_save_interval_secs must be > 0".to_string(),
            ));
        }
        if self.command_timeout_secs == 0 {
            return Err(DaemonError::ConfigInvalid(
                "command_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.fanout_timeout_secs == 0 {
            return Err(DaemonError::ConfigInvalid(
                "fanout_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.emulator_binary.trim().is_empty() {
            return Err(DaemonError::ConfigInvalid(
                "emulator_binary must not be empty".to_string(),
            ));
        }
        if self.agent_binary.trim().is_empty() {
            return Err(DaemonError::ConfigInvalid(
                "agent_binary must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: default_reconcile_interval_secs(),
            auto_save_interval_secs: default_auto_save_interval_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            fanout_timeout_secs: default_fanout_timeout_secs(),
            emulator_binary: default_emulator_binary(),
            agent_binary: default_agent_binary(),
            remote_hosts: Vec::new(),
        }
    }
}

fn default_reconcile_interval_secs() -> u64 {
    5
}

fn default_auto_save_interval_secs() -> u64 {
    900
}

fn default_command_timeout_secs() -> u64 {
    2
}

fn default_fanout_timeout_secs() -> u64 {
    5
}

fn default_emulator_binary() -> String {
    "kitten".to_string()
}

fn default_agent_binary() -> String {
    "tmux".to_string()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    daemon: DaemonConfig,
}

/// Load the `[daemon]` section from `paths.daemon_config_file()`. Falls back
/// to defaults if the file is missing or fails to parse; a value that
/// parses but fails `validate()` is propagated (spec: bad config should be
/// loud, a missing file should not be).
pub fn load_daemon_config(paths: &kmux_paths::KmuxPaths) -> Result<DaemonConfig, DaemonError> {
    let path = paths.daemon_config_file();
    let config = match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
            Ok(file) => file.daemon,
            Err(e) => {
                tracing::warn!(
                    event = "daemon.config.parse_failed",
                    path = %path.display(),
                    error = %e,
                );
                DaemonConfig::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => DaemonConfig::default(),
        Err(e) => {
            tracing::warn!(
                event = "daemon.config.read_failed",
                path = %path.display(),
                error = %e,
            );
            DaemonConfig::default()
        }
    };
    config.validate()?;
    Ok(config)
}
