use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("could not resolve a data directory — set $KMUX_DATA_DIR or $XDG_DATA_HOME")]
    DataDirNotFound,
    #[error("could not resolve a config directory — set $KMUX_CONFIG_DIR or $XDG_CONFIG_HOME")]
    ConfigDirNotFound,
}

const APP_DIR: &str = "kmux";

/// Centralized path construction for kmux's on-disk layout.
///
/// Single source of truth for every path the daemon, store, and CLI front-end
/// agree on. Use `resolve()` in production code and `from_dirs()` in tests.
/// Unlike a fixed `~/.kmux` layout, this follows the platform's XDG-style
/// data/config home conventions (via the `dirs` crate), with dedicated
/// environment-variable overrides for each (spec ยง6 "Environment and paths").
#[derive(Debug, Clone)]
pub struct KmuxPaths {
    data_dir: PathBuf,
    config_dir: PathBuf,
    socket_path: Option<PathBuf>,
}

impl KmuxPaths {
    /// Resolve paths from the platform's data/config home directories, with
    /// `KMUX_DATA_DIR` / `KMUX_CONFIG_DIR` / `KMUX_SOCKET_PATH` overrides.
    pub fn resolve() -> Result<Self, PathError> {
        let data_dir = match std::env::var_os("KMUX_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .ok_or(PathError::DataDirNotFound)?
                .join(APP_DIR),
        };
        let config_dir = match std::env::var_os("KMUX_CONFIG_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or(PathError::ConfigDirNotFound)?
                .join(APP_DIR),
        };
        let socket_path = std::env::var_os("KMUX_SOCKET_PATH").map(PathBuf::from);
        Ok(Self {
            data_dir,
            config_dir,
            socket_path,
        })
    }

    /// Construct paths from explicit directories. Use in tests.
    pub fn from_dirs(data_dir: PathBuf, config_dir: PathBuf) -> Self {
        Self {
            data_dir,
            config_dir,
            socket_path: None,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    // --- Socket ---

    /// Default: `<tmp>/kmux-<uid>/default`, overridable via `KMUX_SOCKET_PATH`.
    pub fn daemon_socket(&self) -> PathBuf {
        if let Some(explicit) = &self.socket_path {
            return explicit.clone();
        }
        let uid = current_uid();
        std::env::temp_dir()
            .join(format!("{APP_DIR}-{uid}"))
            .join("default")
    }

    pub fn daemon_pid_file(&self) -> PathBuf {
        self.data_dir.join("daemon.pid")
    }

    // --- Data subdirectories ---

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.data_dir.join("templates")
    }

    // --- Data files ---

    pub fn ownership_file(&self) -> PathBuf {
        self.data_dir.join("daemon-state.json")
    }

    pub fn session_file(&self, name: &str) -> PathBuf {
        let safe = sanitize(name);
        self.sessions_dir().join(format!("{safe}.json"))
    }

    pub fn session_temp_file(&self, name: &str) -> PathBuf {
        let safe = sanitize(name);
        self.sessions_dir().join(format!("{safe}.json.tmp"))
    }

    pub fn template_file(&self, name: &str) -> PathBuf {
        let safe = sanitize(name);
        self.templates_dir().join(format!("{safe}.yaml"))
    }

    // --- Config ---

    pub fn daemon_config_file(&self) -> PathBuf {
        self.config_dir.join("daemon.toml")
    }
}

fn sanitize(name: &str) -> String {
    name.replace('/', "_")
}

#[cfg(unix)]
fn current_uid() -> u32 {
    nix::unistd::Uid::current().as_raw()
}

#[cfg(not(unix))]
fn current_uid() -> u32 {
    0
}
