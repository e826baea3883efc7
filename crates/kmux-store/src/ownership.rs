//! The ownership file: `<data_dir>/daemon-state.json`, a single object
//! mapping agent name -> session name plus a `last_saved` timestamp
//! (spec ยง4.2, ยง6). All reads and writes go through an flock so the
//! daemon never races a concurrent CLI invocation that peeks at the file.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;

use nix::fcntl::{Flock, FlockArg};
use serde::{Deserialize, Serialize};

use kmux_paths::KmuxPaths;

use crate::errors::StoreError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OwnershipFile {
    #[serde(default, rename = "zmx_ownership")]
    pub agent_to_session: BTreeMap<String, String>,
    #[serde(default)]
    pub last_saved: Option<chrono::DateTime<chrono::Utc>>,
}

fn lock_path(paths: &KmuxPaths) -> std::path::PathBuf {
    paths.ownership_file().with_extension("json.lock")
}

fn acquire_lock(paths: &KmuxPaths, arg: FlockArg) -> Result<Flock<fs::File>, StoreError> {
    let lock_file_path = lock_path(paths);
    if let Some(parent) = lock_file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let lock_file = fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(&lock_file_path)?;
    Flock::lock(lock_file, arg).map_err(|(_, e)| {
        StoreError::Io(std::io::Error::other(format!(
            "failed to lock {}: {e}",
            lock_file_path.display()
        )))
    })
}

/// Load the ownership file under a shared lock. Returns the default (empty)
/// file if it does not exist yet — the daemon's first run.
pub fn load(paths: &KmuxPaths) -> Result<OwnershipFile, StoreError> {
    let _lock = acquire_lock(paths, FlockArg::LockShared)?;
    let path = paths.ownership_file();
    match fs::read_to_string(&path) {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(OwnershipFile::default()),
        Err(e) => Err(e.into()),
    }
}

/// Save the ownership file under an exclusive lock, atomically (temp + rename).
pub fn save(paths: &KmuxPaths, file: &OwnershipFile) -> Result<(), StoreError> {
    let _lock = acquire_lock(paths, FlockArg::LockExclusive)?;

    let mut file = file.clone();
    file.last_saved = Some(chrono::Utc::now());

    let data_dir = paths.data_dir();
    fs::create_dir_all(data_dir)?;

    let path = paths.ownership_file();
    let temp_path = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(&file)?;

    let mut f = fs::File::create(&temp_path)?;
    if let Err(e) = f.write_all(json.as_bytes()).and_then(|_| f.flush()) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    drop(f);

    if let Err(e) = fs::rename(&temp_path, &path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    tracing::debug!(event = "store.ownership.save_completed", entries = file.agent_to_session.len());
    Ok(())
}
