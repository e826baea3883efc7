//! Atomic session save/load/list/delete/rename (spec ยง4.2).
//!
//! One JSON file per session at `<sessions_dir>/<name>.json`. Every write
//! goes to a sibling `.tmp` path first, then `fs::rename`s over the target;
//! the temp file is removed on any failure before the rename.

use std::fs;

use kmux_model::{validate_session_name, Session};
use kmux_paths::KmuxPaths;

use crate::errors::StoreError;

fn cleanup_temp_file(temp_file: &std::path::Path, original_error: &std::io::Error) {
    if let Err(cleanup_err) = fs::remove_file(temp_file) {
        if cleanup_err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(
                event = "store.session.temp_file_cleanup_failed",
                temp_file = %temp_file.display(),
                original_error = %original_error,
                cleanup_error = %cleanup_err,
            );
        }
    }
}

/// Save `session` atomically. Validates `session.name` first (spec ยง4.2).
pub fn save(paths: &KmuxPaths, session: &Session) -> Result<(), StoreError> {
    validate_session_name(&session.name).map_err(|e| StoreError::InvalidName(e.0))?;

    let sessions_dir = paths.sessions_dir();
    fs::create_dir_all(&sessions_dir)?;

    let file = paths.session_file(&session.name);
    let temp_file = paths.session_temp_file(&session.name);

    let json = serde_json::to_string_pretty(session)?;

    if let Err(e) = fs::write(&temp_file, &json) {
        cleanup_temp_file(&temp_file, &e);
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&temp_file, &file) {
        cleanup_temp_file(&temp_file, &e);
        return Err(e.into());
    }

    tracing::info!(event = "store.session.save_completed", session = %session.name);
    Ok(())
}

/// Load a session by name, or `StoreError::NotFound`.
pub fn load(paths: &KmuxPaths, name: &str) -> Result<Session, StoreError> {
    let file = paths.session_file(name);
    let content = match fs::read_to_string(&file) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    let session: Session = serde_json::from_str(&content)?;
    Ok(session)
}

/// Whether a save file exists for `name`, without fully parsing it.
pub fn exists(paths: &KmuxPaths, name: &str) -> bool {
    paths.session_file(name).is_file()
}

/// Every session name with a save file on disk.
pub fn list(paths: &KmuxPaths) -> Result<Vec<String>, StoreError> {
    let sessions_dir = paths.sessions_dir();
    if !sessions_dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(&sessions_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            names.push(stem.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Delete a session's save file. Not an error if it is already absent.
pub fn delete(paths: &KmuxPaths, name: &str) -> Result<(), StoreError> {
    let file = paths.session_file(name);
    match fs::remove_file(&file) {
        Ok(()) => {
            tracing::debug!(event = "store.session.delete_completed", session = %name);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Rename a session's save file. Fails if `old` has no save file or `new`
/// already has one.
pub fn rename(paths: &KmuxPaths, old: &str, new: &str) -> Result<(), StoreError> {
    validate_session_name(new).map_err(|e| StoreError::InvalidName(e.0))?;

    let old_file = paths.session_file(old);
    if !old_file.is_file() {
        return Err(StoreError::NotFound(old.to_string()));
    }
    let new_file = paths.session_file(new);
    if new_file.is_file() {
        return Err(StoreError::AlreadyExists(new.to_string()));
    }

    let mut session = load(paths, old)?;
    session.name = new.to_string();
    save(paths, &session)?;
    delete(paths, old)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kmux_model::{Tab, LOCAL_HOST};

    fn paths(dir: &tempfile::TempDir) -> KmuxPaths {
        KmuxPaths::from_dirs(dir.path().join("data"), dir.path().join("config"))
    }

    fn demo_session() -> Session {
        let mut session = Session::new("demo", LOCAL_HOST);
        session.tabs.push(Tab::single("main", "/tmp"));
        session
    }

    #[test]
    fn test_save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(&dir);
        let session = demo_session();

        save(&paths, &session).unwrap();
        let loaded = load(&paths, "demo").unwrap();
        assert_eq!(loaded.name, session.name);
        assert_eq!(loaded.tabs, session.tabs);
    }

    #[test]
    fn test_save_rejects_invalid_name() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(&dir);
        let mut session = demo_session();
        session.name = "bad/name".to_string();
        let err = save(&paths, &session).unwrap_err();
        assert_eq!(err.error_code(), "validation_error");
    }

    #[test]
    fn test_load_missing_returns_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(&dir);
        let err = load(&paths, "nope").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_save_no_tmp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(&dir);
        save(&paths, &demo_session()).unwrap();
        assert!(!paths.session_temp_file("demo").exists());
    }

    #[test]
    fn test_list_returns_sorted_names() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(&dir);
        save(&paths, &Session::new("zeta", LOCAL_HOST)).unwrap();
        save(&paths, &Session::new("alpha", LOCAL_HOST)).unwrap();
        assert_eq!(list(&paths).unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_list_empty_when_no_dir() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(&dir);
        assert!(list(&paths).unwrap().is_empty());
    }

    #[test]
    fn test_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(&dir);
        save(&paths, &demo_session()).unwrap();
        delete(&paths, "demo").unwrap();
        assert!(!exists(&paths, "demo"));
    }

    #[test]
    fn test_delete_nonexistent_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(&dir);
        assert!(delete(&paths, "nope").is_ok());
    }

    #[test]
    fn test_rename_moves_file_and_updates_name_field() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(&dir);
        save(&paths, &demo_session()).unwrap();

        rename(&paths, "demo", "prod").unwrap();

        assert!(!exists(&paths, "demo"));
        let renamed = load(&paths, "prod").unwrap();
        assert_eq!(renamed.name, "prod");
    }

    #[test]
    fn test_rename_fails_if_source_missing() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(&dir);
        let err = rename(&paths, "ghost", "new").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_rename_fails_if_dest_exists() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(&dir);
        save(&paths, &demo_session()).unwrap();
        save(&paths, &Session::new("prod", LOCAL_HOST)).unwrap();

        let err = rename(&paths, "demo", "prod").unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }
}
