use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    InvalidName(#[from] kmux_model::InvalidSessionName),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session already exists: {0}")]
    SessionAlreadyExists(String),

    #[error("daemon already running (pid {0})")]
    AlreadyRunning(u32),

    #[error("invalid split direction: {0}")]
    InvalidDirection(String),

    #[error("all hosts failed: {0}")]
    AllHostsFailed(String),

    #[error(transparent)]
    Store(#[from] kmux_store::StoreError),

    #[error(transparent)]
    Emulator(#[from] kmux_emulator::EmulatorError),

    #[error(transparent)]
    Agent(#[from] kmux_agent::AgentError),

    #[error(transparent)]
    Restore(#[from] kmux_restore::RestoreError),

    #[error(transparent)]
    State(#[from] kmux_state::StateError),

    #[error(transparent)]
    Path(#[from] kmux_paths::PathError),

    #[error("config error: {0}")]
    ConfigInvalid(String),

    #[error("invalid request params: {0}")]
    InvalidParams(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DaemonError {
    /// Stable string for the IPC error payload and for log fields.
    pub fn error_code(&self) -> &'static str {
        match self {
            DaemonError::InvalidName(_) => "validation_error",
            DaemonError::SessionNotFound(_) => "session_not_found",
            DaemonError::SessionAlreadyExists(_) => "session_already_exists",
            DaemonError::AlreadyRunning(_) => "daemon_already_running",
            DaemonError::InvalidDirection(_) => "validation_error",
            DaemonError::AllHostsFailed(_) => "host_error",
            DaemonError::Store(e) => e.error_code(),
            DaemonError::Emulator(e) => e.error_code(),
            DaemonError::Agent(e) => e.error_code(),
            DaemonError::Restore(e) => e.error_code(),
            DaemonError::State(e) => e.error_code(),
            DaemonError::Path(_) => "path_error",
            DaemonError::ConfigInvalid(_) => "config_invalid",
            DaemonError::InvalidParams(_) => "validation_error",
            DaemonError::UnknownMethod(_) => "unknown_method",
            DaemonError::Io(_) => "io_error",
            DaemonError::Json(_) => "io_error",
        }
    }

    /// Spec §7's "validation error" kind: reported to the caller verbatim,
    /// never logged as a failure.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            DaemonError::InvalidName(_)
                | DaemonError::InvalidDirection(_)
                | DaemonError::InvalidParams(_)
                | DaemonError::UnknownMethod(_)
        )
    }

    /// Convert a params-parsing failure (`Request::parse_params`) into the
    /// request-level variant of this error.
    pub fn invalid_params(e: serde_json::Error) -> Self {
        DaemonError::InvalidParams(e.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DaemonError::SessionNotFound(_))
            || matches!(self, DaemonError::Store(e) if e.is_not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            DaemonError::SessionNotFound("x".into()).error_code(),
            "session_not_found"
        );
        assert_eq!(DaemonError::AlreadyRunning(1).error_code(), "daemon_already_running");
    }

    #[test]
    fn test_validation_error_classification() {
        let err: DaemonError = kmux_model::InvalidSessionName("bad/name".into()).into();
        assert!(err.is_validation_error());
        assert!(!DaemonError::SessionNotFound("x".into()).is_validation_error());
    }

    #[test]
    fn test_is_not_found_covers_store_errors() {
        let err: DaemonError = kmux_store::StoreError::NotFound("x".into()).into();
        assert!(err.is_not_found());
    }
}
