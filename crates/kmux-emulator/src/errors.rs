use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("emulator command failed: {stderr}")]
    CommandFailed { stderr: String },

    #[error("failed to parse emulator output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to launch emulator command: {0}")]
    Io(#[from] std::io::Error),

    #[error("emulator output references unknown window-group id {0}")]
    UnknownGroupId(u64),

    #[error("emulator output references unknown window id {0}")]
    UnknownWindowId(u64),

    #[error("emulator returned malformed window id: {0}")]
    MalformedWindowId(String),
}

impl EmulatorError {
    pub fn error_code(&self) -> &'static str {
        match self {
            EmulatorError::CommandFailed { .. } => "command_failed",
            EmulatorError::Parse(_) => "parse_error",
            EmulatorError::Io(_) => "io_error",
            EmulatorError::UnknownGroupId(_) => "unknown_group_id",
            EmulatorError::UnknownWindowId(_) => "unknown_window_id",
            EmulatorError::MalformedWindowId(_) => "malformed_window_id",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_stable() {
        assert_eq!(
            EmulatorError::UnknownGroupId(7).error_code(),
            "unknown_group_id"
        );
        assert_eq!(
            EmulatorError::UnknownWindowId(7).error_code(),
            "unknown_window_id"
        );
    }
}
