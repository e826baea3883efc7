use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent command failed: {stderr}")]
    CommandFailed { stderr: String },

    #[error("failed to launch agent command: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AgentError::CommandFailed { .. } => "command_failed",
            AgentError::Io(_) => "io_error",
        }
    }
}
