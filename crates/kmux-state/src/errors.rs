use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("emulator query failed: {emulator}; agent query failed: {agent}")]
    BothFailed { emulator: String, agent: String },

    #[error("store error: {0}")]
    Store(#[from] kmux_store::StoreError),
}

impl StateError {
    pub fn error_code(&self) -> &'static str {
        match self {
            StateError::BothFailed { .. } => "both_sources_failed",
            StateError::Store(_) => "store_error",
        }
    }
}
