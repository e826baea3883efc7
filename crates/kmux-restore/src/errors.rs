use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("tab {0} has no windows")]
    EmptyTab(usize),

    #[error("tab {0} has a splits layout and more than one window but no split_root")]
    MissingSplitRoot(usize),

    #[error(transparent)]
    Emulator(#[from] kmux_emulator::EmulatorError),
}

impl RestoreError {
    pub fn error_code(&self) -> &'static str {
        match self {
            RestoreError::EmptyTab(_) => "empty_tab",
            RestoreError::MissingSplitRoot(_) => "missing_split_root",
            RestoreError::Emulator(_) => "emulator_error",
        }
    }
}
