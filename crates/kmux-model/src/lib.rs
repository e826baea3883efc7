//! Pure data types for the session-reconciliation engine: `Session`, `Tab`,
//! `Window`, `SplitNode`, plus the persistence-agent naming convention and
//! session-name validation. No I/O, no external processes.

pub mod naming;
pub mod types;
pub mod validation;

pub use naming::{agent_name_for, parse_agent_name, parse_session_prefix};
pub use types::{
    AgentName, LayoutKind, Session, SessionName, SessionStatus, SplitNode, Tab, Window, WindowId,
    LOCAL_HOST,
};
pub use validation::{is_valid_session_name, validate_session_name, InvalidSessionName};
