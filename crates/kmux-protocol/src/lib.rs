//! Wire types and JSONL codec shared between the reconciliation daemon and
//! its clients: a generic `{method, params, emulator_socket?}` request and a
//! `{result?, error?}` response, framed one-per-line (spec ยง6).

pub mod codec;
pub mod errors;
pub mod messages;

pub use codec::{read_message, write_message};
pub use errors::ProtocolError;
pub use messages::{
    AgentSet, AttachAction, AttachParams, AttachResult, CloseResult, DetachParams, KillParams,
    NotifyCloseParams, NotifyCloseResult, Request, ResolveParams, ResolveResult, Response,
    RenameParams, SessionInfo, SessionsParams, SimpleResult, SplitParams, SplitResult,
};
