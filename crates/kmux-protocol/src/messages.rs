//! The IPC wire schema (spec ยง6): one request, one response, per connection.
//!
//! Unlike a tagged-enum-per-message protocol, every request shares the same
//! envelope (`method` + opaque `params`); handlers parse their own params via
//! [`Request::parse_params`]. This mirrors the daemon's internal pane-backend
//! protocol convention but trades its JSON-RPC-style `id`/`code` envelope for
//! the flatter `{result?, error?}` shape the spec calls for.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Inbound IPC request. `params` is method-specific and parsed separately.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// The client's current emulator-socket path. The emulator may have
    /// restarted since the daemon's last successful probe; the daemon
    /// remembers the most recent working path and falls back to this hint.
    #[serde(default)]
    pub emulator_socket: Option<String>,
}

impl Request {
    pub fn new(method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            method: method.into(),
            params,
            emulator_socket: None,
        }
    }

    /// Parse `params` into a concrete type.
    pub fn parse_params<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.params.clone())
    }
}

/// Outbound IPC response. Exactly one of `result`/`error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(result: serde_json::Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn ok_value<T: Serialize>(value: &T) -> Self {
        Self::ok(serde_json::to_value(value).unwrap_or(serde_json::Value::Null))
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-session summary returned by `sessions` (spec ยง6 `session_info`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub name: String,
    pub host: String,
    pub status: kmux_model::SessionStatus,
    pub panes: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_restore_point: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionsParams {
    #[serde(default)]
    pub include_saved: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachParams {
    pub name: String,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub layout: Option<String>,
}

/// What `attach` actually did, per spec ยง4.6 and the ยง9 open-question
/// resolution: the daemon surfaces `focused` itself rather than requiring
/// the caller to synthesize it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachAction {
    Focused,
    Reattached,
    Created,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachResult {
    pub success: bool,
    pub message: String,
    pub action: AttachAction,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetachParams {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimpleResult {
    pub success: bool,
    pub message: String,
}

impl SimpleResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KillParams {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SplitParams {
    pub session: String,
    pub direction: String,
    #[serde(default)]
    pub cwd: Option<String>,
    /// Session-relative tab index the split belongs to. Defaults to the
    /// number of tabs the daemon already has on record for this session
    /// (see DESIGN.md's resolution of the tab_idx=0 open question).
    #[serde(default)]
    pub tab_idx: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_id: Option<u64>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveParams {
    pub window_id: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveResult {
    pub session: String,
    pub agent_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenameParams {
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyCloseParams {
    pub window_id: u64,
    #[serde(default)]
    pub agent_name: String,
    #[serde(default)]
    pub session: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotifyCloseResult {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CloseResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    pub message: String,
}

/// Agents to kill for a session, unioned from every source spec ยง4.6 `kill`
/// lists (used internally by the daemon; exposed here because both the
/// store and the daemon need the same shape when reasoning about save files).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentSet(pub BTreeSet<String>);

impl AgentSet {
    pub fn union_from(sets: impl IntoIterator<Item = BTreeSet<String>>) -> Self {
        let mut out = BTreeSet::new();
        for set in sets {
            out.extend(set);
        }
        Self(out)
    }
}
