//! The daemon's authoritative in-memory state (spec §5, §9): the three maps
//! that track which window belongs to which agent and session, plus the
//! cached emulator tree and tick timestamps.
//!
//! Reconciliation tick and every IPC handler mutate this together — the
//! three maps are a single "triangle" of denormalized state that must never
//! be updated in just one place. A `std::sync::Mutex` guards it: critical
//! sections here never invoke external commands or I/O (spec §5), so there
//! is never a reason to hold it across an `.await`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use kmux_emulator::OsWindowState;
use kmux_model::SessionStatus;

#[derive(Debug, Default)]
pub struct DaemonState {
    /// Window id -> owning agent name (e.g. `"work.0.1"`).
    pub win_to_agent: HashMap<u64, String>,
    /// Window id -> owning session name.
    pub win_to_session: HashMap<u64, String>,
    /// Agent name -> owning session name. Redundant with the two maps above
    /// but kept directly so agents whose window has closed are still
    /// traceable to a session (spec §9's back-pointer shape).
    pub agent_to_session: HashMap<String, String>,

    /// Sessions currently known to the daemon that are not purely on-disk
    /// saves. Only ever `Attached` or `Detached` — a session with no entry
    /// here is either untracked or exists only as a save file.
    pub sessions: HashMap<String, SessionStatus>,

    /// The emulator's tree as of the last successful poll, used by the
    /// auto-save tick and by handlers that need an up-to-date split layout
    /// without re-invoking the emulator synchronously inside a lock.
    pub last_emulator_tree: Option<Vec<OsWindowState>>,

    pub last_poll: Option<DateTime<Utc>>,
    pub last_auto_save: Option<DateTime<Utc>>,
}

impl DaemonState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a window as belonging to `agent_name` within `session`,
    /// keeping all three maps in lockstep.
    pub fn track_window(&mut self, window_id: u64, agent_name: &str, session: &str) {
        self.win_to_agent.insert(window_id, agent_name.to_string());
        self.win_to_session.insert(window_id, session.to_string());
        self.agent_to_session
            .insert(agent_name.to_string(), session.to_string());
    }

    /// Drop a window's tracking. The agent->session back-pointer is left in
    /// place — detach (spec §4.6) removes only window entries, not agent
    /// ones, so a detached agent can still be traced back to its session.
    pub fn untrack_window(&mut self, window_id: u64) {
        self.win_to_agent.remove(&window_id);
        self.win_to_session.remove(&window_id);
    }

    /// Fully forget a session: every window and agent entry that points at
    /// it, plus the session entry itself.
    pub fn forget_session(&mut self, session: &str) {
        self.win_to_session.retain(|_, s| s != session);
        self.win_to_agent
            .retain(|win, _| self.win_to_session.contains_key(win));
        self.agent_to_session.retain(|_, s| s != session);
        self.sessions.remove(session);
    }

    /// Window ids currently known to belong to `session`.
    pub fn windows_for_session(&self, session: &str) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .win_to_session
            .iter()
            .filter(|(_, s)| s.as_str() == session)
            .map(|(win, _)| *win)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Agent names known to belong to `session`, whether or not they still
    /// have a live window.
    pub fn agents_for_session(&self, session: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .agent_to_session
            .iter()
            .filter(|(_, s)| s.as_str() == session)
            .map(|(agent, _)| agent.clone())
            .collect();
        names.sort();
        names
    }
}
