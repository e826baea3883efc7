//! The `Daemon`: owns the authoritative state, the emulator/agent adapters,
//! and every IPC handler (spec §4.6). Handlers are synchronous — they shell
//! out to the emulator/agent CLIs directly — so the async connection layer
//! runs each one inside `tokio::task::spawn_blocking`, the same boundary
//! `kmux-state`'s fan-out uses for its per-host queries.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kmux_agent::{Agent, RemoteAgentClient, attach_command};
use kmux_emulator::{Emulator, LaunchOpts, LaunchType, SplitLocation};
use kmux_model::{
    LOCAL_HOST, Session, SessionStatus, Tab, agent_name_for, parse_agent_name,
    parse_session_prefix, validate_session_name,
};
use kmux_paths::KmuxPaths;
use kmux_protocol::messages::{
    AttachAction, AttachParams, AttachResult, CloseResult, DetachParams, KillParams,
    NotifyCloseParams, NotifyCloseResult, RenameParams, ResolveParams, ResolveResult,
    SessionInfo, SessionsParams, SimpleResult, SplitParams, SplitResult,
};
use kmux_restore::RestoreContext;
use kmux_state::HostQuery;

use crate::errors::DaemonError;
use crate::state::DaemonState;

pub struct Daemon {
    pub(crate) state: Mutex<DaemonState>,
    pub(crate) emulator: Arc<dyn Emulator>,
    pub(crate) agent: Arc<dyn Agent>,
    pub(crate) paths: KmuxPaths,
    pub(crate) daemon_socket: PathBuf,
    pub(crate) remote_hosts: Vec<String>,
    pub(crate) fanout_deadline: Duration,
}

impl Daemon {
    pub fn new(
        emulator: Arc<dyn Emulator>,
        agent: Arc<dyn Agent>,
        paths: KmuxPaths,
        daemon_socket: PathBuf,
        remote_hosts: Vec<String>,
        fanout_deadline: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(DaemonState::new()),
            emulator,
            agent,
            paths,
            daemon_socket,
            remote_hosts,
            fanout_deadline,
        }
    }

    /// Startup steps 2-4 (spec §4.6): load the ownership file, adopt orphan
    /// agents, and seed a `detached` session-state entry for each session
    /// the ownership file implies.
    pub fn bootstrap(&self) -> Result<(), DaemonError> {
        let ownership_file = kmux_store::ownership::load(&self.paths)?;
        {
            let mut state = self.state.lock().unwrap();
            for (agent_name, session) in &ownership_file.agent_to_session {
                state
                    .agent_to_session
                    .insert(agent_name.clone(), session.clone());
                tracing::info!(
                    event = "daemon.bootstrap.ownership_loaded",
                    agent = %agent_name,
                    session = %session,
                );
            }
        }

        let live_agents = self.agent.list().unwrap_or_default();
        {
            let mut state = self.state.lock().unwrap();
            for agent_name in &live_agents {
                if state.agent_to_session.contains_key(agent_name) {
                    continue;
                }
                let prefix = parse_session_prefix(agent_name);
                if prefix.is_empty() {
                    continue;
                }
                state
                    .agent_to_session
                    .insert(agent_name.clone(), prefix.to_string());
                tracing::info!(
                    event = "daemon.bootstrap.agent_adopted",
                    agent = %agent_name,
                    session = %prefix,
                );
            }

            let session_names: BTreeSet<String> =
                state.agent_to_session.values().cloned().collect();
            for name in session_names {
                state.sessions.entry(name).or_insert(SessionStatus::Detached);
            }
        }
        Ok(())
    }

    pub(crate) fn persist_ownership(&self) -> Result<(), DaemonError> {
        let agent_to_session = {
            let state = self.state.lock().unwrap();
            state
                .agent_to_session
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };
        let file = kmux_store::OwnershipFile {
            agent_to_session,
            last_saved: None,
        };
        kmux_store::ownership::save(&self.paths, &file)?;
        Ok(())
    }

    fn default_cwd() -> String {
        std::env::var("HOME").unwrap_or_else(|_| "/".to_string())
    }

    /// Spec §4.6 "reattach": one window per surviving agent, in the order
    /// implied by the naming convention's `(tab_idx, window_idx)` when the
    /// name parses, otherwise all on a single tab.
    fn synthesize_from_agents(name: &str, agents: &[String], cwd: &str) -> Session {
        let mut by_tab: BTreeMap<usize, Vec<(usize, String)>> = BTreeMap::new();
        for agent_name in agents {
            let (tab_idx, window_idx) = match parse_agent_name(agent_name) {
                Some((_, t, w)) => (t, w),
                None => (0, by_tab.get(&0).map(|v| v.len()).unwrap_or(0)),
            };
            by_tab.entry(tab_idx).or_default().push((window_idx, agent_name.clone()));
        }

        let mut session = Session::new(name, LOCAL_HOST);
        for (tab_idx, mut windows) in by_tab {
            windows.sort_by_key(|(idx, _)| *idx);
            let mut tab = Tab::single(format!("{name}-{tab_idx}"), cwd);
            tab.windows = windows
                .into_iter()
                .map(|(_, agent_name)| kmux_model::Window {
                    cwd: cwd.to_string(),
                    command: String::new(),
                    agent_name,
                    ephemeral: false,
                })
                .collect();
            session.tabs.push(tab);
        }
        session
    }

    pub fn attach(&self, params: AttachParams) -> Result<AttachResult, DaemonError> {
        let name = validate_session_name(&params.name)?;

        let (existing_windows, existing_agents) = {
            let state = self.state.lock().unwrap();
            (
                state.windows_for_session(&name),
                state.agents_for_session(&name),
            )
        };

        if let Some(&first) = existing_windows.first() {
            self.emulator.focus_window(first)?;
            return Ok(AttachResult {
                success: true,
                message: format!("focused session '{name}'"),
                action: AttachAction::Focused,
            });
        }

        let cwd = params.cwd.clone().unwrap_or_else(Self::default_cwd);

        let (session_to_restore, action) = if !existing_agents.is_empty() {
            let session = match kmux_store::sessions::load(&self.paths, &name) {
                Ok(session) => session,
                Err(e) if e.is_not_found() => {
                    Self::synthesize_from_agents(&name, &existing_agents, &cwd)
                }
                Err(e) => return Err(e.into()),
            };
            (session, AttachAction::Reattached)
        } else if let Some(layout) = &params.layout {
            let session =
                kmux_store::templates::instantiate(&self.paths, layout, &name, LOCAL_HOST, &cwd)?;
            (session, AttachAction::Created)
        } else if kmux_store::sessions::exists(&self.paths, &name) {
            (kmux_store::sessions::load(&self.paths, &name)?, AttachAction::Created)
        } else {
            let mut session = Session::new(&name, LOCAL_HOST);
            session.tabs.push(Tab::single(&name, &cwd));
            (session, AttachAction::Created)
        };

        let ctx = RestoreContext {
            emulator: self.emulator.as_ref(),
            daemon_socket: &self.daemon_socket,
            pinned_tab_id: None,
        };
        let result = kmux_restore::restore_session(&ctx, &session_to_restore)?;

        {
            let mut state = self.state.lock().unwrap();
            for created in &result.windows {
                state.track_window(created.window_id, &created.agent_name, &name);
            }
            state.sessions.insert(name.clone(), SessionStatus::Attached);
        }
        self.persist_ownership()?;

        if let Some(first) = result.first_window_id {
            self.emulator.focus_window(first)?;
        }

        Ok(AttachResult {
            success: true,
            message: format!("attached session '{name}'"),
            action,
        })
    }

    pub fn detach(&self, params: DetachParams) -> Result<SimpleResult, DaemonError> {
        let name = validate_session_name(&params.name)?;

        let tree = self.emulator.get_state()?;
        if let Some(session) = crate::reconcile::derive_session(&name, LOCAL_HOST, &tree) {
            kmux_store::sessions::save(&self.paths, &session)?;
        }

        let window_ids = {
            let state = self.state.lock().unwrap();
            state.windows_for_session(&name)
        };
        for window_id in &window_ids {
            if let Err(e) = self.emulator.close_window(*window_id) {
                tracing::warn!(event = "daemon.detach.close_failed", window_id = window_id, error = %e);
            }
        }

        {
            let mut state = self.state.lock().unwrap();
            for window_id in &window_ids {
                state.untrack_window(*window_id);
            }
            state.sessions.insert(name.clone(), SessionStatus::Detached);
        }
        self.persist_ownership()?;

        Ok(SimpleResult::ok(format!("detached session '{name}'")))
    }

    pub fn kill(&self, params: KillParams) -> Result<SimpleResult, DaemonError> {
        let name = validate_session_name(&params.name)?;

        let mut to_kill: BTreeSet<String> = BTreeSet::new();
        {
            let state = self.state.lock().unwrap();
            to_kill.extend(state.agents_for_session(&name));
        }
        if let Ok(session) = kmux_store::sessions::load(&self.paths, &name) {
            to_kill.extend(session.agent_names.iter().cloned());
            for tab in &session.tabs {
                for window in &tab.windows {
                    if !window.agent_name.is_empty() {
                        to_kill.insert(window.agent_name.clone());
                    }
                }
            }
        }
        if let Ok(live_agents) = self.agent.list() {
            for agent_name in live_agents {
                if parse_session_prefix(&agent_name) == name {
                    to_kill.insert(agent_name);
                }
            }
        }

        for agent_name in &to_kill {
            if let Err(e) = self.agent.kill(agent_name) {
                tracing::warn!(event = "daemon.kill.agent_failed", agent = %agent_name, error = %e);
            }
        }

        let window_ids = {
            let state = self.state.lock().unwrap();
            state.windows_for_session(&name)
        };
        for window_id in &window_ids {
            if let Err(e) = self.emulator.close_window(*window_id) {
                tracing::warn!(event = "daemon.kill.close_failed", window_id = window_id, error = %e);
            }
        }

        kmux_store::sessions::delete(&self.paths, &name)?;

        {
            let mut state = self.state.lock().unwrap();
            state.forget_session(&name);
        }
        self.persist_ownership()?;

        Ok(SimpleResult::ok(format!("killed session '{name}'")))
    }

    fn split_location(direction: &str) -> Result<SplitLocation, DaemonError> {
        match direction.to_lowercase().as_str() {
            "vertical" | "v" => Ok(SplitLocation::Vsplit),
            "horizontal" | "h" => Ok(SplitLocation::Hsplit),
            other => Err(DaemonError::InvalidDirection(other.to_string())),
        }
    }

    pub fn split(&self, params: SplitParams) -> Result<SplitResult, DaemonError> {
        let location = Self::split_location(&params.direction)?;

        if params.session.is_empty() {
            let mut opts = LaunchOpts::new(LaunchType::Window).with_location(location);
            if let Some(cwd) = &params.cwd {
                opts = opts.with_cwd(cwd.clone());
            }
            let window_id = self.emulator.launch(&opts)?;
            return Ok(SplitResult {
                success: true,
                window_id: Some(window_id),
                message: "split created".to_string(),
            });
        }

        let name = validate_session_name(&params.session)?;
        let existing_agents = {
            let state = self.state.lock().unwrap();
            state.agents_for_session(&name)
        };
        let parsed: Vec<(usize, usize)> = existing_agents
            .iter()
            .filter_map(|a| parse_agent_name(a))
            .map(|(_, t, w)| (t, w))
            .collect();

        let tab_idx = params.tab_idx.unwrap_or_else(|| {
            parsed.iter().map(|(t, _)| *t).max().map(|m| m + 1).unwrap_or(0)
        });
        let window_idx = parsed.iter().filter(|(t, _)| *t == tab_idx).count();

        let agent_name = agent_name_for(&name, tab_idx, window_idx);
        let argv = attach_command(&agent_name, &name, None, &self.daemon_socket);

        let mut opts = LaunchOpts::new(LaunchType::Window)
            .with_location(location)
            .with_argv(argv)
            .with_tag("kmux_session", name.clone())
            .with_tag("kmux_agent", agent_name.clone());
        if let Some(cwd) = &params.cwd {
            opts = opts.with_cwd(cwd.clone());
        }
        let window_id = self.emulator.launch(&opts)?;

        {
            let mut state = self.state.lock().unwrap();
            state.track_window(window_id, &agent_name, &name);
            state.sessions.insert(name.clone(), SessionStatus::Attached);
        }
        self.persist_ownership()?;

        Ok(SplitResult {
            success: true,
            window_id: Some(window_id),
            message: format!("split window created in '{name}'"),
        })
    }

    pub fn rename(&self, params: RenameParams) -> Result<SimpleResult, DaemonError> {
        let old = validate_session_name(&params.old_name)?;
        let new = validate_session_name(&params.new_name)?;

        let new_tracked = {
            let state = self.state.lock().unwrap();
            state.sessions.contains_key(&new)
        };
        if new_tracked || kmux_store::sessions::exists(&self.paths, &new) {
            return Err(DaemonError::SessionAlreadyExists(new));
        }

        let old_tracked = {
            let state = self.state.lock().unwrap();
            state.sessions.contains_key(&old)
        };
        let has_save = kmux_store::sessions::exists(&self.paths, &old);
        if !old_tracked && !has_save {
            return Err(DaemonError::SessionNotFound(old));
        }

        {
            let mut state = self.state.lock().unwrap();
            if let Some(status) = state.sessions.remove(&old) {
                state.sessions.insert(new.clone(), status);
            }
            for value in state.win_to_session.values_mut() {
                if *value == old {
                    *value = new.clone();
                }
            }
            for value in state.agent_to_session.values_mut() {
                if *value == old {
                    *value = new.clone();
                }
            }
        }

        if has_save {
            kmux_store::sessions::rename(&self.paths, &old, &new)?;
        }
        self.persist_ownership()?;

        Ok(SimpleResult::ok(format!("renamed '{old}' to '{new}'")))
    }

    /// Never errors (spec §7): absence just means both fields come back empty.
    pub fn resolve(&self, params: ResolveParams) -> ResolveResult {
        let state = self.state.lock().unwrap();
        ResolveResult {
            session: state
                .win_to_session
                .get(&params.window_id)
                .cloned()
                .unwrap_or_default(),
            agent_name: state
                .win_to_agent
                .get(&params.window_id)
                .cloned()
                .unwrap_or_default(),
        }
    }

    pub fn notify_close(&self, params: NotifyCloseParams) -> Result<NotifyCloseResult, DaemonError> {
        let mut state = self.state.lock().unwrap();
        let session = if !params.session.is_empty() {
            params.session.clone()
        } else {
            state
                .win_to_session
                .get(&params.window_id)
                .cloned()
                .unwrap_or_default()
        };
        state.untrack_window(params.window_id);

        if !session.is_empty() {
            let has_windows = !state.windows_for_session(&session).is_empty();
            let has_agents = !state.agents_for_session(&session).is_empty();
            if !has_windows && has_agents {
                state.sessions.insert(session.clone(), SessionStatus::Detached);
            } else if !has_windows && !has_agents {
                state.sessions.remove(&session);
            }
        }
        drop(state);
        self.persist_ownership()?;

        Ok(NotifyCloseResult { ok: true })
    }

    /// Remove the tracking for one window, best-effort kill its agent, and
    /// transition the owning session — the shared core of close-focused and
    /// close-tab (spec §4.6: "notify-close + kill-agent for each affected window").
    fn close_window_internal(&self, window_id: u64) -> Result<Option<String>, DaemonError> {
        let (agent_name, session) = {
            let state = self.state.lock().unwrap();
            (
                state.win_to_agent.get(&window_id).cloned(),
                state.win_to_session.get(&window_id).cloned(),
            )
        };
        if let Some(agent_name) = &agent_name {
            if let Err(e) = self.agent.kill(agent_name) {
                tracing::warn!(event = "daemon.close.kill_failed", agent = %agent_name, error = %e);
            }
        }

        {
            let mut state = self.state.lock().unwrap();
            state.untrack_window(window_id);
            if let Some(agent_name) = &agent_name {
                state.agent_to_session.remove(agent_name);
            }
            if let Some(session) = &session {
                let has_windows = !state.windows_for_session(session).is_empty();
                let has_agents = !state.agents_for_session(session).is_empty();
                if !has_windows && has_agents {
                    state.sessions.insert(session.clone(), SessionStatus::Detached);
                } else if !has_windows && !has_agents {
                    state.sessions.remove(session);
                }
            }
        }
        self.persist_ownership()?;
        Ok(session)
    }

    fn focused_window(&self) -> Result<Option<u64>, DaemonError> {
        let tree = self.emulator.get_state()?;
        for os_win in &tree {
            for tab in &os_win.tabs {
                for window in &tab.windows {
                    if window.is_focused {
                        return Ok(Some(window.id));
                    }
                }
            }
        }
        Ok(None)
    }

    pub fn close_focused(&self) -> Result<CloseResult, DaemonError> {
        let Some(window_id) = self.focused_window()? else {
            return Ok(CloseResult {
                success: false,
                window_id: None,
                session: None,
                message: "no focused window".to_string(),
            });
        };
        let session = self.close_window_internal(window_id)?;
        self.emulator.close_window(window_id)?;
        Ok(CloseResult {
            success: true,
            window_id: Some(window_id),
            session,
            message: "closed focused window".to_string(),
        })
    }

    pub fn close_tab(&self) -> Result<CloseResult, DaemonError> {
        let tree = self.emulator.get_state()?;
        let mut target: Option<(u64, Vec<u64>)> = None;
        'outer: for os_win in &tree {
            for tab in &os_win.tabs {
                if tab.is_focused {
                    target = Some((tab.id, tab.windows.iter().map(|w| w.id).collect()));
                    break 'outer;
                }
            }
        }
        let Some((tab_id, window_ids)) = target else {
            return Ok(CloseResult {
                success: false,
                window_id: None,
                session: None,
                message: "no focused tab".to_string(),
            });
        };

        let mut last_session = None;
        for window_id in &window_ids {
            if let Ok(Some(session)) = self.close_window_internal(*window_id) {
                last_session = Some(session);
            }
        }
        self.emulator.close_tab(tab_id)?;

        Ok(CloseResult {
            success: true,
            window_id: window_ids.first().copied(),
            session: last_session,
            message: "closed focused tab".to_string(),
        })
    }

    pub fn sessions(&self, params: SessionsParams) -> Result<Vec<SessionInfo>, DaemonError> {
        let ownership: BTreeMap<String, String> = {
            let state = self.state.lock().unwrap();
            state
                .agent_to_session
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };

        if self.remote_hosts.is_empty() {
            let query = HostQuery {
                host: LOCAL_HOST,
                emulator: self.emulator.as_ref(),
                agent: self.agent.as_ref(),
                ownership: &ownership,
            };
            return Ok(kmux_state::sessions_for_host(
                &query,
                params.include_saved,
                Some(&self.paths),
            )?);
        }

        let mut targets = vec![kmux_state::HostTarget {
            host: LOCAL_HOST.to_string(),
            emulator: Arc::clone(&self.emulator),
            agent: Arc::clone(&self.agent),
            ownership: ownership.clone(),
        }];
        for host in &self.remote_hosts {
            targets.push(kmux_state::HostTarget {
                host: host.clone(),
                emulator: Arc::clone(&self.emulator),
                agent: Arc::new(RemoteAgentClient::new(host.clone())),
                ownership: ownership.clone(),
            });
        }

        let results = tokio::runtime::Handle::current().block_on(kmux_state::sessions(
            targets,
            params.include_saved,
            Some(self.paths.clone()),
            self.fanout_deadline,
        ));

        let any_succeeded = results.iter().any(|r| r.error.is_none());
        if !any_succeeded && !results.is_empty() {
            let errors: Vec<String> = results
                .iter()
                .filter_map(|r| r.error.clone().map(|e| format!("{}: {e}", r.host)))
                .collect();
            return Err(DaemonError::AllHostsFailed(errors.join("; ")));
        }

        Ok(results.into_iter().flat_map(|r| r.sessions).collect())
    }

    /// Current tracked status of a session, if any (test/inspection helper).
    pub fn session_status(&self, name: &str) -> Option<SessionStatus> {
        self.state.lock().unwrap().sessions.get(name).copied()
    }

    /// Session an agent is currently attributed to, if any (test/inspection helper).
    pub fn agent_session(&self, agent_name: &str) -> Option<String> {
        self.state.lock().unwrap().agent_to_session.get(agent_name).cloned()
    }

    /// Window ids tracked for a session (test/inspection helper).
    pub fn tracked_windows(&self, name: &str) -> Vec<u64> {
        self.state.lock().unwrap().windows_for_session(name)
    }
}
