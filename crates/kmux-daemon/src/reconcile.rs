//! Reconciliation tick (spec §4.6): heals drift between the three maps, the
//! live agent list, and the live window set. Session-derivation — turning a
//! live emulator tree back into the `Session` shape a save-file holds — also
//! lives here, since both `detach` and the auto-save tick need it.

use std::collections::BTreeSet;

use kmux_emulator::OsWindowState;
use kmux_model::{LOCAL_HOST, LayoutKind, Session, SessionStatus, Tab, Window, parse_session_prefix};

use crate::daemon::Daemon;

/// Reconstruct the `Session` a save-file would hold from the live emulator
/// tree, for every tab whose windows are tagged `kmux_session=name`. A tab is
/// owned entirely by one session (the restore engine never mixes sessions
/// within a tab), so membership is decided by the tab's first window.
/// Returns `None` if no tab anywhere in the tree belongs to `name`.
pub fn derive_session(name: &str, host: &str, tree: &[OsWindowState]) -> Option<Session> {
    let mut tabs = Vec::new();
    let mut agent_names = BTreeSet::new();

    for os_window in tree {
        for tab_state in &os_window.tabs {
            let owns_tab = tab_state
                .windows
                .first()
                .and_then(|w| w.session.as_deref())
                == Some(name);
            if !owns_tab {
                continue;
            }

            let windows: Vec<Window> = tab_state
                .windows
                .iter()
                .map(|w| {
                    if let Some(agent) = &w.agent {
                        agent_names.insert(agent.clone());
                    }
                    Window {
                        cwd: w.cwd.clone(),
                        command: String::new(),
                        agent_name: w.agent.clone().unwrap_or_default(),
                        ephemeral: false,
                    }
                })
                .collect();

            let layout_kind = if tab_state.split_root.is_some() {
                LayoutKind::Splits
            } else {
                LayoutKind::Tall
            };

            tabs.push(Tab {
                title: tab_state.title.clone(),
                layout_kind,
                windows,
                split_root: tab_state.split_root.clone(),
            });
        }
    }

    if tabs.is_empty() {
        return None;
    }

    let mut session = Session::new(name, host);
    session.tabs = tabs;
    session.agent_names = agent_names;
    Some(session)
}

impl Daemon {
    /// Spec §4.6 reconciliation tick. Calls out to the agent list and the
    /// emulator tree once each, then heals the three in-memory maps against
    /// both: drop entries no longer backed by a live agent or window, adopt
    /// orphan agents matching the naming convention, and transition every
    /// touched session's status.
    pub fn reconcile_tick(&self) {
        let agents: BTreeSet<String> = match self.agent.list() {
            Ok(list) => list.into_iter().collect(),
            Err(e) => {
                tracing::warn!(event = "daemon.reconcile.agent_list_failed", error = %e);
                BTreeSet::new()
            }
        };

        let tree = match self.emulator.get_state() {
            Ok(tree) => tree,
            Err(e) => {
                tracing::warn!(event = "daemon.reconcile.emulator_state_failed", error = %e);
                return;
            }
        };
        let live_windows: BTreeSet<u64> = tree
            .iter()
            .flat_map(|w| &w.tabs)
            .flat_map(|t| &t.windows)
            .map(|w| w.id)
            .collect();

        let mut mutated = false;
        {
            let mut state = self.state.lock().unwrap();

            let stale_agents: Vec<String> = state
                .agent_to_session
                .keys()
                .filter(|a| !agents.contains(*a))
                .cloned()
                .collect();
            for agent in stale_agents {
                tracing::info!(event = "daemon.reconcile.discrepancy_removed", agent = %agent);
                state.agent_to_session.remove(&agent);
                mutated = true;
            }

            for agent in &agents {
                if state.agent_to_session.contains_key(agent) {
                    continue;
                }
                let prefix = parse_session_prefix(agent);
                if prefix.is_empty() {
                    continue;
                }
                state
                    .agent_to_session
                    .insert(agent.clone(), prefix.to_string());
                tracing::info!(
                    event = "daemon.reconcile.agent_adopted",
                    agent = %agent,
                    session = %prefix,
                );
                mutated = true;
            }

            let stale_windows: BTreeSet<u64> = state
                .win_to_session
                .keys()
                .chain(state.win_to_agent.keys())
                .filter(|w| !live_windows.contains(*w))
                .copied()
                .collect();
            for window_id in stale_windows {
                let removed_session = state.win_to_session.remove(&window_id).is_some();
                let removed_agent = state.win_to_agent.remove(&window_id).is_some();
                if removed_session || removed_agent {
                    tracing::info!(event = "daemon.reconcile.window_removed", window_id = window_id);
                    mutated = true;
                }
            }

            let mut session_names: BTreeSet<String> = state.sessions.keys().cloned().collect();
            session_names.extend(state.win_to_session.values().cloned());
            session_names.extend(state.agent_to_session.values().cloned());

            for name in session_names {
                let has_windows = !state.windows_for_session(&name).is_empty();
                let has_agents = !state.agents_for_session(&name).is_empty();
                let new_status = if has_windows {
                    Some(SessionStatus::Attached)
                } else if has_agents {
                    Some(SessionStatus::Detached)
                } else {
                    None
                };
                match new_status {
                    Some(status) => {
                        if state.sessions.get(&name) != Some(&status) {
                            mutated = true;
                        }
                        state.sessions.insert(name, status);
                    }
                    None if state.sessions.remove(&name).is_some() => {
                        mutated = true;
                    }
                    None => {}
                }
            }

            state.last_emulator_tree = Some(tree);
            state.last_poll = Some(chrono::Utc::now());
        }

        if mutated {
            if let Err(e) = self.persist_ownership() {
                tracing::warn!(event = "daemon.reconcile.persist_failed", error = %e);
            }
        }
    }

    /// Auto-save tick (spec §4.6): derive and write a save file for every
    /// `attached` session, from the tree cached by the last reconciliation
    /// tick. Never invokes the emulator itself — a tick with no cached tree
    /// yet is a no-op, not an error.
    pub fn auto_save_tick(&self) {
        let (attached, tree) = {
            let state = self.state.lock().unwrap();
            let attached: Vec<String> = state
                .sessions
                .iter()
                .filter(|(_, status)| matches!(status, SessionStatus::Attached))
                .map(|(name, _)| name.clone())
                .collect();
            (attached, state.last_emulator_tree.clone())
        };

        let Some(tree) = tree else {
            tracing::debug!(event = "daemon.autosave.skipped_no_tree");
            return;
        };

        for name in attached {
            if let Some(session) = derive_session(&name, LOCAL_HOST, &tree) {
                if let Err(e) = kmux_store::sessions::save(&self.paths, &session) {
                    tracing::warn!(event = "daemon.autosave.save_failed", session = %name, error = %e);
                }
            }
        }

        let mut state = self.state.lock().unwrap();
        state.last_auto_save = Some(chrono::Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kmux_emulator::{TabState, WindowState};
    use kmux_model::SplitNode;

    fn window(id: u64, session: &str, agent: &str) -> WindowState {
        WindowState {
            id,
            cwd: "/tmp".to_string(),
            is_focused: false,
            session: Some(session.to_string()),
            agent: Some(agent.to_string()),
            host: None,
        }
    }

    #[test]
    fn test_derive_session_builds_tabs_from_matching_windows() {
        let tree = vec![OsWindowState {
            id: 1,
            is_focused: true,
            tabs: vec![TabState {
                id: 1,
                title: "main".to_string(),
                is_active: true,
                is_focused: true,
                windows: vec![window(10, "demo", "demo.0.0")],
                split_root: None,
            }],
        }];

        let session = derive_session("demo", LOCAL_HOST, &tree).unwrap();
        assert_eq!(session.tabs.len(), 1);
        assert_eq!(session.tabs[0].windows.len(), 1);
        assert_eq!(session.tabs[0].windows[0].agent_name, "demo.0.0");
        assert!(session.agent_names.contains("demo.0.0"));
    }

    #[test]
    fn test_derive_session_skips_other_sessions_tabs() {
        let tree = vec![OsWindowState {
            id: 1,
            is_focused: true,
            tabs: vec![TabState {
                id: 1,
                title: "other".to_string(),
                is_active: true,
                is_focused: true,
                windows: vec![window(10, "prod", "prod.0.0")],
                split_root: None,
            }],
        }];

        assert!(derive_session("demo", LOCAL_HOST, &tree).is_none());
    }

    #[test]
    fn test_derive_session_marks_splits_layout_when_split_root_present() {
        let tab = TabState {
            id: 1,
            title: "main".to_string(),
            is_active: true,
            is_focused: true,
            windows: vec![window(10, "demo", "demo.0.0"), window(11, "demo", "demo.0.1")],
            split_root: Some(SplitNode::internal(true, 0.5, SplitNode::leaf(0), SplitNode::leaf(1))),
        };
        let tree = vec![OsWindowState {
            id: 1,
            is_focused: true,
            tabs: vec![tab],
        }];

        let session = derive_session("demo", LOCAL_HOST, &tree).unwrap();
        assert_eq!(session.tabs[0].layout_kind, LayoutKind::Splits);
        assert!(session.tabs[0].split_root.is_some());
    }

    #[test]
    fn test_derive_session_aggregates_multiple_tabs() {
        let tab1 = TabState {
            id: 1,
            title: "one".to_string(),
            is_active: true,
            is_focused: true,
            windows: vec![window(10, "demo", "demo.0.0")],
            split_root: None,
        };
        let tab2 = TabState {
            id: 2,
            title: "two".to_string(),
            is_active: false,
            is_focused: false,
            windows: vec![window(11, "demo", "demo.1.0")],
            split_root: None,
        };
        let tree = vec![OsWindowState {
            id: 1,
            is_focused: true,
            tabs: vec![tab1, tab2],
        }];

        let session = derive_session("demo", LOCAL_HOST, &tree).unwrap();
        assert_eq!(session.tabs.len(), 2);
        assert_eq!(session.agent_names.len(), 2);
    }
}
