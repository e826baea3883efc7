//! The per-host query algorithm (spec §4.5): merge the emulator's live
//! window tree, the agent adapter's live process list, and (optionally)
//! save files on disk into one list of [`SessionInfo`] records.

use std::collections::BTreeMap;

use kmux_agent::Agent;
use kmux_emulator::Emulator;
use kmux_model::{LOCAL_HOST, SessionStatus, parse_session_prefix};
use kmux_paths::KmuxPaths;
use kmux_protocol::messages::SessionInfo;

use crate::errors::StateError;

struct Attached {
    panes: usize,
    cwd: String,
}

/// Everything a single host's query needs: its adapters and the slice of
/// the ownership file relevant to agent->session attribution.
pub struct HostQuery<'a> {
    pub host: &'a str,
    pub emulator: &'a dyn Emulator,
    pub agent: &'a dyn Agent,
    pub ownership: &'a BTreeMap<String, String>,
}

/// Run the per-host algorithm (spec §4.5, steps 1-4).
pub fn sessions_for_host(
    query: &HostQuery,
    include_saved: bool,
    paths: Option<&KmuxPaths>,
) -> Result<Vec<SessionInfo>, StateError> {
    let emulator_result = query.emulator.get_state();
    let agent_result = query.agent.list();

    if let (Err(e), Err(a)) = (&emulator_result, &agent_result) {
        return Err(StateError::BothFailed {
            emulator: e.to_string(),
            agent: a.to_string(),
        });
    }

    let mut attached: BTreeMap<String, Attached> = BTreeMap::new();
    match emulator_result {
        Ok(os_windows) => {
            for os_win in os_windows {
                for tab in os_win.tabs {
                    for win in tab.windows {
                        let Some(session) = win.session.clone() else {
                            continue;
                        };
                        let win_host = win.host.as_deref().unwrap_or(LOCAL_HOST);
                        if win_host != query.host {
                            continue;
                        }
                        let entry = attached.entry(session).or_insert_with(|| Attached {
                            panes: 0,
                            cwd: win.cwd.clone(),
                        });
                        entry.panes += 1;
                    }
                }
            }
        }
        Err(e) => {
            tracing::warn!(event = "state.query.emulator_failed", host = %query.host, error = %e);
        }
    }

    let mut detached: BTreeMap<String, usize> = BTreeMap::new();
    match agent_result {
        Ok(agents) => {
            for agent_name in agents {
                let session = query
                    .ownership
                    .get(&agent_name)
                    .cloned()
                    .or_else(|| {
                        let prefix = parse_session_prefix(&agent_name);
                        (!prefix.is_empty()).then(|| prefix.to_string())
                    });
                let Some(session) = session else { continue };
                if attached.contains_key(&session) {
                    continue;
                }
                *detached.entry(session).or_insert(0) += 1;
            }
        }
        Err(e) => {
            tracing::warn!(event = "state.query.agent_failed", host = %query.host, error = %e);
        }
    }

    let mut out = Vec::new();
    for (name, info) in &attached {
        out.push(SessionInfo {
            name: name.clone(),
            host: query.host.to_string(),
            status: SessionStatus::Attached,
            panes: info.panes,
            is_restore_point: None,
            cwd: Some(info.cwd.clone()),
            last_seen: None,
        });
    }
    for (name, panes) in &detached {
        out.push(SessionInfo {
            name: name.clone(),
            host: query.host.to_string(),
            status: SessionStatus::Detached,
            panes: *panes,
            is_restore_point: None,
            cwd: None,
            last_seen: None,
        });
    }

    if include_saved {
        if let Some(paths) = paths {
            for name in kmux_store::sessions::list(paths)? {
                if attached.contains_key(&name) || detached.contains_key(&name) {
                    continue;
                }
                let session = kmux_store::sessions::load(paths, &name)?;
                if session.host != query.host {
                    continue;
                }
                let panes: usize = session.tabs.iter().map(|t| t.windows.len()).sum();
                out.push(SessionInfo {
                    name: session.name,
                    host: session.host,
                    status: SessionStatus::Saved,
                    panes,
                    is_restore_point: Some(true),
                    cwd: None,
                    last_seen: Some(session.saved_at.to_rfc3339()),
                });
            }
        }
    }

    Ok(out)
}
