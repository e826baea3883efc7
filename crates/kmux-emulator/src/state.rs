//! Public, emulator-agnostic view of `get_state()` (spec §4.3): the os
//! window / tab / window tree with session-identity tags resolved.

use kmux_model::SplitNode;

use crate::errors::EmulatorError;
use crate::wire::{RawOsWindow, parse_split_root};

#[derive(Debug, Clone, PartialEq)]
pub struct WindowState {
    pub id: u64,
    pub cwd: String,
    pub is_focused: bool,
    pub session: Option<String>,
    pub agent: Option<String>,
    pub host: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabState {
    pub id: u64,
    pub title: String,
    pub is_active: bool,
    pub is_focused: bool,
    pub windows: Vec<WindowState>,
    pub split_root: Option<SplitNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OsWindowState {
    pub id: u64,
    pub is_focused: bool,
    pub tabs: Vec<TabState>,
}

/// Parse the raw `ls` JSON into the state tree, resolving each window's
/// `kmux_session`/`kmux_agent`/`kmux_host` tags and each tab's split tree.
pub fn parse_state(json: &str) -> Result<Vec<OsWindowState>, EmulatorError> {
    let raw: Vec<RawOsWindow> = serde_json::from_str(json)?;
    raw.into_iter()
        .map(|os_win| {
            let tabs = os_win
                .tabs
                .iter()
                .map(|tab| {
                    let split_root = parse_split_root(tab)?;
                    let windows = tab
                        .windows
                        .iter()
                        .map(|w| WindowState {
                            id: w.id,
                            cwd: w.cwd.clone(),
                            is_focused: w.is_focused,
                            session: w.user_vars.get("kmux_session").cloned(),
                            agent: w.user_vars.get("kmux_agent").cloned(),
                            host: w.user_vars.get("kmux_host").cloned(),
                        })
                        .collect();
                    Ok(TabState {
                        id: tab.id,
                        title: tab.title.clone(),
                        is_active: tab.is_active,
                        is_focused: tab.is_focused,
                        windows,
                        split_root,
                    })
                })
                .collect::<Result<Vec<_>, EmulatorError>>()?;
            Ok(OsWindowState {
                id: os_win.id,
                is_focused: os_win.is_focused,
                tabs,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ls() -> String {
        serde_json::json!([
            {
                "id": 1,
                "is_focused": true,
                "tabs": [
                    {
                        "id": 1,
                        "title": "demo",
                        "is_active": true,
                        "is_focused": true,
                        "windows": [
                            {"id": 10, "title": "a", "cwd": "/tmp", "is_focused": true,
                             "user_vars": {"kmux_session": "demo", "kmux_agent": "demo.0.0"}},
                        ],
                        "groups": {},
                        "split_root": null,
                    }
                ],
            }
        ])
        .to_string()
    }

    #[test]
    fn test_parse_state_resolves_tags() {
        let state = parse_state(&sample_ls()).unwrap();
        assert_eq!(state.len(), 1);
        let win = &state[0].tabs[0].windows[0];
        assert_eq!(win.session.as_deref(), Some("demo"));
        assert_eq!(win.agent.as_deref(), Some("demo.0.0"));
        assert_eq!(win.host, None);
    }

    #[test]
    fn test_parse_state_empty_list() {
        let state = parse_state("[]").unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn test_parse_state_rejects_invalid_json() {
        let err = parse_state("not json").unwrap_err();
        assert_eq!(err.error_code(), "parse_error");
    }
}
