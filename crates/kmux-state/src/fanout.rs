//! Multi-host fan-out (spec §4.5): one task per configured host, a results
//! channel the caller can drain as answers arrive, and an overall deadline —
//! a host that times out is reported as a per-host error, not a failed call.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use kmux_agent::Agent;
use kmux_emulator::Emulator;
use kmux_paths::KmuxPaths;
use kmux_protocol::messages::SessionInfo;

use crate::query::{HostQuery, sessions_for_host};

/// One remote (or local) target to query, with its adapters already bound.
pub struct HostTarget {
    pub host: String,
    pub emulator: Arc<dyn Emulator>,
    pub agent: Arc<dyn Agent>,
    pub ownership: BTreeMap<String, String>,
}

/// The outcome of querying one host: either its session list, or an error
/// string (query failure or deadline exceeded).
pub struct HostResult {
    pub host: String,
    pub sessions: Vec<SessionInfo>,
    pub error: Option<String>,
}

/// Query every target in parallel, honouring `deadline` for the whole call.
/// Hosts that answer within the deadline contribute their sessions; hosts
/// that error or time out contribute an empty list plus an error string.
pub async fn sessions(
    targets: Vec<HostTarget>,
    include_saved: bool,
    paths: Option<KmuxPaths>,
    deadline: Duration,
) -> Vec<HostResult> {
    let (tx, mut rx) = tokio::sync::mpsc::channel(targets.len().max(1));
    let expected = targets.len();

    for target in targets {
        let tx = tx.clone();
        let paths = paths.clone();
        tokio::spawn(async move {
            let host = target.host.clone();
            let result = tokio::task::spawn_blocking(move || {
                let query = HostQuery {
                    host: &target.host,
                    emulator: target.emulator.as_ref(),
                    agent: target.agent.as_ref(),
                    ownership: &target.ownership,
                };
                sessions_for_host(&query, include_saved, paths.as_ref())
            })
            .await;

            let host_result = match result {
                Ok(Ok(sessions)) => HostResult {
                    host: host.clone(),
                    sessions,
                    error: None,
                },
                Ok(Err(e)) => HostResult {
                    host: host.clone(),
                    sessions: Vec::new(),
                    error: Some(e.to_string()),
                },
                Err(join_err) => HostResult {
                    host: host.clone(),
                    sessions: Vec::new(),
                    error: Some(format!("query task panicked: {join_err}")),
                },
            };
            let _ = tx.send(host_result).await;
        });
    }
    drop(tx);

    let mut results = Vec::with_capacity(expected);
    let collect = async {
        while let Some(host_result) = rx.recv().await {
            let host = host_result.host.clone();
            results.push(host_result);
            if results.len() == expected {
                break;
            }
            let _ = host;
        }
    };

    if tokio::time::timeout(deadline, collect).await.is_err() {
        let answered: std::collections::BTreeSet<_> =
            results.iter().map(|r| r.host.clone()).collect();
        tracing::warn!(
            event = "state.fanout.deadline_exceeded",
            answered = answered.len(),
            expected = expected,
        );
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use kmux_agent::AgentError;
    use kmux_emulator::{EmulatorError, LaunchOpts, OsWindowState};
    use kmux_model::LayoutKind;

    struct EmptyEmulator;
    impl Emulator for EmptyEmulator {
        fn get_state(&self) -> Result<Vec<OsWindowState>, EmulatorError> {
            Ok(Vec::new())
        }
        fn launch(&self, _: &LaunchOpts) -> Result<u64, EmulatorError> {
            unimplemented!()
        }
        fn focus_window(&self, _: u64) -> Result<(), EmulatorError> {
            unimplemented!()
        }
        fn focus_tab(&self, _: u64) -> Result<(), EmulatorError> {
            unimplemented!()
        }
        fn close_window(&self, _: u64) -> Result<(), EmulatorError> {
            unimplemented!()
        }
        fn close_tab(&self, _: u64) -> Result<(), EmulatorError> {
            unimplemented!()
        }
        fn goto_layout(&self, _: LayoutKind) -> Result<(), EmulatorError> {
            unimplemented!()
        }
    }

    struct EmptyAgent;
    impl Agent for EmptyAgent {
        fn list(&self) -> Result<Vec<String>, AgentError> {
            Ok(Vec::new())
        }
        fn kill(&self, _: &str) -> Result<(), AgentError> {
            unimplemented!()
        }
    }

    fn target(host: &str) -> HostTarget {
        HostTarget {
            host: host.to_string(),
            emulator: Arc::new(EmptyEmulator),
            agent: Arc::new(EmptyAgent),
            ownership: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_fanout_collects_every_host() {
        let targets = vec![target("local"), target("build-box")];
        let results = sessions(targets, false, None, Duration::from_secs(5)).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.error.is_none()));
    }

    #[tokio::test]
    async fn test_fanout_empty_targets() {
        let results = sessions(Vec::new(), false, None, Duration::from_secs(1)).await;
        assert!(results.is_empty());
    }
}
