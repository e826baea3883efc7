//! End-to-end scenarios (spec §8) exercised against `Daemon` directly, plus
//! one roundtrip through the real Unix-socket server. `FakeEmulator`/
//! `FakeAgent` stand in for `kitten`/`tmux`, the same fake-adapter style
//! `kmux-restore`'s and `kmux-state`'s own test modules use.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use kmux_agent::{Agent, AgentError};
use kmux_daemon::Daemon;
use kmux_emulator::{Emulator, EmulatorError, LaunchOpts, LayoutKind, OsWindowState, TabState, WindowState};
use kmux_model::SessionStatus;
use kmux_paths::KmuxPaths;
use kmux_protocol::messages::{
    AttachAction, AttachParams, DetachParams, KillParams, RenameParams, SplitParams,
};

#[derive(Default)]
struct FakeEmulator {
    next_id: Mutex<u64>,
    launches: Mutex<Vec<LaunchOpts>>,
    focused: Mutex<Vec<u64>>,
    closed_windows: Mutex<Vec<u64>>,
    tree: Mutex<Vec<OsWindowState>>,
}

impl FakeEmulator {
    fn set_tree(&self, tree: Vec<OsWindowState>) {
        *self.tree.lock().unwrap() = tree;
    }
}

impl Emulator for FakeEmulator {
    fn get_state(&self) -> Result<Vec<OsWindowState>, EmulatorError> {
        Ok(self.tree.lock().unwrap().clone())
    }
    fn launch(&self, opts: &LaunchOpts) -> Result<u64, EmulatorError> {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        self.launches.lock().unwrap().push(opts.clone());
        Ok(*next)
    }
    fn focus_window(&self, id: u64) -> Result<(), EmulatorError> {
        self.focused.lock().unwrap().push(id);
        Ok(())
    }
    fn focus_tab(&self, _id: u64) -> Result<(), EmulatorError> {
        Ok(())
    }
    fn close_window(&self, id: u64) -> Result<(), EmulatorError> {
        self.closed_windows.lock().unwrap().push(id);
        Ok(())
    }
    fn close_tab(&self, _id: u64) -> Result<(), EmulatorError> {
        Ok(())
    }
    fn goto_layout(&self, _kind: LayoutKind) -> Result<(), EmulatorError> {
        Ok(())
    }
}

#[derive(Default)]
struct FakeAgent {
    live: Mutex<Vec<String>>,
    killed: Mutex<Vec<String>>,
}

impl FakeAgent {
    fn set_live(&self, names: Vec<String>) {
        *self.live.lock().unwrap() = names;
    }
}

impl Agent for FakeAgent {
    fn list(&self) -> Result<Vec<String>, AgentError> {
        Ok(self.live.lock().unwrap().clone())
    }
    fn kill(&self, agent_name: &str) -> Result<(), AgentError> {
        self.killed.lock().unwrap().push(agent_name.to_string());
        self.live.lock().unwrap().retain(|a| a != agent_name);
        Ok(())
    }
}

fn test_paths(dir: &std::path::Path) -> KmuxPaths {
    KmuxPaths::from_dirs(dir.join("data"), dir.join("config"))
}

fn test_daemon(dir: &std::path::Path) -> (Daemon, Arc<FakeEmulator>, Arc<FakeAgent>) {
    let emulator = Arc::new(FakeEmulator::default());
    let agent = Arc::new(FakeAgent::default());
    let daemon = Daemon::new(
        emulator.clone(),
        agent.clone(),
        test_paths(dir),
        dir.join("daemon.sock"),
        Vec::new(),
        Duration::from_secs(2),
    );
    (daemon, emulator, agent)
}

fn attach(name: &str) -> AttachParams {
    AttachParams {
        name: name.to_string(),
        cwd: Some("/tmp".to_string()),
        layout: None,
    }
}

#[test]
fn test_attach_fresh_session_creates_window_and_tracks_it() {
    let dir = tempfile::tempdir().unwrap();
    let (daemon, emulator, _agent) = test_daemon(dir.path());

    let result = daemon.attach(attach("demo")).unwrap();

    assert!(result.success);
    assert_eq!(result.action, AttachAction::Created);
    assert_eq!(emulator.launches.lock().unwrap().len(), 1);
    assert_eq!(daemon.session_status("demo"), Some(SessionStatus::Attached));
    assert_eq!(daemon.tracked_windows("demo").len(), 1);
}

#[test]
fn test_detach_then_reattach_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let (daemon, emulator, agent) = test_daemon(dir.path());

    daemon.attach(attach("demo")).unwrap();
    let window_id = daemon.tracked_windows("demo")[0];
    let agent_name = "demo.0.0".to_string();

    // Mirror what the emulator would report for the window we just launched.
    emulator.set_tree(vec![OsWindowState {
        id: 1,
        is_focused: true,
        tabs: vec![TabState {
            id: 1,
            title: "demo".to_string(),
            is_active: true,
            is_focused: true,
            windows: vec![WindowState {
                id: window_id,
                cwd: "/tmp".to_string(),
                is_focused: true,
                session: Some("demo".to_string()),
                agent: Some(agent_name.clone()),
                host: None,
            }],
            split_root: None,
        }],
    }]);

    daemon
        .detach(DetachParams {
            name: "demo".to_string(),
        })
        .unwrap();

    assert_eq!(daemon.session_status("demo"), Some(SessionStatus::Detached));
    assert!(daemon.tracked_windows("demo").is_empty());
    assert!(kmux_store::sessions::exists(&test_paths(dir.path()), "demo"));

    agent.set_live(vec![agent_name]);
    let result = daemon.attach(attach("demo")).unwrap();
    assert_eq!(result.action, AttachAction::Reattached);
    assert_eq!(daemon.session_status("demo"), Some(SessionStatus::Attached));
}

#[test]
fn test_rename_while_attached_updates_tracking() {
    let dir = tempfile::tempdir().unwrap();
    let (daemon, _emulator, _agent) = test_daemon(dir.path());
    daemon.attach(attach("demo")).unwrap();

    daemon
        .rename(RenameParams {
            old_name: "demo".to_string(),
            new_name: "work".to_string(),
        })
        .unwrap();

    assert_eq!(daemon.session_status("work"), Some(SessionStatus::Attached));
    assert!(daemon.session_status("demo").is_none());
    assert_eq!(daemon.tracked_windows("work").len(), 1);
    assert!(daemon.tracked_windows("demo").is_empty());
}

#[test]
fn test_split_during_session_adds_window() {
    let dir = tempfile::tempdir().unwrap();
    let (daemon, emulator, _agent) = test_daemon(dir.path());
    daemon.attach(attach("demo")).unwrap();

    let result = daemon
        .split(SplitParams {
            session: "demo".to_string(),
            direction: "vertical".to_string(),
            cwd: None,
            tab_idx: None,
        })
        .unwrap();

    assert!(result.success);
    assert!(result.window_id.is_some());
    assert_eq!(daemon.tracked_windows("demo").len(), 2);
    assert_eq!(emulator.launches.lock().unwrap().len(), 2);
}

#[test]
fn test_kill_removes_tracking_and_deletes_save() {
    let dir = tempfile::tempdir().unwrap();
    let (daemon, _emulator, agent) = test_daemon(dir.path());
    daemon.attach(attach("demo")).unwrap();
    agent.set_live(vec!["demo.0.0".to_string()]);

    daemon
        .kill(KillParams {
            name: "demo".to_string(),
        })
        .unwrap();

    assert!(daemon.session_status("demo").is_none());
    assert!(daemon.tracked_windows("demo").is_empty());
    assert_eq!(agent.killed.lock().unwrap().as_slice(), &["demo.0.0".to_string()]);
    assert!(!kmux_store::sessions::exists(&test_paths(dir.path()), "demo"));
}

#[test]
fn test_bootstrap_adopts_live_agent_not_in_ownership_file() {
    let dir = tempfile::tempdir().unwrap();
    let (daemon, _emulator, agent) = test_daemon(dir.path());
    agent.set_live(vec!["orphan.0.0".to_string()]);

    daemon.bootstrap().unwrap();

    assert_eq!(daemon.agent_session("orphan.0.0"), Some("orphan".to_string()));
    assert_eq!(daemon.session_status("orphan"), Some(SessionStatus::Detached));
}

#[test]
fn test_reconcile_tick_drops_agent_no_longer_live() {
    let dir = tempfile::tempdir().unwrap();
    let (daemon, emulator, agent) = test_daemon(dir.path());
    daemon.attach(attach("demo")).unwrap();

    // Both the window and the agent behind it vanish between ticks.
    emulator.set_tree(Vec::new());
    agent.set_live(Vec::new());

    daemon.reconcile_tick();

    assert!(daemon.session_status("demo").is_none());
    assert!(daemon.agent_session("demo.0.0").is_none());
}

#[tokio::test]
async fn test_ping_roundtrip_over_socket() {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("daemon.sock");
    let pid_path = dir.path().join("daemon.pid");

    let (daemon, _emulator, _agent) = test_daemon(dir.path());
    let daemon = Arc::new(daemon);

    let config = kmux_daemon::DaemonConfig::default();
    let server_socket = socket_path.clone();
    let server_handle = tokio::spawn(async move {
        kmux_daemon::run_server(daemon, server_socket, pid_path, config).await
    });

    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut stream = tokio::net::UnixStream::connect(&socket_path).await.unwrap();
    stream
        .write_all(b"{\"method\":\"ping\",\"params\":null}\n")
        .await
        .unwrap();
    let (read_half, _write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    assert!(line.contains("pong"));

    let mut shutdown_stream = tokio::net::UnixStream::connect(&socket_path).await.unwrap();
    shutdown_stream
        .write_all(b"{\"method\":\"shutdown\",\"params\":null}\n")
        .await
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(3), server_handle).await;
    assert!(result.is_ok());
}
