//! The accept loop and poll loop (spec §6, §4.6): binds the Unix socket,
//! serves one JSONL request per connection, and drives the reconciliation
//! and auto-save tickers until a shutdown signal or an IPC `shutdown`
//! request arrives.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use kmux_protocol::codec::{read_message, write_message};
use kmux_protocol::messages::{
    AttachParams, DetachParams, KillParams, NotifyCloseParams, RenameParams, ResolveParams,
    Request, Response, SessionsParams, SplitParams,
};

use crate::config::DaemonConfig;
use crate::daemon::Daemon;
use crate::errors::DaemonError;
use crate::pid;

/// Bind the socket, run the accept loop and the poll loop side by side, and
/// block until a shutdown signal (SIGINT/SIGTERM or an IPC `shutdown`
/// request) is observed. Always cleans up the PID file and the socket on
/// the way out.
pub async fn run_server(
    daemon: Arc<Daemon>,
    socket_path: PathBuf,
    pid_path: PathBuf,
    config: DaemonConfig,
) -> Result<(), DaemonError> {
    if let Some(existing_pid) = pid::check_daemon_running(&pid_path) {
        return Err(DaemonError::AlreadyRunning(existing_pid));
    }
    pid::write_pid_file(&pid_path)?;

    if socket_path.exists() {
        std::fs::remove_file(&socket_path)?;
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(&socket_path)?;

    info!(
        event = "daemon.server.started",
        pid = std::process::id(),
        socket = %socket_path.display(),
    );

    daemon.bootstrap()?;

    let shutdown = CancellationToken::new();

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal(signal_shutdown).await;
    });

    let poll_daemon = daemon.clone();
    let poll_shutdown = shutdown.clone();
    let poll_config = config.clone();
    tokio::spawn(async move {
        poll_loop(poll_daemon, poll_config, poll_shutdown).await;
    });

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let daemon = daemon.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(handle_connection(stream, daemon, shutdown));
                    }
                    Err(e) => {
                        error!(event = "daemon.server.accept_failed", error = %e);
                    }
                }
            }
            _ = shutdown.cancelled() => {
                info!(event = "daemon.server.shutdown_started");
                break;
            }
        }
    }

    daemon.auto_save_tick();
    cleanup(&pid_path, &socket_path);
    info!(event = "daemon.server.shutdown_completed");
    Ok(())
}

async fn wait_for_shutdown_signal(token: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
    {
        Ok(s) => s,
        Err(e) => {
            error!(event = "daemon.server.signal_handler_failed", error = %e);
            return;
        }
    };

    tokio::select! {
        _ = ctrl_c => info!(event = "daemon.server.signal_received", signal = "SIGINT"),
        _ = sigterm.recv() => info!(event = "daemon.server.signal_received", signal = "SIGTERM"),
    }
    token.cancel();
}

async fn poll_loop(daemon: Arc<Daemon>, config: DaemonConfig, shutdown: CancellationToken) {
    let mut reconcile_ticker = tokio::time::interval(Duration::from_secs(config.reconcile_interval_secs));
    let mut autosave_ticker = tokio::time::interval(Duration::from_secs(config.auto_save_interval_secs));

    loop {
        tokio::select! {
            _ = reconcile_ticker.tick() => {
                let d = daemon.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || d.reconcile_tick()).await {
                    warn!(event = "daemon.poll.reconcile_panicked", error = %e);
                }
            }
            _ = autosave_ticker.tick() => {
                let d = daemon.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || d.auto_save_tick()).await {
                    warn!(event = "daemon.poll.autosave_panicked", error = %e);
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }
}

/// Serve exactly one request on this connection, then close it (spec §6:
/// one request/response per connection, no keep-alive).
async fn handle_connection(stream: UnixStream, daemon: Arc<Daemon>, shutdown: CancellationToken) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = tokio::io::BufReader::new(read_half);

    let request: Request = match read_message(&mut reader).await {
        Ok(Some(req)) => req,
        Ok(None) => return,
        Err(e) => {
            let _ = write_message(
                &mut write_half,
                &Response::err(format!("malformed request: {e}")),
            )
            .await;
            return;
        }
    };

    if request.method == "shutdown" {
        let _ = write_message(&mut write_half, &Response::ok(serde_json::json!("shutting down"))).await;
        shutdown.cancel();
        return;
    }

    let response = match tokio::task::spawn_blocking(move || handle_request(&daemon, &request)).await {
        Ok(Ok(value)) => Response::ok(value),
        Ok(Err(e)) => {
            if !e.is_validation_error() {
                warn!(event = "daemon.server.request_failed", error = %e);
            }
            Response::err(e.to_string())
        }
        Err(join_err) => Response::err(format!("handler panicked: {join_err}")),
    };
    let _ = write_message(&mut write_half, &response).await;
}

/// Dispatch one request to its `Daemon` handler (spec §6's method table).
/// Runs synchronously — callers must invoke it inside `spawn_blocking`.
fn handle_request(daemon: &Daemon, req: &Request) -> Result<serde_json::Value, DaemonError> {
    match req.method.as_str() {
        "ping" => Ok(serde_json::json!("pong")),
        "sessions" => {
            let params: SessionsParams = req.parse_params().map_err(DaemonError::invalid_params)?;
            Ok(serde_json::to_value(daemon.sessions(params)?)?)
        }
        "attach" => {
            let params: AttachParams = req.parse_params().map_err(DaemonError::invalid_params)?;
            Ok(serde_json::to_value(daemon.attach(params)?)?)
        }
        "detach" => {
            let params: DetachParams = req.parse_params().map_err(DaemonError::invalid_params)?;
            Ok(serde_json::to_value(daemon.detach(params)?)?)
        }
        "kill" => {
            let params: KillParams = req.parse_params().map_err(DaemonError::invalid_params)?;
            Ok(serde_json::to_value(daemon.kill(params)?)?)
        }
        "split" => {
            let params: SplitParams = req.parse_params().map_err(DaemonError::invalid_params)?;
            Ok(serde_json::to_value(daemon.split(params)?)?)
        }
        "resolve" => {
            let params: ResolveParams = req.parse_params().map_err(DaemonError::invalid_params)?;
            Ok(serde_json::to_value(daemon.resolve(params))?)
        }
        "rename" => {
            let params: RenameParams = req.parse_params().map_err(DaemonError::invalid_params)?;
            Ok(serde_json::to_value(daemon.rename(params)?)?)
        }
        "notify_close" => {
            let params: NotifyCloseParams =
                req.parse_params().map_err(DaemonError::invalid_params)?;
            Ok(serde_json::to_value(daemon.notify_close(params)?)?)
        }
        "close_focused" => Ok(serde_json::to_value(daemon.close_focused()?)?),
        "close_tab" => Ok(serde_json::to_value(daemon.close_tab()?)?),
        other => Err(DaemonError::UnknownMethod(other.to_string())),
    }
}

fn cleanup(pid_path: &Path, socket_path: &Path) {
    if let Err(e) = pid::remove_pid_file(pid_path) {
        error!(event = "daemon.server.pid_cleanup_failed", error = %e);
    }
    if socket_path.exists() {
        if let Err(e) = std::fs::remove_file(socket_path) {
            error!(event = "daemon.server.socket_cleanup_failed", error = %e);
        }
    }
}
