use std::sync::Arc;
use std::time::Duration;

use kmux_agent::LocalAgentClient;
use kmux_daemon::{Daemon, DaemonError};
use kmux_emulator::EmulatorClient;
use kmux_paths::KmuxPaths;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    init_logging();
    info!(event = "daemon.start_started");

    let exit_code = match run() {
        Ok(()) => {
            info!(event = "daemon.start_completed");
            0
        }
        Err(e) => {
            error!(event = "daemon.start_failed", error = %e);
            eprintln!("kmux-daemon: {e}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<(), DaemonError> {
    eprintln!("Starting daemon in foreground (PID: {})...", std::process::id());

    let paths = KmuxPaths::resolve()?;
    let config = kmux_daemon::load_daemon_config(&paths)?;

    let emulator: Arc<dyn kmux_emulator::Emulator> =
        Arc::new(EmulatorClient::with_binary(config.emulator_binary.clone()));
    let agent: Arc<dyn kmux_agent::Agent> =
        Arc::new(LocalAgentClient::with_binary(config.agent_binary.clone()));

    let daemon_socket = paths.daemon_socket();
    let pid_path = paths.daemon_pid_file();

    let daemon = Arc::new(Daemon::new(
        emulator,
        agent,
        paths,
        daemon_socket.clone(),
        config.remote_hosts.clone(),
        Duration::from_secs(config.fanout_timeout_secs),
    ));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(kmux_daemon::run_server(daemon, daemon_socket, pid_path, config))
}

/// Structured logging init (spec §4.6's ambient logging): JSON output,
/// filterable via `RUST_LOG`, defaulting to `info`.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
