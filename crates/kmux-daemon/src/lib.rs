//! kmux-daemon: the reconciliation engine (spec §4.6). Owns the three-map
//! triangle, serves IPC requests over a Unix socket, and runs the
//! reconciliation/auto-save poll loop.

pub mod config;
mod daemon;
pub mod errors;
pub mod pid;
mod reconcile;
mod server;
mod state;

pub use config::{DaemonConfig, load_daemon_config};
pub use daemon::Daemon;
pub use errors::DaemonError;
pub use reconcile::derive_session;
pub use server::run_server;
