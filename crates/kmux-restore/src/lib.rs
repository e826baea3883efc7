//! The restore engine (spec §4.7): replays a saved [`kmux_model::Session`]'s
//! tabs and split tree into the emulator. No I/O of its own beyond the
//! `Emulator` trait it is handed — the daemon owns sockets, locks, and state.

mod engine;
mod errors;

pub use engine::{restore_session, CreatedWindow, RestoreContext, RestoreResult};
pub use errors::RestoreError;
