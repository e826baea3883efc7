//! Atomic on-disk persistence for the reconciliation engine (spec ยง4.2):
//! session save files, the locked ownership file, and layout templates.

pub mod errors;
pub mod ownership;
pub mod sessions;
pub mod templates;

pub use errors::StoreError;
pub use ownership::OwnershipFile;
