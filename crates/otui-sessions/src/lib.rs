//! Session persistence and file-locking (component C3): per-session JSON
//! files, PID-embedded stale-lock-detecting lock files, and a single
//! data-directory instance lock.

pub mod error;
pub mod lock;
pub mod model;
pub mod store;

pub use error::{Error, Result};
pub use lock::LockGuard;
pub use model::Session;
pub use store::{SearchHit, SessionStore};
