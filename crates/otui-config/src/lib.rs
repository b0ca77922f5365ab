//! Typed configuration, migrations, environment overrides, and the debug
//! log sink (component C10).

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod logging;
pub mod migrate;
pub mod schema;

pub use error::{Error, Result};
pub use schema::{ProviderConfig, SecurityConfig, SystemConfig, UserConfig, VaultModeConfig};
