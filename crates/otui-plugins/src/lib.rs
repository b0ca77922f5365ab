//! Plugin catalog: the declarative `Plugin` record, its installed-instance
//! record, per-plugin enable/config state, the curated+custom registry
//! files, and the dynamic argument/environment template grammar.

pub mod catalog;
pub mod config_store;
pub mod error;
pub mod registry;
pub mod template;
pub mod types;

pub use catalog::InstalledPluginCatalog;
pub use config_store::{PluginConfigStore, PluginEntryConfig};
pub use error::{Error, Result};
pub use registry::PluginRegistry;
pub use types::{AuthType, InstallType, InstalledPlugin, Plugin, PluginTransport, TrustLevel, trust_level};
