use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to start MCP server '{name}': {reason}")]
    StartFailed { name: String, reason: String },

    #[error("MCP server '{name}' did not close within the shutdown deadline")]
    StopTimeout { name: String },

    #[error("MCP call to '{name}' failed: {reason}")]
    CallFailed { name: String, reason: String },

    #[error("tool '{tool}' denied by policy gate: {reason}")]
    PolicyDenied { tool: String, reason: String },

    #[error("plugin '{name}' not found")]
    NotFound { name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Plugins(#[from] otui_plugins::Error),

    #[error(transparent)]
    Oauth(#[from] otui_oauth::Error),

    #[error(transparent)]
    Vault(#[from] otui_vault::Error),

    #[error("{0}")]
    Message(String),
}

impl otui_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

otui_common::impl_context!();
