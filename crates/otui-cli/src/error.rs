use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] otui_config::Error),

    #[error(transparent)]
    Vault(#[from] otui_vault::Error),

    #[error(transparent)]
    Sessions(#[from] otui_sessions::Error),

    #[error(transparent)]
    Plugins(#[from] otui_plugins::Error),

    #[error(transparent)]
    Mcp(#[from] otui_mcp::Error),

    #[error(transparent)]
    Provider(#[from] otui_providers::Error),

    #[error(transparent)]
    Chat(#[from] otui_chat::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("no provider named '{0}' is configured and enabled")]
    UnknownProvider(String),

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
