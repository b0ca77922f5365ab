use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("provider call exceeded its deadline")]
    DeadlineExceeded,

    #[error("turn was cancelled")]
    Cancelled,

    #[error("no pending permission request with id '{0}'")]
    UnknownPermissionRequest(String),

    #[error(transparent)]
    Provider(#[from] otui_providers::Error),

    #[error(transparent)]
    Mcp(#[from] otui_mcp::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

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
