use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("session {id} is locked by another instance")]
    SessionLocked { id: uuid::Uuid },

    #[error("data directory {path} is locked by another instance")]
    InstanceLocked { path: String },

    #[error("session {id} not found")]
    NotFound { id: uuid::Uuid },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),

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
