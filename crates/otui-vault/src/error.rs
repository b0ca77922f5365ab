use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("private key requires a passphrase")]
    PassphraseRequired,

    #[error("wrong key or passphrase")]
    WrongPassphrase,

    #[error("credential data is corrupt: {0}")]
    CredentialCorrupt(String),

    #[error("credential io error: {0}")]
    CredentialIoError(#[from] std::io::Error),

    #[error("ssh key error: {0}")]
    SshKey(String),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("json error: {0}")]
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
