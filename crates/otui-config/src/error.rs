use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    /// Only some of `OTUI_OLLAMA_HOST`/`OTUI_OLLAMA_MODEL`/`OTUI_DATA_DIR`
    /// were set; all three are required together.
    #[error("environment override incomplete: {missing} must be set alongside the other OTUI_* overrides")]
    EnvOverrideIncomplete { missing: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("toml parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("toml serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl otui_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::ConfigInvalid(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

otui_common::impl_context!();
