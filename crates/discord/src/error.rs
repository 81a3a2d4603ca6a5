use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Serenity(#[from] serenity::Error),

    #[error(transparent)]
    Channel(#[from] msgsync_channels::Error),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
