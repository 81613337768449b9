use thiserror::Error;

use crate::auth::AuthError;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("authorization failed: {0}")]
    Auth(#[from] AuthError),

    #[error("news API error: {0}")]
    News(String),

    #[error("generation failed: {0:#}")]
    Generation(anyhow::Error),

    #[error("model output is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("model output is not a usable post: {0}")]
    MalformedPost(String),

    #[error("Blogger API error during {operation}: {message}")]
    Blogger {
        operation: &'static str,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("a bot run is already in progress")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, BotError>;
