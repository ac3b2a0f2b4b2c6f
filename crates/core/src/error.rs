use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoryforgeError {
    #[error("Nothing to generate from: {reason}")]
    Validation { reason: String },

    #[error("Not enough credits: {required} required, {available} available")]
    InsufficientCredit { required: u64, available: u64 },

    #[error("A generation run is already in progress")]
    RunInProgress,

    #[error("Server configuration error: {message}")]
    Configuration { message: String },

    #[error("Server error: {status} ({message})")]
    Backend { status: u16, message: String },

    #[error("The model returned no candidates")]
    EmptyResponse,

    #[error("Could not recover scripts from the model response")]
    MalformedResponse { raw: String },

    #[error("Generation was cancelled")]
    Cancelled,

    #[error("API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },
}

impl StoryforgeError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Single-line message for the person running the generation.
    pub fn user_message(&self) -> String {
        match self {
            Self::MalformedResponse { .. } => "Data error, please retry".to_string(),
            Self::Configuration { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoryforgeError>;
