use shared::error::ErrorObject;
use thiserror::Error;

/// Status the backend uses for validation failures that carry a readable title.
pub const STATUS_BAD_REQUEST: u16 = 400;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server responded with status {status}")]
    Status {
        status: u16,
        errors: Vec<ErrorObject>,
    },
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(error) => error.status().map(|status| status.as_u16()),
            Self::InvalidBaseUrl { .. } | Self::Decode(_) => None,
        }
    }

    /// Server-authored title. Only a 400 carrying a structured error list has one.
    pub fn server_title(&self) -> Option<&str> {
        match self {
            Self::Status {
                status: STATUS_BAD_REQUEST,
                errors,
            } => errors.first().map(|error| error.title.as_str()),
            _ => None,
        }
    }

    pub fn user_message(&self, fallback: &str) -> String {
        self.server_title().unwrap_or(fallback).to_string()
    }
}
