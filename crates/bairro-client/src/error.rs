use thiserror::Error;

use bairro_types::error::ErrorBody;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection failure, timeout or unreadable response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a typed error body.
    #[error("api error ({status}): {}: {}", .body.name, .body.message)]
    Api { status: u16, body: ErrorBody },

    /// Non-2xx response whose body is not an error document.
    #[error("unexpected response ({status}): {body}")]
    Decode { status: u16, body: String },
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Api { status, .. } | Self::Decode { status, .. } => Some(*status),
        }
    }

    pub fn body(&self) -> Option<&ErrorBody> {
        match self {
            Self::Api { body, .. } => Some(body),
            _ => None,
        }
    }
}
