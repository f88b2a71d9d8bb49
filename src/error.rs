//! Error types shared by the token issuer, the transport and the API client.

use reqwest::StatusCode;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The private key could not be read or decoded.
    #[error("{reason}")]
    KeyLoad {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("unable to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("failed to create request")]
    BuildRequest(#[source] reqwest::Error),

    #[error("unable to send request")]
    Transport(#[source] reqwest::Error),

    #[error("failed to decode response")]
    Decode(#[source] serde_json::Error),

    #[error("invalid authorization header")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// Non-success status returned by the API, classified per action.
    #[error("{action}: {kind}")]
    Server { action: String, kind: ServerErrorKind },

    #[error("notification endpoint not found, it may not have been configured in the App Store Connect dashboard")]
    NotificationEndpointNotFound,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn key_load(reason: impl Into<String>) -> Self {
        Self::KeyLoad {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn key_load_with(
        reason: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::KeyLoad {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Classify a non-success status for the given action.
    pub fn from_status(status: StatusCode, action: &str) -> Self {
        let kind = match status {
            StatusCode::UNAUTHORIZED => ServerErrorKind::Unauthorized,
            StatusCode::INTERNAL_SERVER_ERROR => ServerErrorKind::InternalServer,
            other => ServerErrorKind::Unknown(other.as_u16()),
        };
        Self::Server {
            action: action.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ServerErrorKind {
    #[error("unauthorized, check your credentials")]
    Unauthorized,
    #[error("internal server error")]
    InternalServer,
    #[error("unknown error (status {0})")]
    Unknown(u16),
}
