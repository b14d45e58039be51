use shared::{domain::InvalidDraft, protocol::ParseError};
use thiserror::Error;

/// Failure taxonomy for every operation against the remote service.
///
/// `Auth` is terminal for the session: whoever observes it invalidates the
/// session and clears the caches. `TransientServer` and `Transport` are
/// recoverable and are swallowed on background polls so the displayed data
/// never flickers. `Validation` is local and pre-network. `Operation` is any
/// other non-2xx response, with the message taken from the response body.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("session expired or unauthorized")]
    Auth,
    #[error("the server is still starting up; data will appear shortly")]
    TransientServer,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Operation(String),
    #[error("malformed server payload: {0}")]
    Parse(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    /// True for failures a later poll may clear on its own.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::TransientServer | Self::Transport(_))
    }
}

impl From<ParseError> for ClientError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<InvalidDraft> for ClientError {
    fn from(err: InvalidDraft) -> Self {
        Self::Validation(err.to_string())
    }
}
