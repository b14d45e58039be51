use serde::{Deserialize, Serialize};

/// JSON error body shape returned by the remote service on non-2xx responses.
///
/// The live service is loose about this; only `message` is reliably present,
/// so everything is optional and the client falls back to the status line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiErrorBody {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            error: None,
        }
    }

    /// Best human-readable text in the body, if any.
    pub fn text(&self) -> Option<&str> {
        self.message.as_deref().or(self.error.as_deref())
    }
}
