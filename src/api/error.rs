use thiserror::Error;

/// Markers the Dokploy API uses in error bodies for missing objects.
const NOT_FOUND_MARKERS: [&str; 2] = ["Not Found", "404"];

/// Errors returned by the remote API client.
///
/// Not-found is classified here, once, so callers can branch on
/// [`ApiError::is_not_found`] instead of inspecting message text.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    NotFound { message: String },

    #[error("status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {message}")]
    Decode { message: String },

    #[error("invalid client configuration: {message}")]
    Config { message: String },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl ApiError {
    /// Classify a non-success HTTP response.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            format!("HTTP {}", status)
        } else {
            body.trim().to_string()
        };

        if status == 404 || NOT_FOUND_MARKERS.iter().any(|m| message.contains(m)) {
            ApiError::NotFound { message }
        } else {
            ApiError::Status { status, message }
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        ApiError::Decode {
            message: message.into(),
        }
    }

    /// Whether the remote reported the addressed object as gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}
