//! Client error type

use datachain_core::CoreError;
use thiserror::Error;

/// Error type for HTTP client operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success response
    #[error("Server error ({status}): {body}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Resource does not exist on the remote side
    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request was rejected before being sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Client is missing required configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Response did not have the expected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

impl From<ClientError> for CoreError {
    fn from(err: ClientError) -> Self {
        match err {
            // A missing remote object is an upstream fault, not an unknown dataset
            ClientError::NotFound(what) => {
                CoreError::External(format!("remote resource not found: {}", what))
            }
            ClientError::InvalidRequest(msg) => CoreError::InvalidInput(msg),
            ClientError::Config(msg) => CoreError::Config(msg),
            other => CoreError::External(other.to_string()),
        }
    }
}

/// Turn a non-success response into an error
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(body));
    }
    Err(ClientError::Server {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use datachain_core::ErrorKind;

    #[test]
    fn test_maps_into_core_taxonomy() {
        let core: CoreError = ClientError::NotFound("QmX".to_string()).into();
        assert!(matches!(core, CoreError::External(_)));
        assert_eq!(core.user_message(), "internal error");

        let core: CoreError = ClientError::InvalidRequest("ttl".to_string()).into();
        assert_eq!(core.kind(), ErrorKind::InvalidInput);

        let core: CoreError = ClientError::Server {
            status: 502,
            body: "bad gateway".to_string(),
        }
        .into();
        assert!(matches!(core, CoreError::External(ref m) if m.contains("502")));

        let core: CoreError = ClientError::Config("no relay".to_string()).into();
        assert!(matches!(core, CoreError::Config(_)));
    }
}
