use reqwest::StatusCode;
use thiserror::Error;

pub type SourceResult<T> = Result<T, SourceError>;

/// Failure of a Plex or Trakt call
///
/// The transport maps HTTP status codes onto these variants so callers can
/// decide between retrying, skipping the item, or aborting the command.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("gateway unavailable ({status})")]
    GatewayUnavailable { status: u16 },

    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

impl SourceError {
    /// Classify a non-success response
    pub fn from_status(status: StatusCode, retry_after: Option<u64>, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => SourceError::Unauthorized(body),
            404 => SourceError::NotFound(body),
            409 => SourceError::Conflict(body),
            // Trakt documents Retry-After on every 429, fall back to one second
            429 => SourceError::RateLimited {
                retry_after: retry_after.unwrap_or(1),
            },
            code @ (502 | 503 | 504 | 520..=530) => SourceError::GatewayUnavailable { status: code },
            code @ 500..=599 => SourceError::Server {
                status: code,
                message: body,
            },
            code => SourceError::Other(format!("HTTP {}: {}", code, body)),
        }
    }

    /// Error kinds worth retrying: timeouts, request failures, 5xx, gateway errors and rate limits
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SourceError::Timeout(_)
                | SourceError::Request(_)
                | SourceError::Server { .. }
                | SourceError::GatewayUnavailable { .. }
                | SourceError::RateLimited { .. }
        )
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            SourceError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::from_status(status, None, err.to_string())
        } else {
            SourceError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Decode(err.to_string())
    }
}

/// Read a response, turning non-success statuses into a classified error
pub(crate) async fn check_response(response: reqwest::Response) -> SourceResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    Err(SourceError::from_status(status, retry_after, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let err = SourceError::from_status(StatusCode::TOO_MANY_REQUESTS, Some(2), String::new());
        assert_eq!(err.retry_after(), Some(2));
        assert!(err.is_transient());

        assert!(matches!(
            SourceError::from_status(StatusCode::BAD_GATEWAY, None, String::new()),
            SourceError::GatewayUnavailable { status: 502 }
        ));
        assert!(SourceError::from_status(StatusCode::INTERNAL_SERVER_ERROR, None, String::new()).is_transient());
    }

    #[test]
    fn test_client_errors_are_not_transient() {
        for status in [StatusCode::NOT_FOUND, StatusCode::CONFLICT, StatusCode::UNAUTHORIZED, StatusCode::BAD_REQUEST] {
            assert!(!SourceError::from_status(status, None, String::new()).is_transient());
        }
        assert!(matches!(
            SourceError::from_status(StatusCode::CONFLICT, None, "checkin".to_string()),
            SourceError::Conflict(_)
        ));
    }
}
