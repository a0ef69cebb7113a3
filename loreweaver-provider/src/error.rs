//! Provider error type and the HTTP/transport mapping every adapter uses.

use thiserror::Error;

/// Errors from provider adapters.
///
/// The mapping is uniform across adapters: any non-2xx HTTP response
/// becomes [`ProviderError::Api`] with the real status; timeouts are
/// reported as status 408 and transport failures as status 500, so
/// the scheduler's retry policy only ever has to look at one shape.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The vendor API answered with a non-success status.
    #[error("api error {status}: {body}")]
    Api {
        /// HTTP status (408 = timeout, 500 = transport failure).
        status: u16,
        /// Response body or transport error description.
        body: String,
    },

    /// The vendor's response could not be parsed into the wire types.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The adapter configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Build the canonical timeout error (status 408).
    pub fn timeout() -> Self {
        ProviderError::Api {
            status: 408,
            body: "request timed out".into(),
        }
    }

    /// Build the canonical transport error (status 500).
    pub fn transport(detail: impl Into<String>) -> Self {
        ProviderError::Api {
            status: 500,
            body: detail.into(),
        }
    }

    /// Whether retrying this request might succeed: timeouts, rate
    /// limits, and server-side failures are transient; everything
    /// else is permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Api { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            ProviderError::InvalidResponse(_) | ProviderError::Config(_) => false,
        }
    }
}

/// Map a [`reqwest::Error`] to the canonical [`ProviderError`] shape.
pub fn map_reqwest_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::timeout()
    } else {
        ProviderError::transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_follows_status() {
        assert!(ProviderError::timeout().is_retryable());
        assert!(ProviderError::transport("conn reset").is_retryable());
        assert!(
            ProviderError::Api {
                status: 429,
                body: "slow down".into()
            }
            .is_retryable()
        );
        assert!(
            !ProviderError::Api {
                status: 401,
                body: "bad key".into()
            }
            .is_retryable()
        );
        assert!(!ProviderError::InvalidResponse("garbage".into()).is_retryable());
    }

    #[test]
    fn timeout_maps_to_408() {
        match ProviderError::timeout() {
            ProviderError::Api { status, .. } => assert_eq!(status, 408),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
