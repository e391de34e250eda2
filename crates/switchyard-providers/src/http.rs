//! HTTP plumbing shared by the remote provider clients.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use switchyard_abstraction::{ProviderError, ProviderKind};
use tracing::error;

/// Builds a reqwest client whose total request time is bounded by `timeout`.
pub(crate) fn build_client(timeout: Duration) -> Client {
    Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        // Only fails when the TLS backend cannot initialise.
        error!(error = %e, "Failed to build HTTP client with timeout, using defaults");
        Client::new()
    })
}

/// Maps a reqwest transport error onto the provider error taxonomy.
pub(crate) fn transport_error(
    provider: ProviderKind,
    timeout: Duration,
    err: &reqwest::Error,
) -> ProviderError {
    error!(provider = %provider, error = %err, "Failed to send request to provider");
    if err.is_timeout() {
        ProviderError::Timeout(timeout)
    } else if err.is_decode() {
        ProviderError::MalformedResponse(err.to_string())
    } else {
        ProviderError::Network(err.to_string())
    }
}

/// Parses a `Retry-After` header given in seconds.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

/// Classifies a status code and body into a `ProviderError`.
pub(crate) fn status_error(
    status: StatusCode,
    headers: &HeaderMap,
    body: String,
) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Authentication(body),
        StatusCode::TOO_MANY_REQUESTS => {
            ProviderError::RateLimited { retry_after: retry_after(headers), message: body }
        }
        s => ProviderError::Status { status: s.as_u16(), message: body },
    }
}

/// Turns a non-success response into an error, consuming the body.
pub(crate) async fn error_from_response(provider: ProviderKind, response: Response) -> ProviderError {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
    error!(
        provider = %provider,
        status = %status,
        error = %body,
        "Provider API returned error status"
    );
    status_error(status, &headers, body)
}

/// Decodes a JSON body, reporting failures as malformed responses.
pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    provider: ProviderKind,
    response: Response,
) -> Result<T, ProviderError> {
    let bytes = response.bytes().await.map_err(|e| {
        error!(provider = %provider, error = %e, "Failed to read provider response body");
        ProviderError::Network(e.to_string())
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        error!(provider = %provider, error = %e, "Failed to parse provider response");
        ProviderError::MalformedResponse(format!("Failed to parse response: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_status_mapping() {
        let headers = HeaderMap::new();
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, &headers, "bad key".into()),
            ProviderError::Authentication(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, &headers, "upstream".into()),
            ProviderError::Status { status: 502, .. }
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, &headers, "nope".into()),
            ProviderError::Status { status: 400, .. }
        ));
    }

    #[test]
    fn test_unrepresentable_retry_after_is_dropped() {
        for raw in ["1e30", "-3", "NaN", "soon"] {
            let mut headers = HeaderMap::new();
            headers.insert(RETRY_AFTER, HeaderValue::from_str(raw).unwrap());
            match status_error(StatusCode::TOO_MANY_REQUESTS, &headers, "slow down".into()) {
                ProviderError::RateLimited { retry_after, .. } => assert_eq!(retry_after, None, "{raw}"),
                other => panic!("expected RateLimited, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_rate_limit_reads_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        match status_error(StatusCode::TOO_MANY_REQUESTS, &headers, "slow down".into()) {
            ProviderError::RateLimited { retry_after, message } => {
                assert_eq!(retry_after, Some(Duration::from_secs(12)));
                assert_eq!(message, "slow down");
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[test]
    fn test_retry_after_ignores_http_dates() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }
}
