//! Data source seam and its HTTP implementation
//!
//! This module handles the raw exchange with the remote API, including:
//! - Building HTTP clients with a proper user agent string
//! - Attaching the API key to each request
//! - Decoding JSON response bodies
//! - Error classification

use crate::client::Operation;
use crate::config::ApiConfig;
use crate::{ConfigError, HarvestError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Error reasons that mean "this key is out of quota" rather than "forbidden"
const QUOTA_REASONS: &[&str] = &[
    "quotaExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "dailyLimitExceeded",
    "RESOURCE_EXHAUSTED",
];

/// Why a non-retriable call was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectKind {
    /// The requested item does not exist
    NotFound,

    /// Access refused for reasons other than quota (e.g. comments disabled)
    Denied,

    /// The request itself was invalid
    BadRequest,
}

impl fmt::Display for RejectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::Denied => "denied",
            Self::BadRequest => "bad request",
        };
        f.write_str(name)
    }
}

/// Classified failure of a single call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The key ran out of quota; switch keys
    Quota {
        status: u16,
        reason: String,
        retry_after: Option<Duration>,
    },

    /// Server or network trouble; retry the same key after a delay
    Transient { status: Option<u16>, reason: String },

    /// Client error; retrying cannot help
    Rejected {
        kind: RejectKind,
        status: u16,
        reason: String,
    },

    /// The body was not the JSON we expected
    Malformed { reason: String },
}

/// The remote data API as seen by the executor
///
/// One call authenticates with exactly one token.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn call(&self, token: &str, operation: &Operation) -> Result<Value, CallError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The API configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// JSON-over-HTTP data source
///
/// Sends `GET {base_url}/{endpoint}?{params}&{key_param}={token}`.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
    key_param: String,
}

impl HttpSource {
    pub fn new(
        client: Client,
        base_url: &str,
        key_param: impl Into<String>,
    ) -> Result<Self, HarvestError> {
        Url::parse(base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key_param: key_param.into(),
        })
    }

    /// Builds a source with its own HTTP client from the API configuration
    pub fn from_config(config: &ApiConfig) -> Result<Self, HarvestError> {
        let client = build_http_client(config)?;
        Self::new(client, &config.base_url, config.key_param.clone())
    }

    fn url_for(&self, token: &str, operation: &Operation) -> Result<Url, CallError> {
        let raw = format!(
            "{}/{}",
            self.base_url,
            operation.endpoint().trim_start_matches('/')
        );
        let mut url = Url::parse(&raw).map_err(|e| CallError::Rejected {
            kind: RejectKind::BadRequest,
            status: 0,
            reason: format!("invalid URL for {}: {}", operation.endpoint(), e),
        })?;

        {
            let mut query = url.query_pairs_mut();
            for (key, value) in operation.params() {
                query.append_pair(key, value);
            }
            query.append_pair(&self.key_param, token);
        }

        Ok(url)
    }
}

#[async_trait]
impl DataSource for HttpSource {
    async fn call(&self, token: &str, operation: &Operation) -> Result<Value, CallError> {
        let url = self.url_for(token, operation)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());

        let body = response.text().await.map_err(|e| CallError::Transient {
            status: Some(status.as_u16()),
            reason: format!("failed to read body: {}", e),
        })?;

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &body, retry_after));
        }

        serde_json::from_str(&body).map_err(|e| CallError::Malformed {
            reason: format!("invalid JSON body: {}", e),
        })
    }
}

/// Classifies a non-success HTTP response
///
/// | Condition | Class |
/// |-----------|-------|
/// | HTTP 429 | Quota |
/// | HTTP 403 with a quota reason | Quota |
/// | HTTP 403 otherwise, 401 | Rejected (denied) |
/// | HTTP 404 | Rejected (not found) |
/// | HTTP 408, 5xx | Transient |
/// | Other 4xx | Rejected (bad request) |
pub fn classify_status(status: u16, body: &str, retry_after: Option<Duration>) -> CallError {
    let reason = error_reason(body).unwrap_or_else(|| {
        StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("unknown")
            .to_string()
    });

    match status {
        429 => CallError::Quota {
            status,
            reason,
            retry_after,
        },
        403 if QUOTA_REASONS.contains(&reason.as_str()) => CallError::Quota {
            status,
            reason,
            retry_after,
        },
        401 | 403 => CallError::Rejected {
            kind: RejectKind::Denied,
            status,
            reason,
        },
        404 => CallError::Rejected {
            kind: RejectKind::NotFound,
            status,
            reason,
        },
        408 | 500..=599 => CallError::Transient {
            status: Some(status),
            reason,
        },
        _ => CallError::Rejected {
            kind: RejectKind::BadRequest,
            status,
            reason,
        },
    }
}

/// Extracts the machine-readable reason from an API error body
///
/// Looks at `error.errors[0].reason`, then `error.status`, then `error.message`.
pub fn error_reason(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;

    error
        .get("errors")
        .and_then(|errors| errors.get(0))
        .and_then(|first| first.get("reason"))
        .or_else(|| error.get("status"))
        .or_else(|| error.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Classifies a failure that happened before any response arrived
fn classify_transport_error(error: &reqwest::Error) -> CallError {
    let reason = if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        "connection failed".to_string()
    } else {
        error.to_string()
    };

    CallError::Transient {
        status: None,
        reason,
    }
}

/// Reads a `Retry-After` header given in seconds
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn google_error(code: u16, reason: &str) -> String {
        serde_json::json!({
            "error": {
                "code": code,
                "message": "something went wrong",
                "errors": [{ "reason": reason, "domain": "youtube.quota" }]
            }
        })
        .to_string()
    }

    #[test]
    fn test_quota_reasons_on_403() {
        let err = classify_status(403, &google_error(403, "quotaExceeded"), None);
        assert!(matches!(err, CallError::Quota { status: 403, .. }));
    }

    #[test]
    fn test_other_403_is_denied() {
        let err = classify_status(403, &google_error(403, "commentsDisabled"), None);
        assert_eq!(
            err,
            CallError::Rejected {
                kind: RejectKind::Denied,
                status: 403,
                reason: "commentsDisabled".to_string(),
            }
        );
    }

    #[test]
    fn test_429_is_quota_with_retry_after() {
        let err = classify_status(429, "", Some(Duration::from_secs(30)));
        assert_eq!(
            err,
            CallError::Quota {
                status: 429,
                reason: "Too Many Requests".to_string(),
                retry_after: Some(Duration::from_secs(30)),
            }
        );
    }

    #[test]
    fn test_server_errors_are_transient() {
        for status in [500, 502, 503, 504, 408] {
            assert!(matches!(
                classify_status(status, "", None),
                CallError::Transient { .. }
            ));
        }
    }

    #[test]
    fn test_client_errors_are_rejected() {
        assert!(matches!(
            classify_status(404, &google_error(404, "videoNotFound"), None),
            CallError::Rejected {
                kind: RejectKind::NotFound,
                ..
            }
        ));
        assert!(matches!(
            classify_status(400, &google_error(400, "invalidParameter"), None),
            CallError::Rejected {
                kind: RejectKind::BadRequest,
                ..
            }
        ));
    }

    #[test]
    fn test_error_reason_fallbacks() {
        assert_eq!(
            error_reason(r#"{"error": {"status": "RESOURCE_EXHAUSTED"}}"#),
            Some("RESOURCE_EXHAUSTED".to_string())
        );
        assert_eq!(
            error_reason(r#"{"error": {"message": "nope"}}"#),
            Some("nope".to_string())
        );
        assert_eq!(error_reason("not json"), None);
        assert_eq!(error_reason(r#"{"items": []}"#), None);
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(120)));

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_url_includes_params_and_key() {
        let client = Client::new();
        let source = HttpSource::new(client, "https://api.example.com/v3/", "key").unwrap();
        let op = Operation::new("channels").param("forUsername", "some one");

        let url = source.url_for("secret", &op).unwrap();
        assert_eq!(url.path(), "/v3/channels");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("forUsername".to_string(), "some one".to_string()),
                ("key".to_string(), "secret".to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(HttpSource::new(Client::new(), "not a url", "key").is_err());
    }
}
