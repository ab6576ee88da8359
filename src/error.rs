//! Error types for provider calls and chat requests.
//!
//! Provider error bodies are untrusted. [`classify_upstream`] decodes them
//! into an [`UpstreamFailure`] (quota, a known error envelope, or unknown
//! text) before anything branches on them.

use serde::Deserialize;

/// Seconds a client should wait after all generation models ran out of quota.
pub const QUOTA_RETRY_AFTER_SECS: u64 = 60;

/// Failure talking to the embedding or generation provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("quota exceeded for model {model}: {message}")]
    QuotaExceeded { model: String, message: String },

    #[error("provider returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("stream read failed: {0}")]
    Stream(String),

    #[error("provider request timed out")]
    Timeout,

    #[error("provider request failed: {0}")]
    Http(reqwest::Error),
}

impl ProviderError {
    pub fn is_quota(&self) -> bool {
        matches!(self, ProviderError::QuotaExceeded { .. })
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Http(err)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// A non-2xx provider response, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamFailure {
    /// Usage limits exceeded (HTTP 429, `code: 429`, or `RESOURCE_EXHAUSTED`).
    Quota { message: String },
    /// A well-formed `{"error": {...}}` envelope that is not a quota error.
    Known {
        code: Option<u16>,
        status: Option<String>,
        message: String,
    },
    /// Anything else: the raw body.
    Unknown(String),
}

impl UpstreamFailure {
    pub fn decode(http_status: u16, body: &str) -> Self {
        let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();

        let quota = http_status == 429
            || envelope.as_ref().is_some_and(|e| {
                e.error.code == Some(429) || e.error.status.as_deref() == Some("RESOURCE_EXHAUSTED")
            });

        match envelope {
            Some(e) => {
                let message = e.error.message.unwrap_or_else(|| body.to_string());
                if quota {
                    UpstreamFailure::Quota { message }
                } else {
                    UpstreamFailure::Known {
                        code: e.error.code,
                        status: e.error.status,
                        message,
                    }
                }
            }
            None if quota => UpstreamFailure::Quota {
                message: body.to_string(),
            },
            None => UpstreamFailure::Unknown(body.to_string()),
        }
    }
}

/// Turn a non-2xx provider response into a [`ProviderError`].
pub fn classify_upstream(model: &str, http_status: u16, body: &str) -> ProviderError {
    match UpstreamFailure::decode(http_status, body) {
        UpstreamFailure::Quota { message } => ProviderError::QuotaExceeded {
            model: model.to_string(),
            message,
        },
        UpstreamFailure::Known { message, .. } => ProviderError::Upstream {
            status: http_status,
            message,
        },
        UpstreamFailure::Unknown(message) => ProviderError::Upstream {
            status: http_status,
            message,
        },
    }
}

/// Failure of a single chat request.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("generation quota exhausted on primary and fallback models")]
    QuotaExhausted { retry_after_secs: u64 },

    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error("generation failed: {0}")]
    Generation(#[from] ProviderError),
}
