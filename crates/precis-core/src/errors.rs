use std::time::Duration;

/// Typed error hierarchy for inference backend calls.
/// Classifies errors as transient (retry with backoff) or permanent (propagate immediately).
#[derive(Clone, Debug, thiserror::Error)]
pub enum BackendError {
    // Transient: retried by the reliable wrapper
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("resource exhausted: {message}")]
    ResourceExhausted {
        message: String,
        retry_after: Option<Duration>,
    },

    // Permanent: never retried
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("model error: {0}")]
    Model(String),

    // Terminal: the backoff budget ran out while the backend kept rejecting
    #[error("backoff exhausted after {attempts} attempts ({waited:?} waited): {last}")]
    BackoffExhausted {
        attempts: u32,
        waited: Duration,
        last: Box<BackendError>,
    },
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::ResourceExhausted { .. })
    }

    pub fn suggested_delay(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } | Self::ResourceExhausted { retry_after, .. } => {
                *retry_after
            }
            _ => None,
        }
    }

    /// Attach a server retry hint to a transient error. Other errors are
    /// returned unchanged.
    pub fn with_retry_after(self, hint: Option<Duration>) -> Self {
        match self {
            Self::RateLimited { .. } => Self::RateLimited { retry_after: hint },
            Self::ResourceExhausted { message, .. } => Self::ResourceExhausted {
                message,
                retry_after: hint,
            },
            other => other,
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::ResourceExhausted { .. } => "resource_exhausted",
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::ServerError { .. } => "server_error",
            Self::NetworkError(_) => "network_error",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Model(_) => "model",
            Self::BackoffExhausted { .. } => "backoff_exhausted",
        }
    }

    /// Classify an HTTP status code into the appropriate error variant.
    ///
    /// Quota rejections are reported by some hosts as 429 and by others as a
    /// `RESOURCE_EXHAUSTED` status inside the body; both are transient.
    pub fn from_status(status: u16, body: String) -> Self {
        if body.contains("RESOURCE_EXHAUSTED") {
            return Self::ResourceExhausted {
                message: body,
                retry_after: None,
            };
        }
        match status {
            401 | 403 => Self::AuthenticationFailed(body),
            400 | 404 => Self::InvalidRequest(body),
            429 => Self::RateLimited { retry_after: None },
            500..=599 => Self::ServerError { status, body },
            _ => Self::InvalidRequest(format!("unexpected status {status}: {body}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(BackendError::RateLimited { retry_after: None }.is_transient());
        assert!(BackendError::ResourceExhausted {
            message: "quota".into(),
            retry_after: None
        }
        .is_transient());
    }

    #[test]
    fn permanent_classification() {
        assert!(!BackendError::AuthenticationFailed("bad key".into()).is_transient());
        assert!(!BackendError::InvalidRequest("bad".into()).is_transient());
        assert!(!BackendError::ServerError { status: 500, body: "err".into() }.is_transient());
        assert!(!BackendError::NetworkError("tcp".into()).is_transient());
        assert!(!BackendError::Model("nan".into()).is_transient());
    }

    #[test]
    fn backoff_exhausted_is_terminal() {
        let err = BackendError::BackoffExhausted {
            attempts: 9,
            waited: Duration::from_secs(300),
            last: Box::new(BackendError::RateLimited { retry_after: None }),
        };
        assert!(!err.is_transient());
        assert_eq!(err.error_kind(), "backoff_exhausted");
        assert!(err.to_string().contains("9 attempts"));
    }

    #[test]
    fn suggested_delay_only_for_transient_errors() {
        let rl = BackendError::RateLimited {
            retry_after: Some(Duration::from_secs(5)),
        };
        assert_eq!(rl.suggested_delay(), Some(Duration::from_secs(5)));
        let quota = BackendError::ResourceExhausted {
            message: "q".into(),
            retry_after: Some(Duration::from_secs(9)),
        };
        assert_eq!(quota.suggested_delay(), Some(Duration::from_secs(9)));
        assert_eq!(BackendError::Model("nan".into()).suggested_delay(), None);
    }

    #[test]
    fn retry_hint_attaches_to_both_transient_kinds() {
        let hint = Some(Duration::from_secs(12));
        let quota = BackendError::from_status(429, "RESOURCE_EXHAUSTED".into()).with_retry_after(hint);
        assert_eq!(quota.suggested_delay(), hint);
        assert_eq!(quota.error_kind(), "resource_exhausted");
        let rl = BackendError::from_status(429, String::new()).with_retry_after(hint);
        assert_eq!(rl.suggested_delay(), hint);
        let auth = BackendError::from_status(403, "no".into()).with_retry_after(hint);
        assert_eq!(auth.suggested_delay(), None);
    }

    #[test]
    fn from_status_mapping() {
        assert!(matches!(
            BackendError::from_status(401, "unauthorized".into()),
            BackendError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            BackendError::from_status(400, "bad request".into()),
            BackendError::InvalidRequest(_)
        ));
        assert!(BackendError::from_status(429, "slow down".into()).is_transient());
        assert!(!BackendError::from_status(503, "unavailable".into()).is_transient());
    }

    #[test]
    fn resource_exhausted_body_wins_over_status() {
        let body = r#"{"error":{"code":429,"status":"RESOURCE_EXHAUSTED"}}"#.to_string();
        assert!(matches!(
            BackendError::from_status(429, body),
            BackendError::ResourceExhausted { .. }
        ));
    }
}
