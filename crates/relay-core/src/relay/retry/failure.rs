//! Classification of a failed upstream attempt.

use gemini_relay_types::RelayError;

/// Mutually exclusive failure classes, checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// 503 / 504 / 408: retry the same key after backoff
    Transient,
    /// Client-side deadline elapsed
    Timeout,
    /// 429
    RateLimit,
    /// 400: bad request or unknown model
    ModelError,
    /// Anything else, including transport and decode failures
    Unexpected,
}

impl FailureClass {
    pub fn from_status(status: u16) -> Self {
        match status {
            503 | 504 | 408 => Self::Transient,
            429 => Self::RateLimit,
            400 => Self::ModelError,
            _ => Self::Unexpected,
        }
    }

    /// Classify a transport error that carries no HTTP status.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16());
        }
        if err.is_timeout() {
            return Self::Timeout;
        }
        Self::Unexpected
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Timeout => "timeout",
            Self::RateLimit => "rate_limit",
            Self::ModelError => "model_error",
            Self::Unexpected => "unexpected",
        }
    }
}

/// One failed attempt against one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamFailure {
    pub class: FailureClass,
    pub status: Option<u16>,
    /// Sanitized detail for logs; never contains the key
    pub detail: String,
    /// Set when the stream could not be decoded
    pub malformed: bool,
}

impl UpstreamFailure {
    pub fn http(status: u16, detail: impl Into<String>) -> Self {
        Self {
            class: FailureClass::from_status(status),
            status: Some(status),
            detail: detail.into(),
            malformed: false,
        }
    }

    pub fn transport(err: reqwest::Error) -> Self {
        let class = FailureClass::from_transport(&err);
        let status = err.status().map(|s| s.as_u16());
        // The URL may carry an upload session id
        let detail = err.without_url().to_string();
        Self { class, status, detail, malformed: false }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self { class: FailureClass::Unexpected, status: None, detail: detail.into(), malformed: true }
    }

    /// Typed error recorded in the request's failure history.
    pub fn to_relay_error(&self, model: &str) -> RelayError {
        let model = model.to_string();
        if self.malformed {
            return RelayError::Parse { message: self.detail.clone() };
        }
        match self.class {
            FailureClass::Transient => {
                RelayError::TransientNetwork { model, status: self.status.unwrap_or(503) }
            },
            FailureClass::Timeout => RelayError::Timeout { model },
            FailureClass::RateLimit => RelayError::RateLimited { model },
            FailureClass::ModelError => RelayError::ModelRequest { model },
            FailureClass::Unexpected => {
                let message = match self.status {
                    Some(status) => format!("HTTP {}: {}", status, self.detail),
                    None => self.detail.clone(),
                };
                RelayError::Unexpected { model, message }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(FailureClass::from_status(503), FailureClass::Transient);
        assert_eq!(FailureClass::from_status(504), FailureClass::Transient);
        assert_eq!(FailureClass::from_status(408), FailureClass::Transient);
        assert_eq!(FailureClass::from_status(429), FailureClass::RateLimit);
        assert_eq!(FailureClass::from_status(400), FailureClass::ModelError);
        assert_eq!(FailureClass::from_status(500), FailureClass::Unexpected);
        assert_eq!(FailureClass::from_status(403), FailureClass::Unexpected);
    }

    #[test]
    fn test_relay_error_mapping() {
        let err = UpstreamFailure::http(429, "quota").to_relay_error("gemini-pro");
        assert_eq!(err, RelayError::RateLimited { model: "gemini-pro".into() });
        assert!(err.is_rate_limit());

        let err = UpstreamFailure::http(500, "boom").to_relay_error("m");
        assert_eq!(err.to_string(), "Model m request failed: HTTP 500: boom");

        let err = UpstreamFailure::malformed("bad json").to_relay_error("m");
        assert_eq!(err.kind(), "parse");
    }
}
