use thiserror::Error;

#[derive(Debug, Error)]
pub enum PmacError {
    #[error("not initialized: run 'pmac init'")]
    NotInitialized,

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("data file {file}: {message}")]
    DataFile { file: String, message: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PmacError>;

/// Failures surfaced by a [`crate::tracker::Tracker`] backend.
///
/// `Auth` is fatal for a whole run. Everything else is caught per entity by
/// the reconcilers and folded into the failed bucket of their summaries.
#[derive(Debug, Clone, Error)]
pub enum TrackerError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("{}", api_message(.message, .status))]
    Api {
        message: String,
        status: Option<u16>,
        response: Option<serde_json::Value>,
    },

    #[error("rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        /// HTTP status the limit was reported with: 429, or 403 for an
        /// exhausted primary quota.
        status: u16,
        /// Unix timestamp at which the limit resets, when the tracker reports one.
        reset_time: Option<i64>,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("gh command failed: {0}")]
    Command(String),

    #[error("unexpected tracker response: {0}")]
    Parse(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("GitHub CLI (gh) not found on PATH")]
    CliNotInstalled,
}

fn api_message(message: &str, status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("GitHub API error: {message} (status {code})"),
        None => format!("GitHub API error: {message}"),
    }
}

impl TrackerError {
    pub fn api(message: impl Into<String>, status: Option<u16>) -> Self {
        TrackerError::Api {
            message: message.into(),
            status,
            response: None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, TrackerError::Auth(_))
    }

    /// Rate limiting is a specialised API failure.
    pub fn is_api(&self) -> bool {
        matches!(
            self,
            TrackerError::Api { .. } | TrackerError::RateLimited { .. }
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TrackerError::RateLimited { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TrackerError::Api { status, .. } => *status,
            TrackerError::RateLimited { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn reset_time(&self) -> Option<i64> {
        match self {
            TrackerError::RateLimited { reset_time, .. } => *reset_time,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_an_api_error() {
        let err = TrackerError::RateLimited {
            message: "slow down".into(),
            status: 429,
            reset_time: Some(1_700_000_000),
        };
        assert!(err.is_api());
        assert!(err.is_rate_limited());
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.reset_time(), Some(1_700_000_000));
    }

    #[test]
    fn rate_limit_keeps_reported_status() {
        let err = TrackerError::RateLimited {
            message: "API rate limit exceeded".into(),
            status: 403,
            reset_time: None,
        };
        assert_eq!(err.status(), Some(403));
        assert!(err.is_rate_limited());
    }

    #[test]
    fn api_error_message_includes_status() {
        let err = TrackerError::api("Validation Failed", Some(422));
        assert_eq!(
            err.to_string(),
            "GitHub API error: Validation Failed (status 422)"
        );
        assert!(!err.is_auth());
    }

    #[test]
    fn tracker_error_converts_into_pmac_error() {
        let err: PmacError = TrackerError::Auth("bad token".into()).into();
        assert!(err.to_string().contains("bad token"));
    }
}
