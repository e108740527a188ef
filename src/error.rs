//! Error types for each stage of the pipeline.
//!
//! Only [`ConfigError`] is fatal. The others are recovered per row or per
//! batch and reported through `tracing`.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Problems detected before any network activity starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no routing API key: file {path} not found and GMAPS_API_KEY is not set")]
    MissingCredential { path: PathBuf },
    #[error("routing API key in {path} is empty")]
    EmptyCredential { path: PathBuf },
    #[error("input has no `{0}` column")]
    MissingColumn(String),
    #[error("at least one destination address is required")]
    NoDestinations,
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure to retrieve a listing page.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid listing URL `{0}`")]
    InvalidUrl(String),
    #[error("request timed out")]
    Timeout,
    #[error("unexpected status {status}")]
    Status { status: StatusCode },
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e)
        }
    }
}

/// Content was retrieved but cannot be treated as a listing page at all.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExtractError {
    #[error("page content is empty")]
    Empty,
    #[error("page content is not HTML")]
    NotMarkup,
}

/// Failure of one routing-provider batch call.
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("routing request timed out")]
    Timeout,
    #[error("routing provider returned HTTP {0}")]
    Status(StatusCode),
    #[error("failed to parse routing response: {0}")]
    Parse(String),
    #[error("routing provider error {status}: {message}")]
    Provider { status: String, message: String },
    #[error("routing response shape mismatch: {0}")]
    Shape(String),
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
}

impl From<reqwest::Error> for RoutingError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ConfigError::MissingColumn("url".to_string());
        assert!(err.to_string().contains("`url`"));

        let err = FetchError::Status {
            status: StatusCode::FORBIDDEN,
        };
        assert!(err.to_string().contains("403"));

        let err = RoutingError::Provider {
            status: "OVER_QUERY_LIMIT".to_string(),
            message: "slow down".to_string(),
        };
        assert!(err.to_string().contains("OVER_QUERY_LIMIT"));
        assert!(err.to_string().contains("slow down"));
    }
}
