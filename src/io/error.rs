//! Lookup error taxonomy shared by the registry and geocoding clients

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LookupError {
    /// Query was empty after sanitization
    #[error("Please provide a company name.")]
    EmptyQuery,

    /// A required credential is not configured
    #[error("{0} missing")]
    MissingCredential(&'static str),

    /// A configured value (usually a base URL) is unusable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Upstream answered with a non-success status. `detail` is the `error`
    /// field of a JSON reply body, when there was one.
    #[error("{endpoint} lookup failed (HTTP {status})")]
    Status { endpoint: &'static str, status: u16, detail: Option<String> },

    /// Transport failure: connect, timeout, body read
    #[error("{endpoint} unreachable: {message}")]
    Network { endpoint: &'static str, message: String },

    /// Reply parsed but did not have the expected shape
    #[error("unexpected {endpoint} response: {message}")]
    Shape { endpoint: &'static str, message: String },

    /// Upstream explicitly reported no match
    #[error("{0}")]
    NoMatch(String),
}

impl LookupError {
    pub fn status(endpoint: &'static str, status: u16) -> Self {
        LookupError::Status { endpoint, status, detail: None }
    }

    pub fn network(endpoint: &'static str, error: reqwest::Error) -> Self {
        // without_url keeps tokens carried in query strings out of messages and logs
        LookupError::Network { endpoint, message: error.without_url().to_string() }
    }

    pub fn shape(endpoint: &'static str, message: impl Into<String>) -> Self {
        LookupError::Shape { endpoint, message: message.into() }
    }

    /// HTTP, transport and response-shape failures
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            LookupError::Status { .. } | LookupError::Network { .. } | LookupError::Shape { .. }
        )
    }

    /// Missing credential or unusable configuration
    pub fn is_config(&self) -> bool {
        matches!(self, LookupError::MissingCredential(_) | LookupError::InvalidConfig(_))
    }

    pub fn is_no_match(&self) -> bool {
        matches!(self, LookupError::NoMatch(_))
    }

    /// Short snake_case label for structured logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            LookupError::EmptyQuery => "empty_query",
            LookupError::MissingCredential(_) => "missing_credential",
            LookupError::InvalidConfig(_) => "invalid_config",
            LookupError::Status { .. } => "status",
            LookupError::Network { .. } => "network",
            LookupError::Shape { .. } => "shape",
            LookupError::NoMatch(_) => "no_match",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let status = LookupError::status("abr_match", 503);
        assert!(status.is_upstream());
        assert!(!status.is_config());
        assert_eq!(status.to_string(), "abr_match lookup failed (HTTP 503)");

        let missing = LookupError::MissingCredential("ABR_GUID");
        assert!(missing.is_config());
        assert_eq!(missing.to_string(), "ABR_GUID missing");

        let none = LookupError::NoMatch("No matching company found.".to_string());
        assert!(none.is_no_match());
        assert!(!none.is_upstream());
        assert_eq!(none.kind(), "no_match");
    }
}
