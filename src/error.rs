//! Centralized error types for the A3S router

use thiserror::Error;

/// Router assembly and forwarding errors
#[derive(Debug, Error)]
pub enum RouterError {
    /// Rule expression rejected by the rule engine
    #[error("Invalid rule: {0}")]
    RuleRegistration(String),

    /// Terminal service handler could not be built
    #[error("Service resolution failed: {0}")]
    ServiceResolution(String),

    /// A referenced middleware could not be constructed
    #[error("Middleware error: {0}")]
    Middleware(String),

    /// Rule engine could not be constructed
    #[error("Rule engine initialization failed: {0}")]
    EngineInit(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No healthy backend could serve the request
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Upstream did not answer in time
    #[error("Upstream timeout after {0}ms")]
    UpstreamTimeout(u64),

    /// HTTP client error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RouterError::RuleRegistration("Unknown matcher: Foo".to_string());
        assert_eq!(err.to_string(), "Invalid rule: Unknown matcher: Foo");

        let err = RouterError::ServiceResolution("service 'svc@file' not found".to_string());
        assert!(err.to_string().contains("svc@file"));

        let err = RouterError::UpstreamTimeout(1500);
        assert_eq!(err.to_string(), "Upstream timeout after 1500ms");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "busy");
        let err: RouterError = io.into();
        assert!(matches!(err, RouterError::Io(_)));
    }
}
