//! Middleware configuration — request/response transformation

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Middleware configuration
///
/// Each middleware has a type and type-specific parameters.
///
/// # Example
///
/// ```toml
/// [middlewares."auth@file"]
/// type = "api-key"
/// header = "X-API-Key"
/// keys = ["secret-key-1", "secret-key-2"]
///
/// [middlewares."strip-api@file"]
/// type = "strip-prefix"
/// prefixes = ["/api"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Middleware type identifier
    #[serde(rename = "type")]
    pub middleware_type: String,

    /// API key header name (for api-key auth)
    #[serde(default)]
    pub header: Option<String>,

    /// API key values (for api-key auth)
    #[serde(default)]
    pub keys: Vec<String>,

    /// Username (for basic-auth)
    #[serde(default)]
    pub username: Option<String>,

    /// Password (for basic-auth)
    #[serde(default)]
    pub password: Option<String>,

    /// Headers to add to the request
    #[serde(default)]
    pub request_headers: HashMap<String, String>,

    /// Headers to add to the response
    #[serde(default)]
    pub response_headers: HashMap<String, String>,

    /// Path prefixes to strip
    #[serde(default)]
    pub prefixes: Vec<String>,

    /// IP allowlist (single addresses or CIDR ranges)
    #[serde(default)]
    pub allowed_ips: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_key_middleware() {
        let toml = r#"
            type = "api-key"
            header = "X-API-Key"
            keys = ["key1", "key2"]
        "#;
        let mw: MiddlewareConfig = toml::from_str(toml).unwrap();
        assert_eq!(mw.middleware_type, "api-key");
        assert_eq!(mw.header.unwrap(), "X-API-Key");
        assert_eq!(mw.keys, vec!["key1", "key2"]);
    }

    #[test]
    fn test_parse_headers_middleware() {
        let toml = r#"
            type = "headers"
            [request_headers]
            X-Forwarded-Proto = "https"
            [response_headers]
            X-Frame-Options = "DENY"
        "#;
        let mw: MiddlewareConfig = toml::from_str(toml).unwrap();
        assert_eq!(mw.request_headers.get("X-Forwarded-Proto").unwrap(), "https");
        assert_eq!(mw.response_headers.get("X-Frame-Options").unwrap(), "DENY");
    }

    #[test]
    fn test_parse_requires_type() {
        let result: std::result::Result<MiddlewareConfig, _> =
            toml::from_str(r#"prefixes = ["/api"]"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults() {
        let mw: MiddlewareConfig = toml::from_str(r#"type = "ip-allow""#).unwrap();
        assert!(mw.header.is_none());
        assert!(mw.keys.is_empty());
        assert!(mw.request_headers.is_empty());
        assert!(mw.prefixes.is_empty());
        assert!(mw.allowed_ips.is_empty());
    }
}
