//! Entrypoint configuration — named network listeners

use serde::{Deserialize, Serialize};

/// Entrypoint configuration — a named HTTP listener
///
/// # Example
///
/// ```toml
/// [entrypoints.web]
/// address = "0.0.0.0:80"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrypointConfig {
    /// Listen address in "host:port" format
    pub address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entrypoint_parse() {
        let ep: EntrypointConfig = toml::from_str(r#"address = "127.0.0.1:8080""#).unwrap();
        assert_eq!(ep.address, "127.0.0.1:8080");
    }

    #[test]
    fn test_entrypoint_requires_address() {
        let result: std::result::Result<EntrypointConfig, _> = toml::from_str("");
        assert!(result.is_err());
    }
}
