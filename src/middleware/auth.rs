//! Authentication middleware — API key and Basic Auth

use super::{Middleware, RequestContext};
use crate::config::MiddlewareConfig;
use crate::error::{Result, RouterError};
use crate::handler::error_response;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http::{header, HeaderValue, Response, StatusCode};

const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Authentication middleware
pub struct AuthMiddleware {
    kind: AuthKind,
}

enum AuthKind {
    ApiKey { header: String, keys: Vec<String> },
    BasicAuth { expected: Vec<u8> },
}

impl AuthMiddleware {
    /// Create an API key authentication middleware
    pub fn api_key(config: &MiddlewareConfig) -> Result<Self> {
        if config.keys.is_empty() {
            return Err(RouterError::Middleware(
                "api-key middleware requires at least one key".to_string(),
            ));
        }
        let header = config
            .header
            .clone()
            .unwrap_or_else(|| DEFAULT_API_KEY_HEADER.to_string());
        Ok(Self {
            kind: AuthKind::ApiKey {
                header,
                keys: config.keys.clone(),
            },
        })
    }

    /// Create a Basic Auth middleware
    pub fn basic_auth(config: &MiddlewareConfig) -> Result<Self> {
        let username = config.username.as_deref().ok_or_else(|| {
            RouterError::Middleware("basic-auth middleware requires 'username'".to_string())
        })?;
        let password = config.password.as_deref().ok_or_else(|| {
            RouterError::Middleware("basic-auth middleware requires 'password'".to_string())
        })?;
        Ok(Self {
            kind: AuthKind::BasicAuth {
                expected: format!("{}:{}", username, password).into_bytes(),
            },
        })
    }

    fn unauthorized(message: &str, challenge: bool) -> Response<Bytes> {
        let mut resp = error_response(StatusCode::UNAUTHORIZED, message);
        if challenge {
            resp.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"a3s\""),
            );
        }
        resp
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn handle_request(
        &self,
        req: &mut http::request::Parts,
        ctx: &RequestContext,
    ) -> Result<Option<Response<Bytes>>> {
        match &self.kind {
            AuthKind::ApiKey { header, keys } => {
                let provided = req.headers.get(header.as_str()).and_then(|v| v.to_str().ok());
                match provided {
                    Some(key) if keys.iter().any(|k| k == key) => Ok(None),
                    _ => {
                        tracing::debug!(router = ctx.router.as_str(), "Rejected request without valid API key");
                        Ok(Some(Self::unauthorized("Invalid or missing API key", false)))
                    }
                }
            }
            AuthKind::BasicAuth { expected } => {
                let credentials = req
                    .headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.strip_prefix("Basic "));

                let Some(encoded) = credentials else {
                    return Ok(Some(Self::unauthorized("Missing Authorization header", true)));
                };
                match STANDARD.decode(encoded.trim()) {
                    Ok(decoded) if &decoded == expected => Ok(None),
                    _ => Ok(Some(Self::unauthorized("Invalid credentials", true))),
                }
            }
        }
    }

    fn name(&self) -> &str {
        match self.kind {
            AuthKind::ApiKey { .. } => "api-key",
            AuthKind::BasicAuth { .. } => "basic-auth",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    fn make_ctx() -> RequestContext {
        RequestContext {
            client_ip: Some("127.0.0.1".to_string()),
            entrypoint: "web".to_string(),
            router: "test@file".to_string(),
        }
    }

    fn api_key_config(keys: &[&str]) -> MiddlewareConfig {
        MiddlewareConfig {
            middleware_type: "api-key".to_string(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        }
    }

    fn basic_config(user: Option<&str>, pass: Option<&str>) -> MiddlewareConfig {
        MiddlewareConfig {
            middleware_type: "basic-auth".to_string(),
            username: user.map(String::from),
            password: pass.map(String::from),
            ..Default::default()
        }
    }

    fn parts_with(name: &str, value: &str) -> http::request::Parts {
        Request::builder()
            .header(name, value)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn test_api_key_requires_keys() {
        assert!(AuthMiddleware::api_key(&api_key_config(&[])).is_err());
    }

    #[tokio::test]
    async fn test_api_key_valid() {
        let mw = AuthMiddleware::api_key(&api_key_config(&["secret123"])).unwrap();
        let mut parts = parts_with("X-API-Key", "secret123");
        let result = mw.handle_request(&mut parts, &make_ctx()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_api_key_custom_header() {
        let mut config = api_key_config(&["k"]);
        config.header = Some("X-Token".to_string());
        let mw = AuthMiddleware::api_key(&config).unwrap();

        let mut parts = parts_with("X-Token", "k");
        assert!(mw.handle_request(&mut parts, &make_ctx()).await.unwrap().is_none());

        let mut parts = parts_with("X-API-Key", "k");
        let resp = mw.handle_request(&mut parts, &make_ctx()).await.unwrap().unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_api_key_invalid_or_missing() {
        let mw = AuthMiddleware::api_key(&api_key_config(&["secret123"])).unwrap();

        let mut parts = parts_with("X-API-Key", "wrong-key");
        let resp = mw.handle_request(&mut parts, &make_ctx()).await.unwrap().unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let resp = mw.handle_request(&mut parts, &make_ctx()).await.unwrap().unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn test_basic_auth_requires_credentials() {
        assert!(AuthMiddleware::basic_auth(&basic_config(None, Some("pass"))).is_err());
        assert!(AuthMiddleware::basic_auth(&basic_config(Some("user"), None)).is_err());
    }

    #[tokio::test]
    async fn test_basic_auth_valid() {
        let mw = AuthMiddleware::basic_auth(&basic_config(Some("admin"), Some("secret"))).unwrap();
        // "admin:secret"
        let mut parts = parts_with("Authorization", "Basic YWRtaW46c2VjcmV0");
        assert!(mw.handle_request(&mut parts, &make_ctx()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_basic_auth_invalid() {
        let mw = AuthMiddleware::basic_auth(&basic_config(Some("admin"), Some("secret"))).unwrap();
        // "wrong:creds"
        let mut parts = parts_with("Authorization", "Basic d3Jvbmc6Y3JlZHM=");
        let resp = mw.handle_request(&mut parts, &make_ctx()).await.unwrap().unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().get(header::WWW_AUTHENTICATE).is_some());

        let mut parts = parts_with("Authorization", "Basic !!!not-base64");
        let resp = mw.handle_request(&mut parts, &make_ctx()).await.unwrap().unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_basic_auth_missing_header() {
        let mw = AuthMiddleware::basic_auth(&basic_config(Some("admin"), Some("secret"))).unwrap();
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let resp = mw.handle_request(&mut parts, &make_ctx()).await.unwrap().unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_names() {
        let key = AuthMiddleware::api_key(&api_key_config(&["k"])).unwrap();
        assert_eq!(key.name(), "api-key");
        assert!(!key.modifies_response());
        let basic = AuthMiddleware::basic_auth(&basic_config(Some("u"), Some("p"))).unwrap();
        assert_eq!(basic.name(), "basic-auth");
    }
}
