//! Middleware pipeline — composable request/response transformations
//!
//! A router's middleware references resolve into two artifacts:
//! - a [`Chain`] of request-phase decorators, applied in listed order
//!   around the router's tracing and service layers, and
//! - a [`ResponseModifier`] applied inside the service layer, before the
//!   response leaves it.

mod auth;
mod headers;
mod ip_allow;
mod ip_matcher;
mod strip_prefix;

pub use auth::AuthMiddleware;
pub use headers::HeadersMiddleware;
pub use ip_allow::IpAllowMiddleware;
pub use strip_prefix::StripPrefixMiddleware;

use crate::config::MiddlewareConfig;
use crate::context::BuildContext;
use crate::error::{RouterError, Result};
use crate::handler::{error_response, BoxHandler, Chain, ClientAddr, Handler};
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response, StatusCode};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Request context passed through the middleware pipeline
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Client IP address, when the listener recorded one
    pub client_ip: Option<String>,
    /// Entrypoint name
    pub entrypoint: String,
    /// Router name that matched
    pub router: String,
}

/// Middleware trait — process a request and optionally short-circuit
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Process the request. Return Ok(None) to continue the pipeline,
    /// or Ok(Some(response)) to short-circuit with an immediate response.
    async fn handle_request(
        &self,
        req: &mut http::request::Parts,
        ctx: &RequestContext,
    ) -> Result<Option<Response<Bytes>>>;

    /// Rewrite the response (optional, default is pass-through)
    async fn handle_response(&self, _resp: &mut http::response::Parts) -> Result<()> {
        Ok(())
    }

    /// Whether `handle_response` does anything
    fn modifies_response(&self) -> bool {
        false
    }

    /// Middleware name for logging
    fn name(&self) -> &str;
}

/// Resolves qualified middleware names into a request-phase chain
pub trait ChainBuilder: Send + Sync {
    /// Build the chain; unknown or invalid middlewares fail when the
    /// chain is composed
    fn build_chain(&self, ctx: &BuildContext, names: &[String]) -> Chain;
}

/// Resolves qualified middleware names into a response modifier
pub trait ResponseModifierBuilder: Send + Sync {
    /// Build the modifier; never fails, unresolvable entries are skipped
    fn build(&self, ctx: &BuildContext, names: &[String]) -> ResponseModifier;
}

/// Ordered response rewriters applied by the service layer
#[derive(Clone, Default)]
pub struct ResponseModifier {
    modifiers: Vec<Arc<dyn Middleware>>,
}

impl ResponseModifier {
    /// A modifier that leaves responses untouched
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from response-rewriting middlewares, in listed order
    pub fn new(modifiers: Vec<Arc<dyn Middleware>>) -> Self {
        Self { modifiers }
    }

    /// Number of rewriters
    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    /// Whether no rewriter is configured
    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }

    /// Apply every rewriter, innermost middleware first
    pub async fn apply(&self, resp: Response<Bytes>) -> Response<Bytes> {
        if self.modifiers.is_empty() {
            return resp;
        }
        let (mut parts, body) = resp.into_parts();
        for modifier in self.modifiers.iter().rev() {
            if let Err(e) = modifier.handle_response(&mut parts).await {
                tracing::warn!(middleware = modifier.name(), error = %e, "Response modifier error");
            }
        }
        Response::from_parts(parts, body)
    }
}

impl fmt::Debug for ResponseModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.modifiers.iter().map(|m| m.name()).collect();
        f.debug_struct("ResponseModifier").field("modifiers", &names).finish()
    }
}

/// Handler running one middleware in front of the next handler
struct MiddlewareHandler {
    middleware: Arc<dyn Middleware>,
    next: BoxHandler,
    entrypoint: String,
    router: String,
}

#[async_trait]
impl Handler for MiddlewareHandler {
    async fn handle(&self, req: Request<Bytes>) -> Response<Bytes> {
        let (mut parts, body) = req.into_parts();
        let ctx = RequestContext {
            client_ip: parts
                .extensions
                .get::<ClientAddr>()
                .map(|addr| addr.0.ip().to_string()),
            entrypoint: self.entrypoint.clone(),
            router: self.router.clone(),
        };

        match self.middleware.handle_request(&mut parts, &ctx).await {
            Ok(None) => self.next.handle(Request::from_parts(parts, body)).await,
            Ok(Some(response)) => {
                tracing::debug!(middleware = self.middleware.name(), "Middleware short-circuited request");
                response
            }
            Err(e) => {
                tracing::error!(middleware = self.middleware.name(), error = %e, "Middleware error");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Middleware error")
            }
        }
    }
}

/// Middleware definitions keyed by qualified name
#[derive(Debug, Clone, Default)]
pub struct MiddlewareRegistry {
    configs: HashMap<String, MiddlewareConfig>,
}

impl MiddlewareRegistry {
    /// Create a registry from middleware configurations
    pub fn new(configs: HashMap<String, MiddlewareConfig>) -> Self {
        Self { configs }
    }

    /// Number of registered definitions
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Instantiate a middleware by qualified name
    pub fn create(&self, name: &str) -> Result<Arc<dyn Middleware>> {
        let config = self.configs.get(name).ok_or_else(|| {
            RouterError::Middleware(format!("middleware \"{}\" does not exist", name))
        })?;

        let mw: Arc<dyn Middleware> = match config.middleware_type.as_str() {
            "api-key" => Arc::new(AuthMiddleware::api_key(config)?),
            "basic-auth" => Arc::new(AuthMiddleware::basic_auth(config)?),
            "headers" => Arc::new(HeadersMiddleware::new(config)),
            "strip-prefix" => Arc::new(StripPrefixMiddleware::new(config)),
            "ip-allow" => Arc::new(IpAllowMiddleware::new(config)?),
            other => {
                return Err(RouterError::Middleware(format!(
                    "middleware \"{}\": unknown type '{}'",
                    name, other
                )));
            }
        };
        Ok(mw)
    }
}

impl ChainBuilder for MiddlewareRegistry {
    fn build_chain(&self, ctx: &BuildContext, names: &[String]) -> Chain {
        let entrypoint = ctx.entry_point().unwrap_or_default().to_string();
        let router = ctx.router().unwrap_or_default().to_string();

        names.iter().fold(Chain::new(), |chain, name| {
            let created = self.create(name);
            let entrypoint = entrypoint.clone();
            let router = router.clone();
            chain.append(move |next| {
                let middleware = created?;
                Ok(Arc::new(MiddlewareHandler {
                    middleware,
                    next,
                    entrypoint,
                    router,
                }) as BoxHandler)
            })
        })
    }
}

impl ResponseModifierBuilder for MiddlewareRegistry {
    fn build(&self, ctx: &BuildContext, names: &[String]) -> ResponseModifier {
        let mut modifiers = Vec::new();
        for name in names {
            match self.create(name) {
                Ok(mw) if mw.modifies_response() => modifiers.push(mw),
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(
                        router = ctx.router().unwrap_or("-"),
                        middleware = name.as_str(),
                        error = %e,
                        "Skipping response modifier"
                    );
                }
            }
        }
        ResponseModifier::new(modifiers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;

    fn registry() -> MiddlewareRegistry {
        let mut configs = HashMap::new();
        configs.insert(
            "auth@file".to_string(),
            MiddlewareConfig {
                middleware_type: "api-key".to_string(),
                keys: vec!["file-key".to_string()],
                ..Default::default()
            },
        );
        configs.insert(
            "auth@docker".to_string(),
            MiddlewareConfig {
                middleware_type: "api-key".to_string(),
                keys: vec!["docker-key".to_string()],
                ..Default::default()
            },
        );
        configs.insert(
            "secure@file".to_string(),
            MiddlewareConfig {
                middleware_type: "headers".to_string(),
                response_headers: HashMap::from([(
                    "X-Frame-Options".to_string(),
                    "DENY".to_string(),
                )]),
                ..Default::default()
            },
        );
        configs.insert(
            "weird@file".to_string(),
            MiddlewareConfig {
                middleware_type: "teleport".to_string(),
                ..Default::default()
            },
        );
        MiddlewareRegistry::new(configs)
    }

    fn ok_handler() -> BoxHandler {
        handler_fn(|_req| async { Response::new(Bytes::from("ok")) })
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn with_key(key: &str) -> Request<Bytes> {
        Request::builder()
            .uri("/")
            .header("X-API-Key", key)
            .body(Bytes::new())
            .unwrap()
    }

    #[test]
    fn test_create_unknown_name() {
        let err = registry().create("missing@file").err().unwrap();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_create_unknown_type() {
        let err = registry().create("weird@file").err().unwrap();
        assert!(err.to_string().contains("unknown type"));
    }

    #[tokio::test]
    async fn test_chain_resolves_qualified_names_distinctly() {
        let reg = registry();
        let ctx = BuildContext::new().with_entry_point("web");

        let file = reg
            .build_chain(&ctx, &names(&["auth@file"]))
            .then(ok_handler())
            .unwrap();
        let docker = reg
            .build_chain(&ctx, &names(&["auth@docker"]))
            .then(ok_handler())
            .unwrap();

        assert_eq!(file.handle(with_key("file-key")).await.status(), StatusCode::OK);
        assert_eq!(
            file.handle(with_key("docker-key")).await.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(docker.handle(with_key("docker-key")).await.status(), StatusCode::OK);
        assert_eq!(
            docker.handle(with_key("file-key")).await.status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_chain_with_unknown_middleware_fails_on_compose() {
        let reg = registry();
        let chain = reg.build_chain(&BuildContext::new(), &names(&["auth@file", "missing@file"]));
        assert_eq!(chain.len(), 2);
        let err = chain.then(ok_handler()).err().unwrap();
        assert!(matches!(err, RouterError::Middleware(_)));
    }

    #[test]
    fn test_response_modifier_only_keeps_rewriters() {
        let reg = registry();
        let modifier = reg.build(
            &BuildContext::new(),
            &names(&["auth@file", "secure@file", "missing@file"]),
        );
        assert_eq!(modifier.len(), 1);
    }

    #[tokio::test]
    async fn test_response_modifier_apply() {
        let reg = registry();
        let modifier = reg.build(&BuildContext::new(), &names(&["secure@file"]));
        let resp = modifier.apply(Response::new(Bytes::from("body"))).await;
        assert_eq!(resp.headers().get("X-Frame-Options").unwrap(), "DENY");
        assert_eq!(resp.body(), &Bytes::from("body"));
    }

    #[tokio::test]
    async fn test_empty_modifier_passthrough() {
        let modifier = ResponseModifier::empty();
        assert!(modifier.is_empty());
        let resp = modifier.apply(Response::new(Bytes::from("x"))).await;
        assert!(resp.headers().is_empty());
    }

    #[test]
    fn test_registry_len() {
        assert_eq!(registry().len(), 4);
        assert!(MiddlewareRegistry::default().is_empty());
    }
}
