//! Rule matching engine — ordered route table that dispatches requests
//!
//! Routes are registered with a rule, a priority and a handler, finalized
//! with [`RuleEngine::sort_routes`], then served as a single [`Handler`].

use super::rule::Rule;
use crate::error::{RouterError, Result};
use crate::handler::{error_response, BoxHandler, Handler};
use async_trait::async_trait;
use bytes::Bytes;
use http::{header, Request, Response, StatusCode};
use std::sync::Arc;

/// Route table contract consumed by the router manager
pub trait RuleEngine: Send {
    /// Register a route; fails if the rule cannot be compiled
    fn add_route(&mut self, rule: &str, priority: i64, handler: BoxHandler) -> Result<()>;

    /// Finalize precedence order
    fn sort_routes(&mut self);

    /// Number of registered routes
    fn len(&self) -> usize;

    /// Whether no route is registered
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Turn the finalized table into a request handler
    fn into_handler(self: Box<Self>) -> BoxHandler;
}

/// Creates a fresh engine for every entry point build
pub trait EngineFactory: Send + Sync {
    /// Instantiate an empty engine
    fn new_engine(&self) -> Result<Box<dyn RuleEngine>>;
}

/// Default factory producing [`RuleRouter`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleRouterFactory;

impl EngineFactory for RuleRouterFactory {
    fn new_engine(&self) -> Result<Box<dyn RuleEngine>> {
        Ok(Box::new(RuleRouter::new()))
    }
}

/// A compiled route with pre-parsed rule
struct Route {
    rule_expr: String,
    rule: Rule,
    priority: i64,
    handler: BoxHandler,
}

/// Priority-ordered route table.
///
/// Higher priority is evaluated first. Equal priorities prefer the longer
/// rule expression, then the lexically smaller one.
#[derive(Default)]
pub struct RuleRouter {
    routes: Vec<Route>,
}

impl RuleRouter {
    /// Create an empty route table
    pub fn new() -> Self {
        Self::default()
    }

    /// Rule expressions and priorities in evaluation order
    pub fn routes_info(&self) -> Vec<(String, i64)> {
        self.routes
            .iter()
            .map(|r| (r.rule_expr.clone(), r.priority))
            .collect()
    }

    fn find(&self, req: &Request<Bytes>) -> Option<&Route> {
        let host = request_host(req);
        let path = req.uri().path();
        let method = req.method().as_str();
        self.routes
            .iter()
            .find(|r| r.rule.matches(host, path, method, req.headers()))
    }
}

impl RuleEngine for RuleRouter {
    fn add_route(&mut self, rule: &str, priority: i64, handler: BoxHandler) -> Result<()> {
        let compiled = Rule::parse(rule).map_err(|e| {
            RouterError::RuleRegistration(format!("error while adding rule {}: {}", rule, e))
        })?;

        self.routes.push(Route {
            rule_expr: rule.to_string(),
            rule: compiled,
            priority,
            handler,
        });
        Ok(())
    }

    fn sort_routes(&mut self) {
        self.routes.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.rule_expr.len().cmp(&a.rule_expr.len()))
                .then_with(|| a.rule_expr.cmp(&b.rule_expr))
        });
    }

    fn len(&self) -> usize {
        self.routes.len()
    }

    fn into_handler(self: Box<Self>) -> BoxHandler {
        Arc::new(*self)
    }
}

#[async_trait]
impl Handler for RuleRouter {
    async fn handle(&self, req: Request<Bytes>) -> Response<Bytes> {
        match self.find(&req) {
            Some(route) => route.handler.handle(req).await,
            None => error_response(StatusCode::NOT_FOUND, "No route matched"),
        }
    }
}

/// Host of a request: URI authority first, then the `Host` header
pub(crate) fn request_host(req: &Request<Bytes>) -> Option<&str> {
    req.uri()
        .authority()
        .map(|a| a.as_str())
        .or_else(|| req.headers().get(header::HOST).and_then(|v| v.to_str().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;

    fn named(body: &'static str) -> BoxHandler {
        handler_fn(move |_req| async move { Response::new(Bytes::from(body)) })
    }

    fn request(host: &str, path: &str) -> Request<Bytes> {
        Request::builder()
            .uri(path)
            .header(header::HOST, host)
            .body(Bytes::new())
            .unwrap()
    }

    async fn body_of(handler: &BoxHandler, req: Request<Bytes>) -> (StatusCode, Bytes) {
        let resp = handler.handle(req).await;
        (resp.status(), resp.body().clone())
    }

    #[test]
    fn test_add_route_rejects_bad_rule() {
        let mut router = RuleRouter::new();
        let err = router.add_route("Bogus(`x`)", 0, named("x")).unwrap_err();
        assert!(matches!(err, RouterError::RuleRegistration(_)));
        assert!(router.is_empty());
    }

    #[tokio::test]
    async fn test_higher_priority_wins_regardless_of_order() {
        for order in [[5, 10], [10, 5]] {
            let mut router = RuleRouter::new();
            for priority in order {
                let body = if priority == 10 { "ten" } else { "five" };
                router
                    .add_route("PathPrefix(`/`)", priority, named(body))
                    .unwrap();
            }
            router.sort_routes();
            let handler = Box::new(router).into_handler();
            let (_, body) = body_of(&handler, request("a.com", "/x")).await;
            assert_eq!(body, Bytes::from("ten"));
        }
    }

    #[tokio::test]
    async fn test_no_match_returns_404() {
        let mut router = RuleRouter::new();
        router.add_route("Host(`a.com`)", 0, named("a")).unwrap();
        router.sort_routes();
        let handler = Box::new(router).into_handler();
        let (status, _) = body_of(&handler, request("b.com", "/")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_router_returns_404() {
        let handler = Box::new(RuleRouter::new()).into_handler();
        let (status, body) = body_of(&handler, request("a.com", "/")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(String::from_utf8_lossy(&body).contains("No route matched"));
    }

    #[test]
    fn test_tie_break_longer_rule_first() {
        let mut router = RuleRouter::new();
        router.add_route("PathPrefix(`/`)", 0, named("a")).unwrap();
        router.add_route("PathPrefix(`/api`)", 0, named("b")).unwrap();
        router.add_route("Path(`/z`)", 3, named("c")).unwrap();
        router.sort_routes();

        let order: Vec<String> = router.routes_info().into_iter().map(|(r, _)| r).collect();
        assert_eq!(
            order,
            vec!["Path(`/z`)", "PathPrefix(`/api`)", "PathPrefix(`/`)"]
        );
    }

    #[test]
    fn test_request_host_prefers_authority() {
        let req = Request::builder()
            .uri("http://example.com:8080/x")
            .header(header::HOST, "other.com")
            .body(Bytes::new())
            .unwrap();
        assert_eq!(request_host(&req), Some("example.com:8080"));

        let req = request("header.com", "/x");
        assert_eq!(request_host(&req), Some("header.com"));
    }

    #[test]
    fn test_factory_creates_empty_engine() {
        let engine = RuleRouterFactory.new_engine().unwrap();
        assert_eq!(engine.len(), 0);
    }
}
