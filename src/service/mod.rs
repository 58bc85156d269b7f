//! Service layer — service resolution, load balancing and health checking
//!
//! A router's service reference resolves into a terminal handler that
//! picks a healthy backend, forwards the request and runs the router's
//! response modifier on the upstream response.

mod health_check;
mod load_balancer;
mod proxy;

pub use health_check::HealthChecker;
pub use load_balancer::{Backend, LoadBalancer};
pub use proxy::HttpProxy;

use crate::config::ServiceConfig;
use crate::context::BuildContext;
use crate::error::{Result, RouterError};
use crate::handler::{error_response, BoxHandler, Handler};
use crate::middleware::ResponseModifier;
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response, StatusCode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::task::JoinHandle;

/// Resolves service references into terminal handlers
pub trait ServiceResolver: Send + Sync {
    /// Build the handler forwarding to `service`; `modifier` rewrites
    /// upstream responses before they leave the service layer
    fn build_http(
        &self,
        ctx: &BuildContext,
        service: &str,
        modifier: ResponseModifier,
    ) -> Result<BoxHandler>;

    /// Start background health checking; returns immediately
    fn launch_health_check(&self);
}

/// Default service resolver backed by configured load balancers
pub struct ServiceManager {
    configs: HashMap<String, ServiceConfig>,
    balancers: RwLock<HashMap<String, Arc<LoadBalancer>>>,
    proxy: Arc<HttpProxy>,
    health_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ServiceManager {
    /// Create a manager from service configurations keyed by qualified name
    pub fn new(configs: HashMap<String, ServiceConfig>) -> Self {
        Self {
            configs,
            balancers: RwLock::new(HashMap::new()),
            proxy: Arc::new(HttpProxy::new()),
            health_tasks: Mutex::new(Vec::new()),
        }
    }

    /// Use a specific proxy client
    pub fn with_proxy(mut self, proxy: HttpProxy) -> Self {
        self.proxy = Arc::new(proxy);
        self
    }

    /// Load balancer already created for a qualified service name
    pub fn load_balancer(&self, name: &str) -> Option<Arc<LoadBalancer>> {
        self.balancers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Number of health checkers started by the last launch
    pub fn health_check_count(&self) -> usize {
        self.health_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn balancer_for(&self, name: &str) -> Result<Arc<LoadBalancer>> {
        if let Some(lb) = self.load_balancer(name) {
            return Ok(lb);
        }

        let config = self.configs.get(name).ok_or_else(|| {
            RouterError::ServiceResolution(format!("the service \"{}\" does not exist", name))
        })?;
        if config.load_balancer.servers.is_empty() {
            return Err(RouterError::ServiceResolution(format!(
                "the service \"{}\" has no servers",
                name
            )));
        }

        let mut balancers = self.balancers.write().unwrap_or_else(PoisonError::into_inner);
        let lb = balancers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(service = name, "Creating load balancer");
                Arc::new(LoadBalancer::new(
                    name,
                    config.load_balancer.strategy.clone(),
                    &config.load_balancer.servers,
                ))
            })
            .clone();
        Ok(lb)
    }
}

impl ServiceResolver for ServiceManager {
    fn build_http(
        &self,
        ctx: &BuildContext,
        service: &str,
        modifier: ResponseModifier,
    ) -> Result<BoxHandler> {
        let name = ctx.qualified_name(service);
        let lb = self.balancer_for(&name)?;
        Ok(Arc::new(ServiceHandler {
            lb,
            proxy: self.proxy.clone(),
            modifier,
        }))
    }

    fn launch_health_check(&self) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("No async runtime available, health checks not started");
                return;
            }
        };

        let mut tasks = self.health_tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }

        let balancers = self.balancers.read().unwrap_or_else(PoisonError::into_inner);
        for (name, lb) in balancers.iter() {
            let Some(hc) = self
                .configs
                .get(name)
                .and_then(|c| c.load_balancer.health_check.as_ref())
            else {
                continue;
            };
            let checker = HealthChecker::new(lb.clone(), hc);
            tasks.push(runtime.spawn(checker.run()));
            tracing::info!(service = name.as_str(), path = hc.path.as_str(), "Started health checker");
        }
    }
}

impl Drop for ServiceManager {
    fn drop(&mut self) {
        let tasks = self.health_tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

/// Terminal handler: backend selection, forwarding, response rewriting
struct ServiceHandler {
    lb: Arc<LoadBalancer>,
    proxy: Arc<HttpProxy>,
    modifier: ResponseModifier,
}

#[async_trait]
impl Handler for ServiceHandler {
    async fn handle(&self, req: Request<Bytes>) -> Response<Bytes> {
        let Some(backend) = self.lb.next_backend() else {
            tracing::warn!(service = self.lb.name.as_str(), "No healthy backend available");
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "No healthy backend available");
        };

        let (parts, body) = req.into_parts();
        match self.proxy.forward(&backend, &parts, body).await {
            Ok(resp) => self.modifier.apply(resp).await,
            Err(e) => {
                tracing::warn!(
                    service = self.lb.name.as_str(),
                    backend = backend.url.as_str(),
                    error = %e,
                    "Upstream request failed"
                );
                match e {
                    RouterError::UpstreamTimeout(_) => {
                        error_response(StatusCode::GATEWAY_TIMEOUT, "Gateway Timeout")
                    }
                    _ => error_response(StatusCode::BAD_GATEWAY, "Bad Gateway"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        HealthCheckConfig, LoadBalancerConfig, MiddlewareConfig, ServerConfig, Strategy,
    };
    use crate::middleware::{HeadersMiddleware, Middleware};

    fn service(urls: &[&str], health: bool) -> ServiceConfig {
        ServiceConfig {
            load_balancer: LoadBalancerConfig {
                strategy: Strategy::RoundRobin,
                servers: urls
                    .iter()
                    .map(|url| ServerConfig {
                        url: url.to_string(),
                        weight: 1,
                    })
                    .collect(),
                health_check: health.then(|| HealthCheckConfig {
                    path: "/health".to_string(),
                    interval: "10s".to_string(),
                    timeout: "1s".to_string(),
                    unhealthy_threshold: 3,
                    healthy_threshold: 1,
                }),
            },
        }
    }

    fn manager() -> ServiceManager {
        let mut configs = HashMap::new();
        configs.insert("api@file".to_string(), service(&["http://127.0.0.1:9"], true));
        configs.insert("web@file".to_string(), service(&["http://127.0.0.1:9"], false));
        configs.insert("api@docker".to_string(), service(&["http://127.0.0.1:9"], false));
        configs.insert("empty@file".to_string(), service(&[], false));
        ServiceManager::new(configs)
    }

    fn router_ctx(router: &str) -> BuildContext {
        BuildContext::new().with_entry_point("web").with_router(router)
    }

    #[test]
    fn test_unknown_service_fails() {
        let err = manager()
            .build_http(&router_ctx("r@file"), "missing", ResponseModifier::empty())
            .err()
            .unwrap();
        assert!(matches!(err, RouterError::ServiceResolution(_)));
        assert!(err.to_string().contains("missing@file"));
    }

    #[test]
    fn test_service_without_servers_fails() {
        let err = manager()
            .build_http(&router_ctx("r@file"), "empty", ResponseModifier::empty())
            .err()
            .unwrap();
        assert!(err.to_string().contains("no servers"));
    }

    #[test]
    fn test_service_name_qualified_with_router_provider() {
        let mgr = manager();
        mgr.build_http(&router_ctx("r@docker"), "api", ResponseModifier::empty())
            .unwrap();
        assert!(mgr.load_balancer("api@docker").is_some());
        assert!(mgr.load_balancer("api@file").is_none());

        mgr.build_http(&router_ctx("r@docker"), "api@file", ResponseModifier::empty())
            .unwrap();
        assert!(mgr.load_balancer("api@file").is_some());
    }

    #[test]
    fn test_load_balancer_shared_between_routers() {
        let mgr = manager();
        mgr.build_http(&router_ctx("a@file"), "api", ResponseModifier::empty())
            .unwrap();
        let first = mgr.load_balancer("api@file").unwrap();
        mgr.build_http(&router_ctx("b@file"), "api", ResponseModifier::empty())
            .unwrap();
        assert!(Arc::ptr_eq(&first, &mgr.load_balancer("api@file").unwrap()));
    }

    #[tokio::test]
    async fn test_no_healthy_backend_returns_503() {
        let mgr = manager();
        let handler = mgr
            .build_http(&router_ctx("r@file"), "web", ResponseModifier::empty())
            .unwrap();
        mgr.load_balancer("web@file").unwrap().backends()[0].set_healthy(false);

        let resp = handler.handle(Request::new(Bytes::new())).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_local_errors_skip_response_modifier() {
        let tag = MiddlewareConfig {
            middleware_type: "headers".to_string(),
            response_headers: HashMap::from([("x-served-by".to_string(), "a3s".to_string())]),
            ..Default::default()
        };
        let modifier = ResponseModifier::new(vec![Arc::new(HeadersMiddleware::new(&tag)) as Arc<dyn Middleware>]);

        let mgr = manager();
        let handler = mgr
            .build_http(&router_ctx("r@file"), "web", modifier)
            .unwrap();
        let lb = mgr.load_balancer("web@file").unwrap();
        let backend = &lb.backends()[0];

        backend.set_healthy(false);
        let resp = handler.handle(Request::new(Bytes::new())).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(resp.headers().get("x-served-by").is_none());

        // Port 9 refuses connections: a local 502
        backend.set_healthy(true);
        let resp = handler.handle(Request::new(Bytes::new())).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert!(resp.headers().get("x-served-by").is_none());
    }

    #[tokio::test]
    async fn test_launch_health_check_only_for_configured_services() {
        let mgr = manager();
        for svc in ["api", "web"] {
            mgr.build_http(&router_ctx("r@file"), svc, ResponseModifier::empty())
                .unwrap();
        }
        mgr.launch_health_check();
        assert_eq!(mgr.health_check_count(), 1);

        // Relaunch replaces the previous generation
        mgr.launch_health_check();
        assert_eq!(mgr.health_check_count(), 1);
    }

    #[test]
    fn test_launch_without_runtime_is_skipped() {
        let mgr = manager();
        mgr.build_http(&router_ctx("r@file"), "api", ResponseModifier::empty())
            .unwrap();
        mgr.launch_health_check();
        assert_eq!(mgr.health_check_count(), 0);
    }
}
