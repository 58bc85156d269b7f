//! Configuration types for the A3S router
//!
//! Follows Traefik's entrypoint → router → middleware → service model.
//! [`GatewayConfig`] is the declarative file format (TOML);
//! [`RuntimeConfiguration`] is the runtime view the router manager builds
//! from, including per-router build diagnostics.

mod entrypoint;
mod middleware;
mod router;
mod service;

pub use entrypoint::EntrypointConfig;
pub use middleware::MiddlewareConfig;
pub use router::{RouterConfig, RouterInfo, RouterStatus, RouterTlsConfig};
pub use service::{HealthCheckConfig, LoadBalancerConfig, ServerConfig, ServiceConfig, Strategy};

use crate::context::{make_qualified_name, PROVIDER_SEPARATOR};
use crate::error::{RouterError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::path::Path;

/// Top-level declarative configuration
///
/// # Example
///
/// ```toml
/// [entrypoints.web]
/// address = "0.0.0.0:80"
///
/// [routers.api]
/// rule = "PathPrefix(`/api`)"
/// service = "backend"
///
/// [services.backend.load_balancer]
/// strategy = "round-robin"
/// [[services.backend.load_balancer.servers]]
/// url = "http://127.0.0.1:8001"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Entrypoints: named listeners (e.g., "web" → 0.0.0.0:80)
    #[serde(default)]
    pub entrypoints: HashMap<String, EntrypointConfig>,

    /// Routers: named routing rules
    #[serde(default)]
    pub routers: HashMap<String, RouterConfig>,

    /// Services: named upstream backends
    #[serde(default)]
    pub services: HashMap<String, ServiceConfig>,

    /// Middlewares: named middleware configurations
    #[serde(default)]
    pub middlewares: HashMap<String, MiddlewareConfig>,
}

impl GatewayConfig {
    /// Load configuration from a TOML file
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            RouterError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RouterError::Config(format!("Failed to parse TOML config: {}", e)))
    }

    /// Qualify every bare router, service and middleware name with `provider`.
    ///
    /// Names that already carry a provider are left alone.
    pub fn with_provider(self, provider: &str) -> Self {
        fn qualify<V>(map: HashMap<String, V>, provider: &str) -> HashMap<String, V> {
            map.into_iter()
                .map(|(name, value)| {
                    if name.contains(PROVIDER_SEPARATOR) {
                        (name, value)
                    } else {
                        (make_qualified_name(provider, &name), value)
                    }
                })
                .collect()
        }

        Self {
            entrypoints: self.entrypoints,
            routers: qualify(self.routers, provider),
            services: qualify(self.services, provider),
            middlewares: qualify(self.middlewares, provider),
        }
    }

    /// Validate structural consistency.
    ///
    /// Router-level problems (unknown service, bad rule, unknown
    /// middleware) are not errors here: they only disable the offending
    /// router at build time.
    pub fn validate(&self) -> Result<()> {
        for (name, ep) in &self.entrypoints {
            ep.address.parse::<SocketAddr>().map_err(|e| {
                RouterError::Config(format!(
                    "Invalid address '{}' for entrypoint '{}': {}",
                    ep.address, name, e
                ))
            })?;
        }

        for (name, svc) in &self.services {
            if svc.load_balancer.servers.is_empty() {
                return Err(RouterError::Config(format!(
                    "Service '{}' has no servers configured",
                    name
                )));
            }
            if let Some(hc) = &svc.load_balancer.health_check {
                if hc.interval_duration().is_none() {
                    return Err(RouterError::Config(format!(
                        "Invalid health check interval '{}' for service '{}'",
                        hc.interval, name
                    )));
                }
                if hc.timeout_duration().is_none() {
                    return Err(RouterError::Config(format!(
                        "Invalid health check timeout '{}' for service '{}'",
                        hc.timeout, name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Names of all configured entrypoints, sorted
    pub fn entrypoint_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entrypoints.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Runtime router table with build diagnostics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfiguration {
    /// Routers by (qualified) name
    pub routers: BTreeMap<String, RouterInfo>,
}

impl RuntimeConfiguration {
    /// Create a runtime configuration from router declarations
    pub fn new<I>(routers: I) -> Self
    where
        I: IntoIterator<Item = (String, RouterConfig)>,
    {
        Self {
            routers: routers
                .into_iter()
                .map(|(name, config)| (name, RouterInfo::new(config)))
                .collect(),
        }
    }

    /// Runtime view of a declarative configuration
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.routers.clone())
    }

    /// Group routers by the requested entrypoints.
    ///
    /// With `tls_only` set, only routers carrying a TLS section are
    /// returned; otherwise only routers without one. A router with no
    /// explicit entrypoints is attached to every requested entrypoint.
    pub fn routers_by_entrypoints(
        &self,
        entry_points: &[String],
        tls_only: bool,
    ) -> HashMap<String, HashMap<String, RouterConfig>> {
        let mut grouped: HashMap<String, HashMap<String, RouterConfig>> = HashMap::new();

        for (name, info) in &self.routers {
            if tls_only != info.config.tls.is_some() {
                continue;
            }

            let targets = if info.config.entrypoints.is_empty() {
                entry_points
            } else {
                info.config.entrypoints.as_slice()
            };

            for ep in targets {
                if !entry_points.contains(ep) {
                    tracing::error!(
                        entry_point = ep.as_str(),
                        router = name.as_str(),
                        "Entrypoint does not exist"
                    );
                    continue;
                }
                grouped
                    .entry(ep.clone())
                    .or_default()
                    .insert(name.clone(), info.config.clone());
            }
        }

        grouped
    }

    /// Look up a router's runtime info
    pub fn router_info(&self, name: &str) -> Option<&RouterInfo> {
        self.routers.get(name)
    }

    /// Record a build error on a router (first error per cycle wins)
    pub fn record_router_error(&mut self, name: &str, cycle: u64, message: &str) -> bool {
        match self.routers.get_mut(name) {
            Some(info) => info.record_error(cycle, message),
            None => false,
        }
    }

    /// Mark a router as serving traffic for this cycle
    pub fn mark_router_enabled(&mut self, name: &str, cycle: u64) {
        if let Some(info) = self.routers.get_mut(name) {
            info.mark_enabled(cycle);
        }
    }
}
