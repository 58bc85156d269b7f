//! Router configuration — request matching rules

use serde::{Deserialize, Serialize};
use std::fmt;

/// Router configuration — matches requests to services
///
/// # Example
///
/// ```toml
/// [routers."api@file"]
/// rule = "Host(`api.example.com`) && PathPrefix(`/v1`)"
/// service = "api-backend"
/// entrypoints = ["web"]
/// middlewares = ["auth", "strip-v1"]
/// priority = 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Matching rule expression (Traefik-style)
    ///
    /// Supported matchers:
    /// - `Host(`domain`)` — match by hostname
    /// - `PathPrefix(`/path`)` — match by path prefix
    /// - `Path(`/exact`)` — match exact path
    /// - `Headers(`key`, `value`)` — match by header
    /// - `Method(`GET`)` — match by HTTP method
    /// - `&&` / `||` — combine matchers
    pub rule: String,

    /// Target service name
    pub service: String,

    /// Entrypoints this router listens on (empty = all requested)
    #[serde(default)]
    pub entrypoints: Vec<String>,

    /// Middleware chain to apply (in order)
    #[serde(default)]
    pub middlewares: Vec<String>,

    /// Priority (higher = evaluated first, default = 0)
    #[serde(default)]
    pub priority: i64,

    /// Marks the router as TLS-only; termination itself happens upstream
    #[serde(default)]
    pub tls: Option<RouterTlsConfig>,
}

/// TLS section of a router
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterTlsConfig {
    /// Certificate resolver name, passed through untouched
    #[serde(default)]
    pub cert_resolver: Option<String>,
}

/// Build status of a router in the current runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RouterStatus {
    /// Not built yet
    #[default]
    Pending,
    /// Serving traffic
    Enabled,
    /// Excluded from dispatch after a build error
    Disabled,
}

impl fmt::Display for RouterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// Runtime view of a router: its configuration plus build diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterInfo {
    /// Declared configuration
    #[serde(flatten)]
    pub config: RouterConfig,

    /// Last build error; kept until overwritten by a later cycle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,

    /// Build status
    #[serde(default)]
    pub status: RouterStatus,

    /// Build cycle in which `err` was written
    #[serde(skip)]
    err_cycle: Option<u64>,
}

impl RouterInfo {
    /// Wrap a router configuration
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config,
            err: None,
            status: RouterStatus::Pending,
            err_cycle: None,
        }
    }

    /// Record a build error. Only the first error of a given build cycle
    /// is kept; returns whether it was written.
    pub fn record_error(&mut self, cycle: u64, message: impl Into<String>) -> bool {
        if self.err_cycle == Some(cycle) {
            return false;
        }
        self.err = Some(message.into());
        self.err_cycle = Some(cycle);
        self.status = RouterStatus::Disabled;
        true
    }

    /// Mark the router as serving, unless it already failed this cycle
    pub fn mark_enabled(&mut self, cycle: u64) {
        if self.err_cycle != Some(cycle) {
            self.status = RouterStatus::Enabled;
        }
    }
}

impl From<RouterConfig> for RouterInfo {
    fn from(config: RouterConfig) -> Self {
        Self::new(config)
    }
}
