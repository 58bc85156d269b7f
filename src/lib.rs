//! # A3S Router
//!
//! Compiles the dynamic router configuration of the A3S gateway into one
//! ready-to-serve HTTP handler per entry point.
//!
//! ## Architecture
//!
//! ```text
//! Entrypoint → access log → recovery → rule engine
//!   → router access log → middlewares → tracing → service (load balancer) → backend
//! ```
//!
//! ## Core Features
//!
//! - **Rule engine**: Traefik-style rules (`Host()`, `PathPrefix()`, `Headers()`) with priorities
//! - **Provider namespaces**: `name@provider` qualification of middleware and service references
//! - **Failure isolation**: a broken router is disabled and diagnosed, its siblings keep serving
//! - **Memoization**: each router's handler is built once and shared across entry points
//! - **Load balancing**: round-robin, weighted, least-connections, with active health checks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use a3s_router::{Gateway, config::GatewayConfig};
//!
//! #[tokio::main]
//! async fn main() -> a3s_router::Result<()> {
//!     let config = GatewayConfig::from_file("router.toml").await?;
//!     let gateway = Gateway::new(config)?;
//!     gateway.start().await?;
//!     gateway.wait_for_shutdown().await
//! }
//! ```

pub mod config;
pub mod context;
pub mod entrypoint;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod middleware;
pub mod observability;
pub mod router;
pub mod service;

// Re-export main types
pub use context::BuildContext;
pub use error::{Result, RouterError};
pub use gateway::Gateway;
pub use handler::{BoxHandler, Chain, Handler};
pub use router::Manager;

use serde::{Deserialize, Serialize};

/// Gateway runtime state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayState {
    /// Gateway has been created but not yet started
    #[default]
    Created,
    /// Gateway is building handlers and binding listeners
    Starting,
    /// Gateway is actively accepting and proxying requests
    Running,
    /// Gateway is rebuilding handlers from a new configuration
    Reloading,
    /// Gateway is shutting down
    Stopping,
    /// Gateway has fully stopped
    Stopped,
}

impl std::fmt::Display for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Reloading => write!(f, "reloading"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Gateway health status snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Current gateway state
    pub state: GatewayState,
    /// Uptime in seconds since the gateway was created
    pub uptime_secs: u64,
    /// Requests served since start
    pub total_requests: u64,
    /// Routers serving traffic after the last build
    pub enabled_routers: usize,
    /// Routers disabled by a build error
    pub disabled_routers: usize,
}
