//! Gateway orchestrator — wires configuration, middlewares, services and
//! the router manager together and runs the entry point listeners

use crate::config::{GatewayConfig, RuntimeConfiguration};
use crate::entrypoint;
use crate::error::{Result, RouterError};
use crate::handler::BoxHandler;
use crate::middleware::MiddlewareRegistry;
use crate::observability::AccessLog;
use crate::router::Manager;
use crate::service::ServiceManager;
use crate::{GatewayState, HealthStatus};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;
use tokio::task::JoinHandle;

/// Provider that owns names declared in the configuration file
pub const FILE_PROVIDER: &str = "file";

/// The main Gateway — coordinates all components
pub struct Gateway {
    config: RwLock<GatewayConfig>,
    state: RwLock<GatewayState>,
    start_time: Instant,
    shutdown: AtomicBool,
    access_log: Arc<AccessLog>,
    /// Manager of the last build; keeps health checkers alive
    manager: Mutex<Option<Manager>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    addresses: RwLock<HashMap<String, SocketAddr>>,
}

impl Gateway {
    /// Create a gateway; bare names in `config` belong to the file provider
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config: RwLock::new(config.with_provider(FILE_PROVIDER)),
            state: RwLock::new(GatewayState::Created),
            start_time: Instant::now(),
            shutdown: AtomicBool::new(false),
            access_log: Arc::new(AccessLog::new()),
            manager: Mutex::new(None),
            handles: Mutex::new(Vec::new()),
            addresses: RwLock::new(HashMap::new()),
        })
    }

    /// Assemble one handler per configured entry point.
    ///
    /// Every call starts from fresh services and an empty handler cache.
    pub fn build(&self) -> HashMap<String, BoxHandler> {
        let config = self.config();
        let registry = Arc::new(MiddlewareRegistry::new(config.middlewares.clone()));
        let services = Arc::new(ServiceManager::new(config.services.clone()));

        let mut manager = Manager::new(
            Some(RuntimeConfiguration::from_config(&config)),
            services,
            registry.clone(),
            registry,
        )
        .with_access_log(self.access_log.clone());

        let handlers = manager.build_handlers(&config.entrypoint_names(), false);
        tracing::info!(
            entrypoints = handlers.len(),
            routers = config.routers.len(),
            "Entry point handlers built"
        );

        *self.manager.lock().unwrap_or_else(PoisonError::into_inner) = Some(manager);
        handlers
    }

    /// Build handlers and bind every entry point
    pub async fn start(&self) -> Result<()> {
        self.set_state(GatewayState::Starting);
        if let Err(e) = self.start_entrypoints().await {
            self.stop_entrypoints();
            self.set_state(GatewayState::Stopped);
            return Err(e);
        }
        self.set_state(GatewayState::Running);
        tracing::info!("Gateway is running");
        Ok(())
    }

    /// Replace the configuration and restart the listeners
    pub async fn reload(&self, new_config: GatewayConfig) -> Result<()> {
        new_config.validate()?;
        self.set_state(GatewayState::Reloading);
        tracing::info!("Reloading gateway configuration");

        *self.config.write().unwrap_or_else(PoisonError::into_inner) =
            new_config.with_provider(FILE_PROVIDER);
        self.stop_entrypoints();
        self.start_entrypoints().await?;

        self.set_state(GatewayState::Running);
        tracing::info!("Gateway configuration reloaded");
        Ok(())
    }

    /// Stop listeners and health checkers
    pub async fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        self.set_state(GatewayState::Stopping);
        tracing::info!("Gateway shutting down");
        self.stop_entrypoints();
        self.manager
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        self.set_state(GatewayState::Stopped);
        tracing::info!("Gateway stopped");
    }

    /// Wait for Ctrl+C, then shut down
    pub async fn wait_for_shutdown(&self) -> Result<()> {
        tokio::signal::ctrl_c().await?;
        self.shutdown().await;
        Ok(())
    }

    /// Current gateway state
    pub fn state(&self) -> GatewayState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Health snapshot
    pub fn health(&self) -> HealthStatus {
        let (enabled_routers, disabled_routers) = match self.runtime() {
            Some(runtime) => runtime.routers.values().fold((0, 0), |(on, off), info| {
                match info.status {
                    crate::config::RouterStatus::Enabled => (on + 1, off),
                    crate::config::RouterStatus::Disabled => (on, off + 1),
                    crate::config::RouterStatus::Pending => (on, off),
                }
            }),
            None => (0, 0),
        };

        HealthStatus {
            state: self.state(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            total_requests: self.access_log.total_entries(),
            enabled_routers,
            disabled_routers,
        }
    }

    /// Router table with the diagnostics of the last build
    pub fn runtime(&self) -> Option<RuntimeConfiguration> {
        self.manager
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|m| m.runtime().cloned())
    }

    /// Current (provider-qualified) configuration
    pub fn config(&self) -> GatewayConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Bound address of a running entry point
    pub fn local_addr(&self, entry_point: &str) -> Option<SocketAddr> {
        self.addresses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entry_point)
            .copied()
    }

    /// Access log shared by every entry point
    pub fn access_log(&self) -> &Arc<AccessLog> {
        &self.access_log
    }

    /// Check if the gateway is running
    pub fn is_running(&self) -> bool {
        self.state() == GatewayState::Running
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    async fn start_entrypoints(&self) -> Result<()> {
        let config = self.config();
        let mut handlers = self.build();

        for name in config.entrypoint_names() {
            let Some(handler) = handlers.remove(&name) else {
                tracing::warn!(entrypoint = name.as_str(), "No handler built, entrypoint not started");
                continue;
            };
            let addr: SocketAddr = config.entrypoints[&name].address.parse().map_err(|e| {
                RouterError::Config(format!("Invalid address for entrypoint '{}': {}", name, e))
            })?;

            let (local, handle) =
                entrypoint::start_http_entrypoint(name.clone(), addr, handler).await?;
            self.handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(handle);
            self.addresses
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(name, local);
        }

        Ok(())
    }

    fn stop_entrypoints(&self) {
        for handle in self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            handle.abort();
        }
        self.addresses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn set_state(&self, new_state: GatewayState) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(from = %*state, to = %new_state, "State transition");
        *state = new_state;
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.stop_entrypoints();
    }
}
