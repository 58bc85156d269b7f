//! Router manager — compiles routers into one handler per entry point
//!
//! Per entry point the dispatch tree is, outermost to innermost:
//!
//! ```text
//! entry point access log → recovery → rule dispatch
//!   → router access log → middlewares → tracing → service (+ response modifiers)
//! ```
//!
//! A router that fails to build is left out of its entry point and its
//! error is recorded on the runtime configuration; its siblings and the
//! entry point keep serving.

use super::cache::HandlerCache;
use super::engine::{EngineFactory, RuleEngine, RuleRouterFactory};
use crate::config::{RouterConfig, RuntimeConfiguration};
use crate::context::BuildContext;
use crate::error::{Result, RouterError};
use crate::handler::{BoxHandler, Chain};
use crate::middleware::{ChainBuilder, ResponseModifierBuilder};
use crate::observability::access_log::{ENTRY_POINT_NAME, ROUTER_NAME};
use crate::observability::{AccessLog, FieldHandler, Recovery, TracingForwarder};
use crate::service::ServiceResolver;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A router that could not be added to its entry point
#[derive(Debug, Error)]
#[error("router {router}: {error}")]
pub struct RouterBuildError {
    /// Router name
    pub router: String,
    /// Cause
    #[source]
    pub error: RouterError,
}

/// Result of assembling one entry point
pub struct EntryPointBuild {
    /// Recovery-wrapped rule dispatcher
    pub handler: BoxHandler,
    /// Routers that were left out, with their cause
    pub failures: Vec<RouterBuildError>,
    /// Routers that were added to the dispatcher
    pub enabled: Vec<String>,
}

impl fmt::Debug for EntryPointBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPointBuild")
            .field("failures", &self.failures)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// One router's layers, outermost to innermost
struct RouterLayers {
    middlewares: Chain,
    router: String,
    service_name: String,
    service: BoxHandler,
}

impl RouterLayers {
    fn compose(self) -> Result<BoxHandler> {
        let traced: BoxHandler = Arc::new(TracingForwarder::new(
            self.router,
            self.service_name,
            self.service,
        ));
        self.middlewares.then(traced).map_err(|e| match e {
            RouterError::Middleware(_) => e,
            other => RouterError::Middleware(other.to_string()),
        })
    }
}

/// Builds entry point handlers from the runtime configuration
pub struct Manager {
    conf: Option<RuntimeConfiguration>,
    service_resolver: Arc<dyn ServiceResolver>,
    chain_builder: Arc<dyn ChainBuilder>,
    modifier_builder: Arc<dyn ResponseModifierBuilder>,
    engine_factory: Arc<dyn EngineFactory>,
    access_log: Arc<AccessLog>,
    cache: HandlerCache,
    cycle: u64,
}

impl Manager {
    /// Create a manager. Without a runtime configuration every entry point
    /// gets an empty route table.
    pub fn new(
        conf: Option<RuntimeConfiguration>,
        service_resolver: Arc<dyn ServiceResolver>,
        chain_builder: Arc<dyn ChainBuilder>,
        modifier_builder: Arc<dyn ResponseModifierBuilder>,
    ) -> Self {
        Self {
            conf,
            service_resolver,
            chain_builder,
            modifier_builder,
            engine_factory: Arc::new(RuleRouterFactory),
            access_log: Arc::new(AccessLog::new()),
            cache: HandlerCache::new(),
            cycle: 0,
        }
    }

    /// Use a different rule engine
    pub fn with_engine_factory(mut self, factory: Arc<dyn EngineFactory>) -> Self {
        self.engine_factory = factory;
        self
    }

    /// Emit access log entries into `log`
    pub fn with_access_log(mut self, log: Arc<AccessLog>) -> Self {
        self.access_log = log;
        self
    }

    /// Runtime configuration with the recorded router diagnostics
    pub fn runtime(&self) -> Option<&RuntimeConfiguration> {
        self.conf.as_ref()
    }

    /// Access log the entry point handlers write to
    pub fn access_log(&self) -> &Arc<AccessLog> {
        &self.access_log
    }

    /// Router handlers built so far
    pub fn cache(&self) -> &HandlerCache {
        &self.cache
    }

    /// Number of completed `build_handlers` calls
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Build one handler per requested entry point.
    ///
    /// Entry points whose rule engine cannot be created are left out of
    /// the result. Health checking is launched once, after all entry
    /// points are assembled.
    pub fn build_handlers(
        &mut self,
        entry_points: &[String],
        tls_only: bool,
    ) -> HashMap<String, BoxHandler> {
        self.cycle += 1;
        let mut grouped = self
            .conf
            .as_ref()
            .map(|conf| conf.routers_by_entrypoints(entry_points, tls_only))
            .unwrap_or_default();

        let mut handlers = HashMap::new();
        for name in entry_points {
            if handlers.contains_key(name) {
                continue;
            }
            let routers = grouped.remove(name).unwrap_or_default();
            let ctx = BuildContext::new().with_entry_point(name.as_str());

            let build = match self.build_entry_point_handler(&ctx, &routers) {
                Ok(build) => build,
                Err(e) => {
                    tracing::error!(entry_point = name.as_str(), error = %e, "Error while building entry point handler");
                    continue;
                }
            };
            self.record(&build);

            let handler = FieldHandler::new(build.handler, ENTRY_POINT_NAME, name.as_str())
                .with_origin(self.access_log.clone())
                .into_handler();
            handlers.insert(name.clone(), handler);
        }

        self.service_resolver.launch_health_check();
        handlers
    }

    /// Assemble the rule dispatcher of one entry point, wrapped in recovery
    pub fn build_entry_point_handler(
        &mut self,
        ctx: &BuildContext,
        routers: &HashMap<String, RouterConfig>,
    ) -> Result<EntryPointBuild> {
        let mut engine: Box<dyn RuleEngine> =
            self.engine_factory.new_engine().map_err(|e| match e {
                RouterError::EngineInit(_) => e,
                other => RouterError::EngineInit(other.to_string()),
            })?;

        let mut names: Vec<&String> = routers.keys().collect();
        names.sort();

        let mut failures = Vec::new();
        let mut enabled = Vec::new();
        for name in names {
            let config = &routers[name];
            let ctx_router = ctx.with_router(name);
            let _span = ctx_router.span().entered();

            let added = self
                .build_router_handler(&ctx_router, name, config)
                .and_then(|handler| engine.add_route(&config.rule, config.priority, handler));
            match added {
                Ok(()) => enabled.push(name.clone()),
                Err(error) => {
                    tracing::error!(router = name.as_str(), error = %error, "Router build failed, router excluded");
                    failures.push(RouterBuildError {
                        router: name.clone(),
                        error,
                    });
                }
            }
        }

        engine.sort_routes();
        tracing::debug!(
            entry_point = ctx.entry_point().unwrap_or("-"),
            routes = engine.len(),
            failed = failures.len(),
            "Entry point assembled"
        );

        Ok(EntryPointBuild {
            handler: Recovery::new(engine.into_handler()).into_handler(),
            failures,
            enabled,
        })
    }

    /// Handler of one router, from the cache when already built
    pub fn build_router_handler(
        &mut self,
        ctx: &BuildContext,
        name: &str,
        config: &RouterConfig,
    ) -> Result<BoxHandler> {
        if let Some(handler) = self.cache.get(name) {
            return Ok(handler);
        }

        let handler = self.build_http_handler(ctx, config, name)?;
        let logged = FieldHandler::new(handler, ROUTER_NAME, name).into_handler();
        Ok(self.cache.insert(name, logged))
    }

    /// Compose a router's middlewares, tracing and service
    pub fn build_http_handler(
        &self,
        ctx: &BuildContext,
        config: &RouterConfig,
        router_name: &str,
    ) -> Result<BoxHandler> {
        let qualified: Vec<String> = config
            .middlewares
            .iter()
            .map(|name| ctx.qualified_name(name))
            .collect();

        let modifier = self.modifier_builder.build(ctx, &qualified);
        let service = self
            .service_resolver
            .build_http(ctx, &config.service, modifier)?;
        let middlewares = self.chain_builder.build_chain(ctx, &qualified);

        RouterLayers {
            middlewares,
            router: router_name.to_string(),
            service_name: ctx.qualified_name(&config.service),
            service,
        }
        .compose()
    }

    fn record(&mut self, build: &EntryPointBuild) {
        let Some(conf) = self.conf.as_mut() else {
            return;
        };
        for failure in &build.failures {
            conf.record_router_error(&failure.router, self.cycle, &failure.error.to_string());
        }
        for name in &build.enabled {
            conf.mark_router_enabled(name, self.cycle);
        }
    }
}
