//! Structured access log — one JSON entry per served request
//!
//! Decorators along the dispatch tree add fields (entry point, router,
//! service) to a per-request [`LogFields`] bag carried as a request
//! extension. The outermost decorator, marked as the origin, owns the bag
//! and emits the entry once the response is known.

use crate::handler::{BoxHandler, ClientAddr, Handler};
use crate::router::request_host;
use async_trait::async_trait;
use bytes::Bytes;
use http::{header, Request, Response};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Field key for the entry point name
pub const ENTRY_POINT_NAME: &str = "entry_point";
/// Field key for the router name
pub const ROUTER_NAME: &str = "router_name";
/// Field key for the service name
pub const SERVICE_NAME: &str = "service_name";

/// A single access log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogEntry {
    /// RFC 3339 timestamp
    pub timestamp: String,
    /// Client IP address
    pub client_ip: Option<String>,
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Request host
    pub host: Option<String>,
    /// HTTP status code
    pub status: u16,
    /// Response size in bytes
    pub response_bytes: u64,
    /// Request duration in milliseconds
    pub duration_ms: u64,
    /// Entrypoint name
    pub entry_point: Option<String>,
    /// Router that served the request
    pub router: Option<String>,
    /// Service the request was forwarded to
    pub service: Option<String>,
    /// User agent string
    pub user_agent: Option<String>,
}

/// Access log sink — counts and emits structured entries
#[derive(Debug, Default)]
pub struct AccessLog {
    total_entries: AtomicU64,
}

impl AccessLog {
    /// Create a new access log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and emit a log entry
    pub fn record(&self, entry: &AccessLogEntry) {
        self.total_entries.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            target: "access_log",
            method = entry.method.as_str(),
            path = entry.path.as_str(),
            status = entry.status,
            duration_ms = entry.duration_ms,
            entry_point = entry.entry_point.as_deref().unwrap_or("-"),
            router = entry.router.as_deref().unwrap_or("-"),
            service = entry.service.as_deref().unwrap_or("-"),
            "{}",
            serde_json::to_string(entry).unwrap_or_default()
        );
    }

    /// Number of entries recorded so far
    pub fn total_entries(&self) -> u64 {
        self.total_entries.load(Ordering::Relaxed)
    }
}

/// Per-request field bag shared by every decorator of one request
#[derive(Debug, Clone, Default)]
pub struct LogFields(Arc<Mutex<BTreeMap<String, String>>>);

impl LogFields {
    /// Set a field, replacing any previous value
    pub fn set(&self, key: &str, value: &str) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    /// Current value of a field
    pub fn get(&self, key: &str) -> Option<String> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

/// Decorator that writes one field into the request's [`LogFields`]
pub struct FieldHandler {
    next: BoxHandler,
    key: &'static str,
    value: String,
    origin: Option<Arc<AccessLog>>,
}

impl FieldHandler {
    /// Tag requests passing through `next` with `key = value`
    pub fn new(next: BoxHandler, key: &'static str, value: impl Into<String>) -> Self {
        Self {
            next,
            key,
            value: value.into(),
            origin: None,
        }
    }

    /// Make this decorator the origin: it emits the entry into `log`
    pub fn with_origin(mut self, log: Arc<AccessLog>) -> Self {
        self.origin = Some(log);
        self
    }

    /// Type-erase into a shared handler
    pub fn into_handler(self) -> BoxHandler {
        Arc::new(self)
    }

    async fn handle_origin(&self, log: &AccessLog, mut req: Request<Bytes>) -> Response<Bytes> {
        let start = Instant::now();
        let fields = LogFields::default();
        fields.set(self.key, &self.value);
        req.extensions_mut().insert(fields.clone());

        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let host = request_host(&req).map(String::from);
        let client_ip = req
            .extensions()
            .get::<ClientAddr>()
            .map(|addr| addr.0.ip().to_string());
        let user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let resp = self.next.handle(req).await;

        log.record(&AccessLogEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            client_ip,
            method,
            path,
            host,
            status: resp.status().as_u16(),
            response_bytes: resp.body().len() as u64,
            duration_ms: start.elapsed().as_millis() as u64,
            entry_point: fields.get(ENTRY_POINT_NAME),
            router: fields.get(ROUTER_NAME),
            service: fields.get(SERVICE_NAME),
            user_agent,
        });
        resp
    }
}

#[async_trait]
impl Handler for FieldHandler {
    async fn handle(&self, mut req: Request<Bytes>) -> Response<Bytes> {
        if let Some(log) = &self.origin {
            return self.handle_origin(log, req).await;
        }

        match req.extensions().get::<LogFields>() {
            Some(fields) => fields.set(self.key, &self.value),
            None => {
                let fields = LogFields::default();
                fields.set(self.key, &self.value);
                req.extensions_mut().insert(fields);
            }
        }
        self.next.handle(req).await
    }
}
