//! Distributed tracing — W3C trace context propagation and the per-router
//! forwarding span

use super::access_log::{LogFields, SERVICE_NAME};
use crate::handler::{BoxHandler, Handler};
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Request, Response};
use std::fmt;
use tracing::Instrument;

/// W3C Trace Context header name
pub const TRACEPARENT_HEADER: &str = "traceparent";
/// W3C Trace State header name
pub const TRACESTATE_HEADER: &str = "tracestate";

/// Trace context — carries distributed trace information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    /// Trace ID (128-bit hex string)
    pub trace_id: String,
    /// Parent span ID (64-bit hex string, empty for a root)
    pub parent_span_id: String,
    /// Current span ID (64-bit hex string)
    pub span_id: String,
    /// Trace flags (bit 0: sampled)
    pub trace_flags: u8,
    /// Vendor-specific trace state
    pub trace_state: Option<String>,
}

impl TraceContext {
    /// Create a new sampled root trace context
    pub fn new_root() -> Self {
        Self {
            trace_id: generate_trace_id(),
            parent_span_id: String::new(),
            span_id: generate_span_id(),
            trace_flags: 1,
            trace_state: None,
        }
    }

    /// Create a child span from this context
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            parent_span_id: self.span_id.clone(),
            span_id: generate_span_id(),
            trace_flags: self.trace_flags,
            trace_state: self.trace_state.clone(),
        }
    }

    /// Check if this trace is sampled
    pub fn is_sampled(&self) -> bool {
        self.trace_flags & 0x01 != 0
    }

    /// Format as W3C traceparent header value
    pub fn to_traceparent(&self) -> String {
        format!("00-{}-{}-{:02x}", self.trace_id, self.span_id, self.trace_flags)
    }

    /// Parse a W3C traceparent header value into a context whose parent
    /// is the caller's span
    pub fn from_traceparent(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('-');
        let (version, trace_id, parent_span_id, flags) =
            (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || version != "00" {
            return None;
        }
        if trace_id.len() != 32 || parent_span_id.len() != 16 || flags.len() != 2 {
            return None;
        }
        if !is_hex(trace_id) || !is_hex(parent_span_id) || trace_id.bytes().all(|b| b == b'0') {
            return None;
        }
        let trace_flags = u8::from_str_radix(flags, 16).ok()?;

        Some(Self {
            trace_id: trace_id.to_ascii_lowercase(),
            parent_span_id: parent_span_id.to_ascii_lowercase(),
            span_id: generate_span_id(),
            trace_flags,
            trace_state: None,
        })
    }

    /// Continue the trace found in `headers`, if any
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let traceparent = headers.get(TRACEPARENT_HEADER)?.to_str().ok()?;
        let mut ctx = Self::from_traceparent(traceparent)?;
        ctx.trace_state = headers
            .get(TRACESTATE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        Some(ctx)
    }

    /// Write this context into outgoing request headers
    pub fn inject(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.to_traceparent()) {
            headers.insert(TRACEPARENT_HEADER, value);
        }
        if let Some(state) = self.trace_state.as_deref().and_then(|s| HeaderValue::from_str(s).ok()) {
            headers.insert(TRACESTATE_HEADER, state);
        }
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "trace_id={} span_id={} sampled={}",
            self.trace_id,
            self.span_id,
            self.is_sampled()
        )
    }
}

/// Tracing decorator bound to one router and its resolved service.
///
/// Runs the rest of the router's pipeline inside a `forward` span and
/// propagates the trace context to the backend.
pub struct TracingForwarder {
    router: String,
    service: String,
    next: BoxHandler,
}

impl TracingForwarder {
    /// Wrap `next` for `router` forwarding to `service`
    pub fn new(router: impl Into<String>, service: impl Into<String>, next: BoxHandler) -> Self {
        Self {
            router: router.into(),
            service: service.into(),
            next,
        }
    }

    /// Router this forwarder is bound to
    pub fn router(&self) -> &str {
        &self.router
    }

    /// Service this forwarder is bound to
    pub fn service(&self) -> &str {
        &self.service
    }
}

#[async_trait]
impl Handler for TracingForwarder {
    async fn handle(&self, mut req: Request<Bytes>) -> Response<Bytes> {
        let ctx = TraceContext::from_headers(req.headers()).unwrap_or_else(TraceContext::new_root);
        ctx.inject(req.headers_mut());
        if let Some(fields) = req.extensions().get::<LogFields>() {
            fields.set(SERVICE_NAME, &self.service);
        }

        let span = tracing::info_span!(
            "forward",
            router = self.router.as_str(),
            service = self.service.as_str(),
            trace_id = ctx.trace_id.as_str()
        );
        async {
            let resp = self.next.handle(req).await;
            tracing::debug!(status = resp.status().as_u16(), "Forwarded");
            resp
        }
        .instrument(span)
        .await
    }
}

/// Generate a random 128-bit trace ID (32 hex chars)
fn generate_trace_id() -> String {
    format!("{:032x}", uuid::Uuid::new_v4().as_u128())
}

/// Generate a random 64-bit span ID (16 hex chars)
fn generate_span_id() -> String {
    format!("{:016x}", uuid::Uuid::new_v4().as_u64_pair().0)
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}
