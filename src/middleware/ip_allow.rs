//! IP allow list middleware — restricts access by client IP
//!
//! The client address comes from the connection the listener accepted.
//! Requests without a known client address are rejected.

use super::ip_matcher::IpMatcher;
use super::{Middleware, RequestContext};
use crate::config::MiddlewareConfig;
use crate::error::{Result, RouterError};
use crate::handler::error_response;
use async_trait::async_trait;
use bytes::Bytes;
use http::{Response, StatusCode};

/// IP allow list middleware
pub struct IpAllowMiddleware {
    matcher: IpMatcher,
}

impl IpAllowMiddleware {
    /// Create from middleware config
    pub fn new(config: &MiddlewareConfig) -> Result<Self> {
        let matcher = IpMatcher::new(&config.allowed_ips)?;
        if matcher.is_empty() {
            return Err(RouterError::Middleware(
                "ip-allow middleware requires at least one allowed_ips entry".to_string(),
            ));
        }
        Ok(Self { matcher })
    }

    /// Check if an IP address is allowed
    pub fn is_allowed(&self, ip: &str) -> bool {
        self.matcher.contains_str(ip)
    }
}

#[async_trait]
impl Middleware for IpAllowMiddleware {
    async fn handle_request(
        &self,
        _req: &mut http::request::Parts,
        ctx: &RequestContext,
    ) -> Result<Option<Response<Bytes>>> {
        match ctx.client_ip.as_deref() {
            Some(ip) if self.is_allowed(ip) => Ok(None),
            client_ip => {
                tracing::debug!(client_ip = client_ip.unwrap_or("-"), router = ctx.router.as_str(), "IP not in allow list");
                Ok(Some(error_response(StatusCode::FORBIDDEN, "Forbidden")))
            }
        }
    }

    fn name(&self) -> &str {
        "ip-allow"
    }
}
