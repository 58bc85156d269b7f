//! Headers middleware — set request headers on the way in and response
//! headers through the response modifier

use super::{Middleware, RequestContext};
use crate::config::MiddlewareConfig;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Response};
use std::collections::HashMap;

/// Headers modification middleware
pub struct HeadersMiddleware {
    request_headers: Vec<(HeaderName, HeaderValue)>,
    response_headers: Vec<(HeaderName, HeaderValue)>,
}

impl HeadersMiddleware {
    /// Create a new headers middleware from configuration.
    /// Entries that are not valid header names or values are dropped.
    pub fn new(config: &MiddlewareConfig) -> Self {
        Self {
            request_headers: parse_headers(&config.request_headers),
            response_headers: parse_headers(&config.response_headers),
        }
    }
}

fn parse_headers(raw: &HashMap<String, String>) -> Vec<(HeaderName, HeaderValue)> {
    raw.iter()
        .filter_map(|(key, value)| {
            match (key.parse::<HeaderName>(), value.parse::<HeaderValue>()) {
                (Ok(name), Ok(val)) => Some((name, val)),
                _ => {
                    tracing::warn!(header = key.as_str(), "Ignoring invalid header entry");
                    None
                }
            }
        })
        .collect()
}

fn apply(target: &mut HeaderMap, headers: &[(HeaderName, HeaderValue)]) {
    for (name, value) in headers {
        target.insert(name.clone(), value.clone());
    }
}

#[async_trait]
impl Middleware for HeadersMiddleware {
    async fn handle_request(
        &self,
        req: &mut http::request::Parts,
        _ctx: &RequestContext,
    ) -> Result<Option<Response<Bytes>>> {
        apply(&mut req.headers, &self.request_headers);
        Ok(None)
    }

    async fn handle_response(&self, resp: &mut http::response::Parts) -> Result<()> {
        apply(&mut resp.headers, &self.response_headers);
        Ok(())
    }

    fn modifies_response(&self) -> bool {
        !self.response_headers.is_empty()
    }

    fn name(&self) -> &str {
        "headers"
    }
}
