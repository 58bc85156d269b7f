//! Strip prefix middleware — remove a path prefix before forwarding

use super::{Middleware, RequestContext};
use crate::config::MiddlewareConfig;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderValue, Response, Uri};

/// Header carrying the prefix that was removed
pub const STRIPPED_PREFIX_HEADER: &str = "X-Forwarded-Prefix";

/// Strip prefix middleware
pub struct StripPrefixMiddleware {
    prefixes: Vec<String>,
}

impl StripPrefixMiddleware {
    /// Create a new strip prefix middleware from configuration
    pub fn new(config: &MiddlewareConfig) -> Self {
        Self {
            prefixes: config.prefixes.clone(),
        }
    }

    /// Path left after removing the first matching prefix, if any matched
    fn strip<'a>(&'a self, path: &str) -> Option<(&'a str, String)> {
        let prefix = self.prefixes.iter().find(|p| path.starts_with(p.as_str()))?;
        let rest = &path[prefix.len()..];
        let stripped = if rest.starts_with('/') {
            rest.to_string()
        } else {
            format!("/{}", rest)
        };
        Some((prefix.as_str(), stripped))
    }
}

fn rebuild_uri(uri: &Uri, path: &str) -> Option<Uri> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse().ok()?);
    Uri::from_parts(parts).ok()
}

#[async_trait]
impl Middleware for StripPrefixMiddleware {
    async fn handle_request(
        &self,
        req: &mut http::request::Parts,
        _ctx: &RequestContext,
    ) -> Result<Option<Response<Bytes>>> {
        let Some((prefix, path)) = self.strip(req.uri.path()) else {
            return Ok(None);
        };

        match rebuild_uri(&req.uri, &path) {
            Some(uri) => {
                req.uri = uri;
                if let Ok(value) = HeaderValue::from_str(prefix) {
                    req.headers.insert(STRIPPED_PREFIX_HEADER, value);
                }
            }
            None => tracing::warn!(prefix, "Could not rebuild URI after stripping prefix"),
        }
        Ok(None)
    }

    fn name(&self) -> &str {
        "strip-prefix"
    }
}
