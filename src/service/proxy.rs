//! HTTP forwarding — sends a collected request to one backend

use super::Backend;
use crate::error::{Result, RouterError};
use bytes::Bytes;
use http::header::HeaderName;
use http::{header, HeaderMap, Response};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP reverse proxy client
pub struct HttpProxy {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProxy {
    /// Create a proxy with the default upstream timeout
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a proxy with a custom upstream timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(100)
            .build()
            .unwrap_or_default();
        Self { client, timeout }
    }

    /// Upstream timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Forward a request to `backend`, tracking it as an active connection
    pub async fn forward(
        &self,
        backend: &Backend,
        parts: &http::request::Parts,
        body: Bytes,
    ) -> Result<Response<Bytes>> {
        let _active = ActiveConnection::open(backend);
        self.send(backend, parts, body).await
    }

    async fn send(
        &self,
        backend: &Backend,
        parts: &http::request::Parts,
        body: Bytes,
    ) -> Result<Response<Bytes>> {
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let upstream_url = format!("{}{}", backend.url.trim_end_matches('/'), path_and_query);

        let response = self
            .client
            .request(parts.method.clone(), &upstream_url)
            .headers(forwardable(&parts.headers))
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify(backend, e))?;

        let status = response.status();
        let headers = forwardable(response.headers());
        let body = response.bytes().await.map_err(|e| self.classify(backend, e))?;

        let mut resp = Response::new(body);
        *resp.status_mut() = status;
        *resp.headers_mut() = headers;
        Ok(resp)
    }

    fn classify(&self, backend: &Backend, e: reqwest::Error) -> RouterError {
        if e.is_timeout() {
            RouterError::UpstreamTimeout(self.timeout.as_millis() as u64)
        } else if e.is_connect() {
            RouterError::ServiceUnavailable(format!(
                "Cannot connect to backend {}: {}",
                backend.url, e
            ))
        } else {
            RouterError::Http(e)
        }
    }
}

/// Holds one active connection on a backend until dropped, including
/// when the forwarding future is cancelled mid-flight
struct ActiveConnection<'a>(&'a Backend);

impl<'a> ActiveConnection<'a> {
    fn open(backend: &'a Backend) -> Self {
        backend.inc_connections();
        Self(backend)
    }
}

impl Drop for ActiveConnection<'_> {
    fn drop(&mut self) {
        self.0.dec_connections();
    }
}

impl Default for HttpProxy {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy of `headers` without hop-by-hop entries or the host header
fn forwardable(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_hop_by_hop(name) && name != header::HOST && name != header::CONTENT_LENGTH {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}
