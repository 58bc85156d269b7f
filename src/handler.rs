//! Request handlers and handler chains
//!
//! Every stage of the dispatch tree (rule engine, middlewares, tracing,
//! access log, service) is a [`Handler`]. Decorators take the next handler
//! and return a new one wrapping it.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use http::{header, HeaderValue, Request, Response, StatusCode};
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

/// An HTTP request handler operating on fully-collected bodies
#[async_trait]
pub trait Handler: Send + Sync {
    /// Serve a single request
    async fn handle(&self, req: Request<Bytes>) -> Response<Bytes>;
}

/// Shared, type-erased handler
pub type BoxHandler = Arc<dyn Handler>;

/// Build a handler from an async closure
pub fn handler_fn<F, Fut>(f: F) -> BoxHandler
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response<Bytes>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response<Bytes>> + Send + 'static,
{
    async fn handle(&self, req: Request<Bytes>) -> Response<Bytes> {
        (self.0)(req).await
    }
}

/// A decorator constructor: wraps the next handler, may fail
pub type Constructor = Box<dyn FnOnce(BoxHandler) -> Result<BoxHandler> + Send>;

/// Ordered list of decorator constructors.
///
/// The first appended constructor becomes the outermost layer: requests
/// traverse the chain in insertion order and responses in reverse.
#[derive(Default)]
pub struct Chain {
    constructors: Vec<Constructor>,
}

impl Chain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a constructor (innermost so far)
    pub fn append<C>(mut self, constructor: C) -> Self
    where
        C: FnOnce(BoxHandler) -> Result<BoxHandler> + Send + 'static,
    {
        self.constructors.push(Box::new(constructor));
        self
    }

    /// Append every constructor of another chain, keeping its order
    pub fn extend(mut self, other: Chain) -> Self {
        self.constructors.extend(other.constructors);
        self
    }

    /// Number of constructors in the chain
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Whether the chain is empty
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Wrap `handler` with every constructor, innermost first.
    /// Fails on the first constructor error.
    pub fn then(self, handler: BoxHandler) -> Result<BoxHandler> {
        let mut next = handler;
        for constructor in self.constructors.into_iter().rev() {
            next = constructor(next)?;
        }
        Ok(next)
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("constructors", &self.constructors.len())
            .finish()
    }
}

/// Peer address of the connection a request arrived on, stored as a
/// request extension by the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub SocketAddr);

/// Build a JSON error response: `{"error": "<message>"}`
pub fn error_response(status: StatusCode, message: &str) -> Response<Bytes> {
    let body = serde_json::json!({ "error": message }).to_string();
    let mut response = Response::new(Bytes::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}
