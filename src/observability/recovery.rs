//! Panic recovery — turns a panic anywhere below into a 500 response

use crate::handler::{error_response, BoxHandler, Handler};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::FutureExt;
use http::{Request, Response, StatusCode};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Recovery decorator
pub struct Recovery {
    next: BoxHandler,
}

impl Recovery {
    /// Wrap `next`
    pub fn new(next: BoxHandler) -> Self {
        Self { next }
    }

    /// Type-erase into a shared handler
    pub fn into_handler(self) -> BoxHandler {
        Arc::new(self)
    }
}

#[async_trait]
impl Handler for Recovery {
    async fn handle(&self, req: Request<Bytes>) -> Response<Bytes> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        match AssertUnwindSafe(self.next.handle(req)).catch_unwind().await {
            Ok(resp) => resp,
            Err(payload) => {
                tracing::error!(
                    method = %method,
                    path = path.as_str(),
                    panic = panic_message(payload.as_ref()),
                    "Recovered from panic in request handler"
                );
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}
