//! Entrypoint — HTTP listeners serving the assembled entry point handlers
//!
//! Each accepted connection is served with hyper's HTTP/1 server. Request
//! bodies are collected before dispatch and the peer address is attached
//! as a [`ClientAddr`] extension.

use crate::error::{Result, RouterError};
use crate::handler::{error_response, BoxHandler, ClientAddr};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Bind `addr` and serve `handler` on it
pub async fn start_http_entrypoint(
    name: String,
    addr: SocketAddr,
    handler: BoxHandler,
) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| RouterError::Other(format!("Failed to bind {}: {}", addr, e)))?;
    let local = listener.local_addr()?;

    tracing::info!(entrypoint = name.as_str(), address = %local, "HTTP entrypoint listening");
    Ok((local, tokio::spawn(serve(listener, name, handler))))
}

/// Accept loop for an already bound listener
pub async fn serve(listener: TcpListener, name: String, handler: BoxHandler) {
    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(entrypoint = name.as_str(), error = %e, "Failed to accept connection");
                continue;
            }
        };

        let handler = handler.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let result = http1::Builder::new()
                .serve_connection(
                    io,
                    service_fn(|req| handle_http_request(req, remote_addr, handler.clone())),
                )
                .await;
            if let Err(e) = result {
                tracing::debug!(remote = %remote_addr, error = %e, "Connection closed with error");
            }
        });
    }
}

/// Handle an individual HTTP request
async fn handle_http_request(
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
    handler: BoxHandler,
) -> std::result::Result<hyper::Response<Full<Bytes>>, Infallible> {
    let (mut parts, body) = req.into_parts();

    let resp = match body.collect().await {
        Ok(collected) => {
            parts.extensions.insert(ClientAddr(remote_addr));
            handler
                .handle(hyper::Request::from_parts(parts, collected.to_bytes()))
                .await
        }
        Err(e) => {
            tracing::warn!(remote = %remote_addr, error = %e, "Failed to read request body");
            error_response(http::StatusCode::BAD_REQUEST, "Failed to read request body")
        }
    };
    let (resp_parts, resp_body) = resp.into_parts();
    Ok(hyper::Response::from_parts(resp_parts, Full::new(resp_body)))
}
