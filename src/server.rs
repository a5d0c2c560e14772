//! Scrape Server
//!
//! Serves `/metrics` by running one collection pass per request, plus the
//! usual liveness and readiness probes.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::metrics::exposition;
use crate::metrics::Collector;

/// Default scrape listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:9126";

/// Bind `addr` and serve scrapes until the process exits.
pub async fn run_metrics_server(addr: &str, collector: Arc<Collector>) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("Invalid listen address {}: {}", addr, e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind metrics server: {}", e)))?;

    info!("Metrics server listening on {}", addr);
    serve(listener, collector).await
}

/// Serve scrapes on an already bound listener.
pub async fn serve(listener: TcpListener, collector: Arc<Collector>) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!("Accepted scrape connection from {}", peer);

        let io = TokioIo::new(stream);
        let collector = collector.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let collector = collector.clone();
                let method = req.method().clone();
                let path = req.uri().path().to_string();
                async move { Ok::<_, Infallible>(route(&method, &path, &collector).await) }
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Metrics server connection error: {}", e);
            }
        });
    }
}

/// Answer one request.
pub async fn route(method: &Method, path: &str, collector: &Collector) -> Response<Full<Bytes>> {
    if *method != Method::GET && *method != Method::HEAD {
        return text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    }

    match path {
        "/metrics" if *method == Method::HEAD => metrics_head(),
        "/metrics" => scrape(collector).await,
        "/healthz" | "/livez" | "/readyz" => text(StatusCode::OK, "ok"),
        _ => text(StatusCode::NOT_FOUND, "not found"),
    }
}

async fn scrape(collector: &Collector) -> Response<Full<Bytes>> {
    let series = collector.collect().await;

    match exposition::render(&series) {
        Ok((content_type, body)) => {
            let mut response = Response::new(Full::new(Bytes::from(body)));
            if let Ok(value) = HeaderValue::from_str(&content_type) {
                response.headers_mut().insert(CONTENT_TYPE, value);
            }
            response
        }
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            text(StatusCode::INTERNAL_SERVER_ERROR, "failed to render metrics")
        }
    }
}

/// Headers of a scrape, without running a collection pass.
fn metrics_head() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(prometheus::TEXT_FORMAT));
    response
}

fn text(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}
