//! Loopback HTTP dispatcher.
//!
//! # Responsibilities
//! - Bind exclusively to 127.0.0.1 on the configured port
//! - Build the Axum Router: one fallback that dispatches to the RouteTable
//! - Answer preflight (`OPTIONS`) before any route matching
//! - Wire up middleware (CORS headers, timeout, tracing)
//! - Start and stop the listener on demand
//!
//! # Design Decisions
//! - Route table snapshotted into an `Arc` at start; immutable while listening
//! - Stop is graceful: new connections refused, in-flight responses finish
//! - Unmatched requests become a 404 JSON body, never an error

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use std::future::Future;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::http::cors::with_cors;
use crate::http::response::send_error;
use crate::observability::metrics;
use crate::routing::{Method, Params, PatternError, RouteTable};

/// Errors from starting the dispatcher.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("dispatcher is already listening on {0}")]
    AlreadyRunning(SocketAddr),

    #[error("port {port} is already in use")]
    AddressInUse { port: u16 },

    #[error("failed to bind port {port} (os error {code:?}): {source}")]
    PortBind {
        port: u16,
        code: Option<i32>,
        #[source]
        source: std::io::Error,
    },
}

struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// HTTP dispatcher serving registered routes on the loopback interface.
pub struct Dispatcher {
    routes: RouteTable,
    config: ServerConfig,
    running: Mutex<Option<Running>>,
}

impl Dispatcher {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            routes: RouteTable::new(),
            config,
            running: Mutex::new(None),
        }
    }

    /// Register a handler. Takes effect from the next `start()`.
    pub fn register_route<F, Fut>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: F,
    ) -> Result<(), PatternError>
    where
        F: Fn(Request<Body>, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.routes.add(method, pattern, handler)
    }

    /// Bind `127.0.0.1:<port>` and begin serving. Returns the bound address,
    /// which differs from `port` only when `port` is 0.
    pub async fn start(&self, port: u16) -> Result<SocketAddr, ServerError> {
        let mut running = self.running.lock().await;
        if let Some(current) = running.as_ref() {
            return Err(ServerError::AlreadyRunning(current.addr));
        }

        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
            .await
            .map_err(|e| bind_error(port, e))?;
        let addr = listener.local_addr().map_err(|e| bind_error(port, e))?;

        let app = build_router(Arc::new(self.routes.clone()), &self.config);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            match result {
                Ok(()) => tracing::info!(address = %addr, "Dispatcher stopped"),
                Err(e) => tracing::error!(address = %addr, error = %e, "Dispatcher failed"),
            }
        });

        tracing::info!(address = %addr, routes = self.routes.len(), "Dispatcher listening");
        *running = Some(Running {
            addr,
            shutdown: shutdown_tx,
            task,
        });
        Ok(addr)
    }

    /// Stop accepting connections and wait for the listener to close.
    /// Succeeds trivially when not listening.
    pub async fn stop(&self) {
        let Some(current) = self.running.lock().await.take() else {
            return;
        };
        tracing::info!(address = %current.addr, "Dispatcher stopping");
        let _ = current.shutdown.send(());
        if let Err(e) = current.task.await {
            tracing::error!(address = %current.addr, error = %e, "Dispatcher task panicked");
        }
    }

    pub async fn is_listening(&self) -> bool {
        self.running.lock().await.is_some()
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.addr)
    }
}

fn bind_error(port: u16, e: std::io::Error) -> ServerError {
    if e.kind() == ErrorKind::AddrInUse {
        ServerError::AddressInUse { port }
    } else {
        ServerError::PortBind {
            port,
            code: e.raw_os_error(),
            source: e,
        }
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(routes: Arc<RouteTable>, config: &ServerConfig) -> Router {
    let router = Router::new()
        .fallback(dispatch)
        .with_state(routes)
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(TraceLayer::new_for_http());

    with_cors(router)
}

/// Preflight short-circuit, then first-match dispatch.
async fn dispatch(State(routes): State<Arc<RouteTable>>, request: Request<Body>) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    if method == axum::http::Method::OPTIONS {
        metrics::record_request(method.as_str(), StatusCode::OK.as_u16());
        return StatusCode::OK.into_response();
    }

    let matched = Method::from_http(&method).and_then(|m| {
        routes
            .lookup(m, &path)
            .map(|(route, params)| (route.handler.clone(), params))
    });

    let response = match matched {
        Some((handler, params)) => {
            tracing::debug!(method = %method, path = %path, "Dispatching request");
            handler(request, params).await
        }
        None => {
            tracing::debug!(method = %method, path = %path, "No route matched");
            send_error(
                StatusCode::NOT_FOUND,
                format!("No route for {} {}", method, path),
            )
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::cors::cors_headers;
    use crate::http::response::send_json;
    use tower::ServiceExt;

    fn router_with(table: RouteTable) -> Router {
        build_router(Arc::new(table), &ServerConfig::default())
    }

    #[tokio::test]
    async fn test_preflight_skips_routing() {
        let mut table = RouteTable::new();
        table
            .add(Method::Options, "/pages/:slug", |_req, _params| async {
                send_json(&"handler ran", StatusCode::ACCEPTED)
            })
            .unwrap();

        let response = router_with(table)
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/pages/home")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        for (name, value) in cors_headers() {
            assert_eq!(response.headers().get(&name), Some(&value), "{}", name);
        }
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_not_found_is_json_with_cors() {
        let response = router_with(RouteTable::new())
            .oneshot(Request::builder().uri("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].as_str().unwrap().contains("/missing"));
    }

    #[tokio::test]
    async fn test_unsupported_method_is_not_found() {
        let mut table = RouteTable::new();
        table
            .add(Method::Get, "/", |_req, _params| async { StatusCode::OK.into_response() })
            .unwrap();

        let response = router_with(table)
            .oneshot(Request::builder().method("PUT").uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
