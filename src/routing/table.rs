//! Route storage and lookup.
//!
//! # Responsibilities
//! - Store (method, pattern, handler) triples in registration order
//! - Look up the first route matching a request
//! - Return the matched route or an explicit no-match
//!
//! # Design Decisions
//! - Insertion order decides ambiguity, never specificity
//! - Duplicate patterns are allowed; the first registered wins
//! - Shared as `Arc<RouteTable>` once a listener starts, so it is frozen for that period

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::routing::pattern::{Method, Params, PatternError, RoutePattern};

/// Boxed route handler. Handlers own their success and error responses.
pub type Handler = Arc<dyn Fn(Request<Body>, Params) -> BoxFuture<'static, Response> + Send + Sync>;

/// A registered route.
#[derive(Clone)]
pub struct Route {
    pub method: Method,
    pub pattern: RoutePattern,
    pub handler: Handler,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

/// Insertion-ordered collection of routes.
#[derive(Debug, Default, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `template` and append a route for it.
    pub fn add<F, Fut>(&mut self, method: Method, template: &str, handler: F) -> Result<(), PatternError>
    where
        F: Fn(Request<Body>, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let pattern = RoutePattern::compile(template)?;
        let boxed: Handler = Arc::new(
            move |req: Request<Body>, params: Params| -> BoxFuture<'static, Response> {
                Box::pin(handler(req, params))
            },
        );

        tracing::debug!(method = %method, pattern = template, "Route registered");
        self.routes.push(Route {
            method,
            pattern,
            handler: boxed,
        });
        Ok(())
    }

    /// First route (in registration order) whose method and pattern match.
    pub fn lookup(&self, method: Method, path: &str) -> Option<(&Route, Params)> {
        self.routes
            .iter()
            .filter(|route| route.method == method)
            .find_map(|route| route.pattern.matches(path).map(|params| (route, params)))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
