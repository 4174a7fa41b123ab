//! Route table construction.
//!
//! # Responsibilities
//! - Collect route registrations at startup
//! - Reject duplicate, conflicting or malformed routes
//! - Turn the frozen table into an instrumented path router
//!
//! # Design Decisions
//! - Immutable after `build()` (the builder is consumed)
//! - All methods on one path share a single method router
//! - Unknown paths and known paths with the wrong method both fall through
//!   to the `unmatched` dispatcher

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::routing::{MethodFilter, MethodRouter};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::config::ServiceConfig;
use crate::observability::TelemetryHandles;
use crate::routing::dispatch::{dispatch, Instrumentation, UNMATCHED};
use crate::routing::handler::Handler;
use crate::routing::matcher::PathPattern;
use crate::routing::RouteError;

/// A single registered route.
pub struct RouteRegistration {
    pub(crate) method: Method,
    pub(crate) filter: MethodFilter,
    pub(crate) pattern: PathPattern,
    pub(crate) name: Arc<str>,
    pub(crate) handler: Arc<dyn Handler>,
}

impl RouteRegistration {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Logical name used for span names and metric labels.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for RouteRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteRegistration")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Collects routes before the server starts.
#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    routes: Vec<RouteRegistration>,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` on `pattern` under the logical `name`.
    pub fn register<H>(
        &mut self,
        method: Method,
        pattern: &str,
        name: &str,
        handler: H,
    ) -> Result<&mut Self, RouteError>
    where
        H: Handler,
    {
        if name.trim().is_empty() || name == UNMATCHED {
            return Err(RouteError::InvalidName(name.to_string()));
        }
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| RouteError::UnsupportedMethod(method.clone()))?;
        let pattern = PathPattern::parse(pattern)?;

        for existing in &self.routes {
            if existing.pattern.as_str() == pattern.as_str() {
                if existing.method == method {
                    return Err(RouteError::DuplicateRoute {
                        method,
                        pattern: pattern.as_str().to_string(),
                        existing: existing.name.to_string(),
                    });
                }
                continue;
            }
            if existing.pattern.conflicts_with(&pattern) {
                return Err(RouteError::ConflictingPattern {
                    pattern: pattern.as_str().to_string(),
                    existing: existing.pattern.as_str().to_string(),
                });
            }
        }

        tracing::debug!(method = %method, pattern = %pattern, route = name, "Route registered");
        self.routes.push(RouteRegistration {
            method,
            filter,
            pattern,
            name: Arc::from(name),
            handler: Arc::new(handler),
        });
        Ok(self)
    }

    /// Freeze the table.
    pub fn build(self) -> RouteTable {
        RouteTable {
            routes: self.routes.into_iter().map(Arc::new).collect(),
        }
    }
}

/// Immutable set of routes, ready to be served.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Arc<RouteRegistration>>,
}

/// Per-request limits applied by the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Handler time budget; `None` disables the limit.
    pub write_timeout: Option<Duration>,
    pub max_body_bytes: usize,
    /// Cancelled when shutdown reaches its hard cutoff.
    pub abort: CancellationToken,
}

impl DispatchOptions {
    pub fn new(config: &ServiceConfig, abort: CancellationToken) -> Self {
        Self {
            write_timeout: (!config.write_timeout.is_zero()).then_some(config.write_timeout),
            max_body_bytes: config.max_body_bytes,
            abort,
        }
    }
}

impl RouteTable {
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteRegistration> {
        self.routes.iter().map(|r| r.as_ref())
    }

    /// Build the path router. Every route, and every miss, is dispatched
    /// through the request instrumentation.
    pub fn into_router(self, telemetry: &TelemetryHandles, options: DispatchOptions) -> Router {
        let instrumentation = Instrumentation::new(telemetry.clone(), &options);

        let unmatched = {
            let instrumentation = instrumentation.clone();
            move |req: Request<Body>| {
                let instrumentation = instrumentation.clone();
                async move { dispatch(instrumentation, None, req).await }
            }
        };

        let mut paths: BTreeMap<String, MethodRouter> = BTreeMap::new();
        for route in self.routes {
            let path = route.pattern.as_str().to_string();
            let filter = route.filter;
            let endpoint = {
                let instrumentation = instrumentation.clone();
                move |req: Request<Body>| {
                    let instrumentation = instrumentation.clone();
                    let route = Arc::clone(&route);
                    async move { dispatch(instrumentation, Some(route), req).await }
                }
            };
            let method_router = paths
                .remove(&path)
                .unwrap_or_else(MethodRouter::new)
                .on(filter, endpoint);
            paths.insert(path, method_router);
        }

        let mut router = Router::new();
        for (path, method_router) in paths {
            router = router.route(&path, method_router.fallback(unmatched.clone()));
        }

        router
            .fallback(unmatched)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }
}
