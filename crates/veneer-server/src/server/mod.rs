//! HTTP serving: the compiled router snapshot, the accept loop, and
//! per-request dispatch.
//!
//! A snapshot is immutable once built. The reload controller publishes a new
//! one atomically through the shared holder; in-flight requests keep the
//! `Arc` they started with and finish against the old generation.

pub mod access_log;
pub mod cors;

use crate::config::{Config, ServerConfig};
use crate::engine::compile::{compile, CompiledRoute};
use crate::engine::pipeline;
use crate::engine::state::StateStore;
use crate::response::ApiError;
use access_log::{AccessLog, AccessLogSender};
use anyhow::{Context, Result};
use bytes::Bytes;
use futures::FutureExt;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

const MAX_ROUTE_LOG_LINES: usize = 10;

/// Shared, atomically swappable pointer to the current router generation.
pub type SnapshotHolder = Arc<RwLock<Arc<RouterSnapshot>>>;

/// One immutable router generation: compiled routes plus lookup tables.
pub struct RouterSnapshot {
    pub server: ServerConfig,
    routes: Vec<Arc<CompiledRoute>>,
    table: HashMap<Method, matchit::Router<usize>>,
}

impl RouterSnapshot {
    /// Compile every route entry and register it. Any failure discards the
    /// generation as a whole.
    pub fn build(cfg: &Config, base_dir: &Path) -> Result<Self> {
        let prefix = normalize_prefix(&cfg.server.api_prefix);
        let mut routes = Vec::with_capacity(cfg.routes.len());
        let mut table: HashMap<Method, matchit::Router<usize>> = HashMap::new();

        for (i, route) in cfg.routes.iter().enumerate() {
            let compiled = compile(route, &cfg.server, base_dir)
                .with_context(|| format!("failed to create route[{i}] '{}'", route.name))?;

            let full_path = format!("{prefix}{}", compiled.path);
            let index = routes.len();
            table
                .entry(compiled.method.clone())
                .or_default()
                .insert(full_path.as_str(), index)
                .map_err(|e| {
                    anyhow::anyhow!(
                        "failed to register route[{i}] '{}' at {} {full_path}: {e}",
                        route.name,
                        compiled.method
                    )
                })?;

            if i < MAX_ROUTE_LOG_LINES {
                info!("[route registered] {} {}", compiled.method, full_path);
            }
            routes.push(Arc::new(compiled));
        }

        if cfg.routes.len() > MAX_ROUTE_LOG_LINES {
            info!(
                "+{} more routes registered...",
                cfg.routes.len() - MAX_ROUTE_LOG_LINES
            );
        }

        Ok(Self {
            server: cfg.server.clone(),
            routes,
            table,
        })
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Resolve and run one request against this generation.
    pub async fn dispatch(
        &self,
        state: &StateStore,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response<Full<Bytes>> {
        let mut response = match self.lookup(&method, uri.path()) {
            Some((route, path_params)) => {
                pipeline::execute(
                    &route,
                    &self.server,
                    state,
                    &method,
                    &uri,
                    &headers,
                    path_params,
                    body,
                )
                .await
            }
            None => self.unmatched(&method),
        };

        if let Some(cors_cfg) = &self.server.cors {
            cors::apply(cors_cfg, &mut response);
        }
        response
    }

    fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(Arc<CompiledRoute>, HashMap<String, String>)> {
        let router = self.table.get(method)?;
        let matched = router.at(path).ok()?;
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Some((self.routes[*matched.value].clone(), params))
    }

    fn unmatched(&self, method: &Method) -> Response<Full<Bytes>> {
        if *method == Method::OPTIONS {
            if let Some(cors_cfg) = &self.server.cors {
                if cors_cfg.enabled {
                    return cors::preflight(cors_cfg);
                }
            }
        }
        ApiError::new(StatusCode::NOT_FOUND, "ROUTE_NOT_FOUND", "Route not found")
            .into_response()
    }

    /// Paths excluded from access logging (reserved UI prefixes).
    fn is_internal_path(&self, path: &str) -> bool {
        let console = self
            .server
            .console
            .as_ref()
            .map(|c| c.path.as_str())
            .unwrap_or("/console");
        let debug = self
            .server
            .debug
            .as_ref()
            .map(|d| d.path.as_str())
            .unwrap_or("/__debug");
        path.starts_with(console) || path.starts_with(debug)
    }
}

/// Go-style prefix normalisation: always leading slash, never trailing.
pub fn normalize_prefix(prefix: &str) -> String {
    let mut prefix = prefix.to_string();
    if !prefix.starts_with('/') {
        prefix = format!("/{prefix}");
    }
    while prefix.ends_with('/') {
        prefix.pop();
    }
    prefix
}

/// Accept loop: one connection per task, one logical task per request.
pub async fn serve(
    addr: SocketAddr,
    holder: SnapshotHolder,
    state: Arc<StateStore>,
    log_tx: AccessLogSender,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on http://{addr}");

    loop {
        let (stream, remote_addr) = listener.accept().await?;
        let holder = holder.clone();
        let state = state.clone();
        let log_tx = log_tx.clone();

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| {
                let holder = holder.clone();
                let state = state.clone();
                let log_tx = log_tx.clone();
                async move { handle_request(req, holder, state, log_tx, remote_addr).await }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("connection error from {remote_addr}: {e}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    holder: SnapshotHolder,
    state: Arc<StateStore>,
    log_tx: AccessLogSender,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    // Pin the request to the current generation; a concurrent reload will not
    // affect it.
    let snapshot = holder.read().clone();

    let method = req.method().clone();
    let uri = req.uri().clone();
    let headers = req.headers().clone();

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return Ok(ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_BODY",
                format!("failed to read request body: {e}"),
            )
            .into_response());
        }
    };

    let start = Instant::now();
    let path = uri.path().to_string();

    let dispatched = AssertUnwindSafe(snapshot.dispatch(&state, method.clone(), uri, headers, body))
        .catch_unwind()
        .await;

    let response = match dispatched {
        Ok(response) => response,
        Err(_) => {
            error!("panic while handling {method} {path}");
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "Internal Server Error",
            )
            .into_response()
        }
    };

    if !snapshot.is_internal_path(&path) {
        log_tx.record(AccessLog {
            method: method.to_string(),
            path,
            status: response.status().as_u16(),
            duration_ms: start.elapsed().as_millis() as u64,
            remote: remote_addr.to_string(),
        });
    }

    Ok(response)
}
