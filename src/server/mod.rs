//! HTTP API
//!
//! Thin axum boundary over the registry, dispatcher and generation adapter.
//! Handlers parse the body, call one core operation and map the result:
//! validation and not-connected failures are 400, everything else is 500.

pub mod error;
pub mod extract;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerSettings;
use crate::dispatch::QueryDispatcher;
use crate::engine::ConnectionRequest;
use crate::generate::{GenerationAdapter, TextGenerator};
use crate::registry::PoolRegistry;

/// Origins allowed when CORS is not permissive
const LOCAL_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5173",
    "http://127.0.0.1:5173",
];

/// Errors that stop the server
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared application state
pub struct AppState {
    pub registry: Arc<PoolRegistry>,
    pub dispatcher: QueryDispatcher,
    pub generation: GenerationAdapter,
}

impl AppState {
    pub fn new(registry: Arc<PoolRegistry>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            dispatcher: QueryDispatcher::new(registry.clone()),
            generation: GenerationAdapter::new(generator),
            registry,
        }
    }
}

/// Build the application router with all routes
pub fn build_router(state: Arc<AppState>, cors_permissive: bool) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::connect::router())
        .merge(routes::query::router())
        .merge(routes::generate::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_permissive))
        .with_state(state)
}

fn cors_layer(permissive: bool) -> CorsLayer {
    if permissive {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }

    let origins = LOCAL_ORIGINS.iter().map(|origin| HeaderValue::from_static(origin));
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// Establish the pool for the configured default identity.
///
/// Failure is logged and otherwise ignored; callers can still `connect` later.
pub async fn connect_default(registry: &PoolRegistry) {
    match registry.get_or_create(&ConnectionRequest::default()).await {
        Ok(handle) => info!(identity = %handle.identity(), "default pool ready"),
        Err(e) => warn!(error = %e.details(), "default connection failed, continuing without it"),
    }
}

/// Serve until Ctrl+C or SIGTERM
pub async fn run_server(
    state: Arc<AppState>,
    settings: &ServerSettings,
) -> Result<(), ServerError> {
    let app = build_router(state, settings.cors_permissive);

    let addr = settings.bind_addr;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    info!("Starting querygate on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
