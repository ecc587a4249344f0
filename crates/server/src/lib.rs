#![forbid(unsafe_code)]

//! HTTP surface of the vaccination registry: a JSON API over the record store, a live SSE
//! channel fed from the notification outbox, and the background sweeper.

pub mod auth;
pub mod config;
pub mod error;
pub mod realtime;
pub mod relay;
pub mod render;
pub mod routes;
pub mod state;
pub mod sweeper;
pub mod time;

use crate::config::Config;
use crate::error::ApiError;
use crate::state::AppState;
use axum::Router;
use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use vt_core::model::Role;
use vt_core::scope::Location;
use vt_storage::{SqliteStore, StoreError, UserCreateRequest};

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("bootstrap: {0}")]
    Bootstrap(#[from] ApiError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect::<Vec<_>>();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::api_routes())
        .layer(cors_layer(&state.config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Creates the first national account on an empty user table. Returns whether one was made.
pub async fn bootstrap_admin(state: &AppState) -> Result<bool, ApiError> {
    let Some(admin) = state.config.bootstrap_admin.clone() else {
        return Ok(false);
    };
    let created = state
        .run(move |store| {
            if store.users_count()? > 0 {
                return Ok(None);
            }
            store
                .user_create(UserCreateRequest {
                    name: "Administrator".to_string(),
                    email: admin.email,
                    phone: None,
                    role: Role::National,
                    location: Location::default(),
                    password: admin.password,
                })
                .map(Some)
        })
        .await?;
    match created {
        Some(user) => {
            tracing::info!(user = %user.id, email = %user.email, "bootstrap administrator created");
            Ok(true)
        }
        None => Ok(false),
    }
}

pub async fn serve(config: Config) -> Result<(), ServeError> {
    tracing::info!(storage_dir = %config.storage_dir.display(), "opening store");
    let store = SqliteStore::open(&config.storage_dir)?.with_policy(config.store_policy());
    let state = AppState::new(store, config);
    bootstrap_admin(&state).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let relay = tokio::spawn(relay::run_relay(state.clone(), shutdown_rx.clone()));
    let sweeper = tokio::spawn(sweeper::run_sweeper(state.clone(), shutdown_rx));

    let address = state.config.bind;
    let listener = TcpListener::bind(address).await?;
    tracing::info!(%address, "server listening");

    let result = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let _ = shutdown_tx.send(true);
    for task in [relay, sweeper] {
        if let Err(err) = task.await {
            tracing::warn!(error = %err, "background task ended abnormally");
        }
    }
    tracing::info!("server stopped");
    Ok(result?)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        tracing::info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("received terminate signal, shutting down");
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
