// src/lib.rs
use std::sync::Arc;

use http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::routing::post;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod analytics;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
mod handlers;
pub mod models;
pub mod tags;
pub mod validation;

use auth::Credentials;
use db::DbPool;

/// Shared by every request: the pool plus read-only credential material.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub credentials: Arc<Credentials>,
}

impl AppState {
    pub fn new(pool: DbPool, credentials: Credentials) -> Self {
        Self {
            pool,
            credentials: Arc::new(credentials),
        }
    }
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/login", post(handlers::login))
        .route(
            "/notes",
            get(handlers::list_notes).post(handlers::create_note),
        )
        .route(
            "/notes/:id",
            get(handlers::get_note)
                .put(handlers::update_note)
                .delete(handlers::delete_note),
        )
        .route("/analytics/summary", get(handlers::analytics_summary))
}

pub fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            tracing::warn!(origin, "CORS origin is not a valid header value; cross-origin requests disabled");
            layer
        }
    }
}

/// The full HTTP surface, mounted under `/api`.
pub fn app(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origin))
        .with_state(state)
}
