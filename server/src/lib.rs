use axum::{Extension, Router};
use blindsig_common::SignerService;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
mod routes;

/// 署名サーバーのルーター
pub fn app(service: Arc<SignerService>) -> Router {
    Router::new()
        .merge(routes::rsa::router())
        .merge(routes::ecdsa::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(Extension(service))
}
