use crate::error::to_status;
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use blindsig_common::models::{InitRequest, SignRequest};
use blindsig_common::transport::EcdsaVariant;
use blindsig_common::SignerService;
use serde_json::Value;
use std::sync::Arc;

pub fn router() -> Router {
    Router::new()
        .route("/ecdsa/{variant}", get(index))
        .route("/ecdsa/{variant}/init", post(init))
        .route("/ecdsa/{variant}/sign", post(sign))
}

fn parse_variant(name: &str) -> Result<EcdsaVariant, (StatusCode, String)> {
    EcdsaVariant::from_name(name).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!("Unknown ECDSA implementation '{}'", name),
        )
    })
}

async fn index(
    Extension(service): Extension<Arc<SignerService>>,
    Path(variant): Path<String>,
) -> Result<Html<String>, (StatusCode, String)> {
    let variant = parse_variant(&variant)?;
    Ok(super::key_page(
        &format!("ECDSA blind signer ({})", variant.name()),
        service.ecc_public_key(),
        &[variant.init_path(), variant.sign_path()],
    ))
}

async fn init(
    Extension(service): Extension<Arc<SignerService>>,
    Path(variant): Path<String>,
    Json(request): Json<InitRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let variant = parse_variant(&variant)?;
    service
        .init_ecdsa(variant, &request)
        .await
        .map(Json)
        .map_err(to_status)
}

async fn sign(
    Extension(service): Extension<Arc<SignerService>>,
    Path(variant): Path<String>,
    Json(request): Json<SignRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let variant = parse_variant(&variant)?;
    service
        .sign_ecdsa(variant, &request)
        .await
        .map(Json)
        .map_err(to_status)
}
