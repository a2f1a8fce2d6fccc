use crate::error::to_status;
use axum::{extract::Extension, http::StatusCode, response::Html, routing::get, Json, Router};
use blindsig_common::constants::RSA_PATH;
use blindsig_common::models::SignRequest;
use blindsig_common::SignerService;
use serde_json::Value;
use std::sync::Arc;

pub fn router() -> Router {
    Router::new().route(RSA_PATH, get(index).post(sign))
}

async fn index(Extension(service): Extension<Arc<SignerService>>) -> Html<String> {
    super::key_page("RSA blind signer", service.rsa_public_key(), &[RSA_PATH])
}

async fn sign(
    Extension(service): Extension<Arc<SignerService>>,
    Json(request): Json<SignRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    service.sign_rsa(&request).await.map(Json).map_err(to_status)
}
