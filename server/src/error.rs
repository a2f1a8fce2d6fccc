use axum::http::StatusCode;
use blindsig_common::{BlindingError, ProtocolError, SignerError};

/// ハンドラーのエラーを (ステータスコード, メッセージ) に変換する
///
/// 要求側の入力に起因するものは 400、それ以外は 500。
pub fn to_status(err: anyhow::Error) -> (StatusCode, String) {
    let status = if err.is::<SignerError>() || err.is::<ProtocolError>() || err.is::<BlindingError>()
    {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    if status.is_server_error() {
        tracing::error!("request failed: {:#}", err);
    } else {
        tracing::warn!("request rejected: {}", err);
    }
    (status, err.to_string())
}
