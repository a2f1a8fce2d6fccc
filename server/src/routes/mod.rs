pub mod ecdsa;
pub mod rsa;

use axum::response::Html;
use blindsig_common::KeyManager;

/// 署名者の公開鍵を載せた案内ページ
pub(crate) fn key_page(title: &str, key: &KeyManager, endpoints: &[&str]) -> Html<String> {
    let armored = key
        .armored
        .as_deref()
        .unwrap_or("(armored public key unavailable)");
    let uid = key.primary_user_id().unwrap_or("");
    let endpoints = endpoints
        .iter()
        .map(|e| format!("<li><code>POST {}</code></li>", e))
        .collect::<String>();
    Html(format!(
        "<!DOCTYPE html>\n<html><head><title>{title}</title></head><body>\
         <h1>{title}</h1><p>Signer: {uid}</p><ul>{endpoints}</ul>\
         <pre>{armored}</pre></body></html>",
        title = title,
        uid = escape_html(uid),
        endpoints = endpoints,
        armored = escape_html(armored),
    ))
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
