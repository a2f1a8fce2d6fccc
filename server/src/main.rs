use anyhow::{Context, Result};
use blindsig_common::keys::load_signing_key_from_pgp;
use blindsig_common::SignerService;
use blindsig_server::{app, config::ServerConfig};
use std::sync::Arc;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    // 鍵が読めなければ起動しない
    let rsa_key = load_signing_key_from_pgp(&config.rsa_key_path, config.rsa_passphrase.as_deref())
        .with_context(|| format!("Failed to load RSA signing key '{}'", config.rsa_key_path))?;
    let ecc_key = load_signing_key_from_pgp(&config.ecc_key_path, config.ecc_passphrase.as_deref())
        .with_context(|| format!("Failed to load ECC signing key '{}'", config.ecc_key_path))?;
    let service = Arc::new(SignerService::new(rsa_key, ecc_key, config.session_ttl)?);

    // 期限切れの秘密値を定期的に削除する
    let purger = Arc::clone(&service);
    let period = config.session_ttl.max(std::time::Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let purged = purger.purge_expired().await;
            if purged > 0 {
                tracing::info!("purged {} expired sessions", purged);
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;
    tracing::info!("listening on {}", config.addr);
    axum::serve(listener, app(service)).await?;
    Ok(())
}
