use anyhow::{Context, Result};
use blindsig_common::constants::DEFAULT_SESSION_TTL_SECS;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_ADDR: &str = "0.0.0.0:8888";
const DEFAULT_RSA_KEY: &str = "keys/rsa_1024_priv.asc";
const DEFAULT_ECC_KEY: &str = "keys/ecc_nist_p_256_priv.asc";
const DEFAULT_PASSPHRASE: &str = "verifyme";

/// 環境変数から読み込むサーバー設定
#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub rsa_key_path: String,
    pub rsa_passphrase: Option<String>,
    pub ecc_key_path: String,
    pub ecc_passphrase: Option<String>,
    pub session_ttl: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 空文字列のパスフレーズは「パスフレーズなし」として扱う
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let addr = lookup("BLINDSIG_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr
            .parse()
            .with_context(|| format!("Invalid BLINDSIG_ADDR '{}'", addr))?;

        let session_ttl = match lookup("BLINDSIG_SESSION_TTL_SECS") {
            Some(secs) => secs
                .parse()
                .with_context(|| format!("Invalid BLINDSIG_SESSION_TTL_SECS '{}'", secs))?,
            None => DEFAULT_SESSION_TTL_SECS,
        };

        let passphrase = |name: &str| match lookup(name) {
            Some(p) if p.is_empty() => None,
            Some(p) => Some(p),
            None => Some(DEFAULT_PASSPHRASE.to_string()),
        };

        Ok(Self {
            addr,
            rsa_key_path: lookup("BLINDSIG_RSA_KEY").unwrap_or_else(|| DEFAULT_RSA_KEY.to_string()),
            rsa_passphrase: passphrase("BLINDSIG_RSA_PASSPHRASE"),
            ecc_key_path: lookup("BLINDSIG_ECC_KEY").unwrap_or_else(|| DEFAULT_ECC_KEY.to_string()),
            ecc_passphrase: passphrase("BLINDSIG_ECC_PASSPHRASE"),
            session_ttl: Duration::from_secs(session_ttl),
        })
    }
}
