// 署名者側の演算
pub mod signing;
// 一時的な秘密値の表
pub mod store;

use crate::constants::{MISSING_TOKEN, RSA_PATH};
use crate::curve::Curve;
use crate::error::{ProtocolError, SignerError};
use crate::keys::{KeyManager, SignerKeyPair};
use crate::models::{
    AndreevInitResponse, ButunInitResponse, ErrorResponse, InitRequest, SignRequest, SignResponse,
};
use crate::rsa::KeyPair;
use crate::serialization::{biguint_to_radix32, radix32_to_biguint};
use crate::transport::EcdsaVariant;
use anyhow::Result;
use log::{info, warn};
use num_bigint::BigUint;
use p256::Scalar;
use rand::thread_rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use signing::{andreev_prepare, andreev_sign, butun_prepare, butun_sign, sign_rsa, AndreevSecret};
use std::time::Duration;
use store::SessionStore;

/// 署名サーバーの処理本体 (HTTP とは独立)
pub struct SignerService {
    rsa_public: KeyManager,
    rsa_key: KeyPair,
    ecc_public: KeyManager,
    ecc_curve: Curve,
    ecc_secret: Scalar,
    andreev_sessions: SessionStore<AndreevSecret>,
    butun_sessions: SessionStore<Scalar>,
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn missing_token() -> Result<Value> {
    warn!("request without hashed_token");
    to_json(&ErrorResponse {
        error: MISSING_TOKEN.to_string(),
    })
}

fn parse_request<T: DeserializeOwned>(body: &Value) -> Result<T> {
    serde_json::from_value(body.clone())
        .map_err(|e| ProtocolError::MalformedRequest(e.to_string()).into())
}

impl SignerService {
    pub fn new(rsa_key: SignerKeyPair, ecc_key: SignerKeyPair, ttl: Duration) -> Result<Self> {
        let rsa_pair = rsa_key
            .rsa_keypair()
            .map_err(|_| SignerError::KeyMismatch)?;
        let (ecc_curve, ecc_secret) = ecc_key
            .ecdsa_secret()
            .map_err(|_| SignerError::KeyMismatch)?;
        info!(
            "SignerService ready: rsa {} bits, ecc {}",
            rsa_pair.public.n.bits(),
            ecc_curve.name()
        );
        Ok(Self {
            rsa_public: rsa_key.public,
            rsa_key: rsa_pair,
            ecc_public: ecc_key.public,
            ecc_curve,
            ecc_secret,
            andreev_sessions: SessionStore::new(ttl),
            butun_sessions: SessionStore::new(ttl),
        })
    }

    pub fn rsa_public_key(&self) -> &KeyManager {
        &self.rsa_public
    }

    pub fn ecc_public_key(&self) -> &KeyManager {
        &self.ecc_public
    }

    fn parse_message(request: &SignRequest) -> Result<BigUint> {
        let message = request
            .message
            .as_deref()
            .ok_or(SignerError::MissingMessage)?;
        radix32_to_biguint(message)
    }

    /// `POST /rsa`
    pub async fn sign_rsa(&self, request: &SignRequest) -> Result<Value> {
        if request.hashed_token.is_none() {
            return missing_token();
        }
        let message = Self::parse_message(request)?;
        let signed = sign_rsa(&self.rsa_key.secret, &message)?;
        to_json(&SignResponse {
            signed_blinded_message: biguint_to_radix32(&signed),
        })
    }

    /// `POST /ecdsa/<variant>/init`
    pub async fn init_ecdsa(&self, variant: EcdsaVariant, request: &InitRequest) -> Result<Value> {
        let token = match &request.hashed_token {
            Some(token) => token.clone(),
            None => return missing_token(),
        };
        let curve = self.ecc_curve;
        match variant {
            EcdsaVariant::Andreev => {
                let (secret, p, q) = andreev_prepare(&curve, &mut thread_rng())?;
                self.andreev_sessions.insert(token, secret).await;
                let (px, py) = curve.coordinates(&p);
                let (qx, qy) = curve.coordinates(&q);
                to_json(&AndreevInitResponse {
                    px: biguint_to_radix32(&px),
                    py: biguint_to_radix32(&py),
                    qx: biguint_to_radix32(&qx),
                    qy: biguint_to_radix32(&qy),
                })
            }
            EcdsaVariant::Butun => {
                let (k, point) = butun_prepare(&curve, &mut thread_rng());
                self.butun_sessions.insert(token, k).await;
                let (x, y) = curve.coordinates(&point);
                to_json(&ButunInitResponse {
                    rx: biguint_to_radix32(&x),
                    ry: biguint_to_radix32(&y),
                })
            }
        }
    }

    /// `POST /ecdsa/<variant>/sign`。init で保存した秘密値は取り出すと削除される
    pub async fn sign_ecdsa(&self, variant: EcdsaVariant, request: &SignRequest) -> Result<Value> {
        let token = match &request.hashed_token {
            Some(token) => token.as_str(),
            None => return missing_token(),
        };
        let curve = self.ecc_curve;
        let message = curve.scalar_from_biguint(&Self::parse_message(request)?)?;
        let signed = match variant {
            EcdsaVariant::Andreev => {
                let secret = self
                    .andreev_sessions
                    .take(token)
                    .await
                    .ok_or(SignerError::UnknownToken)?;
                andreev_sign(&secret, &message)
            }
            EcdsaVariant::Butun => {
                let k = self
                    .butun_sessions
                    .take(token)
                    .await
                    .ok_or(SignerError::UnknownToken)?;
                butun_sign(&curve, &self.ecc_secret, &k, &message)?
            }
        };
        to_json(&SignResponse {
            signed_blinded_message: biguint_to_radix32(&curve.scalar_to_biguint(&signed)),
        })
    }

    /// パスに応じて処理を振り分ける
    pub async fn dispatch(&self, path: &str, body: &Value) -> Result<Value> {
        if path == RSA_PATH {
            return self.sign_rsa(&parse_request(body)?).await;
        }
        let rest = path
            .strip_prefix("/ecdsa/")
            .ok_or_else(|| SignerError::UnknownEndpoint(path.to_string()))?;
        let (variant, action) = rest
            .split_once('/')
            .ok_or_else(|| SignerError::UnknownEndpoint(path.to_string()))?;
        let variant = EcdsaVariant::from_name(variant)
            .ok_or_else(|| SignerError::UnknownEndpoint(path.to_string()))?;
        match action {
            "init" => self.init_ecdsa(variant, &parse_request(body)?).await,
            "sign" => self.sign_ecdsa(variant, &parse_request(body)?).await,
            _ => Err(SignerError::UnknownEndpoint(path.to_string()).into()),
        }
    }

    /// 期限切れの秘密値を削除する
    pub async fn purge_expired(&self) -> usize {
        self.andreev_sessions.purge_expired().await + self.butun_sessions.purge_expired().await
    }

    pub async fn pending_sessions(&self) -> usize {
        self.andreev_sessions.len().await + self.butun_sessions.len().await
    }
}
