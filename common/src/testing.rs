//! テスト用の鍵と、HTTP を使わずに署名サーバーと通信するトランスポート

use crate::curve::Curve;
use crate::keys::{KeyManager, PublicKeyAlgorithm, PublicKeyMaterial, SecretKeyMaterial, SignerKeyPair};
use crate::rsa::{generate_keypair, PublicKey};
use crate::signer::SignerService;
use crate::transport::Transport;
use anyhow::Result;
use rand::thread_rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const TEST_CREATED: u32 = 1_443_792_853;

pub fn key_manager_for_rsa(public: PublicKey) -> KeyManager {
    KeyManager {
        algorithm: PublicKeyAlgorithm::Rsa,
        material: PublicKeyMaterial::Rsa(public),
        created: TEST_CREATED,
        expires_in: None,
        key_id: [0x4d, 0x82, 0xee, 0x61, 0xf7, 0x35, 0xab, 0x6a],
        user_ids: vec!["John Doe <john@example.org>".to_string()],
        armored: None,
    }
}

pub fn rsa_key_manager(bits: usize) -> (KeyManager, SignerKeyPair) {
    let keypair = generate_keypair(bits, &mut thread_rng()).unwrap();
    let public = key_manager_for_rsa(keypair.public.clone());
    let signer = SignerKeyPair {
        public: public.clone(),
        secret: SecretKeyMaterial::Rsa(keypair.secret),
    };
    (public, signer)
}

pub fn ecdsa_key_manager() -> (KeyManager, SignerKeyPair) {
    let curve = Curve::NistP256;
    let d = curve.random_scalar(&mut thread_rng());
    let point = (curve.generator() * d).to_affine();
    let public = KeyManager {
        algorithm: PublicKeyAlgorithm::Ecdsa,
        material: PublicKeyMaterial::Ecdsa { curve, point },
        created: TEST_CREATED,
        expires_in: Some(86_400 * 365),
        key_id: [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef],
        user_ids: vec!["Jane Roe <jane@example.org>".to_string()],
        armored: None,
    };
    let signer = SignerKeyPair {
        public: public.clone(),
        secret: SecretKeyMaterial::Ecdsa(d),
    };
    (public, signer)
}

pub fn signer_service() -> SignerService {
    let (_, rsa) = rsa_key_manager(1024);
    let (_, ecc) = ecdsa_key_manager();
    SignerService::new(rsa, ecc, Duration::from_secs(60)).unwrap()
}

/// SignerService を直接呼び出すトランスポート
#[derive(Clone)]
pub struct LocalTransport {
    pub service: Arc<SignerService>,
}

impl LocalTransport {
    pub fn new(service: SignerService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

impl Transport for LocalTransport {
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        self.service.dispatch(path, body).await
    }
}
