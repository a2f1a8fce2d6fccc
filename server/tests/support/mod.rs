//! 結合テストで共有する鍵とアプリケーション

#![allow(dead_code)]

use axum::Router;
use blindsig_common::{
    curve::Curve,
    keys::{KeyManager, PublicKeyAlgorithm, PublicKeyMaterial, SecretKeyMaterial, SignerKeyPair},
    rsa::generate_keypair,
    SignerService,
};
use blindsig_server::app;
use rand::thread_rng;
use std::sync::Arc;
use std::time::Duration;

const CREATED: u32 = 1_443_792_853;

pub fn rsa_key(bits: usize, uid: &str) -> SignerKeyPair {
    let keypair = generate_keypair(bits, &mut thread_rng()).unwrap();
    SignerKeyPair {
        public: KeyManager {
            algorithm: PublicKeyAlgorithm::Rsa,
            material: PublicKeyMaterial::Rsa(keypair.public),
            created: CREATED,
            expires_in: None,
            key_id: [0x4d, 0x82, 0xee, 0x61, 0xf7, 0x35, 0xab, 0x6a],
            user_ids: vec![uid.to_string()],
            armored: None,
        },
        secret: SecretKeyMaterial::Rsa(keypair.secret),
    }
}

pub fn ecc_key() -> SignerKeyPair {
    let curve = Curve::NistP256;
    let d = curve.random_scalar(&mut thread_rng());
    let point = (curve.generator() * d).to_affine();
    SignerKeyPair {
        public: KeyManager {
            algorithm: PublicKeyAlgorithm::Ecdsa,
            material: PublicKeyMaterial::Ecdsa { curve, point },
            created: CREATED,
            expires_in: Some(86_400),
            key_id: [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef],
            user_ids: vec!["Signer <signer@example.org>".to_string()],
            armored: Some(
                "-----BEGIN PGP PUBLIC KEY BLOCK-----\n\n<test>\n-----END PGP PUBLIC KEY BLOCK-----"
                    .to_string(),
            ),
        },
        secret: SecretKeyMaterial::Ecdsa(d),
    }
}

pub fn test_app() -> (Router, Arc<SignerService>) {
    let service = Arc::new(
        SignerService::new(
            rsa_key(1024, "Signer <signer@example.org>"),
            ecc_key(),
            Duration::from_secs(60),
        )
        .unwrap(),
    );
    (app(Arc::clone(&service)), service)
}
