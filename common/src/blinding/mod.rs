// アルゴリズム共通のコンテキスト
pub mod context;
// RSA ブラインド署名
pub mod rsa;
// Andreev 方式の ECDSA ブラインド署名
pub mod andreev;
// Butun–Demirer 方式の ECDSA ブラインド署名
pub mod butun;

use crate::error::BlindingError;
use crate::keys::{KeyManager, PublicKeyAlgorithm};
use crate::packet::BlindSignaturePacket;
use crate::transport::Transport;
use anyhow::Result;
use context::BlindingContext;
use log::info;
use num_bigint::BigUint;
use rand::thread_rng;
use sha2::{Digest, Sha512};

pub use andreev::{EcdsaAndreevBlinder, EcdsaAndreevBlindingContext};
pub use butun::{ButunEcdsaBlinder, ButunEcdsaBlindingContext};
pub use rsa::{RsaBlinder, RsaBlindingContext};

/// ブラインダーの状態 (一度だけ使用できる)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlinderState {
    Unprepared,
    Initialized,
    Blinded,
    Forged,
}

/// ブラインド署名を作成するアルゴリズムの共通インターフェース
#[allow(async_fn_in_trait)]
pub trait Blinder {
    fn context(&self) -> &dyn BlindingContext;

    fn state(&self) -> BlinderState;

    fn is_valid(&self) -> bool {
        self.context().contains_all_blinding_information()
    }

    /// raw_signature をブラインドして署名者とやり取りし、
    /// ブラインド解除した署名をパケットに書き込む
    async fn forge_signature<T: Transport>(
        &mut self,
        packet: &mut BlindSignaturePacket,
        transport: &T,
    ) -> Result<()>;
}

/// ECDSA 鍵に対する実装の指定
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ImplementationHint {
    #[default]
    Butun,
    Andreev,
}

impl ImplementationHint {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "butun" => Some(ImplementationHint::Butun),
            "andreev" => Some(ImplementationHint::Andreev),
            _ => None,
        }
    }
}

/// 署名者の鍵アルゴリズムに応じたブラインダー
#[derive(Clone, Debug)]
pub enum AnyBlinder {
    Rsa(RsaBlinder),
    EcdsaAndreev(EcdsaAndreevBlinder),
    ButunEcdsa(ButunEcdsaBlinder),
}

impl Blinder for AnyBlinder {
    fn context(&self) -> &dyn BlindingContext {
        match self {
            AnyBlinder::Rsa(b) => b.context(),
            AnyBlinder::EcdsaAndreev(b) => b.context(),
            AnyBlinder::ButunEcdsa(b) => b.context(),
        }
    }

    fn state(&self) -> BlinderState {
        match self {
            AnyBlinder::Rsa(b) => b.state(),
            AnyBlinder::EcdsaAndreev(b) => b.state(),
            AnyBlinder::ButunEcdsa(b) => b.state(),
        }
    }

    async fn forge_signature<T: Transport>(
        &mut self,
        packet: &mut BlindSignaturePacket,
        transport: &T,
    ) -> Result<()> {
        match self {
            AnyBlinder::Rsa(b) => b.forge_signature(packet, transport).await,
            AnyBlinder::EcdsaAndreev(b) => b.forge_signature(packet, transport).await,
            AnyBlinder::ButunEcdsa(b) => b.forge_signature(packet, transport).await,
        }
    }
}

/// 署名者の鍵からブラインダーを選択し、コンテキストを初期化して返す
pub fn create_blinder_for_key_manager(
    key_manager: &KeyManager,
    token: &BigUint,
    hint: Option<ImplementationHint>,
) -> Result<AnyBlinder> {
    let mut rng = thread_rng();
    let blinder = match key_manager.algorithm {
        PublicKeyAlgorithm::Rsa | PublicKeyAlgorithm::RsaSignOnly => {
            let mut blinder = RsaBlinder::new(key_manager.clone(), token.clone());
            blinder.init_context(&mut rng)?;
            AnyBlinder::Rsa(blinder)
        }
        PublicKeyAlgorithm::Ecdsa => match hint.unwrap_or_default() {
            ImplementationHint::Andreev => {
                let mut blinder = EcdsaAndreevBlinder::new(key_manager.clone(), token.clone());
                blinder.init_context(&mut rng)?;
                AnyBlinder::EcdsaAndreev(blinder)
            }
            ImplementationHint::Butun => {
                let mut blinder = ButunEcdsaBlinder::new(key_manager.clone(), token.clone());
                blinder.init_context(&mut rng)?;
                AnyBlinder::ButunEcdsa(blinder)
            }
        },
        PublicKeyAlgorithm::RsaEncryptOnly => {
            return Err(BlindingError::EncryptionOnly(key_manager.algorithm.id()).into())
        }
        PublicKeyAlgorithm::Other(id) => return Err(BlindingError::UnsupportedAlgorithm(id).into()),
    };
    info!(
        "Blinder created for algorithm id {}: {:?}",
        key_manager.algorithm.id(),
        hint
    );
    Ok(blinder)
}

/// トークンの SHA-512 ハッシュ値
pub fn hashed_token(token: &BigUint) -> BigUint {
    BigUint::from_bytes_be(&Sha512::digest(token.to_bytes_be()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blinding::context::VerificationAlgorithm;
    use crate::curve::{ecdsa_verify, Curve};
    use crate::error::ProtocolError;
    use crate::testing::{ecdsa_key_manager, rsa_key_manager, LocalTransport};
    use rand::thread_rng;
    use serde_json::{json, Value};

    // ブラインダー、パケット、署名サーバーにつながるトランスポートを用意する
    fn prepare(
        hint: Option<ImplementationHint>,
        ecc: bool,
    ) -> (AnyBlinder, BlindSignaturePacket, LocalTransport) {
        let transport = LocalTransport::new(crate::testing::signer_service());
        let signer_key = if ecc {
            transport.service.ecc_public_key().clone()
        } else {
            transport.service.rsa_public_key().clone()
        };
        let (target, _) = ecdsa_key_manager();
        let blinder =
            create_blinder_for_key_manager(&signer_key, &BigUint::from(0xdead_beefu32), hint)
                .unwrap();
        let packet =
            BlindSignaturePacket::new(target, signer_key, blinder.context(), &mut thread_rng())
                .unwrap();
        (blinder, packet, transport)
    }

    // RSA: サーバーとのやり取りを通して署名が作成される
    #[tokio::test]
    async fn test_rsa_session() {
        let (mut blinder, mut packet, transport) = prepare(None, false);
        blinder.forge_signature(&mut packet, &transport).await.unwrap();
        assert_eq!(blinder.state(), BlinderState::Forged);
        let sig = packet.sig().unwrap();
        // MPI のビット長はモジュラス以下
        assert!(u16::from_be_bytes([sig[0], sig[1]]) <= 1024);
        // T を持たない署名は署名パケットだけを書き出す
        assert_eq!(packet.export_bytes().unwrap(), packet.to_packet_bytes().unwrap());
    }

    #[tokio::test]
    async fn test_andreev_session() {
        let (mut blinder, mut packet, transport) =
            prepare(Some(ImplementationHint::Andreev), true);
        blinder.forge_signature(&mut packet, &transport).await.unwrap();
        assert_eq!(packet.verification_algorithm, VerificationAlgorithm::Default);

        // sig = MPI(r) || MPI(s)、T に対する通常の ECDSA 署名
        let curve = Curve::NistP256;
        let sig = packet.sig().unwrap();
        let r_len = (u16::from_be_bytes([sig[0], sig[1]]) as usize).div_ceil(8);
        let r = BigUint::from_bytes_be(&sig[2..2 + r_len]);
        let s = BigUint::from_bytes_be(&sig[4 + r_len..]);
        let m = context::ecdsa_message_scalar(&curve, packet.raw_signature().unwrap()).unwrap();
        let r = curve.scalar_from_biguint(&r).unwrap();
        let s = curve.scalar_from_biguint(&s).unwrap();
        let t = packet.verification_point().unwrap();
        assert!(ecdsa_verify(&curve, t, &m, &r, &s));

        // 書き出したバイト列の先頭は T の公開鍵パケット (タグ 6)
        let exported = packet.export_bytes().unwrap();
        assert_eq!(exported[0], 0xc6);
        let key_len = exported[1] as usize;
        let key_body = &exported[2..2 + key_len];
        // 末尾 65 バイトが非圧縮 SEC1 形式の T
        let exported_t = curve.decode_sec1(&key_body[key_len - 65..]).unwrap();
        assert_eq!(&exported_t, t);
        assert!(ecdsa_verify(&curve, &exported_t, &m, &r, &s));
        // 署名者の鍵の点とは異なる
        let (_, signer_point) = packet.signer_key.ecdsa_public_point().unwrap();
        assert_ne!(exported_t, signer_point);
        assert_eq!(&exported[2 + key_len..], &packet.to_packet_bytes().unwrap()[..]);
        // 秘密値は消費済み
        assert_eq!(transport.service.pending_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_butun_session() {
        let (mut blinder, mut packet, transport) = prepare(None, true);
        blinder.forge_signature(&mut packet, &transport).await.unwrap();
        assert_eq!(packet.verification_algorithm, VerificationAlgorithm::Butun);
        assert!(packet.verification_point().is_none());
        // MPI(s) || MPI(R)、R は 515 ビットの非圧縮点
        let sig = packet.sig().unwrap();
        assert_eq!(&sig[sig.len() - 67..sig.len() - 64], &[0x02, 0x03, 0x04]);
    }

    // ブラインダーは一度しか使えない
    #[tokio::test]
    async fn test_forge_twice_rejected() {
        let (mut blinder, mut packet, transport) = prepare(None, true);
        blinder.forge_signature(&mut packet, &transport).await.unwrap();
        let err = blinder
            .forge_signature(&mut packet, &transport)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<BlindingError>(),
            Some(&BlindingError::InvalidState(BlinderState::Forged, "forge a signature"))
        );
    }

    // サーバーが {error} を返した場合は拒否される
    #[tokio::test]
    async fn test_rejected_by_signer() {
        struct Refusing;
        impl Transport for Refusing {
            async fn post_json(&self, _path: &str, _body: &Value) -> Result<Value> {
                Ok(json!({"error": "Missing Token..."}))
            }
        }
        let (mut blinder, mut packet, _) = prepare(Some(ImplementationHint::Andreev), true);
        let err = blinder
            .forge_signature(&mut packet, &Refusing)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::Rejected(_))
        ));
        assert!(packet.sig().is_none());
    }

    // 曲線上にない点を返すサーバーは拒否される
    #[tokio::test]
    async fn test_invalid_point_from_signer() {
        struct BadPoint;
        impl Transport for BadPoint {
            async fn post_json(&self, _path: &str, _body: &Value) -> Result<Value> {
                Ok(json!({"Ŕx": "1", "Ŕy": "1"}))
            }
        }
        let (mut blinder, mut packet, _) = prepare(None, true);
        let err = blinder
            .forge_signature(&mut packet, &BadPoint)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<BlindingError>(),
            Some(&BlindingError::PointNotOnCurve)
        );
    }

    // 鍵アルゴリズムとヒントに応じたブラインダーが選ばれるかのテスト
    #[test]
    fn test_factory_selection() {
        let token = BigUint::from(99u32);
        let (rsa, _) = rsa_key_manager(512);
        let (ecc, _) = ecdsa_key_manager();

        let blinder = create_blinder_for_key_manager(&rsa, &token, None).unwrap();
        assert!(matches!(blinder, AnyBlinder::Rsa(_)));
        assert!(blinder.is_valid());
        assert_eq!(blinder.state(), BlinderState::Initialized);

        let blinder = create_blinder_for_key_manager(&ecc, &token, None).unwrap();
        assert!(matches!(blinder, AnyBlinder::ButunEcdsa(_)));
        assert!(blinder.is_valid());

        let blinder =
            create_blinder_for_key_manager(&ecc, &token, Some(ImplementationHint::Andreev))
                .unwrap();
        assert!(matches!(blinder, AnyBlinder::EcdsaAndreev(_)));
        assert!(blinder.is_valid());

        // RSA 鍵に対してはヒントを無視する
        let blinder =
            create_blinder_for_key_manager(&rsa, &token, Some(ImplementationHint::Andreev))
                .unwrap();
        assert!(matches!(blinder, AnyBlinder::Rsa(_)));
    }

    #[test]
    fn test_factory_sign_only_rsa() {
        let (mut rsa, _) = rsa_key_manager(512);
        rsa.algorithm = PublicKeyAlgorithm::RsaSignOnly;
        let blinder = create_blinder_for_key_manager(&rsa, &BigUint::from(1u32), None).unwrap();
        assert!(matches!(blinder, AnyBlinder::Rsa(_)));
    }

    #[test]
    fn test_factory_rejects_encryption_only() {
        let (mut rsa, _) = rsa_key_manager(512);
        rsa.algorithm = PublicKeyAlgorithm::RsaEncryptOnly;
        let err = create_blinder_for_key_manager(&rsa, &BigUint::from(1u32), None).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BlindingError>(),
            Some(&BlindingError::EncryptionOnly(2))
        );
    }

    // 未対応のアルゴリズムは ID 付きでエラーになる
    #[test]
    fn test_factory_rejects_unsupported() {
        let (mut ecc, _) = ecdsa_key_manager();
        ecc.algorithm = PublicKeyAlgorithm::Other(22);
        let err = create_blinder_for_key_manager(&ecc, &BigUint::from(1u32), None).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BlindingError>(),
            Some(&BlindingError::UnsupportedAlgorithm(22))
        );
        assert!(err.to_string().contains("22"));
    }

    #[test]
    fn test_hashed_token() {
        let token = BigUint::from(0x0102u32);
        let expected = BigUint::from_bytes_be(&Sha512::digest([0x01u8, 0x02]));
        assert_eq!(hashed_token(&token), expected);
        assert_ne!(hashed_token(&token), hashed_token(&BigUint::from(0x0103u32)));
    }

    #[test]
    fn test_hint_from_name() {
        assert_eq!(
            ImplementationHint::from_name("Andreev"),
            Some(ImplementationHint::Andreev)
        );
        assert_eq!(ImplementationHint::from_name("butun"), Some(ImplementationHint::Butun));
        assert_eq!(ImplementationHint::from_name("rsa"), None);
    }
}
